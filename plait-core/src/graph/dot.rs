//! Graphviz DOT rendering of the combined workflow graph.

use std::fmt::Write as _;

use crate::graph::{EdgeLabel, NodeKind, WorkflowGraph};

fn fill_color(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Step => "#80bfff",
        NodeKind::Variable => "#90ee90",
        NodeKind::Dataset => "#900090",
        NodeKind::Plugin => "#ffb3ba",
    }
}

/// Render the graph as a DOT digraph, nodes colored by kind and edges
/// labelled with their relation.
pub fn to_dot(graph: &WorkflowGraph) -> String {
    let mut out = String::from("digraph workflow {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [style=filled, fontname=\"Helvetica\"];\n");

    let nodes = graph.nodes_sorted();
    for (ord, &idx) in nodes.iter().enumerate() {
        let data = graph.node(idx);
        let _ = writeln!(
            out,
            "    n{ord} [label=\"{}\\n({})\", fillcolor=\"{}\"];",
            escape(&data.label),
            data.kind,
            fill_color(data.kind),
        );
    }

    for (src_ord, &src) in nodes.iter().enumerate() {
        for label in [
            EdgeLabel::Input,
            EdgeLabel::Output,
            EdgeLabel::Uses,
            EdgeLabel::Precedes,
            EdgeLabel::InstanceOf,
        ] {
            for dst in graph.outgoing(src, label) {
                let dst_ord = nodes.iter().position(|&n| n == dst).unwrap_or(0);
                let _ = writeln!(out, "    n{src_ord} -> n{dst_ord} [label=\"{label}\"];");
            }
        }
    }

    out.push_str("}\n");
    out
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
