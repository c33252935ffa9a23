//! Graph normalization: collapse variables that refer to the same dataset.
//!
//! A dataset generated by one pipeline and consumed by another appears as
//! two (or more) variables specializing the same dataset node. Normalization
//! picks one canonical variable per such group, folds the others into it,
//! and deletes the dataset, leaving exactly the edges that determine
//! execution order.

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use crate::error::GraphError;
use crate::graph::{EdgeLabel, NodeKind, WorkflowGraph};

/// Collapse every dataset with two or more variable specializations.
///
/// Fails with [`GraphError::Normalization`] when no canonical choice keeps
/// the graph acyclic.
pub fn normalize(graph: &mut WorkflowGraph) -> Result<(), GraphError> {
    let groups: Vec<(NodeIndex, Vec<NodeIndex>)> = graph
        .nodes_sorted()
        .into_iter()
        .filter(|&idx| graph.node(idx).kind == NodeKind::Dataset)
        .filter_map(|ds| {
            let variables: Vec<_> = graph
                .incoming(ds, EdgeLabel::InstanceOf)
                .into_iter()
                .filter(|&v| graph.node(v).kind == NodeKind::Variable)
                .collect();
            (variables.len() >= 2).then_some((ds, variables))
        })
        .collect();

    for (dataset, variables) in groups {
        collapse_group(graph, dataset, &variables)?;
    }
    Ok(())
}

/// Merge one dataset's variable group into a canonical variable and delete
/// the dataset.
fn collapse_group(
    graph: &mut WorkflowGraph,
    dataset: NodeIndex,
    variables: &[NodeIndex],
) -> Result<(), GraphError> {
    let dataset_iri = graph.node(dataset).iri.clone();

    for canonical in candidate_order(graph, variables) {
        let mut trial = graph.clone();
        apply(&mut trial, dataset, canonical, variables);
        if trial.topo_order().is_ok() {
            debug!(
                dataset = %dataset_iri,
                canonical = %graph.node(canonical).iri,
                merged = variables.len() - 1,
                "Collapsed dataset specialization group"
            );
            apply(graph, dataset, canonical, variables);
            return Ok(());
        }
    }

    Err(GraphError::Normalization(format!(
        "no acyclic canonical variable for dataset {dataset_iri}"
    )))
}

/// Candidate canonical variables in preference order: variables produced by
/// a step first (ordered by their smallest producing-step IRI), then the
/// rest by their own IRI.
fn candidate_order(graph: &WorkflowGraph, variables: &[NodeIndex]) -> Vec<NodeIndex> {
    let mut produced: Vec<((String, String), NodeIndex)> = Vec::new();
    let mut unproduced: Vec<((String, String), NodeIndex)> = Vec::new();

    for &var in variables {
        let var_iri = graph.node(var).iri.clone();
        let steps = graph.producing_steps(var);
        if let Some(first) = steps.first() {
            produced.push(((graph.node(*first).iri.clone(), var_iri), var));
        } else {
            unproduced.push(((var_iri.clone(), var_iri), var));
        }
    }

    produced.sort();
    unproduced.sort();
    produced
        .into_iter()
        .chain(unproduced)
        .map(|(_, var)| var)
        .collect()
}

fn apply(
    graph: &mut WorkflowGraph,
    dataset: NodeIndex,
    canonical: NodeIndex,
    variables: &[NodeIndex],
) {
    for &var in variables {
        if var != canonical {
            graph.merge_node_into(var, canonical);
        }
    }
    graph.remove_node(dataset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::node;
    use crate::graph::NodeData;

    /// Producer step → out var → dataset ← in var → consumer step.
    fn chained() -> WorkflowGraph {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:step:s0", "Produce", NodeKind::Step));
        g.add_node(node("urn:step:s1", "Consume", NodeKind::Step));
        g.add_node(node("urn:var:out0", "Produced", NodeKind::Variable));
        g.add_node(node("urn:var:in1", "Consumed", NodeKind::Variable));
        g.add_node(node("urn:ds:shared", "Shared", NodeKind::Dataset));
        g.add_edge("urn:step:s0", "urn:var:out0", EdgeLabel::Output);
        g.add_edge("urn:var:out0", "urn:ds:shared", EdgeLabel::InstanceOf);
        g.add_edge("urn:var:in1", "urn:ds:shared", EdgeLabel::InstanceOf);
        g.add_edge("urn:var:in1", "urn:step:s1", EdgeLabel::Input);
        g
    }

    #[test]
    fn produced_variable_wins() {
        let mut g = chained();
        normalize(&mut g).unwrap();

        assert!(!g.contains("urn:ds:shared"));
        assert!(!g.contains("urn:var:in1"));
        let out0 = g.index_of("urn:var:out0").unwrap();
        let s1 = g.index_of("urn:step:s1").unwrap();
        assert_eq!(g.incoming(s1, EdgeLabel::Input), vec![out0]);
    }

    #[test]
    fn no_dataset_keeps_two_specializations() {
        let mut g = chained();
        normalize(&mut g).unwrap();

        for idx in g.nodes_sorted() {
            if g.node(idx).kind == NodeKind::Dataset {
                assert!(g.incoming(idx, EdgeLabel::InstanceOf).len() < 2);
            }
        }
    }

    #[test]
    fn single_specialization_is_left_alone() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:var:v", "V", NodeKind::Variable));
        g.add_node(NodeData {
            iri: "urn:ds:d".into(),
            label: "D".into(),
            kind: NodeKind::Dataset,
            access_urls: vec!["http://repo/d.zip".into()],
        });
        g.add_edge("urn:var:v", "urn:ds:d", EdgeLabel::InstanceOf);

        normalize(&mut g).unwrap();
        assert!(g.contains("urn:ds:d"));
        assert!(g.contains("urn:var:v"));
    }

    #[test]
    fn tie_break_prefers_smallest_producing_step_iri() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:step:a", "A", NodeKind::Step));
        g.add_node(node("urn:step:b", "B", NodeKind::Step));
        g.add_node(node("urn:var:vb", "VB", NodeKind::Variable));
        g.add_node(node("urn:var:va", "VA", NodeKind::Variable));
        g.add_node(node("urn:ds:d", "D", NodeKind::Dataset));
        // Both variables are produced; step IRIs break the tie.
        g.add_edge("urn:step:b", "urn:var:vb", EdgeLabel::Output);
        g.add_edge("urn:step:a", "urn:var:va", EdgeLabel::Output);
        g.add_edge("urn:var:va", "urn:ds:d", EdgeLabel::InstanceOf);
        g.add_edge("urn:var:vb", "urn:ds:d", EdgeLabel::InstanceOf);

        normalize(&mut g).unwrap();

        // urn:step:a < urn:step:b, so its output variable survives.
        assert!(g.contains("urn:var:va"));
        assert!(!g.contains("urn:var:vb"));
    }

    #[test]
    fn cyclic_merge_is_rejected() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:step:a", "A", NodeKind::Step));
        g.add_node(node("urn:step:b", "B", NodeKind::Step));
        g.add_node(node("urn:var:v1", "V1", NodeKind::Variable));
        g.add_node(node("urn:var:v2", "V2", NodeKind::Variable));
        g.add_node(node("urn:ds:d", "D", NodeKind::Dataset));
        // a → v1 → b → v2, with v1 and v2 naming the same dataset. The
        // graph is acyclic, but identifying v1 with v2 closes v1 → b → v1.
        g.add_edge("urn:step:a", "urn:var:v1", EdgeLabel::Output);
        g.add_edge("urn:var:v1", "urn:step:b", EdgeLabel::Input);
        g.add_edge("urn:step:b", "urn:var:v2", EdgeLabel::Output);
        g.add_edge("urn:var:v1", "urn:ds:d", EdgeLabel::InstanceOf);
        g.add_edge("urn:var:v2", "urn:ds:d", EdgeLabel::InstanceOf);

        let err = normalize(&mut g).unwrap_err();
        assert!(matches!(err, GraphError::Normalization(_)));
    }

    #[test]
    fn pre_existing_cycle_is_reported_by_topo_sort() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:step:a", "A", NodeKind::Step));
        g.add_node(node("urn:step:b", "B", NodeKind::Step));
        g.add_edge("urn:step:a", "urn:step:b", EdgeLabel::Precedes);
        g.add_edge("urn:step:b", "urn:step:a", EdgeLabel::Precedes);

        // No dataset groups, so normalization passes; the cycle surfaces in
        // the scheduling sort.
        normalize(&mut g).unwrap();
        assert!(matches!(g.topo_order(), Err(GraphError::Cycle(_))));
    }
}
