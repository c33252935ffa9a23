//! Recursive pipeline discovery and graph assembly from Turtle descriptions.

use std::collections::{HashSet, VecDeque};

use oxigraph::io::RdfFormat;
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use tracing::{debug, info, warn};

use crate::error::GraphError;
use crate::graph::{EdgeLabel, NodeData, NodeKind, WorkflowGraph};
use crate::iri::uuid_from_iri;
use crate::metadata::PipelineSource;

use super::normalize;

/// Extracts typed nodes. `a/rdfs:subClassOf*` also matches transitive
/// subclasses of the p-plan types; access URLs hang off distributions and
/// are optional.
const NODE_QUERY: &str = r#"
    PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
    SELECT ?iri ?title ?type ?accessURL
    WHERE {
        { ?iri a/rdfs:subClassOf* <http://purl.org/net/p-plan#Step> . BIND("Step" AS ?type) }
        UNION
        { ?iri a/rdfs:subClassOf* <http://purl.org/net/p-plan#Variable> . BIND("Variable" AS ?type) }
        UNION
        { ?iri a <http://localhost:8080/ns/df#Plugin> . BIND("Plugin" AS ?type) }
        UNION
        { ?iri a <http://www.w3.org/ns/dcat#Dataset> . BIND("Dataset" AS ?type) }
        ?iri <http://purl.org/dc/terms/title> ?title .
        OPTIONAL {
            ?iri <http://www.w3.org/ns/dcat#distribution> ?dist .
            ?dist <http://www.w3.org/ns/dcat#accessURL> ?accessURL .
        }
    }
"#;

/// Extracts the five labelled edge relations. The metadata store emits the
/// step as the subject of `isOutputVarOf`, so `output` edges run
/// Step → Variable.
const EDGE_QUERY: &str = r#"
    SELECT ?source ?target ?label
    WHERE {
        { ?target <http://purl.org/net/p-plan#hasInputVar> ?source . BIND("input" AS ?label) }
        UNION
        { ?source <http://purl.org/net/p-plan#isOutputVarOf> ?target . BIND("output" AS ?label) }
        UNION
        { ?source <http://localhost:8080/ns/df#usesPlugin> ?target . BIND("uses" AS ?label) }
        UNION
        { ?target <http://purl.org/net/p-plan#isPrecededBy> ?source . BIND("precedes" AS ?label) }
        UNION
        { ?source <http://www.w3.org/ns/prov#specializationOf> ?target . BIND("is_instance_of" AS ?label) }
    }
"#;

/// Pairs (dataset, generating pipeline) that link this plan to upstream
/// pipelines.
const DEPENDENCY_QUERY: &str = r#"
    PREFIX prov: <http://www.w3.org/ns/prov#>
    SELECT DISTINCT ?dataset_iri ?generating_pipeline_iri
    WHERE {
        ?var prov:specializationOf ?dataset_iri .
        ?dataset_iri prov:wasGeneratedBy ?generating_pipeline_iri .
    }
"#;

/// Builds the normalized combined execution graph starting from one
/// pipeline UUID.
///
/// Unreachable or unparsable pipelines are skipped with a warning; the
/// affected subgraph may fail later when the orchestrator finds a variable
/// with neither a producing step nor an accessible dataset.
#[derive(Debug)]
pub struct GraphBuilder<'a, S: PipelineSource + ?Sized> {
    source: &'a S,
    graph: WorkflowGraph,
    processed: HashSet<String>,
}

impl<'a, S: PipelineSource + ?Sized> GraphBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            graph: WorkflowGraph::new(),
            processed: HashSet::new(),
        }
    }

    /// Fetch, merge, and normalize. `regenerate` holds dataset UUIDs whose
    /// generating pipelines must be re-executed instead of reusing the
    /// published distribution.
    pub async fn build(
        mut self,
        start_uuid: &str,
        regenerate: &HashSet<String>,
    ) -> crate::error::Result<WorkflowGraph> {
        let mut queue = VecDeque::from([start_uuid.to_string()]);

        while let Some(uuid) = queue.pop_front() {
            if !self.processed.insert(uuid.clone()) {
                continue;
            }
            info!(pipeline = %uuid, "Processing pipeline definition");

            let ttl = match self.source.fetch_turtle(&uuid).await {
                Ok(ttl) => ttl,
                Err(e) => {
                    warn!(pipeline = %uuid, error = %e, "Could not retrieve pipeline; skipping");
                    continue;
                }
            };

            let store = match parse_turtle(&uuid, &ttl) {
                Ok(store) => store,
                Err(e) => {
                    warn!(pipeline = %uuid, error = %e, "Could not parse pipeline; skipping");
                    continue;
                }
            };

            self.merge_document(&store)?;

            for (dataset_iri, pipeline_iri) in dependencies(&store)? {
                let dataset_uuid = uuid_from_iri(&dataset_iri);
                let pipeline_uuid = uuid_from_iri(&pipeline_iri);
                if regenerate.contains(dataset_uuid) {
                    info!(
                        dataset = %dataset_uuid,
                        pipeline = %pipeline_uuid,
                        "Dataset marked for regeneration; queueing generating pipeline"
                    );
                    if !self.processed.contains(pipeline_uuid) {
                        queue.push_back(pipeline_uuid.to_string());
                    }
                } else {
                    debug!(
                        dataset = %dataset_uuid,
                        "Dataset not marked for regeneration; its distribution will be used"
                    );
                }
            }
        }

        normalize::normalize(&mut self.graph)?;

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Finished building execution graph"
        );
        Ok(self.graph)
    }

    /// Run the fixed node and edge queries and merge the results.
    fn merge_document(&mut self, store: &Store) -> crate::error::Result<()> {
        for row in solutions(store, NODE_QUERY)? {
            let (Some(iri), Some(title), Some(kind)) = (
                row.get("iri").and_then(term_text),
                row.get("title").and_then(term_text),
                row.get("type").and_then(term_text).and_then(parse_kind),
            ) else {
                continue;
            };

            // A binding may carry several endpoints comma-joined, and the
            // same node may come back once per endpoint; both accumulate.
            let access_urls = row
                .get("accessURL")
                .and_then(term_text)
                .map(|joined| {
                    joined
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default();

            self.graph.add_node(NodeData {
                iri: iri.to_string(),
                label: title.to_string(),
                kind,
                access_urls,
            });
        }

        for row in solutions(store, EDGE_QUERY)? {
            let (Some(source), Some(target), Some(label)) = (
                row.get("source").and_then(term_text),
                row.get("target").and_then(term_text),
                row.get("label").and_then(term_text).and_then(parse_label),
            ) else {
                continue;
            };
            self.graph.add_edge(source, target, label);
        }

        Ok(())
    }
}

fn parse_turtle(uuid: &str, ttl: &str) -> Result<Store, GraphError> {
    let store = Store::new().map_err(|e| GraphError::Query(e.to_string()))?;
    store
        .load_from_reader(RdfFormat::Turtle, ttl.as_bytes())
        .map_err(|e| GraphError::Parse {
            uuid: uuid.to_string(),
            message: e.to_string(),
        })?;
    Ok(store)
}

fn dependencies(store: &Store) -> crate::error::Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for row in solutions(store, DEPENDENCY_QUERY)? {
        if let (Some(ds), Some(pipe)) = (
            row.get("dataset_iri").and_then(term_text),
            row.get("generating_pipeline_iri").and_then(term_text),
        ) {
            pairs.push((ds.to_string(), pipe.to_string()));
        }
    }
    Ok(pairs)
}

fn solutions(
    store: &Store,
    query: &str,
) -> crate::error::Result<Vec<oxigraph::sparql::QuerySolution>> {
    let results = store
        .query(query)
        .map_err(|e| GraphError::Query(e.to_string()))?;
    let QueryResults::Solutions(iter) = results else {
        return Err(GraphError::Query("expected SELECT solutions".to_string()).into());
    };
    iter.collect::<Result<Vec<_>, _>>()
        .map_err(|e| GraphError::Query(e.to_string()).into())
}

fn term_text(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(n) => Some(n.as_str()),
        Term::Literal(l) => Some(l.value()),
        _ => None,
    }
}

fn parse_kind(s: &str) -> Option<NodeKind> {
    match s {
        "Step" => Some(NodeKind::Step),
        "Variable" => Some(NodeKind::Variable),
        "Plugin" => Some(NodeKind::Plugin),
        "Dataset" => Some(NodeKind::Dataset),
        _ => None,
    }
}

fn parse_label(s: &str) -> Option<EdgeLabel> {
    match s {
        "input" => Some(EdgeLabel::Input),
        "output" => Some(EdgeLabel::Output),
        "uses" => Some(EdgeLabel::Uses),
        "precedes" => Some(EdgeLabel::Precedes),
        "is_instance_of" => Some(EdgeLabel::InstanceOf),
        _ => None,
    }
}
