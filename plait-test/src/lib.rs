//! Fixture pipeline sources and Turtle seed documents for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use plait_core::error::MetadataError;
use plait_core::graph::builder::GraphBuilder;
use plait_core::graph::WorkflowGraph;
use plait_core::metadata::PipelineSource;

/// In-memory pipeline source: serves canned Turtle documents and records
/// every fetch, so tests can assert which pipelines were visited.
#[derive(Debug, Default)]
pub struct FixtureSource {
    documents: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new(documents: &[(&str, &str)]) -> Self {
        Self {
            documents: documents
                .iter()
                .map(|(uuid, ttl)| ((*uuid).to_string(), (*ttl).to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Pipeline UUIDs fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl PipelineSource for FixtureSource {
    async fn fetch_turtle(&self, pipeline_uuid: &str) -> plait_core::error::Result<String> {
        self.fetched
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(pipeline_uuid.to_string());
        self.documents.get(pipeline_uuid).cloned().ok_or_else(|| {
            MetadataError::Status {
                uuid: pipeline_uuid.to_string(),
                status: 404,
            }
            .into()
        })
    }
}

/// Build the combined graph from a fixture source.
pub async fn build_graph(
    source: &FixtureSource,
    start_uuid: &str,
    regenerate: &[&str],
) -> plait_core::error::Result<WorkflowGraph> {
    let regenerate: HashSet<String> = regenerate.iter().map(ToString::to_string).collect();
    GraphBuilder::new(source).build(start_uuid, &regenerate).await
}

/// One pipeline, one step: a downloadable dataset feeds `Sample Step`, which
/// produces `Output Data` through `Sample Plugin`.
pub fn single_step_ttl() -> &'static str {
    r#"
        @prefix dcat: <http://www.w3.org/ns/dcat#> .
        @prefix dcterms: <http://purl.org/dc/terms/> .
        @prefix df: <http://localhost:8080/ns/df#> .
        @prefix p-plan: <http://purl.org/net/p-plan#> .
        @prefix prov: <http://www.w3.org/ns/prov#> .

        <http://ex/step#step-uuid> a p-plan:Step ;
            dcterms:title "Sample Step" ;
            df:usesPlugin <http://ex/pl#plugin-uuid> ;
            p-plan:hasInputVar <http://ex/var#input-var> ;
            p-plan:isOutputVarOf <http://ex/var#output-var> .

        <http://ex/var#input-var> a p-plan:Variable ;
            dcterms:title "Input Data" ;
            prov:specializationOf <http://ex/ds#dataset-uuid> .

        <http://ex/var#output-var> a p-plan:Variable ;
            dcterms:title "Output Data" .

        <http://ex/ds#dataset-uuid> a dcat:Dataset ;
            dcterms:title "Source Dataset" ;
            dcat:distribution [ dcat:accessURL <http://repo/d.zip> ] .

        <http://ex/pl#plugin-uuid> a df:Plugin ;
            dcterms:title "Sample Plugin" ;
            dcat:distribution [ dcat:accessURL <http://repo/plugin.zip> ] .
    "#
}

/// Downstream pipeline: `Consume` reads a dataset generated by pipeline
/// `p0`.
pub fn downstream_ttl() -> &'static str {
    r#"
        @prefix dcat: <http://www.w3.org/ns/dcat#> .
        @prefix dcterms: <http://purl.org/dc/terms/> .
        @prefix df: <http://localhost:8080/ns/df#> .
        @prefix p-plan: <http://purl.org/net/p-plan#> .
        @prefix prov: <http://www.w3.org/ns/prov#> .

        <http://ex/step#consume> a p-plan:Step ;
            dcterms:title "Consume" ;
            df:usesPlugin <http://ex/pl#consume-plugin> ;
            p-plan:hasInputVar <http://ex/var#consume-in> ;
            p-plan:isOutputVarOf <http://ex/var#final-out> .

        <http://ex/var#consume-in> a p-plan:Variable ;
            dcterms:title "Upstream Result" ;
            prov:specializationOf <http://ex/ds#shared> .

        <http://ex/var#final-out> a p-plan:Variable ;
            dcterms:title "Final Result" .

        <http://ex/ds#shared> a dcat:Dataset ;
            dcterms:title "Shared Dataset" ;
            prov:wasGeneratedBy <http://ex/pipe#p0> ;
            dcat:distribution [ dcat:accessURL <http://repo/shared.zip> ] .

        <http://ex/pl#consume-plugin> a df:Plugin ;
            dcterms:title "Consume Plugin" ;
            dcat:distribution [ dcat:accessURL <http://repo/consume.zip> ] .
    "#
}

/// Upstream pipeline `p0`: `Produce` generates the shared dataset.
pub fn upstream_ttl() -> &'static str {
    r#"
        @prefix dcat: <http://www.w3.org/ns/dcat#> .
        @prefix dcterms: <http://purl.org/dc/terms/> .
        @prefix df: <http://localhost:8080/ns/df#> .
        @prefix p-plan: <http://purl.org/net/p-plan#> .
        @prefix prov: <http://www.w3.org/ns/prov#> .

        <http://ex/step#produce> a p-plan:Step ;
            dcterms:title "Produce" ;
            df:usesPlugin <http://ex/pl#produce-plugin> ;
            p-plan:isOutputVarOf <http://ex/var#produce-out> .

        <http://ex/var#produce-out> a p-plan:Variable ;
            dcterms:title "Produced Data" ;
            prov:specializationOf <http://ex/ds#shared> .

        <http://ex/ds#shared> a dcat:Dataset ;
            dcterms:title "Shared Dataset" ;
            dcat:distribution [ dcat:accessURL <http://repo/shared.zip> ] .

        <http://ex/pl#produce-plugin> a df:Plugin ;
            dcterms:title "Produce Plugin" ;
            dcat:distribution [ dcat:accessURL <http://repo/produce.zip> ] .
    "#
}

/// Two steps whose `isPrecededBy` statements point at each other.
pub fn cyclic_ttl() -> &'static str {
    r#"
        @prefix dcterms: <http://purl.org/dc/terms/> .
        @prefix p-plan: <http://purl.org/net/p-plan#> .

        <http://ex/step#first> a p-plan:Step ;
            dcterms:title "First" ;
            p-plan:isPrecededBy <http://ex/step#second> .

        <http://ex/step#second> a p-plan:Step ;
            dcterms:title "Second" ;
            p-plan:isPrecededBy <http://ex/step#first> .
    "#
}
