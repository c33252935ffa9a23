//! Plait core library — semantic pipeline graph resolution and execution.
//!
//! The flow: [`metadata::MetadataClient`] fetches Turtle plan descriptions,
//! [`graph::builder::GraphBuilder`] assembles and normalizes the combined
//! execution graph, and [`exec::Orchestrator`] walks it in topological order
//! over a [`exec::StepBackend`] (live or dry-run).

pub mod config;
pub mod error;
pub mod exec;
pub mod graph;
pub mod iri;
pub mod metadata;
