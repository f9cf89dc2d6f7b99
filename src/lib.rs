//! This crate provides a query server for per-project RNA-seq expression
//! datasets. Each bioproject's precomputed statistical object is loaded from
//! disk on first access and kept in memory for the lifetime of the process;
//! requests filter it by gene, transcript, feature, phenotype condition or
//! differential fold expression and receive paginated, UI-ready JSON tables.
//!
//! The analysis engine behind the queries is a single shared, non-reentrant
//! resource: every engine call, dataset loads included, runs inside one
//! process-wide critical section owned by the [dataset cache](cache).
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team on top of various
//!   popular components, including the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response
//!   data.
//! * [validator] validates request data ahead of the executors.
//! * [Prometheus](prometheus) exposes request, cache and engine metrics.

pub mod app;
pub mod app_state;
pub mod cache;
pub mod cli;
pub mod condition;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod projects;
pub mod queries;
pub mod server;
pub mod table;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
pub mod widgets;
