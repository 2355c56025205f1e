//! lakeform - resource composition core for analytics data-lake pipelines
//!
//! lakeform declares the interdependent resources of an analytics pipeline
//! (object storage, metadata catalog, crawler, access roles, query
//! workgroup, budget alarm, visualization data source/dataset), resolves
//! their cross-references, and emits an ordered plan for an external
//! materialization backend. The core performs no provider I/O: every error
//! is raised while the graph is being built, before any side effect is
//! attempted.
//!
//! # Architecture
//!
//! Composition flows leaf-first:
//! - names come from the [`name::NameAllocator`]
//! - the dataset schema comes from the [`schema::SchemaInferencer`]
//! - policy statements come from the [`policy::PermissionSynthesizer`]
//! - the [`graph::ResourceGraphBuilder`] threads upstream outputs into
//!   downstream declarations and orders everything topologically
//! - the [`pipeline::PipelineCompiler`] is the blueprint that wires the
//!   concrete pipeline together
//!
//! # Modules
//!
//! - [`capability`] - Capabilities, action catalog, relationships
//! - [`config`] - Pipeline configuration loaded from YAML
//! - [`error`] - Error types for graph construction
//! - [`graph`] - Resource graph declaration, ordering and resolution
//! - [`lifecycle`] - Teardown behavior and cleanup obligations
//! - [`materialize`] - Backend trait and node lifecycle phases
//! - [`name`] - Environment-scoped name allocation
//! - [`pipeline`] - The analytics pipeline blueprint
//! - [`plan`] - Plan rendering (YAML/JSON)
//! - [`policy`] - Policy statements and permission synthesis
//! - [`schema`] - Schema inference from sample artifacts

#![deny(missing_docs)]

pub mod capability;
pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod materialize;
pub mod name;
pub mod pipeline;
pub mod plan;
pub mod policy;
pub mod schema;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
