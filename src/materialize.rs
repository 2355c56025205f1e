//! The materialization boundary
//!
//! The core never talks to a provider. It hands a resolved [`ResourceGraph`]
//! to a [`Materializer`], which owns diffing against previously materialized
//! state, applying create/update/delete operations, and every
//! cancellation/timeout/retry concern. The core assumes the backend is
//! idempotent given an identical graph - which is why `build()` goes to such
//! lengths to be deterministic.

use serde::{Deserialize, Serialize};

use crate::graph::ResourceGraph;
use crate::Result;

/// Lifecycle phase of a resource node
///
/// The core only ever produces nodes in `Declared` or `Resolved`; the later
/// phases are owned and tracked by the materialization backend.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum NodePhase {
    /// Declared into a builder, references not yet resolved
    #[default]
    Declared,
    /// Fully resolved by `build()`
    Resolved,
    /// Created by the backend
    Materialized,
    /// Destroyed by the backend during teardown
    TornDown,
    /// Left in place by the backend per the node's lifecycle policy
    Retained,
}

impl std::fmt::Display for NodePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Declared => "declared",
            Self::Resolved => "resolved",
            Self::Materialized => "materialized",
            Self::TornDown => "tornDown",
            Self::Retained => "retained",
        };
        write!(f, "{s}")
    }
}

/// Provisioning backend that turns a resolved graph into real resources
///
/// Implementations must be idempotent for an identical graph: re-submitting
/// the same resolved graph must not recreate resources. Teardown honors each
/// node's lifecycle policy, in reverse creation order, running any
/// pre-teardown cleanup obligations first.
pub trait Materializer {
    /// Apply the graph: create or update every node, in order
    fn materialize(&mut self, graph: &ResourceGraph) -> Result<()>;

    /// Tear the graph down in reverse creation order
    fn teardown(&mut self, graph: &ResourceGraph) -> Result<()>;
}
