//! Teardown lifecycle attached to every resource node
//!
//! The core never performs teardown itself. A [`LifecyclePolicy`] records what
//! the materialization backend must do when the graph is destroyed: whether
//! the resource goes away with the graph or is retained, and any cleanup the
//! backend must perform first (for example, emptying an object container;
//! most backends refuse to delete a non-empty one).

use serde::{Deserialize, Serialize};

/// What happens to a resource when the graph is torn down
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TeardownBehavior {
    /// Delete the resource together with the graph (default)
    #[default]
    Destroy,
    /// Leave the resource in place when the graph is torn down
    Retain,
}

impl std::fmt::Display for TeardownBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroy => write!(f, "destroy"),
            Self::Retain => write!(f, "retain"),
        }
    }
}

/// Advisory cleanup the backend must run before deleting a resource
///
/// These are instructions, not operations: the core records the obligation on
/// the node and the backend carries it out during teardown.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum CleanupAction {
    /// Delete every object in the container before deleting the container
    EmptyObjects,
    /// Recursively delete stored query results before deleting the workgroup
    PurgeQueryResults,
}

/// Teardown policy for a single resource node
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePolicy {
    /// Destroy or retain on graph teardown
    pub on_teardown: TeardownBehavior,
    /// Cleanup the backend must perform before deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_teardown: Option<CleanupAction>,
}

impl LifecyclePolicy {
    /// Policy that destroys the resource with the graph
    pub fn destroy() -> Self {
        Self {
            on_teardown: TeardownBehavior::Destroy,
            pre_teardown: None,
        }
    }

    /// Policy that retains the resource after graph teardown
    pub fn retain() -> Self {
        Self {
            on_teardown: TeardownBehavior::Retain,
            pre_teardown: None,
        }
    }

    /// Add a pre-teardown cleanup obligation
    pub fn with_cleanup(mut self, action: CleanupAction) -> Self {
        self.pre_teardown = Some(action);
        self
    }
}
