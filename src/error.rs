//! Error types for lakeform graph construction
//!
//! Every error is raised synchronously while the graph is being declared,
//! linked, or built - nothing is deferred to materialization time, so a graph
//! that builds cleanly is safe to hand to the backend. Each variant carries
//! the offending logical id or reference so the caller can fix the
//! declaration.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for lakeform operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A composed resource name violates its naming grammar
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The composed name that failed validation
        name: String,
        /// Why the grammar rejected it
        reason: String,
    },

    /// No sample artifact exists under the configured directory
    #[error("no sample artifact found under {root:?}")]
    NoArtifactFound {
        /// The directory that was searched
        root: PathBuf,
    },

    /// A sample artifact exists but contains no rows
    #[error("sample artifact {path:?} has no header row")]
    EmptyArtifact {
        /// The artifact that was empty
        path: PathBuf,
    },

    /// A relationship requested a capability with no action mapping
    #[error("unknown capability '{capability}' requested on '{resource}'")]
    UnknownCapability {
        /// The unmapped capability
        capability: String,
        /// Logical id of the resource the relationship targets
        resource: String,
    },

    /// A declaration would close a dependency cycle
    #[error("declaring '{logical_id}' closes a dependency cycle: {chain}")]
    CyclicDependency {
        /// The logical id whose declaration closed the cycle
        logical_id: String,
        /// The cycle, rendered as "a -> b -> a"
        chain: String,
    },

    /// A node or relationship references a logical id that was never declared
    #[error("'{referrer}' references undeclared resource '{target}'")]
    UnresolvedReference {
        /// Logical id (or relationship description) holding the reference
        referrer: String,
        /// The logical id that was never declared
        target: String,
    },

    /// Validation error for configuration or declarations
    #[error("validation error: {0}")]
    Validation(String),

    /// Failed to read a sample artifact or configuration file
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// The file being read
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an invalid-name error for the given composed name
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown-capability error
    pub fn unknown_capability(capability: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::UnknownCapability {
            capability: capability.into(),
            resource: resource.into(),
        }
    }

    /// Create an unresolved-reference error
    pub fn unresolved(referrer: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            referrer: referrer.into(),
            target: target.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
