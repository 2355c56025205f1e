//! Capabilities and producer→consumer relationships
//!
//! A [`Capability`] is an abstract named permission (read objects, manage a
//! dataset). The [`ActionCatalog`] maps each capability to the exact backend
//! actions it requires and to how statements built from it must be scoped.
//! The catalog is data, not a `match`: a relationship can request a
//! capability the catalog has no entry for, and the synthesizer reports that
//! as an error instead of guessing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// An abstract named permission granted by a relationship
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Capability {
    /// Read objects and list the container
    ReadObjects,
    /// Write objects into the container
    WriteObjects,
    /// Query data through the lake's access-control layer
    CatalogAccess,
    /// Describe, update and delete a visualization data source
    ManageDataSource,
    /// Describe, update, delete and ingest a visualization dataset
    ManageDataSet,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadObjects => write!(f, "read-objects"),
            Self::WriteObjects => write!(f, "write-objects"),
            Self::CatalogAccess => write!(f, "catalog-access"),
            Self::ManageDataSource => write!(f, "manage-data-source"),
            Self::ManageDataSet => write!(f, "manage-data-set"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-objects" => Ok(Self::ReadObjects),
            "write-objects" => Ok(Self::WriteObjects),
            "catalog-access" => Ok(Self::CatalogAccess),
            "manage-data-source" => Ok(Self::ManageDataSource),
            "manage-data-set" => Ok(Self::ManageDataSet),
            other => Err(crate::Error::validation(format!(
                "unknown capability: {other}"
            ))),
        }
    }
}

/// How statements built from a capability reference their target resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Reference the resource itself
    Resource,
    /// Reference the container and its contained-object wildcard
    ResourceWithObjects,
    /// The backend action only accepts a global scope
    Global,
}

/// Action mapping for one capability
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilitySpec {
    /// Concrete backend actions the capability requires, nothing more
    pub actions: Vec<String>,
    /// Resource scoping rule for statements built from this capability
    pub scope: ScopeKind,
}

impl CapabilitySpec {
    fn new(scope: ScopeKind, actions: &[&str]) -> Self {
        Self {
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            scope,
        }
    }
}

/// Catalog of capability → action mappings
#[derive(Clone, Debug, Default)]
pub struct ActionCatalog {
    entries: BTreeMap<Capability, CapabilitySpec>,
}

impl ActionCatalog {
    /// Catalog with no entries; every lookup fails
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in mappings for the analytics-pipeline capabilities
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            Capability::ReadObjects,
            CapabilitySpec::new(
                ScopeKind::ResourceWithObjects,
                &["s3:GetObject", "s3:GetBucketLocation", "s3:ListBucket"],
            ),
        );
        entries.insert(
            Capability::WriteObjects,
            CapabilitySpec::new(
                ScopeKind::ResourceWithObjects,
                &[
                    "s3:PutObject",
                    "s3:AbortMultipartUpload",
                    "s3:ListBucketMultipartUploads",
                    "s3:ListMultipartUploadParts",
                ],
            ),
        );
        // GetDataAccess is only grantable globally; the capability itself
        // requires the wildcard, the synthesizer adds nothing beyond it.
        entries.insert(
            Capability::CatalogAccess,
            CapabilitySpec::new(ScopeKind::Global, &["lakeformation:GetDataAccess"]),
        );
        entries.insert(
            Capability::ManageDataSource,
            CapabilitySpec::new(
                ScopeKind::Resource,
                &[
                    "quicksight:DescribeDataSource",
                    "quicksight:DescribeDataSourcePermissions",
                    "quicksight:PassDataSource",
                    "quicksight:UpdateDataSource",
                    "quicksight:DeleteDataSource",
                    "quicksight:UpdateDataSourcePermissions",
                ],
            ),
        );
        entries.insert(
            Capability::ManageDataSet,
            CapabilitySpec::new(
                ScopeKind::Resource,
                &[
                    "quicksight:DescribeDataSet",
                    "quicksight:DescribeDataSetPermissions",
                    "quicksight:PassDataSet",
                    "quicksight:DescribeIngestion",
                    "quicksight:ListIngestions",
                    "quicksight:CreateIngestion",
                    "quicksight:CancelIngestion",
                    "quicksight:UpdateDataSet",
                    "quicksight:DeleteDataSet",
                    "quicksight:UpdateDataSetPermissions",
                ],
            ),
        );
        Self { entries }
    }

    /// Look up the spec for a capability
    pub fn get(&self, capability: Capability) -> Option<&CapabilitySpec> {
        self.entries.get(&capability)
    }
}

/// The identity a relationship grants access to
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrincipalRef {
    /// A declared resource node (e.g., a service role), by logical id
    Node(String),
    /// An identity outside the graph (e.g., the visualization user),
    /// passed through verbatim
    External(String),
}

impl PrincipalRef {
    /// Logical id of the principal node, if the principal is one
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Node(id) => Some(id),
            Self::External(_) => None,
        }
    }
}

impl std::fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node:{id}"),
            Self::External(identity) => write!(f, "external:{identity}"),
        }
    }
}

/// A (principal, resource, capability-set) access relationship
///
/// Read-only once created; consumed by the permission synthesizer at build
/// time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// Who gets access
    pub principal: PrincipalRef,
    /// Logical id of the resource being accessed
    pub resource: String,
    /// What the principal may do
    pub capabilities: BTreeSet<Capability>,
}

impl Relationship {
    /// Create a relationship from any iterable of capabilities
    pub fn new(
        principal: PrincipalRef,
        resource: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            principal,
            resource: resource.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }
}
