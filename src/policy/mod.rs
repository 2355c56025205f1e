//! Access policy statements for lakeform resources
//!
//! The [`PermissionSynthesizer`] turns declared relationships into minimal
//! [`PolicyStatement`]s: exactly the actions the requested capabilities
//! require, scoped to exactly the target resource (plus its contained-object
//! wildcard where the backend demands it, e.g. a container and
//! `container/*`).
//!
//! Relationships sharing a (principal, resource) pair are merged into one
//! statement whose action set is the union - the synthesizer never emits two
//! statements for the same pair.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{ActionCatalog, Relationship, ScopeKind};
use crate::{Error, Result};

/// Statement effect
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum Effect {
    /// Grant the listed actions
    #[default]
    Allow,
    /// Explicitly refuse the listed actions
    Deny,
}

/// One minimal access-policy statement
///
/// Produced by the synthesizer, never mutated afterwards. Attached to
/// exactly one node in the built graph: the principal node when the
/// principal is part of the graph, otherwise the target resource (whose
/// backend representation carries per-identity permissions).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    /// Allow or deny
    pub effect: Effect,
    /// Backend actions, sorted
    pub actions: BTreeSet<String>,
    /// ARN-like references the statement is scoped to, sorted
    pub resources: BTreeSet<String>,
    /// Identity reference of the principal being granted access
    pub principal: String,
}

/// Resolved facts about a grant target that synthesis needs
///
/// The builder produces these at build time, once names and ARNs exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantTarget {
    /// ARN of the resource the relationship grants access to
    pub arn: String,
    /// Rendered identity reference of the principal
    pub principal: String,
}

/// Synthesizes least-privilege statements from relationships
#[derive(Clone, Debug)]
pub struct PermissionSynthesizer {
    catalog: ActionCatalog,
}

impl Default for PermissionSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionSynthesizer {
    /// Synthesizer using the built-in action catalog
    pub fn new() -> Self {
        Self {
            catalog: ActionCatalog::builtin(),
        }
    }

    /// Synthesizer with a caller-supplied catalog
    pub fn with_catalog(catalog: ActionCatalog) -> Self {
        Self { catalog }
    }

    /// Synthesize the minimal statement for a single relationship
    ///
    /// Fails with [`Error::UnknownCapability`] when the catalog has no entry
    /// for a requested capability.
    pub fn synthesize(&self, relationship: &Relationship, target: &GrantTarget) -> Result<PolicyStatement> {
        let mut actions = BTreeSet::new();
        let mut resources = BTreeSet::new();

        for capability in &relationship.capabilities {
            let spec = self.catalog.get(*capability).ok_or_else(|| {
                Error::unknown_capability(capability.to_string(), relationship.resource.clone())
            })?;
            actions.extend(spec.actions.iter().cloned());
            match spec.scope {
                ScopeKind::Resource => {
                    resources.insert(target.arn.clone());
                }
                ScopeKind::ResourceWithObjects => {
                    resources.insert(target.arn.clone());
                    resources.insert(format!("{}/*", target.arn));
                }
                ScopeKind::Global => {
                    resources.insert("*".to_string());
                }
            }
        }

        debug!(
            principal = %target.principal,
            resource = %relationship.resource,
            actions = actions.len(),
            "synthesized policy statement"
        );

        Ok(PolicyStatement {
            effect: Effect::Allow,
            actions,
            resources,
            principal: target.principal.clone(),
        })
    }

    /// Synthesize statements for a set of relationships, merged
    ///
    /// Relationships sharing (principal, resource) collapse into one
    /// statement whose actions and resources are the unions. Output order is
    /// deterministic: sorted by (principal, resource).
    pub fn synthesize_all<'a>(
        &self,
        relationships: impl IntoIterator<Item = (&'a Relationship, GrantTarget)>,
    ) -> Result<Vec<(String, PolicyStatement)>> {
        let mut merged: BTreeMap<(String, String), PolicyStatement> = BTreeMap::new();

        for (relationship, target) in relationships {
            let statement = self.synthesize(relationship, &target)?;
            let key = (target.principal.clone(), relationship.resource.clone());
            match merged.get_mut(&key) {
                Some(existing) => {
                    existing.actions.extend(statement.actions);
                    existing.resources.extend(statement.resources);
                }
                None => {
                    merged.insert(key, statement);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|((_, resource), statement)| (resource, statement))
            .collect())
    }
}
