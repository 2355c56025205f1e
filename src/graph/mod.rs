//! Resource graph declaration, ordering and resolution
//!
//! The [`ResourceGraphBuilder`] is the orchestrator: resources are declared
//! into an arena in dependency order, downstream attributes reference
//! upstream outputs through deferred [`Reference`]s, and `build()` produces a
//! fully-resolved [`ResourceGraph`] for the materialization backend.
//!
//! Ordering is a topological sort over the union of explicit `depends_on`
//! edges and the edges implied by attribute references; ties break by
//! declaration order, so the creation order is stable. Cycles are rejected
//! eagerly - the `declare` call that closes a cycle fails, not a later
//! `build()`.
//!
//! `build()` is idempotent: it never mutates the builder, so calling it twice
//! on the same declared graph yields an identical result. That property is
//! what makes re-running provisioning against already-materialized resources
//! safe.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::capability::{Capability, PrincipalRef, Relationship};
use crate::lifecycle::LifecyclePolicy;
use crate::materialize::NodePhase;
use crate::policy::{GrantTarget, PermissionSynthesizer, PolicyStatement};
use crate::{Error, Result};

/// Index of a node in the builder's arena (declaration order)
pub type NodeId = usize;

/// The kinds of resource the analytics pipeline composes
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ResourceKind {
    /// Versioned object-storage container
    ObjectStore,
    /// Seed-data deployment job into an object store
    DataDeployment,
    /// Metadata catalog database
    CatalogDatabase,
    /// Assumable service role
    ServiceRole,
    /// Catalog crawler job
    Crawler,
    /// Lake-wide administrator settings
    LakeSettings,
    /// Registration of a storage location with the lake
    LakeLocation,
    /// Query workgroup
    QueryWorkgroup,
    /// Monthly cost budget alarm
    BudgetAlarm,
    /// Visualization data source
    VisDataSource,
    /// Visualization dataset
    VisDataSet,
}

impl ResourceKind {
    /// ARN-like reference for a resource of this kind with the given name
    ///
    /// These are identifier-derived references the backend maps onto real
    /// provider identifiers; what matters to the core is that they are a
    /// deterministic function of (kind, name).
    pub fn arn(&self, name: &str) -> String {
        match self {
            Self::ObjectStore => format!("arn:aws:s3:::{name}"),
            Self::DataDeployment => format!("arn:aws:deployment:::{name}"),
            Self::CatalogDatabase => format!("arn:aws:glue:::database/{name}"),
            Self::ServiceRole => format!("arn:aws:iam:::role/{name}"),
            Self::Crawler => format!("arn:aws:glue:::crawler/{name}"),
            Self::LakeSettings => format!("arn:aws:lakeformation:::settings/{name}"),
            Self::LakeLocation => format!("arn:aws:lakeformation:::resource/{name}"),
            Self::QueryWorkgroup => format!("arn:aws:athena:::workgroup/{name}"),
            Self::BudgetAlarm => format!("arn:aws:budgets:::budget/{name}"),
            Self::VisDataSource => format!("arn:aws:quicksight:::datasource/{name}"),
            Self::VisDataSet => format!("arn:aws:quicksight:::dataset/{name}"),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ObjectStore => "object-store",
            Self::DataDeployment => "data-deployment",
            Self::CatalogDatabase => "catalog-database",
            Self::ServiceRole => "service-role",
            Self::Crawler => "crawler",
            Self::LakeSettings => "lake-settings",
            Self::LakeLocation => "lake-location",
            Self::QueryWorkgroup => "query-workgroup",
            Self::BudgetAlarm => "budget-alarm",
            Self::VisDataSource => "vis-data-source",
            Self::VisDataSet => "vis-data-set",
        };
        write!(f, "{s}")
    }
}

/// Which output of an upstream node a reference resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    /// The node's environment-scoped name
    Name,
    /// The node's ARN-like reference
    Arn,
}

/// Deferred reference to an upstream node's output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Logical id of the upstream node
    pub target: String,
    /// Which output to take
    pub output: Output,
}

/// An attribute value: a literal, a deferred reference, or a tree of both
///
/// References stay unresolved until `build()`, when a single pass replaces
/// each with the target node's output. A reference to a node that is never
/// declared fails the build.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// Literal JSON value
    Value(Value),
    /// Deferred reference to an upstream output
    Ref(Reference),
    /// List of attribute values
    List(Vec<AttrValue>),
    /// Nested mapping of attribute values
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Deferred reference to `target`'s environment-scoped name
    pub fn name_of(target: impl Into<String>) -> Self {
        Self::Ref(Reference {
            target: target.into(),
            output: Output::Name,
        })
    }

    /// Deferred reference to `target`'s ARN
    pub fn arn_of(target: impl Into<String>) -> Self {
        Self::Ref(Reference {
            target: target.into(),
            output: Output::Arn,
        })
    }

    /// List of attribute values
    pub fn list(items: impl IntoIterator<Item = AttrValue>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Nested mapping of attribute values
    pub fn map(entries: impl IntoIterator<Item = (&'static str, AttrValue)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Value(_) => {}
            Self::Ref(reference) => out.push(reference),
            Self::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_refs(out)),
        }
    }

    fn resolve(&self, lookup: &dyn Fn(&Reference) -> Value) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Ref(reference) => lookup(reference),
            Self::List(items) => Value::Array(items.iter().map(|v| v.resolve(lookup)).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve(lookup)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Declaration input for one resource
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSpec {
    /// Resource kind
    pub kind: ResourceKind,
    /// Graph-unique identity
    pub logical_id: String,
    /// Environment-scoped name (from the name allocator)
    pub name: String,
    /// Attribute tree, possibly holding deferred references
    pub attributes: BTreeMap<String, AttrValue>,
    /// Explicit ordering constraints the backend cannot infer from references
    pub depends_on: Vec<String>,
    /// Teardown policy
    pub lifecycle: LifecyclePolicy,
}

impl ResourceSpec {
    /// Start a declaration
    pub fn new(kind: ResourceKind, logical_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            logical_id: logical_id.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
            lifecycle: LifecyclePolicy::default(),
        }
    }

    /// Set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add an explicit ordering constraint on another node
    pub fn with_dependency(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Set the teardown policy
    pub fn with_lifecycle(mut self, lifecycle: LifecyclePolicy) -> Self {
        self.lifecycle = lifecycle;
        self
    }
}

/// A declared node in the builder's arena
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNode {
    /// Resource kind
    pub kind: ResourceKind,
    /// Graph-unique identity
    pub logical_id: String,
    /// Environment-scoped name
    pub name: String,
    /// Unresolved attribute tree
    pub attributes: BTreeMap<String, AttrValue>,
    /// Explicit ordering constraints
    pub depends_on: Vec<String>,
    /// Teardown policy
    pub lifecycle: LifecyclePolicy,
}

impl ResourceNode {
    /// ARN-like reference derived from this node's kind and name
    pub fn arn(&self) -> String {
        self.kind.arn(&self.name)
    }

    /// All logical ids this node must be ordered after: explicit dependencies
    /// plus the targets of its attribute references
    fn ordering_targets(&self) -> BTreeSet<&str> {
        let mut targets: BTreeSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        let mut refs = Vec::new();
        for value in self.attributes.values() {
            value.collect_refs(&mut refs);
        }
        targets.extend(refs.iter().map(|r| r.target.as_str()));
        targets
    }
}

/// A fully resolved node, ready for materialization
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedNode {
    /// Resource kind
    pub kind: ResourceKind,
    /// Graph-unique identity
    pub logical_id: String,
    /// Environment-scoped name
    pub name: String,
    /// ARN-like reference
    pub arn: String,
    /// Attributes with every reference replaced by its target's output
    pub attributes: BTreeMap<String, Value>,
    /// Explicit ordering constraints, as declared
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Statements granting this node (as principal) access elsewhere
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_statements: Vec<PolicyStatement>,
    /// Per-identity permissions carried on this node (external principals)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PolicyStatement>,
    /// Teardown policy
    pub lifecycle: LifecyclePolicy,
    /// Lifecycle phase; always `Resolved` in a built graph
    pub phase: NodePhase,
}

/// The resolved resource graph handed to the materialization backend
///
/// `nodes` is in safe creation order; teardown is the reverse.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraph {
    /// Deployment environment the graph is scoped to
    pub environment: String,
    /// Resolved nodes in creation order
    pub nodes: Vec<ResolvedNode>,
    /// logical id → resolved attribute bag (name, ARN, attributes) for
    /// consumption by subsequent graph-building passes
    pub outputs: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ResourceGraph {
    /// Look up a resolved node by logical id
    pub fn node(&self, logical_id: &str) -> Option<&ResolvedNode> {
        self.nodes.iter().find(|n| n.logical_id == logical_id)
    }

    /// Logical ids in safe teardown order (reverse of creation order)
    pub fn teardown_order(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .rev()
            .map(|n| n.logical_id.as_str())
            .collect()
    }
}

/// Builds a resource graph by declaration
///
/// One builder owns exclusive mutable access to its arena; graph building is
/// single-threaded because declaration order is semantic (it breaks ordering
/// ties).
#[derive(Clone, Debug)]
pub struct ResourceGraphBuilder {
    environment: String,
    nodes: Vec<ResourceNode>,
    index: BTreeMap<String, NodeId>,
    relationships: Vec<Relationship>,
    synthesizer: PermissionSynthesizer,
}

impl ResourceGraphBuilder {
    /// Builder for the given environment, using the built-in action catalog
    pub fn new(environment: impl Into<String>) -> Self {
        Self::with_synthesizer(environment, PermissionSynthesizer::new())
    }

    /// Builder with a caller-supplied permission synthesizer
    pub fn with_synthesizer(
        environment: impl Into<String>,
        synthesizer: PermissionSynthesizer,
    ) -> Self {
        Self {
            environment: environment.into(),
            nodes: Vec::new(),
            index: BTreeMap::new(),
            relationships: Vec::new(),
            synthesizer,
        }
    }

    /// The environment this builder is scoped to
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Declare a resource
    ///
    /// Fails if the logical id is already taken, or if the declaration
    /// closes a dependency cycle - the cycle is rejected here, eagerly, so a
    /// bad blueprint fails at the offending declaration rather than at
    /// `build()`.
    pub fn declare(&mut self, spec: ResourceSpec) -> Result<NodeId> {
        if self.index.contains_key(&spec.logical_id) {
            return Err(Error::validation(format!(
                "duplicate logical id '{}'",
                spec.logical_id
            )));
        }

        let node = ResourceNode {
            kind: spec.kind,
            logical_id: spec.logical_id,
            name: spec.name,
            attributes: spec.attributes,
            depends_on: spec.depends_on,
            lifecycle: spec.lifecycle,
        };

        if let Some(chain) = self.cycle_chain(&node) {
            return Err(Error::CyclicDependency {
                logical_id: node.logical_id,
                chain,
            });
        }

        debug!(
            logical_id = %node.logical_id,
            kind = %node.kind,
            name = %node.name,
            "declared resource"
        );

        let id = self.nodes.len();
        self.index.insert(node.logical_id.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Record an access relationship between a principal and a resource
    ///
    /// Relationships are validated and synthesized into policy statements at
    /// `build()`; linking a resource that is never declared fails the build.
    pub fn link(
        &mut self,
        principal: PrincipalRef,
        resource: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) {
        let relationship = Relationship::new(principal, resource, capabilities);
        debug!(
            principal = %relationship.principal,
            resource = %relationship.resource,
            "linked relationship"
        );
        self.relationships.push(relationship);
    }

    /// Replace the teardown policy of an already-declared node
    pub fn attach_lifecycle(&mut self, logical_id: &str, lifecycle: LifecyclePolicy) -> Result<()> {
        let id = self
            .index
            .get(logical_id)
            .copied()
            .ok_or_else(|| Error::unresolved("lifecycle attachment", logical_id))?;
        self.nodes[id].lifecycle = lifecycle;
        Ok(())
    }

    /// Resolve the declared graph
    ///
    /// Validates every reference, orders nodes topologically (declaration
    /// order breaks ties), resolves deferred attribute references in a
    /// single pass, synthesizes merged policy statements, and returns the
    /// graph. Takes `&self`: building twice without new declarations yields
    /// an identical graph.
    pub fn build(&self) -> Result<ResourceGraph> {
        self.check_references()?;

        let order = self.creation_order()?;

        // Policy synthesis. Statements for in-graph principals hang off the
        // principal node; statements for external identities hang off the
        // resource node, whose backend representation carries per-identity
        // permissions.
        let mut policy_statements: BTreeMap<NodeId, Vec<PolicyStatement>> = BTreeMap::new();
        let mut permissions: BTreeMap<NodeId, Vec<PolicyStatement>> = BTreeMap::new();

        let mut node_rels: BTreeMap<(String, String), Relationship> = BTreeMap::new();
        let mut external: Vec<(&Relationship, GrantTarget)> = Vec::new();
        for relationship in &self.relationships {
            let target_node = &self.nodes[self.index[&relationship.resource]];
            match &relationship.principal {
                PrincipalRef::Node(principal_id) => {
                    let key = (principal_id.clone(), relationship.resource.clone());
                    node_rels
                        .entry(key)
                        .and_modify(|merged| {
                            merged.capabilities.extend(relationship.capabilities.iter().copied());
                        })
                        .or_insert_with(|| relationship.clone());
                }
                PrincipalRef::External(identity) => {
                    external.push((
                        relationship,
                        GrantTarget {
                            arn: target_node.arn(),
                            principal: identity.clone(),
                        },
                    ));
                }
            }
        }

        for ((principal_id, _), relationship) in &node_rels {
            let principal_node = &self.nodes[self.index[principal_id]];
            let target_node = &self.nodes[self.index[&relationship.resource]];
            let statement = self.synthesizer.synthesize(
                relationship,
                &GrantTarget {
                    arn: target_node.arn(),
                    principal: principal_node.arn(),
                },
            )?;
            policy_statements
                .entry(self.index[principal_id])
                .or_default()
                .push(statement);
        }

        for (resource_id, statement) in self.synthesizer.synthesize_all(external)? {
            permissions
                .entry(self.index[&resource_id])
                .or_default()
                .push(statement);
        }

        // Reference resolution. Outputs are intrinsic to each node (name is
        // declared, ARN is derived), so one pass suffices.
        let lookup = |reference: &Reference| -> Value {
            let target = &self.nodes[self.index[&reference.target]];
            match reference.output {
                Output::Name => Value::String(target.name.clone()),
                Output::Arn => Value::String(target.arn()),
            }
        };

        let mut nodes = Vec::with_capacity(order.len());
        let mut outputs = BTreeMap::new();
        for id in order {
            let node = &self.nodes[id];
            let attributes: BTreeMap<String, Value> = node
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.resolve(&lookup)))
                .collect();

            let mut bag = attributes.clone();
            bag.insert("name".to_string(), Value::String(node.name.clone()));
            bag.insert("arn".to_string(), Value::String(node.arn()));
            outputs.insert(node.logical_id.clone(), bag);

            nodes.push(ResolvedNode {
                kind: node.kind,
                logical_id: node.logical_id.clone(),
                name: node.name.clone(),
                arn: node.arn(),
                attributes,
                depends_on: node.depends_on.clone(),
                policy_statements: policy_statements.remove(&id).unwrap_or_default(),
                permissions: permissions.remove(&id).unwrap_or_default(),
                lifecycle: node.lifecycle,
                phase: NodePhase::Resolved,
            });
        }

        debug!(environment = %self.environment, nodes = nodes.len(), "built resource graph");

        Ok(ResourceGraph {
            environment: self.environment.clone(),
            nodes,
            outputs,
        })
    }

    /// Fail on any reference to a logical id that was never declared
    fn check_references(&self) -> Result<()> {
        for node in &self.nodes {
            for dep in &node.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(Error::unresolved(node.logical_id.as_str(), dep.as_str()));
                }
            }
            let mut refs = Vec::new();
            for value in node.attributes.values() {
                value.collect_refs(&mut refs);
            }
            for reference in refs {
                if !self.index.contains_key(&reference.target) {
                    return Err(Error::unresolved(
                        node.logical_id.as_str(),
                        reference.target.as_str(),
                    ));
                }
            }
        }
        for relationship in &self.relationships {
            if !self.index.contains_key(&relationship.resource) {
                return Err(Error::unresolved(
                    format!("relationship for {}", relationship.principal),
                    relationship.resource.as_str(),
                ));
            }
            if let Some(principal_id) = relationship.principal.node_id() {
                if !self.index.contains_key(principal_id) {
                    return Err(Error::unresolved(
                        format!("relationship on '{}'", relationship.resource),
                        principal_id,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Topological creation order; declaration order breaks ties
    fn creation_order(&self) -> Result<Vec<NodeId>> {
        let mut indegree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];

        for (id, node) in self.nodes.iter().enumerate() {
            for target in node.ordering_targets() {
                let target_id = self.index[target];
                indegree[id] += 1;
                dependents[target_id].push(id);
            }
        }

        let mut ready: BTreeSet<NodeId> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.iter().next().copied() {
            ready.remove(&id);
            order.push(id);
            for &dependent in &dependents[id] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        // Declares reject cycles eagerly, so leftovers here would mean the
        // eager check has a hole. Fail loudly rather than emit a bad order.
        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(id, _)| !order.contains(id))
                .map(|(_, n)| n.logical_id.as_str())
                .collect();
            return Err(Error::CyclicDependency {
                logical_id: stuck.first().copied().unwrap_or_default().to_string(),
                chain: stuck.join(" -> "),
            });
        }

        Ok(order)
    }

    /// If declaring `candidate` would close a cycle, render it as
    /// `"a -> b -> a"`
    fn cycle_chain(&self, candidate: &ResourceNode) -> Option<String> {
        let goal = candidate.logical_id.as_str();
        let mut visited = BTreeSet::new();
        let mut path = vec![goal.to_string()];
        if self.dfs_reaches(candidate, goal, goal, &mut visited, &mut path) {
            Some(path.join(" -> "))
        } else {
            None
        }
    }

    fn dfs_reaches(
        &self,
        candidate: &ResourceNode,
        from: &str,
        goal: &str,
        visited: &mut BTreeSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        let targets: Vec<String> = if from == candidate.logical_id {
            candidate.ordering_targets().iter().map(|s| (*s).to_string()).collect()
        } else if let Some(&id) = self.index.get(from) {
            self.nodes[id]
                .ordering_targets()
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        } else {
            // Undeclared target: no outgoing edges yet
            Vec::new()
        };

        for target in targets {
            if target == goal {
                path.push(target);
                return true;
            }
            if visited.insert(target.clone()) {
                path.push(target.clone());
                if self.dfs_reaches(candidate, &target, goal, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CleanupAction, TeardownBehavior};

    fn store(id: &str) -> ResourceSpec {
        ResourceSpec::new(ResourceKind::ObjectStore, id, format!("demo-{id}"))
    }

    fn role(id: &str) -> ResourceSpec {
        ResourceSpec::new(ResourceKind::ServiceRole, id, format!("demo-{id}"))
    }

    // =========================================================================
    // Declaration and Ordering
    // =========================================================================

    #[test]
    fn test_declaration_order_breaks_ties() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store-b")).unwrap();
        builder.declare(store("store-a")).unwrap();
        builder.declare(store("store-c")).unwrap();

        let graph = builder.build().unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.logical_id.as_str()).collect();
        // All independent: creation order is declaration order, not name order.
        assert_eq!(ids, vec!["store-b", "store-a", "store-c"]);
    }

    #[test]
    fn test_dependencies_order_before_dependents_regardless_of_declaration() {
        let mut builder = ResourceGraphBuilder::new("demo");
        // Declared out of order: the dependent first.
        builder
            .declare(store("derived").with_dependency("base"))
            .unwrap();
        builder.declare(store("base")).unwrap();

        let graph = builder.build().unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["base", "derived"]);
    }

    #[test]
    fn test_attribute_references_imply_ordering() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(
                ResourceSpec::new(ResourceKind::Crawler, "crawler", "demo-crawler")
                    .with_attr("targetPath", AttrValue::name_of("store")),
            )
            .unwrap();
        builder.declare(store("store")).unwrap();

        let graph = builder.build().unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["store", "crawler"]);
    }

    #[test]
    fn test_duplicate_logical_id_is_rejected() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        let err = builder.declare(store("store")).unwrap_err();
        assert!(err.to_string().contains("duplicate logical id 'store'"));
    }

    // =========================================================================
    // Cycle Rejection
    // =========================================================================

    #[test]
    fn test_declare_that_closes_cycle_fails_eagerly() {
        let mut builder = ResourceGraphBuilder::new("demo");
        // Forward reference is fine on its own...
        builder.declare(store("a").with_dependency("b")).unwrap();
        // ...but the declaration that closes the loop is rejected.
        let err = builder.declare(store("b").with_dependency("a")).unwrap_err();
        match err {
            Error::CyclicDependency { logical_id, chain } => {
                assert_eq!(logical_id, "b");
                assert_eq!(chain, "b -> a -> b");
            }
            other => panic!("expected CyclicDependency, got {other}"),
        }
        // The rejected declaration must not land in the arena.
        assert!(builder.build().is_err()); // 'a' still dangles on 'b'
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut builder = ResourceGraphBuilder::new("demo");
        let err = builder
            .declare(store("selfish").with_dependency("selfish"))
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn test_cycle_through_attribute_reference_is_caught() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(store("a").with_attr("peer", AttrValue::arn_of("b")))
            .unwrap();
        let err = builder
            .declare(store("b").with_attr("peer", AttrValue::arn_of("a")))
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn test_longer_cycle_chain_is_reported() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("a").with_dependency("b")).unwrap();
        builder.declare(store("b").with_dependency("c")).unwrap();
        let err = builder.declare(store("c").with_dependency("a")).unwrap_err();
        match err {
            Error::CyclicDependency { chain, .. } => {
                assert_eq!(chain, "c -> a -> b -> c");
            }
            other => panic!("expected CyclicDependency, got {other}"),
        }
    }

    // =========================================================================
    // Reference Resolution
    // =========================================================================

    #[test]
    fn test_deferred_arn_reference_resolves_to_upstream_arn() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        builder
            .declare(
                ResourceSpec::new(ResourceKind::LakeLocation, "location", "demo-location")
                    .with_attr("resourceArn", AttrValue::arn_of("store")),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let location = graph.node("location").unwrap();
        assert_eq!(
            location.attributes["resourceArn"],
            Value::String("arn:aws:s3:::demo-store".to_string())
        );
    }

    #[test]
    fn test_references_resolve_inside_nested_attributes() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        builder.declare(role("admin-role")).unwrap();
        builder
            .declare(
                ResourceSpec::new(ResourceKind::LakeSettings, "settings", "demo-settings")
                    .with_attr(
                        "admins",
                        AttrValue::list([AttrValue::arn_of("admin-role")]),
                    )
                    .with_attr(
                        "location",
                        AttrValue::map([("storeArn", AttrValue::arn_of("store"))]),
                    ),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let settings = graph.node("settings").unwrap();
        assert_eq!(
            settings.attributes["admins"],
            serde_json::json!(["arn:aws:iam:::role/demo-admin-role"])
        );
        assert_eq!(
            settings.attributes["location"],
            serde_json::json!({"storeArn": "arn:aws:s3:::demo-store"})
        );
    }

    #[test]
    fn test_reference_to_undeclared_node_fails_build() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(store("c").with_attr("peer", AttrValue::arn_of("d")))
            .unwrap();

        let err = builder.build().unwrap_err();
        match err {
            Error::UnresolvedReference { referrer, target } => {
                assert_eq!(referrer, "c");
                assert_eq!(target, "d");
            }
            other => panic!("expected UnresolvedReference, got {other}"),
        }
    }

    #[test]
    fn test_dangling_explicit_dependency_fails_build() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("c").with_dependency("ghost")).unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert!(err.to_string().contains("'ghost'"));
    }

    // =========================================================================
    // Idempotent Build
    // =========================================================================

    #[test]
    fn test_build_twice_yields_identical_graphs() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        builder.declare(role("crawler-role")).unwrap();
        builder
            .declare(
                ResourceSpec::new(ResourceKind::Crawler, "crawler", "demo-crawler-abcd")
                    .with_attr("role", AttrValue::arn_of("crawler-role"))
                    .with_attr("targetPath", AttrValue::name_of("store")),
            )
            .unwrap();
        builder.link(
            PrincipalRef::Node("crawler-role".to_string()),
            "store",
            [Capability::ReadObjects, Capability::WriteObjects],
        );

        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first, second);

        // Byte-identical once serialized, which is what the backend diffs.
        let first_yaml = serde_yaml::to_string(&first).unwrap();
        let second_yaml = serde_yaml::to_string(&second).unwrap();
        assert_eq!(first_yaml, second_yaml);
    }

    // =========================================================================
    // Policy Attachment
    // =========================================================================

    #[test]
    fn test_node_principal_statements_attach_to_principal() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        builder.declare(role("crawler-role")).unwrap();
        builder.link(
            PrincipalRef::Node("crawler-role".to_string()),
            "store",
            [Capability::ReadObjects],
        );
        builder.link(
            PrincipalRef::Node("crawler-role".to_string()),
            "store",
            [Capability::WriteObjects],
        );

        let graph = builder.build().unwrap();
        let role = graph.node("crawler-role").unwrap();
        // Merged: one statement with the union of actions.
        assert_eq!(role.policy_statements.len(), 1);
        let statement = &role.policy_statements[0];
        assert!(statement.actions.contains("s3:GetObject"));
        assert!(statement.actions.contains("s3:PutObject"));
        assert_eq!(statement.principal, "arn:aws:iam:::role/demo-crawler-role");
        assert!(graph.node("store").unwrap().policy_statements.is_empty());
    }

    #[test]
    fn test_external_principal_statements_attach_to_resource() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(ResourceSpec::new(
                ResourceKind::VisDataSource,
                "vis-data-source",
                "demo-source",
            ))
            .unwrap();
        builder.link(
            PrincipalRef::External("analyst@example.com".to_string()),
            "vis-data-source",
            [Capability::ManageDataSource],
        );

        let graph = builder.build().unwrap();
        let source = graph.node("vis-data-source").unwrap();
        assert_eq!(source.permissions.len(), 1);
        assert_eq!(source.permissions[0].principal, "analyst@example.com");
        assert!(source.policy_statements.is_empty());
    }

    #[test]
    fn test_link_to_undeclared_resource_fails_build() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(role("crawler-role")).unwrap();
        builder.link(
            PrincipalRef::Node("crawler-role".to_string()),
            "ghost-store",
            [Capability::ReadObjects],
        );

        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert!(err.to_string().contains("'ghost-store'"));
    }

    // =========================================================================
    // Lifecycle and Outputs
    // =========================================================================

    #[test]
    fn test_attach_lifecycle_overrides_declared_policy() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        builder
            .attach_lifecycle(
                "store",
                LifecyclePolicy::retain().with_cleanup(CleanupAction::EmptyObjects),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let node = graph.node("store").unwrap();
        assert_eq!(node.lifecycle.on_teardown, TeardownBehavior::Retain);
        assert_eq!(node.lifecycle.pre_teardown, Some(CleanupAction::EmptyObjects));
    }

    #[test]
    fn test_attach_lifecycle_to_unknown_node_fails() {
        let mut builder = ResourceGraphBuilder::new("demo");
        let err = builder
            .attach_lifecycle("ghost", LifecyclePolicy::retain())
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_outputs_expose_name_arn_and_attributes() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(store("store").with_attr("versioned", true))
            .unwrap();

        let graph = builder.build().unwrap();
        let bag = &graph.outputs["store"];
        assert_eq!(bag["name"], Value::String("demo-store".to_string()));
        assert_eq!(bag["arn"], Value::String("arn:aws:s3:::demo-store".to_string()));
        assert_eq!(bag["versioned"], Value::Bool(true));
    }

    #[test]
    fn test_teardown_order_is_reverse_of_creation() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("base")).unwrap();
        builder
            .declare(store("derived").with_dependency("base"))
            .unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.teardown_order(), vec!["derived", "base"]);
    }

    #[test]
    fn test_every_built_node_is_in_resolved_phase() {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder.declare(store("store")).unwrap();
        let graph = builder.build().unwrap();
        assert!(graph.nodes.iter().all(|n| n.phase == NodePhase::Resolved));
    }
}
