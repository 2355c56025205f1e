//! Plan rendering for the materialization backend
//!
//! A plan is the serialized form of a resolved [`ResourceGraph`]: ordered
//! nodes with resolved attributes, attached policies and lifecycle, plus the
//! output mapping for subsequent graph-building passes. Because `build()` is
//! deterministic, rendering the same declared graph twice produces
//! byte-identical plans - the backend can diff them textually.

use serde::{Deserialize, Serialize};

use crate::graph::ResourceGraph;
use crate::{Error, Result};

/// Serialization format for an emitted plan
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanFormat {
    /// YAML (default)
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

impl std::fmt::Display for PlanFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render a resolved graph as a plan document
pub fn render(graph: &ResourceGraph, format: PlanFormat) -> Result<String> {
    match format {
        PlanFormat::Yaml => {
            serde_yaml::to_string(graph).map_err(|e| Error::serialization(e.to_string()))
        }
        PlanFormat::Json => {
            serde_json::to_string_pretty(graph).map_err(|e| Error::serialization(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttrValue, ResourceGraphBuilder, ResourceKind, ResourceSpec};

    fn sample_builder() -> ResourceGraphBuilder {
        let mut builder = ResourceGraphBuilder::new("demo");
        builder
            .declare(
                ResourceSpec::new(ResourceKind::ObjectStore, "store", "demo-store")
                    .with_attr("versioned", true),
            )
            .unwrap();
        builder
            .declare(
                ResourceSpec::new(ResourceKind::CatalogDatabase, "database", "demo-db")
                    .with_attr("locationArn", AttrValue::arn_of("store")),
            )
            .unwrap();
        builder
    }

    #[test]
    fn test_yaml_plan_contains_resolved_values() {
        let graph = sample_builder().build().unwrap();
        let plan = render(&graph, PlanFormat::Yaml).unwrap();

        assert!(plan.contains("environment: demo"));
        assert!(plan.contains("logicalId: store"));
        assert!(plan.contains("arn:aws:s3:::demo-store"));
        // The reference was resolved, not emitted as a placeholder.
        assert!(!plan.contains("Ref"));
    }

    #[test]
    fn test_json_plan_round_trips_as_json() {
        let graph = sample_builder().build().unwrap();
        let plan = render(&graph, PlanFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&plan).unwrap();
        assert_eq!(value["environment"], "demo");
        assert_eq!(value["nodes"][0]["logicalId"], "store");
    }

    #[test]
    fn test_rendering_is_byte_stable_across_builds() {
        let builder = sample_builder();
        let first = render(&builder.build().unwrap(), PlanFormat::Yaml).unwrap();
        let second = render(&builder.build().unwrap(), PlanFormat::Yaml).unwrap();
        assert_eq!(first, second);
    }
}
