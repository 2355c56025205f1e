//! Analytics pipeline blueprint
//!
//! This module composes the full pipeline through the graph builder: object
//! store with seed data, catalog database and crawler, lake access-control
//! registrations, query workgroup, monthly budget alarm, and the
//! visualization data source/dataset pair. It is the one place that knows
//! which resources exist and how they reference each other; everything
//! mechanical (ordering, resolution, policy synthesis) lives in the builder.
//!
//! The inferred [`TableSchema`] must be in hand before composition - the
//! dataset declaration embeds it - which is the join point between schema
//! inference and graph building.

use serde_json::json;
use tracing::info;

use crate::capability::{Capability, PrincipalRef};
use crate::config::PipelineConfig;
use crate::graph::{
    AttrValue, ResourceGraph, ResourceGraphBuilder, ResourceKind, ResourceSpec,
};
use crate::lifecycle::{CleanupAction, LifecyclePolicy};
use crate::name::{NameAllocator, NameGrammar, TokenSource};
use crate::schema::TableSchema;
use crate::Result;

/// Logical ids of the blueprint's resources
pub mod ids {
    /// Object-store container holding the lake data
    pub const STORE: &str = "store";
    /// Seed-data deployment into the store
    pub const SEED_DATA: &str = "seed-data";
    /// Catalog database
    pub const DATABASE: &str = "database";
    /// Crawler service role
    pub const CRAWLER_ROLE: &str = "crawler-role";
    /// Catalog crawler
    pub const CRAWLER: &str = "crawler";
    /// Lake administrator settings
    pub const LAKE_SETTINGS: &str = "lake-settings";
    /// Lake registration of the store location
    pub const LAKE_LOCATION: &str = "lake-location";
    /// Query workgroup
    pub const WORKGROUP: &str = "workgroup";
    /// Monthly budget alarm
    pub const BUDGET: &str = "budget";
    /// Visualization access role
    pub const VIS_ROLE: &str = "vis-role";
    /// Visualization data source
    pub const VIS_DATA_SOURCE: &str = "vis-data-source";
    /// Visualization dataset
    pub const VIS_DATASET: &str = "vis-dataset";
}

/// Composes the analytics pipeline into a resource graph
pub struct PipelineCompiler<'a> {
    config: &'a PipelineConfig,
    schema: &'a TableSchema,
}

impl<'a> PipelineCompiler<'a> {
    /// Compiler over a validated config and an inferred schema
    pub fn new(config: &'a PipelineConfig, schema: &'a TableSchema) -> Self {
        Self { config, schema }
    }

    /// Compose and build the full pipeline graph
    pub fn compile<S: TokenSource>(
        &self,
        allocator: &mut NameAllocator<S>,
    ) -> Result<ResourceGraph> {
        let mut builder = ResourceGraphBuilder::new(self.config.environment.as_str());
        self.compose(&mut builder, allocator)?;
        builder.build()
    }

    /// Declare every pipeline resource into the given builder
    ///
    /// Split from [`compile`](Self::compile) so callers can layer further
    /// declarations before building, or build the same composition twice.
    pub fn compose<S: TokenSource>(
        &self,
        builder: &mut ResourceGraphBuilder,
        allocator: &mut NameAllocator<S>,
    ) -> Result<()> {
        let env = &self.config.environment;

        // Object store: versioned, encrypted, emptied before deletion so
        // teardown of a non-empty container cannot wedge.
        let store_name =
            allocator.allocate(env, &self.config.store_name, &NameGrammar::object_store(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::ObjectStore, ids::STORE, store_name)
                .with_attr("versioned", true)
                .with_attr("encryption", "managed")
                .with_lifecycle(LifecyclePolicy::destroy().with_cleanup(CleanupAction::EmptyObjects)),
        )?;

        // Seed-data deployment into the store.
        let seed_name = allocator.allocate(env, "seed-data", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::DataDeployment, ids::SEED_DATA, seed_name)
                .with_attr("source", self.config.sample_data_dir.display().to_string())
                .with_attr("destination", AttrValue::name_of(ids::STORE)),
        )?;

        // Catalog database the crawler populates.
        let database_name =
            allocator.allocate(env, &self.config.database_name, &NameGrammar::catalog(), false)?;
        builder.declare(ResourceSpec::new(
            ResourceKind::CatalogDatabase,
            ids::DATABASE,
            database_name,
        ))?;

        // Crawler service role, granted exactly what crawling requires.
        let role_name =
            allocator.allocate(env, &self.config.crawler_role_name, &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::ServiceRole, ids::CRAWLER_ROLE, role_name)
                .with_attr("assumePrincipal", "glue.amazonaws.com")
                .with_attr(
                    "managedPolicies",
                    json!(["arn:aws:iam::aws:policy/service-role/AWSGlueServiceRole"]),
                ),
        )?;
        builder.link(
            PrincipalRef::Node(ids::CRAWLER_ROLE.to_string()),
            ids::STORE,
            [Capability::ReadObjects, Capability::WriteObjects],
        );

        // The crawler must be replaced, not updated, on redeploy - its name
        // is disambiguated, which intentionally breaks name idempotence for
        // this one resource.
        let crawler_name =
            allocator.allocate(env, &self.config.crawler_name, &NameGrammar::catalog(), true)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::Crawler, ids::CRAWLER, crawler_name)
                .with_attr("database", AttrValue::name_of(ids::DATABASE))
                .with_attr("role", AttrValue::arn_of(ids::CRAWLER_ROLE))
                .with_attr("targetPath", AttrValue::name_of(ids::STORE)),
        )?;

        // Lake access control: admin settings and the store's location
        // registration.
        let settings_name = allocator.allocate(env, "lake-settings", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::LakeSettings, ids::LAKE_SETTINGS, settings_name)
                .with_attr("admins", AttrValue::list([AttrValue::arn_of(ids::CRAWLER_ROLE)])),
        )?;

        let location_name = allocator.allocate(env, "lake-location", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::LakeLocation, ids::LAKE_LOCATION, location_name)
                .with_attr("resourceArn", AttrValue::arn_of(ids::STORE))
                .with_attr("useServiceLinkedRole", true),
        )?;
        builder.link(
            PrincipalRef::Node(ids::CRAWLER_ROLE.to_string()),
            ids::LAKE_LOCATION,
            [Capability::CatalogAccess],
        );

        // Query workgroup writing results back into the store.
        let workgroup_name =
            allocator.allocate(env, "datalake-workgroup", &NameGrammar::workgroup(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::QueryWorkgroup, ids::WORKGROUP, workgroup_name)
                .with_attr("state", "ENABLED")
                .with_attr("publishMetrics", true)
                .with_attr("requesterPays", false)
                .with_attr("resultsStore", AttrValue::name_of(ids::STORE))
                .with_attr("resultsPrefix", "athena-results/")
                .with_lifecycle(
                    LifecyclePolicy::destroy().with_cleanup(CleanupAction::PurgeQueryResults),
                ),
        )?;

        // Monthly cost budget with an email subscriber at 100% of actual
        // spend. Email and limit are opaque pass-throughs from config.
        let budget_name = allocator.allocate(env, "monthly-budget", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::BudgetAlarm, ids::BUDGET, budget_name)
                .with_attr("budgetType", "COST")
                .with_attr("timeUnit", "MONTHLY")
                .with_attr("limitUsd", self.config.monthly_budget_usd)
                .with_attr("notificationType", "ACTUAL")
                .with_attr("comparisonOperator", "GREATER_THAN")
                .with_attr("thresholdPercent", 100.0)
                .with_attr("subscriberEmail", self.config.notification_email.as_str()),
        )?;

        // Visualization access role: reads the store, queries through the
        // workgroup.
        let vis_role_name = allocator.allocate(env, "vis-access-role", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::ServiceRole, ids::VIS_ROLE, vis_role_name)
                .with_attr("assumePrincipal", "quicksight.amazonaws.com")
                .with_attr(
                    "managedPolicies",
                    json!(["arn:aws:iam::aws:policy/AmazonAthenaFullAccess"]),
                ),
        )?;
        builder.link(
            PrincipalRef::Node(ids::VIS_ROLE.to_string()),
            ids::STORE,
            [Capability::ReadObjects, Capability::WriteObjects],
        );

        // Data source bound to the workgroup through the access role.
        let source_name =
            allocator.allocate(env, "athena-data-source", &NameGrammar::general(), false)?;
        builder.declare(
            ResourceSpec::new(ResourceKind::VisDataSource, ids::VIS_DATA_SOURCE, source_name)
                .with_attr("type", "ATHENA")
                .with_attr("workgroup", AttrValue::name_of(ids::WORKGROUP))
                .with_attr("accessRoleArn", AttrValue::arn_of(ids::VIS_ROLE))
                .with_attr("sslDisabled", false),
        )?;
        builder.link(
            PrincipalRef::External(self.config.notification_email.clone()),
            ids::VIS_DATA_SOURCE,
            [Capability::ManageDataSource],
        );

        // Dataset over the crawled table, with the inferred columns embedded.
        // The dependency on the data source is declared explicitly: the
        // backend cannot infer it from the physical-table reference alone.
        let dataset_name = allocator.allocate(env, "athena-dataset", &NameGrammar::general(), false)?;
        let input_columns = AttrValue::list(self.schema.columns.iter().map(|column| {
            AttrValue::map([
                ("name", column.name.as_str().into()),
                ("type", column.column_type.to_string().into()),
            ])
        }));
        builder.declare(
            ResourceSpec::new(ResourceKind::VisDataSet, ids::VIS_DATASET, dataset_name)
                .with_attr("importMode", "DIRECT_QUERY")
                .with_attr(
                    "physicalTable",
                    AttrValue::map([
                        ("dataSourceArn", AttrValue::arn_of(ids::VIS_DATA_SOURCE)),
                        ("catalog", "AwsDataCatalog".into()),
                        ("schema", AttrValue::name_of(ids::DATABASE)),
                        ("table", self.schema.table.as_str().into()),
                        ("inputColumns", input_columns),
                    ]),
                )
                .with_dependency(ids::VIS_DATA_SOURCE),
        )?;
        builder.link(
            PrincipalRef::External(self.config.notification_email.clone()),
            ids::VIS_DATASET,
            [Capability::ManageDataSet],
        );

        info!(
            environment = %env,
            table = %self.schema.table,
            "composed analytics pipeline"
        );

        Ok(())
    }
}
