//! Pipeline configuration
//!
//! All deployment-specific values arrive through one explicit
//! [`PipelineConfig`] loaded from a YAML file - there are no ambient
//! context lookups, which keeps graph resolution a pure function of this
//! object plus the declarations.
//!
//! The notification email and monthly budget are opaque pass-through values:
//! the core checks non-emptiness and nothing else, and threads them into the
//! budget and visualization resource attributes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

fn default_sample_data_dir() -> PathBuf {
    PathBuf::from("dummy_data")
}

/// Deployment-specific inputs for the analytics pipeline blueprint
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Environment every resource name is scoped to (e.g. "demo")
    pub environment: String,
    /// Base name of the object-store container
    pub store_name: String,
    /// Base name of the catalog database
    pub database_name: String,
    /// Base name of the catalog crawler
    pub crawler_name: String,
    /// Base name of the crawler's service role
    pub crawler_role_name: String,
    /// Email-like address for budget notifications and visualization access;
    /// opaque beyond non-emptiness
    pub notification_email: String,
    /// Monthly cost budget limit in USD; opaque pass-through
    pub monthly_budget_usd: f64,
    /// Directory holding sample data artifacts
    #[serde(default = "default_sample_data_dir")]
    pub sample_data_dir: PathBuf,
}

impl PipelineConfig {
    /// Parse a configuration from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Check the non-emptiness constraints
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("environment", &self.environment),
            ("storeName", &self.store_name),
            ("databaseName", &self.database_name),
            ("crawlerName", &self.crawler_name),
            ("crawlerRoleName", &self.crawler_role_name),
            ("notificationEmail", &self.notification_email),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(Error::validation(format!("{field} must not be empty")));
            }
        }
        if self.sample_data_dir.as_os_str().is_empty() {
            return Err(Error::validation("sampleDataDir must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
environment: demo
storeName: data-lake-bucket
databaseName: data-lake-database
crawlerName: data-lake-crawler
crawlerRoleName: data-lake-crawler-role
notificationEmail: analyst@example.com
monthlyBudgetUsd: 10
sampleDataDir: sample_data
"#;

    #[test]
    fn test_full_config_parses() {
        let config = PipelineConfig::from_yaml(FULL).expect("parses");
        assert_eq!(config.environment, "demo");
        assert_eq!(config.store_name, "data-lake-bucket");
        assert_eq!(config.monthly_budget_usd, 10.0);
        assert_eq!(config.sample_data_dir, PathBuf::from("sample_data"));
    }

    #[test]
    fn test_sample_data_dir_defaults() {
        let yaml = FULL
            .lines()
            .filter(|l| !l.starts_with("sampleDataDir"))
            .collect::<Vec<_>>()
            .join("\n");
        let config = PipelineConfig::from_yaml(&yaml).expect("parses");
        assert_eq!(config.sample_data_dir, PathBuf::from("dummy_data"));
    }

    #[test]
    fn test_empty_email_is_rejected() {
        let yaml = FULL.replace("analyst@example.com", "\"\"");
        let err = PipelineConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("notificationEmail"));
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let yaml = FULL
            .lines()
            .filter(|l| !l.starts_with("databaseName"))
            .collect::<Vec<_>>()
            .join("\n");
        let err = PipelineConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    /// The email and budget are pass-through values: nothing beyond
    /// non-emptiness is enforced, deliberately.
    #[test]
    fn test_opaque_values_are_not_format_validated() {
        let yaml = FULL.replace("analyst@example.com", "not-an-email");
        assert!(PipelineConfig::from_yaml(&yaml).is_ok());
    }
}
