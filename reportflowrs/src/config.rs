//! Configuration system for Reportflow.
//!
//! Supports TOML-based configuration with global defaults and per-database overrides.

use std::collections::HashMap;
use std::path::Path;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{ReportflowError, Result};
use crate::schema::Database;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportflowConfig {
    /// Global defaults applied to all databases unless overridden.
    pub defaults: GlobalDefaults,

    /// Per-database configuration (keyed by the name datasets reference).
    #[serde(default)]
    pub databases: HashMap<String, DatabaseConfig>,
}

/// Global default settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub query: QueryConfig,
    pub time: TimeConfig,
    pub validation: ValidationConfig,
}

/// Query execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Query timeout in milliseconds (default: 30000).
    pub timeout_ms: u64,
    /// Page size when a request asks for paging without a size (default: 100).
    pub default_page_rows: u64,
    /// Hard cap on requested page sizes (0 = uncapped).
    pub max_page_rows: u64,
}

/// Calendar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeConfig {
    /// First day of the week for week-based date keywords (default: monday).
    pub week_start: String,
}

/// Validation configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Log validation failures instead of failing (default: false).
    pub warn_only: bool,
}

/// Per-database configuration (can override globals).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQL Server when true, MySQL otherwise (default: true).
    pub is_sql_server: bool,
    /// Whether the engine supports OFFSET/FETCH paging (default: true).
    pub allow_paging: bool,
    pub connection_string: Option<String>,
    pub query: Option<QueryConfig>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            default_page_rows: 100,
            max_page_rows: 0, // 0 = uncapped
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            week_start: "monday".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            is_sql_server: true,
            allow_paging: true,
            connection_string: None,
            query: None,
        }
    }
}

impl TimeConfig {
    /// Parse the configured week start. Unrecognized values fall back to
    /// Monday with a warning.
    pub fn week_start(&self) -> Weekday {
        match self.week_start.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            "sunday" | "sun" => Weekday::Sun,
            other => {
                tracing::warn!(value = %other, "unrecognized week_start, using monday");
                Weekday::Mon
            }
        }
    }
}

impl DatabaseConfig {
    /// Materialize the database entity datasets reference by name.
    pub fn to_database(&self, name: &str) -> Database {
        Database {
            name: name.to_string(),
            is_sql_server: self.is_sql_server,
            allow_paging: self.allow_paging,
            connection_string: self.connection_string.clone(),
        }
    }
}

impl ReportflowConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ReportflowError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&contents)
            .map_err(|e| ReportflowError::Config(format!("failed to parse config: {e}")))
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| ReportflowError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `REPORTFLOW_CONFIG` environment variable
    /// 2. `./reportflow.toml` (current directory)
    /// 3. `~/.config/reportflow/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("REPORTFLOW_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from REPORTFLOW_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("reportflow.toml") {
            tracing::info!("loaded config from ./reportflow.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("reportflow").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Get resolved config for a specific database (merges global defaults).
    pub fn for_database(&self, name: &str) -> ResolvedDatabaseConfig {
        ResolvedDatabaseConfig::merge(&self.defaults, name, self.databases.get(name))
    }

    /// Every configured database as a schema entity.
    pub fn database_entities(&self) -> Vec<Database> {
        let mut entities: Vec<Database> = self
            .databases
            .iter()
            .map(|(name, cfg)| cfg.to_database(name))
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }
}

/// Fully resolved configuration for one database (no Option fields).
#[derive(Debug, Clone)]
pub struct ResolvedDatabaseConfig {
    pub database: Database,
    pub query: QueryConfig,
}

impl ResolvedDatabaseConfig {
    fn merge(defaults: &GlobalDefaults, name: &str, override_cfg: Option<&DatabaseConfig>) -> Self {
        match override_cfg {
            Some(db) => Self {
                database: db.to_database(name),
                query: db.query.clone().unwrap_or_else(|| defaults.query.clone()),
            },
            None => Self {
                database: DatabaseConfig::default().to_database(name),
                query: defaults.query.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ReportflowConfig::default();
        assert_eq!(cfg.defaults.query.timeout_ms, 30_000);
        assert_eq!(cfg.defaults.query.default_page_rows, 100);
        assert_eq!(cfg.defaults.time.week_start(), Weekday::Mon);
        assert!(!cfg.defaults.validation.warn_only);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[defaults.query]
timeout_ms = 60000
default_page_rows = 50

[defaults.time]
week_start = "sunday"

[databases.warehouse]
is_sql_server = false
connection_string = "mysql://warehouse"
"#;
        let cfg = ReportflowConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.defaults.query.timeout_ms, 60_000);
        assert_eq!(cfg.defaults.time.week_start(), Weekday::Sun);

        let resolved = cfg.for_database("warehouse");
        assert!(!resolved.database.is_sql_server);
        assert!(resolved.database.allow_paging);
        assert_eq!(
            resolved.database.connection_string.as_deref(),
            Some("mysql://warehouse")
        );
    }

    #[test]
    fn test_database_override() {
        let toml = r#"
[defaults.query]
default_page_rows = 25

[databases.legacy]
allow_paging = false

[databases.legacy.query]
timeout_ms = 5000
default_page_rows = 10
"#;
        let cfg = ReportflowConfig::from_toml(toml).unwrap();

        // Unknown databases use the global defaults.
        let unknown = cfg.for_database("unknown");
        assert_eq!(unknown.query.default_page_rows, 25);
        assert!(unknown.database.is_sql_server);

        // Named databases use their overrides.
        let legacy = cfg.for_database("legacy");
        assert_eq!(legacy.query.timeout_ms, 5_000);
        assert_eq!(legacy.query.default_page_rows, 10);
        assert!(!legacy.database.allow_paging);
    }

    #[test]
    fn test_week_start_fallback() {
        let time = TimeConfig {
            week_start: "someday".to_string(),
        };
        assert_eq!(time.week_start(), Weekday::Mon);
    }
}
