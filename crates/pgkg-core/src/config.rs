//! Configuration management for pgkg.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`PGKG__` prefix, `__` separator, e.g. `PGKG__DATABASE__HOST`)
//! 2. Config file (`pgkg.toml` by default)
//!
//! There are no defaults for the required settings. A value is constructed
//! once at startup and handed to the components that need it; nothing reads
//! configuration from global state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KgError, Result};
use crate::validate::is_label;

/// Connection parameters for the PostgreSQL instance.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Seconds to wait for the TCP connection and startup handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Immutable application settings shared by the handler and the visualizer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KgConfig {
    /// Production deployments log less (no statement text).
    pub production: bool,
    pub database: DatabaseConfig,
    /// Postgres schema holding the hypertable; also the AGE graph name.
    pub schema_name: String,
    /// Reported to the server as `application_name`.
    pub app_name: String,
    /// Hypertable receiving one row per record.
    pub hypertable_name: String,
    /// DDL run in order on initialization. Must be idempotent.
    ///
    /// Statements may use `{schema_name}`, `{ht_name}`, `{app_name}` and
    /// `{vector_size}` placeholders.
    pub ddl: Vec<String>,

    /// Embedding dimension, when records carry embeddings.
    #[serde(default)]
    pub vector_size: Option<usize>,
    /// Allowed record type tags. Empty means any label-shaped tag.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    /// Allowed relation labels. Empty means any label-shaped relation.
    #[serde(default)]
    pub allowed_relations: Vec<String>,
    /// Extra regex every record identifier must match.
    #[serde(default)]
    pub id_pattern: Option<String>,
    #[serde(default)]
    pub forbid_self_loops: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

impl KgConfig {
    /// Load from `<file_prefix>.toml` (optional) overlaid with `PGKG__*`
    /// environment variables, then validate.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("PGKG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| KgError::Config(e.to_string()))?;

        let loaded: KgConfig = cfg
            .try_deserialize()
            .map_err(|e| KgError::Config(e.to_string()))?;
        loaded.validate()?;

        tracing::debug!(
            schema = %loaded.schema_name,
            host = %loaded.database.host,
            statements = loaded.ddl.len(),
            "Configuration loaded"
        );
        Ok(loaded)
    }

    /// Reject partial or malformed settings before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        require_non_empty("database.host", &db.host)?;
        require_non_empty("database.user", &db.user)?;
        require_non_empty("database.dbname", &db.dbname)?;
        if db.port == 0 {
            return Err(KgError::Config("database.port must be non-zero".into()));
        }
        if db.connect_timeout_secs == 0 {
            return Err(KgError::Config(
                "database.connect_timeout_secs must be non-zero".into(),
            ));
        }

        require_non_empty("app_name", &self.app_name)?;
        require_identifier("schema_name", &self.schema_name)?;
        require_identifier("hypertable_name", &self.hypertable_name)?;

        if self.ddl.is_empty() {
            return Err(KgError::Config("ddl must list at least one statement".into()));
        }
        if let Some(pos) = self.ddl.iter().position(|s| s.trim().is_empty()) {
            return Err(KgError::Config(format!("ddl[{pos}] is empty")));
        }

        if self.vector_size == Some(0) {
            return Err(KgError::Config("vector_size must be positive".into()));
        }
        if self.vector_size.is_none() {
            if let Some(pos) = self.ddl.iter().position(|s| s.contains("{vector_size}")) {
                return Err(KgError::Config(format!(
                    "ddl[{pos}] uses {{vector_size}} but vector_size is not set"
                )));
            }
        }
        for tag in &self.allowed_types {
            if !is_label(tag) {
                return Err(KgError::Config(format!(
                    "allowed_types entry {tag:?} is not a valid graph label"
                )));
            }
        }
        for rel in &self.allowed_relations {
            if !is_label(rel) {
                return Err(KgError::Config(format!(
                    "allowed_relations entry {rel:?} is not a valid graph label"
                )));
            }
        }
        if let Some(pattern) = &self.id_pattern {
            regex::Regex::new(pattern)
                .map_err(|e| KgError::Config(format!("id_pattern: {e}")))?;
        }

        Ok(())
    }

    /// Substitute the configuration placeholders in a statement template.
    pub fn render(&self, template: &str) -> String {
        let mut out = template
            .replace("{schema_name}", &self.schema_name)
            .replace("{ht_name}", &self.hypertable_name)
            .replace("{app_name}", &self.app_name);
        if let Some(size) = self.vector_size {
            out = out.replace("{vector_size}", &size.to_string());
        }
        out
    }

    /// The DDL list with placeholders substituted, in execution order.
    pub fn rendered_ddl(&self) -> Vec<String> {
        self.ddl.iter().map(|s| self.render(s)).collect()
    }

    /// Fully qualified hypertable name (`schema.table`).
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema_name, self.hypertable_name)
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KgError::Config(format!("{name} is required")));
    }
    Ok(())
}

fn require_identifier(name: &str, value: &str) -> Result<()> {
    require_non_empty(name, value)?;
    if !is_label(value) {
        return Err(KgError::Config(format!(
            "{name} {value:?} must be a plain SQL identifier"
        )));
    }
    Ok(())
}
