//! Engine configuration via `ordo.toml`
//!
//! [`EngineConfig`] is the raw, deserialized form: every field is optional or
//! defaulted so a partial file still parses. [`EngineConfig::validate`] turns
//! it into [`Settings`] eagerly, reporting every missing required field in one
//! error rather than failing on the first.

use ordo_core::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Config file name conventionally used next to a deployment.
pub const CONFIG_FILE_NAME: &str = "ordo.toml";

/// Default claim lease length in milliseconds
pub const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 10_000;

/// Default page size for stream reads and tracking batches
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 100;

/// Engine configuration loaded from `ordo.toml`.
///
/// # Example
///
/// ```toml
/// table_name = "events"
/// index_name = "events-global"
///
/// # Optional
/// # node_id = "worker-1"
/// # claim_timeout_ms = 10000
/// # payload_type_prefix = "com.example.events."
/// # fetch_batch_size = 100
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Table holding events, the sequence counter and claims (required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Global-order secondary index on that table (required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Identity this process claims segments under.
    /// Defaults to `<pid>@<random uuid>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Claim lease length (default: 10000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_timeout_ms: Option<u64>,
    /// Payload type name prefix stored abbreviated as `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_type_prefix: Option<String>,
    /// Page size for stream reads and tracking batches (default: 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_batch_size: Option<usize>,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Table name
    pub table_name: String,
    /// Global-order index name
    pub index_name: String,
    /// Claim owner identity of this process
    pub node_id: String,
    /// Claim lease length
    pub claim_timeout: Duration,
    /// Payload type prefix to abbreviate, if any
    pub payload_type_prefix: Option<String>,
    /// Page size for stream reads and tracking batches
    pub fetch_batch_size: usize,
}

impl EngineConfig {
    /// Config naming the two required fields
    pub fn new(table_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            table_name: Some(table_name.into()),
            index_name: Some(index_name.into()),
            ..Self::default()
        }
    }

    /// Set the node identity
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set the claim lease length
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the payload type prefix
    pub fn with_payload_type_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.payload_type_prefix = Some(prefix.into());
        self
    }

    /// Set the fetch batch size
    pub fn with_fetch_batch_size(mut self, size: usize) -> Self {
        self.fetch_batch_size = Some(size);
        self
    }

    /// Check required fields and value ranges, resolving defaults.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingFields`] naming every absent required field
    /// - [`ConfigError::Invalid`] for the first unusable value
    pub fn validate(&self) -> std::result::Result<Settings, ConfigError> {
        let missing: Vec<&'static str> = [
            ("table_name", &self.table_name),
            ("index_name", &self.index_name),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let claim_timeout_ms = self.claim_timeout_ms.unwrap_or(DEFAULT_CLAIM_TIMEOUT_MS);
        if claim_timeout_ms == 0 {
            return Err(invalid("claim_timeout_ms", "must be greater than zero"));
        }
        let fetch_batch_size = self.fetch_batch_size.unwrap_or(DEFAULT_FETCH_BATCH_SIZE);
        if fetch_batch_size == 0 {
            return Err(invalid("fetch_batch_size", "must be greater than zero"));
        }
        if self.payload_type_prefix.as_deref() == Some("") {
            return Err(invalid("payload_type_prefix", "must not be empty when set"));
        }
        let node_id = match &self.node_id {
            Some(id) if id.is_empty() => {
                return Err(invalid("node_id", "must not be empty when set"))
            }
            Some(id) => id.clone(),
            None => default_node_id(),
        };

        Ok(Settings {
            table_name: self.table_name.clone().unwrap_or_default(),
            index_name: self.index_name.clone().unwrap_or_default(),
            node_id,
            claim_timeout: Duration::from_millis(claim_timeout_ms),
            payload_type_prefix: self.payload_type_prefix.clone(),
            fetch_batch_size,
        })
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] on a parse failure, otherwise as [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> Result<Settings> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| ConfigError::Load(format!("Failed to parse config: {}", e)))?;
        Ok(config.validate()?)
    }

    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] if the file cannot be read or parsed, otherwise
    /// as [`validate`](Self::validate).
    pub fn from_file(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Load(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// `<pid>@<random uuid>`
pub fn default_node_id() -> String {
    format!("{}@{}", std::process::id(), Uuid::new_v4())
}
