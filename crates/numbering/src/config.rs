//! Configuration for the numbering service

use serde::{Deserialize, Serialize};

use crate::error::{NumberingError, Result};
use crate::format::{DisplayFormat, NumberStyle, DEFAULT_PREFIX};

/// Configuration for the numbering service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Database connection URL (MySQL/TiDB, or SQLite for local use)
    pub database_url: String,

    /// Maximum database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connections kept open while idle
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Database connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Close idle connections after this many seconds (None keeps them forever)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: Option<u64>,

    /// Enable SQL query logging
    #[serde(default)]
    pub enable_sql_logging: bool,

    /// Attempts for an issuance transaction that hits a conflict
    #[serde(default = "default_max_transaction_retries")]
    pub max_transaction_retries: u32,

    /// Base backoff between conflicting attempts, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How issued numbers are rendered
    #[serde(default)]
    pub label: LabelConfig,

    /// Write the assignment record inside the counter transaction
    #[serde(default)]
    pub record_in_transaction: bool,

    /// Create missing tables on connect
    #[serde(default = "default_create_schema")]
    pub create_schema: bool,
}

/// Label settings applied to every issued number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub style: NumberStyle,
    #[serde(default)]
    pub padding: Option<usize>,
    #[serde(default = "default_prefix")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_secs: default_connection_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            enable_sql_logging: false,
            max_transaction_retries: default_max_transaction_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            label: LabelConfig::default(),
            record_in_transaction: false,
            create_schema: default_create_schema(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            style: NumberStyle::Simple,
            padding: None,
            prefix: default_prefix(),
            suffix: None,
        }
    }
}

impl NumberingConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// Single-connection in-memory SQLite database.
    ///
    /// Every pooled SQLite memory connection opens its own database, so the
    /// pool is pinned to one connection that never idles out.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_secs: None,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(NumberingError::Config("database_url is not set".to_string()));
        }
        if self.max_connections == 0 {
            return Err(NumberingError::Config("max_connections must be at least 1".to_string()));
        }
        if self.min_connections > self.max_connections {
            return Err(NumberingError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.max_transaction_retries == 0 {
            return Err(NumberingError::Config(
                "max_transaction_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base label format; the subject name is filled in per scope
    pub fn display_format(&self) -> DisplayFormat {
        DisplayFormat {
            style: self.label.style,
            padding: self.label.padding,
            subject_name: None,
            prefix: self.label.prefix.clone(),
            suffix: self.label.suffix.clone(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> Option<u64> {
    Some(600)
}

fn default_max_transaction_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_create_schema() -> bool {
    true
}

fn default_prefix() -> Option<String> {
    Some(DEFAULT_PREFIX.to_string())
}
