//! Handler configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default template for a task log's relative path.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{dag_id}/{task_id}/{execution_date}/{try_number}.log";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where task logs live locally and remotely, and how to reach the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLogConfig {
    /// Folder holding the local log files.
    pub local_base_log_folder: PathBuf,

    /// Remote prefix, e.g. `s3://bucket/logs`.
    pub remote_base_log_folder: String,

    /// Template rendered into each task try's relative log path.
    pub log_filename_template: String,

    /// Connection id used to build the storage client. Empty selects the default.
    pub remote_log_conn_id: String,

    /// Request server-side encryption on upload.
    pub encrypt_logs: bool,
}

impl Default for RemoteLogConfig {
    fn default() -> Self {
        Self {
            local_base_log_folder: PathBuf::from("logs"),
            remote_base_log_folder: String::new(),
            log_filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            remote_log_conn_id: String::new(),
            encrypt_logs: false,
        }
    }
}

impl RemoteLogConfig {
    /// Create a configuration with the given local and remote folders.
    #[must_use]
    pub fn new(
        local_base_log_folder: impl Into<PathBuf>,
        remote_base_log_folder: impl Into<String>,
    ) -> Self {
        Self {
            local_base_log_folder: local_base_log_folder.into(),
            remote_base_log_folder: remote_base_log_folder.into(),
            ..Self::default()
        }
    }

    /// Set the connection id.
    #[must_use]
    pub fn with_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.remote_log_conn_id = conn_id.into();
        self
    }

    /// Set the filename template.
    #[must_use]
    pub fn with_filename_template(mut self, template: impl Into<String>) -> Self {
        self.log_filename_template = template.into();
        self
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
