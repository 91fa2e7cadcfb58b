//! Configuration management for schemagraph.
//!
//! The configuration is a small YAML document naming the relationship
//! service, the active project and the view defaults:
//!
//! ```yaml
//! base-url: https://docs.example.com/api
//! project-id: warehouse
//! default-hops: 2
//! default-direction: LR
//! undo-window-secs: 8
//! ```

use crate::domain::{HopDepth, LayoutDirection, ProjectId};
use crate::error::{Error, Result};
use crate::layout::LayoutConfig;
use crate::model::NodeMetrics;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Name of the configuration file looked up by the CLI
pub const CONFIG_FILE_NAME: &str = "schemagraph.yaml";

/// Default window during which a reject can be undone
pub const DEFAULT_UNDO_WINDOW_SECS: u64 = 8;

/// Default number of cached neighborhoods
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Configuration for a schemagraph session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaGraphConfig {
    /// Base URL of the relationship service
    pub base_url: String,

    /// Active project
    pub project_id: ProjectId,

    /// Bearer token attached verbatim to service requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Hop depth used when a session starts
    #[serde(default)]
    pub default_hops: HopDepth,

    /// Layout direction used when a session starts
    #[serde(default)]
    pub default_direction: LayoutDirection,

    /// Seconds during which a reject can be undone
    #[serde(default = "default_undo_window_secs")]
    pub undo_window_secs: u64,

    /// Maximum number of cached neighborhoods
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Render rejected logical relationships de-emphasized instead of hiding them
    #[serde(default)]
    pub show_rejected: bool,

    /// Layer and node spacing
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Node box sizing
    #[serde(default)]
    pub node_metrics: NodeMetrics,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_undo_window_secs() -> u64 {
    DEFAULT_UNDO_WINDOW_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl SchemaGraphConfig {
    /// Create a configuration with defaults for the given service and project
    pub fn new(base_url: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            base_url: base_url.into(),
            project_id,
            auth_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_hops: HopDepth::default(),
            default_direction: LayoutDirection::default(),
            undo_window_secs: DEFAULT_UNDO_WINDOW_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            show_rejected: false,
            layout: LayoutConfig::default(),
            node_metrics: NodeMetrics::default(),
        }
    }

    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base-url must not be empty".to_string()));
        }
        if self.project_id.0.trim().is_empty() {
            return Err(Error::Config("project-id must not be empty".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache-capacity must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request-timeout-secs must be at least 1".to_string(),
            ));
        }
        if self.layout.node_spacing < 0.0 || self.layout.rank_spacing < 0.0 {
            return Err(Error::Config("layout spacing must not be negative".to_string()));
        }
        Ok(())
    }

    /// Undo window as a duration
    #[must_use]
    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }

    /// Request timeout as a duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SchemaGraphConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/api", ProjectId::new("default"))
    }
}
