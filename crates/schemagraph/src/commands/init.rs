//! Implementation of the `init-config` command.
//!
//! Writes a `schemagraph.yaml` with defaults for the given service and
//! project, and locates an existing one by walking up from a directory.

use crate::config::{CONFIG_FILE_NAME, SchemaGraphConfig};
use crate::domain::ProjectId;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Service URL written when none is given
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Project written when none is given
pub const DEFAULT_PROJECT: &str = "default";

/// Maximum directory depth to traverse when searching for a config file
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Result of the init-config command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the written config file
    pub config_file: PathBuf,
    /// The configuration that was written
    pub config: SchemaGraphConfig,
}

/// Write a default configuration into `base_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - A config file already exists and `force` is not set
/// - The resulting configuration is invalid (e.g. empty project)
/// - File system operations fail
pub async fn init_config(
    base_dir: &Path,
    base_url: Option<&str>,
    project: Option<&str>,
    force: bool,
) -> Result<InitResult> {
    let config_file = base_dir.join(CONFIG_FILE_NAME);
    if config_file.exists() && !force {
        return Err(Error::Config(format!(
            "'{}' already exists (use --force to overwrite)",
            config_file.display()
        )));
    }

    let config = SchemaGraphConfig::new(
        base_url.unwrap_or(DEFAULT_BASE_URL).trim(),
        ProjectId::new(project.unwrap_or(DEFAULT_PROJECT).trim()),
    );
    config.validate()?;
    config.save(&config_file).await?;

    Ok(InitResult {
        config_file,
        config,
    })
}

/// Find the nearest `schemagraph.yaml` at or above `start_dir`.
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .take(MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}
