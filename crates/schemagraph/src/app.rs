//! Application context for CLI command execution.
//!
//! [`App`] resolves the configuration and the relationship service once and
//! hands out [`ErdSession`]s built from them.
//!
//! # Example
//!
//! ```no_run
//! use schemagraph::app::App;
//! use schemagraph::domain::ObjectId;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::load(Path::new("."), None, Some(Path::new("warehouse.json"))).await?;
//!     let mut session = app.session();
//!     session.select_focus(ObjectId(42)).await?;
//!     Ok(())
//! }
//! ```

use crate::commands::init::find_config_file;
use crate::config::SchemaGraphConfig;
use crate::error::Result;
use crate::service::{Fixture, HttpRelationshipService, InMemoryService, RelationshipService};
use crate::session::ErdSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where the relationship data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSource {
    /// The configured REST service
    Http(String),
    /// An offline fixture file
    Fixture(PathBuf),
}

/// Application context for CLI operations.
pub struct App {
    config: SchemaGraphConfig,
    config_file: Option<PathBuf>,
    service: Arc<dyn RelationshipService>,
    source: ServiceSource,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("config_file", &self.config_file)
            .field("source", &self.source)
            .field("service", &"<dyn RelationshipService>")
            .finish()
    }
}

impl App {
    /// Resolve configuration and service.
    ///
    /// The configuration comes from `config_path` if given, else from the
    /// nearest `schemagraph.yaml` at or above `working_dir`, else defaults.
    /// With a fixture, the service is an in-memory project loaded from it;
    /// otherwise it is the configured REST service.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration cannot be read or is invalid
    /// - The fixture cannot be read or parsed
    /// - The base URL is not usable
    pub async fn load(
        working_dir: &Path,
        config_path: Option<&Path>,
        fixture: Option<&Path>,
    ) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(working_dir),
        };
        let config = match &config_file {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                SchemaGraphConfig::load(path).await?
            }
            None => SchemaGraphConfig::default(),
        };
        Self::with_config(config, config_file, fixture).await
    }

    /// Build the context from an already loaded configuration.
    ///
    /// # Errors
    ///
    /// See [`App::load`].
    pub async fn with_config(
        config: SchemaGraphConfig,
        config_file: Option<PathBuf>,
        fixture: Option<&Path>,
    ) -> Result<Self> {
        let (service, source): (Arc<dyn RelationshipService>, ServiceSource) = match fixture {
            Some(path) => {
                let project = Fixture::load(path).await?;
                debug!(
                    path = %path.display(),
                    objects = project.objects.len(),
                    relationships = project.relationships.len(),
                    "Loaded fixture"
                );
                (
                    Arc::new(InMemoryService::new(project)),
                    ServiceSource::Fixture(path.to_path_buf()),
                )
            }
            None => (
                Arc::new(HttpRelationshipService::from_config(&config)?),
                ServiceSource::Http(config.base_url.clone()),
            ),
        };

        Ok(Self {
            config,
            config_file,
            service,
            source,
        })
    }

    /// The effective configuration
    pub fn config(&self) -> &SchemaGraphConfig {
        &self.config
    }

    /// Mutable configuration, for command-line overrides before
    /// [`App::session`] is called
    pub fn config_mut(&mut self) -> &mut SchemaGraphConfig {
        &mut self.config
    }

    /// The configuration file in use, if any
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Where relationship data comes from
    pub fn source(&self) -> &ServiceSource {
        &self.source
    }

    /// Start a session against the resolved service
    pub fn session(&self) -> ErdSession {
        ErdSession::new(&self.config, Arc::clone(&self.service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use crate::domain::ProjectId;
    use tempfile::TempDir;

    async fn write_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("project.json");
        tokio::fs::write(&path, r#"{"objects": [], "relationships": []}"#)
            .await
            .unwrap();
        path
    }

    #[tokio::test]
    async fn defaults_without_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = write_fixture(temp_dir.path()).await;

        let app = App::load(temp_dir.path(), None, Some(&fixture))
            .await
            .unwrap();
        assert!(app.config_file().is_none());
        assert_eq!(app.config(), &SchemaGraphConfig::default());
        assert_eq!(app.source(), &ServiceSource::Fixture(fixture));
    }

    #[tokio::test]
    async fn finds_config_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        init::init_config(temp_dir.path(), None, Some("warehouse"), false)
            .await
            .unwrap();
        let nested = temp_dir.path().join("docs");
        tokio::fs::create_dir_all(&nested).await.unwrap();

        let app = App::load(&nested, None, None).await.unwrap();
        assert_eq!(app.config().project_id, ProjectId::new("warehouse"));
        assert!(matches!(app.source(), ServiceSource::Http(_)));
    }

    #[tokio::test]
    async fn missing_fixture_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.json");
        assert!(App::load(temp_dir.path(), None, Some(&missing)).await.is_err());
    }
}
