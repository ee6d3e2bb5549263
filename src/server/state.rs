//! Application state management

use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;
use crate::pipeline::ModelArtifact;

use super::ServerConfig;

/// Application state shared across handlers.
///
/// The single model slot mirrors the service's lifecycle: `/train` is the
/// only writer, every prediction endpoint is a reader.
pub struct AppState {
    pub config: ServerConfig,
    pub model: RwLock<Option<ModelArtifact>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            model: RwLock::new(None),
        }
    }

    /// Path of the persisted model artifact.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.config.models_dir).join("model.json")
    }

    /// Load a previously trained artifact from disk.
    ///
    /// `Ok(false)` when no artifact exists; an artifact that exists but
    /// cannot be read is an error.
    pub async fn load_persisted_model(&self) -> Result<bool> {
        let path = self.model_path();
        if !path.exists() {
            info!(path = %path.display(), "No persisted model found; train via POST /train");
            return Ok(false);
        }

        let artifact = ModelArtifact::load(&path)?;
        info!(
            path = %path.display(),
            target = %artifact.schema.target_column,
            features = artifact.schema.feature_columns.len(),
            "Loaded persisted model"
        );
        *self.model.write().await = Some(artifact);
        Ok(true)
    }
}
