use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::classifier::{FittedClassifier, MatchClassifier};
use crate::core::cluster::ClusterModel;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Serialized trained-model artifact
///
/// One JSON file carries everything the trained paths need: the fitted
/// vectorizer + centroids for cluster assignment and the fitted classifier
/// (scaler included). Loaded once at startup and immutable afterwards;
/// either part may be absent, which disables only that path.
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub cluster: Option<ClusterModel>,
    pub classifier: Option<FittedClassifier>,
}

impl ModelArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Fail-soft load: a missing or unreadable artifact disables the trained
    /// paths instead of failing startup
    pub fn load_optional(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(artifact) => {
                tracing::info!(
                    path = %path.display(),
                    trained_at = %artifact.trained_at,
                    cluster = artifact.cluster.is_some(),
                    classifier = artifact.classifier.is_some(),
                    "loaded trained model artifact"
                );
                Some(artifact)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "no usable model artifact ({}), running deterministic-only",
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Classifier wrapped for inference, when the artifact carries one
    pub fn match_classifier(&self) -> Option<MatchClassifier> {
        self.classifier
            .as_ref()
            .map(|fitted| MatchClassifier::from_fitted(fitted.clone()))
    }
}
