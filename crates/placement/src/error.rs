//! Error taxonomy for session, hit-test and model loading failures.

use shared::ModelId;
use thiserror::Error;

/// Errors surfaced to the orchestrator.
///
/// Fetch and parse failures are kept apart because the first suggests a
/// retry while the second means the asset itself is broken.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArError {
    /// No session could be created under any capability candidate
    #[error("AR session unavailable: {0}")]
    SessionUnavailable(String),

    /// Session created but the platform cannot supply hit-test results
    #[error("hit testing unavailable: {0}")]
    HitTestUnavailable(String),

    /// Network or HTTP failure while downloading a model
    #[error("failed to download model '{model_id}': {message}")]
    Fetch { model_id: ModelId, message: String },

    /// Asset downloaded but could not be parsed
    #[error("failed to parse model '{model_id}': {message}")]
    Parse { model_id: ModelId, message: String },

    /// Load aborted by the user; not reported as a failure
    #[error("loading of model '{0}' was cancelled")]
    UserCancelled(ModelId),

    #[error("unknown model '{0}'")]
    UnknownModel(ModelId),

    #[error("a model is already loading")]
    LoadInProgress,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ArError {
    /// Text shown in the dismissable notification
    pub fn user_message(&self) -> String {
        match self {
            ArError::SessionUnavailable(_) => {
                "AR is not available on this device or browser. Try a device with AR support."
                    .to_string()
            }
            ArError::HitTestUnavailable(_) => {
                "Surface detection is not available. Make sure the AR services runtime is installed and up to date."
                    .to_string()
            }
            ArError::Fetch { .. } => {
                "Could not download the model. Check your connection and try again.".to_string()
            }
            ArError::Parse { .. } => {
                "The model could not be displayed. The file may be corrupted.".to_string()
            }
            ArError::UserCancelled(_) => "Loading cancelled.".to_string(),
            ArError::UnknownModel(id) => format!("Model '{id}' is not in the gallery."),
            ArError::LoadInProgress => "Please wait for the current model to finish loading.".to_string(),
            ArError::Config(_) => "The model gallery could not be loaded.".to_string(),
        }
    }

    /// Whether retrying the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArError::SessionUnavailable(_) | ArError::Fetch { .. } | ArError::LoadInProgress
        )
    }

    /// Cancellations are expected outcomes, not failures
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ArError::UserCancelled(_))
    }
}
