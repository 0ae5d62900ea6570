use crate::domain::types::BackendKind;
use thiserror::Error;

/// Errors raised while training a backend. Recovered locally: the handle is
/// left untrained and the failure is surfaced only in retrain reporting,
/// never to a prediction caller.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("insufficient training data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("model failed to converge: {reason}")]
    NonConvergence { reason: String },

    #[error("artifact persistence failed: {0}")]
    Persistence(#[from] ArtifactError),
}

/// Errors raised while producing a forecast. Every variant is recovered by
/// the orchestrator, which reroutes to the heuristic fallback.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("backend '{0}' is not trained")]
    NotTrained(BackendKind),

    #[error("no ensemble constituent available")]
    NoBackendAvailable,

    #[error("prediction failed: {reason}")]
    Failed { reason: String },
}

/// Errors raised by the historical data provider.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no historical data available")]
    Unavailable,

    #[error("history provider failed: {0}")]
    Provider(#[from] anyhow::Error),
}

/// Errors raised by the model artifact store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed for '{backend}': {source}")]
    Io {
        backend: BackendKind,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact for '{backend}' is corrupt: {source}")]
    Corrupt {
        backend: BackendKind,
        #[source]
        source: serde_json::Error,
    },
}
