use crate::domain::errors::{PredictError, TrainingError};
use crate::domain::types::{BackendKind, RawForecast};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A backend shared between the orchestrator and the ensemble combiner.
///
/// Training takes the write half; predictions take the read half and may run
/// in parallel. All locking happens on blocking threads, never across awaits.
pub type SharedBackend = Arc<RwLock<Box<dyn ForecastBackend>>>;

/// Interface for trainable forecasting models.
///
/// Methods are synchronous and CPU-bound; the orchestrator runs them on
/// `spawn_blocking` so model fitting never stalls request-serving threads.
pub trait ForecastBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Fit the model to an ordered daily revenue series and persist the
    /// resulting artifact. On failure the backend is left untrained.
    fn train(&mut self, series: &[f64]) -> Result<(), TrainingError>;

    /// Forecast `horizon` days ahead. Requires a trained model.
    fn predict(&self, horizon: usize) -> Result<Vec<RawForecast>, PredictError>;

    /// Whether a usable model is loaded, side-effect-free.
    fn is_trained(&self) -> bool;

    /// When the current model was trained, if ever.
    fn trained_at(&self) -> Option<DateTime<Utc>>;
}
