//! Forecast orchestrator.
//!
//! Owns one handle per backend, runs each request through
//! select → ensure-trained → predict → format, and routes every stage
//! failure to the heuristic fallback. The public `predict` never errors;
//! the terminal degradation is a zero-filled, zero-confidence sequence.
//!
//! On-demand training is synchronous within the request that triggers it:
//! an untrained backend means that request pays the full fitting cost
//! (bounded by `train_timeout_secs`) before its forecast is produced.
//! Callers should expect the latency spike rather than a failure.

use crate::application::fallback::HeuristicPredictor;
use crate::application::formatting::{format_forecast, FormatDefaults};
use crate::application::ml::ensemble::EnsembleBackend;
use crate::application::ml::sequence::SequenceBackend;
use crate::application::ml::statistical::StatisticalBackend;
use crate::application::ml::{ForecastBackend, SharedBackend};
use crate::config::ForecastConfig;
use crate::domain::errors::{DataError, PredictError, TrainingError};
use crate::domain::insights::{generate_insights, InsightSummary};
use crate::domain::ports::{ArtifactStore, HistoryProvider};
use crate::domain::types::{
    BackendKind, ForecastPoint, HistoricalPoint, RawForecast, RetrainOutcome,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Tagged per-stage failure. Every variant dispatches to the fallback
/// branch; none escapes `predict`.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("data stage: {0}")]
    Data(#[from] DataError),

    #[error("training stage: {0}")]
    Training(#[from] TrainingError),

    #[error("prediction stage: {0}")]
    Prediction(#[from] PredictError),

    #[error("execution: {0}")]
    Execution(String),
}

struct BackendHandle {
    backend: SharedBackend,
    /// Serializes training per backend so the in-memory model and persisted
    /// artifact never diverge under concurrent retrain requests.
    train_gate: Mutex<()>,
}

impl BackendHandle {
    fn new(backend: Box<dyn ForecastBackend>) -> Self {
        Self {
            backend: Arc::new(RwLock::new(backend)),
            train_gate: Mutex::new(()),
        }
    }
}

/// Explicitly constructed orchestration context: one per running service,
/// built at startup, torn down at process exit.
pub struct ForecastOrchestrator {
    config: ForecastConfig,
    history: Arc<dyn HistoryProvider>,
    handles: HashMap<BackendKind, BackendHandle>,
    fallback: HeuristicPredictor,
}

impl ForecastOrchestrator {
    /// Build the orchestrator, constructing every backend and attempting to
    /// restore each persisted artifact.
    pub fn new(
        config: ForecastConfig,
        history: Arc<dyn HistoryProvider>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let statistical = StatisticalBackend::new(config.statistical.clone(), store.clone());
        let sequence = SequenceBackend::new(config.sequence.clone(), store.clone());
        info!(
            statistical = statistical.is_trained(),
            sequence = sequence.is_trained(),
            "forecast backends initialized"
        );

        let statistical_handle = BackendHandle::new(Box::new(statistical));
        let sequence_handle = BackendHandle::new(Box::new(sequence));
        let ensemble_margin = config.statistical.margin.max(config.sequence.margin);
        let ensemble = EnsembleBackend::new(
            config.ensemble.clone(),
            ensemble_margin,
            statistical_handle.backend.clone(),
            sequence_handle.backend.clone(),
        );

        let mut handles = HashMap::new();
        handles.insert(BackendKind::Statistical, statistical_handle);
        handles.insert(BackendKind::Sequence, sequence_handle);
        handles.insert(BackendKind::Ensemble, BackendHandle::new(Box::new(ensemble)));

        let fallback = HeuristicPredictor::new(config.fallback.clone());
        Self {
            config,
            history,
            handles,
            fallback,
        }
    }

    /// Forecast `days_ahead` days with the requested backend. Never fails:
    /// any stage failure degrades to the heuristic fallback, and a fallback
    /// failure degrades to a zero-filled sequence.
    pub async fn predict(&self, days_ahead: u32, kind: BackendKind) -> Vec<ForecastPoint> {
        let start = first_forecast_day();
        if days_ahead == 0 {
            return Vec::new();
        }

        match self.try_predict(days_ahead, kind, start).await {
            Ok(points) => points,
            Err(stage) => {
                warn!(
                    backend = %kind,
                    error = %stage,
                    "forecast stage failed; routing to heuristic fallback"
                );
                self.fallback_forecast(days_ahead, start).await
            }
        }
    }

    /// Summarize a forecast sequence. `None` for an empty sequence.
    pub fn get_insights(&self, forecast: &[ForecastPoint]) -> Option<InsightSummary> {
        generate_insights(forecast)
    }

    pub async fn is_backend_ready(&self, kind: BackendKind) -> bool {
        match self.handles.get(&kind) {
            Some(handle) => handle.backend.read().await.is_trained(),
            None => false,
        }
    }

    pub async fn last_trained(&self, kind: BackendKind) -> Option<DateTime<Utc>> {
        match self.handles.get(&kind) {
            Some(handle) => handle.backend.read().await.trained_at(),
            None => None,
        }
    }

    /// Retrain the given backends, reporting per-backend outcomes. One
    /// backend's failure never aborts the others.
    pub async fn retrain(&self, kinds: &[BackendKind], force: bool) -> Vec<RetrainOutcome> {
        let mut outcomes = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            outcomes.push(self.retrain_one(kind, force).await);
        }
        outcomes
    }

    async fn retrain_one(&self, kind: BackendKind, force: bool) -> RetrainOutcome {
        let Some(handle) = self.handles.get(&kind) else {
            return RetrainOutcome {
                backend: kind,
                trained: false,
                last_trained: None,
                error: Some("backend not registered".to_string()),
            };
        };

        let _gate = handle.train_gate.lock().await;
        if !force && handle.backend.read().await.is_trained() {
            return RetrainOutcome {
                backend: kind,
                trained: true,
                last_trained: handle.backend.read().await.trained_at(),
                error: None,
            };
        }

        let error = match self.fetch_series().await {
            Ok(series) => self
                .run_training(kind, handle, series)
                .await
                .err()
                .map(|e| e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = &error {
            error!(backend = %kind, error = %reason, "retraining failed");
        }

        let guard = handle.backend.read().await;
        RetrainOutcome {
            backend: kind,
            trained: guard.is_trained(),
            last_trained: guard.trained_at(),
            error,
        }
    }

    async fn try_predict(
        &self,
        days_ahead: u32,
        kind: BackendKind,
        start: NaiveDate,
    ) -> Result<Vec<ForecastPoint>, StageFailure> {
        let handle = self
            .handles
            .get(&kind)
            .ok_or_else(|| StageFailure::Execution(format!("backend '{kind}' not registered")))?;

        self.ensure_trained(kind, handle).await?;

        let backend = handle.backend.clone();
        let horizon = days_ahead as usize;
        let raw = task::spawn_blocking(move || backend.blocking_read().predict(horizon))
            .await
            .map_err(|e| StageFailure::Execution(e.to_string()))??;

        Ok(format_forecast(&raw, start, &self.format_defaults()))
    }

    /// Train the backend on demand if it is untrained, serialized by the
    /// per-backend gate. Empty history skips straight to the fallback.
    async fn ensure_trained(
        &self,
        kind: BackendKind,
        handle: &BackendHandle,
    ) -> Result<(), StageFailure> {
        if handle.backend.read().await.is_trained() {
            return Ok(());
        }

        let _gate = handle.train_gate.lock().await;
        // Re-check: another request may have finished training while this
        // one waited on the gate.
        if handle.backend.read().await.is_trained() {
            return Ok(());
        }

        let series = self.fetch_series().await?;
        info!(
            backend = %kind,
            points = series.len(),
            "training on demand; this request absorbs the fitting latency"
        );
        self.run_training(kind, handle, series).await
    }

    async fn fetch_series(&self) -> Result<Vec<f64>, StageFailure> {
        let history = self
            .history
            .get_historical_data(self.config.history_days)
            .await?;
        if history.is_empty() {
            return Err(DataError::Unavailable.into());
        }
        Ok(revenue_series(&history))
    }

    async fn run_training(
        &self,
        kind: BackendKind,
        handle: &BackendHandle,
        series: Vec<f64>,
    ) -> Result<(), StageFailure> {
        let mut guard = handle.backend.clone().write_owned().await;
        let training = task::spawn_blocking(move || guard.train(&series));

        match timeout(Duration::from_secs(self.config.train_timeout_secs), training).await {
            // The blocking task keeps the write lock until it finishes in
            // the background, so the handle stays consistent; this request
            // just stops waiting.
            Err(_) => Err(StageFailure::Execution(format!(
                "training '{kind}' timed out after {}s",
                self.config.train_timeout_secs
            ))),
            Ok(Err(join)) => Err(StageFailure::Execution(join.to_string())),
            Ok(Ok(Err(train_err))) => Err(train_err.into()),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }

    async fn fallback_forecast(&self, days_ahead: u32, start: NaiveDate) -> Vec<ForecastPoint> {
        let metrics = match self
            .history
            .get_recent_metrics(self.config.fallback.metrics_days)
            .await
        {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "recent metrics unavailable; using fixed fallback defaults");
                None
            }
        };

        let raw = match self
            .fallback
            .predict(days_ahead as usize, start, metrics.as_ref())
        {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "heuristic fallback failed; emitting zero-filled forecast");
                zero_filled(days_ahead as usize)
            }
        };

        format_forecast(&raw, start, &self.format_defaults())
    }

    fn format_defaults(&self) -> FormatDefaults {
        FormatDefaults {
            margin: self.config.default_margin,
            confidence: self.config.default_confidence,
            avg_order_value: self.config.avg_order_value,
        }
    }
}

/// Forecasts start tomorrow.
fn first_forecast_day() -> NaiveDate {
    Utc::now().date_naive() + Days::new(1)
}

fn revenue_series(history: &[HistoricalPoint]) -> Vec<f64> {
    history
        .iter()
        .map(|p| p.revenue.to_f64().unwrap_or(0.0))
        .collect()
}

/// Last-resort output: the caller always receives a sequence of the
/// requested length, even if every predictor is unusable.
fn zero_filled(horizon: usize) -> Vec<RawForecast> {
    vec![
        RawForecast {
            value: 0.0,
            lower: Some(0.0),
            upper: Some(0.0),
            orders: Some(0),
            confidence: Some(0.0),
        };
        horizon
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_filled_sequence_has_zero_confidence() {
        let raw = zero_filled(3);
        assert_eq!(raw.len(), 3);
        for point in raw {
            assert_eq!(point.value, 0.0);
            assert_eq!(point.confidence, Some(0.0));
        }
    }
}
