//! Statistical forecaster: seasonal autoregressive model with order search.
//!
//! Candidates vary the AR order, a differencing step and an optional weekly
//! seasonal lag; each is fit by least squares over a lagged design matrix and
//! the winner minimizes AIC. Forecasting extrapolates the chosen recursion
//! `horizon` steps in one pass. Bounds are a fixed symmetric margin around
//! the point estimate, a stand-in for a true prediction interval.

use super::backend::ForecastBackend;
use crate::config::StatisticalConfig;
use crate::domain::errors::{ArtifactError, PredictError, TrainingError};
use crate::domain::ports::ArtifactStore;
use crate::domain::types::{BackendKind, RawForecast};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type ArModel = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ArSpec {
    /// AR order.
    p: usize,
    /// Differencing order, 0 or 1.
    d: usize,
    /// Whether a seasonal lag regressor is included.
    seasonal: bool,
}

impl ArSpec {
    fn max_lag(&self, seasonal_period: usize) -> usize {
        if self.seasonal {
            self.p.max(seasonal_period)
        } else {
            self.p
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StatisticalArtifact {
    trained_at: DateTime<Utc>,
    spec: ArSpec,
    seasonal_period: usize,
    aic: f64,
    model: ArModel,
    /// Trailing values of the (differenced) training series, oldest first.
    tail: Vec<f64>,
    /// Last observed value on the original scale, for undifferencing.
    last_value: f64,
}

pub struct StatisticalBackend {
    config: StatisticalConfig,
    store: Arc<dyn ArtifactStore>,
    fitted: Option<StatisticalArtifact>,
}

impl StatisticalBackend {
    /// Construct the backend, attempting to restore a persisted model.
    /// A missing or corrupt artifact leaves the backend untrained.
    pub fn new(config: StatisticalConfig, store: Arc<dyn ArtifactStore>) -> Self {
        let fitted = load_artifact(store.as_ref());
        Self {
            config,
            store,
            fitted,
        }
    }

    fn fit_candidate(&self, diff: &[f64], spec: ArSpec) -> Option<(ArModel, f64)> {
        let max_lag = spec.max_lag(self.config.seasonal_period);
        let k = spec.p + usize::from(spec.seasonal);
        if diff.len() <= max_lag + k + 2 {
            return None;
        }

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(diff.len() - max_lag);
        let mut targets: Vec<f64> = Vec::with_capacity(diff.len() - max_lag);
        for t in max_lag..diff.len() {
            rows.push(row_features(
                &diff[..t],
                spec,
                self.config.seasonal_period,
            ));
            targets.push(diff[t]);
        }

        let x = DenseMatrix::from_2d_vec(&rows).ok()?;
        let model =
            LinearRegression::fit(&x, &targets, LinearRegressionParameters::default()).ok()?;
        let fitted = model.predict(&x).ok()?;

        let n = targets.len() as f64;
        let rss: f64 = fitted
            .iter()
            .zip(targets.iter())
            .map(|(f, y)| (f - y) * (f - y))
            .sum();
        if !rss.is_finite() {
            return None;
        }
        let aic = n * (rss.max(1e-9) / n).ln() + 2.0 * (k as f64 + 1.0);

        Some((model, aic))
    }
}

impl ForecastBackend for StatisticalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Statistical
    }

    fn train(&mut self, series: &[f64]) -> Result<(), TrainingError> {
        // Retraining replaces the model; a failed attempt leaves the
        // backend untrained rather than keeping a stale fit.
        self.fitted = None;

        let needed = self.config.seasonal_period * 2;
        if series.len() < needed {
            return Err(TrainingError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let mut best: Option<(ArSpec, ArModel, f64)> = None;
        for d in 0..=1usize {
            let diff = difference(series, d);
            for p in 1..=self.config.max_p {
                for seasonal in [false, true] {
                    let spec = ArSpec { p, d, seasonal };
                    if let Some((model, aic)) = self.fit_candidate(&diff, spec) {
                        debug!(p, d, seasonal, aic, "candidate fit");
                        if best.as_ref().is_none_or(|(_, _, best_aic)| aic < *best_aic) {
                            best = Some((spec, model, aic));
                        }
                    }
                }
            }
        }

        let (spec, model, aic) = best.ok_or_else(|| TrainingError::NonConvergence {
            reason: "no autoregressive candidate produced a valid fit".to_string(),
        })?;

        let diff = difference(series, spec.d);
        let max_lag = spec.max_lag(self.config.seasonal_period);
        let artifact = StatisticalArtifact {
            trained_at: Utc::now(),
            spec,
            seasonal_period: self.config.seasonal_period,
            aic,
            model,
            tail: diff[diff.len() - max_lag..].to_vec(),
            last_value: series[series.len() - 1],
        };

        let bytes =
            serde_json::to_vec(&artifact).map_err(|source| ArtifactError::Corrupt {
                backend: BackendKind::Statistical,
                source,
            })?;
        self.store.save(BackendKind::Statistical, &bytes)?;

        info!(
            p = spec.p,
            d = spec.d,
            seasonal = spec.seasonal,
            aic,
            points = series.len(),
            "statistical model trained"
        );
        self.fitted = Some(artifact);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Vec<RawForecast>, PredictError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(PredictError::NotTrained(BackendKind::Statistical))?;

        let mut buffer = fitted.tail.clone();
        let mut diff_forecast = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let row = row_features(&buffer, fitted.spec, fitted.seasonal_period);
            let x = DenseMatrix::from_2d_vec(&vec![row]).map_err(|e| PredictError::Failed {
                reason: format!("matrix creation failed: {e}"),
            })?;
            let step = fitted.model.predict(&x).map_err(|e| PredictError::Failed {
                reason: format!("model inference failed: {e}"),
            })?;
            let value = step.first().copied().ok_or_else(|| PredictError::Failed {
                reason: "model returned no prediction".to_string(),
            })?;
            buffer.push(value);
            diff_forecast.push(value);
        }

        // Undifference back to the original scale when d = 1.
        let values: Vec<f64> = if fitted.spec.d > 0 {
            let mut running = fitted.last_value;
            diff_forecast
                .into_iter()
                .map(|delta| {
                    running += delta;
                    running
                })
                .collect()
        } else {
            diff_forecast
        };

        Ok(values
            .into_iter()
            .map(|value| RawForecast {
                value,
                lower: Some(value * (1.0 - self.config.margin)),
                upper: Some(value * (1.0 + self.config.margin)),
                orders: None,
                confidence: None,
            })
            .collect())
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.fitted.as_ref().map(|f| f.trained_at)
    }
}

fn load_artifact(store: &dyn ArtifactStore) -> Option<StatisticalArtifact> {
    match store.load(BackendKind::Statistical) {
        Ok(Some(bytes)) => match serde_json::from_slice::<StatisticalArtifact>(&bytes) {
            Ok(artifact) => {
                info!(trained_at = %artifact.trained_at, "loaded persisted statistical model");
                Some(artifact)
            }
            Err(e) => {
                error!("failed to deserialize statistical model artifact: {e}");
                None
            }
        },
        Ok(None) => {
            warn!("no statistical model artifact found; backend starts untrained");
            None
        }
        Err(e) => {
            error!("failed to load statistical model artifact: {e}");
            None
        }
    }
}

/// Lag features for the step following `history` (newest value last).
fn row_features(history: &[f64], spec: ArSpec, seasonal_period: usize) -> Vec<f64> {
    let n = history.len();
    let mut row = Vec::with_capacity(spec.p + usize::from(spec.seasonal));
    for i in 1..=spec.p {
        row.push(history[n - i]);
    }
    if spec.seasonal {
        row.push(history[n - seasonal_period]);
    }
    row
}

fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact_store::MemoryArtifactStore;

    fn weekly_series(days: usize) -> Vec<f64> {
        (0..days)
            .map(|i| {
                let weekday_boost = match i % 7 {
                    5 | 6 => 1.2,
                    4 => 1.15,
                    0 => 0.9,
                    _ => 1.0,
                };
                1000.0 * weekday_boost + i as f64 * 2.0
            })
            .collect()
    }

    fn backend() -> StatisticalBackend {
        StatisticalBackend::new(
            StatisticalConfig::default(),
            Arc::new(MemoryArtifactStore::new()),
        )
    }

    #[test]
    fn rejects_short_series() {
        let mut backend = backend();
        let err = backend.train(&[1.0; 5]).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientData { .. }));
        assert!(!backend.is_trained());
    }

    #[test]
    fn predict_requires_training() {
        let backend = backend();
        let err = backend.predict(7).unwrap_err();
        assert!(matches!(err, PredictError::NotTrained(_)));
    }

    #[test]
    fn trains_and_forecasts_weekly_pattern() {
        let mut backend = backend();
        backend.train(&weekly_series(120)).unwrap();
        assert!(backend.is_trained());
        assert!(backend.trained_at().is_some());

        let forecast = backend.predict(14).unwrap();
        assert_eq!(forecast.len(), 14);
        for point in &forecast {
            assert!(point.value.is_finite());
            let lower = point.lower.unwrap();
            let upper = point.upper.unwrap();
            assert!((lower - point.value * 0.9).abs() < 1e-9);
            assert!((upper - point.value * 1.1).abs() < 1e-9);
            assert!(point.confidence.is_none());
        }
        // The fit should stay in the neighborhood of the series level.
        let last = forecast[forecast.len() - 1].value;
        assert!(last > 500.0 && last < 3000.0, "drifted to {last}");
    }

    #[test]
    fn persisted_artifact_restores_trained_state() {
        let store = Arc::new(MemoryArtifactStore::new());
        let mut original =
            StatisticalBackend::new(StatisticalConfig::default(), store.clone());
        original.train(&weekly_series(90)).unwrap();
        let expected = original.predict(7).unwrap();

        let restored = StatisticalBackend::new(StatisticalConfig::default(), store);
        assert!(restored.is_trained());
        let forecast = restored.predict(7).unwrap();
        for (a, b) in forecast.iter().zip(expected.iter()) {
            assert!((a.value - b.value).abs() < 1e-9);
        }
    }
}
