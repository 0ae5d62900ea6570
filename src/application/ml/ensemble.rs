//! Ensemble combiner: weighted blend of the statistical and sequence
//! backends, degrading to a single constituent when the other is unusable.

use super::backend::{ForecastBackend, SharedBackend};
use crate::config::EnsembleConfig;
use crate::domain::errors::{PredictError, TrainingError};
use crate::domain::types::{BackendKind, RawForecast};
use chrono::{DateTime, Utc};
use tracing::warn;

pub struct EnsembleBackend {
    config: EnsembleConfig,
    /// Bound margin applied to blended points, the more conservative of the
    /// two constituent conventions.
    margin: f64,
    statistical: SharedBackend,
    sequence: SharedBackend,
}

impl EnsembleBackend {
    pub fn new(
        config: EnsembleConfig,
        margin: f64,
        statistical: SharedBackend,
        sequence: SharedBackend,
    ) -> Self {
        Self {
            config,
            margin,
            statistical,
            sequence,
        }
    }

    fn constituents(&self) -> [(f64, BackendKind, &SharedBackend); 2] {
        [
            (
                self.config.statistical_weight,
                BackendKind::Statistical,
                &self.statistical,
            ),
            (
                self.config.sequence_weight,
                BackendKind::Sequence,
                &self.sequence,
            ),
        ]
    }
}

impl ForecastBackend for EnsembleBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ensemble
    }

    /// Train whichever constituents are untrained. Succeeds if at least one
    /// constituent ends up usable.
    fn train(&mut self, series: &[f64]) -> Result<(), TrainingError> {
        let mut failures = Vec::new();
        for (_, kind, shared) in self.constituents() {
            let mut guard = shared.blocking_write();
            if guard.is_trained() {
                continue;
            }
            if let Err(e) = guard.train(series) {
                warn!(backend = %kind, error = %e, "ensemble constituent failed to train");
                failures.push(format!("{kind}: {e}"));
            }
        }

        let usable = self
            .constituents()
            .iter()
            .any(|(_, _, shared)| shared.blocking_read().is_trained());
        if usable {
            Ok(())
        } else {
            Err(TrainingError::NonConvergence {
                reason: format!("no ensemble constituent trained ({})", failures.join("; ")),
            })
        }
    }

    fn predict(&self, horizon: usize) -> Result<Vec<RawForecast>, PredictError> {
        let mut available: Vec<(f64, Vec<RawForecast>)> = Vec::with_capacity(2);
        for (weight, kind, shared) in self.constituents() {
            let guard = shared.blocking_read();
            if !guard.is_trained() {
                continue;
            }
            match guard.predict(horizon) {
                Ok(points) => available.push((weight, points)),
                Err(e) => {
                    warn!(backend = %kind, error = %e, "ensemble constituent failed; skipping")
                }
            }
        }

        match available.len() {
            0 => Err(PredictError::NoBackendAvailable),
            // Identity blend: a single constituent's output passes through
            // unmodified, bounds and all.
            1 => Ok(available.remove(0).1),
            _ => {
                let total_weight: f64 = available.iter().map(|(w, _)| w).sum();
                let blended = (0..horizon)
                    .map(|i| {
                        let value = available
                            .iter()
                            .map(|(w, points)| w * points[i].value)
                            .sum::<f64>()
                            / total_weight;
                        RawForecast {
                            value,
                            lower: Some(value * (1.0 - self.margin)),
                            upper: Some(value * (1.0 + self.margin)),
                            orders: None,
                            confidence: Some(self.config.confidence),
                        }
                    })
                    .collect();
                Ok(blended)
            }
        }
    }

    // Readiness checks run on the async runtime, where blocking on a
    // constituent lock is not allowed. A constituent mid-training holds its
    // write lock and counts as unavailable until it finishes.
    fn is_trained(&self) -> bool {
        self.constituents()
            .iter()
            .any(|(_, _, shared)| shared.try_read().is_ok_and(|g| g.is_trained()))
    }

    fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.constituents()
            .iter()
            .filter_map(|(_, _, shared)| shared.try_read().ok().and_then(|g| g.trained_at()))
            .max()
    }
}
