//! Sequence forecaster: windowed neural network over the normalized series.
//!
//! The series is min-max scaled, cut into fixed-length sliding windows, and a
//! small multi-layer network is trained by SGD on mean squared error with
//! dropout between layers and early stopping on a training-loss plateau.
//!
//! Prediction is single-step by construction: the network forecasts one day
//! from the most recent window, the normalized prediction is appended to the
//! window (dropping the oldest day), and the loop repeats until the horizon
//! is covered. Error compounds with horizon length under this autoregressive
//! strategy; that accumulation is expected behavior.

use super::backend::ForecastBackend;
use crate::config::SequenceConfig;
use crate::domain::errors::{ArtifactError, PredictError, TrainingError};
use crate::domain::ports::ArtifactStore;
use crate::domain::types::{BackendKind, RawForecast};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Serialize, Deserialize, Clone)]
struct Network {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    w3: Array1<f64>,
    b3: f64,
}

impl Network {
    fn init(window: usize, hidden: [usize; 2], rng: &mut impl Rng) -> Self {
        Self {
            w1: glorot(hidden[0], window, rng),
            b1: Array1::zeros(hidden[0]),
            w2: glorot(hidden[1], hidden[0], rng),
            b2: Array1::zeros(hidden[1]),
            w3: Array1::from_shape_fn(hidden[1], |_| {
                rng.random_range(-1.0..1.0) / (hidden[1] as f64).sqrt()
            }),
            b3: 0.0,
        }
    }

    fn forward(&self, x: &Array1<f64>) -> f64 {
        let a1 = (self.w1.dot(x) + &self.b1).mapv(relu);
        let a2 = (self.w2.dot(&a1) + &self.b2).mapv(relu);
        self.w3.dot(&a2) + self.b3
    }

    /// One SGD step on a single (window, next-day) pair with inverted
    /// dropout on both hidden activations. Returns the squared error.
    fn sgd_step(
        &mut self,
        x: &Array1<f64>,
        y: f64,
        lr: f64,
        dropout: f64,
        rng: &mut impl Rng,
    ) -> f64 {
        let z1 = self.w1.dot(x) + &self.b1;
        let a1 = z1.mapv(relu) * &dropout_mask(z1.len(), dropout, rng);
        let z2 = self.w2.dot(&a1) + &self.b2;
        let a2 = z2.mapv(relu) * &dropout_mask(z2.len(), dropout, rng);
        let prediction = self.w3.dot(&a2) + self.b3;

        let err = prediction - y;
        let d_pred = 2.0 * err;

        let d_a2 = self.w3.mapv(|w| w * d_pred);
        let d_z2 = &d_a2 * &z2.mapv(relu_grad);
        let d_a1 = self.w2.t().dot(&d_z2);
        let d_z1 = &d_a1 * &z1.mapv(relu_grad);

        self.w3.scaled_add(-lr * d_pred, &a2);
        self.b3 -= lr * d_pred;
        self.w2.scaled_add(-lr, &outer(&d_z2, &a1));
        self.b2.scaled_add(-lr, &d_z2);
        self.w1.scaled_add(-lr, &outer(&d_z1, x));
        self.b1.scaled_add(-lr, &d_z1);

        err * err
    }
}

#[derive(Serialize, Deserialize)]
struct SequenceArtifact {
    trained_at: DateTime<Utc>,
    network: Network,
    /// Min-max scaler bounds from training.
    min: f64,
    max: f64,
    /// Most recent normalized window, oldest first.
    window: Vec<f64>,
    final_loss: f64,
}

pub struct SequenceBackend {
    config: SequenceConfig,
    store: Arc<dyn ArtifactStore>,
    fitted: Option<SequenceArtifact>,
}

impl SequenceBackend {
    /// Construct the backend, attempting to restore a persisted model.
    pub fn new(config: SequenceConfig, store: Arc<dyn ArtifactStore>) -> Self {
        let fitted = load_artifact(store.as_ref());
        Self {
            config,
            store,
            fitted,
        }
    }

    fn scale(&self, series: &[f64]) -> (Vec<f64>, f64, f64) {
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };
        let normalized = series.iter().map(|v| (v - min) / span).collect();
        (normalized, min, max)
    }
}

impl ForecastBackend for SequenceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequence
    }

    fn train(&mut self, series: &[f64]) -> Result<(), TrainingError> {
        self.fitted = None;

        let w = self.config.window;
        let needed = w + 2;
        if series.len() < needed {
            return Err(TrainingError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let (normalized, min, max) = self.scale(series);
        let samples: Vec<(Array1<f64>, f64)> = (0..normalized.len() - w)
            .map(|i| {
                (
                    Array1::from_iter(normalized[i..i + w].iter().copied()),
                    normalized[i + w],
                )
            })
            .collect();

        let mut rng = rand::rng();
        let mut network = Network::init(w, self.config.hidden, &mut rng);
        let mut order: Vec<usize> = (0..samples.len()).collect();

        let mut best_loss = f64::INFINITY;
        let mut stalled = 0;
        let mut epoch_loss = f64::INFINITY;
        for epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;
            for &i in &order {
                let (x, y) = &samples[i];
                total += network.sgd_step(
                    x,
                    *y,
                    self.config.learning_rate,
                    self.config.dropout,
                    &mut rng,
                );
            }
            epoch_loss = total / samples.len() as f64;

            if !epoch_loss.is_finite() {
                return Err(TrainingError::NonConvergence {
                    reason: format!("training loss diverged at epoch {epoch}"),
                });
            }

            if best_loss - epoch_loss > 1e-6 {
                best_loss = epoch_loss;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= self.config.patience {
                    debug!(epoch, loss = epoch_loss, "early stop on loss plateau");
                    break;
                }
            }
        }

        let artifact = SequenceArtifact {
            trained_at: Utc::now(),
            network,
            min,
            max,
            window: normalized[normalized.len() - w..].to_vec(),
            final_loss: epoch_loss,
        };

        let bytes = serde_json::to_vec(&artifact).map_err(|source| ArtifactError::Corrupt {
            backend: BackendKind::Sequence,
            source,
        })?;
        self.store.save(BackendKind::Sequence, &bytes)?;

        info!(
            points = series.len(),
            loss = artifact.final_loss,
            "sequence model trained"
        );
        self.fitted = Some(artifact);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Vec<RawForecast>, PredictError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(PredictError::NotTrained(BackendKind::Sequence))?;

        let span = if fitted.max > fitted.min {
            fitted.max - fitted.min
        } else {
            1.0
        };

        let mut window: VecDeque<f64> = fitted.window.iter().copied().collect();
        let mut forecast = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let x = Array1::from_iter(window.iter().copied());
            let normalized = fitted.network.forward(&x);
            if !normalized.is_finite() {
                return Err(PredictError::Failed {
                    reason: "network produced a non-finite prediction".to_string(),
                });
            }
            let value = normalized * span + fitted.min;
            forecast.push(RawForecast {
                value,
                lower: Some(value * (1.0 - self.config.margin)),
                upper: Some(value * (1.0 + self.config.margin)),
                orders: None,
                confidence: None,
            });

            // Slide the window over our own normalized output.
            window.pop_front();
            window.push_back(normalized);
        }

        Ok(forecast)
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.fitted.as_ref().map(|f| f.trained_at)
    }
}

fn load_artifact(store: &dyn ArtifactStore) -> Option<SequenceArtifact> {
    match store.load(BackendKind::Sequence) {
        Ok(Some(bytes)) => match serde_json::from_slice::<SequenceArtifact>(&bytes) {
            Ok(artifact) => {
                info!(trained_at = %artifact.trained_at, "loaded persisted sequence model");
                Some(artifact)
            }
            Err(e) => {
                error!("failed to deserialize sequence model artifact: {e}");
                None
            }
        },
        Ok(None) => {
            warn!("no sequence model artifact found; backend starts untrained");
            None
        }
        Err(e) => {
            error!("failed to load sequence model artifact: {e}");
            None
        }
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

fn relu_grad(v: f64) -> f64 {
    if v > 0.0 { 1.0 } else { 0.0 }
}

fn glorot(rows: usize, cols: usize, rng: &mut impl Rng) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.random_range(-limit..limit))
}

fn dropout_mask(len: usize, rate: f64, rng: &mut impl Rng) -> Array1<f64> {
    if rate <= 0.0 {
        return Array1::ones(len);
    }
    let keep = 1.0 - rate;
    Array1::from_shape_fn(len, |_| {
        if rng.random::<f64>() < rate {
            0.0
        } else {
            1.0 / keep
        }
    })
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let a2 = a.view().insert_axis(Axis(1));
    let b2 = b.view().insert_axis(Axis(0));
    a2.dot(&b2)
}
