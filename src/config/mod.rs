//! Configuration module for Salecast.
//!
//! Structured configuration loading from environment variables, organized by
//! concern: orchestration, per-backend tuning, and the heuristic fallback.
//!
//! Per-backend bound margins are deliberately configuration, not derived
//! model uncertainty: they are fixed approximations, not calibrated
//! intervals, and each backend carries its own convention.

use std::env;
use std::path::PathBuf;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Statistical (seasonal autoregressive) backend tuning.
#[derive(Debug, Clone)]
pub struct StatisticalConfig {
    /// Maximum AR order searched.
    pub max_p: usize,
    /// Seasonality period in days; weekly business cycles.
    pub seasonal_period: usize,
    /// Symmetric bound margin around each point estimate.
    pub margin: f64,
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            seasonal_period: 7,
            margin: 0.10,
        }
    }
}

/// Sequence (windowed neural network) backend tuning.
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Sliding window length in days.
    pub window: usize,
    /// Hidden layer widths.
    pub hidden: [usize; 2],
    /// Dropout rate applied between layers during training.
    pub dropout: f64,
    pub learning_rate: f64,
    pub max_epochs: usize,
    /// Early-stopping patience on training-loss plateau, in epochs.
    pub patience: usize,
    /// Symmetric bound margin around each point estimate.
    pub margin: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window: 30,
            hidden: [64, 32],
            dropout: 0.2,
            learning_rate: 0.01,
            max_epochs: 100,
            patience: 10,
            margin: 0.05,
        }
    }
}

/// Ensemble blending configuration.
///
/// The sequence backend has historically tracked the series better, so it
/// carries the larger weight. Bounds on blended points use the more
/// conservative constituent margin (the statistical ±10%).
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    pub statistical_weight: f64,
    pub sequence_weight: f64,
    pub confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            statistical_weight: 0.4,
            sequence_weight: 0.6,
            confidence: 0.92,
        }
    }
}

/// Heuristic fallback predictor configuration.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Trailing window for recent-average metrics, in days.
    pub metrics_days: u32,
    /// Defaults when no historical data exists at all.
    pub default_avg_revenue: f64,
    pub default_avg_orders: f64,
    /// Symmetric bound margin around each point estimate.
    pub margin: f64,
    pub confidence: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            metrics_days: 30,
            default_avg_revenue: 15_000.0,
            default_avg_orders: 230.0,
            margin: 0.15,
            confidence: 0.70,
        }
    }
}

/// Main forecasting configuration.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Directory for persisted model artifacts.
    pub model_dir: PathBuf,
    /// History depth fetched for on-demand and scheduled training.
    pub history_days: u32,
    /// Bound on synchronous on-demand training inside a prediction request.
    /// On expiry the request falls back; training finishes in the background.
    pub train_timeout_secs: u64,
    /// Average order value used to estimate orders from revenue when a
    /// backend provides no order estimate.
    pub avg_order_value: f64,
    /// Bound margin back-filled when a backend omits bounds.
    pub default_margin: f64,
    /// Confidence back-filled when a backend omits it.
    pub default_confidence: f64,
    pub statistical: StatisticalConfig,
    pub sequence: SequenceConfig,
    pub ensemble: EnsembleConfig,
    pub fallback: FallbackConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("storage/models"),
            history_days: 365,
            train_timeout_secs: 120,
            avg_order_value: 65.0,
            default_margin: 0.10,
            default_confidence: 0.85,
            statistical: StatisticalConfig::default(),
            sequence: SequenceConfig::default(),
            ensemble: EnsembleConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_dir: env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            history_days: env_parse("HISTORY_DAYS", defaults.history_days),
            train_timeout_secs: env_parse("TRAIN_TIMEOUT_SECS", defaults.train_timeout_secs),
            avg_order_value: env_parse("AVG_ORDER_VALUE", defaults.avg_order_value),
            default_margin: env_parse("DEFAULT_MARGIN", defaults.default_margin),
            default_confidence: env_parse("DEFAULT_CONFIDENCE", defaults.default_confidence),
            statistical: StatisticalConfig {
                max_p: env_parse("STATISTICAL_MAX_P", defaults.statistical.max_p),
                seasonal_period: env_parse(
                    "STATISTICAL_SEASONAL_PERIOD",
                    defaults.statistical.seasonal_period,
                ),
                margin: env_parse("STATISTICAL_MARGIN", defaults.statistical.margin),
            },
            sequence: SequenceConfig {
                window: env_parse("SEQUENCE_WINDOW", defaults.sequence.window),
                max_epochs: env_parse("SEQUENCE_MAX_EPOCHS", defaults.sequence.max_epochs),
                patience: env_parse("SEQUENCE_PATIENCE", defaults.sequence.patience),
                learning_rate: env_parse("SEQUENCE_LEARNING_RATE", defaults.sequence.learning_rate),
                dropout: env_parse("SEQUENCE_DROPOUT", defaults.sequence.dropout),
                margin: env_parse("SEQUENCE_MARGIN", defaults.sequence.margin),
                ..defaults.sequence
            },
            ensemble: EnsembleConfig {
                statistical_weight: env_parse(
                    "ENSEMBLE_STATISTICAL_WEIGHT",
                    defaults.ensemble.statistical_weight,
                ),
                sequence_weight: env_parse(
                    "ENSEMBLE_SEQUENCE_WEIGHT",
                    defaults.ensemble.sequence_weight,
                ),
                confidence: env_parse("ENSEMBLE_CONFIDENCE", defaults.ensemble.confidence),
            },
            fallback: FallbackConfig {
                metrics_days: env_parse("FALLBACK_METRICS_DAYS", defaults.fallback.metrics_days),
                default_avg_revenue: env_parse(
                    "FALLBACK_DEFAULT_REVENUE",
                    defaults.fallback.default_avg_revenue,
                ),
                default_avg_orders: env_parse(
                    "FALLBACK_DEFAULT_ORDERS",
                    defaults.fallback.default_avg_orders,
                ),
                margin: env_parse("FALLBACK_MARGIN", defaults.fallback.margin),
                confidence: env_parse("FALLBACK_CONFIDENCE", defaults.fallback.confidence),
            },
        }
    }
}
