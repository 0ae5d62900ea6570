//! Heuristic fallback predictor.
//!
//! Dependency-free terminal fallback: recent trailing averages (or fixed
//! defaults), day-of-week seasonality multipliers, and bounded random
//! jitter. It carries no trained state and is the liveness guarantee behind
//! every other backend.

use crate::config::FallbackConfig;
use crate::domain::errors::PredictError;
use crate::domain::types::{round2, RawForecast, RecentMetrics};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::Rng;

pub struct HeuristicPredictor {
    config: FallbackConfig,
}

impl HeuristicPredictor {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Forecast `horizon` days starting at `start`, using recent trailing
    /// averages when available and fixed defaults otherwise.
    pub fn predict(
        &self,
        horizon: usize,
        start: NaiveDate,
        metrics: Option<&RecentMetrics>,
    ) -> Result<Vec<RawForecast>, PredictError> {
        let (avg_revenue, avg_orders) = match metrics {
            Some(m) => (m.avg_daily_revenue, m.avg_daily_orders),
            None => (
                self.config.default_avg_revenue,
                self.config.default_avg_orders,
            ),
        };
        if !avg_revenue.is_finite() || !avg_orders.is_finite() {
            return Err(PredictError::Failed {
                reason: "recent metrics are non-finite".to_string(),
            });
        }

        let mut rng = rand::rng();
        let forecast = (0..horizon)
            .map(|i| {
                let date = start + Days::new(i as u64);
                let multiplier = weekday_multiplier(date.weekday());
                let jitter = rng.random_range(0.95..=1.05);

                let revenue = avg_revenue * multiplier * jitter;
                let orders = (avg_orders * multiplier * jitter).round().max(0.0) as u32;

                RawForecast {
                    value: round2(revenue),
                    lower: Some(round2(revenue * (1.0 - self.config.margin))),
                    upper: Some(round2(revenue * (1.0 + self.config.margin))),
                    orders: Some(orders),
                    confidence: Some(self.config.confidence),
                }
            })
            .collect();

        Ok(forecast)
    }
}

fn weekday_multiplier(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Sat | Weekday::Sun => 1.2,
        Weekday::Fri => 1.15,
        Weekday::Mon => 0.9,
        _ => 1.0,
    }
}
