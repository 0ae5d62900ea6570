use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observed day of business activity, as produced by the history
/// provider. Gap days are filled with zero before any backend sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: u32,
}

/// Trailing averages over a recent window, used by the heuristic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecentMetrics {
    pub avg_daily_revenue: f64,
    pub avg_daily_orders: f64,
}

/// The closed set of trainable forecast backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Statistical,
    Sequence,
    Ensemble,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Statistical,
        BackendKind::Sequence,
        BackendKind::Ensemble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Statistical => "statistical",
            BackendKind::Sequence => "sequence",
            BackendKind::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "statistical" => Ok(BackendKind::Statistical),
            "sequence" => Ok(BackendKind::Sequence),
            "ensemble" => Ok(BackendKind::Ensemble),
            _ => anyhow::bail!(
                "Invalid backend: {}. Must be 'statistical', 'sequence', or 'ensemble'",
                s
            ),
        }
    }
}

/// Raw backend output for a single horizon day. Bounds, orders and
/// confidence are optional; the formatter back-fills whatever a backend
/// leaves out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawForecast {
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub orders: Option<u32>,
    pub confidence: Option<f64>,
}

impl RawForecast {
    /// A bare point estimate; everything else is derived at formatting time.
    pub fn point(value: f64) -> Self {
        Self {
            value,
            lower: None,
            upper: None,
            orders: None,
            confidence: None,
        }
    }
}

/// One fully formatted forecast day handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub revenue: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub orders: u32,
    pub confidence: f64,
    pub cumulative_revenue: f64,
    pub growth_rate: f64,
}

/// Per-backend result of a retraining pass. One backend failing never
/// hides the outcome of the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub backend: BackendKind,
    pub trained: bool,
    pub last_trained: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Round to two decimal places, the precision of all caller-facing money
/// values.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_round_trips_through_str() {
        for kind in BackendKind::ALL {
            let parsed: BackendKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn backend_kind_rejects_unknown_names() {
        assert!("prophet".parse::<BackendKind>().is_err());
    }

    #[test]
    fn round2_half_cent() {
        assert_eq!(round2(10.005), 10.01);
        assert_eq!(round2(-3.333), -3.33);
    }
}
