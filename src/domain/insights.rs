//! Post-processing of a forecast sequence into summary statistics.
//!
//! Pure functions over formatted forecast points; nothing here is persisted
//! or cached, summaries are recomputed per request.

use crate::domain::types::{round2, ForecastPoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;

/// Direction of revenue between the first and last forecast day.
///
/// Equal endpoints classify as `Decreasing`; the comparison is strictly
/// greater-than.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueTrend {
    Increasing,
    Decreasing,
}

impl fmt::Display for RevenueTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevenueTrend::Increasing => write!(f, "increasing"),
            RevenueTrend::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// Read-only aggregate over a forecast sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total_predicted_revenue: f64,
    pub average_daily_revenue: f64,
    pub peak_day: NaiveDate,
    pub peak_revenue: f64,
    pub lowest_day: NaiveDate,
    pub lowest_revenue: f64,
    pub total_predicted_orders: u64,
    pub average_daily_orders: f64,
    pub revenue_trend: RevenueTrend,
    /// Coefficient of variation: population standard deviation of revenue
    /// divided by mean revenue, 0 when the mean is 0.
    pub volatility: f64,
    pub best_day_of_week: String,
}

/// Summarize a forecast sequence. Returns `None` for an empty sequence.
///
/// Ties for peak, trough and best weekday all resolve to the first
/// occurrence in sequence order.
pub fn generate_insights(forecast: &[ForecastPoint]) -> Option<InsightSummary> {
    if forecast.is_empty() {
        return None;
    }

    let revenues: Vec<f64> = forecast.iter().map(|p| p.revenue).collect();
    let total_revenue: f64 = revenues.iter().sum();
    let mean_revenue = revenues.iter().mean();

    let mut peak = &forecast[0];
    let mut lowest = &forecast[0];
    for point in &forecast[1..] {
        if point.revenue > peak.revenue {
            peak = point;
        }
        if point.revenue < lowest.revenue {
            lowest = point;
        }
    }

    let total_orders: u64 = forecast.iter().map(|p| p.orders as u64).sum();

    let trend = if forecast[forecast.len() - 1].revenue > forecast[0].revenue {
        RevenueTrend::Increasing
    } else {
        RevenueTrend::Decreasing
    };

    let volatility = if mean_revenue > 0.0 {
        revenues.iter().population_std_dev() / mean_revenue
    } else {
        0.0
    };

    // Group revenue by weekday, keeping first-seen order for tie-breaking.
    let mut weekdays: Vec<(&str, f64, usize)> = Vec::new();
    for point in forecast {
        match weekdays.iter_mut().find(|(d, _, _)| *d == point.day_of_week) {
            Some((_, sum, count)) => {
                *sum += point.revenue;
                *count += 1;
            }
            None => weekdays.push((point.day_of_week.as_str(), point.revenue, 1)),
        }
    }
    let mut best_day_of_week = weekdays[0].0;
    let mut best_mean = weekdays[0].1 / weekdays[0].2 as f64;
    for (day, sum, count) in &weekdays[1..] {
        let mean = sum / *count as f64;
        if mean > best_mean {
            best_mean = mean;
            best_day_of_week = day;
        }
    }

    Some(InsightSummary {
        total_predicted_revenue: round2(total_revenue),
        average_daily_revenue: round2(mean_revenue),
        peak_day: peak.date,
        peak_revenue: peak.revenue,
        lowest_day: lowest.date,
        lowest_revenue: lowest.revenue,
        total_predicted_orders: total_orders,
        average_daily_orders: round2(total_orders as f64 / forecast.len() as f64),
        revenue_trend: trend,
        volatility: round2(volatility),
        best_day_of_week: best_day_of_week.to_string(),
    })
}
