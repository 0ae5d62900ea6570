//! Turns raw backend output into dated, fully populated forecast points.

use crate::domain::types::{round2, ForecastPoint, RawForecast};
use chrono::{Days, NaiveDate};

/// Back-fill values for fields a backend may omit.
#[derive(Debug, Clone, Copy)]
pub struct FormatDefaults {
    /// Symmetric bound margin when a backend emits no bounds.
    pub margin: f64,
    /// Confidence when a backend emits none.
    pub confidence: f64,
    /// Average order value used to estimate orders from revenue.
    pub avg_order_value: f64,
}

/// Assign calendar dates starting at `start`, back-fill bounds, orders and
/// confidence, and derive cumulative revenue and growth rate.
///
/// Bounds are clamped so `lower <= revenue <= upper` holds even when a
/// backend emits inverted bounds at the margins (negative points flip the
/// multiplicative convention).
pub fn format_forecast(
    raw: &[RawForecast],
    start: NaiveDate,
    defaults: &FormatDefaults,
) -> Vec<ForecastPoint> {
    let mut formatted = Vec::with_capacity(raw.len());
    let mut cumulative = 0.0;
    let mut previous_revenue: Option<f64> = None;

    for (i, point) in raw.iter().enumerate() {
        let date = start + Days::new(i as u64);
        let revenue = round2(point.value);

        let lower = point
            .lower
            .unwrap_or(point.value * (1.0 - defaults.margin));
        let upper = point
            .upper
            .unwrap_or(point.value * (1.0 + defaults.margin));
        let lower_bound = round2(lower.min(revenue));
        let upper_bound = round2(upper.max(revenue));

        let orders = point.orders.unwrap_or_else(|| {
            if defaults.avg_order_value > 0.0 {
                (point.value / defaults.avg_order_value).max(0.0) as u32
            } else {
                0
            }
        });

        cumulative += revenue;
        let growth_rate = match previous_revenue {
            None => 0.0,
            Some(prev) if prev == 0.0 => 0.0,
            Some(prev) => round2((revenue - prev) / prev * 100.0),
        };
        previous_revenue = Some(revenue);

        formatted.push(ForecastPoint {
            date,
            day_of_week: date.format("%A").to_string(),
            revenue,
            lower_bound,
            upper_bound,
            orders,
            confidence: point.confidence.unwrap_or(defaults.confidence),
            cumulative_revenue: round2(cumulative),
            growth_rate,
        });
    }

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> FormatDefaults {
        FormatDefaults {
            margin: 0.10,
            confidence: 0.85,
            avg_order_value: 65.0,
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn dates_increase_daily_from_start() {
        let raw: Vec<RawForecast> = (0..10).map(|i| RawForecast::point(i as f64)).collect();
        let formatted = format_forecast(&raw, start(), &defaults());

        assert_eq!(formatted.len(), 10);
        for (i, point) in formatted.iter().enumerate() {
            assert_eq!(point.date, start() + Days::new(i as u64));
        }
        assert_eq!(formatted[0].day_of_week, "Monday");
        assert_eq!(formatted[5].day_of_week, "Saturday");
    }

    #[test]
    fn omitted_fields_are_back_filled() {
        let formatted = format_forecast(&[RawForecast::point(650.0)], start(), &defaults());
        let point = &formatted[0];

        assert_eq!(point.lower_bound, 585.0);
        assert_eq!(point.upper_bound, 715.0);
        assert_eq!(point.orders, 10);
        assert_eq!(point.confidence, 0.85);
    }

    #[test]
    fn backend_supplied_fields_are_kept() {
        let raw = RawForecast {
            value: 100.0,
            lower: Some(95.0),
            upper: Some(104.0),
            orders: Some(3),
            confidence: Some(0.7),
        };
        let point = &format_forecast(&[raw], start(), &defaults())[0];
        assert_eq!(point.lower_bound, 95.0);
        assert_eq!(point.upper_bound, 104.0);
        assert_eq!(point.orders, 3);
        assert_eq!(point.confidence, 0.7);
    }

    #[test]
    fn inverted_bounds_are_clamped_around_revenue() {
        // A negative point estimate flips multiplicative bounds.
        let raw = RawForecast {
            value: -50.0,
            lower: Some(-45.0),
            upper: Some(-55.0),
            orders: Some(0),
            confidence: None,
        };
        let point = &format_forecast(&[raw], start(), &defaults())[0];
        assert!(point.lower_bound <= point.revenue);
        assert!(point.upper_bound >= point.revenue);
    }

    #[test]
    fn cumulative_revenue_is_running_sum() {
        let raw: Vec<RawForecast> = [10.0, 20.5, 30.25]
            .iter()
            .map(|&v| RawForecast::point(v))
            .collect();
        let formatted = format_forecast(&raw, start(), &defaults());
        assert_eq!(formatted[0].cumulative_revenue, 10.0);
        assert_eq!(formatted[1].cumulative_revenue, 30.5);
        assert_eq!(formatted[2].cumulative_revenue, 60.75);
    }

    #[test]
    fn growth_rate_is_percent_change_with_zero_guards() {
        let raw: Vec<RawForecast> = [100.0, 150.0, 0.0, 75.0]
            .iter()
            .map(|&v| RawForecast::point(v))
            .collect();
        let formatted = format_forecast(&raw, start(), &defaults());
        assert_eq!(formatted[0].growth_rate, 0.0);
        assert_eq!(formatted[1].growth_rate, 50.0);
        assert_eq!(formatted[2].growth_rate, -100.0);
        // Previous revenue is zero: growth pinned to 0 instead of dividing.
        assert_eq!(formatted[3].growth_rate, 0.0);
    }

    #[test]
    fn orders_divisor_of_zero_yields_zero_orders() {
        let mut d = defaults();
        d.avg_order_value = 0.0;
        let point = &format_forecast(&[RawForecast::point(650.0)], start(), &d)[0];
        assert_eq!(point.orders, 0);
    }
}
