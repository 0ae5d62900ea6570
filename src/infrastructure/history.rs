//! Historical data providers.
//!
//! Both providers uphold the history contract: ascending dates, exactly one
//! point per calendar day, gaps zero-filled before any model sees the data.

use crate::domain::errors::DataError;
use crate::domain::ports::HistoryProvider;
use crate::domain::types::{HistoricalPoint, RecentMetrics};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Sort ascending and fill missing calendar days with zero-activity points.
/// Duplicate dates keep the last occurrence.
pub fn gap_fill(mut points: Vec<HistoricalPoint>) -> Vec<HistoricalPoint> {
    if points.is_empty() {
        return points;
    }
    points.sort_by_key(|p| p.date);
    points.reverse();
    points.dedup_by_key(|p| p.date);
    points.reverse();

    let first = points[0].date;
    let last = points[points.len() - 1].date;
    let mut filled = Vec::new();
    let mut iter = points.into_iter().peekable();
    let mut date = first;
    while date <= last {
        if iter.peek().map(|p| p.date) == Some(date) {
            if let Some(p) = iter.next() {
                filled.push(p);
            }
        } else {
            filled.push(HistoricalPoint {
                date,
                revenue: Decimal::ZERO,
                orders: 0,
            });
        }
        date = date + Days::new(1);
    }
    filled
}

fn trailing(points: &[HistoricalPoint], days: u32) -> &[HistoricalPoint] {
    let keep = (days as usize).min(points.len());
    &points[points.len() - keep..]
}

fn metrics_of(points: &[HistoricalPoint]) -> Option<RecentMetrics> {
    if points.is_empty() {
        return None;
    }
    let revenue: f64 = points
        .iter()
        .map(|p| p.revenue.to_f64().unwrap_or(0.0))
        .sum();
    let orders: f64 = points.iter().map(|p| p.orders as f64).sum();
    Some(RecentMetrics {
        avg_daily_revenue: revenue / points.len() as f64,
        avg_daily_orders: orders / points.len() as f64,
    })
}

/// Gap-filled history held in memory. Used in tests and as the seeded
/// provider for simulations.
pub struct InMemoryHistoryProvider {
    points: Vec<HistoricalPoint>,
}

impl InMemoryHistoryProvider {
    pub fn new(points: Vec<HistoricalPoint>) -> Self {
        Self {
            points: gap_fill(points),
        }
    }

    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistoryProvider {
    async fn get_historical_data(&self, days: u32) -> Result<Vec<HistoricalPoint>, DataError> {
        Ok(trailing(&self.points, days).to_vec())
    }

    async fn get_recent_metrics(&self, days: u32) -> Result<Option<RecentMetrics>, DataError> {
        Ok(metrics_of(trailing(&self.points, days)))
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    revenue: Decimal,
    orders: u32,
}

/// Reads `date,revenue,orders` rows from a CSV file. The trailing window is
/// anchored at the newest date in the file so exported snapshots stay usable
/// regardless of when they were taken.
pub struct CsvHistoryProvider {
    path: PathBuf,
}

impl CsvHistoryProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Vec<HistoricalPoint>, DataError> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("failed to open history file {}", self.path.display()))
            .map_err(DataError::Provider)?;

        let mut points = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row
                .context("malformed history row")
                .map_err(DataError::Provider)?;
            points.push(HistoricalPoint {
                date: row.date,
                revenue: row.revenue,
                orders: row.orders,
            });
        }
        Ok(gap_fill(points))
    }
}

#[async_trait]
impl HistoryProvider for CsvHistoryProvider {
    async fn get_historical_data(&self, days: u32) -> Result<Vec<HistoricalPoint>, DataError> {
        let points = self.read_all()?;
        Ok(trailing(&points, days).to_vec())
    }

    async fn get_recent_metrics(&self, days: u32) -> Result<Option<RecentMetrics>, DataError> {
        let points = self.read_all()?;
        Ok(metrics_of(trailing(&points, days)))
    }
}
