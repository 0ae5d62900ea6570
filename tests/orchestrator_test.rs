use async_trait::async_trait;
use chrono::{Days, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use salecast::application::orchestrator::ForecastOrchestrator;
use salecast::config::{ForecastConfig, SequenceConfig};
use salecast::domain::errors::DataError;
use salecast::domain::ports::HistoryProvider;
use salecast::domain::types::{BackendKind, HistoricalPoint, RecentMetrics};
use salecast::infrastructure::{InMemoryHistoryProvider, MemoryArtifactStore};
use std::sync::Arc;

/// A provider whose every call fails, to exercise the fallback path.
struct BrokenProvider;

#[async_trait]
impl HistoryProvider for BrokenProvider {
    async fn get_historical_data(&self, _days: u32) -> Result<Vec<HistoricalPoint>, DataError> {
        Err(DataError::Provider(anyhow::anyhow!("connection refused")))
    }

    async fn get_recent_metrics(&self, _days: u32) -> Result<Option<RecentMetrics>, DataError> {
        Err(DataError::Provider(anyhow::anyhow!("connection refused")))
    }
}

fn test_config() -> ForecastConfig {
    ForecastConfig {
        sequence: SequenceConfig {
            window: 10,
            hidden: [16, 8],
            max_epochs: 40,
            ..SequenceConfig::default()
        },
        ..ForecastConfig::default()
    }
}

/// Synthetic history with a weekly revenue pattern, ending yesterday.
fn seeded_history(days: usize) -> Vec<HistoricalPoint> {
    let start = Utc::now().date_naive() - Days::new(days as u64);
    (0..days)
        .map(|i| {
            let revenue = 12_000.0
                + 1_500.0 * ((i % 7) as f64 - 3.0)
                + 10.0 * i as f64;
            HistoricalPoint {
                date: start + Days::new(i as u64),
                revenue: Decimal::from_f64(revenue).unwrap(),
                orders: (revenue / 65.0) as u32,
            }
        })
        .collect()
}

fn orchestrator_with(
    history: Arc<dyn HistoryProvider>,
) -> (ForecastOrchestrator, Arc<MemoryArtifactStore>) {
    let store = Arc::new(MemoryArtifactStore::new());
    let orchestrator = ForecastOrchestrator::new(test_config(), history, store.clone());
    (orchestrator, store)
}

#[tokio::test]
async fn predict_returns_exact_horizon_with_consecutive_dates() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, _) = orchestrator_with(history);

    for days_ahead in [1u32, 7, 30] {
        let forecast = orchestrator
            .predict(days_ahead, BackendKind::Statistical)
            .await;
        assert_eq!(forecast.len(), days_ahead as usize);

        let tomorrow = Utc::now().date_naive() + Days::new(1);
        assert_eq!(forecast[0].date, tomorrow);
        for pair in forecast.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Days::new(1));
        }
        for point in &forecast {
            assert!(point.confidence > 0.0);
            assert!(point.lower_bound <= point.revenue);
            assert!(point.revenue <= point.upper_bound);
        }
    }
}

#[tokio::test]
async fn untrained_backend_trains_on_demand() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, store) = orchestrator_with(history);

    assert!(!orchestrator.is_backend_ready(BackendKind::Statistical).await);
    assert!(orchestrator
        .last_trained(BackendKind::Statistical)
        .await
        .is_none());

    let forecast = orchestrator.predict(7, BackendKind::Statistical).await;
    assert_eq!(forecast.len(), 7);

    assert!(orchestrator.is_backend_ready(BackendKind::Statistical).await);
    assert!(orchestrator
        .last_trained(BackendKind::Statistical)
        .await
        .is_some());
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn cumulative_and_growth_metadata_hold() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, _) = orchestrator_with(history);

    let forecast = orchestrator.predict(10, BackendKind::Statistical).await;

    let mut running = 0.0;
    for (i, point) in forecast.iter().enumerate() {
        running += point.revenue;
        assert!((point.cumulative_revenue - running).abs() < 0.01);

        if i == 0 {
            assert_eq!(point.growth_rate, 0.0);
        } else {
            let prev = forecast[i - 1].revenue;
            if prev == 0.0 {
                assert_eq!(point.growth_rate, 0.0);
            } else {
                let expected = (point.revenue - prev) / prev * 100.0;
                assert!((point.growth_rate - expected).abs() < 0.01);
            }
        }
    }
}

#[tokio::test]
async fn empty_history_routes_to_fallback() {
    let history = Arc::new(InMemoryHistoryProvider::empty());
    let (orchestrator, store) = orchestrator_with(history);

    let forecast = orchestrator.predict(7, BackendKind::Sequence).await;
    assert_eq!(forecast.len(), 7);
    for point in &forecast {
        assert_eq!(point.confidence, 0.70);
        // Fixed defaults drive the fallback when no history exists at all.
        assert!(point.revenue >= 15_000.0 * 0.9 * 0.95);
        assert!(point.revenue <= 15_000.0 * 1.2 * 1.05);
    }
    assert!(!orchestrator.is_backend_ready(BackendKind::Sequence).await);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn broken_provider_still_yields_a_forecast() {
    let (orchestrator, _) = orchestrator_with(Arc::new(BrokenProvider));

    let forecast = orchestrator.predict(5, BackendKind::Ensemble).await;
    assert_eq!(forecast.len(), 5);
    for point in &forecast {
        assert_eq!(point.confidence, 0.70);
        assert!(point.revenue > 0.0);
    }
}

#[tokio::test]
async fn ensemble_with_single_constituent_is_identity() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, _) = orchestrator_with(history);

    // Train only the statistical backend; the sequence backend stays cold.
    let outcomes = orchestrator.retrain(&[BackendKind::Statistical], false).await;
    assert!(outcomes[0].trained);
    assert!(!orchestrator.is_backend_ready(BackendKind::Sequence).await);

    let via_statistical = orchestrator.predict(7, BackendKind::Statistical).await;
    let via_ensemble = orchestrator.predict(7, BackendKind::Ensemble).await;
    assert_eq!(via_ensemble, via_statistical);
    assert!(!orchestrator.is_backend_ready(BackendKind::Sequence).await);
}

#[tokio::test]
async fn ensemble_blends_when_both_constituents_are_trained() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, _) = orchestrator_with(history);

    let outcomes = orchestrator
        .retrain(&[BackendKind::Statistical, BackendKind::Sequence], false)
        .await;
    assert!(outcomes.iter().all(|o| o.trained));

    let forecast = orchestrator.predict(7, BackendKind::Ensemble).await;
    assert_eq!(forecast.len(), 7);
    for point in &forecast {
        assert_eq!(point.confidence, 0.92);
    }
}

#[tokio::test]
async fn retrain_reports_failures_without_aborting_others() {
    // Thirteen days: enough for the sequence window of 10 plus two targets,
    // one short of the statistical minimum of two seasonal periods.
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(13)));
    let (orchestrator, _) = orchestrator_with(history);

    let outcomes = orchestrator
        .retrain(&[BackendKind::Statistical, BackendKind::Sequence], true)
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].backend, BackendKind::Statistical);
    assert!(!outcomes[0].trained);
    assert!(outcomes[0].error.as_deref().unwrap().contains("insufficient"));

    assert_eq!(outcomes[1].backend, BackendKind::Sequence);
    assert!(outcomes[1].trained);
    assert!(outcomes[1].error.is_none());
}

#[tokio::test]
async fn retrain_without_force_skips_trained_backends() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, store) = orchestrator_with(history);

    orchestrator.retrain(&[BackendKind::Statistical], false).await;
    assert_eq!(store.save_count(), 1);

    let outcomes = orchestrator.retrain(&[BackendKind::Statistical], false).await;
    assert!(outcomes[0].trained);
    assert_eq!(store.save_count(), 1);

    orchestrator.retrain(&[BackendKind::Statistical], true).await;
    assert_eq!(store.save_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_predictions_train_exactly_once() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let store = Arc::new(MemoryArtifactStore::new());
    let orchestrator = Arc::new(ForecastOrchestrator::new(
        test_config(),
        history,
        store.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.predict(7, BackendKind::Statistical).await
        }));
    }
    for handle in handles {
        let forecast = handle.await.unwrap();
        assert_eq!(forecast.len(), 7);
    }

    // The per-backend training gate serialized training: the in-memory
    // handle and the persisted artifact were written exactly once.
    assert!(orchestrator.is_backend_ready(BackendKind::Statistical).await);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn insights_summarize_an_orchestrated_forecast() {
    let history = Arc::new(InMemoryHistoryProvider::new(seeded_history(90)));
    let (orchestrator, _) = orchestrator_with(history);

    let forecast = orchestrator.predict(7, BackendKind::Statistical).await;
    let summary = orchestrator.get_insights(&forecast).unwrap();

    assert!(summary.total_predicted_revenue > 0.0);
    assert!(summary.peak_revenue >= summary.lowest_revenue);
    assert!(!summary.best_day_of_week.is_empty());
    assert!(orchestrator.get_insights(&[]).is_none());
}
