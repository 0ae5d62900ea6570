//! Port interfaces to the external collaborators: the historical data
//! provider and the model artifact store. Implementations live in
//! `infrastructure`.

use crate::domain::errors::{ArtifactError, DataError};
use crate::domain::types::{BackendKind, HistoricalPoint, RecentMetrics};
use async_trait::async_trait;

/// Source of historical daily business metrics.
///
/// Sequences are ascending by date with exactly one point per calendar day;
/// days without activity are zero-filled by the provider, not by the models.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch up to `days` trailing days of history.
    async fn get_historical_data(&self, days: u32) -> Result<Vec<HistoricalPoint>, DataError>;

    /// Trailing averages over the last `days` days, or `None` when there is
    /// no data at all.
    async fn get_recent_metrics(&self, days: u32) -> Result<Option<RecentMetrics>, DataError>;
}

/// Persistence for trained model state.
///
/// Deliberately synchronous: it is only called from blocking training code,
/// under the owning backend's write lock, so the persisted artifact and the
/// in-memory handle change together.
pub trait ArtifactStore: Send + Sync {
    /// Load the persisted artifact for a backend, `None` if never trained.
    fn load(&self, backend: BackendKind) -> Result<Option<Vec<u8>>, ArtifactError>;

    /// Replace the persisted artifact for a backend.
    fn save(&self, backend: BackendKind, bytes: &[u8]) -> Result<(), ArtifactError>;
}
