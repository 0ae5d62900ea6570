// Model artifact persistence
pub mod artifact_store;

// Historical data providers
pub mod history;

pub use artifact_store::{FileArtifactStore, MemoryArtifactStore};
pub use history::{CsvHistoryProvider, InMemoryHistoryProvider};
