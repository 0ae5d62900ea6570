//! Model artifact persistence.

use crate::domain::errors::ArtifactError;
use crate::domain::ports::ArtifactStore;
use crate::domain::types::BackendKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Stores one JSON artifact per backend under a model directory.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, backend: BackendKind) -> PathBuf {
        self.dir.join(format!("{backend}.json"))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self, backend: BackendKind) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path(backend);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|source| ArtifactError::Io { backend, source })?;
        debug!(backend = %backend, path = %path.display(), "loaded model artifact");
        Ok(Some(bytes))
    }

    fn save(&self, backend: BackendKind, bytes: &[u8]) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| ArtifactError::Io { backend, source })?;
        let path = self.path(backend);
        std::fs::write(&path, bytes).map_err(|source| ArtifactError::Io { backend, source })?;
        debug!(backend = %backend, path = %path.display(), "saved model artifact");
        Ok(())
    }
}

/// In-memory artifact store for tests. Counts saves so serialization
/// properties can be asserted.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<BackendKind, Vec<u8>>>,
    saves: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self, backend: BackendKind) -> Result<Option<Vec<u8>>, ArtifactError> {
        let artifacts = self
            .artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(artifacts.get(&backend).cloned())
    }

    fn save(&self, backend: BackendKind, bytes: &[u8]) -> Result<(), ArtifactError> {
        let mut artifacts = self
            .artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        artifacts.insert(backend, bytes.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
