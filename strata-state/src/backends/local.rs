//! Local file backend for state storage
//!
//! State is a pretty-printed JSON file (default `strata.state.json`). A
//! sibling `.lock` file holds the `LockInfo` of the run that owns it.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use strata_core::config::BackendSettings;

use crate::backend::{BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "strata.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn from_settings(settings: &BackendSettings) -> Self {
        let path = settings
            .attributes
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(Self::DEFAULT_STATE_FILE);
        Self::with_path(PathBuf::from(path))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        let content = match std::fs::read_to_string(&self.lock_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(&self.lock_path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BackendError::InvalidState(format!("Failed to parse lock file: {}", e)))
    }

    /// Create the lock file, failing if it already exists
    fn create_lock_file(&self, lock: &LockInfo) -> std::io::Result<()> {
        let content = serde_json::to_vec_pretty(lock)?;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        file.write_all(&content)
    }

    fn remove_lock_file(&self) -> BackendResult<()> {
        std::fs::remove_file(&self.lock_path).map_err(|e| BackendError::io(&self.lock_path, e))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match std::fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(&self.state_path, e)),
        };

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(existing) = self.read_state().await?
            && existing.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: existing.lineage,
                actual: state.lineage.clone(),
            });
        }

        // Write beside the target and rename so a crash never truncates state
        let content = serde_json::to_string_pretty(state)?;
        let tmp_path = self.state_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(|e| BackendError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.state_path)
            .map_err(|e| BackendError::io(&self.state_path, e))?;

        debug!("Wrote state serial {} to {}", state.serial, self.state_path.display());
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = self.read_lock()? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            warn!(
                "Taking over expired lock {} held by {}",
                existing.id, existing.owner
            );
            self.remove_lock_file()?;
        }

        let lock = LockInfo::new(operation);
        match self.create_lock_file(&lock) {
            Ok(()) => Ok(lock),
            // Another run created the lock between our read and create
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => match self.read_lock()? {
                Some(existing) => Err(BackendError::locked(&existing)),
                None => Err(BackendError::io(&self.lock_path, e)),
            },
            Err(e) => Err(BackendError::io(&self.lock_path, e)),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;

        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock_file()
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        let existing = self
            .read_lock()?
            .ok_or_else(|| BackendError::LockNotFound(lock_id.to_string()))?;

        if existing.id != lock_id {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        self.remove_lock_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use strata_core::resource::Value;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_backend_read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(backend.read_state().await.unwrap().is_none());

        let mut state = StateFile::new();
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let read_back = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read_back.serial, 1);
        assert_eq!(read_back.lineage, state.lineage);
    }

    #[tokio::test]
    async fn test_write_rejects_other_lineage() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        backend.write_state(&StateFile::new()).await.unwrap();

        let err = backend.write_state(&StateFile::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::LineageMismatch { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_state_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let backend = LocalBackend::with_path(path);
        let err = backend.read_state().await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_local_backend_locking() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert!(backend.lock_path().exists());

        let err = backend.acquire_lock("destroy").await.unwrap_err();
        assert!(matches!(err, BackendError::Locked { .. }));

        backend.release_lock(&lock).await.unwrap();
        assert!(!backend.lock_path().exists());

        let lock2 = backend.acquire_lock("destroy").await.unwrap();
        assert_eq!(lock2.operation, "destroy");
        backend.release_lock(&lock2).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let stale = LockInfo::with_timeout("apply", -1);
        std::fs::write(backend.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn test_release_of_foreign_lock_fails() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let held = backend.acquire_lock("apply").await.unwrap();

        let other = LockInfo::new("apply");
        let err = backend.release_lock(&other).await.unwrap_err();
        assert!(matches!(err, BackendError::LockMismatch { .. }));
        assert!(backend.lock_path().exists());

        backend.release_lock(&held).await.unwrap();
    }

    #[tokio::test]
    async fn test_force_unlock() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let err = backend.force_unlock("nope").await.unwrap_err();
        assert!(matches!(err, BackendError::LockNotFound(_)));

        let lock = backend.acquire_lock("apply").await.unwrap();
        let err = backend.force_unlock("other-id").await.unwrap_err();
        assert!(matches!(err, BackendError::LockMismatch { .. }));

        backend.force_unlock(&lock.id).await.unwrap();
        assert!(!backend.lock_path().exists());
    }

    #[test]
    fn test_local_backend_from_settings() {
        let default = LocalBackend::from_settings(&BackendSettings {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        });
        assert_eq!(default.state_path(), Path::new("strata.state.json"));
        assert_eq!(default.lock_path(), Path::new("strata.state.lock"));

        let custom = LocalBackend::from_settings(&BackendSettings {
            backend_type: "local".to_string(),
            attributes: [("path".to_string(), Value::string("infra/prod.json"))]
                .into_iter()
                .collect(),
        });
        assert_eq!(custom.state_path(), Path::new("infra/prod.json"));
    }
}
