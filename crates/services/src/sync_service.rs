use std::sync::Arc;

use practice_core::model::{ProgressFormat, ProgressStore};
use storage::{ProgressRemote, StorageError};

use crate::error::SyncError;

/// Default location of the progress file inside the remote.
pub const DEFAULT_PROGRESS_PATH: &str = "progress.json";

/// How a load resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file yet; a fresh store was created.
    FreshStart,
    Loaded { history_len: usize },
    /// A legacy bare array was wrapped into the current format.
    Migrated { entries: usize },
    /// Loaded verbatim although the version is not the one this build writes.
    UnknownVersion { version: Option<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub store: ProgressStore,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub version_token: String,
    /// The remote revision differed from the one last loaded or saved here,
    /// so another writer may have been overwritten.
    pub remote_changed: bool,
}

/// Loads and saves the whole progress document through a `ProgressRemote`.
pub struct ProgressSync {
    remote: Arc<dyn ProgressRemote>,
    path: String,
    known_token: Option<String>,
}

impl ProgressSync {
    #[must_use]
    pub fn new(remote: Arc<dyn ProgressRemote>) -> Self {
        Self::with_path(remote, DEFAULT_PROGRESS_PATH)
    }

    #[must_use]
    pub fn with_path(remote: Arc<dyn ProgressRemote>, path: impl Into<String>) -> Self {
        Self {
            remote,
            path: path.into(),
            known_token: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Version token seen by the last successful load or save.
    #[must_use]
    pub fn known_token(&self) -> Option<&str> {
        self.known_token.as_deref()
    }

    /// Fetch and decode the progress file.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` for transport failures other than a missing
    /// file, and `SyncError::Progress` if the content cannot be decoded.
    pub async fn load(&mut self) -> Result<LoadReport, SyncError> {
        let file = match self.remote.fetch_file(&self.path).await {
            Ok(file) => file,
            Err(StorageError::NotFound) => {
                tracing::info!(path = %self.path, "no progress file found; starting fresh");
                self.known_token = None;
                return Ok(LoadReport {
                    store: ProgressStore::new(),
                    outcome: LoadOutcome::FreshStart,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let loaded = ProgressStore::from_json_str(&file.content)?;
        let outcome = match loaded.format {
            ProgressFormat::Current => LoadOutcome::Loaded {
                history_len: loaded.store.history.len(),
            },
            ProgressFormat::Legacy { entries } => {
                tracing::info!(entries, "migrated legacy progress format");
                LoadOutcome::Migrated { entries }
            }
            ProgressFormat::UnknownVersion { version } => {
                tracing::warn!(
                    ?version,
                    "progress file has an unknown version; loaded as-is"
                );
                LoadOutcome::UnknownVersion { version }
            }
        };

        tracing::info!(path = %self.path, ?outcome, "loaded progress");
        self.known_token = Some(file.version_token);
        Ok(LoadReport {
            store: loaded.store,
            outcome,
        })
    }

    /// Write the whole store.
    ///
    /// The current remote token is re-read right before writing and sent with
    /// the write, so a change landing in between fails with `Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` with the transport's error unchanged
    /// (`Conflict`, `Unauthorized`, `Transport`); nothing is retried.
    pub async fn save(&mut self, store: &ProgressStore) -> Result<SaveReport, SyncError> {
        let content = store.to_json_pretty()?;

        let current = match self.remote.fetch_file(&self.path).await {
            Ok(file) => Some(file.version_token),
            Err(StorageError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };

        let remote_changed = current != self.known_token;
        if remote_changed {
            tracing::warn!(
                path = %self.path,
                "remote progress changed since it was last loaded; overwriting"
            );
        }

        let version_token = self
            .remote
            .write_file(&self.path, &content, current.as_deref())
            .await?;

        tracing::info!(path = %self.path, history = store.history.len(), "saved progress");
        self.known_token = Some(version_token.clone());
        Ok(SaveReport {
            version_token,
            remote_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::QuestionId;
    use storage::InMemoryRemote;

    fn sync(remote: &InMemoryRemote) -> ProgressSync {
        ProgressSync::new(Arc::new(remote.clone()))
    }

    #[tokio::test]
    async fn missing_file_starts_fresh() {
        let remote = InMemoryRemote::new();
        let report = sync(&remote).load().await.unwrap();
        assert_eq!(report.outcome, LoadOutcome::FreshStart);
        assert_eq!(report.store, ProgressStore::new());
    }

    #[tokio::test]
    async fn legacy_array_is_migrated() {
        let remote = InMemoryRemote::new();
        remote.put_raw(DEFAULT_PROGRESS_PATH, r#"["a", "b"]"#).unwrap();
        let mut sync = sync(&remote);

        let report = sync.load().await.unwrap();
        assert_eq!(report.outcome, LoadOutcome::Migrated { entries: 2 });
        assert_eq!(
            report.store.history,
            vec![QuestionId::from_raw("a"), QuestionId::from_raw("b")]
        );
        assert_eq!(sync.known_token(), Some("1"));
    }

    #[tokio::test]
    async fn unknown_version_loads_with_outcome() {
        let remote = InMemoryRemote::new();
        remote
            .put_raw(DEFAULT_PROGRESS_PATH, r#"{"version": 7, "history": ["x"]}"#)
            .unwrap();
        let report = sync(&remote).load().await.unwrap();
        assert_eq!(
            report.outcome,
            LoadOutcome::UnknownVersion { version: Some(7) }
        );
        assert_eq!(report.store.version, Some(7));
    }

    #[tokio::test]
    async fn undecodable_file_is_a_progress_error() {
        let remote = InMemoryRemote::new();
        remote.put_raw(DEFAULT_PROGRESS_PATH, "not json").unwrap();
        let err = sync(&remote).load().await.unwrap_err();
        assert!(matches!(err, SyncError::Progress(_)));
    }

    #[tokio::test]
    async fn save_creates_then_updates() {
        let remote = InMemoryRemote::new();
        let mut sync = sync(&remote);
        sync.load().await.unwrap();

        let mut store = ProgressStore::new();
        let first = sync.save(&store).await.unwrap();
        assert!(!first.remote_changed);

        store.record_history(QuestionId::from_raw("M::T::q"));
        let second = sync.save(&store).await.unwrap();
        assert!(!second.remote_changed);
        assert_ne!(first.version_token, second.version_token);

        let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
        assert!(written.contains("M::T::q"));
        assert!(written.contains("\n  \"history\""));
    }

    #[tokio::test]
    async fn save_flags_remote_changes_since_load() {
        let remote = InMemoryRemote::new();
        remote.put_raw(DEFAULT_PROGRESS_PATH, "[]").unwrap();
        let mut sync = sync(&remote);
        sync.load().await.unwrap();

        remote.put_raw(DEFAULT_PROGRESS_PATH, r#"["other device"]"#).unwrap();
        let report = sync.save(&ProgressStore::new()).await.unwrap();
        assert!(report.remote_changed);
    }

    #[tokio::test]
    async fn storage_failures_surface_unchanged() {
        let remote = InMemoryRemote::new();
        let mut sync = sync(&remote);
        remote.fail_with(Some(StorageError::Unauthorized));

        let err = sync.save(&ProgressStore::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Storage(StorageError::Unauthorized)));

        let err = sync.load().await.unwrap_err();
        assert!(matches!(err, SyncError::Storage(StorageError::Unauthorized)));
    }

    #[tokio::test]
    async fn stale_token_write_conflicts() {
        struct RacingRemote {
            inner: InMemoryRemote,
        }

        #[async_trait::async_trait]
        impl ProgressRemote for RacingRemote {
            async fn fetch_file(
                &self,
                path: &str,
            ) -> Result<storage::RemoteFile, StorageError> {
                self.inner.fetch_file(path).await
            }

            async fn write_file(
                &self,
                path: &str,
                content: &str,
                expected_token: Option<&str>,
            ) -> Result<String, StorageError> {
                // Another device writes between the token check and our write.
                self.inner.put_raw(path, "[]")?;
                self.inner.write_file(path, content, expected_token).await
            }
        }

        let inner = InMemoryRemote::new();
        let mut sync = ProgressSync::new(Arc::new(RacingRemote {
            inner: inner.clone(),
        }));

        let err = sync.save(&ProgressStore::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Storage(StorageError::Conflict)));
        assert_eq!(sync.known_token(), None);
    }
}
