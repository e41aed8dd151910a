use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: remote file changed since the version token was read")]
    Conflict,

    #[error("unauthorized: check the access token")]
    Unauthorized,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// File contents plus the opaque token identifying that revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub version_token: String,
}

/// Remote file storage with optimistic concurrency.
///
/// Implementations must reject a write whose `expected_token` is not the
/// current revision with `StorageError::Conflict`, and must never retry on
/// their own.
#[async_trait]
pub trait ProgressRemote: Send + Sync {
    /// Fetch a file and its current version token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the file does not exist, or other storage errors.
    async fn fetch_file(&self, path: &str) -> Result<RemoteFile, StorageError>;

    /// Create or replace a file. Pass `None` only when creating a new file.
    ///
    /// Returns the new version token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a stale token, `Unauthorized` on bad
    /// credentials and `Transport` for anything else the backend reports.
    async fn write_file(
        &self,
        path: &str,
        content: &str,
        expected_token: Option<&str>,
    ) -> Result<String, StorageError>;
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    revision: u64,
}

/// In-memory remote for tests and offline prototyping.
///
/// Version tokens are revision counters rendered as strings.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    files: Arc<Mutex<HashMap<String, StoredFile>>>,
    failure: Arc<Mutex<Option<StorageError>>>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a file as another writer would, bumping its revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Transport` if the lock is poisoned.
    pub fn put_raw(&self, path: &str, content: impl Into<String>) -> Result<String, StorageError> {
        let mut guard = self
            .files
            .lock()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let revision = guard.get(path).map_or(1, |f| f.revision + 1);
        guard.insert(
            path.to_owned(),
            StoredFile {
                content: content.into(),
                revision,
            },
        );
        Ok(revision.to_string())
    }

    /// Current content of a file, if present.
    #[must_use]
    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .ok()
            .and_then(|guard| guard.get(path).map(|f| f.content.clone()))
    }

    /// Make every following call fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<StorageError>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = error;
        }
    }

    fn injected_failure(&self) -> Result<(), StorageError> {
        let guard = self
            .failure
            .lock()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        match guard.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProgressRemote for InMemoryRemote {
    async fn fetch_file(&self, path: &str) -> Result<RemoteFile, StorageError> {
        self.injected_failure()?;
        let guard = self
            .files
            .lock()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        guard
            .get(path)
            .map(|f| RemoteFile {
                content: f.content.clone(),
                version_token: f.revision.to_string(),
            })
            .ok_or(StorageError::NotFound)
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
        expected_token: Option<&str>,
    ) -> Result<String, StorageError> {
        self.injected_failure()?;
        let mut guard = self
            .files
            .lock()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let current = guard.get(path).map(|f| f.revision.to_string());
        if current.as_deref() != expected_token {
            return Err(StorageError::Conflict);
        }

        let revision = guard.get(path).map_or(1, |f| f.revision + 1);
        guard.insert(
            path.to_owned(),
            StoredFile {
                content: content.to_owned(),
                revision,
            },
        );
        Ok(revision.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let remote = InMemoryRemote::new();
        let err = remote.fetch_file("progress.json").await.unwrap_err();
        assert_eq!(err, StorageError::NotFound);
    }

    #[tokio::test]
    async fn create_then_update_with_current_token() {
        let remote = InMemoryRemote::new();
        let first = remote.write_file("p.json", "{}", None).await.unwrap();
        let fetched = remote.fetch_file("p.json").await.unwrap();
        assert_eq!(fetched.version_token, first);
        assert_eq!(fetched.content, "{}");

        let second = remote
            .write_file("p.json", "[]", Some(&first))
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(remote.content("p.json").as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn stale_or_missing_token_conflicts() {
        let remote = InMemoryRemote::new();
        let token = remote.write_file("p.json", "{}", None).await.unwrap();
        remote.put_raw("p.json", "{\"other\":1}").unwrap();

        let err = remote
            .write_file("p.json", "{}", Some(&token))
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::Conflict);

        let err = remote.write_file("p.json", "{}", None).await.unwrap_err();
        assert_eq!(err, StorageError::Conflict);
        assert_eq!(remote.content("p.json").as_deref(), Some("{\"other\":1}"));
    }

    #[tokio::test]
    async fn injected_failures_are_returned_verbatim() {
        let remote = InMemoryRemote::new();
        remote.fail_with(Some(StorageError::Unauthorized));
        assert_eq!(
            remote.fetch_file("p.json").await.unwrap_err(),
            StorageError::Unauthorized
        );
        remote.fail_with(None);
        assert_eq!(
            remote.fetch_file("p.json").await.unwrap_err(),
            StorageError::NotFound
        );
    }
}
