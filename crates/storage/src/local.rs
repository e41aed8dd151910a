use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::repository::{ProgressRemote, RemoteFile, StorageError};

/// Progress storage in a local directory.
///
/// The version token is the SHA-256 of the file contents, so any external edit
/// between fetch and write is reported as a conflict.
#[derive(Debug, Clone)]
pub struct LocalFileRemote {
    root: PathBuf,
}

impl LocalFileRemote {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(StorageError::Transport(format!(
                "path must stay inside the progress directory: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn current_token(&self, file: &Path) -> Result<Option<String>, StorageError> {
        match tokio::fs::read(file).await {
            Ok(bytes) => Ok(Some(content_token(&bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&err)),
        }
    }
}

/// Hex SHA-256 of file contents.
#[must_use]
pub fn content_token(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn io_error(err: &std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::PermissionDenied => StorageError::Unauthorized,
        _ => StorageError::Transport(err.to_string()),
    }
}

#[async_trait]
impl ProgressRemote for LocalFileRemote {
    async fn fetch_file(&self, path: &str) -> Result<RemoteFile, StorageError> {
        let file = self.resolve(path)?;
        let bytes = tokio::fs::read(&file).await.map_err(|e| io_error(&e))?;
        let version_token = content_token(&bytes);
        let content =
            String::from_utf8(bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(RemoteFile {
            content,
            version_token,
        })
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
        expected_token: Option<&str>,
    ) -> Result<String, StorageError> {
        let file = self.resolve(path)?;
        let current = self.current_token(&file).await?;
        if current.as_deref() != expected_token {
            return Err(StorageError::Conflict);
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&e))?;
        }

        replace_file(&file.with_extension("tmp"), &file, content).await?;
        Ok(content_token(content.as_bytes()))
    }
}

/// Write beside the target and rename so readers never see a partial file.
///
/// The staging file is removed again when either step fails.
async fn replace_file(staging: &Path, target: &Path, content: &str) -> Result<(), StorageError> {
    let written = match tokio::fs::write(staging, content.as_bytes()).await {
        Ok(()) => tokio::fs::rename(staging, target).await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        if let Err(cleanup) = tokio::fs::remove_file(staging).await {
            if cleanup.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "could not remove staging file"
                );
            }
        }
        return Err(io_error(&err));
    }
    Ok(())
}
