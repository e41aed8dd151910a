//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::model::{CatalogError, ProgressError, SessionItemId, TopicId};
use storage::StorageError;

/// Errors emitted by `ProgressSync`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be set when {other} is set")]
    Incomplete {
        var: &'static str,
        other: &'static str,
    },
    #[error("invalid API base URL: {0}")]
    InvalidApiBase(String),
    #[error("repository must look like owner/name, got {0:?}")]
    InvalidRepo(String),
}

/// Errors emitted by the practice controller's command handlers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("question data is not loaded")]
    NoData,
    #[error("no unanswered questions left for the selected topics")]
    NothingLeft,
    #[error("no session item with id {0}")]
    UnknownSessionItem(SessionItemId),
    #[error("session item {0} has already been rated")]
    AlreadyRated(SessionItemId),
    #[error("unknown topic {0}")]
    UnknownTopic(TopicId),
    #[error("topic {topic} is not in module {module}")]
    TopicOutsideModule { topic: TopicId, module: String },
    #[error("reset requires explicit confirmation")]
    ResetNotConfirmed,
    #[error("remote progress storage is not configured")]
    SyncNotConfigured,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}
