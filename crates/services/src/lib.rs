#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod review_service;
pub mod sessions;
pub mod sync_service;

pub use practice_core::Clock;

pub use config::RemoteConfig;
pub use error::{ConfigError, PracticeError, SyncError};
pub use review_service::{RatingReport, ReviewRecorder, TopicUpdate};
pub use sessions::{
    Confirmation, PracticeController, SessionSelection, SessionSelector, SessionSummary,
};
pub use sync_service::{DEFAULT_PROGRESS_PATH, LoadOutcome, LoadReport, ProgressSync, SaveReport};
