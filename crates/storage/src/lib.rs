#![forbid(unsafe_code)]

pub mod github;
pub mod local;
pub mod repository;

pub use github::{GitHubRemote, GitHubSettings};
pub use local::LocalFileRemote;
pub use repository::{InMemoryRemote, ProgressRemote, RemoteFile, StorageError};
