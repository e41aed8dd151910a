use std::env;

use url::Url;

use storage::GitHubSettings;
use storage::github::DEFAULT_API_BASE;

use crate::error::ConfigError;
use crate::sync_service::DEFAULT_PROGRESS_PATH;

pub const REPO_VAR: &str = "PRACTICE_GITHUB_REPO";
pub const TOKEN_VAR: &str = "PRACTICE_GITHUB_TOKEN";
pub const PATH_VAR: &str = "PRACTICE_PROGRESS_PATH";
pub const API_VAR: &str = "PRACTICE_GITHUB_API";

/// Settings for syncing progress to a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub api_base: Url,
    pub repo: String,
    pub token: String,
    pub progress_path: String,
}

impl RemoteConfig {
    /// Read the remote settings from the process environment.
    ///
    /// Returns `Ok(None)` when neither the repository nor the token is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when only one of repository and token is set, or a
    /// value is malformed.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`RemoteConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// See [`RemoteConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let (repo, token) = match (read(REPO_VAR), read(TOKEN_VAR)) {
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    var: TOKEN_VAR,
                    other: REPO_VAR,
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    var: REPO_VAR,
                    other: TOKEN_VAR,
                });
            }
            (Some(repo), Some(token)) => (repo, token),
        };

        if !is_owner_and_name(&repo) {
            return Err(ConfigError::InvalidRepo(repo));
        }

        let api_raw = read(API_VAR).unwrap_or_else(|| DEFAULT_API_BASE.into());
        let api_base = Url::parse(&api_raw)
            .map_err(|e| ConfigError::InvalidApiBase(format!("{api_raw}: {e}")))?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiBase(api_raw));
        }

        let progress_path = read(PATH_VAR).unwrap_or_else(|| DEFAULT_PROGRESS_PATH.into());

        Ok(Some(Self {
            api_base,
            repo,
            token,
            progress_path,
        }))
    }

    #[must_use]
    pub fn github_settings(&self) -> GitHubSettings {
        GitHubSettings {
            api_base: self.api_base.clone(),
            repo: self.repo.clone(),
            token: self.token.clone(),
        }
    }
}

fn is_owner_and_name(repo: &str) -> bool {
    match repo.split_once('/') {
        Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn nothing_set_means_no_remote() {
        assert_eq!(RemoteConfig::from_lookup(lookup(&[])).unwrap(), None);
    }

    #[test]
    fn defaults_fill_api_and_path() {
        let config = RemoteConfig::from_lookup(lookup(&[
            (REPO_VAR, "someone/notes"),
            (TOKEN_VAR, "secret"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.api_base.as_str(), "https://api.github.com/");
        assert_eq!(config.progress_path, "progress.json");
        assert_eq!(config.github_settings().repo, "someone/notes");
    }

    #[test]
    fn overrides_are_used() {
        let config = RemoteConfig::from_lookup(lookup(&[
            (REPO_VAR, "someone/notes"),
            (TOKEN_VAR, "secret"),
            (PATH_VAR, "study/progress.json"),
            (API_VAR, "http://localhost:8080/api/v3"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.progress_path, "study/progress.json");
        assert_eq!(config.api_base.host_str(), Some("localhost"));
    }

    #[test]
    fn half_configured_remote_is_an_error() {
        let err = RemoteConfig::from_lookup(lookup(&[(REPO_VAR, "someone/notes")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Incomplete {
                var: TOKEN_VAR,
                other: REPO_VAR
            }
        );

        let err = RemoteConfig::from_lookup(lookup(&[(TOKEN_VAR, "secret"), (REPO_VAR, "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete { var: REPO_VAR, .. }));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = RemoteConfig::from_lookup(lookup(&[(REPO_VAR, "notes"), (TOKEN_VAR, "t")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidRepo("notes".into()));

        let err = RemoteConfig::from_lookup(lookup(&[
            (REPO_VAR, "a/b"),
            (TOKEN_VAR, "t"),
            (API_VAR, "ftp://example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiBase(_)));
    }
}
