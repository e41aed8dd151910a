//! Progress storage backed by the GitHub repository contents API.
//!
//! The blob `sha` GitHub returns for a file is used as the version token, so a
//! `PUT` carrying an outdated `sha` is rejected by GitHub itself.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::repository::{ProgressRemote, RemoteFile, StorageError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("practice-scheduler/", env!("CARGO_PKG_VERSION"));

/// Connection settings for a GitHub repository.
#[derive(Clone, Debug)]
pub struct GitHubSettings {
    pub api_base: Url,
    /// `owner/name`.
    pub repo: String,
    pub token: String,
}

pub struct GitHubRemote {
    client: Client,
    settings: GitHubSettings,
}

impl GitHubRemote {
    /// # Errors
    ///
    /// Returns `StorageError::Transport` if the HTTP client cannot be built.
    pub fn new(settings: GitHubSettings) -> Result<Self, StorageError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn contents_url(&self, path: &str) -> Result<Url, StorageError> {
        contents_url(&self.settings.api_base, &self.settings.repo, path)
    }
}

/// `{api}/repos/{repo}/contents/{path}`.
///
/// # Errors
///
/// Returns `StorageError::Transport` if the joined URL is invalid.
pub fn contents_url(api_base: &Url, repo: &str, path: &str) -> Result<Url, StorageError> {
    let mut base = api_base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    let relative = format!(
        "repos/{}/contents/{}",
        repo.trim_matches('/'),
        path.trim_start_matches('/')
    );
    base.join(&relative)
        .map_err(|e| StorageError::Transport(format!("invalid contents URL: {e}")))
}

/// Decode the base64 `content` field, which GitHub wraps at 60 columns.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for invalid base64 or non UTF-8 content.
pub fn decode_content(encoded: &str) -> Result<String, StorageError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Map a non-success status to the storage error the caller sees.
#[must_use]
pub fn status_error(status: StatusCode, message: &str) -> StorageError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized,
        StatusCode::NOT_FOUND => StorageError::NotFound,
        // 409 for a stale sha, 422 when a sha is missing for an existing file.
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => StorageError::Conflict,
        other => StorageError::Transport(format!("GitHub API {}: {message}", other.as_u16())),
    }
}

fn commit_message() -> String {
    format!(
        "Update progress (FSRS) - {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_owned());
    Err(status_error(status, &message))
}

fn transport(err: &reqwest::Error) -> StorageError {
    StorageError::Transport(err.to_string())
}

#[async_trait]
impl ProgressRemote for GitHubRemote {
    async fn fetch_file(&self, path: &str) -> Result<RemoteFile, StorageError> {
        let url = self.contents_url(path)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.settings.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let body: ContentsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tracing::debug!(path, sha = %body.sha, "fetched remote file");
        Ok(RemoteFile {
            content: decode_content(&body.content)?,
            version_token: body.sha,
        })
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
        expected_token: Option<&str>,
    ) -> Result<String, StorageError> {
        let url = self.contents_url(path)?;
        let payload = PutRequest {
            message: commit_message(),
            content: BASE64.encode(content.as_bytes()),
            sha: expected_token,
        };

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.settings.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let body: PutResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tracing::debug!(path, sha = %body.content.sha, "wrote remote file");
        Ok(body.content.sha)
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_url_joins_repo_and_path() {
        let base = Url::parse(DEFAULT_API_BASE).unwrap();
        let url = contents_url(&base, "alice/notes", "progress.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/alice/notes/contents/progress.json"
        );
    }

    #[test]
    fn contents_url_keeps_enterprise_prefix() {
        let base = Url::parse("https://git.example.com/api/v3").unwrap();
        let url = contents_url(&base, "team/study", "/data/progress.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://git.example.com/api/v3/repos/team/study/contents/data/progress.json"
        );
    }

    #[test]
    fn decode_content_ignores_line_wrapping() {
        let encoded = BASE64.encode(r#"{"version": 2, "history": []}"#);
        let (head, tail) = encoded.split_at(10);
        let wrapped = format!("{head}\n{tail}\n");
        assert_eq!(
            decode_content(&wrapped).unwrap(),
            r#"{"version": 2, "history": []}"#
        );
    }

    #[test]
    fn decode_content_rejects_garbage() {
        assert!(matches!(
            decode_content("***"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn statuses_map_to_contract_errors() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, "Bad credentials"),
            StorageError::Unauthorized
        );
        assert_eq!(status_error(StatusCode::FORBIDDEN, ""), StorageError::Unauthorized);
        assert_eq!(status_error(StatusCode::NOT_FOUND, ""), StorageError::NotFound);
        assert_eq!(status_error(StatusCode::CONFLICT, ""), StorageError::Conflict);
        assert_eq!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, ""),
            StorageError::Conflict
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, "upstream"),
            StorageError::Transport("GitHub API 502: upstream".into())
        );
    }

    #[test]
    fn put_request_omits_sha_when_creating() {
        let create = PutRequest {
            message: "m".into(),
            content: "e30=".into(),
            sha: None,
        };
        let json = serde_json::to_value(&create).unwrap();
        assert!(json.get("sha").is_none());

        let update = PutRequest { sha: Some("abc"), ..create };
        assert_eq!(serde_json::to_value(&update).unwrap()["sha"], "abc");
    }

    #[test]
    fn commit_message_names_the_update() {
        assert!(commit_message().starts_with("Update progress (FSRS) - "));
    }
}
