use log::debug;
use reqwest::blocking::{RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::domain::{ContentStore, RemoteFile, RevisionTag, StoreError};
use crate::encoding::EncodedContent;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "shelf-cli";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when interacting with the Github contents API
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("failed to create HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("invalid Github API base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("failed to {operation} {url}")]
    Request {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Github API returned status {status} for {url}: {message}")]
    ApiStatus {
        status: StatusCode,
        url: String,
        message: String,
    },

    #[error("failed to parse response from {url}")]
    ParseResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// File returned by `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'body> {
    message: &'body str,
    content: &'body str,
    branch: &'body str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'body str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: CommittedFile,
}

#[derive(Debug, Deserialize)]
struct CommittedFile {
    sha: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`ContentStore`] backed by a Github repository's contents API.
pub struct GithubContentStore {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
    api_base: Url,
}

impl GithubContentStore {
    /// Create a client for api.github.com.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::ClientInit`] if the HTTP client cannot be initialized.
    ///
    /// # Panics
    ///
    /// This method panics if called from within an async runtime. See docs on
    /// [`reqwest::blocking`] for details.
    pub fn new(config: RemoteConfig) -> Result<Self, GithubError> {
        Self::with_api_base(config, GITHUB_API_BASE)
    }

    /// Create a client for another API root, e.g. Github Enterprise
    /// (`https://ghe.example.com/api/v3`) or a local stub.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::InvalidBaseUrl`] if `api_base` is not an absolute
    /// http(s) URL, [`GithubError::ClientInit`] if the HTTP client cannot be initialized.
    pub fn with_api_base(config: RemoteConfig, api_base: &str) -> Result<Self, GithubError> {
        let api_base = Url::parse(api_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| GithubError::InvalidBaseUrl {
                url: api_base.to_owned(),
            })?;

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(GithubError::ClientInit)?;

        Ok(Self {
            client,
            config,
            api_base,
        })
    }

    /// URL of `path` in the contents API. Each path segment is percent-encoded,
    /// so file names with spaces or non-ASCII characters are safe.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::InvalidBaseUrl`] if the base URL cannot take path segments.
    pub fn contents_url(&self, path: &str) -> Result<Url, GithubError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GithubError::InvalidBaseUrl {
                url: self.api_base.to_string(),
            })?
            .pop_if_empty()
            .extend([
                "repos",
                self.config.owner(),
                self.config.repository(),
                "contents",
            ])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Fetch a file's base64 content and blob SHA from the configured branch.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::ApiStatus`] for any non-success status (404 included),
    /// [`GithubError::Request`] or [`GithubError::ParseResponse`] otherwise.
    pub fn get_contents(&self, path: &str) -> Result<ContentsFile, GithubError> {
        let mut url = self.contents_url(path)?;
        url.query_pairs_mut().append_pair("ref", self.config.branch());

        debug!("GET {url}");
        let response = self
            .authorized(self.client.get(url.clone()))
            .send()
            .map_err(|source| GithubError::Request {
                operation: "fetch",
                url: url.to_string(),
                source,
            })?;
        let response = check_status(response, &url)?;

        let file: ContentsResponse =
            response
                .json()
                .map_err(|source| GithubError::ParseResponse {
                    url: url.to_string(),
                    source,
                })?;

        Ok(ContentsFile {
            content: file.content,
            sha: file.sha,
        })
    }

    /// Create or update a file on the configured branch, returning the new blob SHA.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::ApiStatus`] for any non-success status,
    /// [`GithubError::Request`] or [`GithubError::ParseResponse`] otherwise.
    pub fn put_contents(
        &self,
        path: &str,
        content: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, GithubError> {
        let url = self.contents_url(path)?;
        let body = PutContentsRequest {
            message,
            content,
            branch: self.config.branch(),
            sha,
        };

        debug!("PUT {url} (sha: {})", sha.unwrap_or("none"));
        let response = self
            .authorized(self.client.put(url.clone()))
            .json(&body)
            .send()
            .map_err(|source| GithubError::Request {
                operation: "upload",
                url: url.to_string(),
                source,
            })?;
        let response = check_status(response, &url)?;

        let committed: PutContentsResponse =
            response
                .json()
                .map_err(|source| GithubError::ParseResponse {
                    url: url.to_string(),
                    source,
                })?;

        Ok(committed.content.sha)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.config.token()))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }
}

/// Raw file fields of a contents API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentsFile {
    /// Base64, wrapped with line breaks.
    pub content: String,
    pub sha: String,
}

fn check_status(response: Response, url: &Url) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(GithubError::ApiStatus {
        status,
        url: url.to_string(),
        message,
    })
}

/// Github reports a stale SHA as 409, and a missing SHA for an existing file
/// as 422 with a message about `"sha"`.
fn is_sha_conflict(status: StatusCode, message: &str) -> bool {
    status == StatusCode::CONFLICT
        || status == StatusCode::PRECONDITION_FAILED
        || (status == StatusCode::UNPROCESSABLE_ENTITY && message.contains("\"sha\""))
}

fn into_store_error(path: &str, err: GithubError) -> StoreError {
    match err {
        GithubError::ApiStatus {
            status, message, ..
        } => StoreError::Remote {
            status: status.as_u16(),
            message,
        },
        GithubError::Request { source, .. } => StoreError::Transport {
            path: path.to_owned(),
            reason: source.to_string(),
        },
        GithubError::ParseResponse { source, .. } => StoreError::InvalidResponse {
            path: path.to_owned(),
            reason: source.to_string(),
        },
        e @ (GithubError::ClientInit(_) | GithubError::InvalidBaseUrl { .. }) => {
            StoreError::Transport {
                path: path.to_owned(),
                reason: e.to_string(),
            }
        }
    }
}

impl ContentStore for GithubContentStore {
    fn fetch_file(&self, path: &str) -> Result<RemoteFile, StoreError> {
        match self.get_contents(path) {
            Ok(file) => Ok(RemoteFile {
                content: EncodedContent::from_transport(&file.content),
                revision: RevisionTag::from(file.sha),
            }),
            Err(GithubError::ApiStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(StoreError::NotFound {
                    path: path.to_owned(),
                })
            }
            Err(e) => Err(into_store_error(path, e)),
        }
    }

    fn put_file(
        &self,
        path: &str,
        content: &EncodedContent,
        revision: Option<&RevisionTag>,
        message: &str,
    ) -> Result<RevisionTag, StoreError> {
        match self.put_contents(
            path,
            content.as_str(),
            revision.map(RevisionTag::as_str),
            message,
        ) {
            Ok(sha) => Ok(RevisionTag::from(sha)),
            Err(GithubError::ApiStatus {
                status, message, ..
            }) if is_sha_conflict(status, &message) => Err(StoreError::Conflict {
                path: path.to_owned(),
                message,
            }),
            Err(e) => Err(into_store_error(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig::new("reader", "library", None, "token").unwrap()
    }

    #[test]
    fn contents_url_encodes_each_segment() {
        let store = GithubContentStore::new(config()).unwrap();
        let url = store
            .contents_url("Contents/Dune_Messiah/data/نسخه فارسی.mp3")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/reader/library/contents/Contents/Dune_Messiah/data/\
             %D9%86%D8%B3%D8%AE%D9%87%20%D9%81%D8%A7%D8%B1%D8%B3%DB%8C.mp3"
        );
    }

    #[test]
    fn contents_url_keeps_enterprise_prefix() {
        let store =
            GithubContentStore::with_api_base(config(), "https://ghe.example.com/api/v3/").unwrap();
        let url = store.contents_url("Contents/manifest.json").unwrap();

        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/reader/library/contents/Contents/manifest.json"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let result = GithubContentStore::with_api_base(config(), "api.github.com");
        assert!(matches!(result, Err(GithubError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn sha_conflicts_are_recognized() {
        assert!(is_sha_conflict(StatusCode::CONFLICT, "does not match"));
        assert!(is_sha_conflict(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid request.\n\n\"sha\" wasn't supplied."
        ));
        assert!(!is_sha_conflict(
            StatusCode::UNPROCESSABLE_ENTITY,
            "content is not valid Base64"
        ));
        assert!(!is_sha_conflict(StatusCode::UNAUTHORIZED, "Bad credentials"));
    }
}
