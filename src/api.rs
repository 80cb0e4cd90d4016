use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::netcache::{Response, Transport};

pub const POSTS_PATH: &str = "/api/posts";
pub const TIMELINE_PATH: &str = "/api/timeline";
pub const SEARCH_INDEX_PATH: &str = "/api/search-index";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub teaser: String,
    #[serde(default)]
    pub content: String,
}

/// Create payload. Identifiers are assigned by the server, so there is no
/// field to carry one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub tag: String,
    pub date: String,
    pub title: String,
    pub teaser: String,
    pub content: String,
}

impl NewPost {
    pub fn with_id(self, id: String) -> Post {
        Post {
            id,
            tag: self.tag,
            date: self.date,
            title: self.title,
            teaser: self.teaser,
            content: self.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub year: String,
    pub title: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: passkey rejected")]
    Auth,
    #[error("invalid post: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
}

impl ApiError {
    pub fn from_status(status: u16, body: String) -> Self {
        let body = body.trim().to_string();
        match status {
            400 => ApiError::Validation(body),
            401 | 403 => ApiError::Auth,
            404 => ApiError::NotFound(body),
            409 => ApiError::Conflict(body),
            _ => ApiError::Server { status, body },
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("blog client user agent required");
        }
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("parse api base url {:?}", config.base_url))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("build blog HTTP client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Network(format!("invalid path {path}: {err}")))
    }

    pub fn create_post(&self, post: &NewPost, passkey: &str) -> Result<(), ApiError> {
        self.write(reqwest::Method::POST, post, passkey)
    }

    pub fn update_post(&self, post: &Post, passkey: &str) -> Result<(), ApiError> {
        self.write(reqwest::Method::PUT, post, passkey)
    }

    fn write<T: Serialize>(
        &self,
        method: reqwest::Method,
        body: &T,
        passkey: &str,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(POSTS_PATH)?;
        let response = self
            .http
            .request(method, url)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, passkey)
            .json(body)
            .send()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), body))
    }
}

impl Transport for Client {
    fn get(&self, path: &str) -> Result<Response, ApiError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ApiError::Network(format!("read body of {path}: {err}")))?;
        Ok(Response::new(status.as_u16(), body))
    }
}

pub fn decode<T: for<'de> Deserialize<'de>>(path: &str, response: &Response) -> Result<T> {
    serde_json::from_str(&response.body).with_context(|| format!("decode response from {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert_eq!(ApiError::from_status(401, String::new()), ApiError::Auth);
        assert_eq!(
            ApiError::from_status(409, "Duplicate Tag\n".into()),
            ApiError::Conflict("Duplicate Tag".into())
        );
        assert_eq!(
            ApiError::from_status(404, "Post not found".into()),
            ApiError::NotFound("Post not found".into())
        );
        assert_eq!(
            ApiError::from_status(400, "Invalid Data".into()),
            ApiError::Validation("Invalid Data".into())
        );
        assert!(matches!(
            ApiError::from_status(500, "Server Error".into()),
            ApiError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn post_tolerates_missing_optional_fields() {
        let post: Post = serde_json::from_str(r#"{"id":"a","title":"Hello"}"#).unwrap();
        assert_eq!(post.tag, "");
        assert_eq!(post.content, "");
    }

    #[test]
    fn new_post_never_serializes_an_id() {
        let body = serde_json::to_value(NewPost {
            title: "t".into(),
            content: "c".into(),
            ..NewPost::default()
        })
        .unwrap();
        assert!(body.get("id").is_none());
    }

    #[test]
    fn client_requires_user_agent() {
        let err = Client::new(ClientConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..ClientConfig::default()
        });
        assert!(err.is_err());
    }
}
