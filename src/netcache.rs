//! Offline-first read path layered over the blog API.
//!
//! Static shell assets are served cache-first: once an entry exists the
//! network is never consulted until the entry is evicted. API data is served
//! stale-while-revalidate: the network is always tried first, the cache is
//! refreshed with every successful response, and the last cached response is
//! only used when the network is unreachable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::api::{ApiError, POSTS_PATH, SEARCH_INDEX_PATH, TIMELINE_PATH};

/// Assets fetched by [`CacheController::precache`].
pub const SHELL_ASSETS: [&str; 2] = ["/", TIMELINE_PATH];

/// Only transport failures are errors. Every HTTP status comes back as a
/// [`Response`]; the controller decides what to cache.
pub trait Transport: Send + Sync {
    fn get(&self, path: &str) -> Result<Response, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    CacheFirst,
    StaleWhileRevalidate,
}

impl Policy {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/api/") {
            Policy::StaleWhileRevalidate
        } else {
            Policy::CacheFirst
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub response: Response,
    pub source: Source,
}

impl Fetched {
    pub fn is_offline_copy(&self) -> bool {
        self.source == Source::Cache
    }
}

pub struct CacheController {
    transport: Arc<dyn Transport>,
    entries: Mutex<HashMap<String, Response>>,
}

impl CacheController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetch(&self, path: &str) -> Result<Fetched, ApiError> {
        match Policy::for_path(path) {
            Policy::CacheFirst => self.cache_first(path),
            Policy::StaleWhileRevalidate => self.stale_while_revalidate(path),
        }
    }

    fn cache_first(&self, path: &str) -> Result<Fetched, ApiError> {
        if let Some(cached) = self.cached(path) {
            tracing::debug!(path, "cache-first hit");
            return Ok(Fetched {
                response: cached,
                source: Source::Cache,
            });
        }
        let response = accepted(path, self.transport.get(path)?)?;
        self.entries.lock().insert(path.to_string(), response.clone());
        Ok(Fetched {
            response,
            source: Source::Network,
        })
    }

    fn stale_while_revalidate(&self, path: &str) -> Result<Fetched, ApiError> {
        match self.transport.get(path).and_then(|response| accepted(path, response)) {
            Ok(response) => {
                self.entries.lock().insert(path.to_string(), response.clone());
                Ok(Fetched {
                    response,
                    source: Source::Network,
                })
            }
            Err(err) if err.is_network() => match self.cached(path) {
                Some(cached) => {
                    tracing::warn!(
                        path,
                        error = %err,
                        fetched_at = %cached.fetched_at,
                        "network unreachable, serving cached copy"
                    );
                    Ok(Fetched {
                        response: cached,
                        source: Source::Cache,
                    })
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Install step: fetch the shell assets so the client can start offline.
    /// Returns how many assets were stored.
    pub fn precache(&self, paths: &[&str]) -> usize {
        let mut stored = 0;
        for path in paths {
            match self.transport.get(path) {
                Ok(response) if response.is_success() => {
                    self.entries.lock().insert((*path).to_string(), response);
                    stored += 1;
                }
                Ok(response) => {
                    tracing::debug!(path, status = response.status, "precache skipped");
                }
                Err(err) => {
                    tracing::debug!(path, error = %err, "precache failed");
                }
            }
        }
        stored
    }

    pub fn cached(&self, path: &str) -> Option<Response> {
        self.entries.lock().get(path).cloned()
    }

    pub fn invalidate(&self, path: &str) -> bool {
        self.entries.lock().remove(path).is_some()
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|path, _| !path.starts_with(prefix));
        before - entries.len()
    }

    /// Drops every cached read of the post collection. Called after each
    /// successful write.
    pub fn invalidate_collection(&self) {
        let mut entries = self.entries.lock();
        entries.remove(POSTS_PATH);
        entries.remove(SEARCH_INDEX_PATH);
        tracing::debug!("collection reads evicted");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Non-success statuses become errors and are never cached.
fn accepted(path: &str, response: Response) -> Result<Response, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    tracing::debug!(path, status = response.status, "response not cached");
    Err(ApiError::from_status(response.status, response.body))
}
