use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::api::{
    self, ApiError, NewPost, Post, SearchEntry, TimelineEntry, POSTS_PATH, SEARCH_INDEX_PATH,
    TIMELINE_PATH,
};
use crate::netcache::{CacheController, Fetched, SHELL_ASSETS};

/// A read result. `cached_at` is set when the network was unreachable and
/// the data is the offline copy fetched at that time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub data: T,
    pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Snapshot<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            cached_at: None,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.cached_at.is_some()
    }
}

pub trait PostService: Send + Sync {
    fn list_posts(&self) -> Result<Snapshot<Vec<Post>>>;
    fn timeline(&self) -> Result<Snapshot<Vec<TimelineEntry>>>;
    fn search_index(&self) -> Result<Snapshot<Vec<SearchEntry>>>;
    fn create(&self, post: &NewPost, passkey: &str) -> Result<()>;
    fn update(&self, post: &Post, passkey: &str) -> Result<()>;

    /// Warms whatever offline cache backs the service. Returns the number of
    /// entries stored.
    fn precache(&self) -> usize {
        0
    }
}

/// Recovers the error category from a service error. Anything that is not an
/// [`ApiError`] is reported as a transport failure.
pub fn classify(err: &anyhow::Error) -> ApiError {
    match err.downcast_ref::<ApiError>() {
        Some(api_err) => api_err.clone(),
        None => ApiError::Network(format!("{err:#}")),
    }
}

pub struct HttpPostService {
    client: Arc<api::Client>,
    cache: Arc<CacheController>,
}

impl HttpPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        let cache = Arc::new(CacheController::new(client.clone()));
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<CacheController> {
        &self.cache
    }

    fn read<T: for<'de> serde::Deserialize<'de>>(&self, path: &str) -> Result<Snapshot<T>> {
        let fetched: Fetched = self.cache.fetch(path)?;
        let data = api::decode(path, &fetched.response)?;
        let cached_at = fetched
            .is_offline_copy()
            .then_some(fetched.response.fetched_at);
        Ok(Snapshot { data, cached_at })
    }
}

impl PostService for HttpPostService {
    fn list_posts(&self) -> Result<Snapshot<Vec<Post>>> {
        self.read(POSTS_PATH)
    }

    fn timeline(&self) -> Result<Snapshot<Vec<TimelineEntry>>> {
        self.read(TIMELINE_PATH)
    }

    fn search_index(&self) -> Result<Snapshot<Vec<SearchEntry>>> {
        self.read(SEARCH_INDEX_PATH)
    }

    fn create(&self, post: &NewPost, passkey: &str) -> Result<()> {
        self.client.create_post(post, passkey)?;
        self.cache.invalidate_collection();
        Ok(())
    }

    fn update(&self, post: &Post, passkey: &str) -> Result<()> {
        self.client.update_post(post, passkey)?;
        self.cache.invalidate_collection();
        Ok(())
    }

    fn precache(&self) -> usize {
        self.cache.precache(&SHELL_ASSETS)
    }
}

/// In-process blog backend with the same write rules as the server: shared
/// passkey, required title and content, unique tags on create, fresh UUIDs,
/// newest first.
pub struct MemoryPostService {
    posts: Mutex<Vec<Post>>,
    timeline: Vec<TimelineEntry>,
    passkey: String,
    offline: AtomicBool,
}

impl MemoryPostService {
    pub fn new(passkey: impl Into<String>) -> Self {
        Self::with_posts(passkey, Vec::new())
    }

    pub fn with_posts(passkey: impl Into<String>, posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            timeline: default_timeline(),
            passkey: passkey.into(),
            offline: AtomicBool::new(false),
        }
    }

    /// Sample blog used by `--demo`. Large enough that the archive list has
    /// to window its rows.
    pub fn demo() -> Self {
        Self::with_posts("demo", demo_posts())
    }

    pub fn passkey(&self) -> &str {
        &self.passkey
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    fn ensure_online(&self) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("backend unreachable".into()));
        }
        Ok(())
    }

    fn authorize(&self, passkey: &str) -> Result<(), ApiError> {
        self.ensure_online()?;
        if passkey != self.passkey {
            return Err(ApiError::Auth);
        }
        Ok(())
    }
}

fn check_required(title: &str, content: &str) -> Result<(), ApiError> {
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation("Invalid Data".into()));
    }
    Ok(())
}

impl PostService for MemoryPostService {
    fn list_posts(&self) -> Result<Snapshot<Vec<Post>>> {
        self.ensure_online()?;
        Ok(Snapshot::fresh(self.snapshot()))
    }

    fn timeline(&self) -> Result<Snapshot<Vec<TimelineEntry>>> {
        self.ensure_online()?;
        Ok(Snapshot::fresh(self.timeline.clone()))
    }

    fn search_index(&self) -> Result<Snapshot<Vec<SearchEntry>>> {
        self.ensure_online()?;
        let index = self
            .posts
            .lock()
            .iter()
            .map(|post| SearchEntry {
                id: post.id.clone(),
                title: post.title.clone(),
                tag: post.tag.clone(),
                date: post.date.clone(),
            })
            .collect();
        Ok(Snapshot::fresh(index))
    }

    fn create(&self, post: &NewPost, passkey: &str) -> Result<()> {
        self.authorize(passkey)?;
        check_required(&post.title, &post.content)?;

        let mut posts = self.posts.lock();
        let tag = post.tag.to_lowercase();
        if !tag.is_empty() && posts.iter().any(|p| p.tag.to_lowercase() == tag) {
            return Err(ApiError::Conflict("Duplicate Tag".into()).into());
        }
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%id, tag = %post.tag, "post created");
        posts.insert(0, post.clone().with_id(id));
        Ok(())
    }

    fn update(&self, post: &Post, passkey: &str) -> Result<()> {
        self.authorize(passkey)?;
        check_required(&post.title, &post.content)?;

        let mut posts = self.posts.lock();
        match posts.iter_mut().find(|p| p.id == post.id) {
            Some(slot) => {
                *slot = post.clone();
                tracing::info!(id = %post.id, "post updated");
                Ok(())
            }
            None => Err(ApiError::NotFound("Post not found".into()).into()),
        }
    }
}

pub fn default_timeline() -> Vec<TimelineEntry> {
    let entry = |year: &str, title: &str, desc: &str| TimelineEntry {
        year: year.into(),
        title: title.into(),
        desc: desc.into(),
    };
    vec![
        entry(
            "2025 - PRESENT",
            "Upcoming Full-stack Developer",
            "Crunching The Odin Project and Scrimba.",
        ),
        entry(
            "2024",
            "The Spark",
            "Enrolled in a degree for IT. Found my calling.",
        ),
        entry(
            "2021 - 2024",
            "Philippine Military Academy",
            "Cadet. Warshocked into a military way of life. (Discharged due to injury)",
        ),
        entry(
            "2018-2021",
            "The Valley of Confusion",
            "College at Ateneo De Naga, jumped from one course to another.",
        ),
    ]
}

fn demo_posts() -> Vec<Post> {
    let mut posts = vec![Post {
        id: "welcome".into(),
        tag: "LOG_000".into(),
        date: "2025.01.01".into(),
        title: "Hello, terminal".into(),
        teaser: "The blog, now in a terminal.".into(),
        content: "# Hello, terminal\n\nThis post is rendered from **markdown**.\n\n\
                  - lists\n- `inline code`\n- [links](https://example.com)\n\n\
                  > Quotes stand out.\n\n```\nfn main() {}\n```\n"
            .into(),
    }];
    posts.extend((1..=120).rev().map(|n| Post {
        id: format!("demo-{n:03}"),
        tag: format!("LOG_{n:03}"),
        date: format!("2024.{:02}.{:02}", (n % 12) + 1, (n % 28) + 1),
        title: format!("Field notes #{n}"),
        teaser: format!("Entry {n} of the running log."),
        content: format!(
            "## Field notes #{n}\n\nProgress report number {n}.\n\n1. read\n2. build\n3. ship\n"
        ),
    }));
    posts
}
