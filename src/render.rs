//! Memoized markdown rendering for post bodies.
//!
//! Rendering a post is the most expensive thing the client does on the UI
//! path, so results are kept in a bounded LRU. Entries are keyed either by the
//! SHA-256 of the content (the default: an edited post can never be served
//! stale markup) or by post identifier. Identifier keys reproduce the older
//! client behavior, where an edit under the same id keeps returning the first
//! rendering until [`ContentCache::invalidate`] is called.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use ratatui::text::Text;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::markdown::{Palette, Renderer};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeying {
    #[default]
    ContentHash,
    Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Digest(String),
    Post(String),
}

struct Entry {
    post_id: String,
    markup: Arc<Text<'static>>,
}

/// Loads the markdown renderer on first use. Concurrent first callers wait
/// on the same initialization; the renderer is built once per process.
pub struct LazyRenderer {
    cell: OnceCell<Renderer>,
    palette: Palette,
    loads: AtomicUsize,
}

impl LazyRenderer {
    pub fn new(palette: Palette) -> Self {
        Self {
            cell: OnceCell::new(),
            palette,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> &Renderer {
        self.cell.get_or_init(|| {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("markdown renderer loaded");
            Renderer::new(self.palette)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct ContentCache {
    renderer: Arc<LazyRenderer>,
    keying: CacheKeying,
    entries: Mutex<LruCache<CacheKey, Entry>>,
    stats: Mutex<CacheStats>,
}

impl ContentCache {
    pub fn new(renderer: Arc<LazyRenderer>, keying: CacheKeying, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            renderer,
            keying,
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn keying(&self) -> CacheKeying {
        self.keying
    }

    pub fn render(&self, post_id: &str, content: &str) -> Arc<Text<'static>> {
        let key = self.key_for(post_id, content);
        if let Some(entry) = self.entries.lock().get(&key) {
            self.stats.lock().hits += 1;
            tracing::debug!(post_id, "rendered markup cache hit");
            return entry.markup.clone();
        }

        // Rendered outside the lock. Racing misses on one key may both render;
        // the later insert wins.
        self.stats.lock().misses += 1;
        let markup = Arc::new(self.renderer.get().render(content));
        let entry = Entry {
            post_id: post_id.to_string(),
            markup: markup.clone(),
        };
        if let Some((evicted, _)) = self.entries.lock().push(key.clone(), entry) {
            if evicted != key {
                self.stats.lock().evictions += 1;
            }
        }
        tracing::debug!(post_id, "rendered markup cached");
        markup
    }

    /// Drops every entry rendered for `post_id`. Returns how many went.
    pub fn invalidate(&self, post_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.post_id == post_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn key_for(&self, post_id: &str, content: &str) -> CacheKey {
        match self.keying {
            CacheKeying::ContentHash => CacheKey::Digest(content_digest(content)),
            CacheKeying::Identifier => CacheKey::Post(post_id.to_string()),
        }
    }
}

pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
