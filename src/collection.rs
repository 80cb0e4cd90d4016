use crate::api::Post;
use crate::events::{Listeners, Subscription};

/// Ordered posts plus a parallel, lowercased search index built once per
/// load so each filter pass is a single scan over precomputed strings.
#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    posts: Vec<Post>,
    search_index: Vec<String>,
}

impl PostCollection {
    pub fn new(posts: Vec<Post>) -> Self {
        let search_index = posts.iter().map(search_text).collect();
        Self {
            posts,
            search_index,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn recent(&self, limit: usize) -> &[Post] {
        &self.posts[..limit.min(self.posts.len())]
    }

    pub fn filter(&self, query: &str) -> Vec<Post> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return self.posts.clone();
        }
        self.posts
            .iter()
            .zip(&self.search_index)
            .filter(|(_, text)| text.contains(&needle))
            .map(|(post, _)| post.clone())
            .collect()
    }

    /// Another post already using `tag`, compared case-insensitively.
    pub fn tag_conflict(&self, tag: &str, exclude_id: Option<&str>) -> Option<&Post> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return None;
        }
        self.posts.iter().find(|post| {
            Some(post.id.as_str()) != exclude_id && post.tag.trim().to_lowercase() == tag
        })
    }
}

fn search_text(post: &Post) -> String {
    format!(
        "{} {} {} {}",
        post.title, post.tag, post.teaser, post.content
    )
    .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Reloaded { count: usize },
}

/// Single owner of the client's post collection. Everything else borrows
/// from it and learns about reloads through [`PostStore::subscribe`].
#[derive(Default)]
pub struct PostStore {
    collection: PostCollection,
    listeners: Listeners<StoreEvent>,
    loads: u64,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection and notifies subscribers.
    pub fn load(&mut self, posts: Vec<Post>) -> &PostCollection {
        self.collection = PostCollection::new(posts);
        self.loads += 1;
        let count = self.collection.len();
        tracing::debug!(count, "post collection reloaded");
        self.listeners.emit(&StoreEvent::Reloaded { count });
        &self.collection
    }

    pub fn collection(&self) -> &PostCollection {
        &self.collection
    }

    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&StoreEvent) + Send + 'static,
    {
        self.listeners.subscribe(handler)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    pub(crate) fn post(id: &str, tag: &str, title: &str) -> Post {
        Post {
            id: id.into(),
            tag: tag.into(),
            date: "2025".into(),
            title: title.into(),
            teaser: format!("teaser for {title}"),
            content: format!("# {title}\n\nBody of {id}."),
        }
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.id.as_str()).collect()
    }

    #[test]
    fn filter_matches_tag_case_insensitively() {
        let collection =
            PostCollection::new(vec![post("1", "LOG_1", "First"), post("2", "LOG_2", "Second")]);
        assert_eq!(ids(&collection.filter("log_1")), vec!["1"]);
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let collection = PostCollection::new(vec![
            post("3", "C", "Gamma"),
            post("1", "A", "Alpha"),
            post("2", "B", "Beta"),
        ]);
        assert_eq!(ids(&collection.filter("")), vec!["3", "1", "2"]);
    }

    #[test]
    fn query_whitespace_is_part_of_the_match() {
        let mut target = post("1", "A", "Alpha");
        target.content = "ends with zeta".into();
        let collection = PostCollection::new(vec![target]);
        assert!(collection.filter("zeta ").is_empty());
        assert_eq!(ids(&collection.filter("zeta")), vec!["1"]);
        assert_eq!(ids(&collection.filter(" with")), vec!["1"]);
        assert_eq!(ids(&collection.filter(" ")), vec!["1"]);
    }

    #[test]
    fn filter_searches_teaser_and_content() {
        let mut target = post("2", "B", "Beta");
        target.content = "Notes about Kubernetes".into();
        let collection = PostCollection::new(vec![post("1", "A", "Alpha"), target]);
        assert_eq!(ids(&collection.filter("KUBERNETES")), vec!["2"]);
        assert_eq!(ids(&collection.filter("teaser for alpha")), vec!["1"]);
    }

    #[test]
    fn filter_is_idempotent_and_order_preserving() {
        let collection = PostCollection::new(vec![
            post("1", "LOG_10", "Ten"),
            post("2", "OTHER", "Nope"),
            post("3", "LOG_11", "Eleven"),
            post("4", "LOG_12", "Twelve"),
        ]);
        let once = collection.filter("log_1");
        let twice = PostCollection::new(once.clone()).filter("log_1");
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["1", "3", "4"]);
    }

    #[test]
    fn recent_is_clamped() {
        let collection = PostCollection::new(vec![post("1", "A", "a"), post("2", "B", "b")]);
        assert_eq!(ids(collection.recent(3)), vec!["1", "2"]);
        assert!(PostCollection::default().recent(3).is_empty());
    }

    #[test]
    fn tag_conflict_ignores_case_and_the_post_being_edited() {
        let collection = PostCollection::new(vec![post("1", "LOG_001", "First")]);
        assert_eq!(
            collection.tag_conflict("log_001", None).map(|p| p.id.as_str()),
            Some("1")
        );
        assert!(collection.tag_conflict("Log_001", Some("1")).is_none());
        assert!(collection.tag_conflict("LOG_002", None).is_none());
        assert!(collection.tag_conflict("", None).is_none());
    }

    #[test]
    fn store_notifies_subscribers_on_reload() {
        let mut store = PostStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscription = {
            let seen = seen.clone();
            store.subscribe(move |event| seen.lock().push(event.clone()))
        };

        store.load(vec![post("1", "A", "a")]);
        store.load(vec![post("1", "A", "a"), post("2", "B", "b")]);
        assert_eq!(store.loads(), 2);
        assert_eq!(
            *seen.lock(),
            vec![
                StoreEvent::Reloaded { count: 1 },
                StoreEvent::Reloaded { count: 2 }
            ]
        );

        drop(subscription);
        store.load(Vec::new());
        assert_eq!(seen.lock().len(), 2);
    }
}
