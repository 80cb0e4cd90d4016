//! View state machine and history.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Archive,
    Single(String),
    Admin,
}

impl View {
    /// Inbound route. Unknown paths land on the home view.
    pub fn from_path(path: &str) -> Self {
        let path = path.trim();
        if let Some(fragment) = path.strip_prefix('#') {
            return match fragment {
                "archive" => View::Archive,
                "admin" => View::Admin,
                _ => View::Home,
            };
        }

        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => View::Home,
            "/archive" => View::Archive,
            "/admin" => View::Admin,
            _ => match trimmed.strip_prefix("/post/") {
                Some(id) if !id.is_empty() && !id.contains('/') => View::Single(id.to_string()),
                _ => View::Home,
            },
        }
    }

    pub fn path(&self) -> String {
        match self {
            View::Home => "/".into(),
            View::Archive => "/archive".into(),
            View::Admin => "/admin".into(),
            View::Single(id) => format!("/post/{id}"),
        }
    }

    pub fn nav_tab(&self) -> Option<NavTab> {
        match self {
            View::Home => Some(NavTab::Home),
            View::Archive => Some(NavTab::Archive),
            View::Admin => Some(NavTab::Admin),
            View::Single(_) => None,
        }
    }

    pub fn post_id(&self) -> Option<&str> {
        match self {
            View::Single(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavTab {
    Home,
    Archive,
    Admin,
}

impl NavTab {
    pub const ALL: [NavTab; 3] = [NavTab::Home, NavTab::Archive, NavTab::Admin];

    pub fn label(self) -> &'static str {
        match self {
            NavTab::Home => "Home",
            NavTab::Archive => "Archive",
            NavTab::Admin => "Admin",
        }
    }

    pub fn view(self) -> View {
        match self {
            NavTab::Home => View::Home,
            NavTab::Archive => View::Archive,
            NavTab::Admin => View::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub view: View,
}

impl HistoryEntry {
    pub fn new(view: View) -> Self {
        Self { view }
    }
}

pub trait History {
    fn push(&mut self, entry: HistoryEntry);
    fn back(&mut self) -> Option<HistoryEntry>;
    fn forward(&mut self) -> Option<HistoryEntry>;
    fn current(&self) -> Option<&HistoryEntry>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }
}

impl History for MemoryHistory {
    fn push(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(entry);
        self.cursor = self.entries.len() - 1;
    }

    fn back(&mut self) -> Option<HistoryEntry> {
        if !self.can_go_back() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    fn forward(&mut self) -> Option<HistoryEntry> {
        if !self.can_go_forward() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Owns the active view. Every transition resets the content pane scroll and
/// bumps [`Navigator::generation`], which background work captures so late
/// results for a view the user already left can be dropped.
pub struct Navigator<H: History = MemoryHistory> {
    view: View,
    history: H,
    pane_scroll: usize,
    generation: u64,
}

impl Navigator<MemoryHistory> {
    pub fn new(initial: View) -> Self {
        Self::with_history(initial, MemoryHistory::new())
    }

    pub fn from_path(path: &str) -> Self {
        Self::new(View::from_path(path))
    }
}

impl<H: History> Navigator<H> {
    pub fn with_history(initial: View, mut history: H) -> Self {
        history.push(HistoryEntry::new(initial.clone()));
        Self {
            view: initial,
            history,
            pane_scroll: 0,
            generation: 0,
        }
    }

    pub fn active(&self) -> &View {
        &self.view
    }

    pub fn active_nav(&self) -> Option<NavTab> {
        self.view.nav_tab()
    }

    pub fn is_active(&self, view: &View) -> bool {
        &self.view == view
    }

    pub fn switch_view(&mut self, view: View) {
        self.transition(view.clone());
        self.history.push(HistoryEntry::new(view));
    }

    pub fn open_post(&mut self, id: impl Into<String>) {
        self.switch_view(View::Single(id.into()));
    }

    /// Replays an entry that already exists in history, without pushing.
    pub fn pop_state(&mut self, entry: HistoryEntry) {
        self.transition(entry.view);
    }

    pub fn back(&mut self) -> bool {
        match self.history.back() {
            Some(entry) => {
                self.pop_state(entry);
                true
            }
            None => false,
        }
    }

    pub fn forward(&mut self) -> bool {
        match self.history.forward() {
            Some(entry) => {
                self.pop_state(entry);
                true
            }
            None => false,
        }
    }

    pub fn pane_scroll(&self) -> usize {
        self.pane_scroll
    }

    pub fn set_pane_scroll(&mut self, offset: usize) {
        self.pane_scroll = offset;
    }

    pub fn scroll_pane_by(&mut self, delta: isize) {
        self.pane_scroll = if delta.is_negative() {
            self.pane_scroll.saturating_sub(delta.unsigned_abs())
        } else {
            self.pane_scroll.saturating_add(delta.unsigned_abs())
        };
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    fn transition(&mut self, view: View) {
        tracing::debug!(from = %self.view, to = %view, "view transition");
        self.view = view;
        self.pane_scroll = 0;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_map_to_views() {
        assert_eq!(View::from_path("/"), View::Home);
        assert_eq!(View::from_path(""), View::Home);
        assert_eq!(View::from_path("/archive"), View::Archive);
        assert_eq!(View::from_path("/archive/"), View::Archive);
        assert_eq!(View::from_path("/admin"), View::Admin);
        assert_eq!(View::from_path("/post/abc-123"), View::Single("abc-123".into()));
        assert_eq!(View::from_path("#archive"), View::Archive);
        assert_eq!(View::from_path("#admin"), View::Admin);
        assert_eq!(View::from_path("#home"), View::Home);
        assert_eq!(View::from_path("/nope"), View::Home);
        assert_eq!(View::from_path("/post/"), View::Home);
        assert_eq!(View::from_path("/post/a/b"), View::Home);
    }

    #[test]
    fn paths_round_trip() {
        for view in [
            View::Home,
            View::Archive,
            View::Admin,
            View::Single("42".into()),
        ] {
            assert_eq!(View::from_path(&view.path()), view);
        }
    }

    #[test]
    fn single_view_has_no_active_tab() {
        let mut nav = Navigator::new(View::Archive);
        assert_eq!(nav.active_nav(), Some(NavTab::Archive));
        nav.open_post("7");
        assert_eq!(nav.active(), &View::Single("7".into()));
        assert_eq!(nav.active_nav(), None);
    }

    #[test]
    fn every_transition_resets_scroll() {
        let mut nav = Navigator::new(View::Home);
        nav.set_pane_scroll(40);
        nav.switch_view(View::Archive);
        assert_eq!(nav.pane_scroll(), 0);

        nav.scroll_pane_by(12);
        nav.switch_view(View::Archive);
        assert_eq!(nav.pane_scroll(), 0);

        nav.scroll_pane_by(3);
        assert!(nav.back());
        assert_eq!(nav.pane_scroll(), 0);
    }

    #[test]
    fn back_and_forward_replay_without_pushing() {
        let mut nav = Navigator::new(View::Home);
        nav.switch_view(View::Archive);
        nav.open_post("9");
        assert_eq!(nav.history().len(), 3);

        assert!(nav.back());
        assert_eq!(nav.active(), &View::Archive);
        assert!(nav.back());
        assert_eq!(nav.active(), &View::Home);
        assert!(!nav.back());
        assert!(nav.forward());
        assert!(nav.forward());
        assert_eq!(nav.active(), &View::Single("9".into()));
        assert!(!nav.forward());
        assert_eq!(nav.history().len(), 3);
    }

    #[test]
    fn pushing_after_back_drops_forward_entries() {
        let mut nav = Navigator::new(View::Home);
        nav.switch_view(View::Archive);
        nav.switch_view(View::Admin);
        nav.back();
        nav.open_post("1");
        let views: Vec<View> = nav
            .history()
            .entries()
            .iter()
            .map(|entry| entry.view.clone())
            .collect();
        assert_eq!(
            views,
            vec![View::Home, View::Archive, View::Single("1".into())]
        );
        assert!(!nav.forward());
    }

    #[test]
    fn generation_advances_on_every_transition() {
        let mut nav = Navigator::from_path("/post/3");
        let start = nav.generation();
        nav.switch_view(View::Home);
        nav.back();
        assert_eq!(nav.generation(), start + 2);
        assert_eq!(nav.active().post_id(), Some("3"));
    }
}
