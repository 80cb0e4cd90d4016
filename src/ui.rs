use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    Wrap,
};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthChar;

use crate::api::{ApiError, Post, TimelineEntry};
use crate::collection::{PostStore, StoreEvent};
use crate::config::{self, Theme};
use crate::data::{classify, PostService, Snapshot};
use crate::editor::{AdminSession, EditForm, Field};
use crate::events::Subscription;
use crate::markdown::Palette;
use crate::mutation::{MutationOutcome, MutationQueue, MutationStatus};
use crate::nav::{NavTab, Navigator, View};
use crate::render::{CacheKeying, ContentCache, LazyRenderer};
use crate::toast::{ToastKind, Toasts};
use crate::window::{Viewport, VirtualList};

const HOME_RECENT: usize = 3;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy)]
struct UiColors {
    bg: Color,
    panel: Color,
    text: Color,
    muted: Color,
    accent: Color,
    selected_bg: Color,
    border: Color,
    success: Color,
    error: Color,
}

impl UiColors {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                bg: Color::Rgb(5, 5, 5),
                panel: Color::Rgb(13, 17, 23),
                text: Color::Rgb(230, 237, 243),
                muted: Color::Rgb(139, 148, 158),
                accent: Color::Rgb(0, 240, 255),
                selected_bg: Color::Rgb(33, 38, 45),
                border: Color::Rgb(48, 54, 61),
                success: Color::Rgb(166, 227, 161),
                error: Color::Rgb(243, 139, 168),
            },
            Theme::Light => Self {
                bg: Color::Rgb(240, 240, 240),
                panel: Color::Rgb(255, 255, 255),
                text: Color::Rgb(10, 10, 10),
                muted: Color::Rgb(85, 85, 85),
                accent: Color::Rgb(255, 51, 51),
                selected_bg: Color::Rgb(225, 225, 225),
                border: Color::Rgb(17, 17, 17),
                success: Color::Rgb(0, 128, 64),
                error: Color::Rgb(200, 30, 30),
            },
        }
    }

    fn toast(&self, kind: ToastKind) -> Color {
        match kind {
            ToastKind::Success => self.success,
            ToastKind::Error => self.error,
            ToastKind::Info => self.accent,
        }
    }
}

/// What a mounted list row shows. Styling happens at draw time so a theme
/// switch never invalidates mounted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PostRow {
    title: String,
    meta: String,
    teaser: String,
}

fn post_row(post: &Post) -> PostRow {
    let meta = match (post.tag.is_empty(), post.date.is_empty()) {
        (false, false) => format!("{} // {}", post.tag, post.date),
        (false, true) => post.tag.clone(),
        (true, false) => post.date.clone(),
        (true, true) => String::new(),
    };
    PostRow {
        title: post.title.clone(),
        meta,
        teaser: post.teaser.clone(),
    }
}

impl PostRow {
    fn lines(
        &self,
        height: usize,
        width: usize,
        colors: &UiColors,
        highlight: bool,
    ) -> Vec<Line<'static>> {
        let bg = if highlight {
            colors.selected_bg
        } else {
            colors.panel
        };
        let marker = if highlight { "▸ " } else { "  " };
        let mut lines = vec![
            Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent).bg(bg)),
                Span::styled(
                    truncate(&self.title, width.saturating_sub(2)),
                    Style::default()
                        .fg(if highlight { colors.accent } else { colors.text })
                        .bg(bg)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                truncate(&format!("  {}", self.meta), width),
                Style::default().fg(colors.muted).bg(bg),
            )),
            Line::from(Span::styled(
                truncate(&format!("  {}", self.teaser), width),
                Style::default().fg(colors.text).bg(bg),
            )),
        ];
        lines.truncate(height);
        while lines.len() < height {
            lines.push(Line::from(Span::styled(String::new(), Style::default().bg(bg))));
        }
        for line in &mut lines {
            line.style = Style::default().bg(bg);
        }
        lines
    }
}

fn truncate(text: &str, width: usize) -> String {
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        if ch == '\n' {
            break;
        }
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            if width > 0 && out.pop().is_some() {
                out.push('…');
            }
            return out;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Projects the mounted rows of `list` onto `height` screen lines.
fn window_lines(
    list: &VirtualList<Post, PostRow>,
    height: usize,
    width: usize,
    colors: &UiColors,
    focused: bool,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::default(); height];
    let scroll_top = list.viewport().scroll_top;
    let selected = list.selected();
    for row in list.mounted() {
        let highlight = focused && selected == Some(row.index);
        for (offset, line) in row
            .element
            .lines(row.height, width, colors, highlight)
            .into_iter()
            .enumerate()
        {
            let y = row.top + offset;
            if y < scroll_top {
                continue;
            }
            let y = y - scroll_top;
            if y >= height {
                break;
            }
            lines[y] = line;
        }
    }
    lines
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn new_content_cache(theme: Theme, keying: CacheKeying, capacity: usize) -> Arc<ContentCache> {
    let renderer = Arc::new(LazyRenderer::new(Palette::for_theme(theme)));
    Arc::new(ContentCache::new(renderer, keying, capacity))
}

fn new_list(row_height: usize, buffer: usize) -> VirtualList<Post, PostRow> {
    VirtualList::new(
        Viewport::new(0, 0),
        Vec::new(),
        post_row,
        row_height,
        buffer,
    )
}

fn scroll_offset(offset: usize) -> u16 {
    u16::try_from(offset).unwrap_or(u16::MAX)
}

enum AsyncResponse {
    Loaded {
        request_id: u64,
        writes_seen: u64,
        timeline: Result<Snapshot<Vec<TimelineEntry>>>,
        posts: Result<Snapshot<Vec<Post>>>,
    },
    Content {
        request_id: u64,
        generation: u64,
        post_id: String,
        rendered: Arc<Text<'static>>,
    },
    Mutation(MutationOutcome),
    Store(StoreEvent),
}

struct PendingContent {
    request_id: u64,
}

struct RenderedPost {
    post_id: String,
    text: Arc<Text<'static>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminFocus {
    Form,
    Manage,
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Options {
    pub service: Arc<dyn PostService>,
    pub route: String,
    pub theme: Theme,
    /// Where the theme toggle is persisted. `None` keeps it in memory.
    pub theme_path: Option<PathBuf>,
    pub row_height: usize,
    pub buffer_rows: usize,
    pub toast_ttl: Duration,
    pub render_capacity: usize,
    pub keying: CacheKeying,
    pub status_message: String,
}

pub struct Model {
    service: Arc<dyn PostService>,
    store: PostStore,
    _store_subscription: Subscription,
    timeline: Vec<TimelineEntry>,
    nav: Navigator,
    theme: Theme,
    colors: UiColors,
    theme_path: Option<PathBuf>,
    keying: CacheKeying,
    render_capacity: usize,
    content_cache: Arc<ContentCache>,
    content: Option<RenderedPost>,
    pending_content: Option<PendingContent>,
    pending_load: Option<u64>,
    /// Bumped whenever a write lands. A load that started before the latest
    /// write carries an older value and its posts are dropped.
    writes_applied: u64,
    loaded_once: bool,
    home_selected: usize,
    archive: VirtualList<Post, PostRow>,
    query: String,
    searching: bool,
    manage: VirtualList<Post, PostRow>,
    editor: EditForm,
    admin: AdminSession,
    admin_focus: AdminFocus,
    passkey_input: String,
    mutations: MutationQueue,
    toasts: Toasts,
    status_message: String,
    spinner: Spinner,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
}

impl Model {
    pub fn new(options: Options) -> Result<Self> {
        let (response_tx, response_rx) = unbounded();

        let store = PostStore::new();
        let store_subscription = {
            let tx = response_tx.clone();
            store.subscribe(move |event| {
                let _ = tx.send(AsyncResponse::Store(event.clone()));
            })
        };

        let mutations = {
            let tx = response_tx.clone();
            MutationQueue::start(options.service.clone(), move |outcome| {
                let _ = tx.send(AsyncResponse::Mutation(outcome));
            })?
        };

        Ok(Self {
            service: options.service,
            store,
            _store_subscription: store_subscription,
            timeline: Vec::new(),
            nav: Navigator::from_path(&options.route),
            theme: options.theme,
            colors: UiColors::for_theme(options.theme),
            theme_path: options.theme_path,
            keying: options.keying,
            render_capacity: options.render_capacity,
            content_cache: new_content_cache(
                options.theme,
                options.keying,
                options.render_capacity,
            ),
            content: None,
            pending_content: None,
            pending_load: None,
            writes_applied: 0,
            loaded_once: false,
            home_selected: 0,
            archive: new_list(options.row_height, options.buffer_rows),
            query: String::new(),
            searching: false,
            manage: new_list(options.row_height, options.buffer_rows),
            editor: EditForm::new(),
            admin: AdminSession::default(),
            admin_focus: AdminFocus::Form,
            passkey_input: String::new(),
            mutations,
            toasts: Toasts::new(options.toast_ttl),
            status_message: options.status_message,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_tx,
            response_rx,
            next_request_id: 1,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        self.mutations.shutdown();

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);
        self.request_load();

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.toasts.error(format!("{err:#}"));
                            }
                        }
                        self.mark_dirty();
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.tick(last_tick) {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.toasts.prune(now);
        if self.is_loading() {
            changed |= self.spinner.advance();
        } else {
            self.spinner.reset();
        }
        changed
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_load.is_some() || self.pending_content.is_some() || self.mutations.is_busy()
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Fetches the timeline and the posts. A request while one is already in
    /// flight is ignored.
    fn request_load(&mut self) -> bool {
        if self.pending_load.is_some() {
            tracing::debug!("load already in flight");
            return false;
        }
        self.start_load();
        true
    }

    /// Starts a load unconditionally. Any load still in flight is superseded
    /// and its reply ignored.
    fn start_load(&mut self) {
        let request_id = self.next_request_id();
        self.pending_load = Some(request_id);
        self.status_message = "Loading posts…".into();

        let writes_seen = self.writes_applied;
        let service = self.service.clone();
        let tx = self.response_tx.clone();
        let precache = !self.loaded_once;
        thread::spawn(move || {
            if precache {
                let stored = service.precache();
                tracing::debug!(stored, "shell assets precached");
            }
            let timeline = service.timeline();
            let posts = service.list_posts();
            let _ = tx.send(AsyncResponse::Loaded {
                request_id,
                writes_seen,
                timeline,
                posts,
            });
        });
    }

    fn request_content(&mut self) {
        let Some(post_id) = self.nav.active().post_id().map(str::to_string) else {
            return;
        };
        let Some(post) = self.store.collection().find(&post_id) else {
            if self.loaded_once {
                self.status_message = format!("Post {post_id} not found.");
            }
            return;
        };
        let content = post.content.clone();

        let request_id = self.next_request_id();
        let generation = self.nav.generation();
        self.pending_content = Some(PendingContent { request_id });

        let cache = self.content_cache.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let rendered = cache.render(&post_id, &content);
            let _ = tx.send(AsyncResponse::Content {
                request_id,
                generation,
                post_id,
                rendered,
            });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Loaded {
                request_id,
                writes_seen,
                timeline,
                posts,
            } => {
                if self.pending_load != Some(request_id) {
                    return;
                }
                self.pending_load = None;
                self.loaded_once = true;

                match timeline {
                    Ok(snapshot) => self.timeline = snapshot.data,
                    Err(err) => {
                        tracing::warn!(error = %err, "timeline unavailable");
                        self.toasts.error(format!("Timeline unavailable: {}", classify(&err)));
                    }
                }
                match posts {
                    Ok(_) if writes_seen < self.writes_applied => {
                        tracing::debug!(
                            writes_seen,
                            writes_applied = self.writes_applied,
                            "dropping posts read before the latest write"
                        );
                        self.status_message = format!(
                            "{} posts loaded.",
                            self.store.collection().len()
                        );
                    }
                    Ok(snapshot) => {
                        if let Some(cached_at) = snapshot.cached_at {
                            self.toasts.info(format!(
                                "Offline: showing posts cached at {} UTC",
                                cached_at.format("%H:%M")
                            ));
                        }
                        self.store.load(snapshot.data);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "posts unavailable");
                        self.status_message = "Could not load posts. Press r to retry.".into();
                        self.toasts.error(format!("Failed to load posts: {}", classify(&err)));
                    }
                }
            }
            AsyncResponse::Content {
                request_id,
                generation,
                post_id,
                rendered,
            } => {
                if self.pending_content.as_ref().map(|pending| pending.request_id)
                    != Some(request_id)
                {
                    return;
                }
                self.pending_content = None;
                if generation != self.nav.generation()
                    || self.nav.active().post_id() != Some(post_id.as_str())
                {
                    tracing::debug!(%post_id, "discarding render for a view no longer shown");
                    return;
                }
                self.content = Some(RenderedPost {
                    post_id,
                    text: rendered,
                });
            }
            AsyncResponse::Mutation(outcome) => self.apply_mutation(outcome),
            AsyncResponse::Store(StoreEvent::Reloaded { count }) => {
                self.refresh_surfaces();
                self.status_message = format!("{count} posts loaded.");
            }
        }
    }

    fn apply_mutation(&mut self, outcome: MutationOutcome) {
        let MutationOutcome { job, status, .. } = outcome;
        match status {
            MutationStatus::Saved { posts } => {
                self.writes_applied += 1;
                if let Some(id) = job.post_id() {
                    self.content_cache.invalidate(id);
                }
                self.store.load(posts);
                self.editor.clear();
                self.toasts.success("Saved");
            }
            MutationStatus::SavedWithoutReload { error } => {
                self.writes_applied += 1;
                if let Some(id) = job.post_id() {
                    self.content_cache.invalidate(id);
                }
                self.editor.clear();
                self.toasts.info(format!("Saved, but reload failed: {error}"));
                self.start_load();
            }
            MutationStatus::Failed(err) => {
                let message = match &err {
                    ApiError::Auth => "Unauthorized: check the passkey".to_string(),
                    other => other.to_string(),
                };
                self.toasts.error(message);
            }
        }
    }

    /// Re-runs every list against the current collection.
    fn refresh_surfaces(&mut self) {
        let collection = self.store.collection();
        self.archive.update_items(collection.filter(&self.query));
        self.archive.clamp_scroll();
        self.manage.update_items(collection.posts().to_vec());
        self.manage.clamp_scroll();
        let recent = collection.recent(HOME_RECENT).len();
        self.home_selected = self.home_selected.min(recent.saturating_sub(1));

        if self.nav.active().post_id().is_some() {
            self.request_content();
        }
    }

    fn apply_filter(&mut self) {
        let filtered = self.store.collection().filter(&self.query);
        self.archive.update_items(filtered);
        self.archive.clamp_scroll();
    }

    fn switch_view(&mut self, view: View) {
        self.nav.switch_view(view);
        self.after_transition();
    }

    fn open_post(&mut self, id: String) {
        self.nav.open_post(id);
        self.after_transition();
    }

    fn after_transition(&mut self) {
        self.searching = false;
        let keep = matches!(
            (&self.content, self.nav.active().post_id()),
            (Some(rendered), Some(id)) if rendered.post_id == id
        );
        if !keep {
            self.content = None;
        }
        if self.nav.active().post_id().is_some() {
            self.request_content();
        }
    }

    fn go_back(&mut self) {
        if self.nav.back() {
            self.after_transition();
        } else {
            self.status_message = "No earlier view.".into();
        }
    }

    fn go_forward(&mut self) {
        if self.nav.forward() {
            self.after_transition();
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        self.colors = UiColors::for_theme(self.theme);
        self.content_cache = new_content_cache(self.theme, self.keying, self.render_capacity);
        self.content = None;
        self.request_content();

        if let Some(path) = &self.theme_path {
            if let Err(err) = config::save_theme(Some(path.clone()), self.theme) {
                tracing::warn!(error = %err, "theme not persisted");
                self.toasts.error(format!("Theme not saved: {err:#}"));
                return;
            }
        }
        self.toasts.info(format!("Theme: {}", self.theme.as_str()));
    }

    fn submit_form(&mut self) {
        let Some(passkey) = self.admin.passkey().map(str::to_string) else {
            self.toasts.error("Enter the passkey first");
            return;
        };
        let job = match self.editor.to_job(self.store.collection()) {
            Ok(job) => job,
            Err(err) => {
                self.toasts.error(err.to_string());
                return;
            }
        };
        match self.mutations.submit(job, &passkey) {
            Ok(ticket) => {
                tracing::debug!(ticket, "mutation queued");
                self.status_message = "Saving…".into();
            }
            Err(err) => self.toasts.error(format!("{err:#}")),
        }
    }

    fn capturing_text(&self) -> bool {
        match self.nav.active() {
            View::Archive => self.searching,
            View::Admin => !self.admin.is_unlocked() || self.admin_focus == AdminFocus::Form,
            _ => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return Ok(true),
                KeyCode::Char('s') => {
                    if self.nav.is_active(&View::Admin) && self.admin.is_unlocked() {
                        self.submit_form();
                    }
                    return Ok(false);
                }
                _ => {}
            }
        }

        if self.capturing_text() {
            self.handle_text_key(key.code);
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => self.switch_view(View::Home),
            KeyCode::Char('2') => self.switch_view(View::Archive),
            KeyCode::Char('3') => self.switch_view(View::Admin),
            KeyCode::Tab => {
                let next = match self.nav.active_nav() {
                    Some(NavTab::Home) => NavTab::Archive,
                    Some(NavTab::Archive) => NavTab::Admin,
                    Some(NavTab::Admin) | None => NavTab::Home,
                };
                self.switch_view(next.view());
            }
            KeyCode::Char('[') | KeyCode::Backspace => self.go_back(),
            KeyCode::Char(']') => self.go_forward(),
            KeyCode::Esc => {
                if self.nav.active().post_id().is_some() {
                    self.go_back();
                }
            }
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('r') => {
                if !self.request_load() {
                    self.status_message = "Already loading…".into();
                }
            }
            KeyCode::Char('/') if self.nav.is_active(&View::Archive) => {
                self.searching = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.page(1),
            KeyCode::PageUp => self.page(-1),
            KeyCode::Enter => self.activate_selection(),
            KeyCode::Char('e') if self.nav.is_active(&View::Admin) => self.edit_selected(),
            KeyCode::Char('n') | KeyCode::Char('i') if self.nav.is_active(&View::Admin) => {
                if key.code == KeyCode::Char('n') {
                    self.editor.clear();
                }
                self.admin_focus = AdminFocus::Form;
            }
            KeyCode::Char('x') if self.nav.is_active(&View::Admin) => {
                self.admin.lock();
                self.toasts.info("Admin locked");
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_text_key(&mut self, code: KeyCode) {
        match self.nav.active() {
            View::Archive => match code {
                KeyCode::Esc | KeyCode::Enter => self.searching = false,
                KeyCode::Backspace => {
                    self.query.pop();
                    self.apply_filter();
                }
                KeyCode::Down => self.archive.move_selection(1),
                KeyCode::Up => self.archive.move_selection(-1),
                KeyCode::Char(ch) => {
                    self.query.push(ch);
                    self.apply_filter();
                }
                _ => {}
            },
            View::Admin if !self.admin.is_unlocked() => match code {
                KeyCode::Esc => self.go_back(),
                KeyCode::Enter => {
                    match self.admin.unlock(&self.passkey_input) {
                        Ok(()) => {
                            self.toasts.info("Admin unlocked");
                            self.admin_focus = AdminFocus::Form;
                        }
                        Err(err) => self.toasts.error(err.to_string()),
                    }
                    self.passkey_input.clear();
                }
                KeyCode::Backspace => {
                    self.passkey_input.pop();
                }
                KeyCode::Char(ch) => self.passkey_input.push(ch),
                _ => {}
            },
            View::Admin => match code {
                KeyCode::Esc => self.admin_focus = AdminFocus::Manage,
                KeyCode::Tab => self.editor.focus_next(),
                KeyCode::BackTab => self.editor.focus_prev(),
                KeyCode::Enter => self.editor.newline(),
                KeyCode::Backspace => self.editor.backspace(),
                KeyCode::Char(ch) => self.editor.insert_char(ch),
                _ => {}
            },
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.nav.active() {
            View::Home => {
                let len = self.store.collection().recent(HOME_RECENT).len();
                if len == 0 {
                    return;
                }
                self.home_selected = if delta.is_negative() {
                    self.home_selected.saturating_sub(delta.unsigned_abs())
                } else {
                    (self.home_selected + delta.unsigned_abs()).min(len - 1)
                };
            }
            View::Archive => self.archive.move_selection(delta),
            View::Admin => self.manage.move_selection(delta),
            View::Single(_) => self.nav.scroll_pane_by(delta),
        }
    }

    fn page(&mut self, direction: isize) {
        match self.nav.active() {
            View::Archive => {
                let rows = self.archive.viewport().height / self.archive.row_height();
                self.archive.move_selection(direction * rows.max(1) as isize);
            }
            View::Admin => {
                let rows = self.manage.viewport().height / self.manage.row_height();
                self.manage.move_selection(direction * rows.max(1) as isize);
            }
            View::Home | View::Single(_) => self.nav.scroll_pane_by(direction * 10),
        }
    }

    fn activate_selection(&mut self) {
        let target = match self.nav.active() {
            View::Home => self
                .store
                .collection()
                .recent(HOME_RECENT)
                .get(self.home_selected)
                .map(|post| post.id.clone()),
            View::Archive => self.archive.selected_item().map(|post| post.id.clone()),
            View::Admin => {
                self.edit_selected();
                None
            }
            View::Single(_) => None,
        };
        if let Some(id) = target {
            self.open_post(id);
        }
    }

    fn edit_selected(&mut self) {
        let Some(post) = self.manage.selected_item().cloned() else {
            return;
        };
        self.editor.load(&post);
        self.admin_focus = AdminFocus::Form;
        self.status_message = format!("Editing {}", post.title);
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(self.colors.bg)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        self.draw_tabs(frame, layout[0]);
        match self.nav.active().clone() {
            View::Home => self.draw_home(frame, layout[1]),
            View::Archive => self.draw_archive(frame, layout[1]),
            View::Single(id) => self.draw_single(frame, layout[1], &id),
            View::Admin => self.draw_admin(frame, layout[1]),
        }
        self.draw_footer(frame, layout[2]);
        self.draw_toasts(frame, layout[1]);
    }

    fn panel_block(&self, title: String, focused: bool) -> Block<'static> {
        let border = if focused {
            self.colors.accent
        } else {
            self.colors.border
        };
        Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.colors.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(self.colors.panel))
            .padding(Padding::horizontal(1))
    }

    fn draw_tabs(&self, frame: &mut Frame<'_>, area: Rect) {
        let colors = self.colors;
        let mut spans = vec![Span::styled(
            " blog-tui ",
            Style::default()
                .fg(colors.bg)
                .bg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )];
        let active = self.nav.active_nav();
        for (index, tab) in NavTab::ALL.iter().enumerate() {
            let style = if active == Some(*tab) {
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(colors.muted)
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(format!("{} {}", index + 1, tab.label()), style));
        }
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(colors.panel)),
            area,
        );
    }

    fn draw_home(&self, frame: &mut Frame<'_>, area: Rect) {
        let colors = self.colors;
        let mut lines: Vec<Line<'static>> = vec![
            Line::from(Span::styled(
                "Latest transmissions",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
        ];

        let recent = self.store.collection().recent(HOME_RECENT);
        if recent.is_empty() {
            let message = if self.pending_load.is_some() {
                "Loading…"
            } else {
                "No posts yet."
            };
            lines.push(Line::from(Span::styled(
                message,
                Style::default().fg(colors.muted),
            )));
        }
        for (index, post) in recent.iter().enumerate() {
            let selected = index == self.home_selected;
            lines.extend(post_row(post).lines(3, usize::MAX, &colors, selected));
            lines.push(Line::default());
        }

        if !self.timeline.is_empty() {
            lines.push(Line::from(Span::styled(
                "Timeline",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());
            for entry in &self.timeline {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{:<16}", entry.year),
                        Style::default().fg(colors.accent),
                    ),
                    Span::styled(
                        entry.title.clone(),
                        Style::default()
                            .fg(colors.text)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
                lines.push(Line::from(Span::styled(
                    format!("{:<16}{}", "", entry.desc),
                    Style::default().fg(colors.muted),
                )));
            }
        }

        let paragraph = Paragraph::new(lines)
            .block(self.panel_block("Home".into(), true))
            .wrap(Wrap { trim: false })
            .scroll((scroll_offset(self.nav.pane_scroll()), 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_archive(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let title = format!(
            "Archive ({}/{})",
            self.archive.len(),
            self.store.collection().len()
        );
        let block = self.panel_block(title, true);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);

        let colors = self.colors;
        let search = if self.searching {
            Line::from(vec![
                Span::styled("/ ", Style::default().fg(colors.accent)),
                Span::styled(self.query.clone(), Style::default().fg(colors.text)),
                Span::styled("▏", Style::default().fg(colors.accent)),
            ])
        } else if self.query.is_empty() {
            Line::from(Span::styled(
                "Press / to filter by title, tag or content",
                Style::default().fg(colors.muted),
            ))
        } else {
            Line::from(vec![
                Span::styled("filter: ", Style::default().fg(colors.muted)),
                Span::styled(self.query.clone(), Style::default().fg(colors.text)),
            ])
        };
        frame.render_widget(Paragraph::new(search), chunks[0]);

        self.draw_list(frame, chunks[1], ListPane::Archive, true);
    }

    fn draw_list(&mut self, frame: &mut Frame<'_>, area: Rect, pane: ListPane, focused: bool) {
        let colors = self.colors;
        let height = area.height as usize;
        let width = area.width.saturating_sub(1) as usize;
        let empty_message = match pane {
            ListPane::Archive if !self.query.is_empty() => {
                format!("No posts match \"{}\".", self.query)
            }
            _ => "No posts yet.".to_string(),
        };
        let list = match pane {
            ListPane::Archive => &mut self.archive,
            ListPane::Manage => &mut self.manage,
        };
        list.resize(height);

        if list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(empty_message, Style::default().fg(colors.muted)))
                    .alignment(Alignment::Center),
                area,
            );
            return;
        }

        let lines = window_lines(list, height, width, &colors, focused);
        frame.render_widget(Paragraph::new(lines), area);

        if list.spacer_height() > height {
            let mut state = ScrollbarState::new(list.max_scroll())
                .position(list.viewport().scroll_top)
                .viewport_content_length(height);
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .style(Style::default().fg(colors.accent)),
                area,
                &mut state,
            );
        }
    }

    fn draw_single(&self, frame: &mut Frame<'_>, area: Rect, id: &str) {
        let colors = self.colors;
        let post = self.store.collection().find(id);
        let mut text = Text::default();

        match post {
            Some(post) => {
                text.lines.push(Line::from(Span::styled(
                    post.title.clone(),
                    Style::default()
                        .fg(colors.accent)
                        .add_modifier(Modifier::BOLD),
                )));
                text.lines.push(Line::from(Span::styled(
                    post_row(post).meta,
                    Style::default().fg(colors.muted),
                )));
                text.lines.push(Line::default());
                match &self.content {
                    Some(rendered) if rendered.post_id == id => {
                        text.lines.extend(rendered.text.lines.iter().cloned());
                    }
                    _ => text.lines.push(Line::from(Span::styled(
                        format!("{} Rendering…", self.spinner.frame()),
                        Style::default().fg(colors.muted),
                    ))),
                }
            }
            None => {
                let message = if self.loaded_once {
                    "Post not found."
                } else {
                    "Loading…"
                };
                text.lines.push(Line::from(Span::styled(
                    message,
                    Style::default().fg(colors.muted),
                )));
            }
        }

        let paragraph = Paragraph::new(text)
            .block(self.panel_block("Post".into(), true))
            .wrap(Wrap { trim: false })
            .scroll((scroll_offset(self.nav.pane_scroll()), 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_admin(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let colors = self.colors;
        if !self.admin.is_unlocked() {
            let popup = centered_rect(60, 40, area);
            frame.render_widget(Clear, popup);
            let masked = "•".repeat(self.passkey_input.chars().count());
            let lines = vec![
                Line::from(Span::styled(
                    "Restricted area. Enter the passkey.",
                    Style::default().fg(colors.text),
                )),
                Line::default(),
                Line::from(vec![
                    Span::styled("Passkey: ", Style::default().fg(colors.muted)),
                    Span::styled(masked, Style::default().fg(colors.accent)),
                    Span::styled("▏", Style::default().fg(colors.accent)),
                ]),
                Line::default(),
                Line::from(Span::styled(
                    "Enter unlock · Esc back",
                    Style::default().fg(colors.muted),
                )),
            ];
            frame.render_widget(
                Paragraph::new(lines)
                    .block(self.panel_block("Admin access".into(), true))
                    .wrap(Wrap { trim: false }),
                popup,
            );
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let form_focused = self.admin_focus == AdminFocus::Form;
        let mut lines = Vec::new();
        for field in Field::ALL {
            let focused = form_focused && self.editor.focus == field;
            let label_style = if focused {
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.muted)
            };
            lines.push(Line::from(Span::styled(field.label(), label_style)));
            let value = self.editor.value(field);
            let mut value_lines: Vec<Line<'static>> = value
                .split('\n')
                .map(|part| {
                    Line::from(Span::styled(
                        format!("  {part}"),
                        Style::default().fg(colors.text),
                    ))
                })
                .collect();
            if focused {
                if let Some(last) = value_lines.last_mut() {
                    last.spans
                        .push(Span::styled("▏", Style::default().fg(colors.accent)));
                }
            }
            if !field.is_multiline() {
                value_lines.truncate(1);
            }
            lines.extend(value_lines);
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Ctrl-S {} · Tab next field · Esc post list", self.editor.submit_label()),
            Style::default().fg(colors.muted),
        )));

        let title = format!("Editor: {}", self.editor.submit_label());
        frame.render_widget(
            Paragraph::new(lines)
                .block(self.panel_block(title, form_focused))
                .wrap(Wrap { trim: false }),
            chunks[0],
        );

        let block = self.panel_block(format!("Manage ({})", self.manage.len()), !form_focused);
        let inner = block.inner(chunks[1]);
        frame.render_widget(block, chunks[1]);
        self.draw_list(frame, inner, ListPane::Manage, !form_focused);
    }

    fn footer_text(&self) -> String {
        let hints = match self.nav.active() {
            View::Home => "j/k select · Enter open · Tab/1-3 views · t theme · r reload · q quit",
            View::Archive if self.searching => "type to filter · Enter/Esc done",
            View::Archive => "/ filter · j/k select · Enter open · [ back · ] forward · q quit",
            View::Single(_) => "j/k scroll · Esc back · ] forward · t theme · q quit",
            View::Admin if !self.admin.is_unlocked() => "Enter unlock · Esc back",
            View::Admin => match self.admin_focus {
                AdminFocus::Form => "Ctrl-S save · Tab/Shift-Tab fields · Esc post list",
                AdminFocus::Manage => "j/k select · e edit · n new · i form · x lock · q quit",
            },
        };
        let status = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        if status.trim().is_empty() {
            hints.to_string()
        } else {
            format!("{status}  |  {hints}")
        }
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(self.colors.muted)
                    .bg(self.colors.panel)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    fn draw_toasts(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.toasts.is_empty() || area.width < 12 || area.height < 4 {
            return;
        }
        let width = area.width.min(48);
        let height = (self.toasts.len() as u16 + 2).min(area.height);
        let popup = Rect {
            x: area.x + area.width - width,
            y: area.y + area.height - height,
            width,
            height,
        };

        let lines: Vec<Line<'static>> = self
            .toasts
            .iter()
            .map(|toast| {
                Line::from(vec![
                    Span::styled(
                        format!("[{}] ", toast.kind.as_str()),
                        Style::default()
                            .fg(self.colors.toast(toast.kind))
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        truncate(&toast.text, width.saturating_sub(12) as usize),
                        Style::default().fg(self.colors.text),
                    ),
                ])
            })
            .collect();

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.colors.accent))
                    .style(Style::default().bg(self.colors.panel)),
            ),
            popup,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListPane {
    Archive,
    Manage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    use crate::api::NewPost;
    use crate::data::MemoryPostService;
    use crate::mutation::MutationJob;

    fn options(service: Arc<MemoryPostService>, route: &str) -> Options {
        Options {
            service,
            route: route.into(),
            theme: Theme::Dark,
            theme_path: None,
            row_height: 3,
            buffer_rows: 2,
            toast_ttl: Duration::from_secs(10),
            render_capacity: 16,
            keying: CacheKeying::ContentHash,
            status_message: String::new(),
        }
    }

    fn model(route: &str) -> (Model, Arc<MemoryPostService>) {
        let service = Arc::new(MemoryPostService::demo());
        let model = Model::new(options(service.clone(), route)).unwrap();
        (model, service)
    }

    fn settle(model: &mut Model) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            model.poll_async();
            if !model.is_loading() {
                model.poll_async();
                return;
            }
            assert!(Instant::now() < deadline, "background work did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn press(model: &mut Model, code: KeyCode) -> bool {
        model
            .handle_key(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap()
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            press(model, KeyCode::Char(ch));
        }
    }

    fn screen(model: &mut Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| model.draw(frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn duplicate_load_requests_are_ignored() {
        let (mut model, _) = model("/");
        assert!(model.request_load());
        assert!(!model.request_load());
        settle(&mut model);
        assert_eq!(model.store.loads(), 1);
        assert_eq!(model.timeline.len(), 4);
        assert_eq!(model.archive.len(), 121);
        assert!(model.request_load());
        settle(&mut model);
    }

    #[test]
    fn archive_filter_updates_window() {
        let (mut model, _) = model("/archive");
        model.request_load();
        settle(&mut model);

        press(&mut model, KeyCode::Char('/'));
        type_text(&mut model, "log_11");
        assert_eq!(model.archive.len(), 10);
        assert!(model
            .archive
            .items()
            .iter()
            .all(|post| post.tag.starts_with("LOG_11")));
        press(&mut model, KeyCode::Esc);
        assert!(!model.searching);
        assert_eq!(model.query, "log_11");

        let shown = screen(&mut model);
        assert!(shown.contains("filter: log_11"));
    }

    #[test]
    fn stale_render_is_discarded_after_navigation() {
        let (mut model, _) = model("/");
        model.request_load();
        settle(&mut model);

        model.open_post("welcome".into());
        model.switch_view(View::Archive);
        settle(&mut model);
        assert!(model.content.is_none());

        model.go_back();
        settle(&mut model);
        assert_eq!(
            model.content.as_ref().map(|c| c.post_id.as_str()),
            Some("welcome")
        );
        assert!(screen(&mut model).contains("Quotes stand out"));
    }

    #[test]
    fn opening_from_home_uses_newest_posts() {
        let (mut model, _) = model("/");
        model.request_load();
        settle(&mut model);
        press(&mut model, KeyCode::Char('j'));
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.nav.active(), &View::Single("demo-120".into()));
        assert_eq!(model.nav.active_nav(), None);
        settle(&mut model);
        assert!(model.content.is_some());
    }

    #[test]
    fn duplicate_tag_is_rejected_before_submit() {
        let (mut model, service) = model("/admin");
        model.request_load();
        settle(&mut model);

        type_text(&mut model, "demo");
        press(&mut model, KeyCode::Enter);
        assert!(model.admin.is_unlocked());

        type_text(&mut model, "Again");
        press(&mut model, KeyCode::Tab);
        type_text(&mut model, "log_001");
        model.editor.focus = Field::Content;
        type_text(&mut model, "body");
        model
            .handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .unwrap();

        assert!(!model.mutations.is_busy());
        assert_eq!(model.editor.title, "Again");
        assert_eq!(service.snapshot().len(), 121);
        assert_eq!(
            model.toasts.latest().map(|t| t.kind),
            Some(ToastKind::Error)
        );
    }

    #[test]
    fn publishing_reloads_every_surface() {
        let (mut model, _) = model("/admin");
        model.request_load();
        settle(&mut model);

        type_text(&mut model, "demo");
        press(&mut model, KeyCode::Enter);
        type_text(&mut model, "Brand new");
        press(&mut model, KeyCode::Tab);
        type_text(&mut model, "LOG_999");
        model.editor.focus = Field::Content;
        type_text(&mut model, "# Fresh");
        model
            .handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .unwrap();
        settle(&mut model);

        assert_eq!(model.store.collection().len(), 122);
        assert_eq!(model.store.collection().posts()[0].title, "Brand new");
        assert_eq!(model.manage.len(), 122);
        assert_eq!(model.archive.len(), 122);
        assert_eq!(model.editor, EditForm::new());
        assert_eq!(
            model.toasts.latest().map(|t| t.text.as_str()),
            Some("Saved")
        );
    }

    #[test]
    fn wrong_passkey_keeps_the_form() {
        let (mut model, _) = model("/admin");
        model.request_load();
        settle(&mut model);

        type_text(&mut model, "nope");
        press(&mut model, KeyCode::Enter);
        type_text(&mut model, "Title");
        model.editor.focus = Field::Content;
        type_text(&mut model, "Body");
        model
            .handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .unwrap();
        settle(&mut model);

        assert_eq!(model.editor.title, "Title");
        assert_eq!(
            model.toasts.latest().map(|t| t.text.as_str()),
            Some("Unauthorized: check the passkey")
        );
    }

    #[test]
    fn theme_toggle_stays_in_memory_without_path() {
        let (mut model, _) = model("/");
        press(&mut model, KeyCode::Char('t'));
        assert_eq!(model.theme, Theme::Light);
        assert_eq!(
            model.toasts.latest().map(|t| t.text.as_str()),
            Some("Theme: light")
        );
    }

    fn saved(posts: Vec<Post>) -> AsyncResponse {
        AsyncResponse::Mutation(MutationOutcome {
            ticket: 1,
            job: MutationJob::Create(NewPost {
                tag: "LOG_999".into(),
                title: "Brand new".into(),
                content: "body".into(),
                ..NewPost::default()
            }),
            status: MutationStatus::Saved { posts },
        })
    }

    #[test]
    fn load_started_before_a_write_cannot_undo_it() {
        let (mut model, service) = model("/archive");
        model.request_load();
        settle(&mut model);
        let before_write = service.snapshot();

        assert!(model.request_load());
        let in_flight = model.pending_load.unwrap();
        let writes_seen = model.writes_applied;

        let mut after_write = before_write.clone();
        after_write.insert(0, post_with_id("fresh"));
        model.handle_async_response(saved(after_write));
        model.handle_async_response(AsyncResponse::Loaded {
            request_id: in_flight,
            writes_seen,
            timeline: Ok(Snapshot::fresh(Vec::new())),
            posts: Ok(Snapshot::fresh(before_write)),
        });
        model.poll_async();

        assert_eq!(model.pending_load, None);
        assert_eq!(model.store.collection().len(), 122);
        assert!(model.store.collection().find("fresh").is_some());
        assert_eq!(model.archive.len(), 122);
        settle(&mut model);
    }

    #[test]
    fn reload_after_failed_refresh_supersedes_older_load() {
        let (mut model, _) = model("/");
        model.request_load();
        settle(&mut model);

        assert!(model.request_load());
        let older = model.pending_load.unwrap();
        model.handle_async_response(AsyncResponse::Mutation(MutationOutcome {
            ticket: 1,
            job: MutationJob::Create(NewPost::default()),
            status: MutationStatus::SavedWithoutReload {
                error: "timeout".into(),
            },
        }));
        let newer = model.pending_load.unwrap();
        assert_ne!(older, newer);

        model.handle_async_response(AsyncResponse::Loaded {
            request_id: older,
            writes_seen: 0,
            timeline: Ok(Snapshot::fresh(Vec::new())),
            posts: Ok(Snapshot::fresh(Vec::new())),
        });
        assert_eq!(model.pending_load, Some(newer));
        assert_eq!(model.store.collection().len(), 121);

        settle(&mut model);
        assert_eq!(model.pending_load, None);
        assert_eq!(model.store.collection().len(), 121);
        assert_eq!(model.store.loads(), 2);
    }

    fn post_with_id(id: &str) -> Post {
        Post {
            id: id.into(),
            tag: "LOG_999".into(),
            date: "2025.10.01".into(),
            title: "Brand new".into(),
            teaser: String::new(),
            content: "body".into(),
        }
    }

    #[test]
    fn quit_key_stops_loop() {
        let (mut model, _) = model("/");
        assert!(press(&mut model, KeyCode::Char('q')));
    }

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("line\nnext", 20), "line");
    }
}
