//! Windowed list rendering.
//!
//! A [`VirtualList`] owns an item sequence but only materializes rows for the
//! slice of the sequence that intersects the viewport, plus `buffer` rows on
//! either side. All offsets share one unit (terminal rows in this client),
//! and every row has the same height.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderWindow {
    pub start: usize,
    pub end: usize,
}

impl RenderWindow {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub scroll_top: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(scroll_top: usize, height: usize) -> Self {
        Self { scroll_top, height }
    }
}

/// Half-open range of rows to mount. The row touching the bottom edge of the
/// viewport counts as visible, so both sides get exactly `buffer` extra rows.
pub fn compute_window(
    len: usize,
    row_height: usize,
    viewport: Viewport,
    buffer: usize,
) -> RenderWindow {
    let row_height = row_height.max(1);
    let first_visible = viewport.scroll_top / row_height;
    let last_visible = viewport.scroll_top.saturating_add(viewport.height) / row_height;

    let start = first_visible.saturating_sub(buffer).min(len);
    let end = last_visible
        .saturating_add(1)
        .saturating_add(buffer)
        .min(len)
        .max(start);
    RenderWindow { start, end }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedRow<R> {
    pub index: usize,
    pub top: usize,
    pub height: usize,
    pub element: R,
}

type RowRenderer<T, R> = Box<dyn Fn(&T) -> R>;

pub struct VirtualList<T, R> {
    viewport: Viewport,
    items: Vec<T>,
    render_row: RowRenderer<T, R>,
    row_height: usize,
    buffer: usize,
    spacer_height: usize,
    window: RenderWindow,
    mounted: Vec<MountedRow<R>>,
    selected: usize,
    rows_mounted: u64,
}

impl<T, R> VirtualList<T, R> {
    pub fn new<F>(
        viewport: Viewport,
        items: Vec<T>,
        render_row: F,
        row_height: usize,
        buffer: usize,
    ) -> Self
    where
        F: Fn(&T) -> R + 'static,
    {
        let mut list = Self {
            viewport,
            items,
            render_row: Box::new(render_row),
            row_height: row_height.max(1),
            buffer,
            spacer_height: 0,
            window: RenderWindow::default(),
            mounted: Vec::new(),
            selected: 0,
            rows_mounted: 0,
        };
        list.refresh();
        list
    }

    /// Swaps in a new sequence. The scroll offset is kept; the window is
    /// clamped to the new length.
    pub fn update_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
        self.refresh();
    }

    pub fn refresh(&mut self) {
        self.spacer_height = self.items.len().saturating_mul(self.row_height);
        self.scroller();
    }

    /// Scroll handler: recompute the window and remount its rows.
    pub fn scroller(&mut self) {
        self.window = compute_window(self.items.len(), self.row_height, self.viewport, self.buffer);

        self.mounted.clear();
        for index in self.window.start..self.window.end {
            let Some(item) = self.items.get(index) else {
                continue;
            };
            let element = (self.render_row)(item);
            self.mounted.push(MountedRow {
                index,
                top: index.saturating_mul(self.row_height),
                height: self.row_height,
                element,
            });
            self.rows_mounted += 1;
        }
    }

    pub fn scroll_to(&mut self, scroll_top: usize) {
        self.viewport.scroll_top = scroll_top.min(self.max_scroll());
        self.scroller();
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = if delta.is_negative() {
            self.viewport.scroll_top.saturating_sub(delta.unsigned_abs())
        } else {
            self.viewport.scroll_top.saturating_add(delta.unsigned_abs())
        };
        self.scroll_to(target);
    }

    /// Pulls the scroll offset back inside the current extent.
    pub fn clamp_scroll(&mut self) {
        self.scroll_to(self.viewport.scroll_top);
    }

    pub fn resize(&mut self, height: usize) {
        if self.viewport.height != height {
            self.viewport.height = height;
            self.scroller();
        }
    }

    pub fn max_scroll(&self) -> usize {
        self.spacer_height.saturating_sub(self.viewport.height)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn row_height(&self) -> usize {
        self.row_height
    }

    pub fn spacer_height(&self) -> usize {
        self.spacer_height
    }

    pub fn window(&self) -> RenderWindow {
        self.window
    }

    pub fn mounted(&self) -> &[MountedRow<R>] {
        &self.mounted
    }

    pub fn rows_mounted(&self) -> u64 {
        self.rows_mounted
    }

    pub fn selected(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.selected)
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub fn select(&mut self, index: usize) {
        if self.items.is_empty() {
            self.selected = 0;
            return;
        }
        self.selected = index.min(self.items.len() - 1);
        self.ensure_selected_visible();
    }

    pub fn move_selection(&mut self, delta: isize) {
        let target = if delta.is_negative() {
            self.selected.saturating_sub(delta.unsigned_abs())
        } else {
            self.selected.saturating_add(delta.unsigned_abs())
        };
        self.select(target);
    }

    fn ensure_selected_visible(&mut self) {
        let top = self.selected.saturating_mul(self.row_height);
        let bottom = top.saturating_add(self.row_height);
        let view_top = self.viewport.scroll_top;
        let view_bottom = view_top.saturating_add(self.viewport.height);
        if top < view_top {
            self.scroll_to(top);
        } else if bottom > view_bottom {
            self.scroll_to(bottom.saturating_sub(self.viewport.height));
        }
    }
}

impl<T: fmt::Debug, R> fmt::Debug for VirtualList<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualList")
            .field("viewport", &self.viewport)
            .field("len", &self.items.len())
            .field("row_height", &self.row_height)
            .field("buffer", &self.buffer)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(n: usize, row_height: usize, viewport: Viewport, buffer: usize) -> VirtualList<usize, String> {
        VirtualList::new(
            viewport,
            (0..n).collect(),
            |item: &usize| format!("row {item}"),
            row_height,
            buffer,
        )
    }

    #[test]
    fn window_for_reference_layout() {
        let window = compute_window(50, 100, Viewport::new(500, 300), 2);
        assert_eq!(window, RenderWindow { start: 3, end: 11 });
    }

    #[test]
    fn extreme_offsets_do_not_overflow() {
        let window = compute_window(10, 1, Viewport::new(usize::MAX - 1, 5), 0);
        assert_eq!(window, RenderWindow { start: 10, end: 10 });

        let mut list = list(3, usize::MAX / 2, Viewport::new(0, 24), 1);
        assert_eq!(list.spacer_height(), usize::MAX);
        list.select(2);
        assert_eq!(list.selected(), Some(2));
        assert!(list.mounted().iter().all(|row| row.index < 3));
    }

    #[test]
    fn window_at_top_starts_at_zero() {
        let window = compute_window(50, 100, Viewport::new(0, 300), 5);
        assert_eq!(window.start, 0);
        assert_eq!(window.end, 9);
    }

    #[test]
    fn mounted_rows_match_window_for_many_layouts() {
        for n in [0usize, 1, 2, 7, 50, 333] {
            for row_height in [1usize, 3, 100] {
                for scroll_top in [0usize, 1, 5, 99, 500, 10_000] {
                    for height in [0usize, 1, 24, 300] {
                        for buffer in [0usize, 2, 5] {
                            let list =
                                list(n, row_height, Viewport::new(scroll_top, height), buffer);
                            let window = list.window();
                            assert_eq!(list.mounted().len(), n.min(window.len()));
                            assert!(list.mounted().iter().all(|row| row.index < n));
                            assert!(window.end <= n);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn rows_are_positioned_by_index() {
        let list = list(50, 100, Viewport::new(500, 300), 2);
        let indices: Vec<usize> = list.mounted().iter().map(|row| row.index).collect();
        assert_eq!(indices, (3..11).collect::<Vec<_>>());
        for row in list.mounted() {
            assert_eq!(row.top, row.index * 100);
            assert_eq!(row.height, 100);
            assert_eq!(row.element, format!("row {}", row.index));
        }
        assert_eq!(list.spacer_height(), 5000);
    }

    #[test]
    fn emptying_the_list_unmounts_everything() {
        let mut list = list(50, 3, Viewport::new(30, 24), 5);
        assert!(!list.mounted().is_empty());
        list.update_items(Vec::new());
        assert!(list.mounted().is_empty());
        assert_eq!(list.spacer_height(), 0);
        assert!(list.window().is_empty());
    }

    #[test]
    fn shrinking_below_scroll_offset_clamps_without_resetting_scroll() {
        let mut list = list(100, 3, Viewport::new(240, 24), 2);
        list.update_items(vec![0, 1, 2]);
        assert_eq!(list.viewport().scroll_top, 240);
        assert!(list.window().end <= 3);
        assert!(list.mounted().iter().all(|row| row.index < 3));

        list.clamp_scroll();
        assert_eq!(list.viewport().scroll_top, 0);
        assert_eq!(list.mounted().len(), 3);
    }

    #[test]
    fn every_scroll_event_recomputes() {
        let mut list = list(100, 1, Viewport::new(0, 10), 0);
        let before = list.rows_mounted();
        list.scroll_by(5);
        list.scroll_by(5);
        assert_eq!(list.viewport().scroll_top, 10);
        assert_eq!(list.window(), RenderWindow { start: 10, end: 21 });
        assert!(list.rows_mounted() > before);

        list.scroll_by(-100);
        assert_eq!(list.viewport().scroll_top, 0);
        list.scroll_to(usize::MAX);
        assert_eq!(list.viewport().scroll_top, list.max_scroll());
    }

    #[test]
    fn selection_scrolls_into_view() {
        let mut list = list(40, 3, Viewport::new(0, 9), 1);
        list.select(5);
        let viewport = list.viewport();
        assert!(5 * 3 >= viewport.scroll_top);
        assert!(5 * 3 + 3 <= viewport.scroll_top + viewport.height);

        list.move_selection(-5);
        assert_eq!(list.selected(), Some(0));
        assert_eq!(list.viewport().scroll_top, 0);

        list.move_selection(1_000);
        assert_eq!(list.selected(), Some(39));
        assert_eq!(list.viewport().scroll_top, list.max_scroll());
    }
}
