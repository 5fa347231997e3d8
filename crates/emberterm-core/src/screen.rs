//! One screen: the active area plus (for the primary screen) paged history.
//!
//! The active area is a row vector mutated in place; cursor motion never
//! allocates. All cell writes funnel through helpers that keep the style
//! table refcounts, the hyperlink refcounts, and the wide head/tail pairing
//! consistent — the invariants in the crate docs hold after every public
//! method returns.

use crate::cell::{Cell, CellContent, WidthClass};
use crate::charset::Charsets;
use crate::cursor::{Cursor, SavedCursor};
use crate::hyperlink::LinkRegistry;
use crate::page::PageList;
use crate::row::{Row, RowFlags, RowId};
use crate::selection::{SelPoint, Selection};
use crate::style::{Color, Style, StyleTable};
use crate::tabstops::TabStops;

/// Which screen storage a row belongs to. Part of the render-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenKind {
    Primary,
    Alt,
}

/// Screen storage and the state that travels with it.
#[derive(Debug)]
pub struct Screen {
    kind: ScreenKind,
    cols: u16,
    rows: Vec<Row>,
    styles: StyleTable,
    links: LinkRegistry,
    history: PageList,
    pub cursor: Cursor,
    pub saved_cursor: Option<SavedCursor>,
    pub charsets: Charsets,
    pub tabs: TabStops,
    /// Scroll region rows, `top < bottom <= rows` (bottom exclusive).
    scroll_top: u16,
    scroll_bottom: u16,
    /// Column margins, `left < right <= cols` (right exclusive). Only
    /// consulted when DECLRMM is enabled; kept full-width otherwise.
    left_margin: u16,
    right_margin: u16,
    /// Viewport scroll position: how many history rows the view is shifted
    /// up from the live bottom. 0 = following output.
    display_offset: usize,
    selection: Option<Selection>,
    next_row_id: RowId,
}

impl Screen {
    pub fn new(kind: ScreenKind, cols: u16, rows: u16, max_scrollback: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        // Row ids are unique across both screens: the alt screen allocates
        // from the top half of the id space.
        let id_base: RowId = match kind {
            ScreenKind::Primary => 0,
            ScreenKind::Alt => 1 << 63,
        };
        let mut next_row_id = id_base;
        let rows_vec = (0..rows)
            .map(|_| {
                let id = next_row_id;
                next_row_id += 1;
                Row::new(cols, id)
            })
            .collect();
        Self {
            kind,
            cols,
            rows: rows_vec,
            styles: StyleTable::new(),
            links: LinkRegistry::new(),
            history: match kind {
                ScreenKind::Primary => PageList::new(max_scrollback),
                ScreenKind::Alt => PageList::new(0),
            },
            cursor: Cursor::default(),
            saved_cursor: None,
            charsets: Charsets::default(),
            tabs: TabStops::new(cols),
            scroll_top: 0,
            scroll_bottom: rows,
            left_margin: 0,
            right_margin: cols,
            display_offset: 0,
            selection: None,
            next_row_id,
        }
    }

    pub fn kind(&self) -> ScreenKind {
        self.kind
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows.len() as u16
    }

    pub fn row(&self, y: u16) -> Option<&Row> {
        self.rows.get(y as usize)
    }

    pub fn row_mut(&mut self, y: u16) -> Option<&mut Row> {
        self.rows.get_mut(y as usize)
    }

    pub fn active_rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn active_rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut LinkRegistry {
        &mut self.links
    }

    pub fn history(&self) -> &PageList {
        &self.history
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    // ── Regions and margins ─────────────────────────────────────────

    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    /// DECSTBM. Arguments are 0-based, bottom exclusive; invalid regions
    /// reset to full height.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows();
        let bottom = bottom.min(rows);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = rows;
        }
    }

    pub fn left_margin(&self) -> u16 {
        self.left_margin
    }

    pub fn right_margin(&self) -> u16 {
        self.right_margin
    }

    /// DECSLRM. 0-based, right exclusive; invalid margins reset to full width.
    pub fn set_lr_margins(&mut self, left: u16, right: u16) {
        let right = right.min(self.cols);
        if left < right {
            self.left_margin = left;
            self.right_margin = right;
        } else {
            self.left_margin = 0;
            self.right_margin = self.cols;
        }
    }

    pub fn reset_lr_margins(&mut self) {
        self.left_margin = 0;
        self.right_margin = self.cols;
    }

    fn full_width_region(&self) -> bool {
        self.left_margin == 0 && self.right_margin == self.cols
    }

    // ── Cell writes ─────────────────────────────────────────────────

    fn fresh_row_id(&mut self) -> RowId {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    /// Release the style/link references held by one cell and blank it.
    fn erase_cell(&mut self, y: u16, x: u16, bg: Color) {
        let Some(row) = self.rows.get_mut(y as usize) else {
            return;
        };
        let Some(cell) = row.cell(x) else { return };
        let (old_style, old_link, extended) =
            (cell.style, cell.link, cell.grapheme_extended());
        self.styles.release(old_style);
        self.links.release(old_link);
        if extended {
            row.clear_grapheme(x);
        }
        *row.cell_mut(x).unwrap() = Cell::blank(bg);
    }

    /// Release every reference a row holds (before discarding its content).
    fn release_row(&mut self, y: u16) {
        let Some(row) = self.rows.get_mut(y as usize) else {
            return;
        };
        for cell in row.cells() {
            self.styles.release(cell.style);
            self.links.release(cell.link);
        }
    }

    /// Write a narrow scalar at the cursor-independent position `(y, x)`.
    ///
    /// Takes care of style/link refcounts and of breaking any wide pair the
    /// write lands on. The brush's style is interned here.
    pub fn write_scalar(&mut self, y: u16, x: u16, ch: char, brush: &Style, link: u16) {
        if y >= self.rows() || x >= self.cols {
            return;
        }
        self.break_wide_pair(y, x);
        let style = self.styles.acquire(brush);
        self.links.acquire(link);
        let Some(row) = self.rows.get_mut(y as usize) else {
            return;
        };
        let cell = row.cell_mut(x).unwrap();
        let (old_style, old_link, extended) =
            (cell.style, cell.link, cell.grapheme_extended());
        *cell = Cell {
            content: CellContent::from_char(ch),
            style,
            link,
            ..Cell::default()
        };
        self.styles.release(old_style);
        self.links.release(old_link);
        if extended {
            self.rows[y as usize].clear_grapheme(x);
        }
    }

    /// Write a wide scalar: head at `(y, x)`, tail at `(y, x + 1)`.
    ///
    /// Caller guarantees `x + 1` is inside the line; the print path inserts
    /// a spacer head and wraps before calling this when it would not be.
    pub fn write_wide(&mut self, y: u16, x: u16, ch: char, brush: &Style, link: u16) {
        if y >= self.rows() || x + 1 >= self.cols {
            return;
        }
        self.write_scalar(y, x, ch, brush, link);
        self.write_scalar(y, x + 1, ' ', brush, link);
        let row = &mut self.rows[y as usize];
        row.cell_mut(x).unwrap().set_width_class(WidthClass::WideHead);
        let tail = row.cell_mut(x + 1).unwrap();
        tail.content = CellContent::EMPTY;
        tail.set_width_class(WidthClass::WideTail);
    }

    /// Mark a margin column with a spacer head (wide scalar wrapped early).
    pub fn write_spacer_head(&mut self, y: u16, x: u16, bg: Color) {
        let x = x.min(self.cols - 1);
        self.erase_cell(y, x, bg);
        if let Some(row) = self.rows.get_mut(y as usize) {
            row.cell_mut(x)
                .unwrap()
                .set_width_class(WidthClass::SpacerHead);
        }
    }

    /// Writing into half of a wide pair orphans the other half; blank it.
    fn break_wide_pair(&mut self, y: u16, x: u16) {
        let Some(row) = self.rows.get(y as usize) else {
            return;
        };
        match row.cell(x).map(Cell::width_class) {
            Some(WidthClass::WideHead) => {
                if x + 1 < self.cols {
                    self.erase_cell(y, x + 1, Color::Default);
                }
            }
            Some(WidthClass::WideTail) => {
                if x > 0 {
                    self.erase_cell(y, x - 1, Color::Default);
                }
            }
            _ => {}
        }
    }

    /// DECSCA protection on the cell most recently written at `(y, x)`.
    pub fn protect_cell(&mut self, y: u16, x: u16, on: bool) {
        if let Some(row) = self.rows.get_mut(y as usize)
            && let Some(cell) = row.cell_mut(x)
        {
            cell.set_protected(on);
        }
    }

    // ── Erase operations ────────────────────────────────────────────

    /// Erase columns `[start, end)` of a row. `selective` (DECSEL/DECSED)
    /// skips DECSCA-protected cells.
    pub fn erase_cols(&mut self, y: u16, start: u16, end: u16, bg: Color, selective: bool) {
        if y >= self.rows() {
            return;
        }
        let start = start.min(self.cols);
        let end = end.min(self.cols);
        if start >= end {
            return;
        }
        // Wide fixups at the boundaries: erasing half a pair erases the
        // other half too.
        if start > 0
            && self.rows[y as usize]
                .cell(start)
                .is_some_and(Cell::is_wide_tail)
        {
            self.erase_cell(y, start - 1, bg);
        }
        if end < self.cols
            && self.rows[y as usize]
                .cell(end)
                .is_some_and(Cell::is_wide_tail)
        {
            self.erase_cell(y, end, bg);
        }
        for x in start..end {
            if selective
                && self.rows[y as usize]
                    .cell(x)
                    .is_some_and(Cell::protected)
            {
                continue;
            }
            self.erase_cell(y, x, bg);
        }
    }

    /// Erase whole rows `[start, end)`.
    pub fn erase_rows(&mut self, start: u16, end: u16, bg: Color, selective: bool) {
        for y in start..end.min(self.rows()) {
            self.erase_cols(y, 0, self.cols, bg, selective);
            if !selective && let Some(row) = self.rows.get_mut(y as usize) {
                row.set_wrapped(false);
            }
        }
    }

    /// ED 3: drop all scrollback.
    pub fn erase_history(&mut self) {
        let dropped = self.history.clear();
        for page in &dropped {
            for row in page.rows() {
                for cell in row.cells() {
                    self.links.release(cell.link);
                }
            }
        }
        if let Some(sel) = &self.selection
            && (matches!(sel.start, SelPoint::History(_))
                || matches!(sel.end, SelPoint::History(_)))
        {
            self.selection = None;
        }
        self.display_offset = 0;
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll the scroll region up by `n`: content moves up, blank rows
    /// appear at the bottom. On the primary screen with a full-screen,
    /// full-width region the evicted rows feed scrollback; otherwise they
    /// are discarded.
    pub fn scroll_region_up(&mut self, n: u16) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        self.scroll_up_in(top, bottom, n);
    }

    /// Scroll rows `[top, bottom)` up by `n` (IL/DL use subregions).
    pub fn scroll_up_in(&mut self, top: u16, bottom: u16, n: u16) {
        let bottom = bottom.min(self.rows());
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        let bg = self.cursor.brush.bg;

        if !self.full_width_region() {
            self.scroll_cells_up(top, bottom, n, bg);
            return;
        }

        let to_history = self.kind == ScreenKind::Primary
            && top == 0
            && bottom == self.rows()
            && self.history.max_rows() > 0;

        for i in top..top + n {
            if to_history {
                let id = self.fresh_row_id();
                let cols = self.cols;
                let mut fresh = Row::new(cols, id);
                fresh.reset(bg, id);
                let evicted = std::mem::replace(&mut self.rows[i as usize], fresh);

                // Selection endpoints sitting on the evicted row become
                // history pins once the row lands in a page.
                let (start_col, end_col) = match &self.selection {
                    Some(sel) => (
                        match sel.start {
                            SelPoint::Active { row, col } if row == i => Some(col),
                            _ => None,
                        },
                        match sel.end {
                            SelPoint::Active { row, col } if row == i => Some(col),
                            _ => None,
                        },
                    ),
                    None => (None, None),
                };

                let dropped = self.history.push_row(evicted, &mut self.styles);

                let start_pin = start_col.and_then(|c| self.history.newest_pin(c));
                let end_pin = end_col.and_then(|c| self.history.newest_pin(c));
                if let Some(sel) = &mut self.selection {
                    if let Some(pin) = start_pin {
                        sel.start = SelPoint::History(pin);
                    }
                    if let Some(pin) = end_pin {
                        sel.end = SelPoint::History(pin);
                    }
                }

                for page in &dropped {
                    for row in page.rows() {
                        for cell in row.cells() {
                            self.links.release(cell.link);
                        }
                    }
                }
                if !dropped.is_empty() {
                    self.drop_selection_if_pruned();
                }
            } else {
                self.release_row(i);
                let id = self.fresh_row_id();
                self.rows[i as usize].reset(bg, id);
            }
        }
        self.rows[top as usize..bottom as usize].rotate_left(n as usize);
        for row in &mut self.rows[top as usize..bottom as usize] {
            row.mark_dirty();
        }
        self.shift_active_selection(top, bottom, -(n as i32));
    }

    /// Scroll rows `[top, bottom)` down by `n`: blank rows appear at the top.
    pub fn scroll_down_in(&mut self, top: u16, bottom: u16, n: u16) {
        let bottom = bottom.min(self.rows());
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        let bg = self.cursor.brush.bg;

        if !self.full_width_region() {
            self.scroll_cells_down(top, bottom, n, bg);
            return;
        }

        for i in bottom - n..bottom {
            self.release_row(i);
            let id = self.fresh_row_id();
            self.rows[i as usize].reset(bg, id);
        }
        self.rows[top as usize..bottom as usize].rotate_right(n as usize);
        for row in &mut self.rows[top as usize..bottom as usize] {
            row.mark_dirty();
        }
        self.shift_active_selection(top, bottom, n as i32);
    }

    pub fn scroll_region_down(&mut self, n: u16) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        self.scroll_down_in(top, bottom, n);
    }

    /// Column-bounded scroll (DECLRMM margins narrower than the line):
    /// shift the margin span of each row, never touching history or ids.
    fn scroll_cells_up(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let (left, right) = (self.left_margin, self.right_margin);
        for y in top..bottom {
            let src = y + n;
            for x in left..right {
                if src < bottom {
                    let cell = self.rows[src as usize].cell(x).copied().unwrap_or_default();
                    self.copy_cell_into(y, x, cell);
                } else {
                    self.erase_cell(y, x, bg);
                }
            }
        }
    }

    fn scroll_cells_down(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let (left, right) = (self.left_margin, self.right_margin);
        for y in (top..bottom).rev() {
            for x in left..right {
                if y >= top + n {
                    let cell = self.rows[(y - n) as usize]
                        .cell(x)
                        .copied()
                        .unwrap_or_default();
                    self.copy_cell_into(y, x, cell);
                } else {
                    self.erase_cell(y, x, bg);
                }
            }
        }
    }

    /// Copy a cell value into a slot, fixing refcounts for both sides.
    fn copy_cell_into(&mut self, y: u16, x: u16, cell: Cell) {
        self.styles.acquire_id(cell.style);
        self.links.acquire(cell.link);
        let row = &mut self.rows[y as usize];
        let old = *row.cell(x).unwrap();
        *row.cell_mut(x).unwrap() = cell;
        if old.grapheme_extended() {
            row.clear_grapheme(x);
        }
        self.styles.release(old.style);
        self.links.release(old.link);
    }

    // ── Insert / delete characters ──────────────────────────────────

    /// ICH: insert `n` blanks at `(y, x)` shifting the rest of the margin
    /// span right; cells pushed past the right margin are lost.
    pub fn insert_chars(&mut self, y: u16, x: u16, n: u16) {
        let right = self.right_margin;
        if y >= self.rows() || x >= right || n == 0 {
            return;
        }
        let bg = self.cursor.brush.bg;
        let n = n.min(right - x);
        self.break_wide_pair(y, x);
        // Release whatever falls off the margin (with wide fixups).
        self.erase_cols(y, right - n, right, bg, false);
        let row = &mut self.rows[y as usize];
        row.cells_mut()[x as usize..right as usize].rotate_right(n as usize);
        // A wide head shifted against the margin loses its tail.
        let last = right - 1;
        if row.cell(last).is_some_and(Cell::is_wide_head) {
            self.erase_cell(y, last, bg);
        }
    }

    /// DCH: delete `n` cells at `(y, x)`, closing the gap from the right
    /// margin; blanks fill the vacated span.
    pub fn delete_chars(&mut self, y: u16, x: u16, n: u16) {
        let right = self.right_margin;
        if y >= self.rows() || x >= right || n == 0 {
            return;
        }
        let bg = self.cursor.brush.bg;
        let n = n.min(right - x);
        self.break_wide_pair(y, x);
        // Release the deleted span (with wide fixups), then close the gap.
        self.erase_cols(y, x, x + n, bg, false);
        let row = &mut self.rows[y as usize];
        row.cells_mut()[x as usize..right as usize].rotate_left(n as usize);
        // An orphaned tail pulled to the deletion point loses its head.
        if row.cell(x).is_some_and(Cell::is_wide_tail) {
            self.erase_cell(y, x, bg);
        }
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize the active area.
    ///
    /// Truncate/extend policy: no reflow. Width changes cut or pad each
    /// row. Shrinking pushes rows above the cursor into history (primary)
    /// or discards them (alt); growing pulls rows back out of history.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let old_rows = self.rows();

        if cols != self.cols {
            for row in &mut self.rows {
                // Release references in the truncated span first.
                if cols < row.len() {
                    for cell in &row.cells()[cols as usize..] {
                        self.styles.release(cell.style);
                        self.links.release(cell.link);
                    }
                }
                row.resize(cols);
            }
            self.cols = cols;
            self.tabs.resize(cols);
            self.selection = None;
        }

        if rows < old_rows {
            let mut excess = old_rows - rows;
            // Keep the cursor visible: evict from the top, at most down to
            // the cursor row.
            let evict = excess.min(self.cursor.y);
            for _ in 0..evict {
                let evicted = self.rows.remove(0);
                if self.kind == ScreenKind::Primary {
                    let dropped = self.history.push_row(evicted, &mut self.styles);
                    for page in dropped {
                        for row in page.rows() {
                            for cell in row.cells() {
                                self.links.release(cell.link);
                            }
                        }
                    }
                } else {
                    for cell in evicted.cells() {
                        self.styles.release(cell.style);
                        self.links.release(cell.link);
                    }
                }
                self.cursor.y = self.cursor.y.saturating_sub(1);
                excess -= 1;
            }
            // Still too tall: trim blank rows from the bottom.
            for _ in 0..excess {
                let y = self.rows() - 1;
                self.release_row(y);
                self.rows.pop();
            }
        } else if rows > old_rows {
            let mut needed = rows - old_rows;
            // Pull history back to the top first.
            while needed > 0 {
                let Some(mut restored) = self.history.pop_newest(&mut self.styles) else {
                    break;
                };
                restored.resize(cols);
                restored.mark_dirty();
                self.rows.insert(0, restored);
                self.cursor.y += 1;
                needed -= 1;
            }
            for _ in 0..needed {
                let id = self.fresh_row_id();
                self.rows.push(Row::new(cols, id));
            }
        }

        self.scroll_top = 0;
        self.scroll_bottom = self.rows();
        self.reset_lr_margins();
        self.cursor.x = self.cursor.x.min(self.cols - 1);
        self.cursor.y = self.cursor.y.min(self.rows() - 1);
        self.cursor.pending_wrap = false;
        self.display_offset = 0;
        if rows != old_rows {
            self.selection = None;
        }
    }

    // ── Viewport ────────────────────────────────────────────────────

    pub fn display_offset(&self) -> usize {
        self.display_offset
    }

    /// Scroll the viewport by `delta` rows (negative = toward history).
    pub fn scroll_viewport(&mut self, delta: i32) {
        let max = self.history.len();
        let next = self.display_offset as i64 - delta as i64;
        self.display_offset = next.clamp(0, max as i64) as usize;
    }

    pub fn scroll_viewport_to_top(&mut self) {
        self.display_offset = self.history.len();
    }

    pub fn scroll_viewport_to_bottom(&mut self) {
        self.display_offset = 0;
    }

    /// Move the viewport to the `n`-th previous (negative) or next
    /// (positive) prompt row, as marked by OSC 133.
    pub fn jump_to_prompt(&mut self, delta: i32) {
        if delta == 0 {
            return;
        }
        let hist_len = self.history.len();
        let viewport_top = hist_len - self.display_offset.min(hist_len);

        let mut prompts: Vec<usize> = Vec::new();
        for (i, row) in self.history.iter().enumerate() {
            if row.flags.contains(RowFlags::PROMPT_START) {
                prompts.push(i);
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.flags.contains(RowFlags::PROMPT_START) {
                prompts.push(hist_len + i);
            }
        }

        let target = if delta < 0 {
            prompts
                .iter()
                .rev()
                .filter(|&&line| line < viewport_top)
                .nth((-delta - 1) as usize)
        } else {
            prompts
                .iter()
                .filter(|&&line| line > viewport_top)
                .nth((delta - 1) as usize)
        };
        if let Some(&line) = target {
            self.display_offset = hist_len.saturating_sub(line).min(hist_len);
        }
    }

    /// The rows currently visible, honoring the display offset. Yields
    /// history rows first, then active rows.
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        let rows = self.rows() as usize;
        let hist_len = self.history.len();
        let offset = self.display_offset.min(hist_len);
        let hist_take = offset.min(rows);
        let hist_start = hist_len - offset;
        (hist_start..hist_start + hist_take)
            .filter_map(move |i| self.history.row_at(i))
            .chain(self.rows.iter().take(rows - hist_take))
    }

    // ── Selection maintenance ───────────────────────────────────────

    /// Drop the selection when a pinned page was pruned from history.
    fn drop_selection_if_pruned(&mut self) {
        let Some(sel) = &self.selection else { return };
        let dead = [sel.start, sel.end].iter().any(|p| match p {
            SelPoint::History(pin) => !self.history.contains(pin.page),
            _ => false,
        });
        if dead {
            self.selection = None;
        }
    }

    fn shift_active_selection(&mut self, top: u16, bottom: u16, delta: i32) {
        let Some(sel) = &mut self.selection else {
            return;
        };
        let mut drop = false;
        for point in [&mut sel.start, &mut sel.end] {
            if let SelPoint::Active { row, .. } = point
                && *row >= top
                && *row < bottom
            {
                let moved = *row as i32 + delta;
                if moved < top as i32 || moved >= bottom as i32 {
                    drop = true;
                } else {
                    *row = moved as u16;
                }
            }
        }
        if drop {
            self.selection = None;
        }
    }

    // ── DECALN ──────────────────────────────────────────────────────

    /// Fill the whole screen with 'E' for the alignment test.
    pub fn fill_alignment_pattern(&mut self) {
        let brush = Style::default();
        for y in 0..self.rows() {
            for x in 0..self.cols {
                self.write_scalar(y, x, 'E', &brush, 0);
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleFlags;

    fn screen() -> Screen {
        Screen::new(ScreenKind::Primary, 10, 5, 100)
    }

    fn text(screen: &Screen, y: u16) -> String {
        screen.row(y).unwrap().text()
    }

    fn write_str(screen: &mut Screen, y: u16, x: u16, s: &str) {
        let brush = Style::default();
        for (i, ch) in s.chars().enumerate() {
            screen.write_scalar(y, x + i as u16, ch, &brush, 0);
        }
    }

    #[test]
    fn write_and_read_back() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "hello");
        assert_eq!(text(&s, 0), "hello");
    }

    #[test]
    fn styled_write_maintains_refcounts() {
        let mut s = screen();
        let bold = Style {
            flags: StyleFlags::BOLD,
            ..Style::default()
        };
        s.write_scalar(0, 0, 'a', &bold, 0);
        s.write_scalar(0, 1, 'b', &bold, 0);
        let id = s.row(0).unwrap().cell(0).unwrap().style;
        assert_ne!(id, 0);
        assert_eq!(s.styles().refcount(id), 2);

        // Overwrite one with default: refcount drops.
        s.write_scalar(0, 0, 'c', &Style::default(), 0);
        assert_eq!(s.styles().refcount(id), 1);

        s.erase_cols(0, 0, 10, Color::Default, false);
        assert_eq!(s.styles().refcount(id), 0);
    }

    #[test]
    fn wide_write_places_head_and_tail() {
        let mut s = screen();
        s.write_wide(0, 2, '中', &Style::default(), 0);
        assert_eq!(s.row(0).unwrap().cell(2).unwrap().width_class(), WidthClass::WideHead);
        assert_eq!(s.row(0).unwrap().cell(3).unwrap().width_class(), WidthClass::WideTail);
        assert_eq!(text(&s, 0), "中");
    }

    #[test]
    fn overwriting_tail_clears_head() {
        let mut s = screen();
        s.write_wide(0, 2, '中', &Style::default(), 0);
        s.write_scalar(0, 3, 'x', &Style::default(), 0);
        assert_eq!(s.row(0).unwrap().cell(2).unwrap().width_class(), WidthClass::Narrow);
        assert!(s.row(0).unwrap().cell(2).unwrap().content.is_empty());
        assert_eq!(text(&s, 0), "  x");
    }

    #[test]
    fn overwriting_head_clears_tail() {
        let mut s = screen();
        s.write_wide(0, 2, '中', &Style::default(), 0);
        s.write_scalar(0, 2, 'x', &Style::default(), 0);
        assert_eq!(s.row(0).unwrap().cell(3).unwrap().width_class(), WidthClass::Narrow);
        assert_eq!(text(&s, 0), "  x");
    }

    #[test]
    fn scroll_up_feeds_history_and_keeps_row_ids() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "top");
        let top_id = s.row(0).unwrap().id();
        s.scroll_region_up(1);
        assert_eq!(s.history().len(), 1);
        let hist = s.history().row_at(0).unwrap();
        assert_eq!(hist.text(), "top");
        assert_eq!(hist.id(), top_id);
        assert_eq!(text(&s, 0), "");
    }

    #[test]
    fn scroll_up_in_subregion_discards() {
        let mut s = screen();
        for y in 0..5 {
            write_str(&mut s, y, 0, &format!("r{y}"));
        }
        s.set_scroll_region(1, 4);
        s.scroll_region_up(1);
        assert_eq!(s.history().len(), 0);
        assert_eq!(text(&s, 0), "r0");
        assert_eq!(text(&s, 1), "r2");
        assert_eq!(text(&s, 2), "r3");
        assert_eq!(text(&s, 3), "");
        assert_eq!(text(&s, 4), "r4");
    }

    #[test]
    fn scroll_down_blanks_top_of_region() {
        let mut s = screen();
        for y in 0..5 {
            write_str(&mut s, y, 0, &format!("r{y}"));
        }
        s.set_scroll_region(1, 4);
        s.scroll_region_down(1);
        assert_eq!(text(&s, 0), "r0");
        assert_eq!(text(&s, 1), "");
        assert_eq!(text(&s, 2), "r1");
        assert_eq!(text(&s, 3), "r2");
        assert_eq!(text(&s, 4), "r4");
    }

    #[test]
    fn alt_screen_never_accumulates_history() {
        let mut s = Screen::new(ScreenKind::Alt, 10, 5, 100);
        write_str(&mut s, 0, 0, "gone");
        s.scroll_region_up(1);
        assert_eq!(s.history().len(), 0);
        assert_eq!(text(&s, 0), "");
    }

    #[test]
    fn insert_chars_shifts_right_within_margins() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "abcde");
        s.insert_chars(0, 1, 2);
        assert_eq!(text(&s, 0), "a  bcde");
    }

    #[test]
    fn delete_chars_closes_gap() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "abcde");
        s.delete_chars(0, 1, 2);
        assert_eq!(text(&s, 0), "ade");
    }

    #[test]
    fn erase_cols_selective_skips_protected() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "abc");
        s.protect_cell(0, 1, true);
        s.erase_cols(0, 0, 10, Color::Default, true);
        assert_eq!(text(&s, 0), " b");
        // Non-selective clears everything.
        s.erase_cols(0, 0, 10, Color::Default, false);
        assert_eq!(text(&s, 0), "");
    }

    #[test]
    fn erase_half_of_wide_pair_erases_both() {
        let mut s = screen();
        s.write_wide(0, 2, '中', &Style::default(), 0);
        s.erase_cols(0, 3, 4, Color::Default, false);
        assert_eq!(text(&s, 0), "");
    }

    #[test]
    fn resize_narrower_cuts_rows() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "abcdefghij");
        s.resize(4, 5);
        assert_eq!(s.cols(), 4);
        assert_eq!(text(&s, 0), "abcd");
    }

    #[test]
    fn resize_shorter_pushes_into_history() {
        let mut s = screen();
        for y in 0..5 {
            write_str(&mut s, y, 0, &format!("r{y}"));
        }
        s.cursor.y = 4;
        s.resize(10, 3);
        assert_eq!(s.rows(), 3);
        assert_eq!(s.history().len(), 2);
        assert_eq!(text(&s, 0), "r2");
        assert_eq!(s.cursor.y, 2);
    }

    #[test]
    fn resize_taller_pulls_history_back() {
        let mut s = screen();
        for y in 0..5 {
            write_str(&mut s, y, 0, &format!("r{y}"));
        }
        s.cursor.y = 4;
        s.resize(10, 3);
        s.resize(10, 5);
        assert_eq!(s.rows(), 5);
        assert_eq!(s.history().len(), 0);
        assert_eq!(text(&s, 0), "r0");
        assert_eq!(text(&s, 4), "r4");
        assert_eq!(s.cursor.y, 4);
    }

    #[test]
    fn viewport_offset_clamps_to_history() {
        let mut s = screen();
        for _ in 0..7 {
            s.scroll_region_up(1);
        }
        assert_eq!(s.history().len(), 7);
        s.scroll_viewport(-100);
        assert_eq!(s.display_offset(), 7);
        s.scroll_viewport(3);
        assert_eq!(s.display_offset(), 4);
        s.scroll_viewport_to_bottom();
        assert_eq!(s.display_offset(), 0);
    }

    #[test]
    fn visible_rows_blend_history_and_active() {
        let mut s = screen();
        write_str(&mut s, 0, 0, "old");
        s.scroll_region_up(1);
        write_str(&mut s, 0, 0, "new");
        s.scroll_viewport(-1);
        let texts: Vec<String> = s.visible_rows().map(Row::text).collect();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts[0], "old");
        assert_eq!(texts[1], "new");
    }

    #[test]
    fn lr_margin_scroll_moves_only_margin_columns() {
        let mut s = screen();
        for y in 0..3 {
            write_str(&mut s, y, 0, &format!("{y}{y}{y}{y}{y}"));
        }
        s.set_lr_margins(1, 4);
        s.set_scroll_region(0, 3);
        s.scroll_region_up(1);
        // Columns 0 and 4 stay; 1..4 shifted up.
        assert_eq!(text(&s, 0), "01110");
        assert_eq!(text(&s, 1), "12221");
        assert_eq!(text(&s, 2), "2   2");
    }

    #[test]
    fn alignment_pattern_fills_screen() {
        let mut s = screen();
        s.fill_alignment_pattern();
        assert_eq!(text(&s, 0), "EEEEEEEEEE");
        assert_eq!(text(&s, 4), "EEEEEEEEEE");
    }
}
