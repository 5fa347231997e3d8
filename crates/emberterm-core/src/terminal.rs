//! The terminal model: semantic operations over two screens.
//!
//! Everything the stream dispatcher invokes lands here: printing with
//! deferred autowrap, cursor motion, erase and scroll operations, mode
//! switches, charset handling, the alt-screen matrix, color overrides, and
//! the image side-table. All operations are total — out-of-range arguments
//! saturate, they never panic.

use unicode_width::UnicodeWidthChar;

use crate::charset::Charset;
use crate::cursor::{CursorStyle, SavedCursor};
use crate::hyperlink::Hyperlink;
use crate::image::ImageStore;
use crate::modes::{ModeKind, ModeState, Modes, lookup};
use crate::osc::DynamicColor;
use crate::parser::Params;
use crate::row::RowFlags;
use crate::screen::{Screen, ScreenKind};
use crate::sgr;
use crate::style::Color;

/// Maximum depth of the XTWINOPS title stack.
const TITLE_STACK_MAX: usize = 10;

/// Runtime color overrides: OSC 4 palette entries plus the OSC 10/11/12
/// dynamic colors. `None` means "use the configured default".
#[derive(Debug, Clone)]
pub struct ColorOverrides {
    palette: [Option<(u8, u8, u8)>; 256],
    pub foreground: Option<(u8, u8, u8)>,
    pub background: Option<(u8, u8, u8)>,
    pub cursor: Option<(u8, u8, u8)>,
}

impl Default for ColorOverrides {
    fn default() -> Self {
        Self {
            palette: [None; 256],
            foreground: None,
            background: None,
            cursor: None,
        }
    }
}

impl ColorOverrides {
    pub fn set_palette(&mut self, index: u8, color: (u8, u8, u8)) {
        self.palette[index as usize] = Some(color);
    }

    pub fn reset_palette(&mut self, index: Option<u8>) {
        match index {
            Some(i) => self.palette[i as usize] = None,
            None => self.palette = [None; 256],
        }
    }

    /// Effective palette color: override or the standard xterm value.
    pub fn palette(&self, index: u8) -> (u8, u8, u8) {
        self.palette[index as usize].unwrap_or_else(|| default_palette(index))
    }

    pub fn dynamic(&self, which: DynamicColor) -> Option<(u8, u8, u8)> {
        match which {
            DynamicColor::Foreground => self.foreground,
            DynamicColor::Background => self.background,
            DynamicColor::Cursor => self.cursor,
        }
    }

    pub fn set_dynamic(&mut self, which: DynamicColor, color: Option<(u8, u8, u8)>) {
        match which {
            DynamicColor::Foreground => self.foreground = color,
            DynamicColor::Background => self.background = color,
            DynamicColor::Cursor => self.cursor = color,
        }
    }
}

/// Standard xterm 256-color palette value for an index.
pub fn default_palette(index: u8) -> (u8, u8, u8) {
    const BASE: [(u8, u8, u8); 16] = [
        (0x00, 0x00, 0x00),
        (0xcd, 0x00, 0x00),
        (0x00, 0xcd, 0x00),
        (0xcd, 0xcd, 0x00),
        (0x00, 0x00, 0xee),
        (0xcd, 0x00, 0xcd),
        (0x00, 0xcd, 0xcd),
        (0xe5, 0xe5, 0xe5),
        (0x7f, 0x7f, 0x7f),
        (0xff, 0x00, 0x00),
        (0x00, 0xff, 0x00),
        (0xff, 0xff, 0x00),
        (0x5c, 0x5c, 0xff),
        (0xff, 0x00, 0xff),
        (0x00, 0xff, 0xff),
        (0xff, 0xff, 0xff),
    ];
    match index {
        0..=15 => BASE[index as usize],
        16..=231 => {
            let i = index - 16;
            let ramp = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            (ramp(i / 36), ramp((i / 6) % 6), ramp(i % 6))
        }
        _ => {
            let level = 8 + (index - 232) * 10;
            (level, level, level)
        }
    }
}

/// The full terminal state shared between the IO thread and the renderer.
#[derive(Debug)]
pub struct Terminal {
    primary: Screen,
    alt: Screen,
    modes: ModeState,
    title: String,
    title_stack: Vec<String>,
    pwd: String,
    cursor_style: CursorStyle,
    pub colors: ColorOverrides,
    images: ImageStore,
    /// Open OSC 8 anchor, if any, plus its interned id for the active screen.
    link: Option<Hyperlink>,
    link_cache: Option<(ScreenKind, u16)>,
    /// Last printed scalar, for REP.
    last_printed: Option<char>,
    pixel_size: (u16, u16),
}

impl Terminal {
    pub fn new(cols: u16, rows: u16, max_scrollback: usize) -> Self {
        Self {
            primary: Screen::new(ScreenKind::Primary, cols, rows, max_scrollback),
            alt: Screen::new(ScreenKind::Alt, cols, rows, 0),
            modes: ModeState::new(),
            title: String::new(),
            title_stack: Vec::new(),
            pwd: String::new(),
            cursor_style: CursorStyle::default(),
            colors: ColorOverrides::default(),
            images: ImageStore::new(),
            link: None,
            link_cache: None,
            last_printed: None,
            pixel_size: (0, 0),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn active_kind(&self) -> ScreenKind {
        if self.modes.contains(Modes::ALT_SCREEN) {
            ScreenKind::Alt
        } else {
            ScreenKind::Primary
        }
    }

    pub fn screen(&self) -> &Screen {
        match self.active_kind() {
            ScreenKind::Primary => &self.primary,
            ScreenKind::Alt => &self.alt,
        }
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        match self.active_kind() {
            ScreenKind::Primary => &mut self.primary,
            ScreenKind::Alt => &mut self.alt,
        }
    }

    pub fn primary_screen(&self) -> &Screen {
        &self.primary
    }

    pub fn alt_screen(&self) -> &Screen {
        &self.alt
    }

    pub fn modes(&self) -> &ModeState {
        &self.modes
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pwd(&self) -> &str {
        &self.pwd
    }

    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn cols(&self) -> u16 {
        self.screen().cols()
    }

    pub fn rows(&self) -> u16 {
        self.screen().rows()
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Print one scalar at the cursor with full VT semantics: charset
    /// translation, deferred autowrap, wide head/tail placement, insert
    /// mode, and combining-mark accumulation.
    pub fn print(&mut self, ch: char) {
        let ch = if ch.is_ascii() {
            self.screen_mut().charsets.translate(ch)
        } else {
            ch
        };

        let width = match ch.width() {
            Some(0) => {
                self.attach_combining(ch);
                return;
            }
            Some(w) => w.min(2) as u16,
            None => return, // control scalar; nothing to place
        };

        let autowrap = self.modes.contains(Modes::AUTOWRAP);
        let insert = self.modes.contains(Modes::INSERT);
        let link = self.ensure_link_id();
        let screen = self.screen_mut();
        let right = screen.right_margin();

        // Deferred wrap: the previous print parked the cursor past the
        // margin; this byte performs the wrap.
        if screen.cursor.pending_wrap {
            if autowrap {
                let y = screen.cursor.y;
                if let Some(row) = screen.row_mut(y) {
                    row.set_wrapped(true);
                }
                screen.cursor.x = screen.left_margin();
                screen.cursor.pending_wrap = false;
                Self::index_screen(screen);
            } else {
                screen.cursor.pending_wrap = false;
                screen.cursor.x = right - 1;
            }
        }

        // A wide scalar that cannot fit before the margin wraps early,
        // leaving a spacer head in the last column.
        if width == 2 && screen.cursor.x + 1 >= right {
            if !autowrap {
                return;
            }
            let y = screen.cursor.y;
            let bg = screen.cursor.brush.bg;
            screen.write_spacer_head(y, right - 1, bg);
            if let Some(row) = screen.row_mut(y) {
                row.set_wrapped(true);
            }
            screen.cursor.x = screen.left_margin();
            Self::index_screen(screen);
        }

        if insert {
            let (y, x) = (screen.cursor.y, screen.cursor.x);
            screen.insert_chars(y, x, width);
        }

        let (y, x) = (screen.cursor.y, screen.cursor.x);
        let brush = screen.cursor.brush;
        if width == 2 {
            screen.write_wide(y, x, ch, &brush, link);
        } else {
            screen.write_scalar(y, x, ch, &brush, link);
        }
        if screen.cursor.protected {
            screen.protect_cell(y, x, true);
            if width == 2 {
                screen.protect_cell(y, x + 1, true);
            }
        }

        let next = x + width;
        if next >= right {
            if autowrap {
                screen.cursor.x = right;
                screen.cursor.pending_wrap = true;
            } else {
                screen.cursor.x = right - 1;
            }
        } else {
            screen.cursor.x = next;
        }
        self.last_printed = Some(ch);
    }

    /// Attach a zero-width scalar to the most recently printed cell.
    fn attach_combining(&mut self, mark: char) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        let mut x = if screen.cursor.pending_wrap {
            screen.right_margin().saturating_sub(1)
        } else if screen.cursor.x > 0 {
            screen.cursor.x - 1
        } else {
            return;
        };
        let Some(row) = screen.row_mut(y) else { return };
        if row.cell(x).is_some_and(|c| c.is_wide_tail()) && x > 0 {
            x -= 1;
        }
        let Some(cell) = row.cell(x) else { return };
        if cell.grapheme_extended() {
            // Entry exists; any base works since it is ignored.
            row.push_combining(x, '\0', mark);
        } else if let Some(base) = cell.content.codepoint() {
            row.push_combining(x, base, mark);
        }
    }

    /// CSI b — repeat the last printed scalar.
    pub fn repeat_last(&mut self, count: u16) {
        if let Some(ch) = self.last_printed {
            for _ in 0..count.min(self.cols()) {
                self.print(ch);
            }
        }
    }

    fn ensure_link_id(&mut self) -> u16 {
        let Some(link) = self.link.clone() else {
            return 0;
        };
        let kind = self.active_kind();
        if let Some((cached_kind, id)) = self.link_cache
            && cached_kind == kind
        {
            return id;
        }
        let id = self
            .screen_mut()
            .links_mut()
            .intern(&link.uri, link.id.as_deref());
        self.link_cache = Some((kind, id));
        id
    }

    /// OSC 8: open or close a hyperlink anchor.
    pub fn set_hyperlink(&mut self, uri: &str, id: Option<&str>) {
        self.link_cache = None;
        self.link = if uri.is_empty() {
            None
        } else {
            Some(Hyperlink {
                uri: uri.to_string(),
                id: id.map(str::to_string),
            })
        };
    }

    // ── Control characters ──────────────────────────────────────────

    /// BS: one column left, saturating at the left margin (at column 0
    /// when the cursor already sits left of the margin).
    pub fn backspace(&mut self) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let left = screen.left_margin();
        let x = screen.cursor.x.min(screen.cols() - 1);
        let floor = if x >= left { left } else { 0 };
        screen.cursor.x = x.saturating_sub(1).max(floor);
    }

    /// HT: next tab stop, saturating at the right margin.
    pub fn tab(&mut self) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let right = screen.right_margin();
        let x = screen.cursor.x.min(right - 1);
        screen.cursor.x = screen.tabs.next(x, right);
    }

    /// CHT / CBT: forward or backward `n` tab stops.
    pub fn tab_forward(&mut self, n: u16) {
        for _ in 0..n.max(1) {
            self.tab();
        }
    }

    pub fn tab_backward(&mut self, n: u16) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        for _ in 0..n.max(1) {
            let x = screen.cursor.x.min(screen.cols() - 1);
            screen.cursor.x = screen.tabs.prev(x);
        }
    }

    /// HTS: set a tab stop at the cursor column.
    pub fn tab_set(&mut self) {
        let screen = self.screen_mut();
        let x = screen.cursor.x.min(screen.cols() - 1);
        screen.tabs.set(x);
    }

    /// TBC: 0 = clear stop at cursor, 3 = clear all.
    pub fn tab_clear(&mut self, mode: u16) {
        let screen = self.screen_mut();
        match mode {
            0 => {
                let x = screen.cursor.x.min(screen.cols() - 1);
                screen.tabs.clear(x);
            }
            3 => screen.tabs.clear_all(),
            _ => {}
        }
    }

    /// CR: to the left margin.
    pub fn carriage_return(&mut self) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        screen.cursor.x = if screen.cursor.x >= screen.left_margin() {
            screen.left_margin()
        } else {
            0
        };
    }

    /// LF / IND: down one row, scrolling at the bottom of the region.
    pub fn linefeed(&mut self) {
        if self.modes.contains(Modes::LINEFEED) {
            self.carriage_return();
        }
        self.index();
    }

    pub fn index(&mut self) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        Self::index_screen(screen);
    }

    fn index_screen(screen: &mut Screen) {
        if screen.cursor.y + 1 == screen.scroll_bottom() {
            screen.scroll_region_up(1);
        } else if screen.cursor.y + 1 < screen.rows() {
            screen.cursor.y += 1;
        }
    }

    /// RI: up one row, scrolling down at the top of the region.
    pub fn reverse_index(&mut self) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        if screen.cursor.y == screen.scroll_top() {
            screen.scroll_region_down(1);
        } else {
            screen.cursor.y = screen.cursor.y.saturating_sub(1);
        }
    }

    /// NEL: CR + IND.
    pub fn next_line(&mut self) {
        self.carriage_return();
        self.index();
    }

    // ── Cursor positioning ──────────────────────────────────────────

    /// CUP/HVP with 0-based coordinates (already decremented by the caller).
    pub fn cursor_goto(&mut self, row: u16, col: u16) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let (row_base, row_max, col_base, col_max) = if origin {
            (
                screen.scroll_top(),
                screen.scroll_bottom() - 1,
                screen.left_margin(),
                screen.right_margin() - 1,
            )
        } else {
            (0, screen.rows() - 1, 0, screen.cols() - 1)
        };
        screen.cursor.y = (row_base + row).min(row_max);
        screen.cursor.x = (col_base + col).min(col_max);
    }

    /// CUU/CUD: vertical motion saturating at the screen edge (or at the
    /// scroll region when origin mode is on).
    pub fn cursor_up(&mut self, n: u16) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let top = if origin { screen.scroll_top() } else { 0 };
        screen.cursor.y = screen.cursor.y.saturating_sub(n.max(1)).max(top);
    }

    pub fn cursor_down(&mut self, n: u16) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let bottom = if origin {
            screen.scroll_bottom() - 1
        } else {
            screen.rows() - 1
        };
        screen.cursor.y = screen.cursor.y.saturating_add(n.max(1)).min(bottom);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let right = screen.right_margin() - 1;
        let x = screen.cursor.x.min(screen.cols() - 1);
        screen.cursor.x = x.saturating_add(n.max(1)).min(right);
    }

    pub fn cursor_back(&mut self, n: u16) {
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let left = screen.left_margin();
        let x = screen.cursor.x.min(screen.cols() - 1);
        screen.cursor.x = x.saturating_sub(n.max(1)).max(left.min(x));
    }

    /// CHA / HPA: absolute column (0-based).
    pub fn cursor_column(&mut self, col: u16) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let (base, max) = if origin {
            (screen.left_margin(), screen.right_margin() - 1)
        } else {
            (0, screen.cols() - 1)
        };
        screen.cursor.x = (base + col).min(max);
    }

    /// VPA: absolute row (0-based).
    pub fn cursor_row(&mut self, row: u16) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.cursor.pending_wrap = false;
        let (base, max) = if origin {
            (screen.scroll_top(), screen.scroll_bottom() - 1)
        } else {
            (0, screen.rows() - 1)
        };
        screen.cursor.y = (base + row).min(max);
    }

    /// Cursor position for CPR, origin-relative when DECOM is set.
    pub fn cursor_report(&self) -> (u16, u16) {
        let screen = self.screen();
        let x = screen.cursor.x.min(screen.cols() - 1);
        let y = screen.cursor.y;
        if self.modes.contains(Modes::ORIGIN) {
            (
                y.saturating_sub(screen.scroll_top()),
                x.saturating_sub(screen.left_margin()),
            )
        } else {
            (y, x)
        }
    }

    // ── Erase / edit ────────────────────────────────────────────────

    /// EL (selective = DECSEL).
    pub fn erase_line(&mut self, mode: u16, selective: bool) {
        let screen = self.screen_mut();
        let bg = screen.cursor.brush.bg;
        let y = screen.cursor.y;
        let x = screen.cursor.x.min(screen.cols() - 1);
        let cols = screen.cols();
        match mode {
            0 => screen.erase_cols(y, x, cols, bg, selective),
            1 => screen.erase_cols(y, 0, x + 1, bg, selective),
            2 => screen.erase_cols(y, 0, cols, bg, selective),
            _ => {}
        }
    }

    /// ED (selective = DECSED). Mode 2 also snaps the viewport to the
    /// bottom; mode 3 clears scrollback.
    pub fn erase_display(&mut self, mode: u16, selective: bool) {
        let screen = self.screen_mut();
        let bg = screen.cursor.brush.bg;
        let y = screen.cursor.y;
        let x = screen.cursor.x.min(screen.cols() - 1);
        let cols = screen.cols();
        let rows = screen.rows();
        match mode {
            0 => {
                screen.erase_cols(y, x, cols, bg, selective);
                screen.erase_rows(y + 1, rows, bg, selective);
            }
            1 => {
                screen.erase_rows(0, y, bg, selective);
                screen.erase_cols(y, 0, x + 1, bg, selective);
            }
            2 => {
                screen.erase_rows(0, rows, bg, selective);
                screen.scroll_viewport_to_bottom();
            }
            3 => screen.erase_history(),
            _ => {}
        }
    }

    /// ECH: blank `n` cells in place, clearing their styles.
    pub fn erase_chars(&mut self, n: u16) {
        let screen = self.screen_mut();
        let bg = screen.cursor.brush.bg;
        let y = screen.cursor.y;
        let x = screen.cursor.x.min(screen.cols() - 1);
        let end = x.saturating_add(n.max(1)).min(screen.cols());
        screen.erase_cols(y, x, end, bg, false);
        screen.cursor.pending_wrap = false;
    }

    /// ICH / DCH at the cursor.
    pub fn insert_blanks(&mut self, n: u16) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        let x = screen.cursor.x.min(screen.cols() - 1);
        screen.insert_chars(y, x, n.max(1));
        screen.cursor.pending_wrap = false;
    }

    pub fn delete_chars(&mut self, n: u16) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        let x = screen.cursor.x.min(screen.cols() - 1);
        screen.delete_chars(y, x, n.max(1));
        screen.cursor.pending_wrap = false;
    }

    /// IL / DL: only act with the cursor inside the scroll region; the
    /// cursor lands on the left margin.
    pub fn insert_lines(&mut self, n: u16) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        if y < screen.scroll_top() || y >= screen.scroll_bottom() {
            return;
        }
        let bottom = screen.scroll_bottom();
        screen.scroll_down_in(y, bottom, n.max(1));
        screen.cursor.x = screen.left_margin();
        screen.cursor.pending_wrap = false;
    }

    pub fn delete_lines(&mut self, n: u16) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        if y < screen.scroll_top() || y >= screen.scroll_bottom() {
            return;
        }
        let bottom = screen.scroll_bottom();
        screen.scroll_up_in(y, bottom, n.max(1));
        screen.cursor.x = screen.left_margin();
        screen.cursor.pending_wrap = false;
    }

    /// SU / SD.
    pub fn scroll_up(&mut self, n: u16) {
        self.screen_mut().scroll_region_up(n.max(1));
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.screen_mut().scroll_region_down(n.max(1));
    }

    // ── SGR / DECSCA ────────────────────────────────────────────────

    pub fn sgr(&mut self, params: &Params) {
        sgr::apply(&mut self.screen_mut().cursor.brush, params);
    }

    /// DECSCA: 1 = protect cells printed from now on, 0/2 = don't.
    pub fn set_protection(&mut self, on: bool) {
        self.screen_mut().cursor.protected = on;
    }

    // ── Margins ─────────────────────────────────────────────────────

    /// DECSTBM with 1-based wire arguments (0 meaning default).
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows();
        let top = top.max(1) - 1;
        let bottom = if bottom == 0 { rows } else { bottom.min(rows) };
        if top + 1 >= bottom {
            return; // a region under two rows is ignored
        }
        self.screen_mut().set_scroll_region(top, bottom);
        self.cursor_goto(0, 0);
    }

    /// DECSLRM with 1-based wire arguments; only honored under DECLRMM.
    pub fn set_lr_margins(&mut self, left: u16, right: u16) {
        if !self.modes.contains(Modes::LEFT_RIGHT_MARGIN) {
            return;
        }
        let cols = self.cols();
        let left = left.max(1) - 1;
        let right = if right == 0 { cols } else { right.min(cols) };
        if left + 1 >= right {
            return;
        }
        self.screen_mut().set_lr_margins(left, right);
        self.cursor_goto(0, 0);
    }

    // ── Save / restore cursor ───────────────────────────────────────

    pub fn save_cursor(&mut self) {
        let origin = self.modes.contains(Modes::ORIGIN);
        let screen = self.screen_mut();
        screen.saved_cursor = Some(SavedCursor {
            x: screen.cursor.x,
            y: screen.cursor.y,
            pending_wrap: screen.cursor.pending_wrap,
            origin,
            brush: screen.cursor.brush,
            protected: screen.cursor.protected,
            charsets: screen.charsets,
        });
    }

    pub fn restore_cursor(&mut self) {
        let screen = self.screen_mut();
        let saved = screen.saved_cursor.clone().unwrap_or_else(SavedCursor::initial);
        let max_x = screen.cols() - 1;
        let max_y = screen.rows() - 1;
        screen.cursor.x = saved.x.min(max_x);
        screen.cursor.y = saved.y.min(max_y);
        screen.cursor.pending_wrap = saved.pending_wrap;
        screen.cursor.brush = saved.brush;
        screen.cursor.protected = saved.protected;
        screen.charsets = saved.charsets;
        self.modes.set(Modes::ORIGIN, saved.origin);
    }

    // ── Charsets ────────────────────────────────────────────────────

    pub fn designate_charset(&mut self, slot: usize, set: Charset) {
        self.screen_mut().charsets.designate(slot, set);
    }

    pub fn invoke_charset(&mut self, slot: usize, gr: bool) {
        self.screen_mut().charsets.invoke(slot, gr);
    }

    pub fn single_shift(&mut self, slot: usize) {
        self.screen_mut().charsets.single_shift(slot);
    }

    // ── Modes ───────────────────────────────────────────────────────

    /// DECSET/DECRST and SM/RM. Alt-screen and column modes have side
    /// effects beyond the bit flip.
    pub fn set_mode(&mut self, kind: ModeKind, number: u16, enable: bool) {
        if kind == ModeKind::DecPrivate {
            match number {
                47 => {
                    self.switch_alt_screen(enable, false, false);
                    return;
                }
                1047 => {
                    if !enable {
                        self.alt.erase_rows(0, self.alt.rows(), Color::Default, false);
                    }
                    self.switch_alt_screen(enable, false, false);
                    return;
                }
                1048 => {
                    if enable {
                        self.save_cursor();
                    } else {
                        self.restore_cursor();
                    }
                    return;
                }
                1049 => {
                    self.switch_alt_screen(enable, true, true);
                    return;
                }
                _ => {}
            }
        }
        let Some(mode) = lookup(kind, number) else {
            tracing::debug!(?kind, number, enable, "unrecognized mode");
            return;
        };
        self.modes.set(mode, enable);
        if mode == Modes::ORIGIN {
            self.cursor_goto(0, 0);
        } else if mode == Modes::COLUMN_132 {
            self.set_columns(if enable { 132 } else { 80 });
        } else if mode == Modes::LEFT_RIGHT_MARGIN && !enable {
            self.screen_mut().reset_lr_margins();
        }
    }

    pub fn save_mode(&mut self, number: u16) {
        self.modes.save(number);
    }

    pub fn restore_mode(&mut self, number: u16) {
        if let Some(value) = self.modes.restore(number) {
            // Re-run side effects through the normal path.
            self.set_mode(ModeKind::DecPrivate, number, value);
        }
    }

    /// DECCOLM: switch column count, clear the screen, reset regions.
    fn set_columns(&mut self, cols: u16) {
        let rows = self.rows();
        let screen = self.screen_mut();
        screen.resize(cols, rows);
        let total = screen.rows();
        screen.erase_rows(0, total, Color::Default, false);
        self.cursor_goto(0, 0);
    }

    /// The ?47/?1047/?1049 matrix.
    fn switch_alt_screen(&mut self, enter: bool, save_cursor: bool, clear_on_enter: bool) {
        let currently_alt = self.modes.contains(Modes::ALT_SCREEN);
        if enter == currently_alt {
            return;
        }
        self.link_cache = None;
        if enter {
            if save_cursor {
                self.save_cursor();
            }
            // The brush carries across the switch.
            self.alt.cursor = self.primary.cursor.clone();
            self.modes.set(Modes::ALT_SCREEN, true);
            if clear_on_enter {
                let rows = self.alt.rows();
                self.alt.erase_rows(0, rows, Color::Default, false);
                self.cursor_goto(0, 0);
            }
        } else {
            self.modes.set(Modes::ALT_SCREEN, false);
            self.primary.cursor.brush = self.alt.cursor.brush;
            if save_cursor {
                self.restore_cursor();
            }
        }
    }

    // ── DECALN, resets ──────────────────────────────────────────────

    pub fn alignment_test(&mut self) {
        let screen = self.screen_mut();
        let rows = screen.rows();
        screen.set_scroll_region(0, rows);
        screen.reset_lr_margins();
        screen.fill_alignment_pattern();
        screen.cursor.x = 0;
        screen.cursor.y = 0;
        screen.cursor.pending_wrap = false;
    }

    /// DECSTR: soft reset.
    pub fn soft_reset(&mut self) {
        self.modes.set(Modes::CURSOR_VISIBLE, true);
        self.modes.set(Modes::ORIGIN, false);
        self.modes.set(Modes::INSERT, false);
        self.modes.set(Modes::AUTOWRAP, true);
        let screen = self.screen_mut();
        let rows = screen.rows();
        screen.set_scroll_region(0, rows);
        screen.reset_lr_margins();
        screen.cursor.brush = Default::default();
        screen.cursor.protected = false;
        screen.cursor.pending_wrap = false;
        screen.charsets = Default::default();
        screen.saved_cursor = None;
        self.cursor_style = CursorStyle::default();
    }

    /// RIS: full reset.
    pub fn full_reset(&mut self) {
        let cols = self.primary.cols();
        let rows = self.primary.rows();
        let max_scrollback = self.primary.history().max_rows();
        self.primary = Screen::new(ScreenKind::Primary, cols, rows, max_scrollback);
        self.alt = Screen::new(ScreenKind::Alt, cols, rows, 0);
        self.modes.reset();
        self.title.clear();
        self.title_stack.clear();
        self.pwd.clear();
        self.cursor_style = CursorStyle::default();
        self.colors = ColorOverrides::default();
        self.images.clear();
        self.link = None;
        self.link_cache = None;
        self.last_printed = None;
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Window resize from the surface. The alt screen clears, per its
    /// no-scrollback contract.
    pub fn resize(&mut self, cols: u16, rows: u16, pixel_w: u16, pixel_h: u16) {
        if (cols, rows) == (self.primary.cols(), self.primary.rows()) {
            self.pixel_size = (pixel_w, pixel_h);
            return;
        }
        self.primary.resize(cols, rows);
        self.alt.resize(cols, rows);
        let alt_rows = self.alt.rows();
        self.alt.erase_rows(0, alt_rows, Color::Default, false);
        self.pixel_size = (pixel_w, pixel_h);
    }

    pub fn pixel_size(&self) -> (u16, u16) {
        self.pixel_size
    }

    // ── Title / pwd ─────────────────────────────────────────────────

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// XTWINOPS 22: push the current title.
    pub fn push_title(&mut self) {
        if self.title_stack.len() == TITLE_STACK_MAX {
            self.title_stack.remove(0);
        }
        self.title_stack.push(self.title.clone());
    }

    /// XTWINOPS 23: pop a title.
    pub fn pop_title(&mut self) {
        if let Some(title) = self.title_stack.pop() {
            self.title = title;
        }
    }

    pub fn set_pwd(&mut self, pwd: &str) {
        self.pwd = pwd.to_string();
    }

    pub fn set_cursor_style(&mut self, style: CursorStyle) {
        self.cursor_style = style;
    }

    // ── Semantic prompts ────────────────────────────────────────────

    /// OSC 133 marker: flags the current cursor row.
    pub fn mark_prompt(&mut self, flag: RowFlags) {
        let screen = self.screen_mut();
        let y = screen.cursor.y;
        if let Some(row) = screen.row_mut(y) {
            row.flags |= flag;
        }
    }
}
