//! End-to-end scenarios: raw bytes in, grid state out.
//!
//! These mirror the classic conformance cases every terminal must get
//! byte-for-byte right — deferred autowrap, CSI cursor placement, the alt
//! screen matrix, parser resynchronization — plus the save/restore and
//! re-encode round-trip laws.

use emberterm_core::{
    HandlerConfig, Parser, ScreenKind, StreamHandler, StreamState, StyleFlags, SurfaceEvent,
    Terminal, WidthClass,
};

struct Term {
    term: Terminal,
    parser: Parser,
    state: StreamState,
    config: HandlerConfig,
    replies: Vec<u8>,
    events: Vec<SurfaceEvent>,
}

impl Term {
    fn new(cols: u16, rows: u16) -> Self {
        Self {
            term: Terminal::new(cols, rows, 1000),
            parser: Parser::new(),
            state: StreamState::default(),
            config: HandlerConfig::default(),
            replies: Vec::new(),
            events: Vec::new(),
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        let mut handler = StreamHandler {
            term: &mut self.term,
            replies: &mut self.replies,
            events: &mut self.events,
            state: &mut self.state,
            config: &self.config,
        };
        self.parser.advance_slice(&mut handler, bytes);
    }

    fn row(&self, y: u16) -> String {
        self.term.screen().row(y).unwrap().text()
    }

    fn cursor(&self) -> (u16, u16) {
        let c = &self.term.screen().cursor;
        (c.x, c.y)
    }
}

// ── S1: plain text ──────────────────────────────────────────────────

#[test]
fn s1_plain_text() {
    let mut t = Term::new(80, 24);
    t.feed(b"hello\r\nworld");
    assert_eq!(t.row(0), "hello");
    assert_eq!(t.row(1), "world");
    assert_eq!(t.cursor(), (5, 1));
}

// ── S2: backspace ───────────────────────────────────────────────────

#[test]
fn s2_backspace_overwrite() {
    let mut t = Term::new(80, 24);
    t.feed(b"hello\x08y");
    assert_eq!(t.row(0), "helly");
    assert_eq!(t.cursor(), (5, 0));
}

// ── S3: clear + CUP + SGR ───────────────────────────────────────────

#[test]
fn s3_cup_and_sgr() {
    let mut t = Term::new(80, 24);
    t.feed(b"junk");
    t.feed(b"\x1b[2J\x1b[3;5H\x1b[31;1mX");
    assert_eq!(t.row(0), "");
    let cell = *t.term.screen().row(2).unwrap().cell(4).unwrap();
    assert_eq!(cell.content.codepoint(), Some('X'));
    let style = t.term.screen().styles().get(cell.style);
    assert_eq!(style.fg, emberterm_core::Color::Palette(1));
    assert!(style.flags.contains(StyleFlags::BOLD));
    assert_eq!(t.cursor(), (5, 2));
}

// ── S4: deferred autowrap ───────────────────────────────────────────

#[test]
fn s4_autowrap_is_deferred() {
    let mut t = Term::new(5, 24);
    t.feed(b"abcde");
    // Full row, but no wrap happened yet.
    assert_eq!(t.row(0), "abcde");
    assert!(!t.term.screen().row(0).unwrap().wrapped());
    assert_eq!(t.cursor().1, 0);

    t.feed(b"f");
    assert!(t.term.screen().row(0).unwrap().wrapped());
    assert_eq!(
        t.term.screen().row(1).unwrap().cell(0).unwrap().content.codepoint(),
        Some('f')
    );
    assert_eq!(t.cursor(), (1, 1));
}

// ── S5: alt screen 1049 ─────────────────────────────────────────────

#[test]
fn s5_alt_screen_1049_restores_primary() {
    let mut t = Term::new(80, 24);
    t.feed(b"A\x1b[?1049h\x1b[HB\x1b[?1049l");
    assert_eq!(t.term.active_kind(), ScreenKind::Primary);
    assert_eq!(t.row(0), "A");
    assert_eq!(t.cursor(), (1, 0));
    // No B leaked onto the primary screen.
    for y in 0..24 {
        assert!(!t.row(y).contains('B'));
    }
}

// ── S6: parser resync via CAN ───────────────────────────────────────

#[test]
fn s6_can_aborts_csi() {
    let mut t = Term::new(80, 24);
    t.feed(b"\x1b[12;\x18\x1b[31mX");
    let cell = *t.term.screen().row(0).unwrap().cell(0).unwrap();
    assert_eq!(cell.content.codepoint(), Some('X'));
    let style = t.term.screen().styles().get(cell.style);
    assert_eq!(style.fg, emberterm_core::Color::Palette(1));
}

// ── Round-trip laws ─────────────────────────────────────────────────

#[test]
fn law_save_restore_cursor_roundtrip() {
    let mut t = Term::new(80, 24);
    t.feed(b"\x1b[5;9H\x1b[1;33m\x1b(0\x1b7");
    t.feed(b"\x1b[H\x1b[0m\x1b(Bmoved elsewhere");
    t.feed(b"\x1b8");
    assert_eq!(t.cursor(), (8, 4));
    let brush = t.term.screen().cursor.brush;
    assert!(brush.flags.contains(StyleFlags::BOLD));
    assert_eq!(brush.fg, emberterm_core::Color::Palette(3));
    assert_eq!(
        t.term.screen().charsets.slot(0),
        emberterm_core::Charset::DecSpecial
    );
}

#[test]
fn law_alt_screen_roundtrip_preserves_cells() {
    let mut t = Term::new(20, 6);
    t.feed(b"one\r\ntwo\r\nthree");
    let before: Vec<String> = (0..6).map(|y| t.row(y)).collect();
    t.feed(b"\x1b[?1049h\x1b[2Jfull redraw in alt\x1b[?1049l");
    let after: Vec<String> = (0..6).map(|y| t.row(y)).collect();
    assert_eq!(before, after);
}

#[test]
fn law_reencode_roundtrip() {
    // Printing a row, re-encoding it, and feeding it back must reproduce
    // the row (no combining marks, no wide/EOL edge cases).
    let mut t = Term::new(40, 4);
    t.feed("ls -la | grep 'totál' #42".as_bytes());
    let encoded = t.row(0);

    let mut t2 = Term::new(40, 4);
    t2.feed(encoded.as_bytes());
    assert_eq!(t2.row(0), encoded);
}

// ── Extra conformance spot checks ───────────────────────────────────

#[test]
fn wide_chars_occupy_two_columns() {
    let mut t = Term::new(10, 3);
    t.feed("日本語".as_bytes());
    let row = t.term.screen().row(0).unwrap();
    assert_eq!(row.cell(0).unwrap().width_class(), WidthClass::WideHead);
    assert_eq!(row.cell(1).unwrap().width_class(), WidthClass::WideTail);
    assert_eq!(t.cursor(), (6, 0));
    assert_eq!(t.row(0), "日本語");
}

#[test]
fn scroll_region_contains_scrolling() {
    let mut t = Term::new(10, 5);
    for y in 0..5u16 {
        t.feed(format!("\x1b[{};1Hline{y}", y + 1).as_bytes());
    }
    t.feed(b"\x1b[2;4r\x1b[4;1H\ninside");
    // Region rows 1..4 scrolled; rows 0 and 4 untouched.
    assert_eq!(t.row(0), "line0");
    assert_eq!(t.row(1), "line2");
    assert_eq!(t.row(2), "line3");
    assert_eq!(t.row(3), "inside");
    assert_eq!(t.row(4), "line4");
}

#[test]
fn ri_at_top_scrolls_down() {
    let mut t = Term::new(10, 3);
    t.feed(b"top\x1b[H\x1bM");
    assert_eq!(t.row(0), "");
    assert_eq!(t.row(1), "top");
}

#[test]
fn tabs_land_on_default_stops() {
    let mut t = Term::new(30, 3);
    t.feed(b"\ta\tb");
    assert_eq!(t.cursor().0, 17);
    let row = t.term.screen().row(0).unwrap();
    assert_eq!(row.cell(8).unwrap().content.codepoint(), Some('a'));
    assert_eq!(row.cell(16).unwrap().content.codepoint(), Some('b'));
}

#[test]
fn ech_and_dch_edit_in_place() {
    let mut t = Term::new(10, 2);
    t.feed(b"abcdef\x1b[1;2H\x1b[2X");
    assert_eq!(t.row(0), "a  def");
    t.feed(b"\x1b[1;2H\x1b[2P");
    assert_eq!(t.row(0), "adef");
}

#[test]
fn history_accumulates_and_ed3_clears_it() {
    let mut t = Term::new(10, 2);
    t.feed(b"a\r\nb\r\nc\r\nd");
    assert_eq!(t.term.primary_screen().history().len(), 2);
    t.feed(b"\x1b[3J");
    assert_eq!(t.term.primary_screen().history().len(), 0);
}

#[test]
fn decsca_protects_against_selective_erase_only() {
    let mut t = Term::new(10, 2);
    t.feed(b"\x1b[1\"qAB\x1b[0\"qCD");
    // DECSED (selective) keeps protected AB, erases CD.
    t.feed(b"\x1b[?2J");
    assert_eq!(t.row(0), "AB");
    // Plain ED erases everything.
    t.feed(b"\x1b[2J");
    assert_eq!(t.row(0), "");
}

#[test]
fn rep_repeats_through_the_stream() {
    let mut t = Term::new(20, 2);
    t.feed(b"ab\x1b[3b");
    assert_eq!(t.row(0), "abbbb");
}

#[test]
fn utf8_mixed_with_sequences() {
    let mut t = Term::new(20, 2);
    t.feed("caf".as_bytes());
    t.feed(&[0xc3]); // first half of 'é' split across feeds
    t.feed(&[0xa9]);
    t.feed(" \x1b[1m!".as_bytes());
    assert_eq!(t.row(0), "café !");
}
