//! Selection over the combined buffer (history pages + active area).
//!
//! Endpoints are pins: history endpoints reference a page node and die with
//! it, active endpoints are rebased by the screen as rows scroll. All
//! coordinate math happens in "line space": line 0 is the oldest surviving
//! history row, lines `history.len()..` are the active area top to bottom.

use crate::cell::WidthClass;
use crate::page::Pin;
use crate::row::Row;
use crate::screen::Screen;

/// One end of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelPoint {
    /// Pinned into a history page.
    History(Pin),
    /// In the active area, rebased by the screen on scroll.
    Active { row: u16, col: u16 },
}

/// An ordered pair of selection endpoints plus the rectangular bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: SelPoint,
    pub end: SelPoint,
    pub rectangular: bool,
}

impl Selection {
    pub fn new(start: SelPoint, end: SelPoint) -> Self {
        Self {
            start,
            end,
            rectangular: false,
        }
    }

    pub fn rectangular(start: SelPoint, end: SelPoint) -> Self {
        Self {
            start,
            end,
            rectangular: true,
        }
    }

    /// Resolve an endpoint to `(line, col)`; `None` when its page was pruned.
    pub fn resolve(point: SelPoint, screen: &Screen) -> Option<(usize, u16)> {
        match point {
            SelPoint::History(pin) => {
                Some((screen.history().index_of(pin)?, pin.col))
            }
            SelPoint::Active { row, col } => {
                Some((screen.history().len() + row as usize, col))
            }
        }
    }

    /// Both endpoints in line space, ordered top-left to bottom-right.
    /// `None` when either endpoint is dead.
    pub fn bounds(&self, screen: &Screen) -> Option<((usize, u16), (usize, u16))> {
        let a = Self::resolve(self.start, screen)?;
        let b = Self::resolve(self.end, screen)?;
        if (a.0, a.1) <= (b.0, b.1) {
            Some((a, b))
        } else {
            Some((b, a))
        }
    }

    /// The selected column span on a given line, inclusive.
    pub fn span_on_line(&self, screen: &Screen, line: usize) -> Option<(u16, u16)> {
        let ((sl, sc), (el, ec)) = self.bounds(screen)?;
        if line < sl || line > el {
            return None;
        }
        let cols = screen.cols();
        let last = cols.saturating_sub(1);
        if self.rectangular {
            let (left, right) = if sc <= ec { (sc, ec) } else { (ec, sc) };
            return Some((left.min(last), right.min(last)));
        }
        let start = if line == sl { sc.min(last) } else { 0 };
        let end = if line == el { ec.min(last) } else { last };
        if start <= end { Some((start, end)) } else { None }
    }

    /// Cache-key component for a row: a pure function of the selection's
    /// intersection with the line, so reverting to a previous selection
    /// shape re-validates previously cached vertices.
    pub fn signature(selection: Option<&Selection>, screen: &Screen, line: usize) -> u64 {
        let Some(sel) = selection else { return 0 };
        let Some((start, end)) = sel.span_on_line(screen, line) else {
            return 0;
        };
        let rect = u64::from(sel.rectangular);
        (1 << 63) | (rect << 62) | ((start as u64) << 16) | end as u64
    }

    /// Extract the selected text.
    ///
    /// Wide tails and spacers collapse, grapheme clusters expand, trailing
    /// blanks are trimmed per line, and soft-wrapped lines join without a
    /// newline. Rectangular selections always newline between lines.
    pub fn extract_text(&self, screen: &Screen) -> String {
        let Some(((sl, _), (el, _))) = self.bounds(screen) else {
            return String::new();
        };
        let mut out = String::new();
        for line in sl..=el {
            let Some(row) = line_row(screen, line) else {
                continue;
            };
            let Some((start, end)) = self.span_on_line(screen, line) else {
                if line != el {
                    out.push('\n');
                }
                continue;
            };
            let mut line_buf = String::new();
            for col in start..=end.min(row.len().saturating_sub(1)) {
                let Some(cell) = row.cell(col) else { break };
                match cell.width_class() {
                    WidthClass::WideTail | WidthClass::SpacerHead | WidthClass::SpacerTail => {
                        continue;
                    }
                    _ => {}
                }
                if cell.grapheme_extended()
                    && let Some(cluster) = row.grapheme(col)
                {
                    line_buf.push_str(cluster);
                    continue;
                }
                line_buf.push(cell.content.codepoint().unwrap_or(' '));
            }
            while line_buf.ends_with(' ') {
                line_buf.pop();
            }
            out.push_str(&line_buf);
            if line != el && (self.rectangular || !row.wrapped()) {
                out.push('\n');
            }
        }
        out
    }
}

fn line_row(screen: &Screen, line: usize) -> Option<&Row> {
    let hist_len = screen.history().len();
    if line < hist_len {
        screen.history().row_at(line)
    } else {
        screen.row((line - hist_len) as u16)
    }
}
