//! Rows: fixed-width cell runs with flags, a stable id, and the grapheme
//! side-table.
//!
//! The `row_id` is assigned when the row is allocated (or reset) and follows
//! the row through scroll operations; the renderer's contents cache keys on
//! it. Flags carry dirty/wrap state and the OSC 133 semantic-prompt markers.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::cell::{Cell, WidthClass};
use crate::style::Color;

bitflags! {
    /// Per-row state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowFlags: u8 {
        /// Row content changed since the renderer last rebuilt it.
        const DIRTY = 1 << 0;
        /// Row was soft-wrapped into the next row.
        const WRAP = 1 << 1;
        /// OSC 133;A — start of a shell prompt.
        const PROMPT_START = 1 << 2;
        /// OSC 133;B — start of user input.
        const INPUT_START = 1 << 3;
        /// OSC 133;C — start of command execution.
        const COMMAND_START = 1 << 4;
        /// OSC 133;D — start of command output / end of command.
        const OUTPUT_START = 1 << 5;
    }
}

/// Stable 64-bit row identity used as a render-cache key.
pub type RowId = u64;

/// A single row of the grid or of a scrollback page.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
    id: RowId,
    pub flags: RowFlags,
    /// Sparse column → grapheme cluster for `grapheme_extended` cells.
    /// Almost always empty; linear scan is fine.
    graphemes: SmallVec<[(u16, String); 2]>,
}

impl Row {
    /// Allocate a blank row of `cols` default cells.
    pub fn new(cols: u16, id: RowId) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            id,
            flags: RowFlags::DIRTY,
            graphemes: SmallVec::new(),
        }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn len(&self) -> u16 {
        self.cells.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, col: u16) -> Option<&Cell> {
        self.cells.get(col as usize)
    }

    /// Mutable cell access; marks the row dirty.
    pub fn cell_mut(&mut self, col: u16) -> Option<&mut Cell> {
        self.flags |= RowFlags::DIRTY;
        self.cells.get_mut(col as usize)
    }

    /// Mutable access to the whole cell slice; marks the row dirty.
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        self.flags |= RowFlags::DIRTY;
        &mut self.cells
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(RowFlags::DIRTY)
    }

    pub fn mark_dirty(&mut self) {
        self.flags |= RowFlags::DIRTY;
    }

    pub fn clear_dirty(&mut self) {
        self.flags -= RowFlags::DIRTY;
    }

    pub fn wrapped(&self) -> bool {
        self.flags.contains(RowFlags::WRAP)
    }

    pub fn set_wrapped(&mut self, on: bool) {
        self.flags.set(RowFlags::WRAP, on);
        self.flags |= RowFlags::DIRTY;
    }

    /// Reset to a blank row with a fresh identity.
    ///
    /// Used when a row is vacated by scrolling or cleared; the old id is
    /// retired so stale cache entries cannot alias the new content.
    pub fn reset(&mut self, bg: Color, new_id: RowId) {
        for cell in &mut self.cells {
            *cell = Cell::blank(bg);
        }
        self.id = new_id;
        self.flags = RowFlags::DIRTY;
        self.graphemes.clear();
    }

    /// Change width, truncating or extending with blank cells.
    pub fn resize(&mut self, cols: u16) {
        let cols = cols as usize;
        if cols == self.cells.len() {
            return;
        }
        if cols < self.cells.len() {
            self.cells.truncate(cols);
            self.graphemes.retain(|(c, _)| (*c as usize) < cols);
            // A wide head split by the cut loses its tail.
            if let Some(last) = self.cells.last_mut()
                && last.is_wide_head()
            {
                *last = Cell::default();
            }
        } else {
            self.cells.resize(cols, Cell::default());
        }
        self.flags |= RowFlags::DIRTY;
    }

    /// The grapheme cluster for a column, when `grapheme_extended` is set.
    pub fn grapheme(&self, col: u16) -> Option<&str> {
        self.graphemes
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, s)| s.as_str())
    }

    /// Append a combining mark to the cluster at `col`, seeding the entry
    /// with `base` on first use and setting the cell's grapheme flag.
    pub fn push_combining(&mut self, col: u16, base: char, mark: char) {
        self.flags |= RowFlags::DIRTY;
        if let Some((_, cluster)) = self.graphemes.iter_mut().find(|(c, _)| *c == col) {
            cluster.push(mark);
        } else {
            let mut cluster = String::with_capacity(8);
            cluster.push(base);
            cluster.push(mark);
            self.graphemes.push((col, cluster));
        }
        if let Some(cell) = self.cells.get_mut(col as usize) {
            cell.set_grapheme_extended(true);
        }
    }

    /// Drop the grapheme entry for a column (cell overwritten or erased).
    pub fn clear_grapheme(&mut self, col: u16) {
        self.graphemes.retain(|(c, _)| *c != col);
        if let Some(cell) = self.cells.get_mut(col as usize) {
            cell.set_grapheme_extended(false);
        }
    }

    /// Decode the row back to text, skipping tails and spacers. Erased and
    /// empty cells read as spaces; trailing blanks are trimmed.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.cells.len());
        for (col, cell) in self.cells.iter().enumerate() {
            match cell.width_class() {
                WidthClass::WideTail | WidthClass::SpacerHead | WidthClass::SpacerTail => continue,
                _ => {}
            }
            if cell.grapheme_extended()
                && let Some(cluster) = self.grapheme(col as u16)
            {
                out.push_str(cluster);
                continue;
            }
            out.push(cell.content.codepoint().unwrap_or(' '));
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out
    }

    /// Iterate style ids of live (non-default) styled cells.
    pub fn style_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.cells.iter().map(|c| c.style).filter(|&id| id != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellContent;

    fn row_with_text(text: &str) -> Row {
        let mut row = Row::new(text.len() as u16 + 2, 1);
        for (i, ch) in text.chars().enumerate() {
            row.cell_mut(i as u16).unwrap().content = CellContent::from_char(ch);
        }
        row
    }

    #[test]
    fn new_row_is_blank_and_dirty() {
        let row = Row::new(4, 7);
        assert_eq!(row.len(), 4);
        assert_eq!(row.id(), 7);
        assert!(row.is_dirty());
        assert_eq!(row.text(), "");
    }

    #[test]
    fn cell_mut_marks_dirty() {
        let mut row = Row::new(4, 1);
        row.clear_dirty();
        row.cell_mut(0).unwrap().content = CellContent::from_char('x');
        assert!(row.is_dirty());
    }

    #[test]
    fn reset_retires_the_id() {
        let mut row = row_with_text("hi");
        row.set_wrapped(true);
        row.reset(Color::Palette(3), 99);
        assert_eq!(row.id(), 99);
        assert!(!row.wrapped());
        assert_eq!(row.cell(0).unwrap().content.erase_bg(), Color::Palette(3));
    }

    #[test]
    fn text_skips_tails_and_trims() {
        let mut row = Row::new(6, 1);
        row.cell_mut(0).unwrap().content = CellContent::from_char('中');
        row.cell_mut(0).unwrap().set_width_class(WidthClass::WideHead);
        row.cell_mut(1).unwrap().set_width_class(WidthClass::WideTail);
        row.cell_mut(2).unwrap().content = CellContent::from_char('x');
        assert_eq!(row.text(), "中x");
    }

    #[test]
    fn combining_marks_accumulate() {
        let mut row = row_with_text("e");
        row.push_combining(0, 'e', '\u{0301}');
        row.push_combining(0, 'e', '\u{0323}');
        assert!(row.cell(0).unwrap().grapheme_extended());
        assert_eq!(row.grapheme(0), Some("e\u{0301}\u{0323}"));
        assert_eq!(row.text(), "e\u{0301}\u{0323}");

        row.clear_grapheme(0);
        assert!(!row.cell(0).unwrap().grapheme_extended());
        assert_eq!(row.grapheme(0), None);
    }

    #[test]
    fn resize_truncates_split_wide_head() {
        let mut row = Row::new(4, 1);
        row.cell_mut(2).unwrap().content = CellContent::from_char('中');
        row.cell_mut(2).unwrap().set_width_class(WidthClass::WideHead);
        row.cell_mut(3).unwrap().set_width_class(WidthClass::WideTail);
        row.resize(3);
        assert_eq!(row.len(), 3);
        assert_eq!(row.cell(2).unwrap().width_class(), WidthClass::Narrow);
        assert!(row.cell(2).unwrap().content.is_empty());
    }

    #[test]
    fn resize_extends_with_blanks() {
        let mut row = row_with_text("ab");
        row.resize(8);
        assert_eq!(row.len(), 8);
        assert_eq!(row.text(), "ab");
    }
}
