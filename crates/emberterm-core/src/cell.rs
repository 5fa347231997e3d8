//! The packed terminal cell.
//!
//! A [`Cell`] is the atomic unit of the grid and is deliberately tiny: a
//! tagged 32-bit content word, a 16-bit style id, a 16-bit hyperlink id, and
//! one byte of width class + flags. Every pixel of a rendered frame reads
//! cells, so the struct is kept well under a cache line and is `Copy`.
//!
//! # Content word (4 bytes)
//!
//! ```text
//! Bits 31-30 (tag):
//!   00: empty            (payload 0)
//!   01: codepoint        (bits 20-0: Unicode scalar value)
//!   10: bg palette index (bits 7-0)
//!   11: bg RGB           (bits 23-0)
//! ```
//!
//! Erased cells carry their background color in the content word with style
//! id 0; this is what lets ECH/EL reset the style while honoring BCE.

use crate::style::{Color, StyleId};

/// Tagged cell content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CellContent(u32);

const TAG_SHIFT: u32 = 30;
const TAG_MASK: u32 = 0b11 << TAG_SHIFT;
const TAG_EMPTY: u32 = 0b00 << TAG_SHIFT;
const TAG_CODEPOINT: u32 = 0b01 << TAG_SHIFT;
const TAG_BG_PALETTE: u32 = 0b10 << TAG_SHIFT;
const TAG_BG_RGB: u32 = 0b11 << TAG_SHIFT;

impl CellContent {
    pub const EMPTY: Self = Self(TAG_EMPTY);

    #[inline]
    pub const fn from_char(ch: char) -> Self {
        Self(TAG_CODEPOINT | ch as u32)
    }

    #[inline]
    pub const fn bg_palette(index: u8) -> Self {
        Self(TAG_BG_PALETTE | index as u32)
    }

    #[inline]
    pub const fn bg_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(TAG_BG_RGB | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Content for an erased cell with the given background (BCE).
    #[inline]
    pub const fn erased(bg: Color) -> Self {
        match bg {
            Color::Default => Self::EMPTY,
            Color::Palette(i) => Self::bg_palette(i),
            Color::Rgb(r, g, b) => Self::bg_rgb(r, g, b),
        }
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 & TAG_MASK == TAG_EMPTY
    }

    #[inline]
    pub const fn is_codepoint(self) -> bool {
        self.0 & TAG_MASK == TAG_CODEPOINT
    }

    /// The scalar if this is a codepoint cell.
    #[inline]
    pub fn codepoint(self) -> Option<char> {
        if self.is_codepoint() {
            char::from_u32(self.0 & !TAG_MASK)
        } else {
            None
        }
    }

    /// The erase background carried by a non-codepoint cell.
    ///
    /// Returns `Color::Default` for empty and codepoint cells.
    #[inline]
    pub fn erase_bg(self) -> Color {
        match self.0 & TAG_MASK {
            TAG_BG_PALETTE => Color::Palette((self.0 & 0xFF) as u8),
            TAG_BG_RGB => Color::Rgb(
                ((self.0 >> 16) & 0xFF) as u8,
                ((self.0 >> 8) & 0xFF) as u8,
                (self.0 & 0xFF) as u8,
            ),
            _ => Color::Default,
        }
    }
}

impl core::fmt::Debug for CellContent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(ch) = self.codepoint() {
            write!(f, "CellContent::Char({ch:?})")
        } else if self.is_empty() {
            write!(f, "CellContent::EMPTY")
        } else {
            write!(f, "CellContent::Bg({:?})", self.erase_bg())
        }
    }
}

/// East Asian width class plus the soft-wrap spacer cells.
///
/// A `WideHead` is always immediately followed by a `WideTail` on the same
/// row; when a wide scalar would straddle the right margin, the last column
/// receives a `SpacerHead` and the head moves to column 0 of the next row.
/// Tail and spacer cells are never written directly — they are maintained by
/// whoever writes the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum WidthClass {
    #[default]
    Narrow = 0,
    WideHead = 1,
    WideTail = 2,
    SpacerHead = 3,
    SpacerTail = 4,
}

const WIDTH_MASK: u8 = 0b0000_0111;
const FLAG_PROTECTED: u8 = 1 << 3;
const FLAG_GRAPHEME: u8 = 1 << 4;

/// A single cell in the terminal grid.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Cell {
    /// Tagged content word.
    pub content: CellContent,
    /// Id into the owning style table; 0 is the default style.
    pub style: StyleId,
    /// OSC 8 hyperlink id; 0 means no link.
    pub link: u16,
    /// Width class (low 3 bits) + protected + grapheme-extended flags.
    pub(crate) bits: u8,
}

const _: () = assert!(size_of::<Cell>() <= 16);

impl Default for Cell {
    fn default() -> Self {
        Self {
            content: CellContent::EMPTY,
            style: 0,
            link: 0,
            bits: 0,
        }
    }
}

impl Cell {
    /// A blank cell carrying the given erase background (BCE) and no style.
    pub fn blank(bg: Color) -> Self {
        Self {
            content: CellContent::erased(bg),
            ..Self::default()
        }
    }

    #[inline]
    pub fn width_class(&self) -> WidthClass {
        match self.bits & WIDTH_MASK {
            1 => WidthClass::WideHead,
            2 => WidthClass::WideTail,
            3 => WidthClass::SpacerHead,
            4 => WidthClass::SpacerTail,
            _ => WidthClass::Narrow,
        }
    }

    #[inline]
    pub fn set_width_class(&mut self, class: WidthClass) {
        self.bits = (self.bits & !WIDTH_MASK) | class as u8;
    }

    #[inline]
    pub fn is_wide_head(&self) -> bool {
        self.width_class() == WidthClass::WideHead
    }

    #[inline]
    pub fn is_wide_tail(&self) -> bool {
        self.width_class() == WidthClass::WideTail
    }

    #[inline]
    pub fn is_spacer(&self) -> bool {
        matches!(
            self.width_class(),
            WidthClass::SpacerHead | WidthClass::SpacerTail
        )
    }

    /// DECSCA protection bit.
    #[inline]
    pub fn protected(&self) -> bool {
        self.bits & FLAG_PROTECTED != 0
    }

    #[inline]
    pub fn set_protected(&mut self, on: bool) {
        if on {
            self.bits |= FLAG_PROTECTED;
        } else {
            self.bits &= !FLAG_PROTECTED;
        }
    }

    /// Whether the canonical cluster for this cell lives in the row's
    /// grapheme side-table (base scalar + combining marks).
    #[inline]
    pub fn grapheme_extended(&self) -> bool {
        self.bits & FLAG_GRAPHEME != 0
    }

    #[inline]
    pub fn set_grapheme_extended(&mut self, on: bool) {
        if on {
            self.bits |= FLAG_GRAPHEME;
        } else {
            self.bits &= !FLAG_GRAPHEME;
        }
    }

    /// Whether the cell has printable content (as opposed to blank/erased).
    #[inline]
    pub fn has_text(&self) -> bool {
        self.content.is_codepoint()
    }
}

impl core::fmt::Debug for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cell")
            .field("content", &self.content)
            .field("style", &self.style)
            .field("link", &self.link)
            .field("width", &self.width_class())
            .field("protected", &self.protected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_small() {
        assert!(size_of::<Cell>() <= 16);
    }

    #[test]
    fn default_cell_is_empty_narrow() {
        let cell = Cell::default();
        assert!(cell.content.is_empty());
        assert_eq!(cell.style, 0);
        assert_eq!(cell.link, 0);
        assert_eq!(cell.width_class(), WidthClass::Narrow);
        assert!(!cell.protected());
        assert!(!cell.grapheme_extended());
    }

    #[test]
    fn content_roundtrips_codepoint() {
        let content = CellContent::from_char('語');
        assert_eq!(content.codepoint(), Some('語'));
        assert!(!content.is_empty());
        assert_eq!(content.erase_bg(), Color::Default);
    }

    #[test]
    fn erased_content_carries_background() {
        assert_eq!(CellContent::erased(Color::Default), CellContent::EMPTY);
        assert_eq!(
            CellContent::erased(Color::Palette(4)).erase_bg(),
            Color::Palette(4)
        );
        assert_eq!(
            CellContent::erased(Color::Rgb(10, 20, 30)).erase_bg(),
            Color::Rgb(10, 20, 30)
        );
    }

    #[test]
    fn erased_content_is_not_a_codepoint() {
        assert_eq!(CellContent::erased(Color::Palette(1)).codepoint(), None);
        assert_eq!(CellContent::erased(Color::Rgb(1, 2, 3)).codepoint(), None);
    }

    #[test]
    fn width_class_roundtrips_and_preserves_flags() {
        let mut cell = Cell::default();
        cell.set_protected(true);
        for class in [
            WidthClass::Narrow,
            WidthClass::WideHead,
            WidthClass::WideTail,
            WidthClass::SpacerHead,
            WidthClass::SpacerTail,
        ] {
            cell.set_width_class(class);
            assert_eq!(cell.width_class(), class);
            assert!(cell.protected());
        }
    }

    #[test]
    fn grapheme_flag_toggles() {
        let mut cell = Cell::default();
        cell.set_grapheme_extended(true);
        assert!(cell.grapheme_extended());
        cell.set_grapheme_extended(false);
        assert!(!cell.grapheme_extended());
    }

    #[test]
    fn blank_keeps_bg_and_no_style() {
        let cell = Cell::blank(Color::Palette(2));
        assert_eq!(cell.style, 0);
        assert_eq!(cell.content.erase_bg(), Color::Palette(2));
        assert!(!cell.has_text());
    }
}
