//! Cursor state.
//!
//! The cursor carries its position, the deferred-autowrap flag, and the
//! current SGR "brush" that new cells are painted with. DECSC/DECRC snapshot
//! additionally captures origin mode and the charset state.

use crate::charset::Charsets;
use crate::style::Style;

/// DECSCUSR cursor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor shape + blink, as set by `CSI Ps SP q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorStyle {
    pub shape: CursorShape,
    pub blink: bool,
}

impl Default for CursorStyle {
    fn default() -> Self {
        Self {
            shape: CursorShape::Block,
            blink: true,
        }
    }
}

impl CursorStyle {
    /// Decode the DECSCUSR parameter (0 and 1 are both blinking block).
    pub fn from_decscusr(param: u16) -> Self {
        let (shape, blink) = match param {
            0 | 1 => (CursorShape::Block, true),
            2 => (CursorShape::Block, false),
            3 => (CursorShape::Underline, true),
            4 => (CursorShape::Underline, false),
            5 => (CursorShape::Bar, true),
            6 => (CursorShape::Bar, false),
            _ => (CursorShape::Block, true),
        };
        Self { shape, blink }
    }
}

/// The active cursor.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    /// Column. Stays `< cols`; the deferred wrap is modeled by
    /// `pending_wrap`, not by letting `x` reach `cols`.
    pub x: u16,
    /// Row within the active area.
    pub y: u16,
    /// Set when a print landed in the last column with autowrap enabled;
    /// the wrap itself happens on the next writable character.
    pub pending_wrap: bool,
    /// Current SGR brush for new cells.
    pub brush: Style,
    /// DECSCA: newly printed cells get the protected bit.
    pub protected: bool,
}

/// DECSC snapshot (also used by ?1048 and the 1049 alt-screen dance).
#[derive(Debug, Clone)]
pub struct SavedCursor {
    pub x: u16,
    pub y: u16,
    pub pending_wrap: bool,
    pub origin: bool,
    pub brush: Style,
    pub protected: bool,
    pub charsets: Charsets,
}

impl SavedCursor {
    /// The power-on snapshot DECRC restores when nothing was ever saved.
    pub fn initial() -> Self {
        Self {
            x: 0,
            y: 0,
            pending_wrap: false,
            origin: false,
            brush: Style::default(),
            protected: false,
            charsets: Charsets::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decscusr_decodes_all_shapes() {
        assert_eq!(CursorStyle::from_decscusr(0), CursorStyle::default());
        assert_eq!(CursorStyle::from_decscusr(1), CursorStyle::default());
        let steady_bar = CursorStyle::from_decscusr(6);
        assert_eq!(steady_bar.shape, CursorShape::Bar);
        assert!(!steady_bar.blink);
        let blink_under = CursorStyle::from_decscusr(3);
        assert_eq!(blink_under.shape, CursorShape::Underline);
        assert!(blink_under.blink);
    }

    #[test]
    fn unknown_decscusr_falls_back_to_default() {
        assert_eq!(CursorStyle::from_decscusr(99), CursorStyle::default());
    }
}
