//! Styles and the interned style table.
//!
//! A [`Style`] is the full SGR state a cell can carry: foreground, background,
//! underline color and kind, and the attribute flags. Cells do not store styles
//! inline; they store a 16-bit [`StyleId`] into a per-screen (or per-page)
//! [`StyleTable`] that interns styles by structural hash and reference-counts
//! them. Id 0 is the immortal default style.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// SGR attribute flags.
    ///
    /// Maps directly to the ECMA-48 / VT100 SGR parameter values. Underline
    /// kind is not a flag — see [`Underline`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u16 {
        const BOLD          = 1 << 0;
        const FAINT         = 1 << 1;
        const ITALIC        = 1 << 2;
        const BLINK         = 1 << 3;
        const INVERSE       = 1 << 4;
        const INVISIBLE     = 1 << 5;
        const STRIKETHROUGH = 1 << 6;
        const OVERLINE      = 1 << 7;
    }
}

/// Color in the terminal hierarchy: default → 256 palette → 24-bit RGB.
///
/// The classic 16 named colors are palette indices 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / 49 / 59).
    #[default]
    Default,
    /// 256-color palette index.
    Palette(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// Underline kind (SGR 4 with colon subparameters, SGR 21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Underline {
    #[default]
    None = 0,
    Single = 1,
    Double = 2,
    Curly = 3,
    Dotted = 4,
    Dashed = 5,
}

/// Full style state for a cell.
///
/// Kept at or under 16 bytes; every rendered pixel reads one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `Color::Default` means use the foreground.
    pub underline_color: Color,
    pub flags: StyleFlags,
    pub underline: Underline,
}

const _: () = assert!(size_of::<Style>() <= 16);

impl Style {
    /// Whether this is the default style (maps to id 0).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Reset to the default style (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Identifier into a [`StyleTable`]. Zero is the default style.
pub type StyleId = u16;

#[derive(Debug, Clone)]
struct StyleSlot {
    style: Style,
    refcount: u32,
}

/// Interned, reference-counted set of distinct styles.
///
/// Structurally identical to the hyperlink registry: slots indexed by id,
/// a hash lookup for deduplication, and a free list for id reuse. The table
/// is sized so every cell of a page can in principle carry a distinct id;
/// when the id space is exhausted, [`StyleTable::intern`] degrades to the
/// default style and logs a warning rather than failing.
#[derive(Debug, Clone)]
pub struct StyleTable {
    /// Slots indexed by id (0 reserved for the default style).
    slots: Vec<Option<StyleSlot>>,
    /// Style -> id lookup for deduplication.
    lookup: FxHashMap<Style, StyleId>,
    /// Reusable ids from released styles.
    free_list: Vec<StyleId>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lookup: FxHashMap::default(),
            free_list: Vec::new(),
        }
    }

    /// Intern a style and take one reference to it.
    ///
    /// The default style always maps to id 0 and is never counted. On id
    /// exhaustion the style degrades to default (id 0) and a warning is
    /// logged; the terminal stays usable.
    pub fn acquire(&mut self, style: &Style) -> StyleId {
        if style.is_default() {
            return 0;
        }
        if let Some(&id) = self.lookup.get(style) {
            if let Some(Some(slot)) = self.slots.get_mut(id as usize) {
                slot.refcount = slot.refcount.saturating_add(1);
            }
            return id;
        }

        let id = if let Some(id) = self.free_list.pop() {
            id
        } else {
            let next = self.slots.len();
            if next > StyleId::MAX as usize {
                tracing::warn!(styles = next, "style table exhausted; using default style");
                return 0;
            }
            self.slots.push(None);
            next as StyleId
        };

        self.slots[id as usize] = Some(StyleSlot {
            style: *style,
            refcount: 1,
        });
        self.lookup.insert(*style, id);
        id
    }

    /// Take an additional reference to an existing id.
    ///
    /// Id 0 and unknown ids are ignored.
    pub fn acquire_id(&mut self, id: StyleId) {
        if id == 0 {
            return;
        }
        if let Some(Some(slot)) = self.slots.get_mut(id as usize) {
            slot.refcount = slot.refcount.saturating_add(1);
        }
    }

    /// Release one reference; the style is removed when the count hits zero.
    ///
    /// Id 0 and unknown ids are ignored.
    pub fn release(&mut self, id: StyleId) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.slots.get_mut(id as usize) else {
            return;
        };
        let should_remove = match entry.as_mut() {
            Some(slot) if slot.refcount > 0 => {
                slot.refcount -= 1;
                slot.refcount == 0
            }
            _ => false,
        };
        if should_remove && let Some(removed) = entry.take() {
            self.lookup.remove(&removed.style);
            self.free_list.push(id);
        }
    }

    /// Look up a style by id. Id 0 and unknown ids yield the default style.
    pub fn get(&self, id: StyleId) -> Style {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.style)
            .unwrap_or_default()
    }

    /// Reference count for an id (0 for the default style and unknown ids).
    pub fn refcount(&self, id: StyleId) -> u32 {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.refcount)
            .unwrap_or(0)
    }

    /// Number of live interned styles (excluding the default).
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every interned style.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.lookup.clear();
        self.free_list.clear();
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold_red() -> Style {
        Style {
            fg: Color::Palette(1),
            flags: StyleFlags::BOLD,
            ..Style::default()
        }
    }

    #[test]
    fn default_style_is_id_zero() {
        let mut table = StyleTable::new();
        assert_eq!(table.acquire(&Style::default()), 0);
        assert_eq!(table.get(0), Style::default());
        assert_eq!(table.refcount(0), 0);
    }

    #[test]
    fn acquire_dedups_and_counts() {
        let mut table = StyleTable::new();
        let id1 = table.acquire(&bold_red());
        let id2 = table.acquire(&bold_red());
        assert_eq!(id1, id2);
        assert_ne!(id1, 0);
        assert_eq!(table.refcount(id1), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn release_frees_at_zero_and_reuses_id() {
        let mut table = StyleTable::new();
        let id = table.acquire(&bold_red());
        table.acquire_id(id);
        table.release(id);
        table.release(id);
        assert_eq!(table.refcount(id), 0);
        assert_eq!(table.get(id), Style::default());

        let other = Style {
            bg: Color::Rgb(1, 2, 3),
            ..Style::default()
        };
        let reused = table.acquire(&other);
        assert_eq!(reused, id);
        assert_eq!(table.get(reused), other);
    }

    #[test]
    fn release_id_zero_is_noop() {
        let mut table = StyleTable::new();
        table.release(0);
        table.release(9999);
        assert!(table.is_empty());
    }

    #[test]
    fn distinct_styles_get_distinct_ids() {
        let mut table = StyleTable::new();
        let a = table.acquire(&bold_red());
        let b = table.acquire(&Style {
            underline: Underline::Curly,
            underline_color: Color::Palette(4),
            ..Style::default()
        });
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn clear_resets_everything() {
        let mut table = StyleTable::new();
        let id = table.acquire(&bold_red());
        table.clear();
        assert_eq!(table.get(id), Style::default());
        assert!(table.is_empty());
    }
}
