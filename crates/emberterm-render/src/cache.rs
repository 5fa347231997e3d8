//! The cell-contents cache: row-keyed LRU of vertex lists.
//!
//! Keys are `(screen kind, row id, selection signature)`:
//!
//! - the **row id** is stable across scrolling, so an unchanged row hits
//!   even after it moves within the viewport — the caller only rebases
//!   `grid_y`;
//! - the **screen kind** keeps primary and alt entries from aliasing, so a
//!   screen switch needs no explicit invalidation — the other screen's
//!   entries age out through normal LRU pressure;
//! - the **selection signature** is a pure function of the selection's
//!   intersection with the row, so clearing a selection re-validates the
//!   entries cached before it appeared.
//!
//! Dirty rows are the caller's signal to rebuild: [`ContentsCache::refresh`]
//! consults the flag before trusting a hit. The cursor is never part of a
//! row entry; it is drawn last from live state.

use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::FxBuildHasher;

use emberterm_core::{RowId, ScreenKind};

use crate::vertex::CellVertex;

/// Cache key for one row's vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub screen: ScreenKind,
    pub row_id: RowId,
    pub selection: u64,
}

impl RowKey {
    pub fn new(screen: ScreenKind, row_id: RowId, selection: u64) -> Self {
        Self {
            screen,
            row_id,
            selection,
        }
    }
}

/// Row-keyed LRU cache of GPU vertex records.
#[derive(Debug)]
pub struct ContentsCache {
    entries: LruCache<RowKey, Vec<CellVertex>, FxBuildHasher>,
}

impl ContentsCache {
    /// Sized for a viewport: `max(80, visible_rows * 10)` entries.
    pub fn new(visible_rows: u16) -> Self {
        Self {
            entries: LruCache::with_hasher(Self::capacity_for(visible_rows), FxBuildHasher),
        }
    }

    fn capacity_for(visible_rows: u16) -> NonZeroUsize {
        NonZeroUsize::new((visible_rows as usize * 10).max(80)).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-size for a new viewport height; excess entries evict oldest-first.
    pub fn set_viewport_rows(&mut self, visible_rows: u16) {
        self.entries.resize(Self::capacity_for(visible_rows));
    }

    /// Fetch a row's vertices, rebuilding when absent or `dirty`.
    ///
    /// `rebuild` runs the caller's shaping path (an external collaborator)
    /// and its output replaces any stale entry.
    pub fn refresh(
        &mut self,
        key: RowKey,
        dirty: bool,
        rebuild: impl FnOnce() -> Vec<CellVertex>,
    ) -> &[CellVertex] {
        if dirty || !self.entries.contains(&key) {
            self.entries.put(key, rebuild());
        }
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cached vertices for a key, if present and current (promotes LRU).
    pub fn get(&mut self, key: &RowKey) -> Option<&[CellVertex]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Cached vertices with `grid_y` rewritten to the row's current
    /// viewport position — the hit path of the render loop.
    pub fn get_rebased(&mut self, key: &RowKey, viewport_y: u16) -> Option<Vec<CellVertex>> {
        self.entries.get(key).map(|vertices| {
            vertices
                .iter()
                .map(|v| CellVertex {
                    grid_y: viewport_y,
                    ..*v
                })
                .collect()
        })
    }

    pub fn insert(&mut self, key: RowKey, vertices: Vec<CellVertex>) {
        self.entries.put(key, vertices);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexKind;

    fn key(id: RowId, selection: u64) -> RowKey {
        RowKey::new(ScreenKind::Primary, id, selection)
    }

    fn quad(grid_y: u16) -> Vec<CellVertex> {
        vec![CellVertex::bg(0, grid_y, [9, 9, 9, 255])]
    }

    #[test]
    fn capacity_has_a_floor_of_80() {
        assert_eq!(ContentsCache::new(0).capacity(), 80);
        assert_eq!(ContentsCache::new(5).capacity(), 80);
        assert_eq!(ContentsCache::new(50).capacity(), 500);
    }

    #[test]
    fn hit_skips_rebuild_and_miss_rebuilds() {
        let mut cache = ContentsCache::new(24);
        let mut rebuilds = 0;
        for _ in 0..3 {
            cache.refresh(key(1, 0), false, || {
                rebuilds += 1;
                quad(0)
            });
        }
        assert_eq!(rebuilds, 1);
        cache.refresh(key(2, 0), false, || {
            rebuilds += 1;
            quad(1)
        });
        assert_eq!(rebuilds, 2);
    }

    #[test]
    fn dirty_forces_rebuild() {
        let mut cache = ContentsCache::new(24);
        let mut rebuilds = 0;
        let mut go = |dirty| {
            cache.refresh(key(1, 0), dirty, || {
                rebuilds += 1;
                quad(0)
            });
        };
        go(false);
        go(true);
        assert_eq!(rebuilds, 2);
    }

    #[test]
    fn selection_signature_separates_entries_and_revalidates() {
        let mut cache = ContentsCache::new(24);
        cache.insert(key(1, 0), quad(0));
        // Selection appears: different key, a miss.
        assert!(cache.get(&key(1, 0xdead)).is_none());
        cache.insert(key(1, 0xdead), quad(0));
        // Selection cleared: the original entry is still valid.
        assert!(cache.get(&key(1, 0)).is_some());
    }

    #[test]
    fn screen_kinds_do_not_alias() {
        let mut cache = ContentsCache::new(24);
        cache.insert(RowKey::new(ScreenKind::Primary, 7, 0), quad(0));
        assert!(cache.get(&RowKey::new(ScreenKind::Alt, 7, 0)).is_none());
    }

    #[test]
    fn rebase_rewrites_only_grid_y() {
        let mut cache = ContentsCache::new(24);
        cache.insert(key(1, 0), vec![CellVertex::bg(5, 9, [1, 2, 3, 4])]);
        let rebased = cache.get_rebased(&key(1, 0), 2).unwrap();
        assert_eq!(rebased[0].grid_y, 2);
        assert_eq!(rebased[0].grid_x, 5);
        assert_eq!(rebased[0].rgba, [1, 2, 3, 4]);
        assert_eq!(rebased[0].kind, VertexKind::Bg);
        // The cached copy is untouched.
        assert_eq!(cache.get(&key(1, 0)).unwrap()[0].grid_y, 9);
    }

    #[test]
    fn lru_evicts_oldest_entries() {
        let mut cache = ContentsCache::new(0); // capacity 80
        for id in 0..100u64 {
            cache.insert(key(id, 0), quad(0));
        }
        assert_eq!(cache.len(), 80);
        assert!(cache.get(&key(0, 0)).is_none());
        assert!(cache.get(&key(99, 0)).is_some());
    }

    #[test]
    fn shrinking_viewport_shrinks_capacity() {
        let mut cache = ContentsCache::new(100);
        for id in 0..900u64 {
            cache.insert(key(id, 0), quad(0));
        }
        cache.set_viewport_rows(10);
        assert_eq!(cache.capacity(), 100);
        assert!(cache.len() <= 100);
        // Newest entries survive the shrink.
        assert!(cache.get(&key(899, 0)).is_some());
    }
}
