//! OSC 8 hyperlink registry.
//!
//! Cells store a compact 16-bit link id instead of a URI string. The registry
//! interns `(uri, explicit id)` pairs, reference-counts them per bearing cell,
//! and recycles ids through a free list when content is overwritten or pruned
//! from scrollback.

use rustc_hash::FxHashMap;

/// Link id carried by cells. Zero means "no link".
pub type LinkId = u16;

/// A hyperlink target: the URI plus the optional explicit `id=` parameter
/// from the OSC 8 sequence. Two anchors with the same explicit id and URI
/// are the same link even if they are not adjacent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hyperlink {
    pub uri: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
struct LinkSlot {
    link: Hyperlink,
    refcount: u32,
}

/// Interning, ref-counted store for hyperlinks.
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    slots: Vec<Option<LinkSlot>>,
    lookup: FxHashMap<Hyperlink, LinkId>,
    free_list: Vec<LinkId>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lookup: FxHashMap::default(),
            free_list: Vec::new(),
        }
    }

    /// Intern a link without touching refcounts. Empty URIs return 0.
    pub fn intern(&mut self, uri: &str, id: Option<&str>) -> LinkId {
        if uri.is_empty() {
            return 0;
        }
        let key = Hyperlink {
            uri: uri.to_string(),
            id: id.map(str::to_string),
        };
        if let Some(&existing) = self.lookup.get(&key) {
            return existing;
        }

        let id = if let Some(id) = self.free_list.pop() {
            id
        } else {
            let next = self.slots.len();
            if next > LinkId::MAX as usize {
                tracing::warn!(links = next, "hyperlink registry exhausted");
                return 0;
            }
            self.slots.push(None);
            next as LinkId
        };

        self.slots[id as usize] = Some(LinkSlot {
            link: key.clone(),
            refcount: 0,
        });
        self.lookup.insert(key, id);
        id
    }

    /// Add one reference (one bearing cell) for the id.
    pub fn acquire(&mut self, id: LinkId) {
        if id == 0 {
            return;
        }
        if let Some(Some(slot)) = self.slots.get_mut(id as usize) {
            slot.refcount = slot.refcount.saturating_add(1);
        }
    }

    /// Drop one reference; the slot is recycled when the count reaches zero.
    pub fn release(&mut self, id: LinkId) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.slots.get_mut(id as usize) else {
            return;
        };
        let remove = match entry.as_mut() {
            Some(slot) if slot.refcount > 0 => {
                slot.refcount -= 1;
                slot.refcount == 0
            }
            _ => false,
        };
        if remove && let Some(removed) = entry.take() {
            self.lookup.remove(&removed.link);
            self.free_list.push(id);
        }
    }

    pub fn get(&self, id: LinkId) -> Option<&Hyperlink> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.link)
    }

    pub fn uri(&self, id: LinkId) -> Option<&str> {
        self.get(id).map(|link| link.uri.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.lookup.clear();
        self.free_list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uri_is_no_link() {
        let mut reg = LinkRegistry::new();
        assert_eq!(reg.intern("", None), 0);
    }

    #[test]
    fn intern_dedups_by_uri_and_explicit_id() {
        let mut reg = LinkRegistry::new();
        let a = reg.intern("https://example.com", None);
        let b = reg.intern("https://example.com", None);
        let c = reg.intern("https://example.com", Some("anchor"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.uri(c), Some("https://example.com"));
    }

    #[test]
    fn release_recycles_ids() {
        let mut reg = LinkRegistry::new();
        let id = reg.intern("https://one.test", None);
        reg.acquire(id);
        reg.acquire(id);
        reg.release(id);
        reg.release(id);
        assert_eq!(reg.get(id), None);

        let reused = reg.intern("https://two.test", None);
        assert_eq!(reused, id);
    }

    #[test]
    fn release_unreferenced_is_noop() {
        let mut reg = LinkRegistry::new();
        let id = reg.intern("https://x.test", None);
        reg.release(id);
        // Interned but never acquired: stays resident.
        assert_eq!(reg.uri(id), Some("https://x.test"));
    }
}
