#![forbid(unsafe_code)]

//! Renderer-facing cell contents cache for the emberterm engine.
//!
//! The renderer thread wakes on the IO thread's signal, takes the shared
//! terminal lock, and walks the visible rows. For each row it builds a
//! [`cache::RowKey`] from the screen kind, the stable row id, and the
//! selection signature, then asks the [`cache::ContentsCache`]:
//!
//! - clean hit → append the cached vertices with `grid_y` rebased,
//! - miss or dirty row → shape the row (font shaping is an external
//!   collaborator), insert, and clear the row's dirty flag.
//!
//! The cursor is drawn last from live cursor state and is never cached.

pub mod cache;
pub mod vertex;

pub use cache::{ContentsCache, RowKey};
pub use vertex::{CellVertex, VertexKind, VertexMode};
