#![forbid(unsafe_code)]

//! Host-agnostic terminal engine.
//!
//! `emberterm-core` is the platform-independent heart of a GPU-accelerated
//! terminal emulator: it turns a raw pty byte stream into a structured,
//! render-ready grid. It owns no I/O — the `emberterm-io` crate feeds it
//! bytes, and the renderer reads it through a shared lock.
//!
//! # Pieces
//!
//! - **Cell / Row / Screen**: packed grid storage with an interned,
//!   ref-counted style table, stable row ids, and wide-character pairing.
//! - **Pages**: scrollback as an arena-linked page list; pins are the only
//!   stable references into history.
//! - **Parser**: the XTerm-topology escape state machine with a bulk ASCII
//!   fast path, dispatching statically through [`parser::Perform`].
//! - **Terminal**: the semantic operations (printing with deferred autowrap,
//!   margins, modes, charsets, the alt-screen matrix, resets).
//! - **StreamHandler**: glue from parser dispatches to terminal operations,
//!   plus the write-back path for DA/DSR/DECRQSS/XTVERSION responses.
//! - **Selection / ImageStore**: pins over history + active rows, and the
//!   kitty-graphics side-table.
//!
//! # Design invariants
//!
//! - All operations are total: out-of-range arguments saturate.
//! - Malformed input never wedges the parser; it drops to ground.
//! - A cell is at most 16 bytes and a style at most 16 bytes.
//! - `#![forbid(unsafe_code)]`.

pub mod cell;
pub mod charset;
pub mod cursor;
pub mod hyperlink;
pub mod image;
pub mod modes;
pub mod osc;
pub mod page;
pub mod parser;
pub mod row;
pub mod screen;
pub mod selection;
pub mod sgr;
pub mod stream;
pub mod style;
pub mod tabstops;
pub mod terminal;

pub use cell::{Cell, CellContent, WidthClass};
pub use charset::{Charset, Charsets};
pub use cursor::{Cursor, CursorShape, CursorStyle, SavedCursor};
pub use hyperlink::{Hyperlink, LinkId, LinkRegistry};
pub use image::{DeleteCriteria, GraphicsCommand, ImageEntry, ImageStore, Placement};
pub use modes::{ModeKind, ModeState, Modes};
pub use page::{Page, PageList, PageId, Pin};
pub use parser::{Params, Parser, Perform};
pub use row::{Row, RowFlags, RowId};
pub use screen::{Screen, ScreenKind};
pub use selection::{SelPoint, Selection};
pub use stream::{HandlerConfig, StreamHandler, StreamState, SurfaceEvent};
pub use style::{Color, Style, StyleFlags, StyleId, StyleTable, Underline};
pub use terminal::{ColorOverrides, Terminal};
