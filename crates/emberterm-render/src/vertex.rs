//! GPU-ready cell vertex records.
//!
//! The renderer turns each visible row into a flat list of these records;
//! the GPU backend maps them straight into instance buffers. The cache
//! (see [`crate::cache`]) stores them per row so unchanged rows skip
//! shaping entirely — only `grid_y` is rewritten when a row moves within
//! the viewport.

use bitflags::bitflags;

/// What a vertex record draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexKind {
    /// Background quad.
    Bg = 0,
    /// Foreground glyph quad (texture-mapped).
    Fg = 1,
    /// Underline decoration.
    Underline = 2,
    /// Strikethrough decoration.
    Strike = 3,
    /// The cursor quad. Never cached per row; drawn last from live state.
    Cursor = 4,
}

bitflags! {
    /// Shader mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexMode: u16 {
        /// Sample the glyph texture as straight color (emoji) instead of
        /// an alpha mask.
        const COLOR_GLYPH = 1 << 0;
        /// The quad spans two cells (wide glyph).
        const WIDE = 1 << 1;
        /// Render at faint intensity.
        const DIM = 1 << 2;
        /// Participates in blink phase A/B.
        const BLINK = 1 << 3;
    }
}

/// One renderable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct CellVertex {
    pub kind: VertexKind,
    /// Cell coordinates in the viewport.
    pub grid_x: u16,
    pub grid_y: u16,
    /// Atlas rectangle (texels).
    pub tex_x: u16,
    pub tex_y: u16,
    pub tex_w: u16,
    pub tex_h: u16,
    /// Glyph bearing offset inside the cell (pixels).
    pub offset_x: i16,
    pub offset_y: i16,
    /// Straight-alpha color.
    pub rgba: [u8; 4],
    pub mode: VertexMode,
}

impl CellVertex {
    /// A background quad for one cell.
    pub fn bg(grid_x: u16, grid_y: u16, rgba: [u8; 4]) -> Self {
        Self {
            kind: VertexKind::Bg,
            grid_x,
            grid_y,
            tex_x: 0,
            tex_y: 0,
            tex_w: 0,
            tex_h: 0,
            offset_x: 0,
            offset_y: 0,
            rgba,
            mode: VertexMode::empty(),
        }
    }
}
