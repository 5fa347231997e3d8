//! Image side-table for the Kitty graphics protocol.
//!
//! The engine stores images and placements opaquely: payload bytes are kept
//! exactly as transmitted (base64/PNG decoding is the renderer's concern).
//! What matters here is the bookkeeping — `add_image` is atomic, placements
//! refcount their image, and `delete` frees both tables consistently.
//!
//! The control-data parser for `APC G` commands also lives here so the
//! stream dispatcher stays a thin `match`.

use rustc_hash::FxHashMap;

use crate::row::RowId;

/// Transmission format (`f=`). Unknown values are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// `f=24` — raw RGB.
    Rgb,
    /// `f=32` — raw RGBA.
    #[default]
    Rgba,
    /// `f=100` — PNG.
    Png,
}

impl ImageFormat {
    fn from_code(code: u32) -> Self {
        match code {
            24 => ImageFormat::Rgb,
            100 => ImageFormat::Png,
            _ => ImageFormat::Rgba,
        }
    }
}

/// One stored image.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Payload exactly as transmitted (still base64 where it arrived so).
    pub data: Vec<u8>,
    refcount: u32,
}

/// Where a placement is anchored: the stable row identity plus a column,
/// so the image follows its row through scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementAnchor {
    pub row: RowId,
    pub col: u16,
}

/// One visible placement of an image.
#[derive(Debug, Clone)]
pub struct Placement {
    pub anchor: PlacementAnchor,
    /// Cell footprint; 0 means "derive from pixel size".
    pub cols: u16,
    pub rows: u16,
    pub z: i32,
}

/// Deletion criteria for `a=d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCriteria {
    /// `d=a` — every placement and stored image.
    All,
    /// `d=i` — by image id (and optionally one placement).
    Image { image: u32, placement: Option<u32> },
}

/// The side-table: images plus the placement map.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: FxHashMap<u32, ImageEntry>,
    placements: FxHashMap<(u32, u32), Placement>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an image. Replacement keeps existing placements
    /// pointing at the new bits (same id, refcount carried over).
    pub fn add_image(
        &mut self,
        id: u32,
        format: ImageFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) {
        let refcount = self.images.get(&id).map_or(0, |img| img.refcount);
        self.images.insert(
            id,
            ImageEntry {
                format,
                width,
                height,
                data,
                refcount,
            },
        );
    }

    /// Place an image. Unknown image ids are dropped silently (the kitty
    /// protocol allows placements only for transmitted images).
    pub fn add_placement(&mut self, image: u32, placement: u32, spec: Placement) -> bool {
        let Some(entry) = self.images.get_mut(&image) else {
            return false;
        };
        let key = (image, placement);
        if self.placements.insert(key, spec).is_none() {
            entry.refcount += 1;
        }
        true
    }

    pub fn lookup(&self, id: u32) -> Option<&ImageEntry> {
        self.images.get(&id)
    }

    pub fn placement(&self, image: u32, placement: u32) -> Option<&Placement> {
        self.placements.get(&(image, placement))
    }

    pub fn placements(&self) -> impl Iterator<Item = (&(u32, u32), &Placement)> {
        self.placements.iter()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    /// Delete placements (and unreferenced images) per the criteria.
    pub fn delete(&mut self, criteria: DeleteCriteria) {
        match criteria {
            DeleteCriteria::All => {
                self.placements.clear();
                self.images.clear();
            }
            DeleteCriteria::Image { image, placement } => {
                let removed: Vec<(u32, u32)> = self
                    .placements
                    .keys()
                    .filter(|(img, place)| {
                        *img == image && placement.is_none_or(|p| p == *place)
                    })
                    .copied()
                    .collect();
                for key in removed {
                    self.placements.remove(&key);
                    if let Some(entry) = self.images.get_mut(&image) {
                        entry.refcount = entry.refcount.saturating_sub(1);
                    }
                }
                if placement.is_none()
                    || self.images.get(&image).is_some_and(|e| e.refcount == 0)
                {
                    self.images.remove(&image);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.placements.clear();
    }
}

/// `a=` action of a graphics command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphicsAction {
    /// `a=t` — transmit only.
    #[default]
    Transmit,
    /// `a=T` — transmit and display.
    TransmitAndDisplay,
    /// `a=p` — place a previously transmitted image.
    Put,
    /// `a=d` — delete.
    Delete,
    /// `a=q` — query support.
    Query,
}

/// A parsed `APC G` control block plus its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsCommand {
    pub action: GraphicsAction,
    pub image_id: u32,
    pub placement_id: u32,
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub cols: u16,
    pub rows: u16,
    pub z: i32,
    /// `m=1` — more payload chunks follow.
    pub more: bool,
    /// `q=` — 0: reply, 1: reply only errors, 2: never reply.
    pub quiet: u8,
    /// `d=` criteria letter for deletes.
    pub delete: Option<char>,
    pub payload: Vec<u8>,
}

impl GraphicsCommand {
    pub fn image_format(&self) -> ImageFormat {
        ImageFormat::from_code(self.format)
    }

    /// Parse the body of an `APC G` sequence (everything after the `G`).
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (control, payload) = match body.iter().position(|&b| b == b';') {
            Some(split) => (&body[..split], &body[split + 1..]),
            None => (body, &body[..0]),
        };
        let control = core::str::from_utf8(control).ok()?;

        let mut cmd = GraphicsCommand {
            payload: payload.to_vec(),
            ..Self::default()
        };
        for pair in control.split(',') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=')?;
            match key {
                "a" => {
                    cmd.action = match value {
                        "t" => GraphicsAction::Transmit,
                        "T" => GraphicsAction::TransmitAndDisplay,
                        "p" => GraphicsAction::Put,
                        "d" => GraphicsAction::Delete,
                        "q" => GraphicsAction::Query,
                        _ => return None,
                    }
                }
                "i" => cmd.image_id = value.parse().ok()?,
                "p" => cmd.placement_id = value.parse().ok()?,
                "f" => cmd.format = value.parse().ok()?,
                "s" => cmd.width = value.parse().ok()?,
                "v" => cmd.height = value.parse().ok()?,
                "c" => cmd.cols = value.parse().ok()?,
                "r" => cmd.rows = value.parse().ok()?,
                "z" => cmd.z = value.parse().ok()?,
                "m" => cmd.more = value == "1",
                "q" => cmd.quiet = value.parse().ok()?,
                "d" => cmd.delete = value.chars().next(),
                // Unknown keys are tolerated; the protocol grows often.
                _ => {}
            }
        }
        Some(cmd)
    }

    /// Deletion criteria encoded by `d=` (defaulting to "all").
    pub fn delete_criteria(&self) -> DeleteCriteria {
        match self.delete.unwrap_or('a') {
            'i' | 'I' => DeleteCriteria::Image {
                image: self.image_id,
                placement: (self.placement_id != 0).then_some(self.placement_id),
            },
            _ => DeleteCriteria::All,
        }
    }
}
