//! Hardware tiling layouts.
//!
//! Tiled surfaces are split into 4 KiB tiles laid out row-major by tile
//! index. X-tiles hold 8 rows of 512 bytes stored row by row. Y-tiles hold
//! 32 rows of 128 bytes stored as eight 16-byte-wide columns, each column
//! being 32 consecutive 16-byte chunks. The texture sampler reads exactly
//! this layout, so tile sizes and traversal orders here must not change.
//!
//! [`encode`] copies a host-linear surface into device layout, [`decode`]
//! copies it back.

use crate::error::{MemError, MemResult};
use crate::util::layout::{align_up, div_ceil};

/// Bytes per hardware tile.
pub const TILE_SIZE: usize = 4096;

const TILEX_WIDTH: usize = 512;
const TILEX_HEIGHT: usize = 8;
const TILEY_WIDTH: usize = 128;
const TILEY_HEIGHT: usize = 32;

/// Width in bytes of one Y-tile column.
const TILEY_SPAN: usize = 16;

/// Memory layout of an image surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TilingMode {
    /// Linear, tightly packed rows.
    #[default]
    None,
    /// 512-byte by 8-row tiles.
    TileX,
    /// 128-byte by 32-row tiles, column-major within a tile.
    TileY,
}

impl TilingMode {
    /// Tile width in bytes (1 for linear surfaces).
    pub const fn tile_width(self) -> usize {
        match self {
            TilingMode::None => 1,
            TilingMode::TileX => TILEX_WIDTH,
            TilingMode::TileY => TILEY_WIDTH,
        }
    }

    /// Tile height in rows (1 for linear surfaces).
    pub const fn tile_height(self) -> usize {
        match self {
            TilingMode::None => 1,
            TilingMode::TileX => TILEX_HEIGHT,
            TilingMode::TileY => TILEY_HEIGHT,
        }
    }

    /// Whether this mode needs tile-aligned backing memory.
    pub const fn is_tiled(self) -> bool {
        !matches!(self, TilingMode::None)
    }

    /// Aligned layout of a `width` x `height` surface of `bpp`-byte pixels.
    pub fn surface_layout(self, width: usize, height: usize, bpp: usize) -> SurfaceLayout {
        let row_bytes = width * bpp;
        SurfaceLayout {
            mode: self,
            width,
            height,
            row_bytes,
            pitch: align_up(row_bytes, self.tile_width()),
            aligned_height: align_up(height, self.tile_height()),
        }
    }
}

/// Aligned dimensions of one surface (one slice of a 3D image).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub mode: TilingMode,
    /// Logical width in pixels.
    pub width: usize,
    /// Logical height in rows.
    pub height: usize,
    /// Meaningful bytes per row (`width * bpp`).
    pub row_bytes: usize,
    /// Aligned row pitch in bytes.
    pub pitch: usize,
    /// Aligned number of rows.
    pub aligned_height: usize,
}

impl SurfaceLayout {
    /// Bytes occupied by the surface in device memory.
    pub fn size(&self) -> usize {
        self.pitch * self.aligned_height
    }

    /// Number of tiles in one row of tiles.
    pub fn tiles_per_row(&self) -> usize {
        div_ceil(self.pitch, self.mode.tile_width())
    }

    /// Number of rows of tiles.
    pub fn tile_rows(&self) -> usize {
        div_ceil(self.aligned_height, self.mode.tile_height())
    }

    /// Device offset of byte `x` of row `y`.
    pub fn offset_of(&self, x: usize, y: usize) -> usize {
        match self.mode {
            TilingMode::None => y * self.pitch + x,
            TilingMode::TileX => {
                let tile = x / TILEX_WIDTH + (y / TILEX_HEIGHT) * self.tiles_per_row();
                tile * TILE_SIZE + (y % TILEX_HEIGHT) * TILEX_WIDTH + x % TILEX_WIDTH
            }
            TilingMode::TileY => {
                let tile = x / TILEY_WIDTH + (y / TILEY_HEIGHT) * self.tiles_per_row();
                let x_in = x % TILEY_WIDTH;
                tile * TILE_SIZE
                    + (x_in / TILEY_SPAN) * TILEY_SPAN * TILEY_HEIGHT
                    + (y % TILEY_HEIGHT) * TILEY_SPAN
                    + x_in % TILEY_SPAN
            }
        }
    }

    /// Longest run of bytes starting at column `x` that stays contiguous
    /// in device memory.
    fn run_width(&self) -> usize {
        match self.mode {
            TilingMode::None => self.row_bytes.max(1),
            TilingMode::TileX => TILEX_WIDTH,
            TilingMode::TileY => TILEY_SPAN,
        }
    }
}

/// A host-linear source surface.
#[derive(Debug, Clone, Copy)]
pub struct HostSurface<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    /// Row pitch in bytes.
    pub pitch: usize,
    /// Bytes per pixel.
    pub bpp: usize,
}

impl HostSurface<'_> {
    /// End of the source's logical extent. Reads never go past it.
    fn extent(&self) -> usize {
        self.pitch.saturating_mul(self.height).min(self.data.len())
    }
}

/// A host-linear destination surface.
#[derive(Debug)]
pub struct HostSurfaceMut<'a> {
    pub data: &'a mut [u8],
    pub width: usize,
    pub height: usize,
    /// Row pitch in bytes.
    pub pitch: usize,
    /// Bytes per pixel.
    pub bpp: usize,
}

/// Copy as much of `src[from..]` into `dst` as the extent allows.
#[inline]
fn copy_clipped(dst: &mut [u8], src: &[u8], from: usize, end: usize) {
    let n = end.saturating_sub(from).min(dst.len());
    if n > 0 {
        dst[..n].copy_from_slice(&src[from..from + n]);
    }
}

/// Copy a host-linear surface into `dst` using `mode`'s device layout.
///
/// Source bytes are read up to `pitch * height`, including any bytes
/// between the end of a row and the next pitch boundary. Destination bytes
/// whose source lies beyond that extent keep their previous value.
pub fn encode(mode: TilingMode, src: &HostSurface<'_>, dst: &mut [u8]) -> MemResult<()> {
    let layout = mode.surface_layout(src.width, src.height, src.bpp);
    if src.pitch < layout.row_bytes || dst.len() < layout.size() {
        return Err(MemError::InvalidValue);
    }

    match mode {
        TilingMode::None => encode_linear(&layout, src, dst),
        TilingMode::TileX => encode_tilex(&layout, src, dst),
        TilingMode::TileY => encode_tiley(&layout, src, dst),
    }
    Ok(())
}

fn encode_linear(layout: &SurfaceLayout, src: &HostSurface<'_>, dst: &mut [u8]) {
    let end = src.extent();
    let row = layout.row_bytes;
    for y in 0..layout.height {
        let from = y.saturating_mul(src.pitch);
        copy_clipped(&mut dst[y * row..(y + 1) * row], src.data, from, end);
    }
}

fn encode_tilex(layout: &SurfaceLayout, src: &HostSurface<'_>, dst: &mut [u8]) {
    let end = src.extent();
    let tiles_x = layout.tiles_per_row();

    for tile_y in 0..layout.tile_rows() {
        for tile_x in 0..tiles_x {
            let tile = (tile_x + tile_y * tiles_x) * TILE_SIZE;
            for y in 0..TILEX_HEIGHT {
                let from = (tile_y * TILEX_HEIGHT + y)
                    .saturating_mul(src.pitch)
                    .saturating_add(tile_x * TILEX_WIDTH);
                let to = tile + y * TILEX_WIDTH;
                copy_clipped(&mut dst[to..to + TILEX_WIDTH], src.data, from, end);
            }
        }
    }
}

fn encode_tiley(layout: &SurfaceLayout, src: &HostSurface<'_>, dst: &mut [u8]) {
    let end = src.extent();
    let tiles_x = layout.tiles_per_row();

    for tile_y in 0..layout.tile_rows() {
        for tile_x in 0..tiles_x {
            let tile = (tile_y * tiles_x + tile_x) * TILE_SIZE;
            for x in (0..TILEY_WIDTH).step_by(TILEY_SPAN) {
                let column = (tile_y * TILEY_HEIGHT)
                    .saturating_mul(src.pitch)
                    .saturating_add(tile_x * TILEY_WIDTH + x);
                for y in 0..TILEY_HEIGHT {
                    let from = column.saturating_add(y.saturating_mul(src.pitch));
                    let to = tile + x * TILEY_HEIGHT + y * TILEY_SPAN;
                    copy_clipped(&mut dst[to..to + TILEY_SPAN], src.data, from, end);
                }
            }
        }
    }
}

/// Copy the logical `width * bpp` by `height` region of a device surface
/// back into host-linear `dst`. Inverse of [`encode`].
pub fn decode(mode: TilingMode, src: &[u8], dst: &mut HostSurfaceMut<'_>) -> MemResult<()> {
    let layout = mode.surface_layout(dst.width, dst.height, dst.bpp);
    if layout.height == 0 || layout.row_bytes == 0 {
        return Ok(());
    }

    let needed = (layout.height - 1)
        .checked_mul(dst.pitch)
        .and_then(|n| n.checked_add(layout.row_bytes))
        .ok_or(MemError::InvalidValue)?;
    if dst.pitch < layout.row_bytes || dst.data.len() < needed || src.len() < layout.size() {
        return Err(MemError::InvalidValue);
    }

    let run = layout.run_width();
    for y in 0..layout.height {
        let row = &mut dst.data[y * dst.pitch..y * dst.pitch + layout.row_bytes];
        let mut x = 0;
        while x < layout.row_bytes {
            let len = (run - x % run).min(layout.row_bytes - x);
            let from = layout.offset_of(x, y);
            row[x..x + len].copy_from_slice(&src[from..from + len]);
            x += len;
        }
    }
    Ok(())
}
