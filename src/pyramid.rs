//! Power-of-two pyramid export.
//!
//! Writes a full-resolution image followed by successive 2x box-filtered
//! reductions, the same shape `tiffsave(pyramid=True)` produces:
//!
//! ```text
//! level 0  W x H            Primary
//! level 1  W/2 x H/2        Reduced
//! ...      until the level fits in one tile or reaches 1x1
//! ```
//!
//! Only the current level and the next reduction are held in memory.

use std::io::{Seek, Write};

use tracing::debug;

use crate::error::TiffError;
use crate::format::codec::DEFAULT_JPEG_QUALITY;
use crate::format::tiff::{align_tile_size, Compression, PageOptions, PyramidWriter, SubfileKind};
use crate::raster::{reduce_half, PixelBuffer};

/// Tile edge used when the source does not report one.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Layout and compression of an exported pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidOptions {
    /// Square tile edge, rounded up to a multiple of 16 when written
    pub tile_size: u32,
    pub compression: Compression,
    pub jpeg_quality: u8,
}

impl PyramidOptions {
    pub fn new(tile_size: u32, compression: Compression) -> Self {
        Self {
            tile_size,
            compression,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    fn page_options(&self, subfile: SubfileKind) -> PageOptions {
        PageOptions::new(self.tile_size, self.compression)
            .with_jpeg_quality(self.jpeg_quality)
            .with_subfile(subfile)
    }
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, Compression::Deflate)
    }
}

/// Whether a level of this size ends the pyramid.
#[inline]
fn is_last_level(width: u32, height: u32, tile: u32) -> bool {
    (width <= tile && height <= tile) || (width <= 1 && height <= 1)
}

/// Dimensions of every level [`write_pyramid`] would write.
pub fn level_dimensions(width: u32, height: u32, tile_size: u32) -> Vec<(u32, u32)> {
    let tile = align_tile_size(tile_size);
    let mut dims = vec![(width, height)];
    let (mut w, mut h) = (width, height);
    while w > 0 && h > 0 && !is_last_level(w, h, tile) {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        dims.push((w, h));
    }
    dims
}

/// Write `base` and its reductions as consecutive pages.
///
/// Returns the number of pages written.
pub fn write_pyramid<W: Write + Seek>(
    writer: &mut PyramidWriter<W>,
    base: PixelBuffer,
    options: &PyramidOptions,
) -> Result<usize, TiffError> {
    let tile = align_tile_size(options.tile_size);
    let mut current = base;
    let mut subfile = SubfileKind::Primary;
    let mut written = 0;

    loop {
        writer.write_page(&current, &options.page_options(subfile))?;
        written += 1;
        debug!(
            level = written - 1,
            width = current.width(),
            height = current.height(),
            "Exported pyramid level"
        );

        if is_last_level(current.width(), current.height(), tile) {
            break;
        }
        current = reduce_half(&current);
        subfile = SubfileKind::Reduced;
    }

    Ok(written)
}
