//! PyramidReader trait for format-agnostic pyramid access.
//!
//! Both inputs of the compositor (the tissue pyramid and the mask pyramid)
//! are consumed through this trait, one whole level at a time.

use async_trait::async_trait;

use crate::error::TiffError;
use crate::raster::PixelBuffer;

// =============================================================================
// Level Information
// =============================================================================

/// Metadata of a single pyramid level, available without reading pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Samples per pixel (1-4)
    pub channels: usize,

    /// Bits per sample (8 or 16)
    pub bits_per_sample: u16,

    pub tile_width: u32,
    pub tile_height: u32,

    /// Downsample factor relative to level 0
    ///
    /// Level 0 has downsample 1.0, level 1 is usually 2.0 or 4.0.
    pub downsample: f64,
}

impl LevelInfo {
    /// Number of tiles in X and Y direction.
    pub fn tile_count(&self) -> (u32, u32) {
        if self.tile_width == 0 || self.tile_height == 0 {
            return (0, 0);
        }
        (
            self.width.div_ceil(self.tile_width),
            self.height.div_ceil(self.tile_height),
        )
    }
}

// =============================================================================
// PyramidReader Trait
// =============================================================================

/// Read-only access to a multi-resolution image.
///
/// Level 0 is full resolution; dimensions never grow with the level index.
#[async_trait]
pub trait PyramidReader: Send + Sync {
    /// Number of pyramid levels.
    fn level_count(&self) -> usize;

    /// Metadata of a level, `None` if the level is out of range.
    fn level_info(&self, level: usize) -> Option<LevelInfo>;

    /// `(width, height)` of a level.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.level_info(level).map(|info| (info.width, info.height))
    }

    /// `(width, height)` of level 0.
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.level_dimensions(0)
    }

    /// Tile width of level 0, the tile size new pyramids derived from this
    /// one should use.
    fn native_tile_size(&self) -> Option<u32> {
        self.level_info(0).map(|info| info.tile_width)
    }

    /// Decode a whole level into a single buffer.
    ///
    /// The returned buffer owns its samples and has exactly the level's
    /// dimensions and channel count.
    async fn read_level(&self, level: usize) -> Result<PixelBuffer, TiffError>;
}
