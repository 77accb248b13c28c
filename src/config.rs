//! Configuration management for the compositor CLI.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `WSI_` prefix:
//!
//! - `WSI_TEMP_DIR` - Directory for the intermediate tissue and mask pyramids
//! - `WSI_NO_KEEP_INTERMEDIATES` - Delete intermediates after a successful run
//! - `WSI_COMPRESSION` - Output compression: none, lzw, deflate (default: lzw)
//! - `WSI_LEVELS` - Level selection such as `0-2,4` (default: all levels)
//! - `WSI_MASK_THRESHOLD` - Mask samples above this are inside (default: 128)
//! - `WSI_JPEG_QUALITY` - JPEG quality of the tissue pyramid (default: 90)
//! - `WSI_TILE_SIZE` - Output tile edge (default: the slide's tile size)

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::composite::{parse_level_selection, ComposeOptions, DEFAULT_MASK_THRESHOLD};
use crate::format::codec::{is_valid_quality, DEFAULT_JPEG_QUALITY};
use crate::format::tiff::Compression;

// =============================================================================
// Default Values
// =============================================================================

/// Prefix of the per-process temporary directory.
pub const TEMP_DIR_PREFIX: &str = "wsi-compositor";

/// Largest accepted output tile edge.
pub const MAX_TILE_SIZE: u32 = 16384;

/// Compression schemes accepted for the output pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputCompression {
    None,
    #[default]
    Lzw,
    Deflate,
}

impl From<OutputCompression> for Compression {
    fn from(value: OutputCompression) -> Self {
        match value {
            OutputCompression::None => Compression::None,
            OutputCompression::Lzw => Compression::Lzw,
            OutputCompression::Deflate => Compression::Deflate,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI Compositor - Cut annotated regions out of Whole Slide Images.
///
/// Converts the slide to a tissue pyramid, rasterizes the GeoJSON annotations
/// into a mask pyramid, and writes an RGBA pyramidal BigTIFF where annotated
/// pixels are opaque and everything else is transparent.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-compositor")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Inputs and Output
    // =========================================================================
    /// Slide file (Aperio SVS or pyramidal TIFF).
    pub slide: PathBuf,

    /// GeoJSON annotations in level-0 pixel coordinates.
    pub annotations: PathBuf,

    /// Output RGBA pyramidal BigTIFF.
    pub output: PathBuf,

    // =========================================================================
    // Intermediates
    // =========================================================================
    /// Directory for the intermediate tissue and mask pyramids.
    ///
    /// Defaults to a per-process directory under the system temp directory.
    #[arg(long, env = "WSI_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Delete the intermediate pyramids after a successful run.
    #[arg(long, default_value_t = false, env = "WSI_NO_KEEP_INTERMEDIATES")]
    pub no_keep_intermediates: bool,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Compression of the output pyramid.
    #[arg(long, value_enum, default_value_t = OutputCompression::Lzw, env = "WSI_COMPRESSION")]
    pub compression: OutputCompression,

    /// Levels to composite, e.g. "0-2,4".
    ///
    /// When omitted and stdin is a terminal the levels are asked for
    /// interactively; otherwise every common level is processed.
    #[arg(long, env = "WSI_LEVELS")]
    pub levels: Option<String>,

    /// Mask samples strictly above this value count as inside.
    #[arg(long, default_value_t = DEFAULT_MASK_THRESHOLD, env = "WSI_MASK_THRESHOLD")]
    pub mask_threshold: u32,

    /// JPEG quality of the intermediate tissue pyramid (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Output tile edge in pixels, rounded up to a multiple of 16.
    ///
    /// Defaults to the slide's native tile size.
    #[arg(long, env = "WSI_TILE_SIZE")]
    pub tile_size: Option<u32>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.mask_threshold > u16::MAX as u32 {
            return Err(format!(
                "mask_threshold must be at most {} (16-bit sample maximum)",
                u16::MAX
            ));
        }

        if let Some(tile_size) = self.tile_size {
            if tile_size == 0 || tile_size > MAX_TILE_SIZE {
                return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
            }
        }

        // Syntax only; range is checked once the level counts are known
        if let Some(levels) = self.levels.as_deref() {
            if !levels.trim().is_empty() {
                parse_level_selection(levels, 0).map_err(|e| e.to_string())?;
            }
        }

        if self.output == self.slide || self.output == self.annotations {
            return Err("output must not overwrite an input file".to_string());
        }

        Ok(())
    }

    /// Directory for intermediate files.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("{}-{}", TEMP_DIR_PREFIX, std::process::id()))
        })
    }

    /// Whether intermediates stay on disk after the run.
    pub fn keep_intermediates(&self) -> bool {
        !self.no_keep_intermediates
    }

    /// Composition settings for a given level selection.
    pub fn compose_options(&self, levels: Option<String>) -> ComposeOptions {
        ComposeOptions {
            levels,
            compression: self.compression.into(),
            mask_threshold: self.mask_threshold,
            tile_size: self.tile_size,
        }
    }

    /// Stem of the slide file name, used to name intermediates.
    pub fn slide_stem(&self) -> String {
        self.slide
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("slide")
            .to_string()
    }

    /// Paths of the intermediate tissue and mask pyramids inside `dir`.
    pub fn intermediate_paths(&self, dir: &Path) -> (PathBuf, PathBuf) {
        let stem = self.slide_stem();
        (
            dir.join(format!("{}_tissue.tif", stem)),
            dir.join(format!("{}_mask.tif", stem)),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
