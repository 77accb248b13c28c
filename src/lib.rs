//! # WSI Compositor
//!
//! Cut annotated regions out of Whole Slide Images.
//!
//! Given a slide pyramid and polygon annotations, this library produces a
//! multi-resolution RGBA pyramid where annotated pixels are opaque and
//! everything else is fully transparent, written as a tiled BigTIFF.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Byte-range readers over local files and memory
//! - [`mod@format`] - TIFF/SVS parsing, tile codecs and the pyramid writer
//! - [`raster`] - In-memory pixel buffers and resampling
//! - [`slide`] - Level-by-level pyramid reading
//! - [`pyramid`] - Power-of-two pyramid export
//! - [`tissue`] - Slide to tissue pyramid conversion
//! - [`mask`] - GeoJSON annotations to mask pyramid
//! - [`composite`] - Level selection, mask alignment and alpha compositing
//! - [`pipeline`] - The end-to-end run driven by the CLI
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_compositor::{compose_to_path, ComposeOptions, LocalFileReader, TiffPyramidReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tissue = TiffPyramidReader::open(LocalFileReader::open("tissue.tif").await?).await?;
//!     let mask = TiffPyramidReader::open(LocalFileReader::open("mask.tif").await?).await?;
//!
//!     let options = ComposeOptions {
//!         levels: Some("0-2".to_string()),
//!         ..ComposeOptions::default()
//!     };
//!     let summary = compose_to_path(&tissue, &mask, "composite.tif", &options).await?;
//!     println!("wrote levels {:?}", summary.levels_written);
//!     Ok(())
//! }
//! ```

pub mod composite;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod mask;
pub mod pipeline;
pub mod pyramid;
pub mod raster;
pub mod slide;
pub mod tissue;

/// Value of the Software tag in every file this crate writes.
pub const SOFTWARE: &str = concat!("wsi-compositor ", env!("CARGO_PKG_VERSION"));

// Re-export commonly used types
pub use composite::{
    align_mask, compose_pyramids, compose_to_path, composite_level, composite_rgba,
    parse_level_selection, resolve_level_selection, ComposeOptions, ComposeSummary,
    CompositeLevel, LevelSelection, DEFAULT_MASK_THRESHOLD,
};
pub use config::{Config, OutputCompression};
pub use error::{
    AnnotationError, CodecError, CompositeError, FormatError, IoError, LevelError, MaskError,
    PipelineError, PixelError, SelectionError, TiffError,
};
pub use format::tiff::{
    align_tile_size, Compression, PageOptions, PyramidWriter, SubfileKind, TiffPyramid,
};
pub use format::{detect_format, SlideFormat, SvsMetadata};
pub use io::{LocalFileReader, MemoryReader, RangeReader};
pub use mask::{
    build_mask_pyramid, build_mask_pyramid_to_path, load_annotations, parse_annotations,
    rasterize_mask, Geometry, MaskSummary,
};
pub use pipeline::{run, run_with, LevelCounts, PipelineReport};
pub use pyramid::{level_dimensions, write_pyramid, PyramidOptions};
pub use raster::{BinaryMask, PixelBuffer, PixelLayout};
pub use slide::{LevelInfo, PyramidReader, TiffPyramidReader};
pub use tissue::{convert_tissue, convert_tissue_to_path, TissueSummary};
