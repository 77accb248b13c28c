//! Slide to tissue pyramid conversion.
//!
//! The full-resolution slide level is re-encoded as a tiled, JPEG-compressed
//! BigTIFF pyramid with the slide's own tile size. Pixels JPEG cannot hold
//! (alpha channels, 16-bit samples) are written with LZW instead.

use std::io::{Seek, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::TiffError;
use crate::format::codec::DEFAULT_JPEG_QUALITY;
use crate::format::tiff::{Compression, PyramidWriter};
use crate::pyramid::{write_pyramid, PyramidOptions, DEFAULT_TILE_SIZE};
use crate::raster::PixelBuffer;
use crate::slide::PyramidReader;

/// Result of a tissue conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TissueSummary {
    /// Full-resolution `(width, height)` of the slide
    pub dimensions: (u32, u32),

    /// Tile edge used for the tissue pyramid
    pub tile_size: u32,

    pub compression: Compression,
    pub levels_written: usize,
}

/// Compression for a tissue page: JPEG when the pixels allow it.
fn tissue_compression(image: &PixelBuffer) -> Compression {
    if image.bits_per_sample() == 8 && !image.layout().has_alpha() {
        Compression::Jpeg
    } else {
        Compression::Lzw
    }
}

/// Write slide level 0 as a JPEG pyramid into `writer`.
///
/// The writer is left open so the caller decides where the bytes go.
pub async fn convert_tissue<P, W>(
    slide: &P,
    writer: &mut PyramidWriter<W>,
    jpeg_quality: u8,
) -> Result<TissueSummary, TiffError>
where
    P: PyramidReader + ?Sized,
    W: Write + Seek,
{
    if slide.level_count() == 0 {
        return Err(TiffError::NoLevels);
    }
    let tile_size = slide
        .native_tile_size()
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_TILE_SIZE);

    let base = slide.read_level(0).await?;
    let dimensions = base.dimensions();

    let compression = tissue_compression(&base);
    if compression != Compression::Jpeg {
        warn!(
            bits_per_sample = base.bits_per_sample(),
            layout = ?base.layout(),
            "Slide pixels cannot be stored as JPEG, writing tissue pyramid with LZW"
        );
    }

    let options = PyramidOptions::new(tile_size, compression).with_jpeg_quality(jpeg_quality);
    let levels_written = write_pyramid(writer, base, &options)?;

    Ok(TissueSummary {
        dimensions,
        tile_size,
        compression,
        levels_written,
    })
}

/// Convert a slide into a tissue pyramid file at `path`.
pub async fn convert_tissue_to_path<P>(
    slide: &P,
    path: impl AsRef<Path>,
    jpeg_quality: Option<u8>,
) -> Result<TissueSummary, TiffError>
where
    P: PyramidReader + ?Sized,
{
    let path = path.as_ref();
    let mut writer = PyramidWriter::create(path)?.with_software(crate::SOFTWARE);
    let summary = convert_tissue(
        slide,
        &mut writer,
        jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
    )
    .await?;
    writer.finish()?;

    info!(
        path = %path.display(),
        width = summary.dimensions.0,
        height = summary.dimensions.1,
        levels = summary.levels_written,
        compression = summary.compression.name(),
        "Wrote tissue pyramid"
    );
    Ok(summary)
}
