//! Decode-support checks for pyramid levels.
//!
//! Levels are parsed for any tiled IFD, but only a subset can be turned into
//! pixel buffers:
//! - **Organization**: tiled, chunky (interleaved) samples
//! - **Compression**: none, LZW, Deflate or JPEG
//! - **Samples**: 1 to 4 unsigned samples per pixel, all 8 or all 16 bits
//! - **JPEG**: 8-bit gray or RGB/YCbCr only
//! - **Photometric**: gray or RGB, plus YCbCr inside JPEG tiles
//!
//! Anything outside this subset is rejected before any tile is read.

use crate::error::TiffError;

use super::pyramid::{PyramidLevel, TiffPyramid, TileData};
use super::tags::{
    Compression, PHOTOMETRIC_MIN_IS_BLACK, PHOTOMETRIC_RGB, PHOTOMETRIC_YCBCR, PLANAR_CHUNKY,
    PREDICTOR_HORIZONTAL, SAMPLE_FORMAT_UINT,
};

/// Everything needed to decode the tiles of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEncoding {
    pub compression: Compression,
    pub channels: usize,
    pub bits_per_sample: u16,
    pub horizontal_predictor: bool,
}

/// Check that a pyramid has at least one level.
///
/// Files whose images are all stored in strips report that instead of a
/// generic "no levels" error.
pub fn validate_pyramid(pyramid: &TiffPyramid) -> Result<(), TiffError> {
    if !pyramid.levels.is_empty() {
        return Ok(());
    }
    let any_stripped = pyramid
        .other_ifds
        .iter()
        .any(|(_, ifd)| ifd.is_stripped() && !ifd.is_tiled());
    if any_stripped {
        Err(TiffError::StripOrganization)
    } else {
        Err(TiffError::NoLevels)
    }
}

/// Check a level against the decodable subset.
pub fn validate_level(level: &PyramidLevel, tile_data: &TileData) -> Result<TileEncoding, TiffError> {
    let compression = Compression::from_u16(level.compression).ok_or_else(|| {
        TiffError::UnsupportedCompression(format!("Unknown ({})", level.compression))
    })?;
    if !compression.is_supported() {
        return Err(TiffError::UnsupportedCompression(compression.name().to_string()));
    }

    let channels = level.samples_per_pixel as usize;
    if !(1..=4).contains(&channels) {
        return Err(TiffError::UnsupportedLayout(format!(
            "{} samples per pixel",
            channels
        )));
    }

    if channels > 1 && level.planar_configuration != PLANAR_CHUNKY {
        return Err(TiffError::UnsupportedLayout(
            "planar (separate) sample storage".to_string(),
        ));
    }

    let bits_per_sample = uniform_bits(&tile_data.bits_per_sample)?;
    if tile_data
        .sample_format
        .iter()
        .any(|&format| format != SAMPLE_FORMAT_UINT)
    {
        return Err(TiffError::UnsupportedLayout(
            "non-integer or signed samples".to_string(),
        ));
    }

    if compression == Compression::Jpeg && (bits_per_sample != 8 || !matches!(channels, 1 | 3)) {
        return Err(TiffError::UnsupportedLayout(format!(
            "JPEG tiles with {} samples of {} bits",
            channels, bits_per_sample
        )));
    }

    match level.photometric {
        None | Some(PHOTOMETRIC_MIN_IS_BLACK) | Some(PHOTOMETRIC_RGB) => {}
        // The JPEG decoder converts YCbCr itself
        Some(PHOTOMETRIC_YCBCR) if compression == Compression::Jpeg => {}
        Some(other) => {
            return Err(TiffError::UnsupportedLayout(format!(
                "photometric interpretation {} with {} compression",
                other,
                compression.name()
            )))
        }
    }

    Ok(TileEncoding {
        compression,
        channels,
        bits_per_sample,
        horizontal_predictor: level.predictor == PREDICTOR_HORIZONTAL,
    })
}

/// The single bit depth shared by every sample.
fn uniform_bits(bits: &[u16]) -> Result<u16, TiffError> {
    let first = bits.first().copied().unwrap_or(1);
    if bits.iter().any(|&b| b != first) {
        return Err(TiffError::UnsupportedLayout(format!(
            "mixed bits per sample {:?}",
            bits
        )));
    }
    match first {
        8 | 16 => Ok(first),
        other => Err(TiffError::UnsupportedLayout(format!(
            "{} bits per sample",
            other
        ))),
    }
}
