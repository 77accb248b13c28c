//! Tile codecs.
//!
//! Lossless codecs (LZW, Deflate, none) operate on raw interleaved sample
//! bytes. JPEG operates on 8-bit gray or RGB pixels only; tiles with alpha
//! cannot be JPEG-compressed.

use std::io::{Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat, ImageReader};
use weezl::BitOrder;

use super::tiff::{ByteOrder, Compression};
use crate::error::CodecError;
use crate::raster::PixelLayout;

/// Default JPEG quality (1-100) for tissue pyramids.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// TIFF LZW starts with 9-bit codes over an 8-bit alphabet.
const LZW_MIN_CODE_SIZE: u8 = 8;

#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Lossless Codecs
// =============================================================================

/// Compress raw tile bytes.
pub fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lzw => weezl::encode::Encoder::with_tiff_size_switch(
            BitOrder::Msb,
            LZW_MIN_CODE_SIZE,
        )
        .encode(data)
        .map_err(|e| CodecError::Lzw(e.to_string())),
        Compression::Deflate | Compression::AdobeDeflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| CodecError::Deflate(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CodecError::Deflate(e.to_string()))
        }
        other => Err(CodecError::Unsupported(other.name())),
    }
}

/// Decompress raw tile bytes.
pub fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lzw => weezl::decode::Decoder::with_tiff_size_switch(
            BitOrder::Msb,
            LZW_MIN_CODE_SIZE,
        )
        .decode(data)
        .map_err(|e| CodecError::Lzw(e.to_string())),
        Compression::Deflate | Compression::AdobeDeflate => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| CodecError::Deflate(e.to_string()))?;
            Ok(out)
        }
        other => Err(CodecError::Unsupported(other.name())),
    }
}

/// Reverse horizontal differencing (TIFF predictor 2) in place.
///
/// `data` holds whole rows of `width * channels` samples at `bits` per
/// sample, in the file's byte order.
pub fn undo_horizontal_predictor(
    data: &mut [u8],
    width: usize,
    channels: usize,
    bits: u16,
    byte_order: ByteOrder,
) {
    let row_samples = width * channels;
    match bits {
        8 => {
            for row in data.chunks_exact_mut(row_samples) {
                for i in channels..row.len() {
                    row[i] = row[i].wrapping_add(row[i - channels]);
                }
            }
        }
        16 => {
            for row in data.chunks_exact_mut(row_samples * 2) {
                for i in channels..row_samples {
                    let prev = byte_order.read_u16(&row[(i - channels) * 2..]);
                    let cur = byte_order.read_u16(&row[i * 2..]);
                    let value = cur.wrapping_add(prev);
                    let bytes = match byte_order {
                        ByteOrder::LittleEndian => value.to_le_bytes(),
                        ByteOrder::BigEndian => value.to_be_bytes(),
                    };
                    row[i * 2..i * 2 + 2].copy_from_slice(&bytes);
                }
            }
        }
        _ => {}
    }
}

// =============================================================================
// JPEG
// =============================================================================

/// Pixels decoded from a JPEG stream.
#[derive(Debug, Clone)]
pub struct DecodedJpeg {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub samples: Vec<u8>,
}

/// Decode a complete JPEG stream to 8-bit gray or RGB samples.
pub fn decode_jpeg(data: &[u8]) -> Result<DecodedJpeg, CodecError> {
    let reader = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg);
    let image = reader
        .decode()
        .map_err(|e| CodecError::Jpeg(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    let (channels, samples) = match image {
        DynamicImage::ImageLuma8(gray) => (1, gray.into_raw()),
        DynamicImage::ImageRgb8(rgb) => (3, rgb.into_raw()),
        other => (3, other.to_rgb8().into_raw()),
    };

    Ok(DecodedJpeg {
        width,
        height,
        channels,
        samples,
    })
}

/// Encode 8-bit gray or RGB samples as a baseline JPEG.
///
/// RGB input is stored as JFIF YCbCr without chroma subsampling.
pub fn encode_jpeg(
    samples: &[u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
    quality: u8,
) -> Result<Vec<u8>, CodecError> {
    let color_type = match layout {
        PixelLayout::Gray => ExtendedColorType::L8,
        PixelLayout::Rgb => ExtendedColorType::Rgb8,
        PixelLayout::GrayAlpha | PixelLayout::Rgba => {
            return Err(CodecError::Unsupported("JPEG with alpha"))
        }
    };

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
    encoder
        .encode(samples, width, height, color_type)
        .map_err(|e| CodecError::Jpeg(e.to_string()))?;
    Ok(output)
}
