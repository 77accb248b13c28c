//! Slide format detection.
//!
//! Every supported slide is a TIFF or BigTIFF. Aperio SVS files are told
//! apart by the "Aperio" marker in the first IFD's ImageDescription;
//! anything else with a valid header is treated as a generic pyramidal TIFF.

use crate::error::FormatError;
use crate::io::RangeReader;

use super::svs::APERIO_MARKER;
use super::tiff::{ByteOrder, Ifd, TiffHeader, TiffTag, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

/// Only the start of the description is searched for vendor markers.
const MAX_DESCRIPTION_BYTES: u64 = 1024;

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS (abbreviated JPEG tiles plus JPEGTables)
    AperioSvs,

    /// Any other tiled pyramidal TIFF
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }
}

/// Detect the format of a slide.
///
/// Fails with `UnsupportedFormat` when the bytes are not a TIFF at all.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    let size = reader.size();
    if size < TIFF_HEADER_SIZE as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("{} bytes is too small for a TIFF file", size),
        });
    }

    let header_len = (BIGTIFF_HEADER_SIZE as u64).min(size) as usize;
    let header_bytes = reader.read_exact_at(0, header_len).await?;
    if !is_tiff_header(&header_bytes) {
        return Err(FormatError::UnsupportedFormat {
            reason: "missing TIFF magic bytes".to_string(),
        });
    }
    let header = TiffHeader::parse(&header_bytes, size)?;

    let count_bytes = reader
        .read_exact_at(header.first_ifd_offset, header.ifd_count_size())
        .await?;
    let entry_count = if header.is_bigtiff {
        header.byte_order.read_u64(&count_bytes)
    } else {
        header.byte_order.read_u16(&count_bytes) as u64
    };
    let ifd_bytes = reader
        .read_exact_at(
            header.first_ifd_offset,
            Ifd::calculate_size(entry_count, &header),
        )
        .await?;
    let ifd = Ifd::parse(&ifd_bytes, &header)?;

    let description = description_prefix(reader, &ifd, &header).await?;
    if contains_marker(&description, APERIO_MARKER.as_bytes()) {
        Ok(SlideFormat::AperioSvs)
    } else {
        Ok(SlideFormat::GenericTiff)
    }
}

/// First bytes of the ImageDescription, empty when the tag is absent.
async fn description_prefix<R: RangeReader>(
    reader: &R,
    ifd: &Ifd,
    header: &TiffHeader,
) -> Result<Vec<u8>, FormatError> {
    let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) else {
        return Ok(Vec::new());
    };

    let len = entry.count.min(MAX_DESCRIPTION_BYTES) as usize;
    if entry.is_inline {
        let end = len.min(entry.value_offset_bytes.len());
        return Ok(entry.value_offset_bytes[..end].to_vec());
    }
    let bytes = reader
        .read_exact_at(entry.value_offset(header.byte_order), len)
        .await?;
    Ok(bytes.to_vec())
}

fn contains_marker(haystack: &[u8], marker: &[u8]) -> bool {
    !marker.is_empty() && haystack.windows(marker.len()).any(|w| w == marker)
}

/// Quick check for TIFF (42) or BigTIFF (43) magic in either byte order.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }
    let byte_order = match &bytes[..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };
    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}
