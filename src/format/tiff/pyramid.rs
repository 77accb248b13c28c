//! TIFF pyramid level identification.
//!
//! A slide file holds more IFDs than pyramid levels: SVS files add a
//! thumbnail, a label and a macro image, and generic TIFFs may carry
//! transparency masks. This module picks out the IFDs that form the
//! resolution pyramid.
//!
//! # Identification
//!
//! An IFD is a level candidate when it:
//! 1. is tiled and has TileOffsets and TileByteCounts,
//! 2. is not flagged as a transparency mask (NewSubfileType bit 2),
//! 3. is not an SVS label or macro image (ImageDescription).
//!
//! Candidates are sorted by area; the largest is level 0. The rest are kept
//! when their downsample from level 0 is close to a power of two and both
//! axes agree on it, which drops macro images with a different aspect ratio.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{TiffTag, SUBFILE_TRANSPARENCY_MASK};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs to parse (safety limit)
const MAX_IFDS: usize = 256;

/// ImageDescription markers of SVS associated images
const ASSOCIATED_IMAGE_MARKERS: [&str; 2] = ["label", "macro"];

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Index of this level in the pyramid (0 = highest resolution)
    pub level_index: usize,

    /// Index of the IFD in the file's IFD chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Total number of tiles
    pub tile_count: u32,

    /// Downsample factor relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Compression tag value
    pub compression: u16,

    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub predictor: u16,
    pub photometric: Option<u16>,

    /// The parsed IFD for this level
    pub ifd: Ifd,

    pub tile_offsets_entry: Option<IfdEntry>,
    pub tile_byte_counts_entry: Option<IfdEntry>,
    pub jpeg_tables_entry: Option<IfdEntry>,
    pub bits_per_sample_entry: Option<IfdEntry>,
    pub sample_format_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Create a PyramidLevel from a parsed IFD.
    ///
    /// Returns None if the IFD lacks tile or image dimensions.
    fn from_ifd(ifd: Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        let tile_width = ifd.tile_width(byte_order)?;
        let tile_height = ifd.tile_height(byte_order)?;
        let width = ifd.image_width(byte_order)?;
        let height = ifd.image_height(byte_order)?;
        if tile_width == 0 || tile_height == 0 || width == 0 || height == 0 {
            return None;
        }

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            tile_count: tiles_x.saturating_mul(tiles_y),
            downsample: 1.0,
            compression: ifd.compression(byte_order),
            samples_per_pixel: ifd.samples_per_pixel(byte_order),
            planar_configuration: ifd.planar_configuration(byte_order),
            predictor: ifd.predictor(byte_order),
            photometric: ifd.photometric(byte_order),
            tile_offsets_entry: ifd.get_entry_by_tag(TiffTag::TileOffsets).cloned(),
            tile_byte_counts_entry: ifd.get_entry_by_tag(TiffTag::TileByteCounts).cloned(),
            jpeg_tables_entry: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
            bits_per_sample_entry: ifd.get_entry_by_tag(TiffTag::BitsPerSample).cloned(),
            sample_format_entry: ifd.get_entry_by_tag(TiffTag::SampleFormat).cloned(),
            ifd,
        })
    }

    /// Check if this level has tile offset and byte count entries.
    pub fn has_tile_data(&self) -> bool {
        self.tile_offsets_entry.is_some() && self.tile_byte_counts_entry.is_some()
    }

    /// Row-major tile index, or None if out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixel extent of the image covered by a tile (edge tiles are clipped).
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A parsed TIFF image pyramid, level 0 first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Pyramid levels, sorted by resolution (0 = highest)
    pub levels: Vec<PyramidLevel>,

    /// IFDs that are not pyramid levels (label, macro, masks, strips)
    pub other_ifds: Vec<(usize, Ifd)>,
}

impl TiffPyramid {
    /// Parse a TIFF file and identify its pyramid levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header).await?;

        let value_reader = ValueReader::new(reader, &header);
        let mut descriptions = Vec::with_capacity(ifds.len());
        for ifd in &ifds {
            let description = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
                Some(entry) => value_reader.read_string(entry).await.ok(),
                None => None,
            };
            descriptions.push(description);
        }

        Ok(Self::build_pyramid(header, ifds, &descriptions))
    }

    /// Parse all IFDs following the next-IFD chain.
    async fn parse_all_ifds<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if !visited.insert(offset) {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_size = header.ifd_count_size();
            let count_bytes = reader.read_exact_at(offset, count_size).await?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };
            if entry_count > super::parser::MAX_IFD_ENTRIES {
                return Err(TiffError::InvalidTagValue {
                    tag: "IFD",
                    message: format!("IFD at {} declares {} entries", offset, entry_count),
                });
            }

            let ifd_size = Ifd::calculate_size(entry_count, header);
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    /// Build the pyramid structure from parsed IFDs.
    fn build_pyramid(header: TiffHeader, ifds: Vec<Ifd>, descriptions: &[Option<String>]) -> Self {
        let byte_order = header.byte_order;

        let mut candidates: Vec<PyramidLevel> = Vec::new();
        let mut other_ifds: Vec<(usize, Ifd)> = Vec::new();

        for (ifd_index, ifd) in ifds.into_iter().enumerate() {
            let description = descriptions.get(ifd_index).and_then(|d| d.as_deref());
            let subfile = ifd.subfile_type(byte_order);
            match PyramidLevel::from_ifd(ifd.clone(), ifd_index, byte_order) {
                Some(level) if Self::is_pyramid_candidate(&level, subfile, description) => {
                    candidates.push(level)
                }
                _ => other_ifds.push((ifd_index, ifd)),
            }
        }

        // Largest first; the sort is stable so equal areas keep file order
        candidates.sort_by(|a, b| {
            let area_a = a.width as u64 * a.height as u64;
            let area_b = b.width as u64 * b.height as u64;
            area_b.cmp(&area_a)
        });

        TiffPyramid {
            header,
            levels: Self::filter_pyramid_levels(candidates),
            other_ifds,
        }
    }

    /// Check if a tiled IFD looks like a pyramid level.
    fn is_pyramid_candidate(level: &PyramidLevel, subfile: u32, description: Option<&str>) -> bool {
        if !level.has_tile_data() {
            return false;
        }
        if subfile & SUBFILE_TRANSPARENCY_MASK != 0 {
            return false;
        }
        if let Some(description) = description {
            let lower = description.to_ascii_lowercase();
            // Aperio puts the vendor header on line one and the page kind on line two
            let kind_line = lower.lines().nth(1).unwrap_or(&lower).trim_start();
            if ASSOCIATED_IMAGE_MARKERS
                .iter()
                .any(|marker| kind_line.starts_with(marker))
            {
                return false;
            }
        }
        true
    }

    /// Keep candidates that form a consistent pyramid with the largest one.
    ///
    /// The downsample is measured on the longer base axis. The shorter axis
    /// may bottom out at one pixel while the longer one keeps halving.
    fn filter_pyramid_levels(candidates: Vec<PyramidLevel>) -> Vec<PyramidLevel> {
        let (base_width, base_height) = match candidates.first() {
            Some(base) => (base.width, base.height),
            None => return candidates,
        };

        let mut levels = Vec::new();
        for (idx, mut level) in candidates.into_iter().enumerate() {
            let downsample = if base_width >= base_height {
                base_width as f64 / level.width as f64
            } else {
                base_height as f64 / level.height as f64
            };

            if Self::is_valid_downsample(downsample, idx)
                && Self::axes_agree(base_width, base_height, &level, downsample)
            {
                level.level_index = levels.len();
                level.downsample = downsample;
                levels.push(level);
            }
        }

        levels
    }

    /// Check if a downsample factor is plausible for a pyramid level.
    fn is_valid_downsample(downsample: f64, level_idx: usize) -> bool {
        if level_idx == 0 {
            return (downsample - 1.0).abs() < 0.1;
        }

        let rounded = downsample.log2().round();
        if rounded < 1.0 {
            return false;
        }

        // Allow 20% tolerance around the nearest power of two
        let ratio = downsample / 2.0_f64.powf(rounded);
        ratio > 0.8 && ratio < 1.2
    }

    /// Both axes must match the base divided by the same power of two,
    /// within a pixel of rounding or 2%, or equal the repeatedly halved size
    /// `max(1, base / factor)`.
    fn axes_agree(base_width: u32, base_height: u32, level: &PyramidLevel, downsample: f64) -> bool {
        let exponent = downsample.log2().round().max(0.0) as u32;
        let close = |base: u32, actual: u32| {
            let halved = base.checked_shr(exponent).unwrap_or(0).max(1);
            let expected = base as f64 / 2.0_f64.powi(exponent as i32);
            actual == halved || (expected - actual as f64).abs() <= (expected * 0.02).max(1.0)
        };
        close(base_width, level.width) && close(base_height, level.height)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }

    /// Get the base (highest resolution) level.
    pub fn base_level(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    /// Get dimensions of the base level.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base_level().map(|l| (l.width, l.height))
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tag arrays needed to decode a level's tiles.
#[derive(Debug, Clone)]
pub struct TileData {
    /// Byte offset of each tile in the file
    pub offsets: Vec<u64>,

    /// Byte count (size) of each tile
    pub byte_counts: Vec<u64>,

    /// JPEGTables data (if present)
    pub jpeg_tables: Option<Bytes>,

    /// Bits per sample, one value per sample (TIFF default: 1)
    pub bits_per_sample: Vec<u16>,

    /// Sample format, one value per sample (TIFF default: unsigned)
    pub sample_format: Vec<u16>,
}

impl TileData {
    /// Load tile data for a pyramid level.
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let value_reader = ValueReader::new(reader, header);

        let offsets = match &level.tile_offsets_entry {
            Some(entry) => value_reader.read_u64_array(entry).await?,
            None => return Err(TiffError::MissingTag("TileOffsets")),
        };
        let byte_counts = match &level.tile_byte_counts_entry {
            Some(entry) => value_reader.read_u64_array(entry).await?,
            None => return Err(TiffError::MissingTag("TileByteCounts")),
        };
        if offsets.len() < level.tile_count as usize || byte_counts.len() < offsets.len() {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "{} offsets and {} byte counts for {} tiles",
                    offsets.len(),
                    byte_counts.len(),
                    level.tile_count
                ),
            });
        }

        let jpeg_tables = match &level.jpeg_tables_entry {
            Some(entry) => Some(value_reader.read_bytes(entry).await?),
            None => None,
        };
        let bits_per_sample = match &level.bits_per_sample_entry {
            Some(entry) => value_reader.read_u16_array(entry).await?,
            None => vec![1],
        };
        let sample_format = match &level.sample_format_entry {
            Some(entry) => value_reader.read_u16_array(entry).await?,
            None => vec![1],
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
            bits_per_sample,
            sample_format,
        })
    }

    /// Get offset and size for a specific tile.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

// =============================================================================
// Tests
// =============================================================================
