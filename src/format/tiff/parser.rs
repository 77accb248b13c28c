//! TIFF header and IFD parsing.
//!
//! Parses TIFF and BigTIFF headers and Image File Directories. Values that
//! live outside the IFD are fetched later by [`super::ValueReader`].
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use std::collections::HashMap;

use super::tags::{FieldType, TiffTag};
use crate::error::TiffError;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read respecting this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from the first two bytes of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Read a u32 from the first four bytes of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Read a u64 from the first eight bytes of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to begin parsing IFDs:
/// - Byte order for reading all subsequent values
/// - Whether this is classic TIFF or BigTIFF (affects entry sizes and offset widths)
/// - Location of the first IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// The input must contain at least 8 bytes for classic TIFF or 16 bytes for BigTIFF.
    /// The function first reads enough to determine the format, then validates the rest.
    ///
    /// # Arguments
    /// * `bytes` - Raw header bytes (at least 8 bytes, preferably 16 for BigTIFF support)
    /// * `file_size` - Total file size (used to validate IFD offset)
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        // Need at least 8 bytes to read the basic header
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Read byte order (bytes 0-1)
        // We read this as little-endian because we're checking for specific byte patterns
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        // Read version (bytes 2-3) using the detected byte order
        let version = byte_order.read_u16(&bytes[2..4]);

        match version {
            VERSION_TIFF => {
                // Classic TIFF: 4-byte offset at bytes 4-7
                let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;

                // Validate offset
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }

                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: false,
                    first_ifd_offset,
                })
            }
            VERSION_BIGTIFF => {
                // BigTIFF: need 16 bytes total
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }

                // Bytes 4-5: offset byte size (must be 8)
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }

                // Bytes 6-7: reserved (should be 0, but we don't strictly require it)

                // Bytes 8-15: first IFD offset (8 bytes)
                let first_ifd_offset = byte_order.read_u64(&bytes[8..16]);

                // Validate offset
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }

                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: true,
                    first_ifd_offset,
                })
            }
            _ => Err(TiffError::InvalidVersion(version)),
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    ///
    /// Classic TIFF: 2 bytes (u16)
    /// BigTIFF: 8 bytes (u64)
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next IFD offset field at the end of an IFD.
    ///
    /// Classic TIFF: 4 bytes (u32)
    /// BigTIFF: 8 bytes (u64)
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset field in an IFD entry.
    ///
    /// This determines the inline value threshold:
    /// Classic TIFF: 4 bytes
    /// BigTIFF: 8 bytes
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IFD Entries
// =============================================================================

/// Upper bound on entries per IFD; anything larger is treated as corruption.
pub const MAX_IFD_ENTRIES: u64 = 4096;

/// A single IFD entry: tag, type, count and the raw value/offset field.
///
/// The value/offset field is kept as raw bytes (4 or 8 of them) so the entry
/// can be interpreted later with the file's byte order, whether the value is
/// inline or points elsewhere in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Numeric tag ID
    pub tag_id: u16,

    /// Decoded field type, `None` for types this crate does not interpret
    pub field_type: Option<FieldType>,

    /// Field type exactly as stored
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// Raw value/offset field
    pub value_offset_bytes: Vec<u8>,

    /// Whether the values are stored in `value_offset_bytes` directly
    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size of this entry's values, if the type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| (ft.size_in_bytes() as u64).saturating_mul(self.count))
    }

    /// Interpret the value/offset field as an offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Single inline integer value as u32.
    ///
    /// Returns `None` for arrays, offset-stored values, non-integer types and
    /// LONG8 values that overflow.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u64(byte_order)
            .and_then(|value| u32::try_from(value).ok())
    }

    /// Single inline integer value as u64.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        let bytes = &self.value_offset_bytes;
        match self.field_type? {
            FieldType::Byte => Some(bytes[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(bytes) as u64),
            FieldType::Long => Some(byte_order.read_u32(bytes) as u64),
            FieldType::Long8 if bytes.len() >= 8 => Some(byte_order.read_u64(bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// IFD
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Index into `entries` by tag ID
    pub entries_by_tag: HashMap<u16, usize>,

    /// Offset of the next IFD, 0 at the end of the chain
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Number of bytes occupied by an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.ifd_next_offset_size()
    }

    /// Parse an IFD from bytes starting at the entry count field.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = if header.is_bigtiff {
            byte_order.read_u64(bytes)
        } else {
            byte_order.read_u16(bytes) as u64
        };
        if entry_count > MAX_IFD_ENTRIES {
            return Err(TiffError::InvalidTagValue {
                tag: "IFD",
                message: format!("{} entries exceeds limit of {}", entry_count, MAX_IFD_ENTRIES),
            });
        }

        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.value_offset_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut entries_by_tag = HashMap::with_capacity(entry_count as usize);

        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let raw = &bytes[start..start + entry_size];

            let tag_id = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let field_type = FieldType::from_u16(field_type_raw);
            let (count, value_start) = if header.is_bigtiff {
                (byte_order.read_u64(&raw[4..12]), 12)
            } else {
                (byte_order.read_u32(&raw[4..8]) as u64, 8)
            };
            let is_inline = field_type
                .map(|ft| ft.fits_inline(count, header.is_bigtiff))
                .unwrap_or(false);

            entries_by_tag.insert(tag_id, entries.len());
            entries.push(IfdEntry {
                tag_id,
                field_type,
                field_type_raw,
                count,
                value_offset_bytes: raw[value_start..value_start + value_size].to_vec(),
                is_inline,
            });
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = if header.is_bigtiff {
            byte_order.read_u64(&bytes[next_start..])
        } else {
            byte_order.read_u32(&bytes[next_start..]) as u64
        };

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    /// Look up an entry by numeric tag ID.
    pub fn get_entry(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag_id)
            .and_then(|&index| self.entries.get(index))
    }

    /// Look up an entry by tag.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get_entry(tag.as_u16())
    }

    /// Single inline integer value of a tag.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    fn get_u16(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(tag, byte_order)
            .and_then(|value| u16::try_from(value).ok())
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    /// Compression value; TIFF defaults to 1 (none) when absent.
    pub fn compression(&self, byte_order: ByteOrder) -> u16 {
        self.get_u16(TiffTag::Compression, byte_order).unwrap_or(1)
    }

    /// Samples per pixel; TIFF defaults to 1 when absent.
    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> u16 {
        self.get_u16(TiffTag::SamplesPerPixel, byte_order).unwrap_or(1)
    }

    pub fn photometric(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u16(TiffTag::PhotometricInterpretation, byte_order)
    }

    /// Planar configuration; defaults to chunky.
    pub fn planar_configuration(&self, byte_order: ByteOrder) -> u16 {
        self.get_u16(TiffTag::PlanarConfiguration, byte_order)
            .unwrap_or(1)
    }

    /// Predictor; defaults to none (1).
    pub fn predictor(&self, byte_order: ByteOrder) -> u16 {
        self.get_u16(TiffTag::Predictor, byte_order).unwrap_or(1)
    }

    /// NewSubfileType bit field; defaults to 0 (full-resolution page).
    pub fn subfile_type(&self, byte_order: ByteOrder) -> u32 {
        self.get_u32(TiffTag::NewSubfileType, byte_order).unwrap_or(0)
    }

    /// Whether the page is organized in tiles.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileLength).is_some()
    }

    /// Whether the page is organized in strips.
    pub fn is_stripped(&self) -> bool {
        self.get_entry_by_tag(TiffTag::StripOffsets).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // ByteOrder Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_byte_order_read_u16() {
        let bytes = [0x01, 0x02];
        assert_eq!(ByteOrder::LittleEndian.read_u16(&bytes), 0x0201);
        assert_eq!(ByteOrder::BigEndian.read_u16(&bytes), 0x0102);
    }

    #[test]
    fn test_byte_order_read_u32() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(ByteOrder::LittleEndian.read_u32(&bytes), 0x04030201);
        assert_eq!(ByteOrder::BigEndian.read_u32(&bytes), 0x01020304);
    }

    #[test]
    fn test_byte_order_read_u64() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(
            ByteOrder::LittleEndian.read_u64(&bytes),
            0x0807060504030201
        );
        assert_eq!(ByteOrder::BigEndian.read_u64(&bytes), 0x0102030405060708);
    }

    // -------------------------------------------------------------------------
    // TiffHeader Parsing Tests - Classic TIFF
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_tiff_little_endian() {
        // Little-endian TIFF with first IFD at offset 8
        let header = [
            0x49, 0x49, // II (little-endian)
            0x2A, 0x00, // Version 42 (little-endian)
            0x08, 0x00, 0x00, 0x00, // First IFD offset = 8 (little-endian)
        ];

        let result = TiffHeader::parse(&header, 1000).unwrap();
        assert_eq!(result.byte_order, ByteOrder::LittleEndian);
        assert!(!result.is_bigtiff);
        assert_eq!(result.first_ifd_offset, 8);
    }

    #[test]
    fn test_parse_tiff_big_endian() {
        // Big-endian TIFF with first IFD at offset 8
        let header = [
            0x4D, 0x4D, // MM (big-endian)
            0x00, 0x2A, // Version 42 (big-endian)
            0x00, 0x00, 0x00, 0x08, // First IFD offset = 8 (big-endian)
        ];

        let result = TiffHeader::parse(&header, 1000).unwrap();
        assert_eq!(result.byte_order, ByteOrder::BigEndian);
        assert!(!result.is_bigtiff);
        assert_eq!(result.first_ifd_offset, 8);
    }

    #[test]
    fn test_parse_bigtiff_little_endian() {
        // Little-endian BigTIFF with first IFD at offset 16
        let header = [
            0x49, 0x49, // II (little-endian)
            0x2B, 0x00, // Version 43 (BigTIFF)
            0x08, 0x00, // Offset size = 8
            0x00, 0x00, // Reserved
            0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // First IFD offset = 16
        ];

        let result = TiffHeader::parse(&header, 1000).unwrap();
        assert_eq!(result.byte_order, ByteOrder::LittleEndian);
        assert!(result.is_bigtiff);
        assert_eq!(result.first_ifd_offset, 16);
    }

    #[test]
    fn test_parse_bigtiff_large_offset() {
        // BigTIFF with 64-bit offset beyond 4GB
        let header = [
            0x49, 0x49, // II (little-endian)
            0x2B, 0x00, // Version 43 (BigTIFF)
            0x08, 0x00, // Offset size = 8
            0x00, 0x00, // Reserved
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // First IFD offset = 4GB
        ];

        let result = TiffHeader::parse(&header, 10_000_000_000).unwrap();
        assert!(result.is_bigtiff);
        assert_eq!(result.first_ifd_offset, 0x0000_0001_0000_0000); // 4GB
    }

    // -------------------------------------------------------------------------
    // TiffHeader Parsing Tests - Error Cases
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_invalid_magic() {
        let header = [
            0x00, 0x00, // Invalid magic
            0x2A, 0x00, 0x08, 0x00, 0x00, 0x00,
        ];

        let result = TiffHeader::parse(&header, 1000);
        assert!(matches!(result, Err(TiffError::InvalidMagic(0x0000))));
    }

    #[test]
    fn test_parse_invalid_version() {
        let header = [
            0x49, 0x49, // II
            0x00, 0x00, // Invalid version 0
            0x08, 0x00, 0x00, 0x00,
        ];

        let result = TiffHeader::parse(&header, 1000);
        assert!(matches!(result, Err(TiffError::InvalidVersion(0))));
    }

    #[test]
    fn test_parse_bigtiff_invalid_offset_size() {
        let header = [
            0x49, 0x49, // II
            0x2B, 0x00, // Version 43 (BigTIFF)
            0x04, 0x00, // Invalid offset size = 4 (should be 8)
            0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let result = TiffHeader::parse(&header, 1000);
        assert!(matches!(
            result,
            Err(TiffError::InvalidBigTiffOffsetSize(4))
        ));
    }

    #[test]
    fn test_parse_file_too_small_tiff() {
        let header = [0x49, 0x49, 0x2A, 0x00]; // Only 4 bytes

        let result = TiffHeader::parse(&header, 1000);
        assert!(matches!(
            result,
            Err(TiffError::FileTooSmall {
                required: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_parse_file_too_small_bigtiff() {
        // Valid TIFF header but BigTIFF needs 16 bytes
        let header = [
            0x49, 0x49, // II
            0x2B, 0x00, // Version 43 (BigTIFF)
            0x08, 0x00, // Offset size = 8
            0x00, 0x00, // Only 8 bytes total
        ];

        let result = TiffHeader::parse(&header, 1000);
        assert!(matches!(
            result,
            Err(TiffError::FileTooSmall {
                required: 16,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_parse_invalid_ifd_offset() {
        // IFD offset beyond file size
        let header = [
            0x49, 0x49, // II
            0x2A, 0x00, // Version 42
            0xE8, 0x03, 0x00, 0x00, // First IFD offset = 1000
        ];

        let result = TiffHeader::parse(&header, 500); // File is only 500 bytes
        assert!(matches!(result, Err(TiffError::InvalidIfdOffset(1000))));
    }

    // -------------------------------------------------------------------------
    // IFD Tests
    // -------------------------------------------------------------------------

    fn bigtiff_header() -> TiffHeader {
        TiffHeader {
            byte_order: ByteOrder::LittleEndian,
            is_bigtiff: true,
            first_ifd_offset: 16,
        }
    }

    fn bigtiff_entry(tag: u16, field_type: u16, count: u64, value: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&field_type.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    #[test]
    fn test_parse_bigtiff_ifd() {
        let mut bytes = 3u64.to_le_bytes().to_vec();
        bytes.extend(bigtiff_entry(256, 4, 1, 1024));
        bytes.extend(bigtiff_entry(322, 3, 1, 256));
        bytes.extend(bigtiff_entry(324, 16, 16, 4096));
        bytes.extend(0u64.to_le_bytes());

        let header = bigtiff_header();
        assert_eq!(Ifd::calculate_size(3, &header), bytes.len());

        let ifd = Ifd::parse(&bytes, &header).unwrap();
        assert_eq!(ifd.entries.len(), 3);
        assert_eq!(ifd.next_ifd_offset, 0);
        assert_eq!(ifd.image_width(header.byte_order), Some(1024));
        assert_eq!(ifd.tile_width(header.byte_order), Some(256));
        assert!(!ifd.is_tiled());

        let offsets = ifd.get_entry_by_tag(TiffTag::TileOffsets).unwrap();
        assert!(!offsets.is_inline);
        assert_eq!(offsets.value_byte_size(), Some(128));
        assert_eq!(offsets.value_offset(header.byte_order), 4096);
        assert_eq!(offsets.inline_u32(header.byte_order), None);
    }

    #[test]
    fn test_parse_classic_ifd_defaults() {
        let header = TiffHeader {
            byte_order: ByteOrder::BigEndian,
            is_bigtiff: false,
            first_ifd_offset: 8,
        };
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);

        let ifd = Ifd::parse(&bytes, &header).unwrap();
        assert_eq!(ifd.image_height(header.byte_order), Some(512));
        assert_eq!(ifd.next_ifd_offset, 256);
        assert_eq!(ifd.compression(header.byte_order), 1);
        assert_eq!(ifd.samples_per_pixel(header.byte_order), 1);
        assert_eq!(ifd.planar_configuration(header.byte_order), 1);
        assert_eq!(ifd.subfile_type(header.byte_order), 0);
    }

    #[test]
    fn test_parse_ifd_truncated() {
        let header = bigtiff_header();
        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.extend(bigtiff_entry(256, 4, 1, 1024));

        let result = Ifd::parse(&bytes, &header);
        assert!(matches!(result, Err(TiffError::FileTooSmall { .. })));
    }

    #[test]
    fn test_parse_ifd_rejects_huge_entry_count() {
        let header = bigtiff_header();
        let bytes = (MAX_IFD_ENTRIES + 1).to_le_bytes();
        assert!(matches!(
            Ifd::parse(&bytes, &header),
            Err(TiffError::InvalidTagValue { .. })
        ));
    }

    #[test]
    fn test_unknown_field_type_is_not_inline() {
        let header = bigtiff_header();
        let mut bytes = 1u64.to_le_bytes().to_vec();
        bytes.extend(bigtiff_entry(33550, 12, 3, 999));
        bytes.extend(0u64.to_le_bytes());

        let ifd = Ifd::parse(&bytes, &header).unwrap();
        let entry = ifd.get_entry(33550).unwrap();
        assert_eq!(entry.field_type, None);
        assert_eq!(entry.field_type_raw, 12);
        assert!(!entry.is_inline);
        assert_eq!(entry.value_byte_size(), None);
    }
}
