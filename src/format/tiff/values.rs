//! TIFF tag value reading.
//!
//! Values are either inline in the IFD entry or stored at an offset. Arrays
//! such as TileOffsets are fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file, respecting its byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// Inline values are sliced out of the entry; the rest are fetched.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
                tag: "value",
                message: format!("value of {} bytes cannot be addressed", size),
            })?;
            Ok(self.reader.read_exact_at(offset, size).await?)
        }
    }

    /// Read an integer array (SHORT, LONG or LONG8) widened to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        decode_integers(&bytes, entry.count as usize, field_type, self.byte_order())
    }

    /// Read a SHORT array, e.g. BitsPerSample or SampleFormat.
    pub async fn read_u16_array(&self, entry: &IfdEntry) -> Result<Vec<u16>, TiffError> {
        let values = self.read_u64_array(entry).await?;
        values
            .into_iter()
            .map(|v| {
                u16::try_from(v).map_err(|_| TiffError::InvalidTagValue {
                    tag: "short array",
                    message: format!("value {} does not fit in 16 bits", v),
                })
            })
            .collect()
    }

    /// Read an ASCII value, dropping the NUL terminator.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if field_type != FieldType::Ascii {
            return Err(TiffError::InvalidTagValue {
                tag: "ascii",
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

fn decode_integers(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Result<Vec<u64>, TiffError> {
    let width = field_type.size_in_bytes();
    let read: fn(ByteOrder, &[u8]) -> u64 = match field_type {
        FieldType::Byte => |_, b| b[0] as u64,
        FieldType::Short => |bo, b| bo.read_u16(b) as u64,
        FieldType::Long => |bo, b| bo.read_u32(b) as u64,
        FieldType::Long8 => |bo, b| bo.read_u64(b),
        other => {
            return Err(TiffError::InvalidTagValue {
                tag: "integer array",
                message: format!("expected Byte, Short, Long or Long8, got {:?}", other),
            })
        }
    };

    Ok(bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| read(byte_order, chunk))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
