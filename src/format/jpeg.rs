//! Abbreviated JPEG stream handling.
//!
//! Aperio SVS tiles (and many generic JPEG TIFFs) store each tile as an
//! abbreviated stream: SOI, frame header, scan data and EOI, without the
//! quantization (DQT) and Huffman (DHT) tables. The tables live once in the
//! level's `JPEGTables` tag, itself a tiny stream of the form
//! `SOI DQT.. DHT.. EOI`.
//!
//! A decodable stream is `tables without EOI` followed by `tile without SOI`.

use bytes::{Bytes, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

const MARKER_DHT: u8 = 0xC4;
const MARKER_DQT: u8 = 0xDB;
const MARKER_SOS: u8 = 0xDA;

/// Markers that carry no length field.
#[inline]
fn is_standalone_marker(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD9)
}

/// Whether a stream lacks the DQT/DHT segments needed to decode it.
///
/// Walks the marker segments after SOI; a stream is abbreviated when the
/// start of scan is reached without seeing either table.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        match marker {
            MARKER_DQT | MARKER_DHT => return false,
            MARKER_SOS => return true,
            0xFF => pos += 1,
            m if is_standalone_marker(m) => pos += 2,
            _ => {
                if pos + 3 >= data.len() {
                    break;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
            }
        }
    }

    false
}

/// Splice `JPEGTables` into an abbreviated tile stream.
pub fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile);
    }
    if tile.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let tile = tile.strip_prefix(&SOI).unwrap_or(tile);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Return a decodable stream for a tile, merging tables when it needs them.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile: &[u8]) -> Bytes {
    match tables {
        Some(tables) if is_abbreviated_stream(tile) => merge_jpeg_tables(tables, tile),
        _ => Bytes::copy_from_slice(tile),
    }
}
