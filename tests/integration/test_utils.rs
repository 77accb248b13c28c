//! Test utilities for integration tests.
//!
//! This module provides builders for hand-assembled TIFF files (any byte
//! order, optional JPEGTables), synthetic images, and helpers to write and
//! reopen pyramids entirely in memory.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};

use wsi_compositor::format::tiff::{Compression, PageOptions, PyramidWriter, SubfileKind};
use wsi_compositor::io::MemoryReader;
use wsi_compositor::mask::{build_mask_pyramid, Geometry};
use wsi_compositor::raster::{PixelBuffer, PixelLayout};
use wsi_compositor::slide::TiffPyramidReader;

// =============================================================================
// Synthetic Images
// =============================================================================

/// An 8-bit image where every pixel has the same channel values.
pub fn solid_image(width: u32, height: u32, layout: PixelLayout, value: &[u8]) -> PixelBuffer {
    assert_eq!(value.len(), layout.channels());
    let samples = value
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * layout.channels())
        .collect();
    PixelBuffer::from_u8(width, height, layout, samples).unwrap()
}

/// An 8-bit RGB gradient, `(x, y, x + y)` modulo 256.
pub fn gradient_rgb(width: u32, height: u32) -> PixelBuffer {
    let mut samples = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            samples.extend([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    PixelBuffer::from_u8(width, height, PixelLayout::Rgb, samples).unwrap()
}

/// A square polygon with corners `(x0, y0)` and `(x1, y1)`.
pub fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry {
    Geometry::Polygon(vec![vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]])
}

/// A GeoJSON FeatureCollection with one polygon feature per square.
pub fn squares_geojson(squares: &[(f64, f64, f64, f64)]) -> String {
    let features: Vec<serde_json::Value> = squares
        .iter()
        .map(|&(x0, y0, x1, y1)| {
            serde_json::json!({
                "type": "Feature",
                "properties": {"classification": "tumor"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
                }
            })
        })
        .collect();
    serde_json::json!({"type": "FeatureCollection", "features": features}).to_string()
}

// =============================================================================
// In-Memory Pyramids
// =============================================================================

/// Write each image as one page, first primary then reduced.
pub fn write_pages(images: &[PixelBuffer], tile_size: u32, compression: Compression) -> Vec<u8> {
    let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).unwrap();
    for (index, image) in images.iter().enumerate() {
        let subfile = if index == 0 {
            SubfileKind::Primary
        } else {
            SubfileKind::Reduced
        };
        writer
            .write_page(
                image,
                &PageOptions::new(tile_size, compression).with_subfile(subfile),
            )
            .unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Rasterize geometry into an in-memory mask pyramid.
pub fn mask_pyramid_bytes(dimensions: (u32, u32), tile_size: u32, geometries: &[Geometry]) -> Vec<u8> {
    let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).unwrap();
    build_mask_pyramid(dimensions, tile_size, geometries, &mut writer).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Open pyramid bytes through the regular reader.
pub async fn open_bytes(bytes: Vec<u8>, identifier: &str) -> TiffPyramidReader<MemoryReader> {
    TiffPyramidReader::open(MemoryReader::new(bytes, identifier))
        .await
        .unwrap()
}

/// Per-pixel alpha of an RGBA buffer, row-major.
pub fn alpha_plane(image: &PixelBuffer) -> Vec<u32> {
    assert_eq!(image.channels(), 4);
    let mut alpha = Vec::with_capacity(image.width() as usize * image.height() as usize);
    for y in 0..image.height() {
        for x in 0..image.width() {
            alpha.push(image.sample(x, y, 3));
        }
    }
    alpha
}

/// Assert that alpha is `max` exactly inside `[lo, hi)` on both axes.
pub fn assert_alpha_square(image: &PixelBuffer, lo: u32, hi: u32, max: u32) {
    for y in 0..image.height() {
        for x in 0..image.width() {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            let expected = if inside { max } else { 0 };
            assert_eq!(
                image.sample(x, y, 3),
                expected,
                "alpha at ({}, {}) for square [{}, {})",
                x,
                y,
                lo,
                hi
            );
        }
    }
}

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Create a grayscale JPEG with a simple gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]));

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Split a complete JPEG into a JPEGTables blob (SOI, tables, EOI) and an
/// abbreviated stream (SOI, scan, EOI).
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut i = 2;
    while i + 4 <= jpeg.len() {
        assert_eq!(jpeg[i], 0xFF, "expected a marker at {}", i);
        if jpeg[i + 1] == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        i += 2 + len;
    }

    let mut tables = vec![0xFF, 0xD8];
    tables.extend_from_slice(&jpeg[2..i]);
    tables.extend_from_slice(&[0xFF, 0xD9]);

    let mut abbreviated = vec![0xFF, 0xD8];
    abbreviated.extend_from_slice(&jpeg[i..]);
    (tables, abbreviated)
}

// =============================================================================
// Hand-Assembled Classic TIFF
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

impl ByteOrderType {
    fn u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrderType::LittleEndian => value.to_le_bytes(),
            ByteOrderType::BigEndian => value.to_be_bytes(),
        }
    }

    fn u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrderType::LittleEndian => value.to_le_bytes(),
            ByteOrderType::BigEndian => value.to_be_bytes(),
        }
    }
}

const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const UNDEFINED: u16 = 7;

/// One IFD of a hand-assembled TIFF.
#[derive(Clone, Debug)]
pub struct TestPage {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    pub compression: u16,
    pub photometric: u16,
    pub subfile_type: u32,

    /// Raw tile payloads in row-major tile order
    pub tiles: Vec<Vec<u8>>,

    pub jpeg_tables: Option<Vec<u8>>,
    pub description: Option<String>,

    /// Write StripOffsets/StripByteCounts instead of tile tags
    pub stripped: bool,
}

impl TestPage {
    /// An uncompressed tiled page cut from an 8- or 16-bit buffer.
    pub fn uncompressed(image: &PixelBuffer, tile: u32, order: ByteOrderType) -> Self {
        let channels = image.channels();
        let bits = image.bits_per_sample();
        let bytes_per_sample = (bits / 8) as usize;
        let tiles_x = image.width().div_ceil(tile);
        let tiles_y = image.height().div_ceil(tile);

        let mut tiles = Vec::new();
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let mut payload =
                    Vec::with_capacity(tile as usize * tile as usize * channels * bytes_per_sample);
                for y in 0..tile {
                    for x in 0..tile {
                        for c in 0..channels {
                            let (px, py) = (tx * tile + x, ty * tile + y);
                            let value = if px < image.width() && py < image.height() {
                                image.sample(px, py, c)
                            } else {
                                0
                            };
                            if bits == 16 {
                                payload.extend(order.u16(value as u16));
                            } else {
                                payload.push(value as u8);
                            }
                        }
                    }
                }
                tiles.push(payload);
            }
        }

        Self {
            width: image.width(),
            height: image.height(),
            tile_width: tile,
            tile_height: tile,
            samples_per_pixel: channels as u16,
            bits_per_sample: bits,
            compression: 1,
            photometric: if channels >= 3 { 2 } else { 1 },
            subfile_type: 0,
            tiles,
            jpeg_tables: None,
            description: None,
            stripped: false,
        }
    }

    /// A grayscale JPEG page where every tile holds the same stream.
    pub fn jpeg_gray(width: u32, height: u32, tile: u32, stream: Vec<u8>) -> Self {
        let count = (width.div_ceil(tile) * height.div_ceil(tile)) as usize;
        Self {
            width,
            height,
            tile_width: tile,
            tile_height: tile,
            samples_per_pixel: 1,
            bits_per_sample: 8,
            compression: 7,
            photometric: 1,
            subfile_type: 0,
            tiles: vec![stream; count],
            jpeg_tables: None,
            description: None,
            stripped: false,
        }
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_jpeg_tables(mut self, tables: Vec<u8>) -> Self {
        self.jpeg_tables = Some(tables);
        self
    }

    pub fn with_subfile_type(mut self, subfile_type: u32) -> Self {
        self.subfile_type = subfile_type;
        self
    }

    pub fn stripped(mut self) -> Self {
        self.stripped = true;
        self
    }
}

struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    bytes: Vec<u8>,
}

fn shorts(order: ByteOrderType, tag: u16, values: &[u16]) -> RawEntry {
    RawEntry {
        tag,
        field_type: SHORT,
        count: values.len() as u32,
        bytes: values.iter().flat_map(|&v| order.u16(v)).collect(),
    }
}

fn longs(order: ByteOrderType, tag: u16, values: &[u32]) -> RawEntry {
    RawEntry {
        tag,
        field_type: LONG,
        count: values.len() as u32,
        bytes: values.iter().flat_map(|&v| order.u32(v)).collect(),
    }
}

fn pad_to_word(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

/// Assemble a classic (32-bit offset) TIFF with one IFD per page.
///
/// Tile payloads and out-of-line values precede each IFD; IFDs are chained
/// in page order.
pub fn build_classic_tiff(order: ByteOrderType, pages: &[TestPage]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(match order {
        ByteOrderType::LittleEndian => b"II",
        ByteOrderType::BigEndian => b"MM",
    });
    data.extend(order.u16(42));
    let mut next_pointer = data.len();
    data.extend(order.u32(0));

    for page in pages {
        let mut offsets = Vec::with_capacity(page.tiles.len());
        let mut counts = Vec::with_capacity(page.tiles.len());
        for tile in &page.tiles {
            pad_to_word(&mut data);
            offsets.push(data.len() as u32);
            counts.push(tile.len() as u32);
            data.extend_from_slice(tile);
        }

        let mut entries = vec![
            longs(order, 254, &[page.subfile_type]),
            longs(order, 256, &[page.width]),
            longs(order, 257, &[page.height]),
            shorts(
                order,
                258,
                &vec![page.bits_per_sample; page.samples_per_pixel as usize],
            ),
            shorts(order, 259, &[page.compression]),
            shorts(order, 262, &[page.photometric]),
            shorts(order, 277, &[page.samples_per_pixel]),
            shorts(order, 284, &[1]),
        ];
        if page.stripped {
            entries.push(longs(order, 273, &offsets));
            entries.push(longs(order, 278, &[page.height]));
            entries.push(longs(order, 279, &counts));
        } else {
            entries.push(longs(order, 322, &[page.tile_width]));
            entries.push(longs(order, 323, &[page.tile_height]));
            entries.push(longs(order, 324, &offsets));
            entries.push(longs(order, 325, &counts));
        }
        if let Some(description) = &page.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            entries.push(RawEntry {
                tag: 270,
                field_type: ASCII,
                count: bytes.len() as u32,
                bytes,
            });
        }
        if let Some(tables) = &page.jpeg_tables {
            entries.push(RawEntry {
                tag: 347,
                field_type: UNDEFINED,
                count: tables.len() as u32,
                bytes: tables.clone(),
            });
        }
        entries.sort_by_key(|entry| entry.tag);

        // Out-of-line values
        let mut value_fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.bytes.len() <= 4 {
                let mut inline = entry.bytes.clone();
                inline.resize(4, 0);
                value_fields.push(inline);
            } else {
                pad_to_word(&mut data);
                value_fields.push(order.u32(data.len() as u32).to_vec());
                data.extend_from_slice(&entry.bytes);
            }
        }

        pad_to_word(&mut data);
        let ifd_offset = data.len() as u32;
        data[next_pointer..next_pointer + 4].copy_from_slice(&order.u32(ifd_offset));

        data.extend(order.u16(entries.len() as u16));
        for (entry, value) in entries.iter().zip(value_fields) {
            data.extend(order.u16(entry.tag));
            data.extend(order.u16(entry.field_type));
            data.extend(order.u32(entry.count));
            data.extend(value);
        }
        next_pointer = data.len();
        data.extend(order.u32(0));
    }

    data
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if data starts with BigTIFF magic bytes.
pub fn is_bigtiff_magic(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }

    match &data[0..2] {
        b"II" => u16::from_le_bytes([data[2], data[3]]) == 43,
        b"MM" => u16::from_be_bytes([data[2], data[3]]) == 43,
        _ => false,
    }
}
