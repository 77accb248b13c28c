//! Container format tests.
//!
//! Tests for:
//! - Reading classic TIFF in both byte orders, 8- and 16-bit
//! - SVS files with JPEGTables and associated images
//! - Rejection of strips and JPEG 2000
//! - Output files: BigTIFF, subfile types, RGBA interop

use std::io::Cursor;

use wsi_compositor::error::{FormatError, TiffError};
use wsi_compositor::format::tiff::{Compression, PyramidWriter, TiffPyramid, SUBFILE_REDUCED_IMAGE};
use wsi_compositor::format::{detect_format, SlideFormat};
use wsi_compositor::io::MemoryReader;
use wsi_compositor::raster::{PixelBuffer, PixelLayout};
use wsi_compositor::slide::{PyramidReader, TiffPyramidReader};
use wsi_compositor::{write_pyramid, PyramidOptions};

use super::test_utils::{
    build_classic_tiff, create_test_jpeg, gradient_rgb, is_bigtiff_magic, open_bytes,
    split_jpeg_tables, write_pages, ByteOrderType, TestPage,
};

const SVS_DESCRIPTION: &str =
    "Aperio Image Library v12.0.15\r\n2048x1536 [0,0 2048x1536] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.4990";

async fn open_err(bytes: Vec<u8>) -> FormatError {
    match TiffPyramidReader::open(MemoryReader::new(bytes, "mem://bad")).await {
        Ok(_) => panic!("expected the file to be rejected"),
        Err(e) => e,
    }
}

// =============================================================================
// Byte Order Tests
// =============================================================================

#[tokio::test]
async fn test_both_byte_orders_read_identically() {
    let image = gradient_rgb(40, 24);
    let half = gradient_rgb(20, 12);

    let mut decoded = Vec::new();
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let bytes = build_classic_tiff(
            order,
            &[
                TestPage::uncompressed(&image, 16, order),
                TestPage::uncompressed(&half, 16, order).with_subfile_type(1),
            ],
        );
        let slide = open_bytes(bytes, "mem://order").await;
        assert_eq!(slide.format(), SlideFormat::GenericTiff);
        assert_eq!(slide.level_count(), 2);
        assert_eq!(slide.level_dimensions(1), Some((20, 12)));
        decoded.push(slide.read_level(0).await.unwrap());
    }

    assert_eq!(decoded[0], image);
    assert_eq!(decoded[1], image);
}

#[tokio::test]
async fn test_big_endian_16_bit_samples() {
    let samples: Vec<u16> = (0..32 * 20).map(|i| (i * 97 % 65536) as u16).collect();
    let image = PixelBuffer::from_u16(32, 20, PixelLayout::Gray, samples).unwrap();

    let order = ByteOrderType::BigEndian;
    let bytes = build_classic_tiff(order, &[TestPage::uncompressed(&image, 16, order)]);
    let slide = open_bytes(bytes, "mem://be16").await;

    let info = slide.level_info(0).unwrap();
    assert_eq!(info.bits_per_sample, 16);
    assert_eq!(slide.read_level(0).await.unwrap(), image);
}

// =============================================================================
// SVS Tests
// =============================================================================

#[tokio::test]
async fn test_svs_with_jpeg_tables() {
    let full = create_test_jpeg(256, 256, 90);
    let (tables, abbreviated) = split_jpeg_tables(&full);

    let bytes = build_classic_tiff(
        ByteOrderType::LittleEndian,
        &[
            TestPage::jpeg_gray(1024, 768, 256, abbreviated.clone())
                .with_jpeg_tables(tables.clone())
                .with_description(SVS_DESCRIPTION),
            TestPage::jpeg_gray(256, 192, 256, abbreviated)
                .with_jpeg_tables(tables)
                .with_description("Aperio Image Library v12.0.15\r\n1024x768 -> 256x192"),
            TestPage::jpeg_gray(256, 256, 256, full)
                .with_subfile_type(1)
                .with_description("Aperio Image Library v12.0.15\r\nlabel 256x256"),
        ],
    );

    let reader = MemoryReader::new(bytes.clone(), "mem://slide.svs");
    assert_eq!(detect_format(&reader).await.unwrap(), SlideFormat::AperioSvs);

    let slide = open_bytes(bytes, "mem://slide.svs").await;
    assert_eq!(slide.format(), SlideFormat::AperioSvs);
    assert_eq!(slide.level_count(), 2, "label image must not be a level");
    assert_eq!(slide.level_info(1).unwrap().downsample, 4.0);

    let metadata = slide.metadata().unwrap();
    assert_eq!(metadata.mpp, Some(0.499));
    assert_eq!(metadata.magnification, Some(20.0));

    let level = slide.read_level(1).await.unwrap();
    assert_eq!(level.dimensions(), (256, 192));
    assert_eq!(level.channels(), 1);
    // Gradient survives JPEG within a small error
    for (x, y) in [(0, 0), (100, 50), (200, 180)] {
        let expected = ((x + y) % 256) as i64;
        let actual = level.sample(x, y, 0) as i64;
        assert!((expected - actual).abs() <= 8, "({}, {}): {} vs {}", x, y, actual, expected);
    }
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[tokio::test]
async fn test_strip_tiff_rejected() {
    let image = gradient_rgb(16, 16);
    let order = ByteOrderType::LittleEndian;
    let bytes = build_classic_tiff(order, &[TestPage::uncompressed(&image, 16, order).stripped()]);

    assert!(matches!(
        open_err(bytes).await,
        FormatError::Tiff(TiffError::StripOrganization)
    ));
}

#[tokio::test]
async fn test_jpeg2000_rejected() {
    let image = gradient_rgb(16, 16);
    let order = ByteOrderType::LittleEndian;
    let bytes = build_classic_tiff(
        order,
        &[TestPage::uncompressed(&image, 16, order)
            .with_compression(33003)
            .with_description(SVS_DESCRIPTION)],
    );

    assert!(matches!(
        open_err(bytes).await,
        FormatError::Tiff(TiffError::UnsupportedCompression(_))
    ));
}

#[tokio::test]
async fn test_not_a_tiff_rejected() {
    assert!(matches!(
        open_err(b"GIF89a, certainly not a pyramid".to_vec()).await,
        FormatError::UnsupportedFormat { .. }
    ));
}

// =============================================================================
// Writer Output Tests
// =============================================================================

#[tokio::test]
async fn test_written_pyramid_is_bigtiff_with_subfile_types() {
    let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).unwrap();
    let levels = write_pyramid(
        &mut writer,
        gradient_rgb(300, 200),
        &PyramidOptions::new(64, Compression::Deflate),
    )
    .unwrap();
    assert_eq!(levels, 4);
    let bytes = writer.finish().unwrap().into_inner();
    assert!(is_bigtiff_magic(&bytes));

    let reader = MemoryReader::new(bytes, "mem://pyramid");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();
    let order = pyramid.header.byte_order;
    let dims: Vec<(u32, u32)> = pyramid.levels.iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(dims, vec![(300, 200), (150, 100), (75, 50), (37, 25)]);

    assert_eq!(pyramid.levels[0].ifd.subfile_type(order), 0);
    for level in &pyramid.levels[1..] {
        assert_eq!(level.ifd.subfile_type(order), SUBFILE_REDUCED_IMAGE);
        assert_eq!(level.tile_width, 64);
    }
}

#[tokio::test]
async fn test_rgba_pages_round_trip() {
    let mut samples = Vec::new();
    for i in 0..(48 * 40) {
        samples.extend([(i % 251) as u8, 7, 200, if i % 3 == 0 { 255 } else { 0 }]);
    }
    let image = PixelBuffer::from_u8(48, 40, PixelLayout::Rgba, samples).unwrap();

    for compression in [Compression::None, Compression::Lzw, Compression::Deflate] {
        let bytes = write_pages(std::slice::from_ref(&image), 32, compression);
        let slide = open_bytes(bytes, "mem://rgba").await;
        assert_eq!(slide.level_info(0).unwrap().channels, 4);
        assert_eq!(slide.read_level(0).await.unwrap(), image, "{:?}", compression);
    }
}
