//! Composition tests over real pyramid files held in memory.
//!
//! Tests for:
//! - The two-level scenario with a square annotation
//! - Output dimensions following the tissue pyramid
//! - Level-count mismatch between tissue and mask
//! - 16-bit tissue alpha

use std::io::Cursor;

use wsi_compositor::format::tiff::{Compression, PyramidWriter};
use wsi_compositor::raster::{PixelBuffer, PixelLayout};
use wsi_compositor::slide::PyramidReader;
use wsi_compositor::{compose_pyramids, write_pyramid, ComposeOptions, CompositeError, PyramidOptions};

use super::test_utils::{
    alpha_plane, assert_alpha_square, gradient_rgb, mask_pyramid_bytes, open_bytes, square,
    write_pages,
};

fn options(levels: Option<&str>) -> ComposeOptions {
    ComposeOptions {
        levels: levels.map(str::to_string),
        ..ComposeOptions::default()
    }
}

async fn compose_bytes(
    tissue: Vec<u8>,
    mask: Vec<u8>,
    options: &ComposeOptions,
) -> Result<(wsi_compositor::ComposeSummary, Vec<u8>), CompositeError> {
    let tissue = open_bytes(tissue, "mem://tissue").await;
    let mask = open_bytes(mask, "mem://mask").await;
    let writer = PyramidWriter::new(Cursor::new(Vec::new())).unwrap();
    let (summary, out) = compose_pyramids(&tissue, &mask, writer, options).await?;
    Ok((summary, out.into_inner()))
}

#[tokio::test]
async fn test_two_level_square_scenario() {
    let level0 = gradient_rgb(512, 512);
    let level1 = gradient_rgb(256, 256);
    let tissue = write_pages(&[level0.clone(), level1.clone()], 256, Compression::Deflate);
    // Corners are inclusive, so this covers pixels [100, 200) on both axes
    let mask = mask_pyramid_bytes((512, 512), 256, &[square(100.0, 100.0, 199.0, 199.0)]);

    let (summary, bytes) = compose_bytes(tissue, mask, &options(Some("0,1"))).await.unwrap();
    assert_eq!(summary.max_levels, 2);
    assert_eq!(summary.levels_written, vec![0, 1]);

    let output = open_bytes(bytes, "mem://output").await;
    assert_eq!(output.level_count(), 2);

    let page0 = output.read_level(0).await.unwrap();
    assert_eq!(page0.dimensions(), (512, 512));
    assert_eq!(page0.channels(), 4);
    assert_alpha_square(&page0, 100, 200, 255);
    for (x, y) in [(0, 0), (150, 120), (511, 300)] {
        for c in 0..3 {
            assert_eq!(page0.sample(x, y, c), level0.sample(x, y, c));
        }
    }

    let page1 = output.read_level(1).await.unwrap();
    assert_eq!(page1.dimensions(), (256, 256));
    assert_alpha_square(&page1, 50, 100, 255);
    assert_eq!(page1.sample(60, 70, 1), level1.sample(60, 70, 1));
}

#[tokio::test]
async fn test_output_dimensions_follow_tissue() {
    let tissue = write_pages(
        &[gradient_rgb(1000, 1000), gradient_rgb(500, 500), gradient_rgb(250, 250)],
        256,
        Compression::Lzw,
    );
    // Mask pyramid at a different scale: 400, 200, 100
    let mask = mask_pyramid_bytes((400, 400), 128, &[square(0.0, 0.0, 199.0, 399.0)]);

    let (summary, bytes) = compose_bytes(tissue, mask, &options(None)).await.unwrap();
    assert_eq!(summary.levels_written, vec![0, 1, 2]);

    let output = open_bytes(bytes, "mem://output").await;
    let dims: Vec<_> = (0..output.level_count())
        .map(|level| output.level_dimensions(level).unwrap())
        .collect();
    assert_eq!(dims, vec![(1000, 1000), (500, 500), (250, 250)]);

    // The left half of the mask covers the left half of every tissue level
    let page = output.read_level(2).await.unwrap();
    assert_eq!(page.sample(10, 200, 3), 255);
    assert_eq!(page.sample(240, 10, 3), 0);
}

#[tokio::test]
async fn test_level_count_mismatch_writes_common_levels() {
    let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).unwrap();
    let tissue_levels = write_pyramid(
        &mut writer,
        gradient_rgb(256, 256),
        &PyramidOptions::new(16, Compression::Deflate),
    )
    .unwrap();
    assert_eq!(tissue_levels, 5);
    let tissue = writer.finish().unwrap().into_inner();

    let mask = mask_pyramid_bytes((256, 256), 64, &[square(0.0, 0.0, 255.0, 255.0)]);

    let (summary, bytes) = compose_bytes(tissue, mask, &options(Some("0-4"))).await.unwrap();
    assert_eq!(summary.tissue_levels, 5);
    assert_eq!(summary.mask_levels, 3);
    assert_eq!(summary.max_levels, 3);
    assert_eq!(summary.levels_written, vec![0, 1, 2]);

    let output = open_bytes(bytes, "mem://output").await;
    assert_eq!(output.level_count(), 3);
}

#[tokio::test]
async fn test_selection_outside_common_levels_fails() {
    let tissue = write_pages(&[gradient_rgb(64, 64)], 32, Compression::Deflate);
    let mask = mask_pyramid_bytes((64, 64), 64, &[]);

    let err = compose_bytes(tissue, mask, &options(Some("3-5"))).await.unwrap_err();
    assert!(matches!(err, CompositeError::EmptySelection { max_levels: 1, .. }));
}

#[tokio::test]
async fn test_16_bit_tissue_gets_full_alpha() {
    let samples: Vec<u16> = (0..64 * 64).map(|i| (i * 13) as u16).collect();
    let image = PixelBuffer::from_u16(64, 64, PixelLayout::Gray, samples).unwrap();
    let tissue = write_pages(std::slice::from_ref(&image), 32, Compression::Lzw);
    let mask = mask_pyramid_bytes((64, 64), 32, &[square(0.0, 0.0, 31.0, 63.0)]);

    let (_, bytes) = compose_bytes(tissue, mask, &options(Some("0"))).await.unwrap();
    let output = open_bytes(bytes, "mem://output").await;
    let page = output.read_level(0).await.unwrap();

    assert_eq!(page.bits_per_sample(), 16);
    assert_eq!(page.sample(5, 9, 0), image.sample(5, 9, 0));
    assert_eq!(page.sample(5, 9, 2), image.sample(5, 9, 0));
    let alpha = alpha_plane(&page);
    assert_eq!(alpha[9 * 64 + 5], 65535);
    assert_eq!(alpha[9 * 64 + 40], 0);
}
