//! End-to-end pipeline tests on files in a scratch directory.
//!
//! Tests for:
//! - Slide + GeoJSON to RGBA pyramid with intermediates kept or removed
//! - Input validation before any output is written
//! - Selections that match no level

use std::path::{Path, PathBuf};

use wsi_compositor::config::{Config, OutputCompression};
use wsi_compositor::error::{CompositeError, PipelineError};
use wsi_compositor::format::tiff::Compression;
use wsi_compositor::pipeline::{open_pyramid, run, run_with};
use wsi_compositor::raster::PixelLayout;
use wsi_compositor::slide::PyramidReader;

use super::test_utils::{assert_alpha_square, solid_image, squares_geojson, write_pages};

const TISSUE_COLOR: [u8; 3] = [200, 100, 50];

/// A fresh directory holding a 512x512 two-level slide and one annotation
/// covering pixels [100, 200) on both axes.
async fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "wsi-compositor-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = tokio::fs::remove_dir_all(&dir).await;
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let slide = write_pages(
        &[
            solid_image(512, 512, PixelLayout::Rgb, &TISSUE_COLOR),
            solid_image(256, 256, PixelLayout::Rgb, &TISSUE_COLOR),
        ],
        256,
        Compression::Deflate,
    );
    tokio::fs::write(dir.join("slide.tif"), slide).await.unwrap();
    tokio::fs::write(
        dir.join("annotations.geojson"),
        squares_geojson(&[(100.0, 100.0, 199.0, 199.0)]),
    )
    .await
    .unwrap();
    dir
}

fn config(dir: &Path) -> Config {
    Config {
        slide: dir.join("slide.tif"),
        annotations: dir.join("annotations.geojson"),
        output: dir.join("composite.tif"),
        temp_dir: Some(dir.join("work")),
        no_keep_intermediates: false,
        compression: OutputCompression::Lzw,
        levels: None,
        mask_threshold: 128,
        jpeg_quality: 95,
        tile_size: None,
        verbose: false,
    }
}

#[tokio::test]
async fn test_end_to_end_square() {
    let dir = scratch("e2e").await;
    let config = config(&dir);

    let report = run_with(&config, |counts| {
        assert_eq!((counts.tissue, counts.mask), (2, 2));
        Some("0,1".to_string())
    })
    .await
    .unwrap();

    assert_eq!(report.tissue.compression, Compression::Jpeg);
    assert_eq!(report.tissue.tile_size, 256);
    assert_eq!(report.mask.rings_drawn, 1);
    assert_eq!(report.composite.levels_written, vec![0, 1]);
    assert!(!report.intermediates_removed);
    assert!(report.tissue_path.exists());
    assert!(report.mask_path.exists());

    let output = open_pyramid(&config.output).await.unwrap();
    assert_eq!(output.level_count(), 2);

    let page0 = output.read_level(0).await.unwrap();
    assert_eq!(page0.dimensions(), (512, 512));
    assert_alpha_square(&page0, 100, 200, 255);
    for (c, &expected) in TISSUE_COLOR.iter().enumerate() {
        let actual = page0.sample(150, 150, c) as i64;
        assert!((actual - expected as i64).abs() <= 3, "channel {}: {}", c, actual);
    }

    let page1 = output.read_level(1).await.unwrap();
    assert_eq!(page1.dimensions(), (256, 256));
    assert_alpha_square(&page1, 50, 100, 255);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_intermediates_removed_on_request() {
    let dir = scratch("cleanup").await;
    let mut config = config(&dir);
    config.no_keep_intermediates = true;
    config.compression = OutputCompression::Deflate;

    let report = run(&config).await.unwrap();
    assert!(report.intermediates_removed);
    assert!(!report.tissue_path.exists());
    assert!(!report.mask_path.exists());
    assert!(config.output.exists());
    // An explicit temp dir is left in place
    assert!(dir.join("work").exists());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_missing_annotations() {
    let dir = scratch("missing").await;
    let mut config = config(&dir);
    config.annotations = dir.join("nope.geojson");

    let err = run(&config).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InputNotFound {
            kind: "Annotations",
            ..
        }
    ));
    assert!(!dir.join("work").exists());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_invalid_annotations() {
    let dir = scratch("badjson").await;
    tokio::fs::write(dir.join("annotations.geojson"), r#"{"type": "Feature"}"#)
        .await
        .unwrap();

    let err = run(&config(&dir)).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidAnnotations(_)));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_empty_selection_writes_no_output() {
    let dir = scratch("empty").await;
    let mut config = config(&dir);
    config.levels = Some("5-7".to_string());

    let err = run(&config).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Composite(CompositeError::EmptySelection { max_levels: 2, .. })
    ));
    assert!(!config.output.exists());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
