//! End-to-end compositing run.
//!
//! ```text
//! validate   inputs exist, slide opens as a pyramid, annotations parse
//! stage 1    slide level 0 -> tissue pyramid (JPEG)
//! stage 2    annotations   -> mask pyramid (Deflate, slide tile size)
//! stage 3    tissue + mask -> RGBA output pyramid
//! cleanup    optional removal of the intermediates
//! ```
//!
//! The level selection is requested through a callback after stage 2, once
//! both level counts are known.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::composite::{compose_to_path, ComposeSummary};
use crate::config::Config;
use crate::error::{FormatError, PipelineError};
use crate::io::LocalFileReader;
use crate::mask::{build_mask_pyramid_to_path, load_annotations, Geometry, MaskSummary};
use crate::slide::{PyramidReader, TiffPyramidReader};
use crate::tissue::{convert_tissue_to_path, TissueSummary};

/// A pyramid opened from a local file.
pub type FilePyramid = TiffPyramidReader<LocalFileReader>;

/// Level counts offered to the level selection callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCounts {
    pub tissue: usize,
    pub mask: usize,
}

impl LevelCounts {
    /// Levels both pyramids have.
    pub fn max_levels(&self) -> usize {
        self.tissue.max(1).min(self.mask.max(1))
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub tissue: TissueSummary,
    pub mask: MaskSummary,
    pub composite: ComposeSummary,
    pub tissue_path: PathBuf,
    pub mask_path: PathBuf,
    pub output_path: PathBuf,
    pub intermediates_removed: bool,
}

/// Open a slide file as a pyramid.
pub async fn open_pyramid(path: &Path) -> Result<FilePyramid, FormatError> {
    let reader = LocalFileReader::open(path).await?;
    TiffPyramidReader::open(reader).await
}

/// Check the inputs before anything is written.
///
/// Returns the opened slide and the parsed annotations.
pub async fn validate_inputs(config: &Config) -> Result<(FilePyramid, Vec<Geometry>), PipelineError> {
    for (kind, path) in [("Slide", &config.slide), ("Annotations", &config.annotations)] {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PipelineError::InputNotFound {
                kind,
                path: path.clone(),
            });
        }
    }

    let slide = open_pyramid(&config.slide)
        .await
        .map_err(|source| PipelineError::InvalidSlide {
            path: config.slide.clone(),
            source,
        })?;

    let geometries = load_annotations(&config.annotations).await?;
    info!(
        path = %config.annotations.display(),
        features = geometries.len(),
        "Loaded annotations"
    );

    Ok((slide, geometries))
}

async fn prepare_temp_dir(dir: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::TempDir(format!("{}: {}", dir.display(), e)))
}

async fn reopen(path: &Path) -> Result<FilePyramid, PipelineError> {
    open_pyramid(path)
        .await
        .map_err(|source| PipelineError::Intermediate {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove the intermediates, and the temp directory when it was not given
/// explicitly and is now empty. Failures are logged only.
async fn remove_intermediates(config: &Config, temp_dir: &Path, paths: [&Path; 2]) -> bool {
    let mut removed = true;
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove intermediate file");
            removed = false;
        }
    }
    if config.temp_dir.is_none() {
        if let Err(e) = tokio::fs::remove_dir(temp_dir).await {
            warn!(path = %temp_dir.display(), error = %e, "Failed to remove temporary directory");
        }
    }
    removed
}

/// Run every stage, asking `select_levels` for the level selection once the
/// level counts are known.
///
/// `select_levels` returns a selection such as `"0-2"`, or `None` for all.
pub async fn run_with<F>(config: &Config, select_levels: F) -> Result<PipelineReport, PipelineError>
where
    F: FnOnce(LevelCounts) -> Option<String>,
{
    let started = Instant::now();
    let (slide, geometries) = validate_inputs(config).await?;

    let temp_dir = config.resolved_temp_dir();
    prepare_temp_dir(&temp_dir).await?;
    let (tissue_path, mask_path) = config.intermediate_paths(&temp_dir);

    // Stage 1
    info!(slide = %config.slide.display(), "Stage 1/3: converting slide to tissue pyramid");
    let stage = Instant::now();
    let tissue = convert_tissue_to_path(&slide, &tissue_path, Some(config.jpeg_quality))
        .await
        .map_err(PipelineError::Tissue)?;
    drop(slide);
    info!(elapsed = ?stage.elapsed(), path = %tissue_path.display(), "Stage 1/3 complete");

    // Stage 2
    info!(features = geometries.len(), "Stage 2/3: building mask pyramid");
    let stage = Instant::now();
    let mask = build_mask_pyramid_to_path(tissue.dimensions, tissue.tile_size, &geometries, &mask_path)?;
    drop(geometries);
    info!(elapsed = ?stage.elapsed(), path = %mask_path.display(), "Stage 2/3 complete");

    // Stage 3
    let tissue_pyramid = reopen(&tissue_path).await?;
    let mask_pyramid = reopen(&mask_path).await?;
    let counts = LevelCounts {
        tissue: tissue_pyramid.level_count(),
        mask: mask_pyramid.level_count(),
    };
    let levels = select_levels(counts);

    info!(output = %config.output.display(), "Stage 3/3: compositing RGBA pyramid");
    let stage = Instant::now();
    let options = config.compose_options(levels);
    let composite = compose_to_path(&tissue_pyramid, &mask_pyramid, &config.output, &options).await?;
    drop(tissue_pyramid);
    drop(mask_pyramid);
    info!(elapsed = ?stage.elapsed(), pages = composite.levels_written.len(), "Stage 3/3 complete");

    let intermediates_removed = if config.keep_intermediates() {
        info!(
            tissue = %tissue_path.display(),
            mask = %mask_path.display(),
            "Keeping intermediate pyramids"
        );
        false
    } else {
        remove_intermediates(config, &temp_dir, [&tissue_path, &mask_path]).await
    };

    info!(elapsed = ?started.elapsed(), output = %config.output.display(), "Done");

    Ok(PipelineReport {
        tissue,
        mask,
        composite,
        tissue_path,
        mask_path,
        output_path: config.output.clone(),
        intermediates_removed,
    })
}

/// Run every stage with the configured level selection.
pub async fn run(config: &Config) -> Result<PipelineReport, PipelineError> {
    let levels = config.levels.clone();
    run_with(config, move |_| levels).await
}
