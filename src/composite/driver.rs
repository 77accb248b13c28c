//! Level-by-level composition of a tissue pyramid with a mask pyramid.
//!
//! ```text
//! inspect   level counts, max_levels = min(tissue, mask)
//! select    resolve the level selection (fails before any output exists)
//! stream    for each selected level, ascending:
//!             read tissue -> read mask -> align -> composite -> write page
//! finalize  flush the writer
//! ```
//!
//! Only one level's tissue, mask and composite buffers are alive at a time.

use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{CompositeError, LevelError};
use crate::format::tiff::{Compression, PageOptions, PyramidWriter, SubfileKind};
use crate::pyramid::DEFAULT_TILE_SIZE;
use crate::raster::PixelBuffer;
use crate::slide::PyramidReader;

use super::align::{align_mask, DEFAULT_MASK_THRESHOLD};
use super::alpha::composite_rgba;
use super::selection::{resolve_level_selection, LevelSelection};

/// Compression of output pages unless configured otherwise.
pub const DEFAULT_OUTPUT_COMPRESSION: Compression = Compression::Lzw;

/// Settings for a composition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Level selection such as "0-2,4"; `None` or blank selects every level
    pub levels: Option<String>,

    /// Output compression (none, LZW or Deflate)
    pub compression: Compression,

    /// Mask samples above this are inside
    pub mask_threshold: u32,

    /// Output tile edge; the tissue's native tile size when `None`
    pub tile_size: Option<u32>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            levels: None,
            compression: DEFAULT_OUTPUT_COMPRESSION,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            tile_size: None,
        }
    }
}

/// One composited output page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeLevel {
    /// RGBA pixels
    pub image: PixelBuffer,

    /// Source level both pyramids were read at
    pub level: usize,

    /// Position of this page in the output file
    pub page_index: usize,

    pub subfile: SubfileKind,
}

/// What a composition run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSummary {
    pub tissue_levels: usize,
    pub mask_levels: usize,
    pub max_levels: usize,

    /// Source levels written, in page order
    pub levels_written: Vec<usize>,
}

/// Levels to process and the output tile size, decided before writing.
struct Plan {
    tissue_levels: usize,
    mask_levels: usize,
    max_levels: usize,
    selection: LevelSelection,
    tile_size: u32,
}

fn plan<T, M>(tissue: &T, mask: &M, options: &ComposeOptions) -> Result<Plan, CompositeError>
where
    T: PyramidReader + ?Sized,
    M: PyramidReader + ?Sized,
{
    // A reader that reports no levels still has its base image
    let tissue_levels = tissue.level_count().max(1);
    let mask_levels = mask.level_count().max(1);
    let max_levels = tissue_levels.min(mask_levels);

    if tissue_levels != mask_levels {
        warn!(
            tissue_levels,
            mask_levels,
            max_levels,
            "Tissue and mask pyramids have different level counts, processing common levels only"
        );
    }

    let selection = resolve_level_selection(options.levels.as_deref(), max_levels)?;
    if selection.is_empty() {
        return Err(CompositeError::EmptySelection {
            spec: options.levels.clone().unwrap_or_default(),
            max_levels,
        });
    }

    let tile_size = options
        .tile_size
        .or_else(|| tissue.native_tile_size())
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_TILE_SIZE);

    Ok(Plan {
        tissue_levels,
        mask_levels,
        max_levels,
        selection,
        tile_size,
    })
}

/// Read, align and composite a single level.
pub async fn composite_level<T, M>(
    tissue: &T,
    mask: &M,
    level: usize,
    page_index: usize,
    threshold: u32,
) -> Result<CompositeLevel, LevelError>
where
    T: PyramidReader + ?Sized,
    M: PyramidReader + ?Sized,
{
    let tissue_image = tissue.read_level(level).await.map_err(LevelError::TissueRead)?;
    let (width, height) = tissue_image.dimensions();

    let binary = {
        let mask_image = mask.read_level(level).await.map_err(LevelError::MaskRead)?;
        if mask_image.dimensions() != (width, height) {
            debug!(
                level,
                mask_width = mask_image.width(),
                mask_height = mask_image.height(),
                width,
                height,
                "Resampling mask level to tissue size"
            );
        }
        align_mask(&mask_image, height, width, threshold)?
    };

    let image = composite_rgba(&tissue_image, &binary)?;
    let subfile = if page_index == 0 {
        SubfileKind::Primary
    } else {
        SubfileKind::Reduced
    };

    Ok(CompositeLevel {
        image,
        level,
        page_index,
        subfile,
    })
}

async fn stream_levels<T, M, W>(
    tissue: &T,
    mask: &M,
    writer: &mut PyramidWriter<W>,
    plan: &Plan,
    options: &ComposeOptions,
) -> Result<Vec<usize>, CompositeError>
where
    T: PyramidReader + ?Sized,
    M: PyramidReader + ?Sized,
    W: Write + Seek,
{
    let mut written = Vec::with_capacity(plan.selection.len());

    for (page_index, level) in plan.selection.iter().enumerate() {
        let composite = composite_level(tissue, mask, level, page_index, options.mask_threshold)
            .await
            .map_err(|source| CompositeError::Level { level, source })?;

        let page = PageOptions::new(plan.tile_size, options.compression).with_subfile(composite.subfile);
        writer
            .write_page(&composite.image, &page)
            .map_err(|e| CompositeError::Level {
                level,
                source: LevelError::Write(e),
            })?;

        info!(
            level,
            page = page_index,
            width = composite.image.width(),
            height = composite.image.height(),
            "Composited level"
        );
        written.push(level);
    }

    Ok(written)
}

/// Composite two pyramids into `writer` and finalize it.
///
/// Returns the run summary and the flushed output stream.
pub async fn compose_pyramids<T, M, W>(
    tissue: &T,
    mask: &M,
    mut writer: PyramidWriter<W>,
    options: &ComposeOptions,
) -> Result<(ComposeSummary, W), CompositeError>
where
    T: PyramidReader + ?Sized,
    M: PyramidReader + ?Sized,
    W: Write + Seek,
{
    let plan = plan(tissue, mask, options)?;
    info!(levels = %plan.selection, max_levels = plan.max_levels, "Selected levels");

    let levels_written = stream_levels(tissue, mask, &mut writer, &plan, options).await?;
    let output = writer.finish()?;

    Ok((
        ComposeSummary {
            tissue_levels: plan.tissue_levels,
            mask_levels: plan.mask_levels,
            max_levels: plan.max_levels,
            levels_written,
        },
        output,
    ))
}

/// Composite two pyramids into a new BigTIFF at `path`.
///
/// The selection is validated before the output file is created.
pub async fn compose_to_path<T, M>(
    tissue: &T,
    mask: &M,
    path: impl AsRef<Path>,
    options: &ComposeOptions,
) -> Result<ComposeSummary, CompositeError>
where
    T: PyramidReader + ?Sized,
    M: PyramidReader + ?Sized,
{
    let path = path.as_ref();
    let plan = plan(tissue, mask, options)?;
    info!(levels = %plan.selection, max_levels = plan.max_levels, "Selected levels");

    let mut writer = PyramidWriter::create(path)?.with_software(crate::SOFTWARE);
    let levels_written = stream_levels(tissue, mask, &mut writer, &plan, options).await?;
    writer.finish()?;

    info!(
        path = %path.display(),
        pages = levels_written.len(),
        compression = options.compression.name(),
        "Wrote composite pyramid"
    );

    Ok(ComposeSummary {
        tissue_levels: plan.tissue_levels,
        mask_levels: plan.mask_levels,
        max_levels: plan.max_levels,
        levels_written,
    })
}
