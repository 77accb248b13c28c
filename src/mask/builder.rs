//! Mask pyramid generation from annotation geometry.
//!
//! The exterior ring of every polygon is filled with 255 on a full-resolution
//! single-channel raster, which is then exported as a Deflate-compressed
//! pyramid with the slide's tile size.

use std::io::{Seek, Write};
use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::{debug, info, warn};

use crate::error::{AnnotationError, MaskError};
use crate::format::tiff::{Compression, PyramidWriter};
use crate::pyramid::{write_pyramid, PyramidOptions};
use crate::raster::{PixelBuffer, PixelLayout, SampleData};

use super::annotation::{Geometry, Ring};

/// Raster value of pixels inside an annotation.
pub const MASK_VALUE: u8 = 255;

/// Compression of mask pyramids.
pub const MASK_COMPRESSION: Compression = Compression::Deflate;

/// What a mask build did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSummary {
    pub dimensions: (u32, u32),
    pub tile_size: u32,

    /// Exterior rings drawn
    pub rings_drawn: usize,

    /// Geometries that are neither polygons nor multipolygons
    pub geometries_skipped: usize,

    pub levels_written: usize,
}

/// Reject non-finite coordinates and warn about geometry off the slide.
fn check_geometries(geometries: &[Geometry], width: u32, height: u32) -> Result<(), AnnotationError> {
    for (feature, geometry) in geometries.iter().enumerate() {
        let non_finite = geometry
            .exterior_rings()
            .into_iter()
            .flatten()
            .find(|(x, y)| !x.is_finite() || !y.is_finite());
        if let Some((x, y)) = non_finite {
            return Err(AnnotationError::InvalidCoordinates {
                feature,
                message: format!("non-finite position ({}, {})", x, y),
            });
        }

        if let Some((min_x, min_y, max_x, max_y)) = geometry.bounds() {
            let outside = max_x < 0.0 || max_y < 0.0 || min_x >= width as f64 || min_y >= height as f64;
            if outside {
                warn!(
                    feature,
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                    width,
                    height,
                    "Annotation lies entirely outside the slide; coordinates may not be level-0 pixels (e.g. micrometres)"
                );
            }
        }
    }
    Ok(())
}

/// Integer polygon for a ring, without the closing position.
///
/// Coordinates are truncated toward zero.
fn ring_points(ring: &Ring) -> Vec<Point<i32>> {
    let mut points: Vec<Point<i32>> = ring
        .iter()
        .map(|&(x, y)| Point::new(x as i32, y as i32))
        .collect();
    if let Some(&first) = points.first() {
        while points.len() > 1 && points.last() == Some(&first) {
            points.pop();
        }
    }
    points
}

fn fill_ring(raster: &mut GrayImage, ring: &Ring) {
    let points = ring_points(ring);
    match points.as_slice() {
        [] => {}
        [point] => {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < raster.width()
                && (point.y as u32) < raster.height()
            {
                raster.put_pixel(point.x as u32, point.y as u32, Luma([MASK_VALUE]));
            }
        }
        _ => draw_polygon_mut(raster, &points, Luma([MASK_VALUE])),
    }
}

/// Rasterize geometry onto a `width` x `height` plane of 0/255.
///
/// Returns the raster and the number of rings drawn and geometries skipped.
pub fn rasterize_mask(
    width: u32,
    height: u32,
    geometries: &[Geometry],
) -> Result<(PixelBuffer, usize, usize), MaskError> {
    if width == 0 || height == 0 {
        return Err(MaskError::InvalidDimensions { width, height });
    }
    check_geometries(geometries, width, height)?;

    let mut raster = GrayImage::new(width, height);
    let mut rings_drawn = 0;
    let mut skipped = 0;

    for geometry in geometries {
        if let Geometry::Other(kind) = geometry {
            debug!(kind = kind.as_str(), "Skipping non-polygon annotation");
            skipped += 1;
            continue;
        }
        for ring in geometry.exterior_rings() {
            fill_ring(&mut raster, ring);
            rings_drawn += 1;
        }
    }

    let buffer = PixelBuffer::from_parts(
        width,
        height,
        PixelLayout::Gray,
        SampleData::U8(raster.into_raw()),
    );
    Ok((buffer, rings_drawn, skipped))
}

/// Rasterize geometry and write it as a mask pyramid.
pub fn build_mask_pyramid<W: Write + Seek>(
    dimensions: (u32, u32),
    tile_size: u32,
    geometries: &[Geometry],
    writer: &mut PyramidWriter<W>,
) -> Result<MaskSummary, MaskError> {
    let (width, height) = dimensions;
    let (raster, rings_drawn, geometries_skipped) = rasterize_mask(width, height, geometries)?;

    let options = PyramidOptions::new(tile_size, MASK_COMPRESSION);
    let levels_written = write_pyramid(writer, raster, &options)?;

    Ok(MaskSummary {
        dimensions,
        tile_size,
        rings_drawn,
        geometries_skipped,
        levels_written,
    })
}

/// Build a mask pyramid file at `path`.
///
/// Geometry is validated before the file is created.
pub fn build_mask_pyramid_to_path(
    dimensions: (u32, u32),
    tile_size: u32,
    geometries: &[Geometry],
    path: impl AsRef<Path>,
) -> Result<MaskSummary, MaskError> {
    let path = path.as_ref();
    let (width, height) = dimensions;
    let (raster, rings_drawn, geometries_skipped) = rasterize_mask(width, height, geometries)?;

    let mut writer = PyramidWriter::create(path)?.with_software(crate::SOFTWARE);
    let levels_written = write_pyramid(
        &mut writer,
        raster,
        &PyramidOptions::new(tile_size, MASK_COMPRESSION),
    )?;
    writer.finish()?;

    info!(
        path = %path.display(),
        width,
        height,
        tile_size,
        rings = rings_drawn,
        skipped = geometries_skipped,
        levels = levels_written,
        "Wrote mask pyramid"
    );

    Ok(MaskSummary {
        dimensions,
        tile_size,
        rings_drawn,
        geometries_skipped,
        levels_written,
    })
}
