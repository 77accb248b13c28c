//! Annotation masks.
//!
//! GeoJSON polygons are rasterized at full slide resolution and written as a
//! single-channel pyramid that the compositor later reads like any slide.

pub mod annotation;
pub mod builder;

pub use annotation::{load_annotations, parse_annotations, Geometry, Ring};
pub use builder::{
    build_mask_pyramid, build_mask_pyramid_to_path, rasterize_mask, MaskSummary,
    MASK_COMPRESSION, MASK_VALUE,
};
