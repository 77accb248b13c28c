//! Container formats and tile codecs.
//!
//! Slides are read as tiled TIFF/BigTIFF pyramids, either Aperio SVS or
//! generic pyramidal TIFF; see [`detect::detect_format`]. Output pyramids are
//! written with [`tiff::PyramidWriter`].

pub mod codec;
pub mod detect;
pub mod jpeg;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use svs::SvsMetadata;
