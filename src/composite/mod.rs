//! Tissue and mask pyramid compositing.
//!
//! - [`selection`]: which levels to process
//! - [`align`]: mask level to a binary plane of the tissue's size
//! - [`alpha`]: tissue color plus mask alpha into RGBA
//! - [`driver`]: streams selected levels into the output pyramid

pub mod align;
pub mod alpha;
pub mod driver;
pub mod selection;

pub use align::{align_mask, DEFAULT_MASK_THRESHOLD};
pub use alpha::composite_rgba;
pub use driver::{
    compose_pyramids, compose_to_path, composite_level, ComposeOptions, ComposeSummary,
    CompositeLevel, DEFAULT_OUTPUT_COMPRESSION,
};
pub use selection::{parse_level_selection, resolve_level_selection, LevelSelection};
