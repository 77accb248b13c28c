//! Pyramid reading layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   tissue conversion / compositor        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          PyramidReader trait            │
//! │  (level metadata, whole-level reads)    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          TiffPyramidReader<R>           │
//! │  (SVS + generic TIFF over RangeReader)  │
//! └─────────────────────────────────────────┘
//! ```

mod reader;
mod tiff_reader;

pub use reader::{LevelInfo, PyramidReader};
pub use tiff_reader::TiffPyramidReader;
