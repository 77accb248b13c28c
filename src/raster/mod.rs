//! In-memory pixel buffers.
//!
//! Every pyramid level that is read, composited or written passes through
//! [`PixelBuffer`]: dense, row-major, interleaved samples that never alias
//! file storage. [`BinaryMask`] is the per-level 0/1 plane used for alpha.

mod buffer;
mod resample;

pub use buffer::{BinaryMask, PixelBuffer, PixelLayout, SampleData};
pub use resample::reduce_half;
