//! TIFF and BigTIFF reading and writing.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both; the writer always
//!   produces BigTIFF.
//!
//! - **IFD (Image File Directory)**: Contains metadata and pointers to image data.
//!   Slide files have one IFD per pyramid level plus associated images.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;
mod writer;

pub use parser::{
    ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, MAX_IFD_ENTRIES, TIFF_HEADER_SIZE,
};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{
    Compression, FieldType, TiffTag, EXTRA_SAMPLE_ASSOCIATED_ALPHA, PHOTOMETRIC_MIN_IS_BLACK,
    PHOTOMETRIC_RGB, PHOTOMETRIC_YCBCR, PLANAR_CHUNKY, PREDICTOR_HORIZONTAL, SAMPLE_FORMAT_UINT,
    SUBFILE_REDUCED_IMAGE, SUBFILE_TRANSPARENCY_MASK,
};
pub use validation::{validate_level, validate_pyramid, TileEncoding};
pub use values::ValueReader;
pub use writer::{align_tile_size, PageOptions, PyramidWriter, SubfileKind, TILE_ALIGNMENT};
