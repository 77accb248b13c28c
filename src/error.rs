use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading slide or pyramid files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Underlying filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Errors related to format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when reading or writing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading or writing the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF structure
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (supported: none, LZW, Deflate, JPEG)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Sample layout the reader cannot turn into a pixel buffer
    #[error("Unsupported sample layout: {0}")]
    UnsupportedLayout(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// A compressed tile could not be decoded
    #[error("Failed to decode tile {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: CodecError,
    },

    /// A tile could not be compressed
    #[error("Failed to encode tile: {0}")]
    Encode(#[from] CodecError),

    /// Requested pyramid level does not exist
    #[error("Level {level} out of range (pyramid has {count} levels)")]
    LevelOutOfRange { level: usize, count: usize },

    /// The file contains no usable pyramid level
    #[error("No tiled pyramid levels found")]
    NoLevels,

    /// Page pixel data does not match the declared page geometry
    #[error("Invalid page: {0}")]
    InvalidPage(String),
}

impl From<std::io::Error> for TiffError {
    fn from(err: std::io::Error) -> Self {
        TiffError::Io(err.into())
    }
}

/// Errors raised by the tile codecs
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// LZW stream error
    #[error("LZW: {0}")]
    Lzw(String),

    /// zlib/Deflate stream error
    #[error("Deflate: {0}")]
    Deflate(String),

    /// JPEG decoder or encoder error
    #[error("JPEG: {0}")]
    Jpeg(String),

    /// Decoded tile is shorter than the tile geometry requires
    #[error("tile holds {actual} bytes, expected at least {expected}")]
    ShortTile { expected: usize, actual: usize },

    /// Compression scheme has no codec in this crate
    #[error("no codec for {0}")]
    Unsupported(&'static str),
}

/// Malformed level selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// A comma-separated token is neither an index nor an inclusive range
    #[error("Invalid level selection token '{token}': expected an index like '2' or a range like '0-3'")]
    InvalidToken { token: String },
}

/// Errors raised by per-pixel operations (alignment, compositing)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelError {
    /// Channel count the compositor does not accept
    #[error("Unsupported pixel format: {channels} channel(s), expected 1, 3 or 4")]
    UnsupportedPixelFormat { channels: usize },

    /// Tissue and mask dimensions differ
    #[error("Dimension mismatch: tissue is {expected_width}x{expected_height}, mask is {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Sample buffer length disagrees with width, height and channels
    #[error("Buffer size mismatch: expected {expected} samples, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Zero-sized source buffer where pixels are required
    #[error("Empty buffer: cannot resample a {width}x{height} image")]
    EmptyBuffer { width: u32, height: u32 },
}

/// Errors that can occur when loading GeoJSON annotations
#[derive(Debug, Clone, Error)]
pub enum AnnotationError {
    /// Annotation file could not be read
    #[error("Failed to read annotations from {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Annotation file is not valid JSON
    #[error("Invalid GeoJSON: {0}")]
    Json(String),

    /// Top-level document has no `features` array
    #[error("GeoJSON document has no 'features' array")]
    MissingFeatures,

    /// Geometry coordinates are malformed or non-finite
    #[error("Invalid coordinates in feature {feature}: {message}")]
    InvalidCoordinates { feature: usize, message: String },
}

/// Errors that can occur when building the mask pyramid
#[derive(Debug, Clone, Error)]
pub enum MaskError {
    /// Annotations could not be loaded
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// Slide dimensions cannot hold a raster
    #[error("Invalid mask dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pyramid file could not be written
    #[error("Failed to write mask pyramid: {0}")]
    Tiff(#[from] TiffError),
}

/// Failure while processing a single pyramid level
#[derive(Debug, Clone, Error)]
pub enum LevelError {
    /// Tissue level could not be read
    #[error("reading tissue level: {0}")]
    TissueRead(TiffError),

    /// Mask level could not be read
    #[error("reading mask level: {0}")]
    MaskRead(TiffError),

    /// Alignment or compositing failed
    #[error(transparent)]
    Pixel(#[from] PixelError),

    /// Output page could not be written
    #[error("writing output page: {0}")]
    Write(TiffError),
}

/// Errors that can occur when compositing two pyramids
#[derive(Debug, Clone, Error)]
pub enum CompositeError {
    /// Level selection is malformed
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Level selection resolved to no levels
    #[error("Level selection '{spec}' matches none of the {max_levels} available levels")]
    EmptySelection { spec: String, max_levels: usize },

    /// A level failed; processing was aborted
    #[error("Failed to process level {level}: {source}")]
    Level {
        level: usize,
        #[source]
        source: LevelError,
    },

    /// Output file could not be created or finalized
    #[error("Output pyramid error: {0}")]
    Tiff(#[from] TiffError),
}

/// Errors reported by the end-to-end pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input file does not exist
    #[error("{kind} not found: {}", path.display())]
    InputNotFound { kind: &'static str, path: PathBuf },

    /// Slide could not be opened as a pyramid
    #[error("Cannot open slide {}: {source}", path.display())]
    InvalidSlide {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    /// Annotation file could not be parsed
    #[error(transparent)]
    InvalidAnnotations(#[from] AnnotationError),

    /// Temporary directory could not be prepared
    #[error("Temporary directory error: {0}")]
    TempDir(String),

    /// Tissue conversion stage failed
    #[error("Tissue conversion failed: {0}")]
    Tissue(#[source] TiffError),

    /// Mask generation stage failed
    #[error("Mask generation failed: {0}")]
    Mask(#[from] MaskError),

    /// An intermediate pyramid could not be read back
    #[error("Cannot read intermediate pyramid {}: {source}", path.display())]
    Intermediate {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    /// Compositing stage failed
    #[error("Compositing failed: {0}")]
    Composite(#[from] CompositeError),
}
