//! Tiled BigTIFF pyramid writer.
//!
//! Pages are appended one at a time: tile data first, then the tag values that
//! do not fit inline, then the IFD itself. After each IFD is written the
//! previous next-IFD pointer (or the header's first-IFD pointer) is patched to
//! point at it, so the file is a valid TIFF after every completed page.
//!
//! ```text
//! 0      header  "II" 43 8 0 <first IFD offset>
//! 16     page 0 tiles ... page 0 tag values ... page 0 IFD
//!        page 1 tiles ... page 1 tag values ... page 1 IFD
//! ```
//!
//! Output is always little-endian BigTIFF.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use super::parser::BIGTIFF_HEADER_SIZE;
use super::tags::{
    Compression, FieldType, TiffTag, EXTRA_SAMPLE_ASSOCIATED_ALPHA, PHOTOMETRIC_MIN_IS_BLACK,
    PHOTOMETRIC_RGB, PHOTOMETRIC_YCBCR, PLANAR_CHUNKY, SAMPLE_FORMAT_UINT, SUBFILE_REDUCED_IMAGE,
};
use crate::error::TiffError;
use crate::format::codec;
use crate::raster::PixelBuffer;

/// TIFF requires tile edges to be multiples of 16.
pub const TILE_ALIGNMENT: u32 = 16;

/// Byte offset of the first-IFD pointer in a BigTIFF header.
const FIRST_IFD_POINTER: u64 = 8;

/// Round a requested tile edge up to a valid TIFF tile edge.
pub fn align_tile_size(size: u32) -> u32 {
    let size = size.max(1);
    size.div_ceil(TILE_ALIGNMENT) * TILE_ALIGNMENT
}

// =============================================================================
// Page Options
// =============================================================================

/// Role of a page within the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubfileKind {
    /// Full-resolution page (NewSubfileType 0)
    Primary,
    /// Reduced-resolution page (NewSubfileType 1)
    Reduced,
}

impl SubfileKind {
    pub const fn tag_value(self) -> u32 {
        match self {
            SubfileKind::Primary => 0,
            SubfileKind::Reduced => SUBFILE_REDUCED_IMAGE,
        }
    }
}

/// How a single page is laid out and compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: Compression,
    pub jpeg_quality: u8,
    pub subfile: SubfileKind,
}

impl PageOptions {
    /// Square tiles of `tile_size` (rounded up to a multiple of 16).
    pub fn new(tile_size: u32, compression: Compression) -> Self {
        let edge = align_tile_size(tile_size);
        Self {
            tile_width: edge,
            tile_height: edge,
            compression,
            jpeg_quality: codec::DEFAULT_JPEG_QUALITY,
            subfile: SubfileKind::Primary,
        }
    }

    pub fn with_subfile(mut self, subfile: SubfileKind) -> Self {
        self.subfile = subfile;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = codec::clamp_quality(quality);
        self
    }
}

// =============================================================================
// IFD Assembly
// =============================================================================

/// A tag ready to be serialized: values already in little-endian bytes.
struct TagValue {
    tag: u16,
    field_type: FieldType,
    count: u64,
    bytes: Vec<u8>,
}

impl TagValue {
    fn shorts(tag: TiffTag, values: &[u16]) -> Self {
        Self {
            tag: tag.as_u16(),
            field_type: FieldType::Short,
            count: values.len() as u64,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: TiffTag, value: u32) -> Self {
        Self {
            tag: tag.as_u16(),
            field_type: FieldType::Long,
            count: 1,
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    fn long8s(tag: TiffTag, values: &[u64]) -> Self {
        Self {
            tag: tag.as_u16(),
            field_type: FieldType::Long8,
            count: values.len() as u64,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: TiffTag, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        Self {
            tag: tag.as_u16(),
            field_type: FieldType::Ascii,
            count: bytes.len() as u64,
            bytes,
        }
    }

    fn is_inline(&self) -> bool {
        self.bytes.len() <= FieldType::INLINE_THRESHOLD_BIGTIFF
    }
}

// =============================================================================
// PyramidWriter
// =============================================================================

/// Streams pyramid pages into a BigTIFF container.
pub struct PyramidWriter<W: Write + Seek> {
    out: W,
    position: u64,
    next_ifd_pointer: u64,
    pages_written: usize,
    software: Option<String>,
}

impl PyramidWriter<BufWriter<File>> {
    /// Create (or truncate) a BigTIFF file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TiffError> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Seek> PyramidWriter<W> {
    /// Start a BigTIFF stream on `out`, writing the header immediately.
    pub fn new(mut out: W) -> Result<Self, TiffError> {
        out.seek(SeekFrom::Start(0))?;
        let mut header = Vec::with_capacity(BIGTIFF_HEADER_SIZE);
        header.extend_from_slice(b"II");
        header.extend_from_slice(&43u16.to_le_bytes());
        header.extend_from_slice(&8u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        out.write_all(&header)?;

        Ok(Self {
            out,
            position: BIGTIFF_HEADER_SIZE as u64,
            next_ifd_pointer: FIRST_IFD_POINTER,
            pages_written: 0,
            software: None,
        })
    }

    /// Record a Software tag on every page.
    pub fn with_software(mut self, software: impl Into<String>) -> Self {
        self.software = Some(software.into());
        self
    }

    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Append one tiled page.
    pub fn write_page(&mut self, image: &PixelBuffer, options: &PageOptions) -> Result<(), TiffError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TiffError::InvalidPage(format!(
                "cannot write an empty {}x{} page",
                width, height
            )));
        }
        let (tile_w, tile_h) = (options.tile_width, options.tile_height);
        if tile_w == 0 || tile_h == 0 || tile_w % TILE_ALIGNMENT != 0 || tile_h % TILE_ALIGNMENT != 0 {
            return Err(TiffError::InvalidPage(format!(
                "tile size {}x{} is not a multiple of {}",
                options.tile_width, options.tile_height, TILE_ALIGNMENT
            )));
        }
        if options.compression == Compression::Jpeg
            && (image.bits_per_sample() != 8 || image.layout().has_alpha())
        {
            return Err(TiffError::InvalidPage(format!(
                "JPEG pages need 8-bit gray or RGB pixels, got {}-bit {:?}",
                image.bits_per_sample(),
                image.layout()
            )));
        }

        let (offsets, byte_counts) = self.write_tiles(image, options)?;
        let tags = self.page_tags(image, options, offsets, byte_counts);
        let ifd_offset = self.write_ifd(tags)?;

        debug!(
            page = self.pages_written,
            width,
            height,
            compression = options.compression.name(),
            ifd_offset,
            "Wrote pyramid page"
        );
        self.pages_written += 1;
        Ok(())
    }

    /// Flush and return the underlying stream.
    pub fn finish(mut self) -> Result<W, TiffError> {
        if self.pages_written == 0 {
            return Err(TiffError::NoLevels);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_tiles(
        &mut self,
        image: &PixelBuffer,
        options: &PageOptions,
    ) -> Result<(Vec<u64>, Vec<u64>), TiffError> {
        let (width, height) = image.dimensions();
        let (tile_w, tile_h) = (options.tile_width, options.tile_height);
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let bytes_per_sample = (image.bits_per_sample() / 8) as usize;
        let pixel_bytes = image.channels() * bytes_per_sample;
        let row_bytes = width as usize * pixel_bytes;
        let tile_row_bytes = tile_w as usize * pixel_bytes;
        let source = image.to_le_bytes();

        let mut offsets = Vec::with_capacity((tiles_x * tiles_y) as usize);
        let mut byte_counts = Vec::with_capacity(offsets.capacity());
        let mut tile = vec![0u8; tile_row_bytes * tile_h as usize];

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                tile.fill(0);
                let x0 = (tx * tile_w) as usize;
                let y0 = ty * tile_h;
                let copy_w = (width - tx * tile_w).min(tile_w) as usize * pixel_bytes;
                let copy_h = (height - y0).min(tile_h);

                for row in 0..copy_h {
                    let src_start = (y0 + row) as usize * row_bytes + x0 * pixel_bytes;
                    let dst_start = row as usize * tile_row_bytes;
                    tile[dst_start..dst_start + copy_w]
                        .copy_from_slice(&source[src_start..src_start + copy_w]);
                }

                let encoded = match options.compression {
                    Compression::Jpeg => codec::encode_jpeg(
                        &tile,
                        tile_w,
                        tile_h,
                        image.layout(),
                        options.jpeg_quality,
                    )?,
                    other => codec::compress(&tile, other)?,
                };

                offsets.push(self.position);
                byte_counts.push(encoded.len() as u64);
                self.append(&encoded)?;
            }
        }

        Ok((offsets, byte_counts))
    }

    fn page_tags(
        &self,
        image: &PixelBuffer,
        options: &PageOptions,
        offsets: Vec<u64>,
        byte_counts: Vec<u64>,
    ) -> Vec<TagValue> {
        let layout = image.layout();
        let channels = layout.channels();
        let bits = image.bits_per_sample();
        // JFIF streams from the encoder carry YCbCr at 1x1 sampling
        let ycbcr = options.compression == Compression::Jpeg && !layout.is_gray();
        let photometric = if layout.is_gray() {
            PHOTOMETRIC_MIN_IS_BLACK
        } else if ycbcr {
            PHOTOMETRIC_YCBCR
        } else {
            PHOTOMETRIC_RGB
        };

        let mut tags = vec![
            TagValue::long(TiffTag::NewSubfileType, options.subfile.tag_value()),
            TagValue::long(TiffTag::ImageWidth, image.width()),
            TagValue::long(TiffTag::ImageLength, image.height()),
            TagValue::shorts(TiffTag::BitsPerSample, &vec![bits; channels]),
            TagValue::shorts(TiffTag::Compression, &[options.compression as u16]),
            TagValue::shorts(TiffTag::PhotometricInterpretation, &[photometric]),
            TagValue::shorts(TiffTag::SamplesPerPixel, &[channels as u16]),
            TagValue::shorts(TiffTag::PlanarConfiguration, &[PLANAR_CHUNKY]),
            TagValue::long(TiffTag::TileWidth, options.tile_width),
            TagValue::long(TiffTag::TileLength, options.tile_height),
            TagValue::long8s(TiffTag::TileOffsets, &offsets),
            TagValue::long8s(TiffTag::TileByteCounts, &byte_counts),
            TagValue::shorts(TiffTag::SampleFormat, &vec![SAMPLE_FORMAT_UINT; channels]),
        ];
        if ycbcr {
            tags.push(TagValue::shorts(TiffTag::YCbCrSubSampling, &[1, 1]));
        }
        if layout.has_alpha() {
            tags.push(TagValue::shorts(
                TiffTag::ExtraSamples,
                &[EXTRA_SAMPLE_ASSOCIATED_ALPHA],
            ));
        }
        if let Some(software) = &self.software {
            tags.push(TagValue::ascii(TiffTag::Software, software));
        }

        tags.sort_by_key(|t| t.tag);
        tags
    }

    /// Write out-of-line values, then the IFD, then link it into the chain.
    fn write_ifd(&mut self, tags: Vec<TagValue>) -> Result<u64, TiffError> {
        let mut value_offsets = Vec::with_capacity(tags.len());
        for tag in &tags {
            if tag.is_inline() {
                value_offsets.push(None);
            } else {
                self.pad_to_word()?;
                value_offsets.push(Some(self.position));
                self.append(&tag.bytes)?;
            }
        }

        self.pad_to_word()?;
        let ifd_offset = self.position;

        let mut ifd = Vec::with_capacity(8 + tags.len() * 20 + 8);
        ifd.extend_from_slice(&(tags.len() as u64).to_le_bytes());
        for (tag, offset) in tags.iter().zip(&value_offsets) {
            ifd.extend_from_slice(&tag.tag.to_le_bytes());
            ifd.extend_from_slice(&(tag.field_type as u16).to_le_bytes());
            ifd.extend_from_slice(&tag.count.to_le_bytes());
            let mut field = [0u8; 8];
            match offset {
                Some(offset) => field.copy_from_slice(&offset.to_le_bytes()),
                None => field[..tag.bytes.len()].copy_from_slice(&tag.bytes),
            }
            ifd.extend_from_slice(&field);
        }
        let next_pointer = ifd_offset + ifd.len() as u64;
        ifd.extend_from_slice(&0u64.to_le_bytes());
        self.append(&ifd)?;

        self.out.seek(SeekFrom::Start(self.next_ifd_pointer))?;
        self.out.write_all(&ifd_offset.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(self.position))?;
        self.next_ifd_pointer = next_pointer;

        Ok(ifd_offset)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), TiffError> {
        self.out.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Pad to an 8-byte boundary so offsets stay word aligned.
    fn pad_to_word(&mut self) -> Result<(), TiffError> {
        let padding = (8 - self.position % 8) % 8;
        if padding > 0 {
            self.append(&[0u8; 8][..padding as usize])?;
        }
        Ok(())
    }
}
