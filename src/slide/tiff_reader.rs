//! Pyramid reader for tiled TIFF, BigTIFF and Aperio SVS files.
//!
//! Opening a file parses every IFD, keeps the pyramid levels, loads their
//! tile offset arrays and checks that their tiles can be decoded. Pixels are
//! read later, one whole level per call, by decoding every tile and copying
//! its visible region into a level-sized buffer.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{CodecError, FormatError, TiffError};
use crate::format::codec::{decode_jpeg, decompress, undo_horizontal_predictor};
use crate::format::jpeg::prepare_tile_jpeg;
use crate::format::tiff::{
    validate_level, validate_pyramid, ByteOrder, Compression, PyramidLevel, TiffPyramid,
    TiffTag, TileData, TileEncoding, ValueReader,
};
use crate::format::{detect_format, SlideFormat, SvsMetadata};
use crate::io::RangeReader;
use crate::raster::{PixelBuffer, PixelLayout, SampleData};

use super::reader::{LevelInfo, PyramidReader};

/// A pyramid level with everything needed to decode its tiles.
#[derive(Debug, Clone)]
struct LevelData {
    level: PyramidLevel,
    tile_data: TileData,
    encoding: TileEncoding,
}

/// Decoded samples of one tile, `width` samples per row.
struct DecodedTile {
    width: u32,
    height: u32,
    data: SampleData,
}

/// [`PyramidReader`] over any tiled TIFF the format layer understands.
pub struct TiffPyramidReader<R: RangeReader> {
    reader: R,
    format: SlideFormat,
    byte_order: ByteOrder,
    levels: Vec<LevelData>,
    metadata: Option<SvsMetadata>,
}

impl<R: RangeReader> TiffPyramidReader<R> {
    /// Open a pyramid, detecting its format and validating every level.
    pub async fn open(reader: R) -> Result<Self, FormatError> {
        let format = detect_format(&reader).await?;
        let pyramid = TiffPyramid::parse(&reader).await?;
        validate_pyramid(&pyramid)?;

        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let tile_data = TileData::load(&reader, level, &pyramid.header).await?;
            let encoding = validate_level(level, &tile_data)?;
            levels.push(LevelData {
                level: level.clone(),
                tile_data,
                encoding,
            });
        }

        let metadata = match format {
            SlideFormat::AperioSvs => Self::read_svs_metadata(&reader, &pyramid).await,
            SlideFormat::GenericTiff => None,
        };

        let this = Self {
            byte_order: pyramid.header.byte_order,
            reader,
            format,
            levels,
            metadata,
        };

        info!(
            source = this.reader.identifier(),
            format = format.name(),
            levels = this.levels.len(),
            dimensions = ?this.dimensions(),
            mpp = ?this.metadata.as_ref().and_then(|m| m.mpp),
            "Opened pyramid"
        );
        Ok(this)
    }

    /// Metadata is informational; a missing or unreadable description is not an error.
    async fn read_svs_metadata(reader: &R, pyramid: &TiffPyramid) -> Option<SvsMetadata> {
        let entry = pyramid
            .base_level()?
            .ifd
            .get_entry_by_tag(TiffTag::ImageDescription)?;
        let description = ValueReader::new(reader, &pyramid.header)
            .read_string(entry)
            .await
            .ok()?;
        Some(SvsMetadata::parse(&description))
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    /// SVS metadata, present for Aperio files only.
    pub fn metadata(&self) -> Option<&SvsMetadata> {
        self.metadata.as_ref()
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    /// Read and decode a single tile.
    async fn read_tile(&self, data: &LevelData, tile_x: u32, tile_y: u32) -> Result<Option<DecodedTile>, TiffError> {
        let level = &data.level;
        let index = level
            .tile_index(tile_x, tile_y)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!("tile ({}, {}) outside level grid", tile_x, tile_y),
            })?;
        let (offset, length) = data
            .tile_data
            .get_tile_location(index)
            .ok_or(TiffError::MissingTag("TileOffsets"))?;

        // Sparse tiles have no data and read as zeros
        if length == 0 {
            return Ok(None);
        }
        let length = usize::try_from(length).map_err(|_| TiffError::InvalidTagValue {
            tag: "TileByteCounts",
            message: format!("tile {} claims {} bytes", index, length),
        })?;
        let raw = self.reader.read_exact_at(offset, length).await?;

        let decoded = decode_tile(
            &raw,
            data.encoding,
            data.tile_data.jpeg_tables.as_deref(),
            level,
            self.byte_order,
        )
        .map_err(|source| TiffError::Decode {
            index: index as usize,
            source,
        })?;
        Ok(Some(decoded))
    }
}

#[async_trait]
impl<R: RangeReader> PyramidReader for TiffPyramidReader<R> {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_info(&self, level: usize) -> Option<LevelInfo> {
        let data = self.levels.get(level)?;
        Some(LevelInfo {
            width: data.level.width,
            height: data.level.height,
            channels: data.encoding.channels,
            bits_per_sample: data.encoding.bits_per_sample,
            tile_width: data.level.tile_width,
            tile_height: data.level.tile_height,
            downsample: data.level.downsample,
        })
    }

    async fn read_level(&self, level: usize) -> Result<PixelBuffer, TiffError> {
        let data = self.levels.get(level).ok_or(TiffError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })?;
        let layout = PixelLayout::from_channels(data.encoding.channels)
            .map_err(|e| TiffError::UnsupportedLayout(e.to_string()))?;
        let lvl = &data.level;

        debug!(
            source = self.reader.identifier(),
            level,
            width = lvl.width,
            height = lvl.height,
            tiles = lvl.tile_count,
            compression = data.encoding.compression.name(),
            "Reading pyramid level"
        );

        let mut image =
            PixelBuffer::zeroed_with_depth(lvl.width, lvl.height, layout, data.encoding.bits_per_sample);
        for tile_y in 0..lvl.tiles_y {
            for tile_x in 0..lvl.tiles_x {
                let Some(tile) = self.read_tile(data, tile_x, tile_y).await? else {
                    continue;
                };
                blit_tile(&mut image, &tile, tile_x * lvl.tile_width, tile_y * lvl.tile_height);
            }
        }

        Ok(image)
    }
}

/// Decode one compressed tile into samples of the level's depth.
fn decode_tile(
    raw: &[u8],
    encoding: TileEncoding,
    jpeg_tables: Option<&[u8]>,
    level: &PyramidLevel,
    byte_order: ByteOrder,
) -> Result<DecodedTile, CodecError> {
    if encoding.compression == Compression::Jpeg {
        let stream = prepare_tile_jpeg(jpeg_tables, raw);
        let decoded = decode_jpeg(&stream)?;
        if decoded.channels != encoding.channels {
            return Err(CodecError::Jpeg(format!(
                "decoded {} channels, level declares {}",
                decoded.channels, encoding.channels
            )));
        }
        return Ok(DecodedTile {
            width: decoded.width,
            height: decoded.height,
            data: SampleData::U8(decoded.samples),
        });
    }

    let mut bytes = decompress(raw, encoding.compression)?;
    let bytes_per_sample = encoding.bits_per_sample as usize / 8;
    let (width, height) = (level.tile_width, level.tile_height);
    let expected = width as usize * height as usize * encoding.channels * bytes_per_sample;
    if bytes.len() < expected {
        return Err(CodecError::ShortTile {
            expected,
            actual: bytes.len(),
        });
    }
    bytes.truncate(expected);

    if encoding.horizontal_predictor {
        undo_horizontal_predictor(
            &mut bytes,
            width as usize,
            encoding.channels,
            encoding.bits_per_sample,
            byte_order,
        );
    }

    let data = match encoding.bits_per_sample {
        16 => SampleData::U16(
            bytes
                .chunks_exact(2)
                .map(|pair| byte_order.read_u16(pair))
                .collect(),
        ),
        _ => SampleData::U8(bytes),
    };
    Ok(DecodedTile {
        width,
        height,
        data,
    })
}

/// Copy the part of a tile that lies inside the image.
fn blit_tile(image: &mut PixelBuffer, tile: &DecodedTile, x0: u32, y0: u32) {
    let channels = image.channels();
    let image_width = image.width() as usize;
    let copy_w = tile.width.min(image.width().saturating_sub(x0)) as usize;
    let copy_h = tile.height.min(image.height().saturating_sub(y0)) as usize;
    if copy_w == 0 || copy_h == 0 {
        return;
    }

    let row_len = copy_w * channels;
    let src_stride = tile.width as usize * channels;
    let dst_stride = image_width * channels;
    let dst_start = (y0 as usize * image_width + x0 as usize) * channels;

    match (image.data_mut(), &tile.data) {
        (SampleData::U8(dst), SampleData::U8(src)) => {
            copy_rows(dst, src, dst_start, dst_stride, src_stride, row_len, copy_h)
        }
        (SampleData::U16(dst), SampleData::U16(src)) => {
            copy_rows(dst, src, dst_start, dst_stride, src_stride, row_len, copy_h)
        }
        // Depths are fixed per level by validation
        _ => {}
    }
}

fn copy_rows<T: Copy>(
    dst: &mut [T],
    src: &[T],
    dst_start: usize,
    dst_stride: usize,
    src_stride: usize,
    row_len: usize,
    rows: usize,
) {
    for row in 0..rows {
        let s = row * src_stride;
        let d = dst_start + row * dst_stride;
        dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
    }
}
