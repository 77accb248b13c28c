//! RGBA compositing of a tissue level with a binary mask.

use crate::error::PixelError;
use crate::raster::{BinaryMask, PixelBuffer, PixelLayout, SampleData};

/// Build an RGBA image whose alpha is opaque exactly where `mask` is set.
///
/// Color comes from the tissue: gray is replicated to R, G and B, RGB is
/// copied, and an existing alpha channel is replaced. Samples keep their
/// depth, so alpha is 255 for 8-bit and 65535 for 16-bit input. Gray+alpha
/// input is rejected.
pub fn composite_rgba(tissue: &PixelBuffer, mask: &BinaryMask) -> Result<PixelBuffer, PixelError> {
    if tissue.dimensions() != mask.dimensions() {
        return Err(PixelError::DimensionMismatch {
            expected_width: tissue.width(),
            expected_height: tissue.height(),
            actual_width: mask.width(),
            actual_height: mask.height(),
        });
    }

    let layout = tissue.layout();
    if layout == PixelLayout::GrayAlpha {
        return Err(PixelError::UnsupportedPixelFormat {
            channels: layout.channels(),
        });
    }

    let data = match tissue.data() {
        SampleData::U8(src) => SampleData::U8(to_rgba(src, layout, mask.as_slice(), u8::MAX)),
        SampleData::U16(src) => SampleData::U16(to_rgba(src, layout, mask.as_slice(), u16::MAX)),
    };

    PixelBuffer::new(tissue.width(), tissue.height(), PixelLayout::Rgba, data)
}

fn to_rgba<T: Copy + Default>(src: &[T], layout: PixelLayout, mask: &[u8], opaque: T) -> Vec<T> {
    let channels = layout.channels();
    let mut out = Vec::with_capacity(mask.len() * 4);
    for (pixel, &inside) in src.chunks_exact(channels).zip(mask) {
        let (r, g, b) = if layout.is_gray() {
            (pixel[0], pixel[0], pixel[0])
        } else {
            (pixel[0], pixel[1], pixel[2])
        };
        let alpha = if inside != 0 { opaque } else { T::default() };
        out.extend_from_slice(&[r, g, b, alpha]);
    }
    out
}
