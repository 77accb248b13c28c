use super::buffer::{PixelBuffer, SampleData};

/// Source span `[start, end)` averaged into output index `out` of `out_len`.
///
/// The last output sample absorbs an odd trailing source row or column.
#[inline]
fn source_span(out: u32, out_len: u32, src_len: u32) -> (u32, u32) {
    let start = out * 2;
    let end = if out + 1 == out_len {
        src_len
    } else {
        start + 2
    };
    (start, end.min(src_len).max(start + 1))
}

/// Halve an image with a box filter.
///
/// This is the 2x2 mean shrink of a libvips pyramid save. A separable
/// `imageops::resize` filter would blend neighbouring blocks instead.
///
/// Output dimensions are `max(1, d / 2)`. Each output sample is the rounded
/// mean of its 2x2 source block (wider at an odd trailing edge).
pub fn reduce_half(image: &PixelBuffer) -> PixelBuffer {
    if image.is_empty() {
        return image.clone();
    }
    let (src_w, src_h) = image.dimensions();
    let dst_w = (src_w / 2).max(1);
    let dst_h = (src_h / 2).max(1);
    let channels = image.channels();

    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize * channels);
    for oy in 0..dst_h {
        let (y0, y1) = source_span(oy, dst_h, src_h);
        for ox in 0..dst_w {
            let (x0, x1) = source_span(ox, dst_w, src_w);
            let count = ((y1 - y0) * (x1 - x0)) as u64;
            for c in 0..channels {
                let mut sum = 0u64;
                for y in y0..y1 {
                    for x in x0..x1 {
                        sum += image.sample(x, y, c) as u64;
                    }
                }
                out.push(((sum + count / 2) / count) as u32);
            }
        }
    }

    let data = match image.data() {
        SampleData::U8(_) => SampleData::U8(out.into_iter().map(|v| v as u8).collect()),
        SampleData::U16(_) => SampleData::U16(out.into_iter().map(|v| v as u16).collect()),
    };

    PixelBuffer::from_parts(dst_w, dst_h, image.layout(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelLayout;

    #[test]
    fn test_reduce_half_averages_blocks() {
        #[rustfmt::skip]
        let samples = vec![
            0, 2, 10, 10,
            4, 6, 10, 10,
        ];
        let image = PixelBuffer::from_u8(4, 2, PixelLayout::Gray, samples).unwrap();
        let half = reduce_half(&image);
        assert_eq!(half.dimensions(), (2, 1));
        assert_eq!(half.data(), &SampleData::U8(vec![3, 10]));
    }

    #[test]
    fn test_reduce_half_odd_edge_folds_into_last_pixel() {
        let image = PixelBuffer::from_u8(3, 1, PixelLayout::Gray, vec![0, 0, 255]).unwrap();
        let half = reduce_half(&image);
        assert_eq!(half.dimensions(), (1, 1));
        assert_eq!(half.data(), &SampleData::U8(vec![85]));
    }

    #[test]
    fn test_reduce_half_keeps_depth_and_layout() {
        let image = PixelBuffer::from_u16(
            2,
            2,
            PixelLayout::Rgb,
            vec![
                100, 200, 300, 100, 200, 300, 100, 200, 300, 100, 200, 300,
            ],
        )
        .unwrap();
        let half = reduce_half(&image);
        assert_eq!(half.layout(), PixelLayout::Rgb);
        assert_eq!(half.data(), &SampleData::U16(vec![100, 200, 300]));
    }

    #[test]
    fn test_reduce_half_never_reaches_zero() {
        let image = PixelBuffer::zeroed(1, 5, PixelLayout::Gray);
        assert_eq!(reduce_half(&image).dimensions(), (1, 2));
    }
}
