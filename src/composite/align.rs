//! Mask alignment: resample a mask level onto a tissue level and threshold it.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Primitive};

use crate::error::PixelError;
use crate::raster::{BinaryMask, PixelBuffer, SampleData};

/// Samples strictly above this value count as inside the mask.
pub const DEFAULT_MASK_THRESHOLD: u32 = 128;

/// Turn the first channel of `mask` into a binary plane of the target size.
///
/// Mismatched dimensions are resolved by nearest-neighbour sampling of pixel
/// centres (`imageops::resize` with [`FilterType::Nearest`]); equal
/// dimensions copy the plane unchanged. A zero-sized mask cannot be sampled
/// and fails unless the target is zero-sized as well.
pub fn align_mask(
    mask: &PixelBuffer,
    target_height: u32,
    target_width: u32,
    threshold: u32,
) -> Result<BinaryMask, PixelError> {
    if target_width == 0 || target_height == 0 {
        return Ok(BinaryMask::zeros(target_width, target_height));
    }
    if mask.is_empty() {
        return Err(PixelError::EmptyBuffer {
            width: mask.width(),
            height: mask.height(),
        });
    }

    let (width, height) = mask.dimensions();
    let channels = mask.channels();
    let target = (target_width, target_height);

    let plane: Vec<u8> = match mask.data() {
        SampleData::U8(samples) => resize_plane(first_channel(samples, channels), (width, height), target)?
            .into_iter()
            .map(|v| u8::from(v as u32 > threshold))
            .collect(),
        SampleData::U16(samples) => resize_plane(first_channel(samples, channels), (width, height), target)?
            .into_iter()
            .map(|v| u8::from(v as u32 > threshold))
            .collect(),
    };

    BinaryMask::new(target_width, target_height, plane)
}

fn first_channel<T: Copy>(samples: &[T], channels: usize) -> Vec<T> {
    samples.iter().step_by(channels.max(1)).copied().collect()
}

/// Nearest-neighbour resize of a single-channel plane.
fn resize_plane<T: Primitive + 'static>(
    plane: Vec<T>,
    (width, height): (u32, u32),
    (target_width, target_height): (u32, u32),
) -> Result<Vec<T>, PixelError> {
    let actual = plane.len();
    let image = ImageBuffer::<Luma<T>, Vec<T>>::from_raw(width, height, plane).ok_or(
        PixelError::BufferSize {
            expected: width as usize * height as usize,
            actual,
        },
    )?;
    Ok(imageops::resize(&image, target_width, target_height, FilterType::Nearest).into_raw())
}
