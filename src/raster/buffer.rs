use crate::error::PixelError;

// =============================================================================
// PixelLayout
// =============================================================================

/// Channel layout of an interleaved pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PixelLayout {
    /// Layout for a given samples-per-pixel count.
    pub fn from_channels(channels: usize) -> Result<Self, PixelError> {
        match channels {
            1 => Ok(PixelLayout::Gray),
            2 => Ok(PixelLayout::GrayAlpha),
            3 => Ok(PixelLayout::Rgb),
            4 => Ok(PixelLayout::Rgba),
            other => Err(PixelError::UnsupportedPixelFormat { channels: other }),
        }
    }

    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::GrayAlpha => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::GrayAlpha | PixelLayout::Rgba)
    }

    /// Whether the color channels are gray rather than RGB.
    #[inline]
    pub const fn is_gray(self) -> bool {
        matches!(self, PixelLayout::Gray | PixelLayout::GrayAlpha)
    }
}

// =============================================================================
// SampleData
// =============================================================================

/// Sample storage; the variant fixes the bit depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleData {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::U8(v) => v.len(),
            SampleData::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn bits_per_sample(&self) -> u16 {
        match self {
            SampleData::U8(_) => 8,
            SampleData::U16(_) => 16,
        }
    }

    /// Sample at `index`, widened to u32.
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        match self {
            SampleData::U8(v) => v[index] as u32,
            SampleData::U16(v) => v[index] as u32,
        }
    }
}

// =============================================================================
// PixelBuffer
// =============================================================================

/// A dense, row-major, interleaved image.
///
/// The constructor checks that the sample count equals
/// `width * height * channels`, so indexing helpers never go out of bounds
/// for in-range coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: SampleData,
}

impl PixelBuffer {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: SampleData,
    ) -> Result<Self, PixelError> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(PixelError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Assemble a buffer whose sample count the caller has already sized.
    pub(crate) fn from_parts(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: SampleData,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * layout.channels()
        );
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    pub fn from_u8(
        width: u32,
        height: u32,
        layout: PixelLayout,
        samples: Vec<u8>,
    ) -> Result<Self, PixelError> {
        Self::new(width, height, layout, SampleData::U8(samples))
    }

    pub fn from_u16(
        width: u32,
        height: u32,
        layout: PixelLayout,
        samples: Vec<u16>,
    ) -> Result<Self, PixelError> {
        Self::new(width, height, layout, SampleData::U16(samples))
    }

    /// An 8-bit buffer filled with zeros.
    pub fn zeroed(width: u32, height: u32, layout: PixelLayout) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self {
            width,
            height,
            layout,
            data: SampleData::U8(vec![0; len]),
        }
    }

    /// A buffer of the given bit depth filled with zeros.
    pub fn zeroed_with_depth(width: u32, height: u32, layout: PixelLayout, bits: u16) -> Self {
        let len = width as usize * height as usize * layout.channels();
        let data = if bits == 16 {
            SampleData::U16(vec![0; len])
        } else {
            SampleData::U8(vec![0; len])
        };
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    #[inline]
    pub fn bits_per_sample(&self) -> u16 {
        self.data.bits_per_sample()
    }

    pub fn data(&self) -> &SampleData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SampleData {
        &mut self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Index of the first sample of pixel `(x, y)`.
    #[inline]
    pub fn sample_index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels()
    }

    /// Sample of channel `c` at `(x, y)`, widened to u32.
    ///
    /// # Panics
    /// Panics if the coordinates or channel are out of range.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, c: usize) -> u32 {
        self.data.get(self.sample_index(x, y) + c)
    }

    /// Serialize samples as little-endian bytes (identity for 8-bit data).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match &self.data {
            SampleData::U8(v) => v.clone(),
            SampleData::U16(v) => v.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }
}

// =============================================================================
// BinaryMask
// =============================================================================

/// A width x height plane of 0/1 values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// Wrap a plane of 0/1 bytes.
    ///
    /// Non-zero bytes are normalized to 1.
    pub fn new(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self, PixelError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PixelError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        for value in data.iter_mut() {
            *value = u8::from(*value != 0);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
