use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a pyramid file.
///
/// The TIFF parser only ever asks for the header, the IFDs, the tag arrays
/// and the tiles it decodes, so a reader never has to hold a whole slide in
/// memory. Implementations must be usable across await points.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get an identifier for this resource (used in log lines).
    fn identifier(&self) -> &str;
}

/// Check that `[offset, offset + len)` lies inside a resource of `size` bytes.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_inside() {
        assert!(check_range(0, 10, 10).is_ok());
        assert!(check_range(5, 0, 5).is_ok());
    }

    #[test]
    fn test_check_range_past_end() {
        let err = check_range(8, 4, 10).unwrap_err();
        assert!(matches!(
            err,
            IoError::RangeOutOfBounds {
                offset: 8,
                requested: 4,
                size: 10
            }
        ));
    }

    #[test]
    fn test_check_range_overflow() {
        assert!(check_range(u64::MAX, 2, u64::MAX).is_err());
    }
}
