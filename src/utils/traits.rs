use crate::utils::error::{JpegError, JpegResult};

pub(crate) trait SafeAccess<T> {
    fn get_safe(&self, index: usize) -> JpegResult<&T>;
    fn get_range_safe(&self, range: std::ops::Range<usize>) -> JpegResult<&[T]>;
}

impl<T> SafeAccess<T> for [T] {
    /// Safely retrieves a reference to an element at the specified index in a slice.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::TruncatedFile` if the index is out of bounds.
    fn get_safe(&self, index: usize) -> JpegResult<&T> {
        self.get(index).ok_or(JpegError::TruncatedFile {
            offset: index,
            needed: 1,
            available: 0,
        })
    }

    /// Safely retrieves a reference to a range of elements in a slice.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::TruncatedFile` if the range reaches past the end of the slice.
    /// A reversed range is reported the same way, with nothing available.
    fn get_range_safe(&self, range: std::ops::Range<usize>) -> JpegResult<&[T]> {
        self.get(range.clone()).ok_or_else(|| JpegError::TruncatedFile {
            offset: range.start,
            needed: range.end.saturating_sub(range.start),
            available: self.len().saturating_sub(range.start),
        })
    }
}

pub(crate) trait TryZeroed: Sized {
    fn try_zeroed(len: usize) -> JpegResult<Self>;
}

impl<T: Clone + Default> TryZeroed for Vec<T> {
    /// Allocates `len` default-initialised elements, reporting allocation
    /// failure instead of aborting.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::AllocationFailed` if the buffer cannot be reserved.
    fn try_zeroed(len: usize) -> JpegResult<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).map_err(|_| JpegError::AllocationFailed {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
        buffer.resize(len, T::default());

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reports_truncation() {
        let data = [1u8, 2, 3];

        assert_eq!(*data.get_safe(2).unwrap(), 3);
        assert_eq!(data.get_range_safe(1..3).unwrap(), &[2, 3]);

        match data.get_range_safe(2..6) {
            Err(JpegError::TruncatedFile {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zeroed_buffers_report_failed_allocations() {
        let buffer = Vec::<i32>::try_zeroed(5).unwrap();
        assert_eq!(buffer, vec![0; 5]);

        assert!(matches!(
            Vec::<u64>::try_zeroed(usize::MAX / 4),
            Err(JpegError::AllocationFailed { bytes: usize::MAX })
        ));
    }
}
