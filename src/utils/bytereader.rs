use crate::utils::error::JpegResult;
use crate::utils::traits::SafeAccess;

/// Big-endian byte cursor over an in-memory buffer.
///
/// Every parser function takes the cursor explicitly, so a segment can be
/// parsed from any slice and starting offset.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    /// Creates a cursor positioned at `position`.
    pub fn at(data: &'a [u8], position: usize) -> Self {
        ByteReader { data, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns number of bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads a single byte and advances the cursor.
    pub fn read_u8(&mut self) -> JpegResult<u8> {
        let byte = *self.data.get_safe(self.position)?;
        self.position += 1;
        Ok(byte)
    }

    /// Reads a big-endian 16-bit value and advances the cursor.
    pub fn read_u16(&mut self) -> JpegResult<u16> {
        let bytes = self.data.get_range_safe(self.position..self.position + 2)?;
        let value = u16::from_be_bytes([bytes[0], bytes[1]]);
        self.position += 2;
        Ok(value)
    }

    /// Reads `n` bytes, borrowing them from the underlying buffer.
    pub fn read_bytes(&mut self, n: usize) -> JpegResult<&'a [u8]> {
        let bytes = self.data.get_range_safe(self.position..self.position + n)?;
        self.position += n;
        Ok(bytes)
    }

    /// Advances the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> JpegResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Peeks at the next two bytes as a big-endian value without moving the cursor.
    pub fn peek_u16(&self) -> Option<u16> {
        let bytes = self.data.get(self.position..self.position + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Moves the cursor to an absolute offset.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::JpegError;

    #[test]
    fn reads_big_endian_fields() {
        let data = [0xFF, 0xD8, 0x00, 0x10, 0x2A];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.peek_u16(), Some(0xFFD8));
        assert_eq!(reader.read_u16().unwrap(), 0xFFD8);
        assert_eq!(reader.read_u16().unwrap(), 0x0010);
        assert_eq!(reader.read_u8().unwrap(), 0x2A);
        assert!(reader.is_at_end());
        assert_eq!(reader.peek_u16(), None);
    }

    #[test]
    fn short_reads_fail_without_moving() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = ByteReader::at(&data, 2);

        assert!(matches!(reader.read_u16(), Err(JpegError::TruncatedFile { offset: 2, .. })));
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_bytes(1).unwrap(), &[0x03]);
    }
}
