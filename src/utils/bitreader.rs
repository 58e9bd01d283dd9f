use crate::utils::error::{JpegError, JpegResult};

/// Bit cursor over one entropy-coded scan.
///
/// Bits are returned most-significant first. A `0xFF 0x00` pair in the source
/// yields a single `0xFF` data byte; `0xFF` followed by anything else is a
/// marker, and the reader is exhausted from that point on.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
    buffer: u8,
    bits_in_buffer: u8,
    exhausted: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            position: 0,
            buffer: 0,
            bits_in_buffer: 0,
            exhausted: false,
        }
    }

    /// Reads a single bit from the bitstream.
    ///
    /// # Returns
    /// - `true` if the bit is 1, `false` if the bit is 0
    /// - `JpegError::CorruptEntropyStream` if the scan data is exhausted
    pub fn read_bit(&mut self) -> JpegResult<bool> {
        if self.bits_in_buffer == 0 && !self.fill() {
            return Err(JpegError::CorruptEntropyStream(format!(
                "scan data exhausted at byte {}",
                self.position
            )));
        }

        self.bits_in_buffer -= 1;
        Ok((self.buffer >> self.bits_in_buffer) & 1 != 0)
    }

    /// Reads `n` bits (at most 16) from the bitstream, first bit in the highest position.
    pub fn read_bits(&mut self, n: u8) -> JpegResult<u16> {
        debug_assert!(n <= 16);

        let mut result = 0u16;
        for _ in 0..n {
            result = (result << 1) | self.read_bit()? as u16;
        }

        Ok(result)
    }

    /// True once a marker or the end of the data has been reached and no
    /// buffered bits remain.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.bits_in_buffer == 0
    }

    /// Offset of the next unread source byte.
    pub fn position(&self) -> usize {
        self.position
    }

    fn fill(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        let byte = match self.data.get(self.position) {
            Some(&byte) => byte,
            None => {
                self.exhausted = true;
                return false;
            }
        };

        if byte == 0xFF {
            match self.data.get(self.position + 1) {
                Some(0x00) => self.position += 2,
                // Marker or trailing fill byte
                _ => {
                    self.exhausted = true;
                    return false;
                }
            }
        } else {
            self.position += 1;
        }

        self.buffer = byte;
        self.bits_in_buffer = 8;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_bits(reader: &mut BitReader) -> Vec<bool> {
        let mut bits = Vec::new();
        while let Ok(bit) = reader.read_bit() {
            bits.push(bit);
        }
        bits
    }

    #[test]
    fn reads_msb_first() -> JpegResult<()> {
        let data = [0b10101010];
        let mut reader = BitReader::new(&data);

        assert!(reader.read_bit()?);
        assert!(!reader.read_bit()?);
        assert!(reader.read_bit()?);
        assert_eq!(reader.read_bits(5)?, 0b01010);
        assert!(reader.read_bit().is_err());

        let data = [0b10101010, 0b11001100];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(3)?, 0b101);
        assert_eq!(reader.read_bits(7)?, 0b0101011);
        assert_eq!(reader.read_bits(6)?, 0b001100);

        Ok(())
    }

    #[test]
    fn stuffed_zero_is_discarded() -> JpegResult<()> {
        let mut stuffed = BitReader::new(&[0xFF, 0x00, 0xAB]);
        assert_eq!(stuffed.read_bits(16)?, 0xFFAB);
        assert!(stuffed.read_bit().is_err());

        let expected: Vec<bool> = [0xFFu8, 0xAB]
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 != 0))
            .collect();
        let mut stuffed = BitReader::new(&[0xFF, 0x00, 0xAB]);
        assert_eq!(collect_bits(&mut stuffed), expected);

        Ok(())
    }

    #[test]
    fn marker_exhausts_reader() -> JpegResult<()> {
        let data = [0x12, 0xFF, 0xD9, 0x34];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(8)?, 0x12);
        assert!(!reader.is_exhausted());
        assert!(reader.read_bit().is_err());
        assert!(reader.is_exhausted());
        // Stays exhausted, the byte after the marker is never emitted
        assert!(reader.read_bit().is_err());

        Ok(())
    }

    #[test]
    fn lone_trailing_ff_ends_stream() {
        let mut reader = BitReader::new(&[0x80, 0xFF]);
        assert_eq!(collect_bits(&mut reader).len(), 8);
    }
}
