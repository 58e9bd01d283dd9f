use crate::decoders::jpeg::marker::JpegMarker;
use crate::utils::bitreader::BitReader;
use crate::utils::bytereader::ByteReader;
use crate::utils::error::{JpegError, JpegResult, TableKind};
use serde::Serialize;

pub const MAX_HUFFMAN_TABLES: usize = 4;
const MAX_CODE_LENGTH: usize = 16;
const MAX_SYMBOLS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HuffmanClass {
    Dc,
    Ac,
}

impl HuffmanClass {
    fn table_kind(self) -> TableKind {
        match self {
            HuffmanClass::Dc => TableKind::HuffmanDc,
            HuffmanClass::Ac => TableKind::HuffmanAc,
        }
    }
}

/// Canonical Huffman decode table.
///
/// Codes of each length are consecutive integers, so a candidate code of
/// length `L` is a member iff it lies in `min_code[L]..=max_code[L]`, and its
/// symbol is found at `value_offset[L] + (code - min_code[L])`.
#[derive(Debug, Clone, PartialEq)]
pub struct HuffmanTable {
    counts: [u8; MAX_CODE_LENGTH],
    symbols: Vec<u8>,
    codes: Vec<u16>,
    min_code: [u32; MAX_CODE_LENGTH + 1],
    max_code: [i32; MAX_CODE_LENGTH + 1],
    value_offset: [usize; MAX_CODE_LENGTH + 1],
}

impl HuffmanTable {
    /// Builds the decode table from the per-length code counts and the
    /// symbols in transmission order.
    pub fn build(counts: &[u8; MAX_CODE_LENGTH], symbols: &[u8]) -> JpegResult<HuffmanTable> {
        let total: usize = counts.iter().map(|&count| count as usize).sum();

        if total != symbols.len() {
            return Err(JpegError::InvalidHuffmanTable(format!(
                "code lengths describe {} symbols, {} given",
                total,
                symbols.len()
            )));
        }

        if total > MAX_SYMBOLS {
            return Err(JpegError::InvalidHuffmanTable(format!("too many symbols: {}", total)));
        }

        let mut codes = Vec::with_capacity(total);
        let mut min_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut max_code = [-1i32; MAX_CODE_LENGTH + 1];
        let mut value_offset = [0usize; MAX_CODE_LENGTH + 1];

        let mut code = 0u32;
        let mut k = 0usize;
        for length in 1..=MAX_CODE_LENGTH {
            let count = counts[length - 1] as u32;

            if count > 0 {
                if code + count > 1 << length {
                    return Err(JpegError::InvalidHuffmanTable(format!(
                        "{} codes of length {} overflow the code space",
                        count, length
                    )));
                }

                min_code[length] = code;
                max_code[length] = (code + count - 1) as i32;
                value_offset[length] = k;

                codes.extend((code..code + count).map(|c| c as u16));
                k += count as usize;
            }

            code = (code + count) << 1;
        }

        Ok(HuffmanTable {
            counts: *counts,
            symbols: symbols.to_vec(),
            codes,
            min_code,
            max_code,
            value_offset,
        })
    }

    /// Looks up a candidate code of the given length.
    pub fn lookup(&self, length: usize, code: u32) -> Option<u8> {
        if length == 0 || length > MAX_CODE_LENGTH || (code as i64) > self.max_code[length] as i64 {
            return None;
        }

        if code < self.min_code[length] {
            return None;
        }

        let index = self.value_offset[length] + (code - self.min_code[length]) as usize;
        self.symbols.get(index).copied()
    }

    /// Decodes the next symbol, reading one bit at a time until the candidate
    /// code matches at its length.
    pub fn decode(&self, reader: &mut BitReader) -> JpegResult<u8> {
        let mut code = 0u32;

        for length in 1..=MAX_CODE_LENGTH {
            code = (code << 1) | reader.read_bit()? as u32;

            if let Some(symbol) = self.lookup(length, code) {
                return Ok(symbol);
            }
        }

        Err(JpegError::CorruptEntropyStream(format!(
            "no Huffman code matches {:016b}",
            code
        )))
    }

    pub fn counts(&self) -> &[u8; MAX_CODE_LENGTH] {
        &self.counts
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Canonical code assigned to each symbol, parallel to `symbols()`.
    pub fn codes(&self) -> &[u16] {
        &self.codes
    }
}

/// DC and AC table spaces, four destinations each.
#[derive(Debug, Clone, Default)]
pub struct HuffmanTables {
    dc_tables: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
    ac_tables: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
}

impl HuffmanTables {
    /// Reads every table definition in a DHT segment. The cursor must be
    /// positioned on the length field.
    pub fn read_segment(&mut self, reader: &mut ByteReader) -> JpegResult<()> {
        let mut remaining = reader.read_u16()? as isize - 2;

        if remaining < 0 {
            return Err(JpegError::MalformedSegment {
                marker: JpegMarker::DHT,
                reason: format!("segment length {} too small", remaining + 2),
            });
        }

        while remaining > 0 {
            let table_spec = reader.read_u8()?;
            let class = match table_spec >> 4 {
                0 => HuffmanClass::Dc,
                1 => HuffmanClass::Ac,
                other => {
                    return Err(JpegError::MalformedSegment {
                        marker: JpegMarker::DHT,
                        reason: format!("invalid Huffman table class {}", other),
                    });
                }
            };

            let id = table_spec & 0x0F;
            if id as usize >= MAX_HUFFMAN_TABLES {
                return Err(JpegError::MalformedSegment {
                    marker: JpegMarker::DHT,
                    reason: format!("Huffman table destination {} out of range", id),
                });
            }

            let mut counts = [0u8; MAX_CODE_LENGTH];
            counts.copy_from_slice(reader.read_bytes(MAX_CODE_LENGTH)?);

            let total: usize = counts.iter().map(|&count| count as usize).sum();
            remaining -= (1 + MAX_CODE_LENGTH + total) as isize;

            if remaining < 0 {
                return Err(JpegError::MalformedSegment {
                    marker: JpegMarker::DHT,
                    reason: format!("table data overruns the declared length by {} bytes", -remaining),
                });
            }

            let symbols = reader.read_bytes(total)?;
            let table = HuffmanTable::build(&counts, symbols)?;

            log::debug!("Huffman table {:?} {} with {} symbols", class, id, total);

            self.insert(class, id, table);
        }

        Ok(())
    }

    pub fn insert(&mut self, class: HuffmanClass, id: u8, table: HuffmanTable) {
        let tables = match class {
            HuffmanClass::Dc => &mut self.dc_tables,
            HuffmanClass::Ac => &mut self.ac_tables,
        };

        tables[id as usize] = Some(table);
    }

    pub fn get(&self, class: HuffmanClass, id: u8) -> JpegResult<&HuffmanTable> {
        let tables = match class {
            HuffmanClass::Dc => &self.dc_tables,
            HuffmanClass::Ac => &self.ac_tables,
        };

        tables
            .get(id as usize)
            .and_then(|table| table.as_ref())
            .ok_or(JpegError::UnknownTableReference {
                kind: class.table_kind(),
                id,
            })
    }

    /// All defined tables with their class and destination id.
    pub fn iter(&self) -> impl Iterator<Item = (HuffmanClass, u8, &HuffmanTable)> {
        let dc = self.dc_tables.iter().enumerate().filter_map(|(id, table)| {
            table.as_ref().map(|table| (HuffmanClass::Dc, id as u8, table))
        });
        let ac = self.ac_tables.iter().enumerate().filter_map(|(id, table)| {
            table.as_ref().map(|table| (HuffmanClass::Ac, id as u8, table))
        });

        dc.chain(ac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(usize, u8)]) -> [u8; 16] {
        let mut counts = [0u8; 16];
        for &(length, count) in pairs {
            counts[length - 1] = count;
        }
        counts
    }

    #[test]
    fn single_two_bit_code() -> JpegResult<()> {
        let table = HuffmanTable::build(&counts(&[(2, 1)]), &[0x05])?;

        assert_eq!(table.codes(), &[0b00]);
        assert_eq!(table.lookup(2, 0b00), Some(0x05));
        assert_eq!(table.lookup(1, 0b0), None);
        assert_eq!(table.lookup(2, 0b01), None);
        assert_eq!(table.lookup(2, 0b10), None);
        assert_eq!(table.lookup(2, 0b11), None);

        let mut reader = BitReader::new(&[0b0011_1111]);
        assert_eq!(table.decode(&mut reader)?, 0x05);

        let mut reader = BitReader::new(&[0b0100_0000, 0x00]);
        assert!(matches!(
            table.decode(&mut reader),
            Err(JpegError::CorruptEntropyStream(_))
        ));

        Ok(())
    }

    #[test]
    fn canonical_assignment() -> JpegResult<()> {
        // Standard luminance DC table (ITU-T T.81 K.3)
        let table = HuffmanTable::build(
            &counts(&[(2, 1), (3, 5), (4, 1), (5, 1), (6, 1), (7, 1), (8, 1), (9, 1)]),
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        )?;

        assert_eq!(
            table.codes(),
            &[0b00, 0b010, 0b011, 0b100, 0b101, 0b110, 0b1110, 0b11110, 0b111110, 0b1111110, 0b11111110, 0b111111110]
        );

        // 110 -> 5, 1110 -> 6, 00 -> 0
        let mut reader = BitReader::new(&[0b1101_1100, 0b0000_0000]);
        assert_eq!(table.decode(&mut reader)?, 5);
        assert_eq!(table.decode(&mut reader)?, 6);
        assert_eq!(table.decode(&mut reader)?, 0);

        Ok(())
    }

    #[test]
    fn rejects_overflowing_code_space() {
        // Three one-bit codes cannot exist
        let result = HuffmanTable::build(&counts(&[(1, 3)]), &[1, 2, 3]);
        assert!(matches!(result, Err(JpegError::InvalidHuffmanTable(_))));

        // Two one-bit codes use the whole space, nothing is left for length 2
        let result = HuffmanTable::build(&counts(&[(1, 2), (2, 1)]), &[1, 2, 3]);
        assert!(matches!(result, Err(JpegError::InvalidHuffmanTable(_))));
    }

    #[test]
    fn rejects_count_symbol_mismatch() {
        let result = HuffmanTable::build(&counts(&[(3, 2)]), &[1]);
        assert!(matches!(result, Err(JpegError::InvalidHuffmanTable(_))));
    }

    #[test]
    fn reads_dc_and_ac_tables_from_one_segment() -> JpegResult<()> {
        let mut segment = vec![0x00, 0x00];
        segment.push(0x00);
        segment.extend_from_slice(&counts(&[(1, 1)]));
        segment.push(0x00);
        segment.push(0x12);
        segment.extend_from_slice(&counts(&[(2, 2)]));
        segment.extend_from_slice(&[0x00, 0xF0]);
        let length = segment.len() as u16;
        segment[..2].copy_from_slice(&length.to_be_bytes());

        let mut tables = HuffmanTables::default();
        tables.read_segment(&mut ByteReader::new(&segment))?;

        assert_eq!(tables.get(HuffmanClass::Dc, 0)?.symbols(), &[0x00]);
        assert_eq!(tables.get(HuffmanClass::Ac, 2)?.symbols(), &[0x00, 0xF0]);
        assert!(matches!(
            tables.get(HuffmanClass::Ac, 0),
            Err(JpegError::UnknownTableReference {
                kind: TableKind::HuffmanAc,
                id: 0
            })
        ));
        assert_eq!(tables.iter().count(), 2);

        Ok(())
    }

    #[test]
    fn invalid_class_is_malformed() {
        let mut segment = vec![0x00, 0x13, 0x20];
        segment.extend_from_slice(&counts(&[(1, 1)]));
        segment.push(0x00);

        let result = HuffmanTables::default().read_segment(&mut ByteReader::new(&segment));
        assert!(matches!(
            result,
            Err(JpegError::MalformedSegment {
                marker: JpegMarker::DHT,
                ..
            })
        ));
    }

    #[test]
    fn length_shorter_than_its_field_is_malformed() {
        for length in [0u8, 1] {
            let segment = [0x00, length, 0x00];
            let result = HuffmanTables::default().read_segment(&mut ByteReader::new(&segment));
            assert!(matches!(
                result,
                Err(JpegError::MalformedSegment {
                    marker: JpegMarker::DHT,
                    ..
                })
            ));
        }

        // Declared length stops short of the symbols
        let mut segment = vec![0x00, 0x13, 0x00];
        segment.extend_from_slice(&counts(&[(2, 2)]));
        segment.extend_from_slice(&[0x01, 0x02]);
        let result = HuffmanTables::default().read_segment(&mut ByteReader::new(&segment));
        assert!(matches!(
            result,
            Err(JpegError::MalformedSegment {
                marker: JpegMarker::DHT,
                ..
            })
        ));
    }
}
