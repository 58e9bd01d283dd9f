use crate::decoders::jpeg::marker::JpegMarker;
use crate::decoders::jpeg::ZIGZAG_MAP;
use crate::utils::bytereader::ByteReader;
use crate::utils::error::{JpegError, JpegResult, TableKind};

pub const MAX_QUANTIZATION_TABLES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationTable {
    pub id: u8,
    /// 0 for 8-bit entries, 1 for 16-bit entries
    pub precision: u8,
    /// Entries in natural (row-major) order
    pub table: [u16; 64],
}

impl QuantizationTable {
    /// Parses one table definition from a DQT segment.
    ///
    /// Reads the precision/destination byte followed by 64 entries in zigzag
    /// order, and returns the table in natural order together with the number
    /// of bytes consumed.
    pub fn parse(reader: &mut ByteReader) -> JpegResult<(QuantizationTable, usize)> {
        let start = reader.position();
        let table_spec = reader.read_u8()?;
        let precision = table_spec >> 4;
        let id = table_spec & 0x0F;

        if id as usize >= MAX_QUANTIZATION_TABLES {
            return Err(JpegError::MalformedSegment {
                marker: JpegMarker::DQT,
                reason: format!("quantization table destination {} out of range", id),
            });
        }

        let mut zigzag = [0u16; 64];
        match precision {
            0 => {
                for entry in zigzag.iter_mut() {
                    *entry = reader.read_u8()? as u16;
                }
            }
            1 => {
                for entry in zigzag.iter_mut() {
                    *entry = reader.read_u16()?;
                }
            }
            _ => {
                return Err(JpegError::MalformedSegment {
                    marker: JpegMarker::DQT,
                    reason: format!("invalid quantization table precision {}", precision),
                });
            }
        }

        let table = QuantizationTable {
            id,
            precision,
            table: unzigzag_block(&zigzag),
        };

        Ok((table, reader.position() - start))
    }
}

/// Scatters 64 values from zigzag transmission order into natural order.
pub fn unzigzag_block<T: Copy + Default>(block: &[T; 64]) -> [T; 64] {
    let mut unzigzagged = [T::default(); 64];

    for (i, &value) in block.iter().enumerate() {
        unzigzagged[ZIGZAG_MAP[i] as usize] = value;
    }

    unzigzagged
}

/// Gathers 64 natural-order values back into zigzag order.
#[cfg(test)]
pub fn zigzag_block<T: Copy + Default>(block: &[T; 64]) -> [T; 64] {
    let mut zigzagged = [T::default(); 64];

    for (i, value) in zigzagged.iter_mut().enumerate() {
        *value = block[ZIGZAG_MAP[i] as usize];
    }

    zigzagged
}

/// Destination-indexed store for the tables defined by DQT segments.
#[derive(Debug, Clone, Default)]
pub struct QuantizationTables {
    tables: [Option<QuantizationTable>; MAX_QUANTIZATION_TABLES],
}

impl QuantizationTables {
    /// Reads every table definition in a DQT segment. The cursor must be
    /// positioned on the length field.
    pub fn read_segment(&mut self, reader: &mut ByteReader) -> JpegResult<()> {
        let mut remaining = reader.read_u16()? as isize - 2;

        while remaining > 0 {
            let (table, consumed) = QuantizationTable::parse(reader)?;
            remaining -= consumed as isize;

            log::debug!(
                "Quantization table {} ({}-bit entries)",
                table.id,
                if table.precision == 0 { 8 } else { 16 }
            );

            self.insert(table);
        }

        if remaining < 0 {
            return Err(JpegError::MalformedSegment {
                marker: JpegMarker::DQT,
                reason: format!("table data overruns the declared length by {} bytes", -remaining),
            });
        }

        Ok(())
    }

    /// Stores a table, replacing any earlier table with the same destination.
    pub fn insert(&mut self, table: QuantizationTable) {
        let id = table.id as usize;
        self.tables[id] = Some(table);
    }

    pub fn get(&self, id: u8) -> JpegResult<&QuantizationTable> {
        self.tables
            .get(id as usize)
            .and_then(|table| table.as_ref())
            .ok_or(JpegError::UnknownTableReference {
                kind: TableKind::Quantization,
                id,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuantizationTable> {
        self.tables.iter().flatten()
    }
}
