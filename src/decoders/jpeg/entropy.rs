use crate::decoders::jpeg::huffman::{HuffmanClass, HuffmanTable, HuffmanTables};
use crate::decoders::jpeg::marker::JpegMarker;
use crate::decoders::jpeg::parser::{FrameHeader, ScanHeader};
use crate::decoders::jpeg::ZIGZAG_MAP;
use crate::utils::bitreader::BitReader;
use crate::utils::error::{JpegError, JpegResult};
use crate::utils::traits::TryZeroed;

const MAX_DC_SIZE: u8 = 11;
const MAX_AC_SIZE: u8 = 10;
const END_OF_BLOCK: u8 = 0x00;
const ZERO_RUN_LENGTH: u8 = 0xF0;
// One bit of DC code and one bit of EOB
const MIN_BLOCK_BITS: usize = 2;

/// Quantized coefficients of one component, stored block by block in natural
/// order within each block.
#[derive(Debug, Clone)]
pub struct CoefficientPlane {
    pub component_id: u8,
    pub blocks_per_line: usize,
    pub block_lines: usize,
    pub data: Vec<i32>,
}

impl CoefficientPlane {
    pub fn new(component_id: u8, blocks_per_line: usize, block_lines: usize) -> JpegResult<Self> {
        let len = blocks_per_line
            .checked_mul(block_lines)
            .and_then(|blocks| blocks.checked_mul(64))
            .ok_or(JpegError::AllocationFailed { bytes: usize::MAX })?;

        Ok(Self {
            component_id,
            blocks_per_line,
            block_lines,
            data: Vec::try_zeroed(len)?,
        })
    }

    pub fn block(&self, block_x: usize, block_y: usize) -> Option<&[i32]> {
        let start = (block_y * self.blocks_per_line + block_x) * 64;
        self.data.get(start..start + 64)
    }

    pub fn block_mut(&mut self, block_x: usize, block_y: usize) -> Option<&mut [i32]> {
        let start = (block_y * self.blocks_per_line + block_x) * 64;
        self.data.get_mut(start..start + 64)
    }
}

/// Turns `size` raw bits into a signed value. Values whose top bit is 0 are
/// negative: `raw - (2^size - 1)`.
pub fn extend(raw: u16, size: u8) -> i32 {
    if size == 0 {
        return 0;
    }

    let value = raw as i32;
    if value < 1 << (size - 1) {
        value - (1 << size) + 1
    } else {
        value
    }
}

pub struct EntropyDecoder<'a> {
    reader: BitReader<'a>,
}

impl<'a> EntropyDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
        }
    }

    fn receive_extend(&mut self, size: u8) -> JpegResult<i32> {
        let raw = self.reader.read_bits(size)?;
        Ok(extend(raw, size))
    }

    /// Decodes the DC difference of the next block.
    pub fn decode_dc_difference(&mut self, table: &HuffmanTable) -> JpegResult<i32> {
        let size = table.decode(&mut self.reader)?;

        if size > MAX_DC_SIZE {
            return Err(JpegError::CorruptEntropyStream(format!(
                "DC coefficient size {} exceeds {}",
                size, MAX_DC_SIZE
            )));
        }

        self.receive_extend(size)
    }

    /// Decodes the 63 AC coefficients of the next block into `block`, which is
    /// in natural order. Positions not coded are left untouched.
    pub fn decode_ac_coefficients(&mut self, table: &HuffmanTable, block: &mut [i32]) -> JpegResult<()> {
        let mut k = 1usize;

        while k < 64 {
            let symbol = table.decode(&mut self.reader)?;

            match symbol {
                END_OF_BLOCK => break,
                ZERO_RUN_LENGTH => {
                    k += 16;
                    if k > 64 {
                        return Err(JpegError::CorruptEntropyStream(format!(
                            "zero run passes the end of the block at position {}",
                            k - 16
                        )));
                    }
                }
                _ => {
                    let run = (symbol >> 4) as usize;
                    let size = symbol & 0x0F;

                    if size == 0 || size > MAX_AC_SIZE {
                        return Err(JpegError::CorruptEntropyStream(format!(
                            "invalid AC symbol 0x{:02X}",
                            symbol
                        )));
                    }

                    k += run;
                    if k > 63 {
                        return Err(JpegError::CorruptEntropyStream(format!(
                            "AC run of {} exceeds 63 positions",
                            run
                        )));
                    }

                    block[ZIGZAG_MAP[k] as usize] = self.receive_extend(size)?;
                    k += 1;
                }
            }
        }

        Ok(())
    }

    /// Decodes one block: DC difference added to `predictor`, then the AC
    /// coefficients. `block` is cleared first and filled in natural order.
    pub fn decode_block(
        &mut self,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
        predictor: &mut i32,
        block: &mut [i32],
    ) -> JpegResult<()> {
        block.fill(0);

        *predictor = predictor.wrapping_add(self.decode_dc_difference(dc_table)?);
        block[0] = *predictor;

        self.decode_ac_coefficients(ac_table, block)
    }
}

/// Decodes every MCU of a scan into one coefficient plane per frame component.
///
/// With 1x1 sampling an MCU holds exactly one block per scan component, and
/// MCUs run left to right, top to bottom.
pub fn decode_scan(
    data: &[u8],
    frame: &FrameHeader,
    scan: &ScanHeader,
    huffman_tables: &HuffmanTables,
) -> JpegResult<Vec<CoefficientPlane>> {
    let blocks_per_line = frame.blocks_per_line();
    let block_lines = frame.block_lines();

    // Resolve everything up front so an undefined table fails before any bits are read
    let mut bindings = Vec::with_capacity(scan.components.len());
    for scan_component in &scan.components {
        let plane_index = frame
            .components
            .iter()
            .position(|component| component.id == scan_component.component_id)
            .ok_or_else(|| JpegError::MalformedSegment {
                marker: JpegMarker::SOS,
                reason: format!("unknown component id {}", scan_component.component_id),
            })?;

        let dc_table = huffman_tables.get(HuffmanClass::Dc, scan_component.dc_table_selector)?;
        let ac_table = huffman_tables.get(HuffmanClass::Ac, scan_component.ac_table_selector)?;

        bindings.push((plane_index, dc_table, ac_table));
    }

    let blocks = blocks_per_line
        .saturating_mul(block_lines)
        .saturating_mul(bindings.len());
    if data.len().saturating_mul(8) < blocks.saturating_mul(MIN_BLOCK_BITS) {
        return Err(JpegError::CorruptEntropyStream(format!(
            "{} bytes cannot hold {} blocks",
            data.len(),
            blocks
        )));
    }

    let mut planes = frame
        .components
        .iter()
        .map(|component| CoefficientPlane::new(component.id, blocks_per_line, block_lines))
        .collect::<JpegResult<Vec<_>>>()?;

    let mut decoder = EntropyDecoder::new(data);
    let mut predictors = vec![0i32; bindings.len()];

    for mcu_y in 0..block_lines {
        for mcu_x in 0..blocks_per_line {
            for (binding, predictor) in bindings.iter().zip(predictors.iter_mut()) {
                let (plane_index, dc_table, ac_table) = *binding;

                let block = planes[plane_index].block_mut(mcu_x, mcu_y).ok_or_else(|| {
                    JpegError::CorruptEntropyStream(format!("block {}x{} outside the plane", mcu_x, mcu_y))
                })?;

                decoder.decode_block(dc_table, ac_table, predictor, block).map_err(|e| {
                    log::debug!("Entropy decoding failed in MCU {}x{}: {}", mcu_x, mcu_y, e);
                    e
                })?;
            }
        }

        log::trace!("Decoded MCU row {}/{}", mcu_y + 1, block_lines);
    }

    Ok(planes)
}
