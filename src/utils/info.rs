use crate::decoders::jpeg::huffman::HuffmanClass;
use crate::decoders::jpeg::parser::{Component, JFIFHeader};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantizationTableInfo {
    pub id: u8,
    /// 0 for 8-bit entries, 1 for 16-bit entries.
    pub precision: u8,
    /// Natural (row-major) order.
    pub values: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HuffmanTableInfo {
    pub class: HuffmanClass,
    pub id: u8,
    pub counts: Vec<u8>,
    pub symbols: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub color_depth: u8,
    pub number_of_components: u8,
    pub color_components: Vec<Component>,
    pub quantization_tables: Vec<QuantizationTableInfo>,
    pub huffman_tables: Vec<HuffmanTableInfo>,
    pub spectral_selection_start: u8,
    pub spectral_selection_end: u8,
    pub successive_approximation_high: u8,
    pub successive_approximation_low: u8,
    /// Offset of the first entropy-coded byte.
    pub scan_offset: usize,
    pub scan_length: usize,
    pub restart_interval: u16,
    pub jfif_header: Option<JFIFHeader>,
    pub comments: Vec<String>,
}
