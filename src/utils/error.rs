use crate::decoders::jpeg::marker::JpegMarker;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JpegError {
    #[error("Missing SOI marker at the start of the file")]
    MissingSoi,
    #[error("Missing EOI marker, reached end of data at offset {0}")]
    MissingEoi(usize),
    #[error("Truncated file: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedFile {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Malformed {marker:?} segment: {reason}")]
    MalformedSegment { marker: JpegMarker, reason: String },
    #[error("Unsupported subsampling {horizontal}x{vertical} for component {component}, only 1x1 is supported")]
    UnsupportedSubsampling {
        component: u8,
        horizontal: u8,
        vertical: u8,
    },
    #[error("Unsupported sample precision: {0} bits")]
    UnsupportedPrecision(u8),
    #[error("Unsupported frame type {0:?}, only baseline (SOF0) is supported")]
    UnsupportedFrame(JpegMarker),
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Image too large: {pixels} samples exceed the limit of {limit}")]
    ImageTooLarge { pixels: usize, limit: usize },
    #[error("Failed to allocate {bytes} bytes for the decoded planes")]
    AllocationFailed { bytes: usize },
    #[error("Invalid Huffman table: {0}")]
    InvalidHuffmanTable(String),
    #[error("Reference to undefined {kind} table {id}")]
    UnknownTableReference { kind: TableKind, id: u8 },
    #[error("Missing baseline frame header before the scan")]
    MissingFrameHeader,
    #[error("No scan found before the end of the image")]
    MissingScan,
    #[error("Corrupt entropy-coded data: {0}")]
    CorruptEntropyStream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Quantization,
    HuffmanDc,
    HuffmanAc,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Quantization => write!(f, "quantization"),
            TableKind::HuffmanDc => write!(f, "DC Huffman"),
            TableKind::HuffmanAc => write!(f, "AC Huffman"),
        }
    }
}

// Result type alias for decoder operations
pub type JpegResult<T> = Result<T, JpegError>;
