//! Baseline sequential JPEG decoding from memory.
//!
//! ```no_run
//! let data = std::fs::read("photo.jpg").unwrap();
//! let image = jpeg_baseline::decode(&data).unwrap();
//! println!("{}x{} {:?}", image.width(), image.height(), image.pixel_format());
//! ```

mod decoders;
mod utils;

pub use decoders::jpeg::huffman::{HuffmanClass, HuffmanTable};
pub use decoders::jpeg::marker::{JpegMarker, SegmentKind};
pub use decoders::jpeg::parser::{Component, JFIFHeader};
pub use decoders::jpeg::quantization::QuantizationTable;
pub use decoders::jpeg::{DecoderOptions, JpegDecoder, SegmentSkip, ZIGZAG_MAP};
pub use utils::error::{JpegError, JpegResult, TableKind};
pub use utils::image::{Image, PixelData, PixelFormat};
pub use utils::info::{HuffmanTableInfo, JpegInfo, QuantizationTableInfo};
pub use utils::logger::Logger;
pub use utils::{bitreader, bytereader};

/// Decodes a baseline JPEG held in memory with the default options.
pub fn decode(data: &[u8]) -> JpegResult<Image> {
    JpegDecoder::new(data).decode()
}
