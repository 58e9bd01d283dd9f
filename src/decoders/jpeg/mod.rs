pub mod entropy;
pub mod huffman;
pub mod marker;
pub mod parser;
pub mod quantization;
pub mod reconstruct;

use crate::decoders::jpeg::parser::{Component, JpegHeaders, SegmentParser};
use crate::decoders::jpeg::quantization::QuantizationTable;
use crate::decoders::jpeg::reconstruct::{assemble_pixels, samples_from_coefficients, SamplePlane};
use crate::utils::error::{JpegError, JpegResult};
use crate::utils::image::{Image, PixelData};
use crate::utils::info::{HuffmanTableInfo, JpegInfo, QuantizationTableInfo};

/// Natural-order index of each zigzag position.
#[rustfmt::skip]
pub const ZIGZAG_MAP: [u8; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// How markers the decoder does not interpret are passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentSkip {
    /// Advance one byte and look for the next marker. Payload bytes that happen
    /// to look like table, frame or scan markers are interpreted as such. A
    /// non-baseline frame marker only fails the decode when no baseline frame
    /// header is found.
    #[default]
    ByteScan,
    /// Skip the declared segment length. COM and APP0 JFIF segments are
    /// recorded along the way.
    LengthAware,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderOptions {
    /// Convert three-component images from YCbCr to RGB. When false the raster
    /// holds the samples as stored.
    pub color_transform: bool,
    pub segment_skip: SegmentSkip,
    /// Fail decoding images with more than this many samples
    /// (width x height x components). A 1024x1024 three component image
    /// counts as 3145728, not 1048576.
    pub pixel_limit: Option<usize>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            color_transform: true,
            segment_skip: SegmentSkip::ByteScan,
            pixel_limit: None,
        }
    }
}

/// Baseline sequential JPEG decoder over an in-memory buffer.
///
/// Headers are parsed once and cached. `decode` either returns the whole image
/// or an error, never a partial raster.
pub struct JpegDecoder<'a> {
    data: &'a [u8],
    options: DecoderOptions,
    headers: Option<JpegHeaders<'a>>,
}

impl<'a> JpegDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecoderOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecoderOptions) -> Self {
        Self {
            data,
            options,
            headers: None,
        }
    }

    /// Walks the container and builds the tables, without touching the
    /// entropy-coded data.
    pub fn read_headers(&mut self) -> JpegResult<()> {
        if self.headers.is_none() {
            let headers = SegmentParser::new(self.data, &self.options).parse()?;
            self.headers = Some(headers);
        }

        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.headers.as_ref().map_or(0, |h| h.frame.width)
    }

    pub fn height(&self) -> u32 {
        self.headers.as_ref().map_or(0, |h| h.frame.height)
    }

    pub fn components(&self) -> &[Component] {
        self.headers
            .as_ref()
            .map(|h| h.frame.components.as_slice())
            .unwrap_or(&[])
    }

    pub fn quantization_tables(&self) -> Vec<&QuantizationTable> {
        self.headers
            .as_ref()
            .map(|h| h.quantization_tables.iter().collect())
            .unwrap_or_default()
    }

    /// Returns everything known about the file so far. Before the headers
    /// have been read the fields are empty.
    pub fn get_info(&self) -> JpegInfo {
        let Some(headers) = self.headers.as_ref() else {
            return JpegInfo {
                width: 0,
                height: 0,
                color_depth: 0,
                number_of_components: 0,
                color_components: Vec::new(),
                quantization_tables: Vec::new(),
                huffman_tables: Vec::new(),
                spectral_selection_start: 0,
                spectral_selection_end: 0,
                successive_approximation_high: 0,
                successive_approximation_low: 0,
                scan_offset: 0,
                scan_length: 0,
                restart_interval: 0,
                jfif_header: None,
                comments: Vec::new(),
            };
        };

        JpegInfo {
            width: headers.frame.width,
            height: headers.frame.height,
            color_depth: headers.frame.precision,
            number_of_components: headers.frame.components.len() as u8,
            color_components: headers.frame.components.clone(),
            quantization_tables: headers
                .quantization_tables
                .iter()
                .map(|table| QuantizationTableInfo {
                    id: table.id,
                    precision: table.precision,
                    values: table.table.to_vec(),
                })
                .collect(),
            huffman_tables: headers
                .huffman_tables
                .iter()
                .map(|(class, id, table)| HuffmanTableInfo {
                    class,
                    id,
                    counts: table.counts().to_vec(),
                    symbols: table.symbols().to_vec(),
                })
                .collect(),
            spectral_selection_start: headers.scan.start_spectral,
            spectral_selection_end: headers.scan.end_spectral,
            successive_approximation_high: headers.scan.successive_approximation >> 4,
            successive_approximation_low: headers.scan.successive_approximation & 0x0F,
            scan_offset: headers.scan_range.start,
            scan_length: headers.scan_data.len(),
            restart_interval: headers.restart_interval,
            jfif_header: headers.jfif_header.clone(),
            comments: headers.comments.clone(),
        }
    }

    /// Runs the whole pipeline: container, entropy decoding, reconstruction.
    pub fn decode(&mut self) -> JpegResult<Image> {
        self.read_headers()?;

        let headers = self.headers.as_ref().ok_or(JpegError::MissingFrameHeader)?;
        let frame = &headers.frame;

        // Resolve every quantization table before any entropy-coded bits are read
        let quantization_tables = frame
            .components
            .iter()
            .map(|component| headers.quantization_tables.get(component.quantization_table_id))
            .collect::<JpegResult<Vec<_>>>()?;

        let coefficients = entropy::decode_scan(headers.scan_data, frame, &headers.scan, &headers.huffman_tables)?;

        let planes = coefficients
            .iter()
            .zip(quantization_tables)
            .map(|(plane, table)| samples_from_coefficients(plane, table))
            .collect::<JpegResult<Vec<SamplePlane>>>()?;

        let width = frame.width as usize;
        let height = frame.height as usize;
        let convert = self.options.color_transform;
        let pixels = assemble_pixels(&planes, width, height, convert)?;

        let pixels = match planes.len() {
            1 => PixelData::L8(pixels),
            3 if convert => PixelData::RGB8(pixels),
            3 => PixelData::YCbCr8(pixels),
            channels => PixelData::Interleaved {
                channels: channels as u8,
                data: pixels,
            },
        };

        log::debug!("Decoded {}x{} image as {:?}", width, height, pixels.pixel_format());

        Ok(Image::from_pixels(frame.width, frame.height, pixels))
    }
}
