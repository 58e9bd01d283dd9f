use crate::decoders::jpeg::huffman::HuffmanTables;
use crate::decoders::jpeg::marker::{JpegMarker, SegmentKind};
use crate::decoders::jpeg::quantization::QuantizationTables;
use crate::decoders::jpeg::{DecoderOptions, SegmentSkip};
use crate::utils::bytereader::ByteReader;
use crate::utils::error::{JpegError, JpegResult};
use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: u8,
    pub horizontal_sampling_factor: u8,
    pub vertical_sampling_factor: u8,
    pub quantization_table_id: u8,
    pub dc_table_selector: u8,
    pub ac_table_selector: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub precision: u8,
    pub width: u32,
    pub height: u32,
    pub components: Vec<Component>,
}

impl FrameHeader {
    pub fn blocks_per_line(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    pub fn block_lines(&self) -> usize {
        (self.height as usize + 7) / 8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanComponent {
    pub component_id: u8,
    pub dc_table_selector: u8,
    pub ac_table_selector: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub start_spectral: u8,
    pub end_spectral: u8,
    pub successive_approximation: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JFIFHeader {
    pub identifier: String,
    pub version_major: u8,
    pub version_minor: u8,
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
    pub thumbnail_data: Vec<u8>,
}

/// Everything the container walk produces: the frame, the scan and its
/// entropy-coded bytes, and the tables defined along the way.
#[derive(Debug, Clone)]
pub struct JpegHeaders<'a> {
    pub frame: FrameHeader,
    pub scan: ScanHeader,
    pub scan_range: Range<usize>,
    pub scan_data: &'a [u8],
    pub quantization_tables: QuantizationTables,
    pub huffman_tables: HuffmanTables,
    pub comments: Vec<String>,
    pub jfif_header: Option<JFIFHeader>,
    pub restart_interval: u16,
}

pub struct SegmentParser<'a> {
    reader: ByteReader<'a>,
    segment_skip: SegmentSkip,
    pixel_limit: Option<usize>,
    frame: Option<FrameHeader>,
    unsupported_frame: Option<JpegMarker>,
    scan: Option<(ScanHeader, Range<usize>)>,
    quantization_tables: QuantizationTables,
    huffman_tables: HuffmanTables,
    comments: Vec<String>,
    jfif_header: Option<JFIFHeader>,
    restart_interval: u16,
}

impl<'a> SegmentParser<'a> {
    pub fn new(data: &'a [u8], options: &DecoderOptions) -> Self {
        Self {
            reader: ByteReader::new(data),
            segment_skip: options.segment_skip,
            pixel_limit: options.pixel_limit,
            frame: None,
            unsupported_frame: None,
            scan: None,
            quantization_tables: QuantizationTables::default(),
            huffman_tables: HuffmanTables::default(),
            comments: Vec::new(),
            jfif_header: None,
            restart_interval: 0,
        }
    }

    /// Walks the container from SOI to EOI.
    pub fn parse(mut self) -> JpegResult<JpegHeaders<'a>> {
        if self.reader.peek_u16() != Some(JpegMarker::SOI.to_u16()) {
            return Err(JpegError::MissingSoi);
        }
        self.reader.skip(2)?;

        loop {
            let position = self.reader.position();
            let value = self.reader.peek_u16().ok_or(JpegError::MissingEoi(self.reader.data().len()))?;

            let marker = match JpegMarker::from_u16(value) {
                Some(marker) => marker,
                None => {
                    self.reader.skip(1)?;
                    continue;
                }
            };

            log::debug!("Found marker {:?} at offset {}", marker, position);

            match marker {
                JpegMarker::EOI => {
                    self.reader.skip(2)?;
                    break;
                }
                JpegMarker::DQT => {
                    self.reader.skip(2)?;
                    self.quantization_tables.read_segment(&mut self.reader)?;
                }
                JpegMarker::DHT => {
                    self.reader.skip(2)?;
                    self.huffman_tables.read_segment(&mut self.reader)?;
                }
                JpegMarker::SOF(0) => {
                    self.reader.skip(2)?;
                    self.read_start_of_frame()?;
                }
                JpegMarker::SOS => {
                    self.reader.skip(2)?;
                    self.read_start_of_scan()?;
                }
                marker if marker.is_non_baseline_frame() => {
                    if self.segment_skip == SegmentSkip::LengthAware {
                        return Err(JpegError::UnsupportedFrame(marker));
                    }

                    // May be payload bytes of a segment being scanned over
                    self.unsupported_frame.get_or_insert(marker);
                    self.reader.skip(1)?;
                }
                marker
                    if self.segment_skip == SegmentSkip::LengthAware
                        && marker.kind() == SegmentKind::LengthPrefixed =>
                {
                    self.reader.skip(2)?;
                    self.read_other_segment(marker)?;
                }
                _ => self.reader.skip(1)?,
            }

            if self.reader.is_at_end() {
                return Err(JpegError::MissingEoi(self.reader.position()));
            }
        }

        if self.reader.remaining() > 0 {
            log::warn!("{} bytes of trailing data after EOI", self.reader.remaining());
        }

        let frame = match (self.frame, self.unsupported_frame) {
            (Some(frame), _) => frame,
            (None, Some(marker)) => return Err(JpegError::UnsupportedFrame(marker)),
            (None, None) => return Err(JpegError::MissingFrameHeader),
        };
        let (scan, scan_range) = self.scan.ok_or(JpegError::MissingScan)?;
        let scan_data = &self.reader.data()[scan_range.clone()];

        Ok(JpegHeaders {
            frame,
            scan,
            scan_range,
            scan_data,
            quantization_tables: self.quantization_tables,
            huffman_tables: self.huffman_tables,
            comments: self.comments,
            jfif_header: self.jfif_header,
            restart_interval: self.restart_interval,
        })
    }

    fn malformed(marker: JpegMarker, reason: impl Into<String>) -> JpegError {
        JpegError::MalformedSegment {
            marker,
            reason: reason.into(),
        }
    }

    fn read_start_of_frame(&mut self) -> JpegResult<()> {
        const MARKER: JpegMarker = JpegMarker::SOF(0);

        if self.frame.is_some() {
            return Err(Self::malformed(MARKER, "more than one frame header"));
        }

        let mut remaining = self.reader.read_u16()? as isize - 2;

        let precision = self.reader.read_u8()?;
        let height = self.reader.read_u16()? as u32;
        let width = self.reader.read_u16()? as u32;
        let component_count = self.reader.read_u8()?;
        remaining -= 6;

        if precision != 8 {
            return Err(JpegError::UnsupportedPrecision(precision));
        }

        if width == 0 || height == 0 {
            return Err(JpegError::InvalidDimensions { width, height });
        }

        if component_count == 0 {
            return Err(Self::malformed(MARKER, "frame without components"));
        }

        if let Some(limit) = self.pixel_limit {
            let pixels = width as usize * height as usize * component_count as usize;
            if pixels > limit {
                return Err(JpegError::ImageTooLarge { pixels, limit });
            }
        }

        let mut components: Vec<Component> = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            let id = self.reader.read_u8()?;
            let sampling_factors = self.reader.read_u8()?;
            let horizontal_sampling_factor = (sampling_factors >> 4) & 0x0F;
            let vertical_sampling_factor = sampling_factors & 0x0F;
            let quantization_table_id = self.reader.read_u8()?;
            remaining -= 3;

            if horizontal_sampling_factor != 1 || vertical_sampling_factor != 1 {
                return Err(JpegError::UnsupportedSubsampling {
                    component: id,
                    horizontal: horizontal_sampling_factor,
                    vertical: vertical_sampling_factor,
                });
            }

            if components.iter().any(|c| c.id == id) {
                return Err(Self::malformed(MARKER, format!("duplicate component id {}", id)));
            }

            components.push(Component {
                id,
                horizontal_sampling_factor,
                vertical_sampling_factor,
                quantization_table_id,
                dc_table_selector: 0,
                ac_table_selector: 0,
            });
        }

        if remaining != 0 {
            return Err(Self::malformed(
                MARKER,
                format!("declared length is off by {} bytes", remaining),
            ));
        }

        log::debug!(
            "Frame {}x{}, {} components, {}-bit samples",
            width,
            height,
            component_count,
            precision
        );

        self.frame = Some(FrameHeader {
            precision,
            width,
            height,
            components,
        });

        Ok(())
    }

    fn read_start_of_scan(&mut self) -> JpegResult<()> {
        const MARKER: JpegMarker = JpegMarker::SOS;

        let unsupported_frame = self.unsupported_frame;
        let frame = self.frame.as_mut().ok_or(match unsupported_frame {
            Some(marker) => JpegError::UnsupportedFrame(marker),
            None => JpegError::MissingFrameHeader,
        })?;

        let length = self.reader.read_u16()?;
        let component_count = self.reader.read_u8()?;

        if component_count == 0 || component_count > 4 {
            return Err(Self::malformed(
                MARKER,
                format!("invalid scan component count {}", component_count),
            ));
        }

        let mut scan_components: Vec<ScanComponent> = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            let component_id = self.reader.read_u8()?;
            let table_selectors = self.reader.read_u8()?;
            let dc_table_selector = (table_selectors >> 4) & 0x0F;
            let ac_table_selector = table_selectors & 0x0F;

            if scan_components.iter().any(|c| c.component_id == component_id) {
                return Err(Self::malformed(
                    MARKER,
                    format!("component {} appears twice in the scan", component_id),
                ));
            }

            let component = frame
                .components
                .iter_mut()
                .find(|c| c.id == component_id)
                .ok_or_else(|| Self::malformed(MARKER, format!("unknown component id {}", component_id)))?;

            component.dc_table_selector = dc_table_selector;
            component.ac_table_selector = ac_table_selector;

            scan_components.push(ScanComponent {
                component_id,
                dc_table_selector,
                ac_table_selector,
            });
        }

        // Spectral selection and successive approximation, fixed for baseline scans
        let start_spectral = self.reader.read_u8()?;
        let end_spectral = self.reader.read_u8()?;
        let successive_approximation = self.reader.read_u8()?;

        if length != 6 + 2 * component_count as u16 {
            log::warn!(
                "Invalid SOS marker length, expected {}, got {}",
                6 + 2 * component_count as u16,
                length
            );
        }

        if scan_components.len() != frame.components.len() {
            return Err(Self::malformed(
                MARKER,
                format!(
                    "scan covers {} of {} frame components",
                    scan_components.len(),
                    frame.components.len()
                ),
            ));
        }

        let start = self.reader.position();
        let end = Self::find_end_of_image(self.reader.data(), start)?;

        log::debug!(
            "Scan with {} components, {} bytes of entropy-coded data",
            component_count,
            end - start
        );

        self.scan = Some((
            ScanHeader {
                components: scan_components,
                start_spectral,
                end_spectral,
                successive_approximation,
            },
            start..end,
        ));

        // Main loop picks up at the EOI marker
        self.reader.seek(end);

        Ok(())
    }

    /// Scans forward for the exact `FF D9` pair. Stuffed `FF 00` pairs and
    /// fill bytes never match.
    fn find_end_of_image(data: &[u8], start: usize) -> JpegResult<usize> {
        let eoi = JpegMarker::EOI.to_u16().to_be_bytes();

        data.get(start..)
            .and_then(|tail| tail.windows(2).position(|pair| pair == eoi))
            .map(|offset| start + offset)
            .ok_or(JpegError::MissingEoi(data.len()))
    }

    fn read_other_segment(&mut self, marker: JpegMarker) -> JpegResult<()> {
        let length = self.reader.read_u16()? as usize;

        if length < 2 {
            return Err(Self::malformed(marker, format!("segment length {} too small", length)));
        }

        let payload = self.reader.read_bytes(length - 2)?;

        match marker {
            JpegMarker::COM => {
                self.comments.push(String::from_utf8_lossy(payload).to_string());
            }
            JpegMarker::APP(0) => {
                self.jfif_header = Self::read_app0_jfif(payload)?;
            }
            JpegMarker::DRI => {
                let mut reader = ByteReader::new(payload);
                self.restart_interval = reader.read_u16()?;

                if self.restart_interval != 0 {
                    log::warn!(
                        "Restart interval {} defined, restart markers are not supported",
                        self.restart_interval
                    );
                }
            }
            _ => {
                log::debug!("Skipping {:?} segment of {} bytes", marker, length);
            }
        }

        Ok(())
    }

    fn read_app0_jfif(payload: &[u8]) -> JpegResult<Option<JFIFHeader>> {
        let mut reader = ByteReader::new(payload);

        let identifier = String::from_utf8_lossy(reader.read_bytes(5)?).to_string();

        if identifier != "JFIF\0" {
            log::warn!(
                "Invalid JFIF identifier in APP0, might not be a JFIF header: {:?}",
                identifier
            );
            return Ok(None);
        }

        let version_major = reader.read_u8()?;
        let version_minor = reader.read_u8()?;

        let density_units = reader.read_u8()?;
        let x_density = reader.read_u16()?;
        let y_density = reader.read_u16()?;

        let thumbnail_width = reader.read_u8()?;
        let thumbnail_height = reader.read_u8()?;

        let thumbnail_size = thumbnail_width as usize * thumbnail_height as usize * 3; // RGB data
        let thumbnail_data = reader.read_bytes(thumbnail_size)?.to_vec();

        if reader.remaining() > 0 {
            log::warn!("{} unexpected bytes at the end of the JFIF segment", reader.remaining());
        }

        Ok(Some(JFIFHeader {
            identifier,
            version_major,
            version_minor,
            density_units,
            x_density,
            y_density,
            thumbnail_width,
            thumbnail_height,
            thumbnail_data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOI: [u8; 2] = [0xFF, 0xD8];
    const EOI: [u8; 2] = [0xFF, 0xD9];

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xFF, marker];
        bytes.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn sof0(width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut payload = vec![8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components.len() as u8);
        for &(id, sampling, table) in components {
            payload.extend_from_slice(&[id, sampling, table]);
        }
        segment(0xC0, &payload)
    }

    fn sos(components: &[(u8, u8)]) -> Vec<u8> {
        let mut payload = vec![components.len() as u8];
        for &(id, tables) in components {
            payload.extend_from_slice(&[id, tables]);
        }
        payload.extend_from_slice(&[0x00, 0x3F, 0x00]);
        segment(0xDA, &payload)
    }

    fn parse(data: &[u8]) -> JpegResult<JpegHeaders> {
        SegmentParser::new(data, &DecoderOptions::default()).parse()
    }

    #[test]
    fn requires_start_of_image() {
        assert!(matches!(parse(&[0x00, 0xD8, 0xFF, 0xD9]), Err(JpegError::MissingSoi)));
        assert!(matches!(parse(&[]), Err(JpegError::MissingSoi)));
    }

    #[test]
    fn missing_end_of_image_is_reported() {
        let mut data = SOI.to_vec();
        data.extend(sof0(8, 8, &[(1, 0x11, 0)]));
        assert!(matches!(parse(&data), Err(JpegError::MissingEoi(_))));
    }

    #[test]
    fn scan_data_runs_up_to_end_of_image() -> JpegResult<()> {
        let mut data = SOI.to_vec();
        data.extend(sof0(16, 8, &[(5, 0x11, 0), (9, 0x11, 1)]));
        data.extend(sos(&[(9, 0x11), (5, 0x00)]));
        let scan_start = data.len();
        // Stuffed byte, a lone FF and a restart-like pair must not end the scan
        data.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xFF, 0xD0, 0x56]);
        let scan_end = data.len();
        data.extend_from_slice(&EOI);

        let headers = parse(&data)?;
        assert_eq!(headers.scan_range, scan_start..scan_end);
        assert_eq!(headers.scan_data, &data[scan_start..scan_end]);

        // Bindings land on the component with the matching id, not by position
        let component = |id: u8| headers.frame.components.iter().find(|c| c.id == id).unwrap();
        let first = component(5);
        assert_eq!((first.dc_table_selector, first.ac_table_selector), (0, 0));
        let second = component(9);
        assert_eq!((second.dc_table_selector, second.ac_table_selector), (1, 1));
        assert_eq!(headers.scan.components[0].component_id, 9);

        Ok(())
    }

    #[test]
    fn rejects_subsampling() {
        let mut data = SOI.to_vec();
        data.extend(sof0(16, 16, &[(1, 0x21, 0), (2, 0x11, 1), (3, 0x11, 1)]));
        data.extend_from_slice(&EOI);

        assert!(matches!(
            parse(&data),
            Err(JpegError::UnsupportedSubsampling {
                component: 1,
                horizontal: 2,
                vertical: 1
            })
        ));
    }

    #[test]
    fn frame_length_must_net_to_zero() {
        let mut frame = sof0(8, 8, &[(1, 0x11, 0)]);
        frame[3] += 1;
        frame.push(0);

        let mut data = SOI.to_vec();
        data.extend(frame);
        data.extend_from_slice(&EOI);

        assert!(matches!(
            parse(&data),
            Err(JpegError::MalformedSegment {
                marker: JpegMarker::SOF(0),
                ..
            })
        ));
    }

    #[test]
    fn rejects_progressive_frames() {
        let mut data = SOI.to_vec();
        data.extend(segment(0xC2, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0]));
        data.extend_from_slice(&EOI);

        assert!(matches!(parse(&data), Err(JpegError::UnsupportedFrame(JpegMarker::SOF(2)))));

        // A progressive scan is reported as the unsupported frame, not a missing one
        let mut data = SOI.to_vec();
        data.extend(segment(0xC2, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0]));
        data.extend(sos(&[(1, 0x00)]));
        data.push(0x00);
        data.extend_from_slice(&EOI);

        assert!(matches!(parse(&data), Err(JpegError::UnsupportedFrame(JpegMarker::SOF(2)))));

        let options = DecoderOptions {
            segment_skip: SegmentSkip::LengthAware,
            ..DecoderOptions::default()
        };
        assert!(matches!(
            SegmentParser::new(&data, &options).parse(),
            Err(JpegError::UnsupportedFrame(JpegMarker::SOF(2)))
        ));
    }

    #[test]
    fn frame_marker_inside_payload_is_skipped() -> JpegResult<()> {
        let mut data = SOI.to_vec();
        data.extend(segment(0xE2, &[0x12, 0x34, 0xFF, 0xC2]));
        data.extend(sof0(8, 8, &[(1, 0x11, 0)]));
        data.extend(sos(&[(1, 0x00)]));
        data.push(0x00);
        data.extend_from_slice(&EOI);

        let headers = parse(&data)?;
        assert_eq!((headers.frame.width, headers.frame.height), (8, 8));
        assert_eq!(headers.scan_data, &[0x00]);

        Ok(())
    }

    #[test]
    fn scan_before_frame_is_rejected() {
        let mut data = SOI.to_vec();
        data.extend(sos(&[(1, 0x00)]));
        data.extend_from_slice(&EOI);

        assert!(matches!(parse(&data), Err(JpegError::MissingFrameHeader)));
    }

    #[test]
    fn image_without_scan_is_rejected() {
        let mut data = SOI.to_vec();
        data.extend(sof0(8, 8, &[(1, 0x11, 0)]));
        data.extend_from_slice(&EOI);

        assert!(matches!(parse(&data), Err(JpegError::MissingScan)));
    }

    #[test]
    fn length_aware_skip_records_comments_and_jfif() -> JpegResult<()> {
        let mut data = SOI.to_vec();
        data.extend(segment(
            0xE0,
            &[b'J', b'F', b'I', b'F', 0, 1, 2, 1, 0, 72, 0, 72, 0, 0],
        ));
        // Comment text containing a would-be SOF2 marker
        data.extend(segment(0xFE, &[b'h', b'i', 0xFF, 0xC2]));
        data.extend(sof0(8, 8, &[(1, 0x11, 0)]));
        data.extend(sos(&[(1, 0x00)]));
        data.push(0x00);
        data.extend_from_slice(&EOI);

        let options = DecoderOptions {
            segment_skip: SegmentSkip::LengthAware,
            ..DecoderOptions::default()
        };
        let headers = SegmentParser::new(&data, &options).parse()?;

        assert_eq!(headers.comments.len(), 1);
        assert!(headers.comments[0].starts_with("hi"));

        let jfif = headers.jfif_header.expect("JFIF header");
        assert_eq!((jfif.version_major, jfif.version_minor), (1, 2));
        assert_eq!((jfif.x_density, jfif.y_density), (72, 72));

        // The default byte scan passes over the comment without recording it
        let headers = parse(&data)?;
        assert!(headers.comments.is_empty());
        assert!(headers.jfif_header.is_none());

        Ok(())
    }

    #[test]
    fn pixel_limit_applies_before_decoding() {
        let mut data = SOI.to_vec();
        data.extend(sof0(64, 64, &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0)]));
        data.extend_from_slice(&EOI);

        let options = DecoderOptions {
            pixel_limit: Some(64 * 64),
            ..DecoderOptions::default()
        };

        assert!(matches!(
            SegmentParser::new(&data, &options).parse(),
            Err(JpegError::ImageTooLarge { pixels: 12288, limit: 4096 })
        ));
    }
}
