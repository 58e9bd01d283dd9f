use serde::Serialize;

/// How the bytes following a marker are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Marker stands alone, no segment follows.
    Standalone,
    /// A 16-bit big-endian length (counting itself) precedes the payload.
    LengthPrefixed,
    /// A length-prefixed header followed by entropy-coded data that runs until
    /// the next non-stuffed marker.
    EntropyCoded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum JpegMarker {
    /// Start of frame, `n` is the low nibble of the marker (0 = baseline DCT).
    SOF(u8),
    DHT, // Define Huffman table(s)
    DAC, // Define arithmetic coding conditioning(s)
    JPG, // Reserved for JPEG extensions

    /// Restart interval termination, 0..=7
    RST(u8),

    SOI, // Start of image
    EOI, // End of image
    SOS, // Start of scan
    DQT, // Define quantization table(s)
    DNL, // Define number of lines
    DRI, // Define restart interval
    DHP, // Define hierarchical progression
    EXP, // Expand reference component(s)

    /// Application segment, 0..=15
    APP(u8),
    /// JPEG extension, 0..=13
    JPGn(u8),
    COM, // Comment
    TEM, // For temporary private use in arithmetic coding

    // Reserved marker
    RES(u8),
}

impl JpegMarker {
    /// Interprets a two-byte value as a marker. Returns `None` for `0xFF00`
    /// (a stuffed data byte), `0xFFFF` (fill) and anything not starting with `0xFF`.
    pub fn from_u16(value: u16) -> Option<JpegMarker> {
        if value >> 8 != 0xFF {
            return None;
        }

        let code = (value & 0xFF) as u8;
        let marker = match code {
            0xC4 => JpegMarker::DHT,
            0xC8 => JpegMarker::JPG,
            0xCC => JpegMarker::DAC,
            0xC0..=0xCF => JpegMarker::SOF(code & 0x0F),
            0xD0..=0xD7 => JpegMarker::RST(code - 0xD0),
            0xD8 => JpegMarker::SOI,
            0xD9 => JpegMarker::EOI,
            0xDA => JpegMarker::SOS,
            0xDB => JpegMarker::DQT,
            0xDC => JpegMarker::DNL,
            0xDD => JpegMarker::DRI,
            0xDE => JpegMarker::DHP,
            0xDF => JpegMarker::EXP,
            0xE0..=0xEF => JpegMarker::APP(code - 0xE0),
            0xF0..=0xFD => JpegMarker::JPGn(code - 0xF0),
            0xFE => JpegMarker::COM,
            0x01 => JpegMarker::TEM,
            0x02..=0xBF => JpegMarker::RES(code),
            _ => return None,
        };

        Some(marker)
    }

    pub fn to_u16(&self) -> u16 {
        let code = match *self {
            JpegMarker::SOF(n) => 0xC0 | (n & 0x0F),
            JpegMarker::DHT => 0xC4,
            JpegMarker::JPG => 0xC8,
            JpegMarker::DAC => 0xCC,
            JpegMarker::RST(n) => 0xD0 + (n & 0x07),
            JpegMarker::SOI => 0xD8,
            JpegMarker::EOI => 0xD9,
            JpegMarker::SOS => 0xDA,
            JpegMarker::DQT => 0xDB,
            JpegMarker::DNL => 0xDC,
            JpegMarker::DRI => 0xDD,
            JpegMarker::DHP => 0xDE,
            JpegMarker::EXP => 0xDF,
            JpegMarker::APP(n) => 0xE0 + (n & 0x0F),
            JpegMarker::JPGn(n) => 0xF0 + n.min(13),
            JpegMarker::COM => 0xFE,
            JpegMarker::TEM => 0x01,
            JpegMarker::RES(code) => code,
        };

        0xFF00 | code as u16
    }

    pub fn kind(&self) -> SegmentKind {
        match self {
            JpegMarker::SOI | JpegMarker::EOI | JpegMarker::RST(_) | JpegMarker::TEM => SegmentKind::Standalone,
            JpegMarker::SOS => SegmentKind::EntropyCoded,
            _ => SegmentKind::LengthPrefixed,
        }
    }

    /// True for every start-of-frame marker other than baseline DCT.
    pub fn is_non_baseline_frame(&self) -> bool {
        matches!(self, JpegMarker::SOF(n) if *n != 0)
    }
}
