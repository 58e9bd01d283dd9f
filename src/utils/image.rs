//! Decoded raster types.
//!
//! Samples are 8 bits each, interleaved per pixel, rows stored top to bottom
//! and pixels left to right. The sample at column `x`, row `y`, channel `c` is
//! at `(y * width + x) * channels + c`.

use crate::decoders::jpeg::reconstruct::ycbcr_to_rgb;
use serde::Serialize;

fn l8_to_u8_rgb(values: Vec<u8>) -> Vec<u8> {
    values.into_iter().flat_map(|v| [v, v, v]).collect()
}

fn ycbcr8_to_u8_rgb(mut values: Vec<u8>) -> Vec<u8> {
    for pixel in values.chunks_exact_mut(3) {
        let (r, g, b) = ycbcr_to_rgb(pixel[0], pixel[1], pixel[2]);
        pixel.copy_from_slice(&[r, g, b]);
    }
    values
}

fn interleaved_to_u8_rgb(values: Vec<u8>, channels: u8) -> Vec<u8> {
    let channels = channels.max(1) as usize;

    values
        .chunks_exact(channels)
        .flat_map(|pixel| match pixel {
            [v] | [v, _] => [*v, *v, *v],
            [r, g, b, ..] => [*r, *g, *b],
            [] => [0, 0, 0],
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    /// One grayscale sample per pixel.
    L8,
    RGB8,
    /// Raw JFIF luma and chroma, as stored in the file.
    YCbCr8,
    /// Component samples in frame order, no color interpretation.
    Interleaved { channels: u8 },
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::L8 => 1,
            PixelFormat::RGB8 | PixelFormat::YCbCr8 => 3,
            PixelFormat::Interleaved { channels } => *channels as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    L8(Vec<u8>),
    RGB8(Vec<u8>),
    YCbCr8(Vec<u8>),
    Interleaved { channels: u8, data: Vec<u8> },
}

impl PixelData {
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            PixelData::L8(_) => PixelFormat::L8,
            PixelData::RGB8(_) => PixelFormat::RGB8,
            PixelData::YCbCr8(_) => PixelFormat::YCbCr8,
            PixelData::Interleaved { channels, .. } => PixelFormat::Interleaved { channels: *channels },
        }
    }

    /// Converts to RGB. Grayscale is replicated across the three channels,
    /// YCbCr goes through the JFIF equations. For other layouts the first
    /// three samples are taken as R, G, B, and one- or two-channel data is
    /// treated as gray.
    pub fn into_rgb8(self) -> PixelData {
        match self {
            PixelData::RGB8(pixels) => PixelData::RGB8(pixels),
            PixelData::L8(pixels) => PixelData::RGB8(l8_to_u8_rgb(pixels)),
            PixelData::YCbCr8(pixels) => PixelData::RGB8(ycbcr8_to_u8_rgb(pixels)),
            PixelData::Interleaved { channels, data } => PixelData::RGB8(interleaved_to_u8_rgb(data, channels)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::L8(pixels) | PixelData::RGB8(pixels) | PixelData::YCbCr8(pixels) => pixels,
            PixelData::Interleaved { data, .. } => data,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PixelData::L8(pixels) | PixelData::RGB8(pixels) | PixelData::YCbCr8(pixels) => pixels,
            PixelData::Interleaved { data, .. } => data,
        }
    }
}

/// A fully decoded image. Only ever produced whole; a failed decode yields no
/// partial raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: PixelData,
}

impl Image {
    pub fn from_pixels(width: u32, height: u32, pixels: PixelData) -> Image {
        Image { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixels.pixel_format()
    }

    pub fn channels(&self) -> usize {
        self.pixel_format().channels()
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    /// Interleaved sample buffer, `width * height * channels` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels.into_bytes()
    }

    /// Converts the image to RGB8 format, consuming the original image.
    pub fn into_rgb8(self) -> Image {
        Image {
            width: self.width,
            height: self.height,
            pixels: self.pixels.into_rgb8(),
        }
    }

    /// Returns the pixels as RGB8 bytes without modifying the image.
    pub fn as_rgb8(&self) -> Vec<u8> {
        self.pixels.clone().into_rgb8().into_bytes()
    }
}
