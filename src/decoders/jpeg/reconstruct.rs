use crate::decoders::jpeg::entropy::CoefficientPlane;
use crate::decoders::jpeg::quantization::QuantizationTable;
use crate::utils::error::JpegResult;
use crate::utils::traits::TryZeroed;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::f32::consts::PI;

/// Reconstructed 8-bit samples of one component, padded to whole blocks.
#[derive(Debug, Clone)]
pub struct SamplePlane {
    pub stride: usize,
    pub data: Vec<u8>,
}

/// Separable 8x8 inverse DCT after Arai, Agui and Nakajima.
///
/// The `s_*` factors fold the `C(u) / 2` normalisation of each 1-D pass into
/// the input, so two passes give the full 2-D inverse transform.
pub struct Idct {
    m_1: f32,
    m_2: f32,
    m_3: f32,
    m_4: f32,
    m_5: f32,
    s: [f32; 8],
}

impl Default for Idct {
    fn default() -> Self {
        Self::new()
    }
}

impl Idct {
    pub fn new() -> Self {
        let m_0 = 2.0 * (1.0 / 16.0 * 2.0 * PI).cos();
        let m_1 = 2.0 * (2.0 / 16.0 * 2.0 * PI).cos();
        let m_5 = 2.0 * (3.0 / 16.0 * 2.0 * PI).cos();

        let mut s = [0.0; 8];
        s[0] = (0.0 / 16.0 * PI).cos() / 8.0_f32.sqrt();
        for (u, factor) in s.iter_mut().enumerate().skip(1) {
            *factor = (u as f32 / 16.0 * PI).cos() / 2.0;
        }

        Idct {
            m_1,
            m_2: m_0 - m_5,
            m_3: m_1,
            m_4: m_0 + m_5,
            m_5,
            s,
        }
    }

    /// One 1-D pass over eight coefficients in natural frequency order.
    fn transform_1d(&self, input: [f32; 8]) -> [f32; 8] {
        let s = &self.s;

        let g_0 = input[0] * s[0];
        let g_1 = input[4] * s[4];
        let g_2 = input[2] * s[2];
        let g_3 = input[6] * s[6];
        let g_4 = input[5] * s[5];
        let g_5 = input[1] * s[1];
        let g_6 = input[7] * s[7];
        let g_7 = input[3] * s[3];

        let f_4 = g_4 - g_7;
        let f_5 = g_5 + g_6;
        let f_6 = g_5 - g_6;
        let f_7 = g_4 + g_7;

        let e_2 = g_2 - g_3;
        let e_3 = g_2 + g_3;
        let e_5 = f_5 - f_7;
        let e_7 = f_5 + f_7;
        let e_8 = f_4 + f_6;

        let d_2 = e_2 * self.m_1;
        let d_4 = f_4 * self.m_2;
        let d_5 = e_5 * self.m_3;
        let d_6 = f_6 * self.m_4;
        let d_8 = e_8 * self.m_5;

        let c_0 = g_0 + g_1;
        let c_1 = g_0 - g_1;
        let c_2 = d_2 - e_3;
        let c_4 = d_4 + d_8;
        let c_5 = d_5 + e_7;
        let c_6 = d_6 - d_8;
        let c_8 = c_5 - c_6;

        let b_0 = c_0 + e_3;
        let b_1 = c_1 + c_2;
        let b_2 = c_1 - c_2;
        let b_3 = c_0 - e_3;
        let b_4 = c_4 - c_8;
        let b_5 = c_8;
        let b_6 = c_6 - e_7;
        let b_7 = e_7;

        [
            b_0 + b_7,
            b_1 + b_6,
            b_2 + b_5,
            b_3 + b_4,
            b_3 - b_4,
            b_2 - b_5,
            b_1 - b_6,
            b_0 - b_7,
        ]
    }

    /// Transforms a row-major block in place, columns first, then rows.
    pub fn transform(&self, block: &mut [f32; 64]) {
        for x in 0..8 {
            let column = self.transform_1d(std::array::from_fn(|v| block[v * 8 + x]));
            for (y, value) in column.into_iter().enumerate() {
                block[y * 8 + x] = value;
            }
        }

        for row in block.chunks_exact_mut(8) {
            let mut input = [0.0; 8];
            input.copy_from_slice(row);
            row.copy_from_slice(&self.transform_1d(input));
        }
    }
}

/// Dequantizes one block, runs the inverse DCT and level-shifts the result
/// into `0..=255`.
pub fn reconstruct_block(idct: &Idct, coefficients: &[i32], quantization: &[u16; 64]) -> [u8; 64] {
    let mut block = [0.0f32; 64];
    for ((value, &coefficient), &q) in block.iter_mut().zip(coefficients).zip(quantization) {
        *value = coefficient as f32 * q as f32;
    }

    idct.transform(&mut block);

    let mut samples = [0u8; 64];
    for (sample, value) in samples.iter_mut().zip(block) {
        *sample = (value + 128.0).round().clamp(0.0, 255.0) as u8;
    }

    samples
}

/// Reconstructs every block of a component. Block rows are independent and run
/// in parallel when the `rayon` feature is enabled.
pub fn samples_from_coefficients(coefficients: &CoefficientPlane, table: &QuantizationTable) -> JpegResult<SamplePlane> {
    let idct = Idct::new();
    let stride = coefficients.blocks_per_line * 8;
    let lines = coefficients.block_lines * 8;
    let mut data: Vec<u8> = Vec::try_zeroed(stride * lines)?;

    let reconstruct_row = |(block_y, rows): (usize, &mut [u8])| {
        for block_x in 0..coefficients.blocks_per_line {
            let Some(block) = coefficients.block(block_x, block_y) else {
                continue;
            };

            let samples = reconstruct_block(&idct, block, &table.table);
            for (y, line) in samples.chunks_exact(8).enumerate() {
                let start = y * stride + block_x * 8;
                rows[start..start + 8].copy_from_slice(line);
            }
        }
    };

    #[cfg(feature = "rayon")]
    data.par_chunks_mut(stride * 8).enumerate().for_each(reconstruct_row);
    #[cfg(not(feature = "rayon"))]
    data.chunks_mut(stride * 8).enumerate().for_each(reconstruct_row);

    log::trace!(
        "Reconstructed component {}, {}x{} samples",
        coefficients.component_id,
        stride,
        lines
    );

    Ok(SamplePlane { stride, data })
}

/// JFIF YCbCr to RGB with rounding and clamping.
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;

    (
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    )
}

/// Interleaves the component planes into a row-major raster cropped to
/// `width` x `height`, converting three-component images to RGB when asked.
pub fn assemble_pixels(
    planes: &[SamplePlane],
    width: usize,
    height: usize,
    convert_to_rgb: bool,
) -> JpegResult<Vec<u8>> {
    let channels = planes.len();
    let line_size = width * channels;
    let mut pixels: Vec<u8> = Vec::try_zeroed(line_size * height)?;

    if line_size == 0 {
        return Ok(pixels);
    }

    let convert = convert_to_rgb && channels == 3;

    let fill_line = |(y, line): (usize, &mut [u8])| {
        for (x, pixel) in line.chunks_exact_mut(channels).enumerate() {
            for (sample, plane) in pixel.iter_mut().zip(planes) {
                *sample = plane.data[y * plane.stride + x];
            }

            if convert {
                let (r, g, b) = ycbcr_to_rgb(pixel[0], pixel[1], pixel[2]);
                pixel[0] = r;
                pixel[1] = g;
                pixel[2] = b;
            }
        }
    };

    #[cfg(feature = "rayon")]
    pixels.par_chunks_mut(line_size).enumerate().for_each(fill_line);
    #[cfg(not(feature = "rayon"))]
    pixels.chunks_mut(line_size).enumerate().for_each(fill_line);

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_table(value: u16) -> [u16; 64] {
        [value; 64]
    }

    fn naive_idct(coefficients: &[f32; 64]) -> [f32; 64] {
        let c = |u: usize| if u == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
        let mut output = [0.0; 64];

        for y in 0..8 {
            for x in 0..8 {
                let mut sum = 0.0f64;
                for v in 0..8 {
                    for u in 0..8 {
                        sum += c(u)
                            * c(v)
                            * coefficients[v * 8 + u] as f64
                            * ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos()
                            * ((2 * y + 1) as f64 * v as f64 * std::f64::consts::PI / 16.0).cos();
                    }
                }
                output[y * 8 + x] = (sum / 4.0) as f32;
            }
        }

        output
    }

    #[test]
    fn zero_block_is_mid_gray() {
        let samples = reconstruct_block(&Idct::new(), &[0; 64], &flat_table(1));
        assert!(samples.iter().all(|&s| s == 128));
    }

    #[test]
    fn dc_only_block_is_flat() {
        let idct = Idct::new();

        let mut coefficients = [0; 64];
        coefficients[0] = 10;
        // 10 * 16 / 8 + 128
        let samples = reconstruct_block(&idct, &coefficients, &flat_table(16));
        assert!(samples.iter().all(|&s| s == 148));

        coefficients[0] = -2000;
        let samples = reconstruct_block(&idct, &coefficients, &flat_table(1));
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn matches_direct_inverse_dct() {
        let idct = Idct::new();
        let mut block = [0.0f32; 64];
        for (i, value) in block.iter_mut().enumerate() {
            *value = (((i * 37 + 11) % 61) as f32 - 30.0) * 4.0 / (1 + i / 8) as f32;
        }

        let expected = naive_idct(&block);
        idct.transform(&mut block);

        for (actual, expected) in block.iter().zip(expected.iter()) {
            assert!((actual - expected).abs() < 0.01, "{} vs {}", actual, expected);
        }
    }

    #[test]
    fn converts_ycbcr_to_rgb() {
        assert_eq!(ycbcr_to_rgb(128, 128, 128), (128, 128, 128));
        assert_eq!(ycbcr_to_rgb(255, 128, 128), (255, 255, 255));
        // Pure red in JFIF YCbCr
        let (r, g, b) = ycbcr_to_rgb(76, 85, 255);
        assert!(r >= 254 && g <= 1 && b <= 1, "{:?}", (r, g, b));
        // Clamped on both ends
        assert_eq!(ycbcr_to_rgb(0, 128, 255), (178, 0, 0));
    }

    #[test]
    fn assembles_cropped_interleaved_raster() -> JpegResult<()> {
        let plane = |offset: u8| SamplePlane {
            stride: 16,
            data: (0..128).map(|i| (i as u8).wrapping_add(offset)).collect(),
        };
        let planes = [plane(0), plane(100)];

        let pixels = assemble_pixels(&planes, 10, 3, false)?;
        assert_eq!(pixels.len(), 10 * 3 * 2);
        // Row 2, column 9
        let index = (2 * 10 + 9) * 2;
        assert_eq!(&pixels[index..index + 2], &[2 * 16 + 9, 2 * 16 + 9 + 100]);

        Ok(())
    }

    #[test]
    fn reconstructs_plane_block_by_block() -> JpegResult<()> {
        let mut coefficients = CoefficientPlane::new(1, 2, 1)?;
        if let Some(block) = coefficients.block_mut(1, 0) {
            block[0] = 8;
        }

        let table = QuantizationTable {
            id: 0,
            precision: 0,
            table: flat_table(8),
        };
        let plane = samples_from_coefficients(&coefficients, &table)?;

        assert_eq!((plane.stride, plane.data.len()), (16, 16 * 8));
        for line in plane.data.chunks_exact(16) {
            assert!(line[..8].iter().all(|&s| s == 128));
            assert!(line[8..].iter().all(|&s| s == 136));
        }

        Ok(())
    }
}
