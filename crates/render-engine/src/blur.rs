//! Separable gaussian blur on interleaved 8-bit buffers.
//!
//! Used for the video frame blur (RGBA) and for soft tag shadows (single
//! channel coverage). Weights are fixed-point Q16 so results are
//! deterministic across platforms.

use image::RgbaImage;

use vivitag_common::error::{VivitagError, VivitagResult};

/// Blur an RGBA image with the given standard deviation in pixels.
///
/// `sigma_px == 0` returns an unchanged copy.
pub fn blur_image(src: &RgbaImage, sigma_px: u32) -> VivitagResult<RgbaImage> {
    if sigma_px == 0 {
        return Ok(src.clone());
    }
    let (width, height) = src.dimensions();
    let out = blur_interleaved(
        src.as_raw(),
        width,
        height,
        4,
        kernel_radius(sigma_px as f32),
        sigma_px as f32,
    )?;
    RgbaImage::from_raw(width, height, out)
        .ok_or_else(|| VivitagError::render("blurred buffer does not match frame size"))
}

/// Kernel radius covering two standard deviations.
pub fn kernel_radius(sigma: f32) -> u32 {
    (sigma * 2.0).ceil().max(0.0) as u32
}

/// Blur an interleaved buffer of `channels` bytes per pixel.
pub fn blur_interleaved(
    src: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    radius: u32,
    sigma: f32,
) -> VivitagResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| VivitagError::render("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(VivitagError::render(format!(
            "blur expects {expected_len} bytes for {width}x{height}x{channels}, got {}",
            src.len()
        )));
    }
    if radius == 0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    let dims = Dims {
        width: width as i32,
        height: height as i32,
        channels,
    };
    horizontal_pass(src, &mut tmp, dims, &kernel);
    vertical_pass(&tmp, &mut out, dims, &kernel);
    Ok(out)
}

#[derive(Clone, Copy)]
struct Dims {
    width: i32,
    height: i32,
    channels: usize,
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> VivitagResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(VivitagError::render("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = i as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(VivitagError::render("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();

    // Put rounding error on the centre tap so weights sum to exactly 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], dims: Dims, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let Dims {
        width: w,
        height: h,
        channels: ch,
    } = dims;
    let mut acc = vec![0u64; ch];
    for y in 0..h {
        for x in 0..w {
            acc.iter_mut().for_each(|a| *a = 0);
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * ch;
                for c in 0..ch {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * ch;
            for c in 0..ch {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], dims: Dims, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let Dims {
        width: w,
        height: h,
        channels: ch,
    } = dims;
    let mut acc = vec![0u64; ch];
    for y in 0..h {
        for x in 0..w {
            acc.iter_mut().for_each(|a| *a = 0);
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * ch;
                for c in 0..ch {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * ch;
            for c in 0..ch {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sigma_is_identity() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([9, 8, 7, 255]));
        assert_eq!(blur_image(&img, 0).unwrap(), img);
    }

    #[test]
    fn test_constant_image_is_unchanged() {
        let img = RgbaImage::from_pixel(6, 5, image::Rgba([10, 20, 30, 255]));
        assert_eq!(blur_image(&img, 3).unwrap(), img);
    }

    #[test]
    fn test_single_channel_spreads_energy() {
        let (w, h) = (7u32, 7u32);
        let mut src = vec![0u8; (w * h) as usize];
        src[(3 * w + 3) as usize] = 255;
        let out = blur_interleaved(&src, w, h, 1, 2, 1.0).unwrap();
        assert!(out[(3 * w + 3) as usize] < 255);
        assert!(out[(3 * w + 4) as usize] > 0);
        assert!(out[(2 * w + 3) as usize] > 0);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        assert!(blur_interleaved(&[0u8; 5], 2, 2, 1, 1, 1.0).is_err());
    }

    #[test]
    fn test_kernel_weights_sum_to_one() {
        let k = gaussian_kernel_q16(8, 4.0).unwrap();
        assert_eq!(k.len(), 17);
        assert_eq!(k.iter().map(|&w| w as u64).sum::<u64>(), 65536);
    }
}
