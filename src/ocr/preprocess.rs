//! Image preprocessing for OCR
//!
//! Turns an arbitrary color crop into a black/white bitmap:
//! luminance conversion, non-local means denoising, then Otsu binarization.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use serde::Deserialize;

/// Non-local means denoising parameters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DenoiseParams {
    /// Filter strength `h`. Larger values remove more noise and more detail.
    pub strength: f32,
    /// Side of the square patch compared between pixels (odd)
    pub template_window: u32,
    /// Side of the square area searched for similar patches (odd)
    pub search_window: u32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

impl DenoiseParams {
    pub fn is_valid(&self) -> bool {
        self.strength.is_finite()
            && self.strength > 0.0
            && self.template_window % 2 == 1
            && self.search_window % 2 == 1
    }
}

/// Convert a crop into a binary image of the same dimensions.
///
/// The caller must not pass a zero-area image.
pub fn preprocess(image: &DynamicImage, params: &DenoiseParams) -> GrayImage {
    let gray = to_luminance(&image.to_rgb8());
    let denoised = denoise_nl_means(&gray, params);
    binarize_otsu(&denoised)
}

/// ITU-R 601-2 luma transform.
pub fn to_luminance(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        Luma([luma as u8])
    })
}

/// Non-local means denoising of a grayscale image.
///
/// Every pixel becomes the weighted mean of the pixels in its search window,
/// each weighted by `exp(-(mean squared patch difference) / h^2)`. Patch sums
/// are computed per search offset with an integral image, so the cost is
/// independent of the template size. Borders are reflected (101).
pub fn denoise_nl_means(image: &GrayImage, params: &DenoiseParams) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let (w, h) = (i64::from(width), i64::from(height));
    let tr = i64::from(params.template_window / 2);
    let sr = i64::from(params.search_window / 2);
    let pad = tr + sr;
    let (pw, ph) = (w + 2 * pad, h + 2 * pad);

    let mut padded = Vec::with_capacity((pw * ph) as usize);
    for y in 0..ph {
        let sy = reflect101(y - pad, h) as u32;
        for x in 0..pw {
            let sx = reflect101(x - pad, w) as u32;
            padded.push(i64::from(image.get_pixel(sx, sy)[0]));
        }
    }

    let template_area = (params.template_window * params.template_window) as f32;
    let h2 = params.strength * params.strength;

    // Patch centers plus the template margin
    let (rw, rh) = (w + 2 * tr, h + 2 * tr);
    let stride = (rw + 1) as usize;
    let mut integral = vec![0u64; stride * (rh + 1) as usize];

    let pixel_count = (w * h) as usize;
    let mut weight_sum = vec![0f32; pixel_count];
    let mut value_sum = vec![0f32; pixel_count];

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            for ry in 0..rh {
                let py = ry + sr;
                let mut row = 0u64;
                for rx in 0..rw {
                    let px = rx + sr;
                    let a = padded[(py * pw + px) as usize];
                    let b = padded[((py + dy) * pw + px + dx) as usize];
                    let d = a - b;
                    row += (d * d) as u64;
                    let above = integral[ry as usize * stride + (rx + 1) as usize];
                    integral[(ry + 1) as usize * stride + (rx + 1) as usize] = above + row;
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let (x0, y0) = (x as usize, y as usize);
                    let (x1, y1) = ((x + 2 * tr + 1) as usize, (y + 2 * tr + 1) as usize);
                    let ssd = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                        - integral[y0 * stride + x1]
                        - integral[y1 * stride + x0];

                    let weight = (-(ssd as f32 / template_area) / h2).exp();
                    let candidate = padded[((y + pad + dy) * pw + x + pad + dx) as usize];

                    let idx = (y * w + x) as usize;
                    weight_sum[idx] += weight;
                    value_sum[idx] += weight * candidate as f32;
                }
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let idx = (y * width + x) as usize;
        // The zero offset always contributes weight 1
        let value = value_sum[idx] / weight_sum[idx];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Global Otsu threshold: pixels above the level become white, the rest black.
pub fn binarize_otsu(image: &GrayImage) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let level = otsu_level(image);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Reflect an index into `0..len` without repeating the edge pixel.
fn reflect101(index: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = index.rem_euclid(period);
    if i >= len {
        period - i
    } else {
        i
    }
}
