//! Low-level pixel operations on decoded frames
//!
//! Everything here is deterministic integer/float math over `image` buffers;
//! no I/O and no shared state.

use image::{GrayImage, RgbImage};

/// First-order intensity statistics: (mean, std, min, max)
pub fn brightness_stats(gray: &GrayImage) -> (f64, f64, u8, u8) {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return (0.0, 0.0, 0, 0);
    }

    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum = 0.0f64;
    for &p in pixels {
        min = min.min(p);
        max = max.max(p);
        sum += p as f64;
    }
    let mean = sum / pixels.len() as f64;

    let mut var_sum = 0.0f64;
    for &p in pixels {
        let d = p as f64 - mean;
        var_sum += d * d;
    }
    let std = (var_sum / pixels.len() as f64).sqrt();

    (mean, std, min, max)
}

/// Per-channel means of an RGB frame: (r, g, b)
pub fn channel_means(rgb: &RgbImage) -> (f64, f64, f64) {
    let n = (rgb.width() as u64 * rgb.height() as u64).max(1) as f64;
    let mut sums = [0.0f64; 3];
    for p in rgb.pixels() {
        sums[0] += p.0[0] as f64;
        sums[1] += p.0[1] as f64;
        sums[2] += p.0[2] as f64;
    }
    (sums[0] / n, sums[1] / n, sums[2] / n)
}

/// 3x3 Gaussian smoothing (kernel 1-2-1 / 2-4-2 / 1-2-1, /16) with clamped
/// borders, to suppress sensor noise before thresholding
pub fn gaussian_blur_3x3(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let src = gray.as_raw();
    let mut out = vec![0u8; src.len()];

    const KERNEL: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let sx = (x + kx as i64 - 1).clamp(0, w - 1);
                    let sy = (y + ky as i64 - 1).clamp(0, h - 1);
                    acc += weight * src[(sy * w + sx) as usize] as u32;
                }
            }
            out[(y * w + x) as usize] = ((acc + 8) / 16) as u8;
        }
    }

    GrayImage::from_raw(gray.width(), gray.height(), out)
        .expect("blur output buffer matches input dimensions")
}

/// 256-bin intensity histogram
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &p in gray.as_raw() {
        hist[p as usize] += 1;
    }
    hist
}

/// Otsu's automatic threshold: the cut minimizing intra-class variance.
///
/// Returns `None` when the histogram is degenerate (uniform image, or the
/// between-class variance never rises above zero), in which case the caller
/// falls back to a fixed threshold.
pub fn otsu_threshold(hist: &[u64; 256]) -> Option<u8> {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return None;
    }
    if hist.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }

    let weighted_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;

    for t in 0..256usize {
        background_count += hist[t];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }

        background_sum += t as f64 * hist[t] as f64;
        let w_bg = background_count as f64;
        let w_fg = foreground_count as f64;
        let mean_bg = background_sum / w_bg;
        let mean_fg = (weighted_total - background_sum) / w_fg;
        let diff = mean_bg - mean_fg;
        let variance = w_bg * w_fg * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    if best_variance > 0.0 {
        Some(best_threshold)
    } else {
        None
    }
}

/// Variance of the 3x3 Sobel gradient magnitude, a texture measure used for
/// cloud detection
pub fn sobel_texture_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let src = gray.as_raw();
    let at = |x: i64, y: i64| -> i64 {
        let sx = x.clamp(0, w - 1);
        let sy = y.clamp(0, h - 1);
        src[(sy * w + sx) as usize] as i64
    };

    let n = (w * h) as f64;
    let mut sum = 0.0f64;
    let mut sq_sum = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let gx = -at(x - 1, y - 1) - 2 * at(x - 1, y) - at(x - 1, y + 1)
                + at(x + 1, y - 1)
                + 2 * at(x + 1, y)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2 * at(x, y + 1)
                + at(x + 1, y + 1);
            let magnitude = ((gx * gx + gy * gy) as f64).sqrt();
            sum += magnitude;
            sq_sum += magnitude * magnitude;
        }
    }

    let mean = sum / n;
    (sq_sum / n - mean * mean).max(0.0)
}

/// Variance of the 4-neighbor Laplacian response; low values indicate a
/// smooth (possibly wet, reflective) surface
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let src = gray.as_raw();
    let at = |x: i64, y: i64| -> i64 {
        let sx = x.clamp(0, w - 1);
        let sy = y.clamp(0, h - 1);
        src[(sy * w + sx) as usize] as i64
    };

    let n = (w * h) as f64;
    let mut sum = 0.0f64;
    let mut sq_sum = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let response =
                (at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4 * at(x, y)) as f64;
            sum += response;
            sq_sum += response * response;
        }
    }

    let mean = sum / n;
    (sq_sum / n - mean * mean).max(0.0)
}
