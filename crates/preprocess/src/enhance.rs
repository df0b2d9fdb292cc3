//! Contrast enhancement applied to the resized image before normalization.
//!
//! The L\*a\*b\* encoding follows the common 8-bit convention: L scaled from
//! 0..100 to 0..255, a and b offset by 128. CLAHE only touches L, so hue is
//! preserved.

use crate::config::{CONTRAST_FACTOR, SHARPEN_KERNEL};
use crate::error::EnhanceError;
use common::span_debug;
use image::RgbImage;

const HIST_SIZE: usize = 256;

// D65 white point
const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;

const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA: f32 = 903.3;

/// Run a fallible enhancement and keep the input when it fails.
///
/// Enhancement only changes image quality, so a failure is logged as a
/// warning and the unenhanced value is passed through on purpose.
pub fn best_effort<T, E, F>(input: T, stage: &'static str, f: F) -> T
where
    F: FnOnce(&T) -> Result<T, E>,
    E: std::fmt::Display,
{
    match f(&input) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(stage, error = %e, "Enhancement failed, using unenhanced image");
            input
        }
    }
}

/// CLAHE on the luminance channel of an RGB image.
pub fn equalize_luminance(
    image: &RgbImage,
    clip_limit: f32,
    grid: (usize, usize),
) -> Result<RgbImage, EnhanceError> {
    let _s = span_debug!("equalize_luminance");

    let (width, height) = (image.width() as usize, image.height() as usize);
    let [mut l, a, b] = rgb_to_lab_planes(image);
    l = clahe(&l, width, height, clip_limit, grid)?;

    Ok(lab_planes_to_rgb(&[l, a, b], image.width(), image.height()))
}

/// Split an RGB image into 8-bit encoded L, a, b planes.
pub fn rgb_to_lab_planes(image: &RgbImage) -> [Vec<u8>; 3] {
    let len = (image.width() * image.height()) as usize;
    let mut planes = [
        Vec::with_capacity(len),
        Vec::with_capacity(len),
        Vec::with_capacity(len),
    ];

    for px in image.pixels() {
        let [l, a, b] = rgb_to_lab(px.0);
        planes[0].push(l);
        planes[1].push(a);
        planes[2].push(b);
    }

    planes
}

pub fn lab_planes_to_rgb(planes: &[Vec<u8>; 3], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let i = (y * width + x) as usize;
        image::Rgb(lab_to_rgb([planes[0][i], planes[1][i], planes[2][i]]))
    })
}

fn rgb_to_lab([r, g, b]: [u8; 3]) -> [u8; 3] {
    let r = srgb_to_linear(r as f32 / 255.0);
    let g = srgb_to_linear(g as f32 / 255.0);
    let b = srgb_to_linear(b as f32 / 255.0);

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));

    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        LAB_KAPPA * y
    };
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);

    [
        saturate(l * 255.0 / 100.0),
        saturate(a + 128.0),
        saturate(b + 128.0),
    ]
}

fn lab_to_rgb([l, a, b]: [u8; 3]) -> [u8; 3] {
    let l = l as f32 * 100.0 / 255.0;
    let a = a as f32 - 128.0;
    let b = b as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let y = if l > LAB_KAPPA * LAB_EPSILON {
        fy * fy * fy
    } else {
        l / LAB_KAPPA
    };
    let x = lab_f_inv(fx) * WHITE_X;
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    [
        saturate(linear_to_srgb(r) * 255.0),
        saturate(linear_to_srgb(g) * 255.0),
        saturate(linear_to_srgb(b) * 255.0),
    ]
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > LAB_EPSILON {
        cube
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Contrast-limited adaptive histogram equalization of a single 8-bit plane.
///
/// `grid` is (columns, rows) and must divide the plane evenly. The clip limit
/// is relative to a uniform histogram: the absolute per-bin limit is
/// `clip_limit * tile_area / 256`, at least 1. A clip limit of 0 disables
/// clipping (plain adaptive equalization). Pixels are mapped by bilinear
/// interpolation between the lookup tables of the four nearest tile centers.
pub fn clahe(
    plane: &[u8],
    width: usize,
    height: usize,
    clip_limit: f32,
    grid: (usize, usize),
) -> Result<Vec<u8>, EnhanceError> {
    let (cols, rows) = grid;

    if plane.len() != width * height {
        return Err(EnhanceError::PlaneLength {
            expected: width * height,
            got: plane.len(),
        });
    }
    if !clip_limit.is_finite() || clip_limit < 0.0 {
        return Err(EnhanceError::InvalidClipLimit(clip_limit));
    }
    if cols == 0 || rows == 0 || width % cols != 0 || height % rows != 0 {
        return Err(EnhanceError::UnevenTiles {
            width,
            height,
            cols,
            rows,
        });
    }

    let tile_w = width / cols;
    let tile_h = height / rows;
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        Some(((clip_limit * tile_area as f32 / HIST_SIZE as f32) as usize).max(1))
    } else {
        None
    };

    let mut luts = Vec::with_capacity(cols * rows);
    for ty in 0..rows {
        for tx in 0..cols {
            let mut hist = [0usize; HIST_SIZE];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let row = &plane[y * width + tx * tile_w..y * width + (tx + 1) * tile_w];
                for &v in row {
                    hist[v as usize] += 1;
                }
            }
            if let Some(limit) = clip {
                clip_histogram(&mut hist, limit);
            }
            luts.push(cumulative_lut(&hist, tile_area));
        }
    }

    let mut out = vec![0u8; plane.len()];
    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;

    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor();
        let ya = tyf - ty1;
        let ty2 = ((ty1 as isize) + 1).min(rows as isize - 1) as usize;
        let ty1 = (ty1 as isize).max(0) as usize;

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor();
            let xa = txf - tx1;
            let tx2 = ((tx1 as isize) + 1).min(cols as isize - 1) as usize;
            let tx1 = (tx1 as isize).max(0) as usize;

            let v = plane[y * width + x] as usize;
            let lut = |ty: usize, tx: usize| luts[ty * cols + tx][v] as f32;

            let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
            let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
            out[y * width + x] = saturate(top * (1.0 - ya) + bottom * ya);
        }
    }

    Ok(out)
}

/// Cap every bin at `limit` and spread the excess evenly, the remainder one
/// count at a time across evenly spaced bins.
fn clip_histogram(hist: &mut [usize; HIST_SIZE], limit: usize) {
    let mut excess = 0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / HIST_SIZE;
    let mut residual = excess - batch * HIST_SIZE;

    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

fn cumulative_lut(hist: &[usize; HIST_SIZE], tile_area: usize) -> [u8; HIST_SIZE] {
    let scale = (HIST_SIZE - 1) as f32 / tile_area as f32;
    let mut lut = [0u8; HIST_SIZE];
    let mut sum = 0;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *entry = saturate(sum as f32 * scale);
    }
    lut
}

/// 3x3 sharpening convolution, borders reflected without repeating the edge
/// pixel.
pub fn sharpen(image: &RgbImage) -> RgbImage {
    let (w, h) = (image.width() as i64, image.height() as i64);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let mut acc = [0i32; 3];
        for (ky, kernel_row) in SHARPEN_KERNEL.iter().enumerate() {
            for (kx, &k) in kernel_row.iter().enumerate() {
                let sx = reflect_101(x as i64 + kx as i64 - 1, w);
                let sy = reflect_101(y as i64 + ky as i64 - 1, h);
                let px = image.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += k * px[c] as i32;
                }
            }
        }
        image::Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

fn reflect_101(i: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let r = if i < 0 {
        -i
    } else if i >= len {
        2 * len - 2 - i
    } else {
        i
    };
    r as u32
}

/// Global min/max stretch followed by a fixed contrast gain around mid-gray.
pub fn stretch_contrast(image: &RgbImage) -> RgbImage {
    let raw = image.as_raw();
    let (min, max) = raw
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = (max as f32 - min as f32) + 1e-8;

    let data = raw
        .iter()
        .map(|&v| {
            let norm = (v as f32 - min as f32) / range;
            let adjusted = ((norm - 0.5) * CONTRAST_FACTOR + 0.5).clamp(0.0, 1.0);
            (adjusted * 255.0) as u8
        })
        .collect();

    // Same dimensions and channel count as the input.
    RgbImage::from_vec(image.width(), image.height(), data).unwrap_or_else(|| image.clone())
}
