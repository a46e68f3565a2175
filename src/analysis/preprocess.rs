//! Size-adaptive enhancement of ROI crops before OCR
//!
//! Small crops are upscaled, denoised, contrast-equalized and sharpened, then
//! binarized two ways with the more legible result kept. Larger crops only get
//! a light blur and a global threshold. Output is always single-channel 0/255.

use crate::error::{RoiError, RoiResult};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode, open};

/// Crops below either bound take the small-ROI path
pub const SMALL_ROI_HEIGHT: u32 = 50;
pub const SMALL_ROI_WIDTH: u32 = 100;

/// Crops below either bound are upscaled 4x instead of 3x
const TINY_ROI_HEIGHT: u32 = 30;
const TINY_ROI_WIDTH: u32 = 60;

const BILATERAL_WINDOW: u32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;
const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_GRID: u32 = 8;
const UNSHARP_SIGMA: f32 = 3.0;
const ADAPTIVE_BLOCK_RADIUS: u32 = 5;
const ADAPTIVE_OFFSET: i32 = 2;
/// sigma OpenCV derives for a 3x3 Gaussian kernel
const LIGHT_BLUR_SIGMA: f32 = 0.8;

pub fn is_small_roi(width: u32, height: u32) -> bool {
    height < SMALL_ROI_HEIGHT || width < SMALL_ROI_WIDTH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessBranch {
    /// Upscale by the given factor and run the full enhancement chain
    Small { scale: u32 },
    Regular,
}

impl PreprocessBranch {
    pub fn for_size(width: u32, height: u32) -> Self {
        if is_small_roi(width, height) {
            let scale = if height < TINY_ROI_HEIGHT || width < TINY_ROI_WIDTH {
                4
            } else {
                3
            };
            PreprocessBranch::Small { scale }
        } else {
            PreprocessBranch::Regular
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoiPreprocessor;

impl RoiPreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Binarize a colour ROI crop for OCR
    pub fn preprocess(&self, roi: &RgbImage) -> RoiResult<GrayImage> {
        let (width, height) = roi.dimensions();
        if width == 0 || height == 0 {
            return Err(RoiError::invalid_image(format!(
                "cannot preprocess an empty ROI ({width}x{height})"
            )));
        }

        let gray = imageops::grayscale(roi);
        let processed = match PreprocessBranch::for_size(width, height) {
            PreprocessBranch::Small { scale } => {
                log::info!("Using enhanced preprocessing for small ROI: {width}x{height}");
                enhance_small(&gray, scale)
            }
            PreprocessBranch::Regular => binarize_regular(&gray),
        };
        Ok(processed)
    }
}

fn enhance_small(gray: &GrayImage, scale: u32) -> GrayImage {
    let upscaled = imageops::resize(
        gray,
        gray.width() * scale,
        gray.height() * scale,
        FilterType::CatmullRom,
    );
    let denoised = bilateral_filter(
        &upscaled,
        BILATERAL_WINDOW,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );
    let enhanced = clahe(&denoised, CLAHE_CLIP_LIMIT, CLAHE_GRID);
    let sharpened = unsharp_mask(&enhanced, UNSHARP_SIGMA);

    let adaptive = adaptive_mean_threshold(&sharpened, ADAPTIVE_BLOCK_RADIUS, ADAPTIVE_OFFSET);
    let global = otsu_binarize(&sharpened);

    // more white pixels is taken as more legible text retained
    let chosen = if count_foreground(&adaptive) > count_foreground(&global) {
        adaptive
    } else {
        global
    };

    close_strokes(&chosen)
}

fn binarize_regular(gray: &GrayImage) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, LIGHT_BLUR_SIGMA);
    let binary = otsu_binarize(&blurred);
    // radius 0 opening is inert; kept so both branches end in a morphology pass
    open(&binary, Norm::LInf, 0)
}

pub fn count_foreground(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p[0] > 0).count()
}

fn otsu_binarize(image: &GrayImage) -> GrayImage {
    threshold(image, otsu_level(image), ThresholdType::Binary)
}

/// Unsharp mask: `1.5 * image - 0.5 * blurred`, saturated to u8
fn unsharp_mask(image: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(image, sigma);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let e = image.get_pixel(x, y)[0] as f32;
        let b = blurred.get_pixel(x, y)[0] as f32;
        Luma([(1.5 * e - 0.5 * b).round().clamp(0.0, 255.0) as u8])
    })
}

/// Contrast-limited adaptive histogram equalization over a `grid x grid` tiling
fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    let tile_w = w.div_ceil(grid).max(1);
    let tile_h = h.div_ceil(grid).max(1);
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(&mut hist, area, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(w, h, |x, y| {
        let v = image.get_pixel(x, y)[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let (tx1, tx2, ax) = neighbour_tiles(fx, tiles_x);
        let (ty1, ty2, ay) = neighbour_tiles(fy, tiles_y);

        let top = lut_at(tx1, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx2, ty1)[v] as f32 * ax;
        let bottom = lut_at(tx1, ty2)[v] as f32 * (1.0 - ax) + lut_at(tx2, ty2)[v] as f32 * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Two tile indices bracketing a fractional tile position, and the blend weight
fn neighbour_tiles(pos: f32, tiles: u32) -> (u32, u32, f32) {
    let floor = pos.floor();
    let weight = pos - floor;
    let last = tiles as i64 - 1;
    let first = (floor as i64).clamp(0, last) as u32;
    let second = (floor as i64 + 1).clamp(0, last) as u32;
    (first, second, weight)
}

/// Clip the histogram, spread the excess evenly and build the equalization LUT
fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let batch = excess / 256;
    let residual = excess - batch * 256;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        for count in hist.iter_mut().step_by(step).take(residual as usize) {
            *count += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (value, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Mean-of-neighbourhood threshold: white where `pixel > mean - offset`.
/// Edge pixels are replicated so every window holds `(2r+1)^2` samples.
fn adaptive_mean_threshold(image: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (w, h) = image.dimensions();
    let r = block_radius as i64;
    let padded_w = w as usize + 2 * block_radius as usize;
    let padded_h = h as usize + 2 * block_radius as usize;
    let stride = padded_w + 1;

    let mut integral = vec![0u64; stride * (padded_h + 1)];
    for py in 0..padded_h {
        let sy = (py as i64 - r).clamp(0, h as i64 - 1) as u32;
        let mut row = 0u64;
        for px in 0..padded_w {
            let sx = (px as i64 - r).clamp(0, w as i64 - 1) as u32;
            row += image.get_pixel(sx, sy)[0] as u64;
            integral[(py + 1) * stride + px + 1] = integral[py * stride + px + 1] + row;
        }
    }

    let side = 2 * block_radius as usize + 1;
    let count = (side * side) as u64;
    GrayImage::from_fn(w, h, |x, y| {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + side, y0 + side);
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let mean = ((sum + count / 2) / count) as i32;
        let value = image.get_pixel(x, y)[0] as i32;
        Luma([if value > mean - offset { 255 } else { 0 }])
    })
}

/// 2x2 structuring element anchored at its bottom-right cell
fn stroke_mask() -> Mask {
    Mask::from_image(&GrayImage::from_pixel(2, 2, Luma([255])), 1, 1)
}

/// Dilate then erode once with the 2x2 mask, bridging broken strokes
fn close_strokes(image: &GrayImage) -> GrayImage {
    let mask = stroke_mask();
    grayscale_erode(&grayscale_dilate(image, &mask), &mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::textured_rgb;
    use image::Rgb;

    fn assert_binary(image: &GrayImage) {
        assert!(
            image.pixels().all(|p| p[0] == 0 || p[0] == 255),
            "output must only contain 0 and 255"
        );
    }

    /// Dark "strokes" on a light background
    fn text_like(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 3) % 4 == 0 && y > height / 4 && y < height * 3 / 4 {
                Rgb([20, 20, 20])
            } else {
                Rgb([230, 230, 230])
            }
        })
    }

    #[test]
    fn test_branch_selection() {
        assert_eq!(PreprocessBranch::for_size(200, 80), PreprocessBranch::Regular);
        assert_eq!(PreprocessBranch::for_size(100, 50), PreprocessBranch::Regular);
        assert_eq!(
            PreprocessBranch::for_size(99, 50),
            PreprocessBranch::Small { scale: 3 }
        );
        assert_eq!(
            PreprocessBranch::for_size(200, 49),
            PreprocessBranch::Small { scale: 3 }
        );
        assert_eq!(
            PreprocessBranch::for_size(200, 29),
            PreprocessBranch::Small { scale: 4 }
        );
        assert_eq!(
            PreprocessBranch::for_size(59, 45),
            PreprocessBranch::Small { scale: 4 }
        );
    }

    #[test]
    fn test_small_roi_is_upscaled_and_binary() {
        let roi = text_like(40, 20);
        let out = RoiPreprocessor::new().preprocess(&roi).unwrap();
        assert_eq!(out.dimensions(), (160, 80));
        assert_binary(&out);
    }

    #[test]
    fn test_medium_small_roi_uses_triple_scale() {
        let roi = text_like(80, 40);
        let out = RoiPreprocessor::new().preprocess(&roi).unwrap();
        assert_eq!(out.dimensions(), (240, 120));
        assert_binary(&out);
    }

    #[test]
    fn test_regular_roi_keeps_size_and_is_binary() {
        let roi = textured_rgb(160, 70, 11);
        let out = RoiPreprocessor::new().preprocess(&roi).unwrap();
        assert_eq!(out.dimensions(), (160, 70));
        assert_binary(&out);
    }

    #[test]
    fn test_regular_roi_keeps_light_background_white() {
        let roi = text_like(150, 60);
        let out = RoiPreprocessor::new().preprocess(&roi).unwrap();
        assert_eq!(out.get_pixel(1, 1)[0], 255);
        assert!(count_foreground(&out) > (150 * 60) / 2);
    }

    #[test]
    fn test_degenerate_shapes_stay_binary() {
        for (w, h) in [(1, 1), (3, 200), (250, 2), (7, 7)] {
            let out = RoiPreprocessor::new().preprocess(&textured_rgb(w, h, w + h)).unwrap();
            assert_binary(&out);
        }
    }

    #[test]
    fn test_uniform_input_stays_binary() {
        let flat = RgbImage::from_pixel(30, 12, Rgb([128, 128, 128]));
        assert_binary(&RoiPreprocessor::new().preprocess(&flat).unwrap());
    }

    #[test]
    fn test_empty_roi_is_rejected() {
        let empty = RgbImage::new(0, 10);
        assert!(RoiPreprocessor::new().preprocess(&empty).is_err());
    }

    #[test]
    fn test_dilate_then_erode_closes_single_pixel_gap() {
        // two white strokes separated by a one-pixel black column
        let mut image = GrayImage::from_pixel(7, 4, Luma([255]));
        for y in 0..4 {
            image.put_pixel(3, y, Luma([0]));
        }
        let closed = close_strokes(&image);
        assert_eq!(closed.get_pixel(3, 2)[0], 255);
        assert!(closed.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_closing_keeps_isolated_black_block() {
        let mut image = GrayImage::from_pixel(8, 8, Luma([255]));
        for y in 2..6 {
            for x in 2..6 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        let closed = close_strokes(&image);
        assert_eq!(closed.get_pixel(4, 4)[0], 0);
        assert_eq!(closed.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_otsu_splits_two_levels() {
        let image = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 40 } else { 210 }]));
        let out = otsu_binarize(&image);
        assert_eq!(out.get_pixel(2, 5)[0], 0);
        assert_eq!(out.get_pixel(15, 5)[0], 255);
    }

    #[test]
    fn test_clahe_preserves_dimensions_and_spreads_contrast() {
        let low_contrast = GrayImage::from_fn(64, 32, |x, _| Luma([100 + (x % 8) as u8]));
        let out = clahe(&low_contrast, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        assert_eq!(out.dimensions(), (64, 32));
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert!(max - min > 7, "range {min}..{max} should be stretched");
    }

    #[test]
    fn test_adaptive_threshold_marks_dark_spot() {
        let mut image = GrayImage::from_pixel(21, 21, Luma([200]));
        image.put_pixel(10, 10, Luma([10]));
        let out = adaptive_mean_threshold(&image, 5, 2);
        assert_eq!(out.get_pixel(10, 10)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_adaptive_threshold_replicates_border() {
        // the replicated edge column pulls the mean to 118, so 117 stays white;
        // a window clipped at the edge would give a mean of 119.5 and turn it black
        let mut image = GrayImage::from_pixel(30, 11, Luma([120]));
        for y in 0..11 {
            image.put_pixel(0, y, Luma([117]));
        }
        let out = adaptive_mean_threshold(&image, 5, 2);
        assert_eq!(out.get_pixel(0, 5)[0], 255);
        assert_eq!(out.get_pixel(15, 5)[0], 255);
    }
}
