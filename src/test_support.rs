//! Synthetic images shared by the unit tests

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Deterministic high-contrast texture with no repeating blocks
pub fn textured(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([noise(x, y, seed)]))
}

/// Colour version of [`textured`]; every channel carries the same value so
/// the luma of a crop equals the crop of the luma
pub fn textured_rgb(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = noise(x, y, seed);
        Rgb([v, v, v])
    })
}

/// Copy `patch` into `canvas` with its top-left at (x, y)
pub fn paste(canvas: &mut RgbImage, patch: &RgbImage, x: u32, y: u32) {
    image::imageops::replace(canvas, patch, x as i64, y as i64);
}

pub fn crop_rgb(image: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
    image::imageops::crop_imm(image, x, y, w, h).to_image()
}

fn noise(x: u32, y: u32, seed: u32) -> u8 {
    let mut v = x
        .wrapping_mul(374_761_393)
        .wrapping_add(y.wrapping_mul(668_265_263))
        .wrapping_add(seed.wrapping_mul(2_246_822_519));
    v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
    ((v ^ (v >> 16)) & 0xff) as u8
}
