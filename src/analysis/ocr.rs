//! OCR backends behind a small trait so analysis does not depend on one engine

use super::preprocess::is_small_roi;
use crate::error::{RoiError, RoiResult};
use image::{DynamicImage, GrayImage};
use std::collections::HashMap;

/// Characters allowed in numeric single-line mode
pub const NUMERIC_WHITELIST: &str = "0123456789.,-";

/// Recognition mode handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    /// One line of digits and `.,-` only
    SingleLineNumeric,
    /// General multi-line text
    Block,
}

impl OcrMode {
    /// Small crops and numbers-only runs read as a single numeric line
    pub fn select(roi_width: u32, roi_height: u32, numbers_only: bool) -> Self {
        if numbers_only || is_small_roi(roi_width, roi_height) {
            OcrMode::SingleLineNumeric
        } else {
            OcrMode::Block
        }
    }

    /// Tesseract page segmentation mode
    pub fn page_segmentation(self) -> i32 {
        match self {
            OcrMode::SingleLineNumeric => 7,
            OcrMode::Block => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    pub language: String,
    pub mode: OcrMode,
}

/// Every OCR backend implements this
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize text in a preprocessed, binarized crop; result is trimmed
    fn recognize(&self, image: &GrayImage, request: &OcrRequest) -> RoiResult<String>;
}

/// Tesseract via the `tesseract` executable (LSTM engine, OEM 1)
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    dpi: i32,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self { dpi: 150 }
    }

    pub fn with_dpi(dpi: i32) -> Self {
        Self { dpi }
    }

    fn args_for(&self, request: &OcrRequest) -> rusty_tesseract::Args {
        let mut config_variables = HashMap::new();
        if request.mode == OcrMode::SingleLineNumeric {
            config_variables.insert(
                "tessedit_char_whitelist".to_string(),
                NUMERIC_WHITELIST.to_string(),
            );
        }

        rusty_tesseract::Args {
            lang: request.language.clone(),
            config_variables,
            dpi: Some(self.dpi),
            psm: Some(request.mode.page_segmentation()),
            oem: Some(1),
        }
    }

    fn ocr_error(&self, description: impl std::fmt::Display) -> RoiError {
        RoiError::Ocr {
            engine: self.name().to_string(),
            description: description.to_string(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, request: &OcrRequest) -> RoiResult<String> {
        let dynamic = DynamicImage::ImageLuma8(image.clone());
        let tess_image =
            rusty_tesseract::Image::from_dynamic_image(&dynamic).map_err(|e| self.ocr_error(e))?;
        let args = self.args_for(request);

        log::debug!(
            "🔤 tesseract lang={} psm={:?} ({}x{})",
            args.lang,
            args.psm,
            image.width(),
            image.height()
        );

        let text =
            rusty_tesseract::image_to_string(&tess_image, &args).map_err(|e| self.ocr_error(e))?;
        Ok(text.trim().to_string())
    }
}
