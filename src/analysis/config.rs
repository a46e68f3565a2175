//! Settings for an analysis run

use crate::template_matching::{ImageMatcher, MatchMethod};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    pub ocr_language: String,
    /// Restrict OCR to digits and `.,-` for every ROI, not only small ones
    pub numbers_only: bool,
    /// Method used to match target images inside ROIs
    pub match_method: MatchMethod,
    /// Minimum confidence for a target match (0.0 to 1.0)
    pub match_threshold: f32,
    /// Write original and preprocessed crops here when set
    pub debug_dir: Option<PathBuf>,
    /// Live frames: skip ROIs that start outside the frame or are thinner than this
    pub min_live_roi_size: Option<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ocr_language: "eng".to_string(),
            numbers_only: false,
            match_method: MatchMethod::CCoeffNormed,
            match_threshold: 0.7,
            debug_dir: None,
            min_live_roi_size: None,
        }
    }
}

impl AnalysisConfig {
    pub fn matcher(&self) -> ImageMatcher {
        ImageMatcher::new(self.match_method, self.match_threshold)
    }
}

/// Configuration preset for dashboards of numeric read-outs
pub fn numeric_config() -> AnalysisConfig {
    AnalysisConfig {
        numbers_only: true,
        ..AnalysisConfig::default()
    }
}

/// Configuration preset for repeated analysis of captured frames
pub fn live_config() -> AnalysisConfig {
    AnalysisConfig {
        min_live_roi_size: Some(5),
        ..AnalysisConfig::default()
    }
}
