//! Per-ROI analysis: OCR plus target image detection, each fault-isolated

use super::config::AnalysisConfig;
use super::ocr::{OcrMode, OcrRequest, TextRecognizer};
use super::preprocess::RoiPreprocessor;
use super::targets::TargetImage;
use crate::error::{RoiError, RoiResult};
use crate::geometry::Rect;
use crate::session::{Roi, RoiSnapshot, TemplateInfo};
use chrono::{DateTime, Local};
use image::{GrayImage, RgbImage, imageops};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A target image found inside an ROI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub description: String,
    pub filename: String,
    pub confidence: f32,
    /// Top-left corner relative to the ROI crop
    pub location: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub roi_num: usize,
    pub name: String,
    pub coordinates: Rect,
    #[serde(default)]
    pub template_info: Option<TemplateInfo>,
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
    #[serde(default)]
    pub target_matches: Vec<MatchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_match_error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        self.ocr_error.is_some() || self.target_match_error.is_some()
    }
}

/// Runs preprocessing, OCR and target matching for ROI crops.
///
/// Holds only read-only configuration, so one analyzer can be cloned into
/// worker threads and called on distinct frames concurrently.
#[derive(Clone)]
pub struct RoiAnalyzer {
    recognizer: Arc<dyn TextRecognizer>,
    preprocessor: RoiPreprocessor,
    config: AnalysisConfig,
}

impl RoiAnalyzer {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: AnalysisConfig) -> Self {
        Self {
            recognizer,
            preprocessor: RoiPreprocessor::new(),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one ROI crop. Never fails: faults land on the result.
    pub fn analyze(
        &self,
        roi: &Roi,
        coordinates: Rect,
        crop: &RgbImage,
        targets: &[TargetImage],
    ) -> AnalysisResult {
        let (width, height) = crop.dimensions();
        let processed = self.preprocessor.preprocess(crop);

        let (ocr_text, ocr_error) = match &processed {
            Ok(binary) => match self.read_text(binary, width, height) {
                Ok(text) => (Some(text), None),
                Err(e) => {
                    log::warn!("OCR failed for ROI {}: {e}", roi.roi_num);
                    (None, Some(e.to_string()))
                }
            },
            Err(e) => {
                log::warn!("Preprocessing failed for ROI {}: {e}", roi.roi_num);
                (None, Some(e.to_string()))
            }
        };

        let (target_matches, target_match_error) = if targets.is_empty() {
            (Vec::new(), None)
        } else {
            match self.check_targets(crop, targets) {
                Ok(matches) => (matches, None),
                Err(e) => {
                    log::warn!("Target matching failed for ROI {}: {e}", roi.roi_num);
                    (Vec::new(), Some(format!("Target matching error: {e}")))
                }
            }
        };

        if let Some(dir) = &self.config.debug_dir {
            save_debug_images(dir, roi.roi_num, crop, processed.as_ref().ok());
        }

        AnalysisResult {
            roi_num: roi.roi_num,
            name: roi.name.clone(),
            coordinates,
            template_info: roi.template_info.clone(),
            ocr_text,
            ocr_error,
            target_matches,
            target_match_error,
            timestamp: Local::now(),
        }
    }

    fn read_text(&self, binary: &GrayImage, roi_width: u32, roi_height: u32) -> RoiResult<String> {
        let request = OcrRequest {
            language: self.config.ocr_language.clone(),
            mode: OcrMode::select(roi_width, roi_height, self.config.numbers_only),
        };
        self.recognizer.recognize(binary, &request)
    }

    /// Every target at or above the threshold, in target order
    pub fn check_targets(
        &self,
        crop: &RgbImage,
        targets: &[TargetImage],
    ) -> RoiResult<Vec<MatchResult>> {
        let haystack = imageops::grayscale(crop);
        let matcher = self.config.matcher();
        let mut matches = Vec::new();

        for target in targets {
            if let Some(outcome) = matcher.find(&haystack, target.gray())? {
                log::debug!(
                    "🎯 {} found at {:?} ({:.3})",
                    target.filename,
                    outcome.top_left,
                    outcome.confidence
                );
                matches.push(MatchResult {
                    description: target.description.clone(),
                    filename: target.filename.clone(),
                    confidence: outcome.confidence,
                    location: outcome.top_left,
                });
            }
        }
        Ok(matches)
    }

    /// Analyze every ROI of a snapshot against one full image.
    ///
    /// An empty image is the only hard failure. In live mode
    /// (`min_live_roi_size` set) ROIs that start outside the frame or end up
    /// thinner than the minimum are left out of the results.
    pub fn analyze_snapshot(
        &self,
        image: &RgbImage,
        snapshot: &RoiSnapshot,
        targets: &[TargetImage],
    ) -> RoiResult<Vec<AnalysisResult>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RoiError::invalid_image("cannot analyze an empty image"));
        }

        log::info!("Analyzing {} ROIs...", snapshot.rois().len());
        if !targets.is_empty() {
            log::info!("Using {} target images for detection", targets.len());
        }

        let mut results = Vec::with_capacity(snapshot.rois().len());
        for roi in snapshot.rois() {
            let Some(area) = self.crop_area(roi.rect, width, height) else {
                log::debug!("Skipping ROI {} ({}) outside the frame", roi.roi_num, roi.rect);
                continue;
            };
            let crop = imageops::crop_imm(
                image,
                area.x1 as u32,
                area.y1 as u32,
                area.width(),
                area.height(),
            )
            .to_image();
            results.push(self.analyze(roi, area, &crop, targets));
        }
        Ok(results)
    }

    fn crop_area(&self, rect: Rect, width: u32, height: u32) -> Option<Rect> {
        let Some(min_size) = self.config.min_live_roi_size else {
            return Some(rect.normalized_within(width, height));
        };

        let rect = rect.normalized();
        if rect.x1 >= width as i32 || rect.y1 >= height as i32 {
            return None;
        }
        let area = rect.clipped(width, height);
        if area.width() < min_size || area.height() < min_size {
            return None;
        }
        Some(area)
    }
}

fn save_debug_images(
    dir: &Path,
    roi_num: usize,
    original: &RgbImage,
    processed: Option<&GrayImage>,
) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("Cannot create debug directory {}: {e}", dir.display());
        return;
    }
    if original.width() > 0 && original.height() > 0 {
        let path = dir.join(format!("roi_{roi_num}_original.png"));
        if let Err(e) = original.save(&path) {
            log::warn!("Failed to save {}: {e}", path.display());
        }
    }
    if let Some(processed) = processed {
        let path = dir.join(format!("roi_{roi_num}_processed.png"));
        if let Err(e) = processed.save(&path) {
            log::warn!("Failed to save {}: {e}", path.display());
        }
    }
}
