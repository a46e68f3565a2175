//! Analysis results with run metadata, field filtering and export

use crate::analysis::{AnalysisConfig, AnalysisResult, TargetImage};
use crate::error::RoiResult;
use crate::persist::write_json_pretty;
use crate::template_matching::MatchMethod;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub ocr_language: String,
    pub match_threshold: f32,
    pub match_method: MatchMethod,
}

impl From<&AnalysisConfig> for RunSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            ocr_language: config.ocr_language.clone(),
            match_threshold: config.match_threshold,
            match_method: config.match_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDimensions {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub timestamp: DateTime<Local>,
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_dimensions: Option<WindowDimensions>,
    pub settings: RunSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub filename: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: RunMetadata,
    #[serde(default)]
    pub target_images: Vec<TargetSummary>,
    pub results: Vec<AnalysisResult>,
}

impl AnalysisReport {
    pub fn new(
        config: &AnalysisConfig,
        image_path: Option<&Path>,
        window_dimensions: Option<WindowDimensions>,
        targets: &[TargetImage],
        results: Vec<AnalysisResult>,
    ) -> Self {
        Self {
            metadata: RunMetadata {
                timestamp: Local::now(),
                image_path: image_path.map(|p| p.to_string_lossy().to_string()),
                window_dimensions,
                settings: RunSettings::from(config),
            },
            target_images: targets
                .iter()
                .map(|t| TargetSummary {
                    filename: t.filename.clone(),
                    description: t.description.clone(),
                })
                .collect(),
            results,
        }
    }

    /// JSON view restricted to the fields `settings` enables
    pub fn filtered(&self, settings: &OutputSettings) -> RoiResult<Value> {
        let full = serde_json::to_value(self)?;
        Ok(settings.filter(&full))
    }
}

/// Which fields an exported report keeps; everything is on by default.
/// `roi_num` is always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub include_metadata: bool,
    pub include_timestamp: bool,
    pub include_image_path: bool,
    pub include_settings: bool,
    pub include_roi_name: bool,
    pub include_coordinates: bool,
    pub include_template_info: bool,
    pub include_ocr_text: bool,
    pub include_target_matches: bool,
    pub include_confidence_scores: bool,
    pub include_errors: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_timestamp: true,
            include_image_path: true,
            include_settings: true,
            include_roi_name: true,
            include_coordinates: true,
            include_template_info: true,
            include_ocr_text: true,
            include_target_matches: true,
            include_confidence_scores: true,
            include_errors: true,
        }
    }
}

impl OutputSettings {
    /// Filter a serialized [`AnalysisReport`]
    pub fn filter(&self, report: &Value) -> Value {
        let mut out = Map::new();

        if self.include_metadata
            && let Some(metadata) = report.get("metadata")
        {
            let mut kept = Map::new();
            copy_if(self.include_timestamp, metadata, &mut kept, "timestamp");
            copy_if(self.include_image_path, metadata, &mut kept, "image_path");
            copy_if(self.include_settings, metadata, &mut kept, "settings");
            if !kept.is_empty() {
                out.insert("metadata".to_string(), Value::Object(kept));
            }
            copy_if(true, report, &mut out, "target_images");
        }

        if let Some(results) = report.get("results").and_then(Value::as_array) {
            let filtered: Vec<Value> = results.iter().map(|roi| self.filter_roi(roi)).collect();
            out.insert("results".to_string(), Value::Array(filtered));
        }

        Value::Object(out)
    }

    fn filter_roi(&self, roi: &Value) -> Value {
        let mut kept = Map::new();
        kept.insert(
            "roi_num".to_string(),
            roi.get("roi_num").cloned().unwrap_or(Value::Null),
        );
        copy_if(self.include_roi_name, roi, &mut kept, "name");
        copy_if(self.include_coordinates, roi, &mut kept, "coordinates");
        copy_if(self.include_template_info, roi, &mut kept, "template_info");
        copy_if(self.include_ocr_text, roi, &mut kept, "ocr_text");

        if self.include_target_matches
            && let Some(matches) = roi.get("target_matches")
        {
            let matches = if self.include_confidence_scores {
                matches.clone()
            } else {
                let reduced: Vec<Value> = matches
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .map(|m| json!({ "description": m.get("description") }))
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Array(reduced)
            };
            kept.insert("target_matches".to_string(), matches);
        }

        copy_if(self.include_errors, roi, &mut kept, "ocr_error");
        copy_if(self.include_errors, roi, &mut kept, "target_match_error");
        Value::Object(kept)
    }
}

fn copy_if(enabled: bool, from: &Value, to: &mut Map<String, Value>, key: &str) {
    if enabled && let Some(value) = from.get(key) {
        to.insert(key.to_string(), value.clone());
    }
}

/// Write the filtered report as pretty JSON
pub fn save_report(path: &Path, report: &AnalysisReport, settings: &OutputSettings) -> RoiResult<()> {
    let filtered = report.filtered(settings)?;
    write_json_pretty(path, &filtered)?;
    log::info!("Results saved to {}", path.display());
    Ok(())
}
