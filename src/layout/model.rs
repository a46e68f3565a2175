//! Template data model and the builder that validates new templates

use crate::error::{RoiError, RoiResult};
use crate::geometry::Rect;
use crate::persist::load_rgb;
use crate::session::Roi;
use crate::template_matching::MatchMethod;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_threshold() -> f32 {
    0.7
}

/// One ROI stored in a template, in template image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiDefinition {
    pub name: String,
    pub coordinates: Rect,
    #[serde(default)]
    pub roi_num: usize,
    /// Fixed ROIs follow window scaling only; the rest follow the solved transform
    #[serde(default = "default_true")]
    pub is_fixed: bool,
}

/// Anchor used only to re-locate the template in a new image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRegion {
    pub name: String,
    pub coordinates: Rect,
}

/// A reusable ROI layout for one screen.
///
/// The name doubles as the file stem when stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub rois: Vec<RoiDefinition>,
    #[serde(default = "default_threshold")]
    pub match_threshold: f32,
    #[serde(default)]
    pub match_method: MatchMethod,
    #[serde(default)]
    pub template_regions: Vec<ReferenceRegion>,
    #[serde(default)]
    pub window_size: (u32, u32),
}

impl Template {
    pub fn has_template_matched_rois(&self) -> bool {
        self.rois.iter().any(|roi| !roi.is_fixed)
    }

    pub fn fixed_count(&self) -> usize {
        self.rois.iter().filter(|roi| roi.is_fixed).count()
    }

    pub fn load_image(&self) -> RoiResult<RgbImage> {
        let path = self
            .image_path
            .as_deref()
            .ok_or_else(|| RoiError::InvalidTemplate {
                description: format!("template '{}' has no image path", self.name),
            })?;
        load_rgb(Path::new(path))
    }

    /// The creation-time rules; loading does not enforce them
    pub fn validate(&self) -> RoiResult<()> {
        if self.name.trim().is_empty() {
            return Err(RoiError::InvalidTemplate {
                description: "template name cannot be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(RoiError::InvalidTemplate {
                description: format!(
                    "match threshold {} is outside 0.0..=1.0",
                    self.match_threshold
                ),
            });
        }
        if self.has_template_matched_rois() && self.template_regions.is_empty() {
            return Err(RoiError::MissingReferenceRegions {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Assembles a [`Template`] from session ROIs and reference regions
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    name: String,
    image_path: Option<String>,
    window_size: (u32, u32),
    match_method: MatchMethod,
    match_threshold: f32,
    rois: Vec<RoiDefinition>,
    regions: Vec<ReferenceRegion>,
}

impl TemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_path: None,
            window_size: (0, 0),
            match_method: MatchMethod::default(),
            match_threshold: default_threshold(),
            rois: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn image_path(mut self, path: &Path) -> Self {
        self.image_path = Some(path.to_string_lossy().to_string());
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    pub fn match_method(mut self, method: MatchMethod) -> Self {
        self.match_method = method;
        self
    }

    pub fn match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn roi(mut self, name: impl Into<String>, coordinates: Rect, is_fixed: bool) -> Self {
        let roi_num = self.rois.len() + 1;
        self.rois.push(RoiDefinition {
            name: name.into(),
            coordinates: coordinates.normalized(),
            roi_num,
            is_fixed,
        });
        self
    }

    /// Add a session ROI, keeping its number and name
    pub fn session_roi(mut self, roi: &Roi, is_fixed: bool) -> Self {
        self.rois.push(RoiDefinition {
            name: roi.name.clone(),
            coordinates: roi.rect,
            roi_num: roi.roi_num,
            is_fixed,
        });
        self
    }

    pub fn reference_region(mut self, name: impl Into<String>, coordinates: Rect) -> Self {
        self.regions.push(ReferenceRegion {
            name: name.into(),
            coordinates: coordinates.normalized(),
        });
        self
    }

    pub fn build(self) -> RoiResult<Template> {
        let template = Template {
            name: self.name.trim().to_string(),
            image_path: self.image_path,
            rois: self.rois,
            match_threshold: self.match_threshold,
            match_method: self.match_method,
            template_regions: self.regions,
            window_size: self.window_size,
        };
        template.validate()?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let json = r#"{
            "name": "legacy",
            "rois": [{"name": "Gold", "coordinates": [1, 2, 30, 40], "roi_num": 1}],
            "match_threshold": 0.8,
            "match_method": 3
        }"#;
        let template: Template = serde_json::from_str(json).unwrap();

        assert!(template.image_path.is_none());
        assert!(template.template_regions.is_empty());
        assert_eq!(template.window_size, (0, 0));
        assert!(template.rois[0].is_fixed);
        assert_eq!(template.match_method, MatchMethod::CCorrNormed);
        // loading does not enforce creation rules
        assert!(!template.has_template_matched_rois());
    }

    #[test]
    fn test_matched_roi_needs_reference_region() {
        let err = TemplateBuilder::new("hud")
            .roi("Score", Rect::new(0, 0, 50, 20), false)
            .build()
            .unwrap_err();
        assert!(matches!(err, RoiError::MissingReferenceRegions { .. }));

        let template = TemplateBuilder::new("hud")
            .roi("Score", Rect::new(0, 0, 50, 20), false)
            .reference_region("Logo", Rect::new(60, 0, 90, 30))
            .build()
            .unwrap();
        assert_eq!(template.rois[0].roi_num, 1);
        assert!(template.has_template_matched_rois());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = TemplateBuilder::new("   ")
            .roi("A", Rect::new(0, 0, 5, 5), true)
            .build()
            .unwrap_err();
        assert!(matches!(err, RoiError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_builder_normalizes_and_keeps_session_numbers() {
        let roi = Roi {
            roi_num: 4,
            name: "Lives".to_string(),
            rect: Rect::new(5, 5, 25, 15),
            template_info: None,
        };
        let template = TemplateBuilder::new("screen")
            .window_size(800, 600)
            .session_roi(&roi, true)
            .roi("Timer", Rect::new(40, 30, 10, 10), true)
            .build()
            .unwrap();

        assert_eq!(template.rois[0].roi_num, 4);
        assert_eq!(template.rois[1].coordinates, Rect::new(10, 10, 40, 30));
        assert_eq!(template.window_size, (800, 600));
        assert_eq!(template.fixed_count(), 2);
    }

    #[test]
    fn test_serialized_field_layout() {
        let template = TemplateBuilder::new("t")
            .roi("A", Rect::new(1, 2, 3, 4), true)
            .window_size(10, 20)
            .build()
            .unwrap();
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["rois"][0]["coordinates"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(value["match_method"], serde_json::json!(5));
        assert_eq!(value["window_size"], serde_json::json!([10, 20]));
        assert!(value["image_path"].is_null());
    }
}
