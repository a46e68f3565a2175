//! Working state of one analysis session: image, ROI list, settings and results
//!
//! Analysis never reads the live ROI list. Callers take an immutable
//! [`RoiSnapshot`], analyze it, and hand the results back through
//! [`Session::merge_results`], which refuses results computed against a list
//! that has since changed.

use crate::analysis::{AnalysisConfig, AnalysisResult};
use crate::error::{RoiError, RoiResult};
use crate::geometry::Rect;
use crate::layout::{AppliedTemplate, Template, TemplateApplier};
use crate::persist::load_rgb;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoiType {
    Fixed,
    #[serde(rename = "Template-Matched")]
    TemplateMatched,
}

impl RoiType {
    pub fn from_is_fixed(is_fixed: bool) -> Self {
        if is_fixed {
            RoiType::Fixed
        } else {
            RoiType::TemplateMatched
        }
    }
}

/// Which template placed an ROI, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub template_name: String,
    pub roi_type: RoiType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    /// 1-based, dense
    pub roi_num: usize,
    pub name: String,
    /// Original image coordinates, normalized and clipped
    pub rect: Rect,
    pub template_info: Option<TemplateInfo>,
}

impl Roi {
    pub fn default_name(roi_num: usize) -> String {
        format!("ROI {roi_num}")
    }
}

/// Immutable copy of the ROI list at one version
#[derive(Debug, Clone)]
pub struct RoiSnapshot {
    version: u64,
    rois: Arc<[Roi]>,
}

impl RoiSnapshot {
    pub fn new(version: u64, rois: Vec<Roi>) -> Self {
        Self {
            version,
            rois: rois.into(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }
}

pub struct Session {
    image: Option<Arc<RgbImage>>,
    image_path: Option<PathBuf>,
    canvas_size: Option<(u32, u32)>,
    rois: Vec<Roi>,
    version: u64,
    config: AnalysisConfig,
    last_results: Option<(u64, Vec<AnalysisResult>)>,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            image: None,
            image_path: None,
            canvas_size: None,
            rois: Vec::new(),
            version: 0,
            config,
            last_results: None,
        }
    }

    pub fn load_image(&mut self, path: &Path) -> RoiResult<()> {
        let image = load_rgb(path)?;
        log::info!(
            "Loaded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.set_image(image, Some(path.to_path_buf()));
        Ok(())
    }

    /// Replace the current image; existing ROIs and results are discarded
    pub fn set_image(&mut self, image: RgbImage, path: Option<PathBuf>) {
        self.image = Some(Arc::new(image));
        self.image_path = path;
        self.rois.clear();
        self.last_results = None;
        self.bump();
    }

    pub fn image(&self) -> Option<&Arc<RgbImage>> {
        self.image.as_ref()
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    /// Display area size; defaults to the image size
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas_size.or_else(|| self.image_dimensions())
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas_size = Some((width, height));
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AnalysisConfig {
        &mut self.config
    }

    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn require_dimensions(&self) -> RoiResult<(u32, u32)> {
        self.image_dimensions()
            .ok_or_else(|| RoiError::invalid_image("no image loaded"))
    }

    /// Add an ROI, normalized and clipped to the image. Returns its number.
    pub fn add_roi(&mut self, rect: Rect, name: Option<String>) -> RoiResult<usize> {
        let (width, height) = self.require_dimensions()?;
        let roi_num = self.rois.len() + 1;
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| Roi::default_name(roi_num));
        let rect = rect.normalized_within(width, height);

        log::info!("Added {name} at {rect}");
        self.rois.push(Roi {
            roi_num,
            name,
            rect,
            template_info: None,
        });
        self.bump();
        Ok(roi_num)
    }

    pub fn rename_roi(&mut self, roi_num: usize, name: impl Into<String>) -> RoiResult<()> {
        let roi = self
            .rois
            .iter_mut()
            .find(|r| r.roi_num == roi_num)
            .ok_or(RoiError::RoiNotFound { roi_num })?;
        roi.name = name.into();
        self.bump();
        Ok(())
    }

    /// Remove an ROI and renumber the rest densely; names are kept
    pub fn delete_roi(&mut self, roi_num: usize) -> RoiResult<Roi> {
        let index = self
            .rois
            .iter()
            .position(|r| r.roi_num == roi_num)
            .ok_or(RoiError::RoiNotFound { roi_num })?;
        let removed = self.rois.remove(index);
        for (i, roi) in self.rois.iter_mut().enumerate() {
            roi.roi_num = i + 1;
        }
        self.bump();
        Ok(removed)
    }

    pub fn clear_rois(&mut self) {
        self.rois.clear();
        self.bump();
    }

    pub fn snapshot(&self) -> RoiSnapshot {
        RoiSnapshot::new(self.version, self.rois.clone())
    }

    /// Store results computed from `snapshot`; stale snapshots are rejected
    pub fn merge_results(
        &mut self,
        snapshot: &RoiSnapshot,
        results: Vec<AnalysisResult>,
    ) -> RoiResult<()> {
        if snapshot.version() != self.version {
            return Err(RoiError::StaleSnapshot {
                snapshot: snapshot.version(),
                current: self.version,
            });
        }
        self.last_results = Some((snapshot.version(), results));
        Ok(())
    }

    pub fn last_results(&self) -> Option<&[AnalysisResult]> {
        self.last_results
            .as_ref()
            .map(|(_, results)| results.as_slice())
    }

    /// Replace every ROI with the template's placement on the current image
    pub fn apply_template(
        &mut self,
        applier: &TemplateApplier,
        template: &Template,
    ) -> RoiResult<AppliedTemplate> {
        let image = self
            .image
            .clone()
            .ok_or_else(|| RoiError::invalid_image("no image loaded"))?;
        let canvas = self.canvas_size().unwrap_or(image.dimensions());

        let applied = applier.apply_with_stored_image(template, &image, canvas)?;
        self.rois = applied.rois.clone();
        self.last_results = None;
        self.bump();
        log::info!(
            "Applied template '{}' with {} ROIs",
            template.name,
            self.rois.len()
        );
        Ok(applied)
    }
}
