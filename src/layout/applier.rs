//! Place a stored template's ROIs onto a new image

use super::model::Template;
use super::solver::{Transform, find_correspondences, solve};
use crate::error::{RoiError, RoiResult};
use crate::session::{Roi, RoiType, TemplateInfo};
use crate::template_matching::ImageMatcher;
use image::{RgbImage, imageops};

/// ROIs produced by applying a template, plus everything that degraded on the way
#[derive(Debug, Clone)]
pub struct AppliedTemplate {
    pub rois: Vec<Roi>,
    /// Solved alignment, when reference regions were found
    pub transform: Option<Transform>,
    pub window_scale: (f64, f64),
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateApplier;

impl TemplateApplier {
    pub fn new() -> Self {
        Self
    }

    /// Apply using the template's own stored image for alignment.
    ///
    /// An unreadable template image is not fatal: template-matched ROIs fall
    /// back to fixed placement and a warning is recorded.
    pub fn apply_with_stored_image(
        &self,
        template: &Template,
        image: &RgbImage,
        canvas_size: (u32, u32),
    ) -> RoiResult<AppliedTemplate> {
        let template_image = if needs_alignment(template) {
            match template.load_image() {
                Ok(loaded) => Some(loaded),
                Err(e) => {
                    log::warn!("Could not load image for template '{}': {e}", template.name);
                    None
                }
            }
        } else {
            None
        };

        self.apply(template, template_image.as_ref(), image, canvas_size)
    }

    /// Map every ROI of `template` onto `image`.
    ///
    /// Fixed ROIs are scaled by canvas size over the stored window size.
    /// Template-matched ROIs go through the transform solved from the
    /// reference regions, or the fixed rule when none was found. Output is
    /// normalized and clipped to the image.
    pub fn apply(
        &self,
        template: &Template,
        template_image: Option<&RgbImage>,
        image: &RgbImage,
        canvas_size: (u32, u32),
    ) -> RoiResult<AppliedTemplate> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RoiError::invalid_image(
                "cannot apply a template to an empty image",
            ));
        }

        let window_scale = window_scale(template.window_size, canvas_size);
        let mut warnings = Vec::new();

        let transform = if needs_alignment(template) {
            match template_image {
                Some(template_image) => {
                    let transform = find_transform(template, template_image, image);
                    if transform.is_none() {
                        let warning = "Could not find matching regions in the current image. \
                                       Template-matched ROIs use fixed placement."
                            .to_string();
                        log::warn!("{warning}");
                        warnings.push(warning);
                    }
                    transform
                }
                None => {
                    let warning = format!(
                        "Template image for '{}' is not available. Template-matched ROIs use fixed placement.",
                        template.name
                    );
                    log::warn!("{warning}");
                    warnings.push(warning);
                    None
                }
            }
        } else {
            if template.has_template_matched_rois() {
                let warning = format!(
                    "Template '{}' has no reference regions. Template-matched ROIs use fixed placement.",
                    template.name
                );
                log::warn!("{warning}");
                warnings.push(warning);
            }
            None
        };

        if let Some(t) = &transform {
            log::info!("Template '{}' aligned: {t}", template.name);
        }

        let rois = template
            .rois
            .iter()
            .enumerate()
            .map(|(i, definition)| {
                let placed = match (&transform, definition.is_fixed) {
                    (Some(t), false) => t.apply(definition.coordinates),
                    _ => definition
                        .coordinates
                        .scaled(window_scale.0, window_scale.1),
                };
                let roi_num = i + 1;
                let name = if definition.name.trim().is_empty() {
                    Roi::default_name(roi_num)
                } else {
                    definition.name.clone()
                };
                Roi {
                    roi_num,
                    name,
                    rect: placed.normalized_within(width, height),
                    template_info: Some(TemplateInfo {
                        template_name: template.name.clone(),
                        roi_type: RoiType::from_is_fixed(definition.is_fixed),
                    }),
                }
            })
            .collect();

        Ok(AppliedTemplate {
            rois,
            transform,
            window_scale,
            warnings,
        })
    }
}

fn needs_alignment(template: &Template) -> bool {
    template.has_template_matched_rois() && !template.template_regions.is_empty()
}

/// Canvas over stored window size per axis; 1.0 where the stored size is zero
pub fn window_scale(window_size: (u32, u32), canvas_size: (u32, u32)) -> (f64, f64) {
    let axis = |stored: u32, current: u32| {
        if stored == 0 {
            1.0
        } else {
            current as f64 / stored as f64
        }
    };
    (
        axis(window_size.0, canvas_size.0),
        axis(window_size.1, canvas_size.1),
    )
}

fn find_transform(
    template: &Template,
    template_image: &RgbImage,
    image: &RgbImage,
) -> Option<Transform> {
    let matcher = ImageMatcher::new(template.match_method, template.match_threshold);
    let template_gray = imageops::grayscale(template_image);
    let image_gray = imageops::grayscale(image);
    let correspondences = find_correspondences(
        &template_gray,
        &template.template_regions,
        &image_gray,
        &matcher,
    );
    log::debug!(
        "Found {} of {} reference regions",
        correspondences.len(),
        template.template_regions.len()
    );
    solve(&correspondences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_scale_guards_zero() {
        assert_eq!(window_scale((0, 0), (800, 600)), (1.0, 1.0));
        assert_eq!(window_scale((400, 0), (800, 600)), (2.0, 1.0));
        assert_eq!(window_scale((800, 600), (400, 300)), (0.5, 0.5));
    }
}
