//! Scale and offset between a template image and a new screenshot

use super::model::ReferenceRegion;
use crate::geometry::Rect;
use crate::template_matching::ImageMatcher;
use image::{GrayImage, imageops};

/// Reference regions smaller than this in either axis are not matched
pub const MIN_REGION_SIZE: u32 = 10;

/// Centers of one reference region in template space and in the new image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub template_x: f64,
    pub template_y: f64,
    pub target_x: f64,
    pub target_y: f64,
}

impl Correspondence {
    pub fn new(template: (f64, f64), target: (f64, f64)) -> Self {
        Self {
            template_x: template.0,
            template_y: template.1,
            target_x: target.0,
            target_y: target.1,
        }
    }
}

/// Per-axis scale followed by translation: `v * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn apply(&self, rect: Rect) -> Rect {
        rect.transformed(self.scale_x, self.scale_y, self.offset_x, self.offset_y)
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scale=({:.3}, {:.3}) offset=({:.1}, {:.1})",
            self.scale_x, self.scale_y, self.offset_x, self.offset_y
        )
    }
}

/// Solve for a transform by pairwise averaging.
///
/// * no correspondences: `None`
/// * one: unit scale, offset = target - template
/// * more: each pair whose template-space delta exceeds one pixel on both
///   axes contributes `dtarget / dtemplate` per axis; scales are averaged
///   (unit scale when no pair qualifies) and the offset is the mean of
///   `target - template * scale` over all correspondences
pub fn solve(correspondences: &[Correspondence]) -> Option<Transform> {
    match correspondences {
        [] => None,
        [only] => Some(Transform {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: only.target_x - only.template_x,
            offset_y: only.target_y - only.template_y,
        }),
        _ => {
            let mut scale_x_sum = 0.0;
            let mut scale_y_sum = 0.0;
            let mut pair_count = 0usize;

            for (i, a) in correspondences.iter().enumerate() {
                for b in &correspondences[i + 1..] {
                    let dx_template = b.template_x - a.template_x;
                    let dy_template = b.template_y - a.template_y;
                    if dx_template.abs() > 1.0 && dy_template.abs() > 1.0 {
                        scale_x_sum += (b.target_x - a.target_x) / dx_template;
                        scale_y_sum += (b.target_y - a.target_y) / dy_template;
                        pair_count += 1;
                    }
                }
            }

            let (scale_x, scale_y) = if pair_count == 0 {
                (1.0, 1.0)
            } else {
                (
                    scale_x_sum / pair_count as f64,
                    scale_y_sum / pair_count as f64,
                )
            };

            let n = correspondences.len() as f64;
            let offset_x = correspondences
                .iter()
                .map(|c| c.target_x - c.template_x * scale_x)
                .sum::<f64>()
                / n;
            let offset_y = correspondences
                .iter()
                .map(|c| c.target_y - c.template_y * scale_y)
                .sum::<f64>()
                / n;

            Some(Transform {
                scale_x,
                scale_y,
                offset_x,
                offset_y,
            })
        }
    }
}

/// Locate each reference region of `template_image` in `image`.
///
/// Regions under [`MIN_REGION_SIZE`] are skipped, as are regions whose best
/// match falls below the matcher threshold.
pub fn find_correspondences(
    template_image: &GrayImage,
    regions: &[ReferenceRegion],
    image: &GrayImage,
    matcher: &ImageMatcher,
) -> Vec<Correspondence> {
    let (width, height) = template_image.dimensions();
    let mut correspondences = Vec::with_capacity(regions.len());

    for region in regions {
        let area = region.coordinates.normalized_within(width, height);
        if area.width() < MIN_REGION_SIZE || area.height() < MIN_REGION_SIZE {
            log::debug!(
                "Skipping reference region '{}' {}: smaller than {MIN_REGION_SIZE}x{MIN_REGION_SIZE}",
                region.name,
                area
            );
            continue;
        }

        let patch = imageops::crop_imm(
            template_image,
            area.x1 as u32,
            area.y1 as u32,
            area.width(),
            area.height(),
        )
        .to_image();

        match matcher.find(image, &patch) {
            Ok(Some(outcome)) => {
                let target = outcome.center(patch.width(), patch.height());
                log::debug!(
                    "📍 Reference region '{}' found at {:?} ({:.3})",
                    region.name,
                    outcome.top_left,
                    outcome.confidence
                );
                correspondences.push(Correspondence::new(area.center(), target));
            }
            Ok(None) => log::debug!("Reference region '{}' not found", region.name),
            Err(e) => log::warn!("Matching reference region '{}' failed: {e}", region.name),
        }
    }

    correspondences
}
