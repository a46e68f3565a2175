//! Target images searched for inside ROIs, and named target sets

use crate::error::{RoiError, RoiResult};
use crate::persist::{load_rgb, read_json, write_json_pretty};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A small reference image; its file name is its identity
#[derive(Debug, Clone)]
pub struct TargetImage {
    pub path: PathBuf,
    pub description: String,
    pub filename: String,
    image: RgbImage,
    gray: GrayImage,
}

impl TargetImage {
    pub fn load(path: impl Into<PathBuf>, description: impl Into<String>) -> RoiResult<Self> {
        let path = path.into();
        let image = load_rgb(&path)?;
        Ok(Self::from_image(path, description, image))
    }

    pub fn from_image(
        path: impl Into<PathBuf>,
        description: impl Into<String>,
        image: RgbImage,
    ) -> Self {
        let path = path.into();
        let filename = filename_of(&path);
        let gray = image::imageops::grayscale(&image);
        Self {
            path,
            description: description.into(),
            filename,
            image,
            gray,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Luma copy used for matching
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn entry(&self) -> TargetEntry {
        TargetEntry {
            path: self.path.to_string_lossy().to_string(),
            description: self.description.clone(),
            filename: Some(self.filename.clone()),
        }
    }
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// One persisted target; `filename` is written for readers but re-derived on load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSetFile {
    pub targets: Vec<TargetEntry>,
}

/// Loaded target images, unique by file name
#[derive(Debug, Default)]
pub struct TargetManager {
    targets: Vec<TargetImage>,
}

impl TargetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an image from disk and add it
    pub fn add(
        &mut self,
        path: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> RoiResult<&TargetImage> {
        let target = TargetImage::load(path, description)?;
        self.insert(target)
    }

    pub fn insert(&mut self, target: TargetImage) -> RoiResult<&TargetImage> {
        if self.get(&target.filename).is_some() {
            return Err(RoiError::DuplicateTarget {
                filename: target.filename,
            });
        }
        log::info!(
            "Added target image: {} ({})",
            target.filename,
            target.description
        );
        self.targets.push(target);
        let last = self.targets.len() - 1;
        Ok(&self.targets[last])
    }

    pub fn remove(&mut self, filename: &str) -> RoiResult<TargetImage> {
        let index = self
            .targets
            .iter()
            .position(|t| t.filename == filename)
            .ok_or_else(|| RoiError::TargetNotFound {
                filename: filename.to_string(),
            })?;
        log::info!("Removed target image: {filename}");
        Ok(self.targets.remove(index))
    }

    pub fn set_description(&mut self, filename: &str, description: impl Into<String>) -> RoiResult<()> {
        let target = self
            .targets
            .iter_mut()
            .find(|t| t.filename == filename)
            .ok_or_else(|| RoiError::TargetNotFound {
                filename: filename.to_string(),
            })?;
        target.description = description.into();
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&TargetImage> {
        self.targets.iter().find(|t| t.filename == filename)
    }

    pub fn targets(&self) -> &[TargetImage] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    pub fn save_set(&self, path: &Path) -> RoiResult<()> {
        if self.targets.is_empty() {
            return Err(RoiError::invalid_argument("no targets to save"));
        }
        let file = TargetSetFile {
            targets: self.targets.iter().map(TargetImage::entry).collect(),
        };
        write_json_pretty(path, &file)?;
        log::info!("Target set saved to {}", path.display());
        Ok(())
    }

    /// Replace the current targets with a saved set
    ///
    /// Entries whose image is missing, unreadable or a duplicate are skipped
    /// with a warning. Returns the number of targets loaded.
    pub fn load_set(&mut self, path: &Path) -> RoiResult<usize> {
        let file: TargetSetFile = read_json(path)?;
        self.targets.clear();

        for entry in file.targets {
            let image_path = PathBuf::from(&entry.path);
            if !image_path.exists() {
                log::warn!("Image file not found: {}", entry.path);
                continue;
            }
            match TargetImage::load(image_path, entry.description) {
                Ok(target) => {
                    if let Err(e) = self.insert(target) {
                        log::warn!("Skipping target {}: {e}", entry.path);
                    }
                }
                Err(e) => log::warn!("Failed to load image {}: {e}", entry.path),
            }
        }

        log::info!(
            "Loaded {} targets from {}",
            self.targets.len(),
            path.display()
        );
        Ok(self.targets.len())
    }
}
