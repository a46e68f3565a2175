// Where live frames come from
use crate::error::RoiResult;
use crate::persist::load_rgb;
use image::RgbImage;
use std::path::PathBuf;

/// Produces a full-resolution colour frame on demand
pub trait FrameSource: Send + 'static {
    fn describe(&self) -> String;

    fn capture(&mut self) -> RoiResult<RgbImage>;
}

/// Re-reads an image file on every capture, e.g. a screenshot that another
/// tool keeps overwriting
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for FileFrameSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn capture(&mut self) -> RoiResult<RgbImage> {
        load_rgb(&self.path)
    }
}
