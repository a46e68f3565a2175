// ROI analysis
// Preprocesses ROI crops for OCR, reads their text and looks for known
// target images inside them.

pub mod analyzer;
pub mod config;
pub mod ocr;
pub mod preprocess;
pub mod targets;

#[cfg(test)]
mod tests;

pub use analyzer::{AnalysisResult, MatchResult, RoiAnalyzer};
pub use config::{AnalysisConfig, live_config, numeric_config};
pub use ocr::{OcrMode, OcrRequest, TesseractRecognizer, TextRecognizer};
pub use preprocess::RoiPreprocessor;
pub use targets::{TargetImage, TargetManager};
