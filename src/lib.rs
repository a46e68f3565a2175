pub mod analysis;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod monitor;
pub mod persist;
pub mod report;
pub mod session;
pub mod template_matching;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{AnalysisResult, RoiAnalyzer};
pub use error::{RoiError, RoiResult};
pub use geometry::Rect;
pub use session::Session;
