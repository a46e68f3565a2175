/// Template matching module for locating sub-images in screenshots
///
/// This module provides:
/// - Best-location search for one needle image in a haystack
/// - Method-agnostic confidence (difference methods are inverted)
/// - Skip semantics when the needle cannot fit in the haystack
pub mod matcher;
pub mod types;

pub use matcher::ImageMatcher;
pub use types::{MatchMethod, MatchOutcome};
