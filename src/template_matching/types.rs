/// Template matching data types
use serde::{Deserialize, Serialize};

/// Correlation method, numbered as in persisted templates (OpenCV codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MatchMethod {
    /// Sum of squared differences, best = min
    SqDiff,
    /// Normalized sum of squared differences, best = min
    SqDiffNormed,
    /// Raw cross correlation, best = max
    CCorr,
    /// Normalized cross correlation, best = max
    CCorrNormed,
    /// Zero-mean cross correlation, best = max
    CCoeff,
    /// Zero-mean normalized cross correlation, best = max
    #[default]
    CCoeffNormed,
}

impl MatchMethod {
    pub const ALL: [MatchMethod; 6] = [
        MatchMethod::SqDiff,
        MatchMethod::SqDiffNormed,
        MatchMethod::CCorr,
        MatchMethod::CCorrNormed,
        MatchMethod::CCoeff,
        MatchMethod::CCoeffNormed,
    ];

    pub fn code(self) -> i32 {
        match self {
            MatchMethod::SqDiff => 0,
            MatchMethod::SqDiffNormed => 1,
            MatchMethod::CCorr => 2,
            MatchMethod::CCorrNormed => 3,
            MatchMethod::CCoeff => 4,
            MatchMethod::CCoeffNormed => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Difference methods: the best location has the lowest raw score
    pub fn is_minimizing(self) -> bool {
        matches!(self, MatchMethod::SqDiff | MatchMethod::SqDiffNormed)
    }

    /// Map a raw score to a "higher is better" confidence
    pub fn confidence_from_raw(self, raw: f32) -> f32 {
        if self.is_minimizing() { 1.0 - raw } else { raw }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchMethod::SqDiff => "TM_SQDIFF",
            MatchMethod::SqDiffNormed => "TM_SQDIFF_NORMED",
            MatchMethod::CCorr => "TM_CCORR",
            MatchMethod::CCorrNormed => "TM_CCORR_NORMED",
            MatchMethod::CCoeff => "TM_CCOEFF",
            MatchMethod::CCoeffNormed => "TM_CCOEFF_NORMED",
        }
    }
}

impl TryFrom<i32> for MatchMethod {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown match method code {code}"))
    }
}

impl From<MatchMethod> for i32 {
    fn from(method: MatchMethod) -> Self {
        method.code()
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Best location of a needle in a haystack
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchOutcome {
    /// Normalized confidence, higher is better regardless of method
    pub confidence: f32,
    /// Top-left corner of the match in haystack coordinates
    pub top_left: (u32, u32),
}

impl MatchOutcome {
    pub fn is_accepted(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// Center of the matched area for a needle of the given size
    pub fn center(&self, needle_width: u32, needle_height: u32) -> (f64, f64) {
        (
            self.top_left.0 as f64 + needle_width as f64 / 2.0,
            self.top_left.1 as f64 + needle_height as f64 / 2.0,
        )
    }
}
