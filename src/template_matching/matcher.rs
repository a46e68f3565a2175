/// Template matching implementation
///
/// Finds the single best location of a needle image inside a haystack and
/// reports it as a method-agnostic confidence (higher is better).
use super::types::{MatchMethod, MatchOutcome};
use crate::error::{RoiError, RoiResult};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Matcher configured with a method and acceptance threshold
#[derive(Debug, Clone, Copy)]
pub struct ImageMatcher {
    method: MatchMethod,
    threshold: f32,
}

impl ImageMatcher {
    pub fn new(method: MatchMethod, threshold: f32) -> Self {
        Self { method, threshold }
    }

    pub fn method(&self) -> MatchMethod {
        self.method
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Best match of `needle` in `haystack`, whether or not it clears the threshold
    ///
    /// Returns `Ok(None)` when the needle does not fit inside the haystack; that
    /// is a skip, not an error. An empty needle is an error.
    pub fn best_match(
        &self,
        haystack: &GrayImage,
        needle: &GrayImage,
    ) -> RoiResult<Option<MatchOutcome>> {
        if needle.width() == 0 || needle.height() == 0 {
            return Err(RoiError::EmptyNeedle {
                width: needle.width(),
                height: needle.height(),
            });
        }

        if needle.width() > haystack.width() || needle.height() > haystack.height() {
            log::debug!(
                "⚠️ Skipping match - needle {}x{} larger than haystack {}x{}",
                needle.width(),
                needle.height(),
                haystack.width(),
                haystack.height()
            );
            return Ok(None);
        }

        let mut scores = self.score_map(haystack, needle);
        sanitize_scores(&mut scores, self.method);

        let extremes = find_extremes(&scores);
        let (raw, top_left) = if self.method.is_minimizing() {
            (extremes.min_value, extremes.min_value_location)
        } else {
            (extremes.max_value, extremes.max_value_location)
        };

        if !raw.is_finite() {
            return Ok(None);
        }

        Ok(Some(MatchOutcome {
            confidence: self.method.confidence_from_raw(raw),
            top_left,
        }))
    }

    /// Best match, kept only when its confidence reaches the threshold
    pub fn find(&self, haystack: &GrayImage, needle: &GrayImage) -> RoiResult<Option<MatchOutcome>> {
        Ok(self
            .best_match(haystack, needle)?
            .filter(|outcome| outcome.is_accepted(self.threshold)))
    }

    fn score_map(&self, haystack: &GrayImage, needle: &GrayImage) -> ScoreMap {
        match self.method {
            MatchMethod::SqDiff => {
                match_template(haystack, needle, MatchTemplateMethod::SumOfSquaredErrors)
            }
            MatchMethod::SqDiffNormed => match_template(
                haystack,
                needle,
                MatchTemplateMethod::SumOfSquaredErrorsNormalized,
            ),
            MatchMethod::CCorr => {
                match_template(haystack, needle, MatchTemplateMethod::CrossCorrelation)
            }
            MatchMethod::CCorrNormed => match_template(
                haystack,
                needle,
                MatchTemplateMethod::CrossCorrelationNormalized,
            ),
            MatchMethod::CCoeff => zero_mean_correlation(haystack, needle, false),
            MatchMethod::CCoeffNormed => zero_mean_correlation(haystack, needle, true),
        }
    }
}

impl Default for ImageMatcher {
    fn default() -> Self {
        Self::new(MatchMethod::default(), 0.7)
    }
}

/// Replace NaN/inf scores (flat regions under normalization) with the worst value
fn sanitize_scores(scores: &mut ScoreMap, method: MatchMethod) {
    let worst = if method.is_minimizing() {
        f32::INFINITY
    } else {
        f32::NEG_INFINITY
    };
    for pixel in scores.pixels_mut() {
        if !pixel[0].is_finite() {
            pixel[0] = worst;
        }
    }
}

/// Summed-area table with one row/column of zero padding
struct IntegralTable {
    width: usize,
    sums: Vec<f64>,
    squares: Vec<f64>,
}

impl IntegralTable {
    fn new(image: &GrayImage) -> Self {
        let w = image.width() as usize;
        let h = image.height() as usize;
        let stride = w + 1;
        let mut sums = vec![0.0; stride * (h + 1)];
        let mut squares = vec![0.0; stride * (h + 1)];
        let data = image.as_raw();

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = data[y * w + x] as f64;
                row_sum += v;
                row_sq += v * v;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
                squares[(y + 1) * stride + x + 1] = squares[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            width: stride,
            sums,
            squares,
        }
    }

    /// (sum, sum of squares) over the w*h window with top-left (x, y)
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let a = y * self.width + x;
        let b = y * self.width + x + w;
        let c = (y + h) * self.width + x;
        let d = (y + h) * self.width + x + w;
        (
            self.sums[d] - self.sums[b] - self.sums[c] + self.sums[a],
            self.squares[d] - self.squares[b] - self.squares[c] + self.squares[a],
        )
    }
}

/// Zero-mean cross correlation (optionally normalized to [-1, 1])
///
/// The needle is mean-centred once; since its centred values sum to zero the
/// window mean drops out of the numerator and only the denominator needs the
/// window variance, which comes from the integral table.
fn zero_mean_correlation(haystack: &GrayImage, needle: &GrayImage, normalized: bool) -> ScoreMap {
    let hw = haystack.width() as usize;
    let nw = needle.width() as usize;
    let nh = needle.height() as usize;
    let out_w = haystack.width() - needle.width() + 1;
    let out_h = haystack.height() - needle.height() + 1;
    let n = (nw * nh) as f64;

    let needle_data = needle.as_raw();
    let needle_mean = needle_data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let centred: Vec<f64> = needle_data.iter().map(|&v| v as f64 - needle_mean).collect();
    let needle_energy: f64 = centred.iter().map(|v| v * v).sum();

    let integral = IntegralTable::new(haystack);
    let data = haystack.as_raw();
    let mut scores = ScoreMap::new(out_w, out_h);

    for y in 0..out_h as usize {
        for x in 0..out_w as usize {
            let mut numerator = 0.0;
            for j in 0..nh {
                let row = (y + j) * hw + x;
                let needle_row = j * nw;
                for i in 0..nw {
                    numerator += centred[needle_row + i] * data[row + i] as f64;
                }
            }

            let score = if normalized {
                let (sum, sq) = integral.window(x, y, nw, nh);
                let variance = (sq - sum * sum / n).max(0.0);
                let denom = (variance * needle_energy).sqrt();
                if denom > f64::EPSILON {
                    (numerator / denom).clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            } else {
                numerator
            };

            scores.put_pixel(x as u32, y as u32, Luma([score as f32]));
        }
    }

    scores
}
