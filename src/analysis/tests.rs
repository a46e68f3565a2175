use super::*;
use crate::error::{RoiError, RoiResult};
use crate::geometry::Rect;
use crate::session::{Roi, RoiSnapshot, RoiType, TemplateInfo};
use crate::template_matching::MatchMethod;
use crate::test_support::{crop_rgb, paste, textured_rgb};
use image::{GrayImage, RgbImage};
use std::sync::{Arc, Mutex};

/// Returns canned text and records every request it receives
#[derive(Default)]
struct ScriptedRecognizer {
    reply: Option<String>,
    requests: Mutex<Vec<(OcrRequest, (u32, u32))>>,
}

impl ScriptedRecognizer {
    fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self::default()
    }

    fn modes(&self) -> Vec<OcrMode> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.mode)
            .collect()
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, image: &GrayImage, request: &OcrRequest) -> RoiResult<String> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), image.dimensions()));
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(RoiError::Ocr {
                engine: self.name().to_string(),
                description: "engine unavailable".to_string(),
            }),
        }
    }
}

fn roi(roi_num: usize, rect: Rect) -> Roi {
    Roi {
        roi_num,
        name: Roi::default_name(roi_num),
        rect,
        template_info: None,
    }
}

fn analyzer_with(recognizer: Arc<ScriptedRecognizer>, config: AnalysisConfig) -> RoiAnalyzer {
    RoiAnalyzer::new(recognizer, config)
}

#[test]
fn test_target_larger_than_roi_gives_no_matches() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("7"));
    let analyzer = analyzer_with(recognizer, AnalysisConfig::default());

    let crop = textured_rgb(30, 20, 3);
    let big = TargetImage::from_image("big.png", "Too big", textured_rgb(40, 25, 4));
    let roi = roi(1, Rect::new(0, 0, 30, 20));

    let result = analyzer.analyze(&roi, roi.rect, &crop, &[big]);
    assert!(result.target_matches.is_empty());
    assert!(result.target_match_error.is_none());
    assert_eq!(result.ocr_text.as_deref(), Some("7"));
}

#[test]
fn test_collects_every_matching_target_in_order() {
    let recognizer = Arc::new(ScriptedRecognizer::replying(""));
    let analyzer = analyzer_with(recognizer, AnalysisConfig::default());

    let mut crop = textured_rgb(160, 90, 10);
    let coin = textured_rgb(20, 14, 11);
    let gem = textured_rgb(18, 18, 12);
    paste(&mut crop, &coin, 100, 50);
    paste(&mut crop, &gem, 12, 8);

    let targets = vec![
        TargetImage::from_image("t/coin.png", "Coin", coin),
        TargetImage::from_image("t/absent.png", "Absent", textured_rgb(16, 16, 99)),
        TargetImage::from_image("t/gem.png", "Gem", gem),
    ];

    let roi = roi(2, Rect::new(0, 0, 160, 90));
    let result = analyzer.analyze(&roi, roi.rect, &crop, &targets);

    let found: Vec<&str> = result
        .target_matches
        .iter()
        .map(|m| m.filename.as_str())
        .collect();
    assert_eq!(found, vec!["coin.png", "gem.png"]);
    assert_eq!(result.target_matches[0].location, (100, 50));
    assert_eq!(result.target_matches[1].location, (12, 8));
    assert!(result.target_matches.iter().all(|m| m.confidence >= 0.7));
}

#[test]
fn test_ocr_failure_does_not_block_target_matching() {
    let recognizer = Arc::new(ScriptedRecognizer::failing());
    let analyzer = analyzer_with(recognizer, AnalysisConfig::default());

    let crop = textured_rgb(120, 60, 5);
    let target = TargetImage::from_image("x/part.png", "Part", crop_rgb(&crop, 30, 20, 25, 15));
    let roi = roi(1, Rect::new(0, 0, 120, 60));

    let result = analyzer.analyze(&roi, roi.rect, &crop, &[target]);
    assert!(result.ocr_text.is_none());
    assert!(result.ocr_error.as_deref().unwrap().contains("engine unavailable"));
    assert_eq!(result.target_matches.len(), 1);
    assert!(result.has_errors());
}

#[test]
fn test_empty_target_is_reported_as_target_error() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("ok"));
    let analyzer = analyzer_with(recognizer, AnalysisConfig::default());

    let crop = textured_rgb(120, 60, 6);
    let empty = TargetImage::from_image("e/empty.png", "Empty", RgbImage::new(0, 0));
    let roi = roi(1, Rect::new(0, 0, 120, 60));

    let result = analyzer.analyze(&roi, roi.rect, &crop, &[empty]);
    assert_eq!(result.ocr_text.as_deref(), Some("ok"));
    assert!(result.target_match_error.is_some());
    assert!(result.target_matches.is_empty());
}

#[test]
fn test_ocr_mode_follows_roi_size_and_numbers_only() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("1"));
    let analyzer = analyzer_with(recognizer.clone(), AnalysisConfig::default());

    let small = textured_rgb(80, 30, 1);
    let large = textured_rgb(200, 120, 2);
    analyzer.analyze(&roi(1, Rect::new(0, 0, 80, 30)), Rect::new(0, 0, 80, 30), &small, &[]);
    analyzer.analyze(&roi(2, Rect::new(0, 0, 200, 120)), Rect::new(0, 0, 200, 120), &large, &[]);

    let numeric = analyzer_with(recognizer.clone(), numeric_config());
    numeric.analyze(&roi(3, Rect::new(0, 0, 200, 120)), Rect::new(0, 0, 200, 120), &large, &[]);

    assert_eq!(
        recognizer.modes(),
        vec![OcrMode::SingleLineNumeric, OcrMode::Block, OcrMode::SingleLineNumeric]
    );

    // small crops reach the engine upscaled
    let sizes: Vec<(u32, u32)> = recognizer.requests.lock().unwrap().iter().map(|(_, s)| *s).collect();
    assert_eq!(sizes[0], (240, 90));
    assert_eq!(sizes[1], (200, 120));
}

#[test]
fn test_analyze_snapshot_crops_each_roi_and_keeps_template_info() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("123"));
    let analyzer = analyzer_with(recognizer.clone(), AnalysisConfig::default());

    let image = textured_rgb(300, 200, 8);
    let mut templated = roi(2, Rect::new(250, 150, 150, 100));
    templated.template_info = Some(TemplateInfo {
        template_name: "hud".to_string(),
        roi_type: RoiType::TemplateMatched,
    });
    let snapshot = RoiSnapshot::new(
        4,
        vec![roi(1, Rect::new(10, 10, 130, 70)), templated],
    );

    let results = analyzer.analyze_snapshot(&image, &snapshot, &[]).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].coordinates, Rect::new(10, 10, 130, 70));
    assert_eq!(results[1].coordinates, Rect::new(150, 100, 250, 150));
    assert_eq!(results[1].template_info.as_ref().unwrap().template_name, "hud");
    assert!(results.iter().all(|r| r.ocr_text.as_deref() == Some("123")));
}

#[test]
fn test_live_mode_skips_out_of_frame_and_tiny_rois() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("x"));
    let analyzer = analyzer_with(recognizer, live_config());

    let image = textured_rgb(100, 100, 9);
    let snapshot = RoiSnapshot::new(
        1,
        vec![
            roi(1, Rect::new(120, 10, 150, 40)),
            roi(2, Rect::new(10, 10, 13, 60)),
            roi(3, Rect::new(90, 90, 140, 140)),
            roi(4, Rect::new(20, 20, 70, 60)),
        ],
    );

    let results = analyzer.analyze_snapshot(&image, &snapshot, &[]).unwrap();
    let nums: Vec<usize> = results.iter().map(|r| r.roi_num).collect();
    assert_eq!(nums, vec![3, 4]);
    assert_eq!(results[0].coordinates, Rect::new(90, 90, 99, 99));
}

#[test]
fn test_analyze_snapshot_rejects_empty_image() {
    let analyzer = analyzer_with(Arc::new(ScriptedRecognizer::replying("")), AnalysisConfig::default());
    let snapshot = RoiSnapshot::new(0, vec![roi(1, Rect::new(0, 0, 5, 5))]);
    assert!(analyzer.analyze_snapshot(&RgbImage::new(0, 0), &snapshot, &[]).is_err());
}

#[test]
fn test_degenerate_roi_reports_ocr_error_only_for_that_roi() {
    let recognizer = Arc::new(ScriptedRecognizer::replying("5"));
    let analyzer = analyzer_with(recognizer, AnalysisConfig::default());

    let image = textured_rgb(100, 100, 1);
    let snapshot = RoiSnapshot::new(
        1,
        vec![roi(1, Rect::new(30, 30, 30, 60)), roi(2, Rect::new(0, 0, 50, 50))],
    );

    let results = analyzer.analyze_snapshot(&image, &snapshot, &[]).unwrap();
    assert!(results[0].ocr_error.is_some());
    assert_eq!(results[1].ocr_text.as_deref(), Some("5"));
    assert!(results[1].ocr_error.is_none());
}

#[test]
fn test_debug_images_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig {
        debug_dir: Some(dir.path().to_path_buf()),
        ..AnalysisConfig::default()
    };
    let analyzer = analyzer_with(Arc::new(ScriptedRecognizer::replying("")), config);

    let crop = textured_rgb(120, 60, 2);
    analyzer.analyze(&roi(3, Rect::new(0, 0, 120, 60)), Rect::new(0, 0, 120, 60), &crop, &[]);

    assert!(dir.path().join("roi_3_original.png").exists());
    assert!(dir.path().join("roi_3_processed.png").exists());
}

#[test]
fn test_sqdiff_threshold_uses_inverted_confidence() {
    let config = AnalysisConfig {
        match_method: MatchMethod::SqDiffNormed,
        match_threshold: 0.9,
        ..AnalysisConfig::default()
    };
    let analyzer = analyzer_with(Arc::new(ScriptedRecognizer::replying("")), config);

    let crop = textured_rgb(80, 80, 13);
    let target = TargetImage::from_image("s/exact.png", "Exact", crop_rgb(&crop, 40, 35, 20, 20));
    let matches = analyzer.check_targets(&crop, &[target]).unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].location, (40, 35));
    assert!(matches[0].confidence > 0.99);
}

#[test]
fn test_result_json_shape() {
    let analyzer = analyzer_with(Arc::new(ScriptedRecognizer::failing()), AnalysisConfig::default());
    let crop = textured_rgb(120, 60, 2);
    let result = analyzer.analyze(&roi(1, Rect::new(5, 6, 125, 66)), Rect::new(5, 6, 125, 66), &crop, &[]);

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["coordinates"], serde_json::json!([5, 6, 125, 66]));
    assert!(value["ocr_text"].is_null());
    assert!(value["template_info"].is_null());
    assert!(value.get("ocr_error").is_some());
    assert!(value.get("target_match_error").is_none());
    assert_eq!(value["target_matches"], serde_json::json!([]));
}
