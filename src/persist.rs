//! JSON file helpers shared by templates, target sets and reports

use crate::error::{RoiError, RoiResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Write `value` as JSON indented with four spaces
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> RoiResult<()> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| RoiError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, buffer).map_err(|source| RoiError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> RoiResult<T> {
    let raw = std::fs::read_to_string(path).map_err(|source| RoiError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RoiError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_rgb(path: &Path) -> RoiResult<image::RgbImage> {
    let image = image::open(path).map_err(|source| RoiError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(RoiError::invalid_image(format!(
            "{} has no pixels",
            path.display()
        )));
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn test_pretty_json_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        let sample = Sample {
            name: "a".to_string(),
            values: vec![1],
        };

        write_json_pretty(&path, &sample).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"name\": \"a\""));

        let back: Sample = read_json(&path).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_read_json_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_json::<Sample>(&path).unwrap_err();
        assert!(matches!(err, RoiError::Json { .. }));
    }

    #[test]
    fn test_load_rgb_missing_file() {
        let err = load_rgb(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(err.is_fatal_input());
    }
}
