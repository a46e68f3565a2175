//! Pixel rectangles in original image space

use serde::{Deserialize, Serialize};

/// Rectangle `(x1, y1, x2, y2)` in original image pixel coordinates.
///
/// Serialized as the array `[x1, y1, x2, y2]`. Coordinates are signed so that
/// a transform may push a corner outside the image before it is clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Reorder corners so that `x1 <= x2` and `y1 <= y2`
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Clamp every coordinate into `[0, width-1] x [0, height-1]`
    pub fn clipped(self, width: u32, height: u32) -> Self {
        let max_x = (width as i32 - 1).max(0);
        let max_y = (height as i32 - 1).max(0);
        Self {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        }
    }

    /// Normalize then clip, the canonical form for anything stored as an ROI
    pub fn normalized_within(self, width: u32, height: u32) -> Self {
        self.normalized().clipped(width, height)
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).unsigned_abs()
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).unsigned_abs()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Geometric center, kept fractional for transform solving
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 + self.x2) as f64 / 2.0,
            (self.y1 + self.y2) as f64 / 2.0,
        )
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        let r = self.normalized();
        x >= r.x1 && x <= r.x2 && y >= r.y1 && y <= r.y2
    }

    /// Map each corner through `v * scale + offset`, truncating toward zero
    pub fn transformed(self, scale_x: f64, scale_y: f64, offset_x: f64, offset_y: f64) -> Self {
        let map_x = |v: i32| (v as f64 * scale_x + offset_x) as i32;
        let map_y = |v: i32| (v as f64 * scale_y + offset_y) as i32;
        Self {
            x1: map_x(self.x1),
            y1: map_y(self.y1),
            x2: map_x(self.x2),
            y2: map_y(self.y2),
        }
    }

    /// Scale only, no offset
    pub fn scaled(self, scale_x: f64, scale_y: f64) -> Self {
        self.transformed(scale_x, scale_y, 0.0, 0.0)
    }

    /// Parse coordinates from "x1,y1,x2,y2" (surrounding brackets are allowed)
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
        let parts: Vec<&str> = inner.split(',').collect();
        if parts.len() == 4
            && let (Ok(x1), Ok(y1), Ok(x2), Ok(y2)) = (
                parts[0].trim().parse::<i32>(),
                parts[1].trim().parse::<i32>(),
                parts[2].trim().parse::<i32>(),
                parts[3].trim().parse::<i32>(),
            )
        {
            return Some(Self::new(x1, y1, x2, y2));
        }
        None
    }
}

impl From<[i32; 4]> for Rect {
    fn from(c: [i32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{},{}]", self.x1, self.y1, self.x2, self.y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_swaps_corners() {
        let r = Rect::new(50, 40, 10, 5).normalized();
        assert_eq!(r, Rect::new(10, 5, 50, 40));
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 35);
    }

    #[test]
    fn test_clip_to_image_bounds() {
        let r = Rect::new(-20, 5, 700, 900).clipped(640, 480);
        assert_eq!(r, Rect::new(0, 5, 639, 479));
    }

    #[test]
    fn test_clip_degenerate_image() {
        let r = Rect::new(3, 3, 9, 9).clipped(0, 0);
        assert_eq!(r, Rect::new(0, 0, 0, 0));
        assert!(r.is_empty());
    }

    #[test]
    fn test_transform_truncates_toward_zero() {
        let r = Rect::new(10, 10, 21, 31).transformed(1.5, 0.5, 0.4, -0.2);
        // 10*1.5+0.4=15.4, 10*0.5-0.2=4.8, 21*1.5+0.4=31.9, 31*0.5-0.2=15.3
        assert_eq!(r, Rect::new(15, 4, 31, 15));
    }

    #[test]
    fn test_center_is_fractional() {
        assert_eq!(Rect::new(0, 0, 5, 3).center(), (2.5, 1.5));
    }

    #[test]
    fn test_parse_with_and_without_brackets() {
        assert_eq!(Rect::parse("1, 2,3,4"), Some(Rect::new(1, 2, 3, 4)));
        assert_eq!(Rect::parse("[300,1682,350,1732]"), Some(Rect::new(300, 1682, 350, 1732)));
        assert_eq!(Rect::parse("1,2,3"), None);
        assert_eq!(Rect::parse("a,b,c,d"), None);
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&Rect::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
        let back: Rect = serde_json::from_str("[5,6,7,8]").unwrap();
        assert_eq!(back, Rect::new(5, 6, 7, 8));
    }

    #[test]
    fn test_contains_point() {
        let r = Rect::new(10, 10, 20, 20);
        assert!(r.contains_point(15, 15));
        assert!(r.contains_point(10, 20));
        assert!(!r.contains_point(21, 15));
    }
}
