use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2` for any
/// well-formed detection. Serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Larger of width and height, used to normalize center displacement.
    pub fn max_side(&self) -> f64 {
        self.width().max(self.height())
    }

    /// A box with zero or negative extent on either axis cannot be
    /// normalized against and is rejected upstream.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Euclidean distance between box centers, in pixels.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() * self.height();
        let area_b = other.width() * other.height();
        inter / (area_a + area_b - inter)
    }

    /// Same box moved so its center lands on `center`, size unchanged.
    pub fn align_to(&self, center: (f64, f64)) -> BoundingBox {
        let w = self.width();
        let h = self.height();
        let x1 = center.0 - w / 2.0;
        let y1 = center.1 - h / 2.0;
        BoundingBox::new(x1, y1, x1 + w, y1 + h)
    }

    /// Square box centered like this one with side `max(w, h) * scale`.
    pub fn expand_square(&self, scale: f64) -> BoundingBox {
        let (cx, cy) = self.center();
        let half = self.max_side() * scale / 2.0;
        BoundingBox::new(cx - half, cy - half, cx + half, cy + half)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    #[test]
    fn test_center() {
        let b = bbox(0.0, 0.0, 10.0, 20.0);
        assert_eq!(b.center(), (5.0, 10.0));
    }

    #[test]
    fn test_max_side() {
        assert_relative_eq!(bbox(0.0, 0.0, 10.0, 30.0).max_side(), 30.0);
        assert_relative_eq!(bbox(0.0, 0.0, 40.0, 30.0).max_side(), 40.0);
    }

    #[test]
    fn test_center_distance() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(3.0, 4.0, 13.0, 14.0);
        assert_relative_eq!(a.center_distance(&b), 5.0);
    }

    #[test]
    fn test_center_distance_symmetric() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(100.0, 50.0, 120.0, 70.0);
        assert_relative_eq!(a.center_distance(&b), b.center_distance(&a));
    }

    #[rstest]
    #[case::zero_width(bbox(5.0, 0.0, 5.0, 10.0), true)]
    #[case::zero_height(bbox(0.0, 5.0, 10.0, 5.0), true)]
    #[case::inverted(bbox(10.0, 0.0, 0.0, 10.0), true)]
    #[case::valid(bbox(0.0, 0.0, 1.0, 1.0), false)]
    fn test_is_degenerate(#[case] b: BoundingBox, #[case] expected: bool) {
        assert_eq!(b.is_degenerate(), expected);
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 15.0, 15.0);
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0);
    }

    #[test]
    fn test_align_to_preserves_size() {
        let b = bbox(0.0, 0.0, 10.0, 20.0).align_to((50.0, 50.0));
        assert_relative_eq!(b.width(), 10.0);
        assert_relative_eq!(b.height(), 20.0);
        assert_eq!(b.center(), (50.0, 50.0));
    }

    #[test]
    fn test_expand_square_is_square_and_centered() {
        let b = bbox(0.0, 0.0, 10.0, 20.0).expand_square(1.3);
        assert_relative_eq!(b.width(), 26.0);
        assert_relative_eq!(b.height(), 26.0);
        assert_eq!(b.center(), (5.0, 10.0));
    }

    #[test]
    fn test_expand_square_unit_scale_keeps_max_side() {
        let b = bbox(10.0, 10.0, 30.0, 20.0).expand_square(1.0);
        assert_relative_eq!(b.width(), 20.0);
        assert_relative_eq!(b.height(), 20.0);
    }

    #[test]
    fn test_serde_array_shape() {
        let b = bbox(1.5, 2.5, 3.5, 4.5);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.5,2.5,3.5,4.5]");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
