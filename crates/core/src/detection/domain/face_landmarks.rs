//! 5-point face landmarks: eyes, nose, mouth corners.

pub const NUM_LANDMARKS: usize = 5;

const NOSE: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// Order: left eye, right eye, nose, left mouth corner, right mouth corner.
    points: [(f64, f64); NUM_LANDMARKS],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); NUM_LANDMARKS] {
        &self.points
    }

    /// Nose tip, the anchor for crop re-centering.
    pub fn nose(&self) -> (f64, f64) {
        self.points[NOSE]
    }

    /// Annotation wire format: `[x0, y0, x1, y1, ...]`.
    pub fn flatten(&self) -> Vec<f64> {
        self.points.iter().flat_map(|&(x, y)| [x, y]).collect()
    }

    /// Inverse of [`flatten`](Self::flatten). `None` unless exactly
    /// `2 * NUM_LANDMARKS` values are given.
    pub fn from_flat(values: &[f64]) -> Option<Self> {
        if values.len() != 2 * NUM_LANDMARKS {
            return None;
        }
        let mut points = [(0.0, 0.0); NUM_LANDMARKS];
        for (i, point) in points.iter_mut().enumerate() {
            *point = (values[2 * i], values[2 * i + 1]);
        }
        Some(Self { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmarks() -> FaceLandmarks {
        FaceLandmarks::new([(1.0, 2.0), (3.0, 4.0), (5.0, 6.0), (7.0, 8.0), (9.0, 10.0)])
    }

    #[test]
    fn test_nose_is_third_point() {
        assert_eq!(landmarks().nose(), (5.0, 6.0));
    }

    #[test]
    fn test_flatten_interleaves_coordinates() {
        assert_eq!(
            landmarks().flatten(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]
        );
    }

    #[test]
    fn test_from_flat_roundtrip() {
        let flat = landmarks().flatten();
        assert_eq!(FaceLandmarks::from_flat(&flat), Some(landmarks()));
    }

    #[test]
    fn test_from_flat_wrong_length() {
        assert_eq!(FaceLandmarks::from_flat(&[1.0, 2.0, 3.0]), None);
        assert_eq!(FaceLandmarks::from_flat(&[]), None);
    }
}
