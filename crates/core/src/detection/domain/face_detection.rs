use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;

/// One face found by the detector in one frame.
///
/// Embeddings are produced by a single recognition model per run, so they
/// are mutually comparable under cosine distance.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub score: f64,
    pub landmarks: FaceLandmarks,
    pub embedding: Vec<f32>,
}
