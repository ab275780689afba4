use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Domain interface for face detection plus appearance embedding.
///
/// The tracker consumes detections through this seam and never owns the
/// model lifecycle. Implementations may be stateful, hence `&mut self`.
/// Detections must be returned in the model's output order; the tracker's
/// identity assignment is order-sensitive.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}
