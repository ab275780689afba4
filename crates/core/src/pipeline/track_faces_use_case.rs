use crate::annotation::face_annotations::FaceAnnotations;
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::progress_logger::ProgressLogger;
use crate::shared::video_metadata::VideoMetadata;
use crate::tracking::face_tracker::{FaceTracker, TrackerConfig};
use crate::video::domain::video_reader::VideoReader;

/// Runs the full detect-and-track pass over one video, producing the
/// per-identity annotation mapping.
///
/// Reader and detector are borrowed, not owned, so one detector (and its
/// loaded models) can serve many videos in a run. A fresh tracker — and
/// with it a fresh track store — is created per call; identity state is
/// never shared across videos.
pub struct TrackFacesUseCase {
    config: TrackerConfig,
    max_frames: Option<usize>,
}

impl TrackFacesUseCase {
    pub fn new(config: TrackerConfig, max_frames: Option<usize>) -> Self {
        Self { config, max_frames }
    }

    pub fn execute(
        &self,
        reader: &mut dyn VideoReader,
        detector: &mut dyn FaceDetector,
        metadata: &VideoMetadata,
        logger: &mut dyn ProgressLogger,
    ) -> Result<FaceAnnotations, Box<dyn std::error::Error>> {
        let total = match self.max_frames {
            Some(cap) if metadata.total_frames > 0 => metadata.total_frames.min(cap),
            Some(cap) => cap,
            None => metadata.total_frames,
        };

        let mut tracker = FaceTracker::new(self.config);
        {
            let frames = reader.frames().take(self.max_frames.unwrap_or(usize::MAX));
            for result in frames {
                let frame = result?;
                let detections = detector.detect(&frame)?;
                tracker.process_frame(frame.index(), &detections);
                logger.progress(frame.index() + 1, total);
            }
        }
        reader.close();

        logger.info(&format!("found {} face track(s)", tracker.num_tracks()));
        logger.summary();
        Ok(tracker.into_annotations())
    }
}
