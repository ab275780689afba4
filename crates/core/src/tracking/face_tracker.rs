use crate::annotation::face_annotations::{FaceAnnotation, FaceAnnotations};
use crate::detection::domain::face_detection::FaceDetection;
use crate::tracking::track_store::{cosine_distance, TrackStore};

pub const DEFAULT_DET_THRESH: f64 = 0.0;
pub const DEFAULT_BOX_DISP_THRESH: f64 = 0.3;
pub const DEFAULT_COS_SIM_THRESH: f64 = 0.5;

/// The appearance gate on the box path is relaxed by this factor: spatial
/// continuity alone is trusted unless the embedding is wildly off, which
/// catches two different people crossing paths.
const BOX_PATH_COS_RELAXATION: f64 = 3.0;

#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// Minimum detector confidence to consider a detection at all.
    pub det_thresh: f64,
    /// Maximum box-center displacement, normalized by the detection's own
    /// larger side, to accept a box match.
    pub box_disp_thresh: f64,
    /// Maximum cosine distance to accept an embedding match.
    pub cos_sim_thresh: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            det_thresh: DEFAULT_DET_THRESH,
            box_disp_thresh: DEFAULT_BOX_DISP_THRESH,
            cos_sim_thresh: DEFAULT_COS_SIM_THRESH,
        }
    }
}

/// Online identity association: resolves each frame's detections into
/// stable track ids, frame by frame, in detector output order.
///
/// Per detection the precedence is fixed: box continuity first (faces
/// rarely teleport between consecutive frames), embedding similarity as
/// the fallback for re-identification across spatial gaps, a fresh
/// sequential id otherwise. The store is updated immediately after each
/// detection, so a later detection in the same frame sees state already
/// claimed by an earlier one.
///
/// Strictly causal and single-pass: no look-ahead, no revisiting, no
/// motion model, no track pruning. One tracker instance serves exactly
/// one video.
pub struct FaceTracker {
    config: TrackerConfig,
    store: TrackStore,
    annotations: FaceAnnotations,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            store: TrackStore::new(),
            annotations: FaceAnnotations::new(),
        }
    }

    /// Resolves one frame's detections. Frames must be fed in increasing
    /// index order; an empty slice is valid and contributes nothing.
    pub fn process_frame(&mut self, frame_index: usize, detections: &[FaceDetection]) {
        for detection in detections {
            if detection.score < self.config.det_thresh {
                continue;
            }
            if detection.bbox.is_degenerate() {
                // Zero-area boxes cannot be displacement-normalized; drop
                // the detection without touching any track.
                log::warn!(
                    "frame {frame_index}: dropping degenerate detection box {:?}",
                    detection.bbox
                );
                continue;
            }

            let track_id = self
                .resolve(detection)
                .unwrap_or_else(|| self.store.len().to_string());

            self.annotations.record(
                &track_id,
                frame_index,
                FaceAnnotation {
                    bbox: detection.bbox,
                    prob: detection.score,
                    landmarks: detection.landmarks.flatten(),
                },
            );
            self.store
                .add(&track_id, detection.bbox, &detection.embedding);
        }
    }

    /// Continuation lookup: box path, then embedding path. `None` means a
    /// new identity must be minted.
    fn resolve(&self, detection: &FaceDetection) -> Option<String> {
        let (box_track, box_dist) = self.store.closest_by_box(&detection.bbox)?;

        // Raw pixel distance is not comparable across box scales.
        let normalized_disp = box_dist / detection.bbox.max_side();
        if normalized_disp < self.config.box_disp_thresh {
            let mean = self
                .store
                .mean_embedding(&box_track)
                .expect("closest_by_box returned a live track");
            if cosine_distance(&mean, &detection.embedding)
                < self.config.cos_sim_thresh * BOX_PATH_COS_RELAXATION
            {
                return Some(box_track);
            }
        }

        let (emb_track, emb_dist) = self.store.closest_by_embedding(&detection.embedding)?;
        if emb_dist < self.config.cos_sim_thresh {
            return Some(emb_track);
        }
        None
    }

    pub fn num_tracks(&self) -> usize {
        self.store.len()
    }

    pub fn annotations(&self) -> &FaceAnnotations {
        &self.annotations
    }

    pub fn into_annotations(self) -> FaceAnnotations {
        self.annotations
    }
}
