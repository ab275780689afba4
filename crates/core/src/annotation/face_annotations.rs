use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;

/// One resolved detection: the value stored under
/// `annotations[track_id][frame_index]`.
///
/// Field names are the wire format consumed by the downstream crop,
/// trim and size-reduction tools; `landmarks` is the flattened
/// `[x0, y0, x1, y1, ...]` point list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceAnnotation {
    pub bbox: BoundingBox,
    pub prob: f64,
    pub landmarks: Vec<f64>,
}

/// Per-identity, per-frame record sink.
///
/// Purely additive: no matching logic lives here. Frame indices are
/// stored under their canonical decimal string keys, matching the JSON
/// shape `track_id -> frame_index -> annotation`. A track may have frame
/// gaps; keys are unique per (track, frame).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceAnnotations(BTreeMap<String, BTreeMap<String, FaceAnnotation>>);

impl FaceAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one resolved record. A later record for the same
    /// (track, frame) pair replaces the earlier one.
    pub fn record(&mut self, track_id: &str, frame_index: usize, annotation: FaceAnnotation) {
        self.0
            .entry(track_id.to_string())
            .or_default()
            .insert(frame_index.to_string(), annotation);
    }

    pub fn get(&self, track_id: &str, frame_index: usize) -> Option<&FaceAnnotation> {
        self.0.get(track_id)?.get(&frame_index.to_string())
    }

    pub fn num_tracks(&self) -> usize {
        self.0.len()
    }

    pub fn num_frames(&self, track_id: &str) -> usize {
        self.0.get(track_id).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, FaceAnnotation>)> {
        self.0.iter().map(|(id, frames)| (id.as_str(), frames))
    }

    /// Drops every track annotated in fewer than `min_frames` frames.
    /// Returns the removed track ids with their frame counts.
    pub fn trim_short_tracks(&mut self, min_frames: usize) -> Vec<(String, usize)> {
        let removed: Vec<(String, usize)> = self
            .0
            .iter()
            .filter(|(_, frames)| frames.len() < min_frames)
            .map(|(id, frames)| (id.clone(), frames.len()))
            .collect();
        for (id, _) in &removed {
            self.0.remove(id);
        }
        removed
    }

    /// Rounds every value to `precision` decimal places to shrink the
    /// serialized form. Precision 0 truncates toward zero. Each record
    /// key can be opted out through `targets`.
    pub fn round_values(&mut self, precision: u32, targets: &RoundTargets) {
        for frames in self.0.values_mut() {
            for ann in frames.values_mut() {
                if targets.bbox {
                    ann.bbox = BoundingBox::new(
                        round_to(ann.bbox.x1, precision),
                        round_to(ann.bbox.y1, precision),
                        round_to(ann.bbox.x2, precision),
                        round_to(ann.bbox.y2, precision),
                    );
                }
                if targets.prob {
                    ann.prob = round_to(ann.prob, precision);
                }
                if targets.landmarks {
                    for v in &mut ann.landmarks {
                        *v = round_to(*v, precision);
                    }
                }
            }
        }
    }
}

/// Which record keys [`FaceAnnotations::round_values`] touches.
#[derive(Clone, Copy, Debug)]
pub struct RoundTargets {
    pub bbox: bool,
    pub prob: bool,
    pub landmarks: bool,
}

impl Default for RoundTargets {
    fn default() -> Self {
        Self {
            bbox: true,
            prob: true,
            landmarks: true,
        }
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    if precision == 0 {
        return value.trunc();
    }
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
