use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;

#[derive(Error, Debug)]
pub enum TrackStoreError {
    #[error("unknown track id: {0}")]
    UnknownTrack(String),
}

/// Appearance state for one identity: running mean embedding plus the box
/// of the most recently assigned detection.
#[derive(Clone, Debug)]
struct TrackState {
    id: String,
    embedding_sum: Vec<f32>,
    count: usize,
    last_bbox: BoundingBox,
}

/// Live identities of one video, answering the tracker's two
/// nearest-neighbor queries.
///
/// Backed by an insertion-ordered list rather than a map keyed by
/// position, so ties in both queries resolve to the earliest-created
/// track and iteration order is deterministic. Tracks are never removed;
/// a store lives exactly as long as one video's processing.
#[derive(Default)]
pub struct TrackStore {
    tracks: Vec<TrackState>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Registers a contribution to `track_id`, creating the track on first
    /// use. Appends the embedding to the running mean and overwrites the
    /// last-seen box. Always succeeds.
    pub fn add(&mut self, track_id: &str, bbox: BoundingBox, embedding: &[f32]) {
        match self.tracks.iter_mut().find(|t| t.id == track_id) {
            Some(track) => {
                debug_assert_eq!(track.embedding_sum.len(), embedding.len());
                for (acc, value) in track.embedding_sum.iter_mut().zip(embedding) {
                    *acc += value;
                }
                track.count += 1;
                track.last_bbox = bbox;
            }
            None => self.tracks.push(TrackState {
                id: track_id.to_string(),
                embedding_sum: embedding.to_vec(),
                count: 1,
                last_bbox: bbox,
            }),
        }
    }

    /// Component-wise mean of every embedding added under `track_id`.
    pub fn mean_embedding(&self, track_id: &str) -> Result<Vec<f32>, TrackStoreError> {
        let track = self
            .tracks
            .iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| TrackStoreError::UnknownTrack(track_id.to_string()))?;
        Ok(mean_of(track))
    }

    /// Track whose last box center is nearest to `bbox`'s center, with the
    /// raw pixel distance. `None` when the store is empty; callers must
    /// special-case that instead of relying on this query.
    pub fn closest_by_box(&self, bbox: &BoundingBox) -> Option<(String, f64)> {
        let mut best: Option<(&TrackState, f64)> = None;
        for track in &self.tracks {
            let dist = bbox.center_distance(&track.last_bbox);
            // Strict < keeps the earliest-created track on ties.
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((track, dist));
            }
        }
        best.map(|(track, dist)| (track.id.clone(), dist))
    }

    /// Track whose mean embedding is nearest to `embedding` under cosine
    /// distance, with that distance. `None` when the store is empty.
    pub fn closest_by_embedding(&self, embedding: &[f32]) -> Option<(String, f64)> {
        let mut best: Option<(&TrackState, f64)> = None;
        for track in &self.tracks {
            let dist = cosine_distance(&mean_of(track), embedding);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((track, dist));
            }
        }
        best.map(|(track, dist)| (track.id.clone(), dist))
    }
}

fn mean_of(track: &TrackState) -> Vec<f32> {
    let n = track.count as f32;
    track.embedding_sum.iter().map(|v| v / n).collect()
}

/// `1 - a·b / (‖a‖‖b‖)`, range [0, 2], smaller means more similar.
///
/// A zero-norm vector has no direction; it maps to the maximum distance
/// rather than NaN so it can never win a match.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    #[test]
    fn test_add_creates_track() {
        let mut store = TrackStore::new();
        assert!(store.is_empty());
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_mean_embedding_single_contribution() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[0.5, 0.25]);
        assert_eq!(store.mean_embedding("0").unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_mean_embedding_averages_contributions() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("0", bbox(1.0, 1.0, 11.0, 11.0), &[0.0, 1.0]);
        store.add("0", bbox(2.0, 2.0, 12.0, 12.0), &[0.5, 0.5]);
        let mean = store.mean_embedding("0").unwrap();
        assert_relative_eq!(mean[0], 0.5);
        assert_relative_eq!(mean[1], 0.5);
    }

    #[test]
    fn test_mean_embedding_unknown_track_fails() {
        let store = TrackStore::new();
        assert!(matches!(
            store.mean_embedding("7"),
            Err(TrackStoreError::UnknownTrack(id)) if id == "7"
        ));
    }

    #[test]
    fn test_add_overwrites_last_bbox() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("0", bbox(100.0, 100.0, 110.0, 110.0), &[1.0, 0.0]);
        // The old box at the origin no longer matters for box queries.
        let (id, dist) = store.closest_by_box(&bbox(100.0, 100.0, 110.0, 110.0)).unwrap();
        assert_eq!(id, "0");
        assert_relative_eq!(dist, 0.0);
    }

    #[test]
    fn test_closest_by_box_picks_nearest_center() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("1", bbox(100.0, 0.0, 110.0, 10.0), &[0.0, 1.0]);
        let (id, dist) = store.closest_by_box(&bbox(98.0, 0.0, 108.0, 10.0)).unwrap();
        assert_eq!(id, "1");
        assert_relative_eq!(dist, 2.0);
    }

    #[test]
    fn test_closest_by_box_empty_store() {
        let store = TrackStore::new();
        assert!(store.closest_by_box(&bbox(0.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn test_closest_by_box_tie_prefers_first_created() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("1", bbox(0.0, 0.0, 10.0, 10.0), &[0.0, 1.0]);
        let (id, _) = store.closest_by_box(&bbox(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(id, "0");
    }

    #[test]
    fn test_closest_by_embedding_picks_most_similar() {
        let mut store = TrackStore::new();
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("1", bbox(20.0, 0.0, 30.0, 10.0), &[0.0, 1.0]);
        let (id, dist) = store.closest_by_embedding(&[0.1, 0.9]).unwrap();
        assert_eq!(id, "1");
        assert!(dist < 0.1);
    }

    #[test]
    fn test_closest_by_embedding_uses_running_mean() {
        let mut store = TrackStore::new();
        // Track "0" drifts: mean of [1,0] and [0,1] points at 45 degrees.
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[1.0, 0.0]);
        store.add("0", bbox(0.0, 0.0, 10.0, 10.0), &[0.0, 1.0]);
        store.add("1", bbox(20.0, 0.0, 30.0, 10.0), &[-1.0, 0.0]);
        let (id, dist) = store.closest_by_embedding(&[1.0, 1.0]).unwrap();
        assert_eq!(id, "0");
        assert_relative_eq!(dist, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closest_by_embedding_empty_store() {
        let store = TrackStore::new();
        assert!(store.closest_by_embedding(&[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_cosine_distance_identical() {
        assert_relative_eq!(cosine_distance(&[0.6, 0.8], &[0.6, 0.8]), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]), 1.0);
    }

    #[test]
    fn test_cosine_distance_opposite() {
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0);
    }

    #[test]
    fn test_cosine_distance_scale_invariant() {
        assert_relative_eq!(
            cosine_distance(&[2.0, 0.0], &[100.0, 0.0]),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cosine_distance_zero_vector_never_matches() {
        assert_relative_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
    }
}
