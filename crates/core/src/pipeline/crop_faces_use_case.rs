use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::annotation::face_annotations::FaceAnnotations;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::video::domain::video_reader::VideoReader;

pub const DEFAULT_BBOX_SCALE: f64 = 1.3;

/// Extracts one image crop per annotated (track, frame) pair.
///
/// Crops land under `<output_dir>/<track_id>/<frame_index:06>.png`. The
/// annotated box is optionally re-centered on the nose landmark, expanded
/// to a square of `max(w, h) * bbox_scale`, padded with black where it
/// reaches past the frame, and optionally resized.
pub struct CropFacesUseCase {
    bbox_scale: f64,
    crop_size: Option<u32>,
    align: bool,
}

impl CropFacesUseCase {
    pub fn new(bbox_scale: f64, crop_size: Option<u32>, align: bool) -> Self {
        Self {
            bbox_scale,
            crop_size,
            align,
        }
    }

    /// Walks the video once and saves every annotated crop.
    /// Returns the number of crops written.
    pub fn execute(
        &self,
        reader: &mut dyn VideoReader,
        annotations: &FaceAnnotations,
        output_dir: &Path,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let mut saved = 0;
        {
            let frames = reader.frames();
            for result in frames {
                let frame = result?;
                let frame_key = frame.index().to_string();

                for (track_id, track_frames) in annotations.tracks() {
                    let Some(ann) = track_frames.get(&frame_key) else {
                        continue;
                    };

                    let mut bbox = ann.bbox;
                    if self.align {
                        if let Some(landmarks) = FaceLandmarks::from_flat(&ann.landmarks) {
                            bbox = bbox.align_to(landmarks.nose());
                        }
                    }
                    let bbox = bbox.expand_square(self.bbox_scale);

                    let Some(mut crop) = crop_frame(&frame, &bbox) else {
                        continue;
                    };
                    if let Some(size) = self.crop_size {
                        crop = image::imageops::resize(
                            &crop,
                            size,
                            size,
                            image::imageops::FilterType::Triangle,
                        );
                    }

                    let track_dir = output_dir.join(track_id);
                    fs::create_dir_all(&track_dir)?;
                    crop.save(track_dir.join(format!("{:06}.png", frame.index())))?;
                    saved += 1;
                }
            }
        }
        reader.close();
        Ok(saved)
    }
}

/// Copies the boxed region out of the frame, zero-filling pixels that
/// fall outside its bounds. `None` for an empty region.
fn crop_frame(frame: &Frame, bbox: &BoundingBox) -> Option<RgbImage> {
    let x1 = bbox.x1 as i64;
    let y1 = bbox.y1 as i64;
    let w = bbox.x2 as i64 - x1;
    let h = bbox.y2 as i64 - y1;
    if w <= 0 || h <= 0 {
        return None;
    }

    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let mut out = RgbImage::new(w as u32, h as u32);
    for y in 0..h {
        let sy = y1 + y;
        if sy < 0 || sy >= fh {
            continue;
        }
        for x in 0..w {
            let sx = x1 + x;
            if sx < 0 || sx >= fw {
                continue;
            }
            out.put_pixel(x as u32, y as u32, Rgb(frame.rgb_at(sx as u32, sy as u32)));
        }
    }
    Some(out)
}
