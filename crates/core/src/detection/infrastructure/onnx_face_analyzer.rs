/// Combined face detector and embedder backed by ONNX Runtime via `ort`.
///
/// Runs a YOLO-pose face model (letterbox preprocessing, NMS) and an
/// ArcFace recognition model per detection, so every `FaceDetection`
/// leaves this layer carrying its appearance embedding.
use std::path::Path;

use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarks::{FaceLandmarks, NUM_LANDMARKS};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback detection input resolution when the model doesn't specify one.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Keypoint block per detection row (5 landmarks x 3 values: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = NUM_LANDMARKS * 3;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// ArcFace input resolution and pixel normalization.
const EMBED_INPUT_SIZE: usize = 112;
const EMBED_NORM_MEAN: f32 = 127.5;
const EMBED_NORM_STD: f32 = 127.5;

/// Preferred ONNX execution providers for the current platform.
/// Falls back to CPU when no platform-specific provider exists.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

pub struct OnnxFaceAnalyzer {
    detection: ort::session::Session,
    embedding: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceAnalyzer {
    /// Load both ONNX models and prepare for inference.
    ///
    /// The detection input resolution is read from the model's input shape
    /// (expecting NCHW); falls back to 640 when the shape is dynamic.
    pub fn new(
        detection_model: &Path,
        embedding_model: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detection = build_session(detection_model)?;
        let embedding = build_session(embedding_model)?;

        let input_size = detection
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // shape is [N, C, H, W]; square input, so H is enough
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            detection,
            embedding,
            confidence,
            input_size,
        })
    }

    fn embed(&mut self, frame: &Frame, bbox: &BoundingBox) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let (crop, side) = square_crop(frame, bbox);
        let tensor = preprocess_embed(&crop, side);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.embedding.run(ort::inputs![input_value])?;
        let array = outputs[0].try_extract_array::<f32>()?;
        let slice = array.as_slice().ok_or("cannot get embedding slice")?;

        let mut embedding = slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceDetector for OnnxFaceAnalyzer {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
        // 1. Preprocess: letterbox + normalize -> NCHW float32
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.detection.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("detection model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // Output is [1, num_features, num_detections] (transposed) or
        // [1, num_detections, num_features]. Handle both.
        let (num_dets, num_feats) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1])
            } else {
                (shape[1], shape[2])
            }
        } else {
            return Err(format!("unexpected detection output shape: {shape:?}").into());
        };

        let data = tensor.as_slice().ok_or("cannot get tensor slice")?;
        let transposed = shape.len() == 3 && shape[1] < shape[2];

        // 3. Parse rows: [cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]
        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row = if transposed {
                (0..num_feats)
                    .map(|f| data[f * num_dets + i])
                    .collect::<Vec<f32>>()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };

            if row.len() < 5 {
                continue;
            }
            let conf = row[4] as f64;
            if conf < self.confidence {
                continue;
            }

            let cx = row[0] as f64;
            let cy = row[1] as f64;
            let w = row[2] as f64;
            let h = row[3] as f64;

            // Convert from letterbox coords back to original frame coords
            let x1 = ((cx - w / 2.0) - pad_x as f64) / scale;
            let y1 = ((cy - h / 2.0) - pad_y as f64) / scale;
            let x2 = ((cx + w / 2.0) - pad_x as f64) / scale;
            let y2 = ((cy + h / 2.0) - pad_y as f64) / scale;

            let mut pts = [(0.0f64, 0.0f64); NUM_LANDMARKS];
            if row.len() >= 5 + NUM_KEYPOINT_VALUES {
                for k in 0..NUM_LANDMARKS {
                    let kconf = row[5 + k * 3 + 2] as f64;
                    if kconf >= KEYPOINT_CONF_THRESH {
                        let kx = row[5 + k * 3] as f64;
                        let ky = row[5 + k * 3 + 1] as f64;
                        pts[k] = ((kx - pad_x as f64) / scale, (ky - pad_y as f64) / scale);
                    }
                    // else: stays (0.0, 0.0), treated as invisible
                }
            }

            raw_dets.push(RawDetection {
                bbox: BoundingBox::new(x1, y1, x2, y2),
                score: conf,
                keypoints: pts,
            });
        }

        // 4. NMS
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);

        // End the borrow of `self.detection` before running the embedding session.
        drop(outputs);

        // 5. Embed each surviving face
        let mut detections = Vec::with_capacity(kept.len());
        for det in kept {
            let embedding = self.embed(frame, &det.bbox)?;
            detections.push(FaceDetection {
                bbox: det.bbox,
                score: det.score,
                landmarks: FaceLandmarks::new(det.keypoints),
                embedding,
            });
        }

        Ok(detections)
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` x `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded canvas filled with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_w = frame.width();
    let src_h = frame.height();

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            let rgb = frame.rgb_at(src_x, src_y);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = rgb[c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Extract a square region around the box center with side `max(w, h)`,
/// zero-padding pixels that fall outside the frame.
///
/// Returns the tightly-packed RGB bytes and the side length.
fn square_crop(frame: &Frame, bbox: &BoundingBox) -> (Vec<u8>, usize) {
    let side = bbox.max_side().ceil().max(1.0) as i64;
    let (cx, cy) = bbox.center();
    let x1 = (cx - side as f64 / 2.0) as i64;
    let y1 = (cy - side as f64 / 2.0) as i64;

    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let mut out = vec![0u8; (side * side * 3) as usize];
    for y in 0..side {
        let sy = y1 + y;
        if sy < 0 || sy >= fh {
            continue;
        }
        for x in 0..side {
            let sx = x1 + x;
            if sx < 0 || sx >= fw {
                continue;
            }
            let rgb = frame.rgb_at(sx as u32, sy as u32);
            let offset = ((y * side + x) * 3) as usize;
            out[offset..offset + 3].copy_from_slice(&rgb);
        }
    }
    (out, side as usize)
}

/// Resize a square RGB crop to 112x112 and normalize to `(x - 127.5) / 127.5`
/// in NCHW layout.
fn preprocess_embed(rgb_data: &[u8], side: usize) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));

    for y in 0..EMBED_INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * side as f64 / EMBED_INPUT_SIZE as f64) as usize)
            .min(side - 1);
        for x in 0..EMBED_INPUT_SIZE {
            let src_x = (((x as f64 + 0.5) * side as f64 / EMBED_INPUT_SIZE as f64) as usize)
                .min(side - 1);
            let offset = (src_y * side + src_x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (rgb_data[offset + c] as f32 - EMBED_NORM_MEAN) / EMBED_NORM_STD;
            }
        }
    }

    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: BoundingBox,
    score: f64,
    keypoints: [(f64, f64); NUM_LANDMARKS],
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
