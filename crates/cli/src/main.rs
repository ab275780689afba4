use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use facetrack_core::annotation::face_annotations::RoundTargets;
use facetrack_core::annotation::json_store;
use facetrack_core::detection::domain::face_detector::FaceDetector;
use facetrack_core::detection::infrastructure::model_resolver;
use facetrack_core::detection::infrastructure::onnx_face_analyzer::{
    OnnxFaceAnalyzer, DEFAULT_CONFIDENCE,
};
use facetrack_core::pipeline::crop_faces_use_case::{CropFacesUseCase, DEFAULT_BBOX_SCALE};
use facetrack_core::pipeline::progress_logger::{
    LogProgressLogger, NullProgressLogger, ProgressLogger,
};
use facetrack_core::pipeline::track_faces_use_case::TrackFacesUseCase;
use facetrack_core::shared::constants::{
    DETECTION_MODEL_NAME, DETECTION_MODEL_URL, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
    VIDEO_EXTENSIONS,
};
use facetrack_core::tracking::face_tracker::TrackerConfig;
use facetrack_core::video::domain::video_reader::VideoReader;
use facetrack_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facetrack_core::video::infrastructure::prefetch_reader::PrefetchReader;

/// Face tracking and identity annotation for video files.
#[derive(Parser)]
#[command(name = "facetrack", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and track faces, writing one annotation JSON per video.
    Detect(DetectArgs),
    /// Save per-track face crops from annotated videos.
    Crop(CropArgs),
    /// Remove tracks with too few annotated frames.
    Trim(TrimArgs),
    /// Round annotation values to shrink JSON files.
    Reduce(ReduceArgs),
}

#[derive(Args)]
struct DetectArgs {
    /// Video files, or directories with --recursive.
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Directory to write annotation files into (default: next to each video).
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Stop after this many frames per video.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Minimum detection confidence for a face to enter tracking.
    #[arg(long, default_value_t = 0.7)]
    det_thresh: f64,

    /// Maximum normalized box displacement for same-track continuity.
    #[arg(long, default_value_t = 0.3)]
    box_disp_thresh: f64,

    /// Maximum cosine distance for embedding-based re-identification.
    #[arg(long, default_value_t = 0.5)]
    cos_sim_thresh: f64,

    /// Search directories recursively for video files.
    #[arg(long)]
    recursive: bool,

    /// Suppress progress output.
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct CropArgs {
    /// Video files, or directories with --recursive.
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Root directory for crop output (one subdirectory per video).
    #[arg(long, default_value = "crops")]
    prefix: PathBuf,

    /// Annotation file to use (default: `<video>.json` next to each video).
    #[arg(long)]
    ann_path: Option<PathBuf>,

    /// Resize crops to this square size in pixels.
    #[arg(long)]
    crop_size: Option<u32>,

    /// Square expansion factor around each annotated box.
    #[arg(long, default_value_t = DEFAULT_BBOX_SCALE)]
    bbox_scale: f64,

    /// Re-center each crop on the nose landmark before expansion.
    #[arg(long)]
    align: bool,

    /// Search directories recursively for video files.
    #[arg(long)]
    recursive: bool,
}

#[derive(Args)]
struct TrimArgs {
    /// Annotation JSON files, or directories with --recursive.
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Tracks with fewer annotated frames than this are dropped.
    #[arg(long, default_value_t = 2)]
    min_frames: usize,

    /// Search directories recursively for JSON files.
    #[arg(long)]
    recursive: bool,

    /// Suppress per-file output.
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct ReduceArgs {
    /// Annotation JSON files, or directories with --recursive.
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Decimal places to keep (0 truncates to integers).
    #[arg(long, default_value_t = 2)]
    precision: u32,

    /// Annotation keys to leave untouched.
    #[arg(long, value_delimiter = ',', value_parser = ["bbox", "prob", "landmarks"])]
    ignore: Vec<String>,

    /// Search directories recursively for JSON files.
    #[arg(long)]
    recursive: bool,

    /// Suppress per-file output.
    #[arg(long)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Detect(args) => run_detect(args),
        Command::Crop(args) => run_crop(args),
        Command::Trim(args) => run_trim(args),
        Command::Reduce(args) => run_reduce(args),
    }
}

fn run_detect(args: DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let videos = collect_files(&args.filenames, args.recursive, VIDEO_EXTENSIONS)?;
    let mut detector = build_detector()?;

    let config = TrackerConfig {
        det_thresh: args.det_thresh,
        box_disp_thresh: args.box_disp_thresh,
        cos_sim_thresh: args.cos_sim_thresh,
    };
    let use_case = TrackFacesUseCase::new(config, args.max_frames);

    for video in &videos {
        let out = annotation_output_path(video, args.prefix.as_deref());
        log::info!("processing {}", video.display());

        let mut reader = PrefetchReader::new(Box::new(FfmpegReader::new()));
        let metadata = reader.open(video)?;

        let mut logger = make_logger(args.quiet);
        let annotations =
            use_case.execute(&mut reader, detector.as_mut(), &metadata, logger.as_mut())?;

        json_store::save(&out, &annotations)?;
        log::info!("wrote {}", out.display());
    }
    Ok(())
}

fn run_crop(args: CropArgs) -> Result<(), Box<dyn std::error::Error>> {
    let videos = collect_files(&args.filenames, args.recursive, VIDEO_EXTENSIONS)?;
    let use_case = CropFacesUseCase::new(args.bbox_scale, args.crop_size, args.align);

    for video in &videos {
        let ann_path = match &args.ann_path {
            Some(path) => path.clone(),
            None => video.with_extension("json"),
        };
        let annotations = json_store::load(&ann_path)?;

        let stem = video
            .file_stem()
            .ok_or_else(|| format!("cannot derive a name from {}", video.display()))?;
        let out_dir = args.prefix.join(stem);

        let mut reader = PrefetchReader::new(Box::new(FfmpegReader::new()));
        reader.open(video)?;
        let saved = use_case.execute(&mut reader, &annotations, &out_dir)?;
        log::info!("{}: saved {saved} crop(s) to {}", video.display(), out_dir.display());
    }
    Ok(())
}

fn run_trim(args: TrimArgs) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(&args.filenames, args.recursive, &["json"])?;

    for file in &files {
        let mut annotations = json_store::load(file)?;
        let removed = annotations.trim_short_tracks(args.min_frames);
        json_store::save(file, &annotations)?;

        if !args.quiet {
            for (track_id, frames) in &removed {
                log::info!("{}: dropped track {track_id} ({frames} frame(s))", file.display());
            }
            log::info!(
                "{}: removed {} track(s), {} remain",
                file.display(),
                removed.len(),
                annotations.num_tracks()
            );
        }
    }
    Ok(())
}

fn run_reduce(args: ReduceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(&args.filenames, args.recursive, &["json"])?;
    let targets = RoundTargets {
        bbox: !args.ignore.iter().any(|k| k == "bbox"),
        prob: !args.ignore.iter().any(|k| k == "prob"),
        landmarks: !args.ignore.iter().any(|k| k == "landmarks"),
    };

    for file in &files {
        let before = fs::metadata(file)?.len();
        let mut annotations = json_store::load(file)?;
        annotations.round_values(args.precision, &targets);
        json_store::save(file, &annotations)?;
        let after = fs::metadata(file)?.len();

        if !args.quiet {
            log::info!(
                "{}: {} -> {}",
                file.display(),
                format_bytes(before),
                format_bytes(after)
            );
        }
    }
    Ok(())
}

fn build_detector() -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let detection_model = model_resolver::resolve(
        DETECTION_MODEL_NAME,
        DETECTION_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    let embedding_model = model_resolver::resolve(
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    Ok(Box::new(OnnxFaceAnalyzer::new(
        &detection_model,
        &embedding_model,
        DEFAULT_CONFIDENCE,
    )?))
}

fn make_logger(quiet: bool) -> Box<dyn ProgressLogger> {
    if quiet {
        Box::new(NullProgressLogger)
    } else {
        Box::new(LogProgressLogger::default())
    }
}

/// Expand the given paths into a flat, sorted file list.
///
/// Files are kept as given; directories are walked only with `recursive`,
/// keeping files whose extension matches `extensions`.
fn collect_files(
    paths: &[PathBuf],
    recursive: bool,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            if !recursive {
                return Err(
                    format!("{} is a directory (use --recursive)", path.display()).into(),
                );
            }
            walk(path, extensions, &mut files)?;
        } else if path.exists() {
            files.push(path.clone());
        } else {
            return Err(format!("file not found: {}", path.display()).into());
        }
    }
    Ok(files)
}

fn walk(
    dir: &Path,
    extensions: &[&str],
    out: &mut Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk(&entry, extensions, out)?;
        } else if has_extension(&entry, extensions) {
            out.push(entry);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Annotation file path for a video: `<stem>.json`, placed either next to
/// the video or under `prefix`.
fn annotation_output_path(video: &Path, prefix: Option<&Path>) -> PathBuf {
    match prefix {
        Some(dir) => {
            let name = video.file_name().unwrap_or_default();
            dir.join(name).with_extension("json")
        }
        None => video.with_extension("json"),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_annotation_output_path_next_to_video() {
        let path = annotation_output_path(Path::new("clips/a.mp4"), None);
        assert_eq!(path, Path::new("clips/a.json"));
    }

    #[test]
    fn test_annotation_output_path_under_prefix() {
        let path = annotation_output_path(Path::new("clips/a.mp4"), Some(Path::new("out")));
        assert_eq!(path, Path::new("out/a.json"));
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("a.MP4"), VIDEO_EXTENSIONS));
        assert!(!has_extension(Path::new("a.txt"), VIDEO_EXTENSIONS));
        assert!(!has_extension(Path::new("noext"), VIDEO_EXTENSIONS));
    }
}
