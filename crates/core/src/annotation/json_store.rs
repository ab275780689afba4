use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::annotation::face_annotations::FaceAnnotations;

#[derive(Error, Debug)]
pub enum AnnotationIoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid annotation JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads an annotation mapping from a JSON file.
pub fn load(path: &Path) -> Result<FaceAnnotations, AnnotationIoError> {
    let contents = fs::read_to_string(path).map_err(|source| AnnotationIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| AnnotationIoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves an annotation mapping as compact JSON, creating parent
/// directories as needed.
pub fn save(path: &Path, annotations: &FaceAnnotations) -> Result<(), AnnotationIoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AnnotationIoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string(annotations).expect("annotation mapping serializes");
    fs::write(path, json).map_err(|source| AnnotationIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
