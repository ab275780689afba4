pub mod crop_faces_use_case;
pub mod progress_logger;
pub mod track_faces_use_case;
