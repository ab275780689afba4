pub mod face_annotations;
pub mod json_store;
