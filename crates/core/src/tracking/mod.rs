pub mod face_tracker;
pub mod track_store;
