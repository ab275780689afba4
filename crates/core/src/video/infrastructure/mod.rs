pub mod ffmpeg_reader;
pub mod prefetch_reader;
