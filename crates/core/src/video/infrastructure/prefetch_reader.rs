use std::path::Path;
use std::thread;

use crossbeam_channel::bounded;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Frames buffered ahead of the consumer.
const DEFAULT_QUEUE_SIZE: usize = 128;

/// Decorator that decodes ahead of the consumer on a background thread.
///
/// Decode and detection then overlap while the consumer still observes a
/// plain sequential frame stream. Frame order is preserved by the bounded
/// channel. The decode thread stops on its own once the frame iterator is
/// dropped (the channel disconnects), so an early stop via `max_frames`
/// does not decode the whole file.
pub struct PrefetchReader {
    inner: Option<Box<dyn VideoReader>>,
    queue_size: usize,
}

impl PrefetchReader {
    pub fn new(inner: Box<dyn VideoReader>) -> Self {
        Self::with_queue_size(inner, DEFAULT_QUEUE_SIZE)
    }

    pub fn with_queue_size(inner: Box<dyn VideoReader>, queue_size: usize) -> Self {
        Self {
            inner: Some(inner),
            queue_size: queue_size.max(1),
        }
    }
}

impl VideoReader for PrefetchReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        self.inner
            .as_mut()
            .ok_or("PrefetchReader: frames already consumed")?
            .open(path)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(mut reader) = self.inner.take() else {
            return Box::new(std::iter::once(Err(
                "PrefetchReader: frames already consumed".into(),
            )));
        };

        let (tx, rx) = bounded::<Result<Frame, String>>(self.queue_size);
        thread::spawn(move || {
            for item in reader.frames() {
                // Box<dyn Error> is not Send; carry errors as strings.
                let message = item.map_err(|e| e.to_string());
                if tx.send(message).is_err() {
                    break;
                }
            }
            reader.close();
        });

        Box::new(rx.into_iter().map(|item| item.map_err(Into::into)))
    }

    fn close(&mut self) {
        if let Some(mut reader) = self.inner.take() {
            reader.close();
        }
    }
}
