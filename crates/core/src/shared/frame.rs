/// A single decoded video frame: tightly-packed RGB24 bytes in row-major order.
///
/// Pixel format conversion happens at the I/O boundary; everything past the
/// reader works with plain RGB bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * 3,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 0-based position of this frame in the source video.
    pub fn index(&self) -> usize {
        self.index
    }

    /// RGB triple at pixel `(x, y)`. Panics if out of bounds.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y * self.width + x) * 3) as usize;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let frame = Frame::new(vec![0; 4 * 2 * 3], 4, 2, 7);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.data().len(), 24);
    }

    #[test]
    fn test_rgb_at_reads_correct_pixel() {
        let mut data = vec![0u8; 3 * 2 * 3];
        // Pixel (1, 1) in a 3x2 frame starts at (1*3 + 1) * 3 = 12
        data[12] = 10;
        data[13] = 20;
        data[14] = 30;
        let frame = Frame::new(data, 3, 2, 0);
        assert_eq!(frame.rgb_at(1, 1), [10, 20, 30]);
    }

    #[test]
    #[should_panic]
    fn test_rgb_at_out_of_bounds_panics() {
        let frame = Frame::new(vec![0; 2 * 2 * 3], 2, 2, 0);
        frame.rgb_at(5, 5);
    }
}
