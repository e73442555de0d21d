/// A single-channel 8-bit luminance frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap `pixels`; returns `None` if the buffer does not hold exactly
    /// `width * height` samples.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.pixels[y * self.width + x] = value;
    }

    /// Copy the `size × size` tile whose top-left corner is `(x, y)`.
    /// The tile must lie inside the frame.
    pub fn block(&self, x: usize, y: usize, size: usize) -> Block {
        let mut samples = Vec::with_capacity(size * size);
        for row in 0..size {
            let offset = (y + row) * self.width + x;
            samples.extend_from_slice(&self.pixels[offset..offset + size]);
        }
        Block { x, y, size, samples }
    }

    /// Write `block` back at its own coordinates.
    pub fn put_block(&mut self, block: &Block) {
        for row in 0..block.size {
            let offset = (block.y + row) * self.width + block.x;
            let src = row * block.size;
            self.pixels[offset..offset + block.size]
                .copy_from_slice(&block.samples[src..src + block.size]);
        }
    }
}

/// A square tile copied out of a [`Frame`], identified by its top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub x: usize,
    pub y: usize,
    pub size: usize,
    samples: Vec<u8>,
}

impl Block {
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.samples
    }

    /// Sum of all samples. Blocks of one size rank identically by sum and mean.
    pub fn intensity_sum(&self) -> u64 {
        self.samples.iter().map(|&s| s as u64).sum()
    }

    /// Mean sample intensity.
    pub fn brightness(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.intensity_sum() as f64 / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Frame {
        let pixels = (0..width * height).map(|i| (i % 251) as u8).collect();
        Frame::from_pixels(width, height, pixels).unwrap()
    }

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(Frame::from_pixels(4, 4, vec![0; 15]).is_none());
        assert!(Frame::from_pixels(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_block_copy_and_put_back() {
        let mut frame = gradient(16, 16);
        let original = frame.clone();
        let mut block = frame.block(8, 0, 8);
        assert_eq!(block.samples()[0], frame.get(8, 0));
        assert_eq!(block.samples()[9], frame.get(9, 1));

        block.samples_mut()[9] = 200;
        frame.put_block(&block);
        assert_eq!(frame.get(9, 1), 200);

        let changed = frame
            .pixels()
            .iter()
            .zip(original.pixels())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_brightness_is_mean() {
        let mut frame = Frame::filled(8, 8, 10);
        frame.set(0, 0, 74);
        let block = frame.block(0, 0, 8);
        assert_eq!(block.intensity_sum(), 10 * 64 + 64);
        assert_eq!(block.brightness(), 11.0);
    }
}
