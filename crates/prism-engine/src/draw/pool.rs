/// Recycles readback buffers between frames.
#[derive(Debug)]
pub struct PixelPool {
    free: Vec<Vec<u8>>,
    max_retained: usize,
}

impl PixelPool {
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: Vec::new(),
            max_retained,
        }
    }

    /// Returns an empty buffer, reusing a released one when available.
    pub fn take(&mut self) -> Vec<u8> {
        self.free.pop().unwrap_or_default()
    }

    pub fn give(&mut self, mut buf: Vec<u8>) {
        if self.free.len() < self.max_retained {
            buf.clear();
            self.free.push(buf);
        }
    }

    pub fn retained(&self) -> usize {
        self.free.len()
    }
}

impl Default for PixelPool {
    fn default() -> Self {
        Self::new(32)
    }
}
