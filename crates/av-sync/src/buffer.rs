/// Reusable byte buffer for audio reads.
///
/// Capacity grows to the largest request ever made and is never shrunk, so steady-state
/// reads do not allocate.
#[derive(Debug, Default)]
pub struct AudioChunkBuffer {
    buf: Vec<u8>,
}

impl AudioChunkBuffer {
    pub fn with_capacity(bytes: usize) -> Self {
        Self { buf: vec![0; bytes] }
    }

    /// Bytes currently available without growing.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether a request of `bytes` fits without growing.
    pub fn has_room(&self, bytes: usize) -> bool {
        self.buf.len() >= bytes
    }

    /// Borrow `bytes` writable bytes, growing first if the request is larger than any before.
    pub fn slice_mut(&mut self, bytes: usize) -> &mut [u8] {
        if !self.has_room(bytes) {
            self.buf.resize(bytes, 0);
        }
        &mut self.buf[..bytes]
    }

    /// First `bytes` of the buffer, as filled by the last read.
    pub fn filled(&self, bytes: usize) -> &[u8] {
        &self.buf[..bytes.min(self.buf.len())]
    }
}
