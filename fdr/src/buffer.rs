use bytes::{Buf, BytesMut};

/// RAM staging area for CSV lines waiting to be flushed
///
/// Consuming a written prefix is O(1); the unwritten suffix stays in place
/// for the next flush attempt.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    bytes: BytesMut,
}

impl WriteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drop the first `count` bytes, clamped to what is buffered
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.bytes.len());
        self.bytes.advance(count);
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
