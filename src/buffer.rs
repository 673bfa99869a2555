//! Append-only output buffer for decoded page text.
//!
//! Capacity doubles when exhausted so a page of unknown decoded size costs
//! O(n) copying overall. Memory tracks the actual decoded size rather than a
//! worst-case preallocation.

const MIN_CAPACITY: usize = 64;

#[derive(Debug, Default, Clone)]
pub struct GrowableByteBuffer {
    buf: Vec<u8>,
}

impl GrowableByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let needed = self.buf.len() + bytes.len();
        if needed > self.buf.capacity() {
            let target = needed
                .max(self.buf.capacity().saturating_mul(2))
                .max(MIN_CAPACITY);
            self.buf.reserve_exact(target - self.buf.len());
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Contiguous view of everything appended so far. The borrow pins the
    /// buffer, so the view can't change under the caller.
    pub fn snapshot(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot() {
        let mut b = GrowableByteBuffer::new();
        b.append(b"hello ");
        b.append(b"world");
        assert_eq!(b.snapshot(), b"hello world");
        assert_eq!(b.len(), 11);
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut b = GrowableByteBuffer::with_capacity(8);
        let mut reallocations = 0;
        let mut last_cap = b.capacity();
        for _ in 0..10_000 {
            b.append(b"abc");
            if b.capacity() != last_cap {
                assert!(b.capacity() >= last_cap * 2);
                last_cap = b.capacity();
                reallocations += 1;
            }
        }
        assert_eq!(b.len(), 30_000);
        assert!(reallocations < 16, "too many reallocations: {reallocations}");
    }

    #[test]
    fn test_large_append_exceeding_double() {
        let mut b = GrowableByteBuffer::with_capacity(4);
        b.append(&[7u8; 1000]);
        assert_eq!(b.len(), 1000);
        assert!(b.capacity() >= 1000);
    }
}
