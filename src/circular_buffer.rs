use std::ops::Range;

/// Fixed-capacity circular byte store.
///
/// Only one rotating index is kept: `read_pos` is the oldest buffered byte
/// and `len` says how many bytes follow it. The write position and both
/// contiguous runs are derived from those two.
pub struct CircularBuffer {
    buffer: Box<[u8]>,
    read_pos: usize,
    len: usize,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            read_pos: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn available_space(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn write_pos(&self) -> usize {
        (self.read_pos + self.len) % self.capacity()
    }

    /// First contiguous run of free space, starting at the write position.
    ///
    /// When the free region wraps past the end of storage only the part up
    /// to the end is returned; the rest is offered once this run is filled.
    pub fn free_run(&self) -> Range<usize> {
        if self.is_full() {
            return 0..0;
        }
        let start = self.write_pos();
        if start < self.read_pos {
            start..self.read_pos
        } else {
            start..self.capacity()
        }
    }

    /// First contiguous run of buffered bytes, starting at the oldest one.
    pub fn filled_run(&self) -> Range<usize> {
        let end = (self.read_pos + self.len).min(self.capacity());
        self.read_pos..end
    }

    /// Append bytes at the write position, wrapping if needed.
    ///
    /// Returns how many bytes were stored, which is less than `data.len()`
    /// only when the ring runs out of space.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let to_add = data.len().min(self.available_space());
        if to_add == 0 {
            return 0;
        }

        let start = self.write_pos();
        let first = to_add.min(self.capacity() - start);
        self.buffer[start..start + first].copy_from_slice(&data[..first]);
        // Remainder continues at the front of storage.
        self.buffer[..to_add - first].copy_from_slice(&data[first..to_add]);

        self.len += to_add;
        to_add
    }

    /// Copy the start of the filled run into `out` without consuming it.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let run = self.filled_run();
        let n = run.len().min(out.len());
        out[..n].copy_from_slice(&self.buffer[run.start..run.start + n]);
        n
    }

    /// Drop the `count` oldest bytes.
    pub fn discard(&mut self, count: usize) {
        assert!(count <= self.len, "discarding more bytes than are buffered");
        if count == 0 {
            return;
        }
        self.read_pos = (self.read_pos + count) % self.capacity();
        self.len -= count;
    }
}
