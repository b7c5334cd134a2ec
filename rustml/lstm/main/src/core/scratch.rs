//! Scratch pooling for the cell's internal temporaries.
//!
//! A buffer handed out by `get()` is zero-filled. Buffers returned via `put()`
//! are kept, up to the pool capacity, and handed back by a later `get()` that
//! fits. A pool of capacity 0 frees every buffer on `put()`.

/// A pool of reusable f32 scratch buffers.
#[derive(Debug, Default)]
pub(crate) struct ScratchPool {
    buffers: Vec<Vec<f32>>,
    capacity: usize,
}

impl ScratchPool {
    /// Create a new pool with the given maximum number of cached buffers.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffers: Vec::new(),
            capacity,
        }
    }

    /// Get a zeroed buffer of exactly `len` elements.
    ///
    /// The smallest cached buffer whose capacity fits is reused.
    pub(crate) fn get(&mut self, len: usize) -> Vec<f32> {
        let best = self
            .buffers
            .iter()
            .enumerate()
            .filter(|(_, buf)| buf.capacity() >= len)
            .min_by_key(|(_, buf)| buf.capacity())
            .map(|(i, _)| i);

        match best {
            Some(idx) => {
                let mut buf = self.buffers.swap_remove(idx);
                buf.clear();
                buf.resize(len, 0.0);
                buf
            }
            None => vec![0.0; len],
        }
    }

    /// Return a buffer to the pool. Dropped when the pool is full.
    pub(crate) fn put(&mut self, buf: Vec<f32>) {
        if self.buffers.len() < self.capacity {
            self.buffers.push(buf);
        }
    }

    /// Release every cached buffer.
    pub(crate) fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Total f32 capacity currently cached.
    pub(crate) fn cached_elems(&self) -> usize {
        self.buffers.iter().map(|b| b.capacity()).sum()
    }
}

/// Splits the next `len` elements off the front of `buf`.
pub(crate) fn carve<'a>(buf: &mut &'a mut [f32], len: usize) -> &'a mut [f32] {
    let (head, tail) = std::mem::take(buf).split_at_mut(len);
    *buf = tail;
    head
}
