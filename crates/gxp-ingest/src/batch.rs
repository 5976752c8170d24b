//! Batch buffer
//!
//! Accumulates parsed records into fixed-size groups for bulk commit.
//! Input order is preserved within a batch; batches are independent of
//! each other once emitted.

/// Fixed-capacity record accumulator.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> BatchBuffer<T> {
    /// Create a buffer that emits batches of `capacity` records.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; the config layer rejects that
    /// before a buffer is ever built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be greater than 0");
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append a record. Returns the full batch (and resets the buffer)
    /// exactly when the configured capacity is reached.
    pub fn accept(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() == self.capacity {
            Some(self.take())
        } else {
            None
        }
    }

    /// Drain whatever remains, regardless of size. The final partial
    /// batch of an ingestion must never be dropped.
    pub fn flush(&mut self) -> Vec<T> {
        self.take()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }
}
