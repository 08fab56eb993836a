//! Fixed-capacity append-only buffer for received values.

/// Bounded collection the consumer workers insert into.
///
/// Values are appended at a monotonically increasing write index; once
/// the index reaches capacity the buffer rejects further writes. Callers
/// serialize access themselves (the consumer pool holds one of these
/// behind a `Mutex`).
#[derive(Debug)]
pub struct BoundedBuffer {
    /// Stored values; `values.len()` is the next write index.
    values: Vec<i32>,
    /// Hard capacity; the write index never passes it.
    capacity: usize,
}

impl BoundedBuffer {
    /// Creates an empty buffer with room for `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `value` at the next write index and returns that index,
    /// or `None` if the buffer is already full.
    pub fn push(&mut self, value: i32) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.values.push(value);
        Some(self.values.len() - 1)
    }

    /// `true` once the write index has reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    /// Number of values stored so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored values in insertion order.
    #[must_use]
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Consumes the buffer, returning the stored values.
    #[must_use]
    pub fn into_values(self) -> Vec<i32> {
        self.values
    }
}
