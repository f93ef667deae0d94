//! Fixed-capacity rolling sample windows
//!
//! Both the system baseline and the per-process baselines keep their recent
//! history in a [`RollingWindow`]: a fixed backing buffer, a write cursor and
//! a saturating fill count. The mean is recomputed over the filled portion on
//! every push, so readers never pay for a scan.

use trueno::Vector;

/// Fixed-size ring of recent samples with a precomputed mean.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Backing storage; grows up to `capacity` once, then entries are
    /// overwritten in place.
    samples: Vec<f32>,
    capacity: usize,
    cursor: usize,
    filled: usize,
    mean: f32,
}

impl RollingWindow {
    /// Create an empty window holding up to `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be > 0");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            filled: 0,
            mean: 0.0,
        }
    }

    /// Append a sample, overwriting the oldest once the window has wrapped,
    /// and recompute the mean over the filled portion.
    pub fn push(&mut self, value: f32) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.cursor] = value;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        if self.filled < self.capacity {
            self.filled += 1;
        }
        // `samples` holds exactly the filled portion at all times.
        self.mean = Vector::from_slice(&self.samples).mean().unwrap_or(0.0);
    }

    /// Mean over the currently filled samples; 0.0 while empty.
    pub fn mean(&self) -> f32 {
        self.mean
    }

    /// Number of samples recorded so far, saturating at the capacity.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
