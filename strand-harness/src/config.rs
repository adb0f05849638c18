//! Workload sizes for the experiments.

use strand_queue::DEFAULT_SPIN_ITERS;

use crate::HarnessError;

/// Workload sizes. `Default` reproduces the classic demonstration: four
/// tasks of 10 000 increments, one producer handing 100 items to one
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Tasks incrementing each counter.
    pub tasks: usize,
    /// Increments per task.
    pub per_task: u64,
    /// Items each producer enqueues (`0..items`).
    pub items: u64,
    /// Producer tasks feeding the hand-off queue.
    pub producers: usize,
    /// Consumer tasks draining the hand-off queue.
    pub consumers: usize,
    /// Backoff rounds a consumer spins before parking.
    pub spin_iters: usize,
    /// Iterations of the timed loop.
    pub loop_iters: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tasks: 4,
            per_task: 10_000,
            items: 100,
            producers: 1,
            consumers: 1,
            spin_iters: DEFAULT_SPIN_ITERS,
            loop_iters: 1_000_000,
        }
    }
}

impl HarnessConfig {
    /// Rejects sizes that would make an experiment meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.tasks == 0 {
            return Err(HarnessError::InvalidConfig("tasks must be at least 1"));
        }
        if self.producers == 0 {
            return Err(HarnessError::InvalidConfig("producers must be at least 1"));
        }
        if self.consumers == 0 {
            return Err(HarnessError::InvalidConfig("consumers must be at least 1"));
        }
        if (self.tasks as u64).checked_mul(self.per_task).is_none() {
            return Err(HarnessError::InvalidConfig("tasks * per_task overflows"));
        }
        if handoff_expected_sum(self.producers as u64, self.items).is_none() {
            return Err(HarnessError::InvalidConfig("handoff sum overflows"));
        }
        Ok(())
    }
}

/// `producers * (0 + 1 + ... + items - 1)`, or `None` on overflow.
pub(crate) fn handoff_expected_sum(producers: u64, items: u64) -> Option<u64> {
    // Halve whichever factor is even so only true overflow is rejected
    let (a, b) = if items % 2 == 0 {
        (items / 2, items.saturating_sub(1))
    } else {
        (items, (items - 1) / 2)
    };
    producers.checked_mul(a.checked_mul(b)?)
}
