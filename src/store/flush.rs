//! Flush policies for cached entity kinds.

use parking_lot::Mutex;

/// When a cached write becomes a durable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Every save is written through before it returns.
    Immediate,
    /// Only every Nth save triggers a flush of all pending entries.
    EveryN(u32),
}

impl FlushPolicy {
    /// Build a policy from a save count. `0` and `1` both mean immediate.
    pub fn every(n: u32) -> Self {
        if n <= 1 {
            Self::Immediate
        } else {
            Self::EveryN(n)
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::EveryN(50)
    }
}

/// Counts saves and reports when the policy calls for a flush.
#[derive(Debug)]
pub struct FlushCounter {
    policy: FlushPolicy,
    pending: Mutex<u32>,
}

impl FlushCounter {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            pending: Mutex::new(0),
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Register one save. Returns true when this save is due to be flushed.
    pub fn register_save(&self) -> bool {
        match self.policy {
            FlushPolicy::Immediate => true,
            FlushPolicy::EveryN(n) => {
                let mut pending = self.pending.lock();
                *pending += 1;
                if *pending >= n {
                    *pending = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Forget counted saves after an explicit flush.
    pub fn reset(&self) {
        *self.pending.lock() = 0;
    }
}
