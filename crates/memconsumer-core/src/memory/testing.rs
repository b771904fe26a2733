//! Scripted probe for unit tests

use super::MemoryProbe;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Probe whose used memory grows by `step` on every read
pub(crate) struct ScriptedProbe {
    max: u64,
    used: AtomicU64,
    step: u64,
}

impl ScriptedProbe {
    /// Used memory never changes
    pub(crate) fn fixed(max: u64, used: u64) -> Self {
        Self::stepping(max, used, 0)
    }

    pub(crate) fn stepping(max: u64, start: u64, step: u64) -> Self {
        Self {
            max,
            used: AtomicU64::new(start),
            step,
        }
    }

    pub(crate) fn last_used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

impl MemoryProbe for ScriptedProbe {
    fn max_memory(&self) -> u64 {
        self.max
    }

    fn used_memory(&self) -> Result<u64> {
        Ok(self.used.fetch_add(self.step, Ordering::SeqCst) + self.step)
    }

    fn available_cores(&self) -> usize {
        4
    }
}
