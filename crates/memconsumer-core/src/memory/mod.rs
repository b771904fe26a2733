//! Memory introspection and retention
//!
//! [`MemoryProbe`] reports the memory limit the process runs under, how much
//! of it is in use, and the available core count. [`SystemProbe`] reads those
//! from the platform; tests substitute scripted probes.
//! [`Ballast`] holds allocations that must never be freed.

pub mod ballast;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use ballast::Ballast;
pub use system::{LimitSource, SystemProbe};

use crate::Result;

/// Source of memory and CPU figures
pub trait MemoryProbe: Send + Sync {
    /// Memory limit in bytes
    fn max_memory(&self) -> u64;

    /// Memory currently used by this process, in bytes
    fn used_memory(&self) -> Result<u64>;

    /// Logical processors available to this process
    fn available_cores(&self) -> usize;

    /// Remaining headroom below the limit, in bytes
    fn free_memory(&self) -> Result<u64> {
        Ok(self.max_memory().saturating_sub(self.used_memory()?))
    }
}
