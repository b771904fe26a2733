//! Retained allocations
//!
//! Buffers pushed here live until the process exits. Nothing reads them back;
//! they only keep memory resident so limits are actually hit.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fill pattern for fresh buffers. Zeroed allocations may be mapped lazily
/// and never show up in resident memory.
pub const FILL_BYTE: u8 = 0xA5;

/// Append-only list of buffers kept alive for the process lifetime
#[derive(Default)]
pub struct Ballast {
    buffers: Mutex<Vec<Box<[u8]>>>,
    retained: AtomicU64,
}

impl std::fmt::Debug for Ballast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ballast")
            .field("buffers", &self.len())
            .field("retained", &self.retained_bytes())
            .finish()
    }
}

impl Ballast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a filled buffer of exactly `size` bytes and retain it
    ///
    /// The allocation happens before the lock is taken. Returns the number of
    /// buffers held afterwards. Allocation failure aborts the process.
    pub fn allocate(&self, size: usize) -> usize {
        let buffer = vec![FILL_BYTE; size].into_boxed_slice();
        self.retain(buffer)
    }

    /// Retain an existing buffer. Returns the number of buffers held afterwards.
    pub fn retain(&self, buffer: Box<[u8]>) -> usize {
        let size = buffer.len() as u64;
        let mut buffers = self.buffers.lock();
        buffers.push(buffer);
        self.retained.fetch_add(size, Ordering::Relaxed);
        buffers.len()
    }

    /// Number of buffers held
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held across all buffers
    pub fn retained_bytes(&self) -> u64 {
        self.retained.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn last_len(&self) -> Option<usize> {
        self.buffers.lock().last().map(|b| b.len())
    }
}
