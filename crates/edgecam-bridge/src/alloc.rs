//! Exactly-once allocation lifecycle over the module's allocator exports.

use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::module::ComputeModule;

/// An exclusively owned byte range inside module memory.
///
/// Obtainable only through [`AllocatorProxy`], and releasable only by moving
/// it back into [`AllocatorProxy::release`], so a double free is
/// unrepresentable. The address is meaningless outside the module's memory;
/// reads and writes go through a fresh [`crate::HeapView`].
#[derive(Debug)]
#[must_use]
pub struct HeapAlloc {
    addr: u32,
    len: u32,
}

impl HeapAlloc {
    #[must_use]
    pub fn addr(&self) -> u32 {
        self.addr
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }
}

/// Requests and releases byte ranges inside module memory on behalf of the
/// host, keeping outstanding-allocation accounting so leaks are observable.
#[derive(Debug, Default)]
pub struct AllocatorProxy {
    outstanding: usize,
}

impl AllocatorProxy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `len` bytes inside the module. `len` must be non-zero; the
    /// request is rejected host-side before reaching the module otherwise.
    ///
    /// May grow the module's memory, invalidating every outstanding view.
    pub fn allocate<M: ComputeModule>(&mut self, module: &mut M, len: u32) -> Result<HeapAlloc> {
        if len == 0 {
            return Err(BridgeError::EmptyAllocation);
        }
        let addr = module.alloc(len)?;
        self.outstanding += 1;
        Ok(HeapAlloc { addr, len })
    }

    /// Claim ownership of a range the module allocated on its own (a
    /// transform result), so it participates in the exactly-once accounting
    /// and gets released like any host-made allocation.
    pub fn adopt(&mut self, addr: u32, len: u32) -> HeapAlloc {
        self.outstanding += 1;
        HeapAlloc { addr, len }
    }

    /// Release an allocation back to the module. Consuming the token is what
    /// enforces the exactly-once discipline.
    pub fn release<M: ComputeModule>(&mut self, module: &mut M, alloc: HeapAlloc) -> Result<()> {
        module.dealloc(alloc.addr, alloc.len)?;
        self.outstanding -= 1;
        Ok(())
    }

    /// Number of allocations handed out and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Log a warning if any allocation was never released. Called by the
    /// bridge on drop; a non-zero count after a completed call sequence is a
    /// bug in the caller, not a recoverable state.
    pub(crate) fn warn_if_leaked(&self) {
        if self.outstanding != 0 {
            warn!(
                outstanding = self.outstanding,
                "dropping bridge with unreleased module allocations"
            );
        }
    }
}
