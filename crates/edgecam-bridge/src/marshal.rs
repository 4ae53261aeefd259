//! Copying byte buffers across the host/module memory boundary.
//!
//! Both directions copy; nothing returned to the caller ever aliases module
//! memory, because any later allocation-triggered growth (or the release
//! below) would leave an aliasing buffer pointing at stale contents.

use crate::alloc::{AllocatorProxy, HeapAlloc};
use crate::error::{BridgeError, Result};
use crate::module::ComputeModule;
use crate::view::{ViewCache, ViewKind};

/// Copy `bytes` into a fresh module-side allocation.
///
/// The byte view is obtained only after the allocation: allocating may grow
/// memory, and copying through a pre-growth view would corrupt data silently.
pub fn write_in<M: ComputeModule>(
    module: &mut M,
    views: &mut ViewCache,
    proxy: &mut AllocatorProxy,
    bytes: &[u8],
) -> Result<HeapAlloc> {
    let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::AllocationFailed {
        len: bytes.len(),
        reason: "input exceeds the module's 32-bit address space".into(),
    })?;
    let alloc = proxy.allocate(module, len)?;
    let view = views.get(ViewKind::Bytes, module);
    view.write_bytes(module, alloc.addr(), bytes)?;
    Ok(alloc)
}

/// Copy an allocation's contents out into a host-owned buffer, then release
/// the module-side range.
///
/// The release happens only after the copy has completed; on a copy failure
/// the range is left unreleased, since a failed bounds check means the
/// (address, length) pair itself cannot be trusted.
pub fn read_out<M: ComputeModule>(
    module: &mut M,
    views: &mut ViewCache,
    proxy: &mut AllocatorProxy,
    alloc: HeapAlloc,
) -> Result<Vec<u8>> {
    let view = views.get(ViewKind::ClampedBytes, module);
    let bytes = view.copy_out(module, alloc.addr(), alloc.len())?;
    proxy.release(module, alloc)?;
    Ok(bytes)
}
