//! The scratch return slot: two u32 words standing in for a multi-value
//! return over a single-value call boundary.

use tracing::trace;

use crate::error::{BridgeError, Result};
use crate::module::ComputeModule;
use crate::view::{ViewCache, ViewKind, WORD_SIZE};

/// Locates and reads the module's fixed scratch return slot.
///
/// The address is resolved once per bridge lifetime and reused by every
/// call. The slot is not reentrant: it must only be read by the call that
/// just populated it, which the bridge enforces by running calls strictly
/// sequentially.
#[derive(Debug, Default)]
pub struct ScratchChannel {
    addr: Option<u32>,
}

impl ScratchChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the scratch address via the module export, caching it. A
    /// non-word-aligned address is a construction-time error.
    pub fn resolve<M: ComputeModule>(&mut self, module: &mut M) -> Result<u32> {
        if let Some(addr) = self.addr {
            return Ok(addr);
        }
        let addr = module.scratch_ptr()?;
        if addr % WORD_SIZE != 0 {
            return Err(BridgeError::MisalignedScratch { addr });
        }
        trace!(addr, "resolved scratch return slot");
        self.addr = Some(addr);
        Ok(addr)
    }

    /// Read the `(result_addr, result_len)` pair the module wrote into the
    /// slot. Must only be called after a successful transform call; the
    /// module guarantees both words are written before it returns.
    pub fn read<M: ComputeModule>(
        &self,
        module: &M,
        views: &mut ViewCache,
    ) -> Result<(u32, u32)> {
        let addr = self.addr.expect("scratch address resolved before read");
        let view = views.get(ViewKind::Words, module);
        let word = addr / WORD_SIZE;
        let result_addr = view.read_word(module, word)?;
        let result_len = view.read_word(module, word + 1)?;
        Ok((result_addr, result_len))
    }
}
