//! Generation-checked typed views over module linear memory.
//!
//! A view taken before a resize is stale and must never be read or written
//! afterwards: the backing region may have moved and a stale window silently
//! corrupts data without a visible error. Staleness is prevented
//! structurally: every accessor re-checks the view's generation against the
//! module's current one, and [`ViewCache`] recreates views transparently.

use tracing::trace;

use crate::error::{BridgeError, Result};
use crate::module::{ComputeModule, MemGeneration};

/// Element width of the word-granularity view, in bytes.
pub const WORD_SIZE: u32 = 4;

/// The typed windows the bridge takes over module memory.
///
/// `Bytes` and `ClampedBytes` are both byte-granularity; the clamped kind is
/// the one handed to canvas-bound pixel paths and caches independently.
/// `Words` reads little-endian u32s at word granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Bytes,
    ClampedBytes,
    Words,
}

/// A window spanning the entire module memory, tagged with the resize epoch
/// it was created against.
///
/// A `HeapView` carries no data of its own; accessors borrow the module's
/// memory at use time after the freshness check passes. A failed check is a
/// fatal internal-invariant violation ([`BridgeError::StaleView`]), not a
/// recoverable condition.
#[derive(Debug, Clone, Copy)]
pub struct HeapView {
    kind: ViewKind,
    generation: MemGeneration,
    byte_len: usize,
}

impl HeapView {
    #[must_use]
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    #[must_use]
    pub fn generation(&self) -> MemGeneration {
        self.generation
    }

    /// Size of the memory region this view spans.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    fn check_fresh(&self, module: &impl ComputeModule) -> Result<()> {
        let current = module.memory_generation();
        if self.generation != current {
            return Err(BridgeError::StaleView {
                held: self.generation.get(),
                current: current.get(),
            });
        }
        Ok(())
    }

    fn byte_range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(BridgeError::OutOfBounds {
            addr,
            len,
            memory_len: self.byte_len,
        })?;
        if end > self.byte_len {
            return Err(BridgeError::OutOfBounds {
                addr,
                len,
                memory_len: self.byte_len,
            });
        }
        Ok(start..end)
    }

    /// Copy `bytes` into module memory starting at `addr`.
    pub fn write_bytes(
        &self,
        module: &mut impl ComputeModule,
        addr: u32,
        bytes: &[u8],
    ) -> Result<()> {
        self.check_fresh(module)?;
        let range = self.byte_range(addr, bytes.len())?;
        module.memory_mut()[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `[addr, addr + len)` out of module memory into a host-owned
    /// buffer. The result never aliases module memory.
    pub fn copy_out(&self, module: &impl ComputeModule, addr: u32, len: u32) -> Result<Vec<u8>> {
        self.check_fresh(module)?;
        let range = self.byte_range(addr, len as usize)?;
        Ok(module.memory()[range].to_vec())
    }

    /// Read the little-endian u32 at `word_index` (a byte address divided by
    /// [`WORD_SIZE`]).
    pub fn read_word(&self, module: &impl ComputeModule, word_index: u32) -> Result<u32> {
        self.check_fresh(module)?;
        let addr = word_index
            .checked_mul(WORD_SIZE)
            .ok_or(BridgeError::OutOfBounds {
                addr: word_index,
                len: WORD_SIZE as usize,
                memory_len: self.byte_len,
            })?;
        let range = self.byte_range(addr, WORD_SIZE as usize)?;
        let bytes: [u8; 4] = module.memory()[range]
            .try_into()
            .expect("word range is 4 bytes");
        Ok(u32::from_le_bytes(bytes))
    }
}

/// Caches one view per kind, recreating whenever the module's resize epoch
/// has moved past the cached copy. Recreation is transparent to callers.
#[derive(Debug, Default)]
pub struct ViewCache {
    bytes: Option<HeapView>,
    clamped: Option<HeapView>,
    words: Option<HeapView>,
}

impl ViewCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a fresh view of the requested kind, spanning the entire
    /// current memory region.
    pub fn get(&mut self, kind: ViewKind, module: &impl ComputeModule) -> HeapView {
        let slot = match kind {
            ViewKind::Bytes => &mut self.bytes,
            ViewKind::ClampedBytes => &mut self.clamped,
            ViewKind::Words => &mut self.words,
        };
        let current = module.memory_generation();
        if let Some(view) = *slot {
            if view.generation() == current {
                return view;
            }
        }
        let view = HeapView {
            kind,
            generation: current,
            byte_len: module.memory().len(),
        };
        trace!(
            ?kind,
            generation = current.get(),
            len = view.byte_len,
            "recreated module memory view"
        );
        *slot = Some(view);
        view
    }
}
