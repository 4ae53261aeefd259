//! One-call-at-a-time orchestration of the marshaling round trip.

use std::sync::{Arc, Mutex};

use tracing::{debug, debug_span};

use crate::alloc::AllocatorProxy;
use crate::error::Result;
use crate::frame::Frame;
use crate::marshal;
use crate::module::{ComputeModule, TransformArgs};
use crate::scratch::ScratchChannel;
use crate::view::ViewCache;

/// The marshaling bridge around one compute module instance.
///
/// `detect` takes `&mut self`, so calls are strictly sequential: no second
/// call can begin before the first has read the scratch slot. Callers that
/// need a shared handle use [`SharedBridge`], which holds a lock across the
/// whole call sequence instead.
pub struct EdgeBridge<M: ComputeModule> {
    module: M,
    views: ViewCache,
    alloc: AllocatorProxy,
    scratch: ScratchChannel,
}

impl<M: ComputeModule> EdgeBridge<M> {
    pub fn new(module: M) -> Self {
        Self {
            module,
            views: ViewCache::new(),
            alloc: AllocatorProxy::new(),
            scratch: ScratchChannel::new(),
        }
    }

    #[must_use]
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Direct access to the module, for instrumentation and for forcing
    /// growth in tests. Views taken before any growth become stale and are
    /// recreated transparently on the next bridge call.
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// Allocations handed out and not yet released. Zero between calls.
    #[must_use]
    pub fn outstanding_allocations(&self) -> usize {
        self.alloc.outstanding()
    }

    /// Run one edge-detection round trip: marshal `frame` into the module,
    /// invoke the transform, and return a host-owned copy of the result.
    ///
    /// The result length is whatever the module reported through the scratch
    /// slot; it is not assumed to equal the input length.
    ///
    /// The input allocation is released exactly once whether the call
    /// succeeds or traps; on a trapped call the scratch slot is never read
    /// (it may be unwritten) and the trap surfaces as a single error.
    pub fn detect(
        &mut self,
        frame: &Frame,
        color_key: u32,
        highlight_only: bool,
    ) -> Result<Vec<u8>> {
        let span = debug_span!("detect", width = frame.width(), height = frame.height());
        let _guard = span.enter();

        // Resolve the scratch slot before taking the input allocation so an
        // unusable slot cannot leave an unreleased range behind. The address
        // is cached after the first call.
        let scratch = self.scratch.resolve(&mut self.module)?;
        let input = marshal::write_in(&mut self.module, &mut self.views, &mut self.alloc, frame.pixels())?;

        let args = TransformArgs {
            scratch,
            in_ptr: input.addr(),
            in_len: input.len(),
            width: frame.width(),
            height: frame.height(),
            color_key,
            highlight_only,
        };
        let call = self.module.transform(args);
        // The input range is host-owned around the call; release it exactly
        // once on both the success and the trap path. A trap still wins the
        // error report.
        let released = self.alloc.release(&mut self.module, input);
        call?;
        released?;

        let (result_addr, result_len) = self.scratch.read(&self.module, &mut self.views)?;
        debug!(in_len = frame.len(), result_len, "transform returned");
        let result = self.alloc.adopt(result_addr, result_len);
        marshal::read_out(&mut self.module, &mut self.views, &mut self.alloc, result)
    }
}

impl<M: ComputeModule> Drop for EdgeBridge<M> {
    fn drop(&mut self) {
        self.alloc.warn_if_leaked();
    }
}

/// A clonable handle running every call under a single lock.
///
/// The lock is held across the full (write-in, call, scratch-read, read-out)
/// sequence, so concurrent callers can never observe a scratch value written
/// by an interleaved call.
pub struct SharedBridge<M: ComputeModule> {
    inner: Arc<Mutex<EdgeBridge<M>>>,
}

impl<M: ComputeModule> Clone for SharedBridge<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ComputeModule> SharedBridge<M> {
    pub fn new(module: M) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EdgeBridge::new(module))),
        }
    }

    /// See [`EdgeBridge::detect`].
    pub fn detect(&self, frame: &Frame, color_key: u32, highlight_only: bool) -> Result<Vec<u8>> {
        let mut bridge = self.inner.lock().expect("bridge lock poisoned");
        bridge.detect(frame, color_key, highlight_only)
    }

    /// Run `f` with exclusive access to the underlying bridge.
    pub fn with_bridge<R>(&self, f: impl FnOnce(&mut EdgeBridge<M>) -> R) -> R {
        let mut bridge = self.inner.lock().expect("bridge lock poisoned");
        f(&mut bridge)
    }
}
