use crate::error::Result;

/// Memory-resize epoch counter.
///
/// Implementations bump this whenever an operation may have grown the
/// module's linear memory and the observed size actually changed. Views
/// created against an older generation must not be used; see
/// [`crate::ViewCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemGeneration(u64);

impl MemGeneration {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// The generation following this one.
    #[must_use]
    pub fn next(self) -> Self {
        MemGeneration(self.0 + 1)
    }
}

/// Arguments forwarded to the module's transform export.
///
/// The module is expected to allocate its own result buffer, write
/// `(result_addr, result_len)` into the two words at `scratch`, and return.
/// It must not free the input range; the host owns it around the call.
#[derive(Debug, Clone, Copy)]
pub struct TransformArgs {
    pub scratch: u32,
    pub in_ptr: u32,
    pub in_len: u32,
    pub width: u32,
    pub height: u32,
    /// Packed RGBA color painted on detected edges.
    pub color_key: u32,
    /// When set, the module emits only the highlighted edges.
    pub highlight_only: bool,
}

/// The consumed export surface of a compute module.
///
/// This is the seam between the bridge's marshaling logic and a concrete
/// module host (a wasm embedding in production, an instrumented mock in
/// tests). All calls are synchronous and run to completion; no call may be
/// issued while another is in flight.
pub trait ComputeModule {
    /// Delegate of the module's allocation export. May grow linear memory,
    /// invalidating every outstanding view.
    fn alloc(&mut self, len: u32) -> Result<u32>;

    /// Delegate of the module's deallocation export. Calling this twice for
    /// the same range, or for a range that is not currently allocated, is
    /// undefined behavior module-side; the bridge's ownership discipline
    /// ([`crate::HeapAlloc`]) makes that unrepresentable.
    fn dealloc(&mut self, ptr: u32, len: u32) -> Result<()>;

    /// Delegate of the module's scratch-slot resolution export.
    fn scratch_ptr(&mut self) -> Result<u32>;

    /// Invoke the transform export. On success the module has written both
    /// scratch words before returning; on failure the scratch slot must not
    /// be read.
    fn transform(&mut self, args: TransformArgs) -> Result<()>;

    /// Borrow the module's current linear memory.
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Current resize epoch. Strictly increases across any observed growth.
    fn memory_generation(&self) -> MemGeneration;
}
