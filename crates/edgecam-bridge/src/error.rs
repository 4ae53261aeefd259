use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for bridge operations.
///
/// Everything surfaces synchronously to the caller of
/// [`EdgeBridge::detect`](crate::EdgeBridge::detect); nothing is retried
/// automatically. [`BridgeError::StaleView`] is a defensive detection of an
/// internal invariant violation and must be treated as fatal, never as a
/// retryable condition.
///
/// Note: module-side failures store a human-readable `String` rather than a
/// runtime-specific error type so embeddings can surface messages originating
/// from any wasm engine (or from test doubles) without a platform-specific
/// variant.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A zero-byte allocation was requested; rejected host-side before
    /// reaching the module.
    #[error("zero-byte module allocation rejected")]
    EmptyAllocation,

    /// The module could not satisfy an allocation request.
    #[error("module allocation of {len} bytes failed: {reason}")]
    AllocationFailed { len: usize, reason: String },

    /// The module reported a textual failure; the message is surfaced
    /// verbatim.
    #[error("{0}")]
    ModuleFailure(String),

    /// The module trapped without reporting a message.
    #[error("module trapped: {0}")]
    ModuleTrap(String),

    /// A view created against an older memory generation was used after the
    /// memory was resized.
    #[error("stale memory view: held generation {held}, current {current}")]
    StaleView { held: u64, current: u64 },

    #[error("range out of bounds: addr={addr:#x} len={len} memory={memory_len}")]
    OutOfBounds {
        addr: u32,
        len: usize,
        memory_len: usize,
    },

    /// The module's scratch return slot is not word-aligned.
    #[error("scratch address {addr:#x} is not word-aligned")]
    MisalignedScratch { addr: u32 },

    #[error("frame length {actual} does not match {width}x{height} RGBA")]
    BadFrameLength { width: u32, height: u32, actual: usize },
}
