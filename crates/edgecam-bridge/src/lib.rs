//! Host-side marshaling bridge for a linear-memory compute module.
//!
//! The compute module (an edge detector, opaque to this crate) owns a single
//! resizable linear memory; the host shares no pointers and no garbage
//! collector with it. This crate implements the round trip that moves one
//! frame's pixels into the module, invokes the synchronous transform, pulls
//! the variable-length result back out through a fixed scratch return slot
//! (two u32 words standing in for a multi-value return), and releases every
//! module-side allocation exactly once.
//!
//! The bridge is generic over [`ComputeModule`], the consumed export surface,
//! so tests can instrument the module side and embeddings can plug in a real
//! wasm runtime.

#![forbid(unsafe_code)]

mod alloc;
mod bridge;
mod error;
mod frame;
mod marshal;
mod module;
mod scratch;
mod view;

pub use alloc::{AllocatorProxy, HeapAlloc};
pub use bridge::{EdgeBridge, SharedBridge};
pub use error::{BridgeError, Result};
pub use frame::{Frame, BYTES_PER_PIXEL};
pub use marshal::{read_out, write_in};
pub use module::{ComputeModule, MemGeneration, TransformArgs};
pub use scratch::ScratchChannel;
pub use view::{HeapView, ViewCache, ViewKind, WORD_SIZE};
