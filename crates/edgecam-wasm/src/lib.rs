//! Wasm-side counterpart of the marshaling bridge.
//!
//! Three pieces live here: the stable import/export name surface a compute
//! module must present ([`abi`]), a `wasm-encoder`-generated reference module
//! implementing that surface ([`refmod`]), and a Wasmtime embedding that
//! hosts a compiled module behind the bridge's
//! [`ComputeModule`](edgecam_bridge::ComputeModule) seam ([`host`], native
//! targets only).

pub mod abi;
pub mod refmod;

#[cfg(not(target_arch = "wasm32"))]
pub mod host;

#[cfg(not(target_arch = "wasm32"))]
pub use host::{InstantiateError, WasmtimeModule};
