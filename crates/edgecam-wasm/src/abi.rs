//! Stable import/export names shared by the host embedding and the
//! reference module generator.

/// Import module name for host-provided hooks.
pub const IMPORT_MODULE: &str = "env";

/// Host hook a module calls to report a textual failure. The host decodes
/// the UTF-8 message at `(ptr, len)` and traps; the call never returns.
pub const IMPORT_SIGNAL_FAILURE: &str = "signal_failure";

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_ALLOC: &str = "alloc";
pub const EXPORT_DEALLOC: &str = "dealloc";
pub const EXPORT_SCRATCH_PTR: &str = "scratch_ptr";
pub const EXPORT_DETECT: &str = "detect";

/// Bytes per wasm linear-memory page.
pub const PAGE_SIZE: u32 = 65_536;

/// Size of the scratch return record: two little-endian u32 words,
/// `(result_addr, result_len)`.
pub const SCRATCH_RECORD_BYTES: u32 = 8;
