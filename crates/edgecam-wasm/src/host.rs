//! Wasmtime-backed [`ComputeModule`] hosting a real compiled module.

use edgecam_bridge::{BridgeError, ComputeModule, MemGeneration, Result, TransformArgs};
use thiserror::Error;
use tracing::trace;
use wasmtime::{Caller, Config, Engine, Linker, Memory, Module, Store, TypedFunc};

use crate::abi::{
    EXPORT_ALLOC, EXPORT_DEALLOC, EXPORT_DETECT, EXPORT_MEMORY, EXPORT_SCRATCH_PTR,
    IMPORT_MODULE, IMPORT_SIGNAL_FAILURE,
};

/// Errors raised while compiling and instantiating a module, before any
/// bridge call runs.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("failed to set up wasm engine: {0}")]
    Engine(String),

    #[error("failed to compile module: {0}")]
    Compile(String),

    #[error("failed to instantiate module: {0}")]
    Instantiate(String),

    #[error("module does not export `{0}` with the expected signature")]
    MissingExport(&'static str),
}

#[derive(Default)]
struct HostState {
    /// Message captured by the `signal_failure` hook before it traps.
    failure: Option<String>,
}

/// A compute module instance running under Wasmtime.
///
/// Tracks the memory-resize epoch by re-reading the exported memory's size
/// after every call that can grow it; the bridge's view cache keys off that
/// generation.
pub struct WasmtimeModule {
    store: Store<HostState>,
    memory: Memory,
    alloc: TypedFunc<i32, i32>,
    dealloc: TypedFunc<(i32, i32), ()>,
    scratch_ptr: TypedFunc<(), i32>,
    detect: TypedFunc<(i32, i32, i32, i32, i32, i32, i32), ()>,
    generation: MemGeneration,
    observed_len: usize,
}

impl std::fmt::Debug for WasmtimeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmtimeModule")
            .field("generation", &self.generation)
            .field("observed_len", &self.observed_len)
            .finish_non_exhaustive()
    }
}

impl WasmtimeModule {
    /// Compile and instantiate a module from its binary encoding.
    pub fn from_binary(wasm: &[u8]) -> std::result::Result<Self, InstantiateError> {
        let engine = Engine::new(&Config::new())
            .map_err(|err| InstantiateError::Engine(err.to_string()))?;
        let module = Module::new(&engine, wasm)
            .map_err(|err| InstantiateError::Compile(err.to_string()))?;
        let mut store = Store::new(&engine, HostState::default());

        let mut linker: Linker<HostState> = Linker::new(&engine);
        linker
            .func_wrap(
                IMPORT_MODULE,
                IMPORT_SIGNAL_FAILURE,
                |mut caller: Caller<'_, HostState>,
                 ptr: i32,
                 len: i32|
                 -> std::result::Result<(), wasmtime::Error> {
                    let message = decode_failure_message(&mut caller, ptr, len);
                    caller.data_mut().failure = Some(message);
                    Err(wasmtime::Error::msg("module signaled failure"))
                },
            )
            .map_err(|err| InstantiateError::Instantiate(err.to_string()))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|err| InstantiateError::Instantiate(err.to_string()))?;

        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or(InstantiateError::MissingExport(EXPORT_MEMORY))?;
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, EXPORT_ALLOC)
            .map_err(|_| InstantiateError::MissingExport(EXPORT_ALLOC))?;
        let dealloc = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, EXPORT_DEALLOC)
            .map_err(|_| InstantiateError::MissingExport(EXPORT_DEALLOC))?;
        let scratch_ptr = instance
            .get_typed_func::<(), i32>(&mut store, EXPORT_SCRATCH_PTR)
            .map_err(|_| InstantiateError::MissingExport(EXPORT_SCRATCH_PTR))?;
        let detect = instance
            .get_typed_func::<(i32, i32, i32, i32, i32, i32, i32), ()>(&mut store, EXPORT_DETECT)
            .map_err(|_| InstantiateError::MissingExport(EXPORT_DETECT))?;

        let observed_len = memory.data_size(&store);
        Ok(Self {
            store,
            memory,
            alloc,
            dealloc,
            scratch_ptr,
            detect,
            generation: MemGeneration::default(),
            observed_len,
        })
    }

    /// Bump the generation if a call left the memory at a new size.
    fn refresh_generation(&mut self) {
        let len = self.memory.data_size(&self.store);
        if len != self.observed_len {
            self.observed_len = len;
            self.generation = self.generation.next();
            trace!(
                len,
                generation = self.generation.get(),
                "module memory grew"
            );
        }
    }

    /// Surface a trapped call as a single well-defined failure: the decoded
    /// message if the module signaled one, the raw trap otherwise.
    fn translate_trap(&mut self, err: wasmtime::Error) -> BridgeError {
        match self.store.data_mut().failure.take() {
            Some(message) => BridgeError::ModuleFailure(message),
            None => BridgeError::ModuleTrap(err.to_string()),
        }
    }
}

fn decode_failure_message(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> String {
    let Some(memory) = caller
        .get_export(EXPORT_MEMORY)
        .and_then(|export| export.into_memory())
    else {
        return "module signaled failure (no exported memory)".to_string();
    };
    let data = memory.data(&caller);
    let start = ptr as usize;
    let Some(end) = start.checked_add(len as usize).filter(|end| *end <= data.len()) else {
        return "module signaled failure (message out of bounds)".to_string();
    };
    String::from_utf8_lossy(&data[start..end]).into_owned()
}

impl ComputeModule for WasmtimeModule {
    fn alloc(&mut self, len: u32) -> Result<u32> {
        let ret = self.alloc.call(&mut self.store, len as i32);
        self.refresh_generation();
        match ret {
            Ok(addr) => Ok(addr as u32),
            Err(err) => {
                let reason = match self.translate_trap(err) {
                    BridgeError::ModuleFailure(msg) => msg,
                    other => other.to_string(),
                };
                Err(BridgeError::AllocationFailed {
                    len: len as usize,
                    reason,
                })
            }
        }
    }

    fn dealloc(&mut self, ptr: u32, len: u32) -> Result<()> {
        let ret = self.dealloc.call(&mut self.store, (ptr as i32, len as i32));
        ret.map_err(|err| self.translate_trap(err))
    }

    fn scratch_ptr(&mut self) -> Result<u32> {
        match self.scratch_ptr.call(&mut self.store, ()) {
            Ok(addr) => Ok(addr as u32),
            Err(err) => Err(self.translate_trap(err)),
        }
    }

    fn transform(&mut self, args: TransformArgs) -> Result<()> {
        let ret = self.detect.call(
            &mut self.store,
            (
                args.scratch as i32,
                args.in_ptr as i32,
                args.in_len as i32,
                args.width as i32,
                args.height as i32,
                args.color_key as i32,
                i32::from(args.highlight_only),
            ),
        );
        self.refresh_generation();
        ret.map_err(|err| self.translate_trap(err))
    }

    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }

    fn memory_generation(&self) -> MemGeneration {
        self.generation
    }
}
