//! Generates a small reference compute module implementing the export
//! surface in [`crate::abi`].
//!
//! The module is not an edge detector: its transform is an identity copy
//! plus a color-key stamp over the first pixel, which is enough for the
//! bridge and its tests to observe parameter plumbing, allocation lifecycle,
//! and memory growth without reproducing any pixel math. Allocation is a
//! 4-aligned bump allocator that grows memory on demand and never reuses
//! freed ranges, so `dealloc` is a no-op.

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::abi::{
    EXPORT_ALLOC, EXPORT_DEALLOC, EXPORT_DETECT, EXPORT_MEMORY, EXPORT_SCRATCH_PTR,
    IMPORT_MODULE, IMPORT_SIGNAL_FAILURE, SCRATCH_RECORD_BYTES,
};

/// Message reported through the failure hook when the input length does not
/// match `width * height * 4`.
pub const INVALID_DIMS_MSG: &str = "input length does not match frame dimensions";

/// Scratch slot address used by default.
pub const DEFAULT_SCRATCH_ADDR: u32 = 16;

/// Where the static failure message lives in module memory.
const MSG_ADDR: u32 = 1024;

#[derive(Debug, Clone, Copy)]
pub struct RefModuleOptions {
    /// Initial linear-memory size, in 64KiB pages. Small values force the
    /// allocator to grow memory under realistic frame sizes.
    pub initial_pages: u32,
    /// 4-aligned address of the scratch return record.
    pub scratch_addr: u32,
    /// First address handed out by the bump allocator.
    pub heap_base: u32,
}

impl Default for RefModuleOptions {
    fn default() -> Self {
        Self {
            initial_pages: 1,
            scratch_addr: DEFAULT_SCRATCH_ADDR,
            heap_base: 4096,
        }
    }
}

impl RefModuleOptions {
    fn validate(self) {
        assert!(self.initial_pages >= 1, "module needs at least one page");
        assert_eq!(self.scratch_addr % 4, 0, "scratch record must be 4-aligned");
        assert!(
            self.scratch_addr + SCRATCH_RECORD_BYTES <= MSG_ADDR,
            "scratch record (at {:#x}) overlaps the message segment",
            self.scratch_addr
        );
        assert!(
            self.heap_base as usize >= MSG_ADDR as usize + INVALID_DIMS_MSG.len(),
            "heap base ({:#x}) overlaps the message segment",
            self.heap_base
        );
    }
}

/// Build the reference module with default options.
#[must_use]
pub fn build() -> Vec<u8> {
    build_with_options(RefModuleOptions::default())
}

// Function index space: the lone import comes first.
const FN_SIGNAL_FAILURE: u32 = 0;
const FN_ALLOC: u32 = 1;
const FN_DEALLOC: u32 = 2;
const FN_SCRATCH_PTR: u32 = 3;
const FN_DETECT: u32 = 4;

const G_HEAP_TOP: u32 = 0;

#[must_use]
pub fn build_with_options(options: RefModuleOptions) -> Vec<u8> {
    options.validate();

    let mut module = Module::new();

    let mut types = TypeSection::new();
    let ty_signal = types.len();
    types.ty().function([ValType::I32, ValType::I32], []);
    let ty_alloc = types.len();
    types.ty().function([ValType::I32], [ValType::I32]);
    let ty_dealloc = types.len();
    types.ty().function([ValType::I32, ValType::I32], []);
    let ty_scratch = types.len();
    types.ty().function([], [ValType::I32]);
    let ty_detect = types.len();
    types.ty().function(
        [
            ValType::I32, // scratch
            ValType::I32, // in_ptr
            ValType::I32, // in_len
            ValType::I32, // width
            ValType::I32, // height
            ValType::I32, // color_key
            ValType::I32, // highlight_only
        ],
        [],
    );
    module.section(&types);

    let mut imports = ImportSection::new();
    imports.import(
        IMPORT_MODULE,
        IMPORT_SIGNAL_FAILURE,
        EntityType::Function(ty_signal),
    );
    module.section(&imports);

    let mut funcs = FunctionSection::new();
    funcs.function(ty_alloc);
    funcs.function(ty_dealloc);
    funcs.function(ty_scratch);
    funcs.function(ty_detect);
    module.section(&funcs);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: u64::from(options.initial_pages),
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    let mut globals = GlobalSection::new();
    globals.global(
        GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        },
        &ConstExpr::i32_const(options.heap_base as i32),
    );
    module.section(&globals);

    let mut exports = ExportSection::new();
    exports.export(EXPORT_MEMORY, ExportKind::Memory, 0);
    exports.export(EXPORT_ALLOC, ExportKind::Func, FN_ALLOC);
    exports.export(EXPORT_DEALLOC, ExportKind::Func, FN_DEALLOC);
    exports.export(EXPORT_SCRATCH_PTR, ExportKind::Func, FN_SCRATCH_PTR);
    exports.export(EXPORT_DETECT, ExportKind::Func, FN_DETECT);
    module.section(&exports);

    let mut codes = CodeSection::new();
    codes.function(&emit_alloc());
    codes.function(&emit_dealloc());
    codes.function(&emit_scratch_ptr(options.scratch_addr));
    codes.function(&emit_detect());
    module.section(&codes);

    let mut data = DataSection::new();
    data.active(
        0,
        &ConstExpr::i32_const(MSG_ADDR as i32),
        INVALID_DIMS_MSG.bytes(),
    );
    module.section(&data);

    module.finish()
}

fn memarg(offset: u64, align: u32) -> MemArg {
    MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

/// `alloc(len) -> addr`: 4-aligned bump allocation; grows memory when the
/// new heap top passes the current size, trapping if the grow is refused.
fn emit_alloc() -> Function {
    // param 0: len; locals: 1 = addr, 2 = cur_bytes
    let mut f = Function::new([(2, ValType::I32)]);
    let (len, addr, cur_bytes) = (0, 1, 2);

    // addr = (heap_top + 3) & !3
    f.instruction(&Instruction::GlobalGet(G_HEAP_TOP));
    f.instruction(&Instruction::I32Const(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(-4));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::LocalSet(addr));

    // heap_top = addr + len
    f.instruction(&Instruction::LocalGet(addr));
    f.instruction(&Instruction::LocalGet(len));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(G_HEAP_TOP));

    // cur_bytes = memory.size * PAGE_SIZE
    f.instruction(&Instruction::MemorySize(0));
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32Shl);
    f.instruction(&Instruction::LocalSet(cur_bytes));

    // if heap_top > cur_bytes: grow by the missing page count
    f.instruction(&Instruction::GlobalGet(G_HEAP_TOP));
    f.instruction(&Instruction::LocalGet(cur_bytes));
    f.instruction(&Instruction::I32GtU);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::GlobalGet(G_HEAP_TOP));
    f.instruction(&Instruction::LocalGet(cur_bytes));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::I32Const(0xFFFF));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32ShrU);
    f.instruction(&Instruction::MemoryGrow(0));
    f.instruction(&Instruction::I32Const(-1));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::Unreachable);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::LocalGet(addr));
    f.instruction(&Instruction::End);
    f
}

/// `dealloc(ptr, len)`: a bump allocator never reuses ranges.
fn emit_dealloc() -> Function {
    let mut f = Function::new([]);
    f.instruction(&Instruction::End);
    f
}

fn emit_scratch_ptr(scratch_addr: u32) -> Function {
    let mut f = Function::new([]);
    f.instruction(&Instruction::I32Const(scratch_addr as i32));
    f.instruction(&Instruction::End);
    f
}

/// `detect(scratch, in_ptr, in_len, width, height, color_key, highlight_only)`:
/// validates `in_len == width * height * 4`, allocates a result of the same
/// length, copies the input over, stamps the packed-RGBA color key over the
/// first pixel unless `highlight_only` is set, and writes
/// `(result_addr, result_len)` into the scratch record.
fn emit_detect() -> Function {
    // params 0..=6; local 7 = out
    let mut f = Function::new([(1, ValType::I32)]);
    let (scratch, in_ptr, in_len, width, height, color_key, highlight_only, out) =
        (0, 1, 2, 3, 4, 5, 6, 7);

    // if width * height * 4 != in_len: signal_failure(msg, len)
    f.instruction(&Instruction::LocalGet(width));
    f.instruction(&Instruction::LocalGet(height));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::LocalGet(in_len));
    f.instruction(&Instruction::I32Ne);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::I32Const(MSG_ADDR as i32));
    f.instruction(&Instruction::I32Const(INVALID_DIMS_MSG.len() as i32));
    f.instruction(&Instruction::Call(FN_SIGNAL_FAILURE));
    // The host hook traps; keep the validator honest about the fall-through.
    f.instruction(&Instruction::Unreachable);
    f.instruction(&Instruction::End);

    // out = alloc(in_len)
    f.instruction(&Instruction::LocalGet(in_len));
    f.instruction(&Instruction::Call(FN_ALLOC));
    f.instruction(&Instruction::LocalSet(out));

    // memory.copy(out, in_ptr, in_len)
    f.instruction(&Instruction::LocalGet(out));
    f.instruction(&Instruction::LocalGet(in_ptr));
    f.instruction(&Instruction::LocalGet(in_len));
    f.instruction(&Instruction::MemoryCopy {
        src_mem: 0,
        dst_mem: 0,
    });

    // if !highlight_only && in_len >= 4: stamp color key, big-endian
    f.instruction(&Instruction::LocalGet(highlight_only));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(in_len));
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::If(BlockType::Empty));
    for (i, shift) in [(0u64, 24), (1, 16), (2, 8)] {
        f.instruction(&Instruction::LocalGet(out));
        f.instruction(&Instruction::LocalGet(color_key));
        f.instruction(&Instruction::I32Const(shift));
        f.instruction(&Instruction::I32ShrU);
        f.instruction(&Instruction::I32Store8(memarg(i, 0)));
    }
    f.instruction(&Instruction::LocalGet(out));
    f.instruction(&Instruction::LocalGet(color_key));
    f.instruction(&Instruction::I32Store8(memarg(3, 0)));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);

    // scratch[0] = out; scratch[1] = in_len
    f.instruction(&Instruction::LocalGet(scratch));
    f.instruction(&Instruction::LocalGet(out));
    f.instruction(&Instruction::I32Store(memarg(0, 2)));
    f.instruction(&Instruction::LocalGet(scratch));
    f.instruction(&Instruction::LocalGet(in_len));
    f.instruction(&Instruction::I32Store(memarg(4, 2)));

    f.instruction(&Instruction::End);
    f
}
