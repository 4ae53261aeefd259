//! Instrumented in-process compute module used by the bridge tests.

// Not every test binary exercises every knob.
#![allow(dead_code)]

use std::collections::HashSet;

use edgecam_bridge::{BridgeError, ComputeModule, MemGeneration, Result, TransformArgs};

pub const PAGE: usize = 65_536;
pub const SCRATCH_ADDR: u32 = 16;
const HEAP_BASE: u32 = 64;

/// A bump-allocating module double backed by a plain `Vec<u8>`.
///
/// Growth doubles the backing buffer (bumping the generation), every
/// alloc/dealloc pair is counted, and the live-range set panics on a double
/// free or a free of an unknown range, which is exactly the discipline the
/// bridge promises never to violate.
pub struct MockModule {
    memory: Vec<u8>,
    generation: MemGeneration,
    heap_top: u32,
    pub alloc_calls: usize,
    pub dealloc_calls: usize,
    pub scratch_calls: usize,
    /// Address reported by `scratch_ptr`; tests override it to exercise the
    /// alignment check.
    pub scratch_addr: u32,
    pub live: HashSet<(u32, u32)>,
    /// Fail the next transform call with this message.
    pub fail_next_transform: Option<String>,
    /// Report a result of this length instead of the input length.
    pub result_len_override: Option<u32>,
    /// Refuse allocations of at least this many bytes.
    pub fail_alloc_at: Option<u32>,
}

impl MockModule {
    pub fn new() -> Self {
        Self {
            memory: vec![0; PAGE],
            generation: MemGeneration::default(),
            heap_top: HEAP_BASE,
            alloc_calls: 0,
            dealloc_calls: 0,
            scratch_calls: 0,
            scratch_addr: SCRATCH_ADDR,
            live: HashSet::new(),
            fail_next_transform: None,
            result_len_override: None,
            fail_alloc_at: None,
        }
    }

    pub fn release_pairs_balanced(&self) -> bool {
        self.alloc_calls == self.dealloc_calls && self.live.is_empty()
    }

    fn grow_to(&mut self, end: usize) {
        if end > self.memory.len() {
            let mut len = self.memory.len();
            while len < end {
                len *= 2;
            }
            self.memory.resize(len, 0);
            self.generation = self.generation.next();
        }
    }

    fn bump(&mut self, len: u32) -> u32 {
        let addr = (self.heap_top + 3) & !3;
        self.heap_top = addr + len;
        self.grow_to(self.heap_top as usize);
        addr
    }

    fn store_u32(&mut self, addr: u32, value: u32) {
        let addr = addr as usize;
        self.memory[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl ComputeModule for MockModule {
    fn alloc(&mut self, len: u32) -> Result<u32> {
        self.alloc_calls += 1;
        if let Some(limit) = self.fail_alloc_at {
            if len >= limit {
                return Err(BridgeError::AllocationFailed {
                    len: len as usize,
                    reason: "mock heap exhausted".into(),
                });
            }
        }
        let addr = self.bump(len);
        assert!(self.live.insert((addr, len)), "allocator returned a live range");
        Ok(addr)
    }

    fn dealloc(&mut self, ptr: u32, len: u32) -> Result<()> {
        self.dealloc_calls += 1;
        assert!(
            self.live.remove(&(ptr, len)),
            "double free or unknown allocation ({ptr:#x}, {len})"
        );
        Ok(())
    }

    fn scratch_ptr(&mut self) -> Result<u32> {
        self.scratch_calls += 1;
        Ok(self.scratch_addr)
    }

    fn transform(&mut self, args: TransformArgs) -> Result<()> {
        if let Some(msg) = self.fail_next_transform.take() {
            return Err(BridgeError::ModuleFailure(msg));
        }
        let expected = u64::from(args.width) * u64::from(args.height) * 4;
        if u64::from(args.in_len) != expected {
            return Err(BridgeError::ModuleFailure(
                "input length does not match frame dimensions".into(),
            ));
        }

        let out_len = self.result_len_override.unwrap_or(args.in_len);
        let out = self.alloc(out_len)?;
        let copy = args.in_len.min(out_len) as usize;
        self.memory.copy_within(
            args.in_ptr as usize..args.in_ptr as usize + copy,
            out as usize,
        );
        // Stamp the color key over the first pixel (big-endian, packed RGBA)
        // unless the caller asked for edges only.
        if !args.highlight_only && out_len >= 4 {
            let addr = out as usize;
            self.memory[addr..addr + 4].copy_from_slice(&args.color_key.to_be_bytes());
        }

        self.store_u32(args.scratch, out);
        self.store_u32(args.scratch + 4, out_len);
        Ok(())
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn memory_generation(&self) -> MemGeneration {
        self.generation
    }
}
