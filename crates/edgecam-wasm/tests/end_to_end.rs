#![cfg(not(target_arch = "wasm32"))]

use edgecam_bridge::{BridgeError, ComputeModule, EdgeBridge, Frame};
use edgecam_wasm::refmod::{self, RefModuleOptions, INVALID_DIMS_MSG};
use edgecam_wasm::{InstantiateError, WasmtimeModule};

const COLOR_KEY: u32 = 0xFF9E24FF;

fn bridge() -> EdgeBridge<WasmtimeModule> {
    let module = WasmtimeModule::from_binary(&refmod::build()).expect("instantiate refmod");
    EdgeBridge::new(module)
}

#[test]
fn detect_round_trips_a_frame() {
    let mut bridge = bridge();
    let frame = Frame::from_rgba(2, 2, vec![0; 16]).unwrap();

    let out = bridge.detect(&frame, COLOR_KEY, false).unwrap();
    assert_eq!(out.len(), 16);
    // The reference transform stamps the packed RGBA key over pixel 0.
    assert_eq!(&out[..4], &[0xFF, 0x9E, 0x24, 0xFF]);
    assert!(out[4..].iter().all(|b| *b == 0));
    assert_eq!(bridge.outstanding_allocations(), 0);
}

#[test]
fn highlight_only_preserves_input_bytes() {
    let mut bridge = bridge();
    let pixels: Vec<u8> = (0u8..64).collect();
    let frame = Frame::from_rgba(4, 4, pixels.clone()).unwrap();

    let out = bridge.detect(&frame, COLOR_KEY, true).unwrap();
    assert_eq!(out, pixels);
}

#[test]
fn invalid_dimensions_surface_the_module_message() {
    let mut bridge = bridge();
    // Lie about the dimensions: 16 bytes cannot be a 3x3 frame, and the
    // module checks before allocating a result.
    let frame = Frame::from_rgba(2, 2, vec![0; 16]).unwrap();
    let module = bridge.module_mut();
    let err = module
        .transform(edgecam_bridge::TransformArgs {
            scratch: refmod::DEFAULT_SCRATCH_ADDR,
            in_ptr: 0,
            in_len: frame.len() as u32,
            width: 3,
            height: 3,
            color_key: COLOR_KEY,
            highlight_only: false,
        })
        .unwrap_err();
    match err {
        BridgeError::ModuleFailure(msg) => assert_eq!(msg, INVALID_DIMS_MSG),
        other => panic!("expected ModuleFailure, got {other:?}"),
    }
}

#[test]
fn large_frames_force_growth_and_still_round_trip() {
    // One initial page; a 256x256 RGBA frame needs four pages for the input
    // alone, so both write-in and the module-side result allocation grow
    // memory mid-call.
    let module = WasmtimeModule::from_binary(&refmod::build_with_options(RefModuleOptions {
        initial_pages: 1,
        ..RefModuleOptions::default()
    }))
    .unwrap();
    let mut bridge = EdgeBridge::new(module);

    let gen_before = bridge.module().memory_generation();
    let pixels: Vec<u8> = (0..256 * 256 * 4).map(|i| i as u8).collect();
    let frame = Frame::from_rgba(256, 256, pixels.clone()).unwrap();

    let out = bridge.detect(&frame, COLOR_KEY, true).unwrap();
    assert_eq!(out, pixels);
    assert!(bridge.module().memory_generation() > gen_before);
    assert_eq!(bridge.outstanding_allocations(), 0);
}

#[test]
fn sequential_calls_return_per_call_lengths() {
    let mut bridge = bridge();
    let small = Frame::black(2, 2);
    let large = Frame::black(8, 8);

    assert_eq!(bridge.detect(&small, COLOR_KEY, true).unwrap().len(), 16);
    assert_eq!(bridge.detect(&large, COLOR_KEY, true).unwrap().len(), 256);
    assert_eq!(bridge.detect(&small, COLOR_KEY, true).unwrap().len(), 16);
}

#[test]
fn result_is_independent_of_later_growth() {
    let mut bridge = bridge();
    let frame = Frame::from_rgba(2, 2, (0u8..16).collect()).unwrap();
    let out = bridge.detect(&frame, COLOR_KEY, true).unwrap();
    let snapshot = out.clone();

    // Grow by several pages, then scribble over the module memory.
    let module = bridge.module_mut();
    module.alloc(512 * 1024).unwrap();
    module.memory_mut().fill(0xCD);

    assert_eq!(out, snapshot);
}

#[test]
fn modules_missing_exports_are_rejected() {
    let empty = wasm_encoder::Module::new().finish();
    let err = WasmtimeModule::from_binary(&empty).unwrap_err();
    assert!(matches!(
        err,
        InstantiateError::MissingExport(name) if name == "memory"
    ));
}

#[test]
fn garbage_binaries_fail_to_compile() {
    let err = WasmtimeModule::from_binary(b"not wasm").unwrap_err();
    assert!(matches!(err, InstantiateError::Compile(_)));
}
