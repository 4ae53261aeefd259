use edgecam_wasm::refmod::{self, RefModuleOptions};

#[test]
fn default_module_validates() {
    let wasm = refmod::build();
    wasmparser::validate(&wasm).expect("reference module must be valid wasm");
}

#[test]
fn custom_options_validate() {
    let wasm = refmod::build_with_options(RefModuleOptions {
        initial_pages: 4,
        scratch_addr: 32,
        heap_base: 8192,
    });
    wasmparser::validate(&wasm).expect("reference module must be valid wasm");
}

#[test]
#[should_panic(expected = "4-aligned")]
fn misaligned_scratch_is_rejected_at_build_time() {
    refmod::build_with_options(RefModuleOptions {
        scratch_addr: 18,
        ..RefModuleOptions::default()
    });
}
