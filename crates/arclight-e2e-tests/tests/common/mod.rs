//! Shared helpers for the end-to-end tests.

use arclight_ast::{Module, Stage};
use arclight_backend_core::{BackendOptions, ShaderBackend, ShaderOutput};
use arclight_preprocess::OptionTable;

/// Loads a demo shader by name (without extension).
#[allow(dead_code)]
pub fn load_demo(name: &str) -> String {
    let path = format!("{}/../../demos/{name}.atsl", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"))
}

/// Runs the full front half of the pipeline: parse, preprocess,
/// extract the requested stage.
#[allow(dead_code)]
pub fn specialize(source: &str, stage: Stage, options: &OptionTable) -> Module {
    let module = arclight_parser::parse(source).expect("ATSL parse failed");
    let module = arclight_preprocess::process(&module, options).expect("preprocess failed");
    arclight_reflect::extract_stage(&module, stage).expect("stage extraction failed")
}

/// Full pipeline through a backend.
#[allow(dead_code)]
pub fn compile(
    source: &str,
    stage: Stage,
    options: &OptionTable,
    backend: &dyn ShaderBackend,
) -> ShaderOutput {
    let module = specialize(source, stage, options);
    backend
        .compile(&module, stage, &BackendOptions::default())
        .expect("backend compilation failed")
}

/// Extracts text output or panics.
#[allow(dead_code)]
pub fn text(output: &ShaderOutput) -> &str {
    output.as_text().expect("expected text output")
}

/// Extracts binary output as words or panics.
#[allow(dead_code)]
pub fn words(output: &ShaderOutput) -> Vec<u32> {
    output
        .as_binary()
        .expect("expected binary output")
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
