//! GLSL 450 backend.
//!
//! Emits Vulkan-flavored GLSL (`#version 450`, explicit `set`/`binding`
//! layout qualifiers) from a preprocessed, stage-extracted module. The
//! writer keeps operator precedence explicit through parenthesization
//! and maps data externals to single-member std140 uniform blocks so
//! source-level names survive unchanged.

mod writer;

use arclight_ast::{Module, Stage};
use arclight_backend_core::{BackendError, BackendOptions, ShaderBackend, ShaderOutput};

/// The GLSL source backend.
#[derive(Debug)]
pub struct GlslBackend;

impl ShaderBackend for GlslBackend {
    fn name(&self) -> &str {
        "GLSL"
    }

    fn targets(&self) -> &[&str] {
        &["glsl", "gl"]
    }

    fn compile(
        &self,
        module: &Module,
        stage: Stage,
        opts: &BackendOptions,
    ) -> Result<ShaderOutput, BackendError> {
        let source = writer::Writer::new(module, stage, opts).write()?;
        Ok(ShaderOutput::Text(source))
    }
}
