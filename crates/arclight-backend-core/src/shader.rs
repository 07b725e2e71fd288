//! The uber-shader compilation unit.
//!
//! An [`UberShader`] holds one parsed module representing every
//! option-driven variant of a shader. [`UberShader::specialize`]
//! derives a concrete per-stage unit: preprocess with the given option
//! values, extract the stage, reflect the interface. The base module is
//! never mutated, so specializations for different option sets can be
//! derived independently (including concurrently through a shared
//! library cache).

use arclight_ast::{Module, Stage};
use arclight_preprocess::{process, OptionTable, PreprocessError};
use arclight_reflect::{extract_stage, reflect, ReflectError, ReflectionTable};

use crate::{BackendError, BackendOptions, ShaderBackend, ShaderOutput};

/// Failures while deriving a specialization.
#[derive(Debug, thiserror::Error)]
pub enum SpecializeError {
    /// Option resolution or constant folding failed.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    /// Stage extraction or reflection failed.
    #[error(transparent)]
    Reflect(#[from] ReflectError),
}

/// A shader module covering all of its option variants.
#[derive(Clone, Debug)]
pub struct UberShader {
    module: Module,
}

impl UberShader {
    /// Wraps a parsed (and include-resolved) module.
    pub fn new(module: Module) -> Self {
        Self { module }
    }

    /// The underlying unspecialized module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Derives the compiled unit for one stage and option set.
    pub fn specialize(
        &self,
        stage: Stage,
        options: &OptionTable,
    ) -> Result<CompiledStage, SpecializeError> {
        let specialized = process(&self.module, options)?;
        let module = extract_stage(&specialized, stage)?;
        let reflection = reflect(&module, stage)?;
        Ok(CompiledStage {
            stage,
            module,
            reflection,
        })
    }
}

/// One stage's specialized module plus its reflected interface.
///
/// The reflection table is built once here and read-only afterwards.
#[derive(Clone, Debug)]
pub struct CompiledStage {
    stage: Stage,
    module: Module,
    reflection: ReflectionTable,
}

impl CompiledStage {
    /// The stage this unit was extracted for.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The specialized, stage-extracted module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The stage's external interface.
    pub fn reflection(&self) -> &ReflectionTable {
        &self.reflection
    }

    /// Emits this unit through a backend.
    pub fn emit(
        &self,
        backend: &dyn ShaderBackend,
        opts: &BackendOptions,
    ) -> Result<ShaderOutput, BackendError> {
        backend.compile(&self.module, self.stage, opts)
    }
}
