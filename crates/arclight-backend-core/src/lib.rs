#![warn(missing_docs)]
//! Backend trait and dispatch for Arclight shader emission.
//!
//! Defines the [`ShaderBackend`] trait every code generator implements,
//! the output/option types, and a [`BackendRegistry`] for target-name
//! dispatch. Buffer layout rules shared by all backends live in
//! [`layout`].

pub mod layout;
mod shader;

pub use shader::{CompiledStage, SpecializeError, UberShader};

use std::fmt::{self, Debug};

use arclight_ast::{Module, Stage};

/// Options passed to a backend during emission.
///
/// Backends receive modules that have already been preprocessed (and
/// usually stage-extracted); options here tweak the output encoding,
/// not the program's meaning.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// Overrides the `#version` directive of text backends.
    pub version: Option<u32>,
    /// Emit debug names (`OpName` and friends) in binary backends.
    pub debug_info: bool,
}

/// The output produced by a backend for one stage.
#[derive(Clone, Debug)]
pub enum ShaderOutput {
    /// Shader source text (e.g. GLSL).
    Text(String),
    /// A binary module (e.g. SPIR-V words, little-endian bytes).
    Binary(Vec<u8>),
}

impl ShaderOutput {
    /// The text content, if this is a text output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// The binary content, if this is a binary output.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Text(_) => None,
            Self::Binary(b) => Some(b),
        }
    }
}

impl fmt::Display for ShaderOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({} chars)", s.len()),
            Self::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
        }
    }
}

/// Emission failures.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The module contains a construct this target cannot express —
    /// including options still symbolic at emission time.
    #[error("unsupported by {target}: {reason}")]
    Unsupported {
        /// The backend's name.
        target: &'static str,
        /// What could not be expressed.
        reason: String,
    },
    /// A buffer layout could not be computed.
    #[error(transparent)]
    Layout(#[from] layout::LayoutError),
    /// Reflection failed while preparing the interface.
    #[error(transparent)]
    Reflection(#[from] arclight_reflect::ReflectError),
}

/// A code generator for one target language or format.
pub trait ShaderBackend: Debug + Send + Sync {
    /// Human-readable name (e.g. "GLSL").
    fn name(&self) -> &str;

    /// Target identifiers this backend answers to (for CLI dispatch).
    fn targets(&self) -> &[&str];

    /// Emits `stage`'s shader from a preprocessed module.
    fn compile(
        &self,
        module: &Module,
        stage: Stage,
        opts: &BackendOptions,
    ) -> Result<ShaderOutput, BackendError>;
}

/// Registry of available backends, keyed by target identifier.
pub struct BackendRegistry {
    backends: Vec<Box<dyn ShaderBackend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry with the built-in AST dump backend.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(AstDumpBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn ShaderBackend>) {
        self.backends.push(backend);
    }

    /// Finds the backend answering to `target`.
    pub fn find(&self, target: &str) -> Option<&dyn ShaderBackend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// All registered target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that pretty-prints the module as ATSL source.
#[derive(Debug)]
pub struct AstDumpBackend;

impl ShaderBackend for AstDumpBackend {
    fn name(&self) -> &str {
        "AST dump"
    }

    fn targets(&self) -> &[&str] {
        &["ast-dump", "ast"]
    }

    fn compile(
        &self,
        module: &Module,
        _stage: Stage,
        _opts: &BackendOptions,
    ) -> Result<ShaderOutput, BackendError> {
        Ok(ShaderOutput::Text(arclight_ast::write_module(module)))
    }
}
