//! Stage extraction and reflection for ATSL modules.
//!
//! [`extract_stage`] prunes a shared uber-shader module down to the
//! declarations one stage actually reaches; [`reflect`] computes the
//! stage's external interface (locations and descriptor bindings) with
//! deterministic numbering.

mod extract;
mod reflect;

pub use extract::extract_stage;
pub use reflect::{reflect, ExternalEntry, ReflectionEntry, ReflectionTable};

use arclight_ast::Stage;

/// Extraction and reflection failures.
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    #[error("no entry function declared for the {stage} stage")]
    MissingEntryPoint { stage: Stage },
    #[error("duplicate entry function `{name}` for the {stage} stage")]
    DuplicateEntryPoint { stage: Stage, name: String },
    #[error("externals `{first}` and `{second}` collide on (set {set}, binding {binding})")]
    BindingCollision {
        set: u32,
        binding: u32,
        first: String,
        second: String,
    },
    #[error("{direction}s `{first}` and `{second}` collide on location {location}")]
    LocationCollision {
        direction: &'static str,
        location: u32,
        first: String,
        second: String,
    },
}
