//! Reflection table construction.
//!
//! Walks a (typically stage-extracted) module's I/O and external
//! declarations and assigns binding identities. Explicit numbers are
//! never changed; missing ones are filled with the lowest unused value
//! in source declaration order, which makes the assignment a pure
//! function of the declaration list.

use arclight_ast::{Handle, Module, Stage, Statement, Type, TypeInner};

use crate::ReflectError;

/// An input or output attribute with its resolved location.
#[derive(Clone, Debug)]
pub struct ReflectionEntry {
    pub name: String,
    pub ty: Handle<Type>,
    pub location: u32,
    /// Whether the location was written in the source.
    pub explicit: bool,
}

/// An external resource with its resolved (set, binding) identity.
#[derive(Clone, Debug)]
pub struct ExternalEntry {
    pub name: String,
    pub ty: Handle<Type>,
    pub set: u32,
    pub binding: u32,
    /// Whether the binding pair was written in the source.
    pub explicit: bool,
    /// Samplers bind as combined image samplers; everything else as
    /// uniform buffer data.
    pub is_sampler: bool,
}

/// The external interface of one shader stage.
#[derive(Clone, Debug)]
pub struct ReflectionTable {
    pub stage: Stage,
    pub inputs: Vec<ReflectionEntry>,
    pub outputs: Vec<ReflectionEntry>,
    pub externals: Vec<ExternalEntry>,
}

impl ReflectionTable {
    /// Looks up an external by name.
    pub fn external(&self, name: &str) -> Option<&ExternalEntry> {
        self.externals.iter().find(|e| e.name == name)
    }

    /// Looks up an input by resolved location.
    pub fn input_at(&self, location: u32) -> Option<&ReflectionEntry> {
        self.inputs.iter().find(|e| e.location == location)
    }

    /// Looks up an output by resolved location.
    pub fn output_at(&self, location: u32) -> Option<&ReflectionEntry> {
        self.outputs.iter().find(|e| e.location == location)
    }
}

/// Builds the reflection table for `stage` from `module`.
///
/// The module is taken as-is: declarations for other stages are
/// ignored, so reflecting an unextracted module is fine.
pub fn reflect(module: &Module, stage: Stage) -> Result<ReflectionTable, ReflectError> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut externals = Vec::new();

    for stmt in &module.root {
        match stmt {
            Statement::InputDeclaration {
                stage: s,
                name,
                ty,
                location,
            } if *s == stage => inputs.push((name.clone(), *ty, *location)),
            Statement::OutputDeclaration {
                stage: s,
                name,
                ty,
                location,
            } if *s == stage => outputs.push((name.clone(), *ty, *location)),
            Statement::ExternalDeclaration {
                name,
                ty,
                set,
                binding,
            } => externals.push((name.clone(), *ty, *set, *binding)),
            _ => {}
        }
    }

    Ok(ReflectionTable {
        stage,
        inputs: assign_locations(inputs, "input")?,
        outputs: assign_locations(outputs, "output")?,
        externals: assign_bindings(module, externals)?,
    })
}

fn assign_locations(
    decls: Vec<(String, Handle<Type>, Option<u32>)>,
    direction: &'static str,
) -> Result<Vec<ReflectionEntry>, ReflectError> {
    // Explicit locations first: they are fixed and may not collide.
    let mut used: Vec<(u32, String)> = Vec::new();
    for (name, _, location) in &decls {
        if let Some(loc) = location {
            if let Some((_, first)) = used.iter().find(|(l, _)| l == loc) {
                return Err(ReflectError::LocationCollision {
                    direction,
                    location: *loc,
                    first: first.clone(),
                    second: name.clone(),
                });
            }
            used.push((*loc, name.clone()));
        }
    }

    let mut entries = Vec::with_capacity(decls.len());
    for (name, ty, location) in decls {
        let (location, explicit) = match location {
            Some(loc) => (loc, true),
            None => {
                let mut candidate = 0;
                while used.iter().any(|(l, _)| *l == candidate) {
                    candidate += 1;
                }
                used.push((candidate, name.clone()));
                (candidate, false)
            }
        };
        entries.push(ReflectionEntry {
            name,
            ty,
            location,
            explicit,
        });
    }
    Ok(entries)
}

#[allow(clippy::type_complexity)]
fn assign_bindings(
    module: &Module,
    decls: Vec<(String, Handle<Type>, Option<u32>, Option<u32>)>,
) -> Result<Vec<ExternalEntry>, ReflectError> {
    let mut used: Vec<(u32, u32, String)> = Vec::new();
    for (name, _, set, binding) in &decls {
        if let (Some(set), Some(binding)) = (set, binding) {
            if let Some((_, _, first)) = used
                .iter()
                .find(|(s, b, _)| s == set && b == binding)
            {
                return Err(ReflectError::BindingCollision {
                    set: *set,
                    binding: *binding,
                    first: first.clone(),
                    second: name.clone(),
                });
            }
            used.push((*set, *binding, name.clone()));
        }
    }

    let mut entries = Vec::with_capacity(decls.len());
    for (name, ty, set, binding) in decls {
        let (set, binding, explicit) = match (set, binding) {
            (Some(s), Some(b)) => (s, b, true),
            // Unnumbered externals land in set 0 at the lowest free
            // binding; a lone `set = N` with no binding is treated the
            // same way within that set.
            (maybe_set, _) => {
                let s = maybe_set.unwrap_or(0);
                let mut candidate = 0;
                while used.iter().any(|(us, ub, _)| *us == s && *ub == candidate) {
                    candidate += 1;
                }
                used.push((s, candidate, name.clone()));
                (s, candidate, false)
            }
        };
        let is_sampler = matches!(module.types[ty].inner, TypeInner::Sampler { .. });
        entries.push(ExternalEntry {
            name,
            ty,
            set,
            binding,
            explicit,
            is_sampler,
        });
    }
    Ok(entries)
}
