//! Shader library registry and include resolution.
//!
//! The registry maps library names to pre-parsed modules. It is an
//! explicit object handed to whoever resolves includes — there is no
//! process-wide singleton. The interior lock provides mutual exclusion
//! during registration; the intended lifecycle is populate-at-startup,
//! read-concurrently thereafter.

use std::collections::HashSet;
use std::sync::RwLock;

use arclight_ast::{rewrite, Module, Statement};

use crate::ParseError;

/// Named, pre-parsed ATSL fragments available to `include <name>;`.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    libraries: RwLock<std::collections::HashMap<String, Module>>,
}

impl LibraryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a library under `name`.
    pub fn register(&self, name: impl Into<String>, module: Module) {
        self.libraries
            .write()
            .expect("library registry lock poisoned")
            .insert(name.into(), module);
    }

    /// Returns a clone of the library, if registered.
    pub fn get(&self, name: &str) -> Option<Module> {
        self.libraries
            .read()
            .expect("library registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Registered library names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .libraries
            .read()
            .expect("library registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Splices every `include <name>;` with the named library's root
/// declarations, in place, preserving declaration order. Libraries may
/// include other libraries; cycles are an error.
pub fn resolve_includes(
    module: &Module,
    registry: &LibraryRegistry,
) -> Result<Module, ParseError> {
    let mut visiting = HashSet::new();
    let mut out = Module::new();
    splice(module, registry, &mut out, &mut visiting)?;
    Ok(out)
}

fn splice(
    module: &Module,
    registry: &LibraryRegistry,
    out: &mut Module,
    visiting: &mut HashSet<String>,
) -> Result<(), ParseError> {
    for stmt in &module.root {
        match stmt {
            Statement::Include { library } => {
                if !visiting.insert(library.clone()) {
                    return Err(ParseError::IncludeCycle {
                        name: library.clone(),
                    });
                }
                let lib = registry.get(library).ok_or_else(|| ParseError::UnknownLibrary {
                    name: library.clone(),
                })?;
                splice(&lib, registry, out, visiting)?;
                visiting.remove(library);
            }
            other => {
                let copied = rewrite::copy_statement(module, out, other);
                out.root.push(copied);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn include_is_spliced_in_order() {
        let registry = LibraryRegistry::new();
        registry.register("lighting", parse("const float ambient = 0.1;").unwrap());

        let module = parse(
            "const float before = 1.0;\n\
             include <lighting>;\n\
             const float after = 2.0;",
        )
        .unwrap();
        let resolved = resolve_includes(&module, &registry).unwrap();
        let names: Vec<_> = resolved
            .root
            .iter()
            .filter_map(|s| s.declared_name())
            .collect();
        assert_eq!(names, vec!["before", "ambient", "after"]);
    }

    #[test]
    fn unknown_library_errors() {
        let registry = LibraryRegistry::new();
        let module = parse("include <missing>;").unwrap();
        match resolve_includes(&module, &registry) {
            Err(ParseError::UnknownLibrary { name }) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownLibrary, got {other:?}"),
        }
    }

    #[test]
    fn nested_includes_resolve() {
        let registry = LibraryRegistry::new();
        registry.register("inner", parse("const float deep = 3.0;").unwrap());
        registry.register(
            "outer",
            parse("include <inner>;\nconst float shallow = 2.0;").unwrap(),
        );
        let module = parse("include <outer>;").unwrap();
        let resolved = resolve_includes(&module, &registry).unwrap();
        let names: Vec<_> = resolved
            .root
            .iter()
            .filter_map(|s| s.declared_name())
            .collect();
        assert_eq!(names, vec!["deep", "shallow"]);
    }

    #[test]
    fn include_cycle_is_detected() {
        let registry = LibraryRegistry::new();
        registry.register("a", parse("include <b>;").unwrap());
        registry.register("b", parse("include <a>;").unwrap());
        let module = parse("include <a>;").unwrap();
        match resolve_includes(&module, &registry) {
            Err(ParseError::IncludeCycle { .. }) => {}
            other => panic!("expected IncludeCycle, got {other:?}"),
        }
    }

    #[test]
    fn registry_replaces_on_reregistration() {
        let registry = LibraryRegistry::new();
        registry.register("lib", parse("const float v = 1.0;").unwrap());
        registry.register("lib", parse("const float v = 2.0;").unwrap());
        assert_eq!(registry.names(), vec!["lib"]);
        let module = registry.get("lib").unwrap();
        assert_eq!(module.root.len(), 1);
    }
}
