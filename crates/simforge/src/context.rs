//! The compilation context threaded through every stage of one run.
//!
//! A [`Compilation`] owns the semantic model, the resolved modules and the
//! warning sink. Nothing survives between runs: two compilations in one
//! process share no registries, priorities or entity tables.

use simforge_codegen::{GenOptions, generate};
use simforge_model::{CompileResult, Diagnostics, Module, SpecModel};
use simforge_resolve::{ModuleSource, resolve_modules};
use simforge_spec::{apply_render_sync, parse_render_sync, parse_spec};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Result of a successful compilation.
#[derive(Debug)]
pub struct Compiled {
    /// The generated translation unit.
    pub source: String,
    pub model: SpecModel,
    pub modules: BTreeMap<String, Module>,
    pub diagnostics: Diagnostics,
}

/// State of one compilation, advanced stage by stage.
#[derive(Debug)]
pub struct Compilation {
    model: SpecModel,
    modules: BTreeMap<String, Module>,
    diagnostics: Diagnostics,
}

impl Compilation {
    /// Parse a world spec and start a compilation from it.
    pub fn from_spec(source: &str) -> CompileResult<Self> {
        let mut diagnostics = Diagnostics::new();
        let model = parse_spec(source, &mut diagnostics)?;
        info!(
            entities = model.entities.len(),
            systems = model.referenced_systems().len(),
            "spec parsed"
        );
        Ok(Self {
            model,
            modules: BTreeMap::new(),
            diagnostics,
        })
    }

    /// Validate a render-sync file and attach it to the model.
    ///
    /// Global LOOP systems the file suppresses are removed from the schedule,
    /// so this must run before [`Compilation::resolve`].
    pub fn attach_render_sync(&mut self, source: &str) -> CompileResult<()> {
        let sync = parse_render_sync(source, &self.model, &mut self.diagnostics)?;
        debug!(entity = %sync.entity, component = %sync.component, "render sync attached");
        apply_render_sync(&mut self.model, sync);
        Ok(())
    }

    /// Load and resolve the module of every scheduled system.
    pub fn resolve(&mut self, source: &dyn ModuleSource) -> CompileResult<()> {
        self.modules = resolve_modules(&self.model, source, &mut self.diagnostics)?;
        info!(modules = self.modules.len(), "modules resolved");
        Ok(())
    }

    /// Generate the translation unit and finish the compilation.
    pub fn generate(mut self, options: &GenOptions) -> CompileResult<Compiled> {
        let source = generate(&self.model, &self.modules, options, &mut self.diagnostics)?;
        info!(
            bytes = source.len(),
            warnings = self.diagnostics.len(),
            "translation unit generated"
        );
        Ok(Compiled {
            source,
            model: self.model,
            modules: self.modules,
            diagnostics: self.diagnostics,
        })
    }

    /// Merge warnings raised outside the pipeline stages.
    pub fn record(&mut self, warnings: Diagnostics) {
        self.diagnostics.extend(warnings);
    }

    pub fn model(&self) -> &SpecModel {
        &self.model
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

/// Run the whole pipeline over in-memory inputs.
///
/// # Parameters
/// - `spec`: world spec text
/// - `render_sync`: optional `.gspec` text
/// - `modules`: where system modules are loaded from
/// - `options`: include layout of the generated file
///
/// # Errors
/// The first fatal diagnostic of any stage.
pub fn compile(
    spec: &str,
    render_sync: Option<&str>,
    modules: &dyn ModuleSource,
    options: &GenOptions,
) -> CompileResult<Compiled> {
    let mut compilation = Compilation::from_spec(spec)?;
    if let Some(gspec) = render_sync {
        compilation.attach_render_sync(gspec)?;
    }
    compilation.resolve(modules)?;
    compilation.generate(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simforge_model::ErrorKind;
    use simforge_resolve::MemoryModules;

    const SPEC: &str = "\
UNIQUE World:
@@score int = 1

GENERIC Star count=16:
@@x float
LOOP
Drift

LOOP:
Tally
";

    fn modules() -> MemoryModules {
        MemoryModules::new()
            .with("Drift", "// REQ: Star.x\n")
            .with("Tally", "// REQ: World.score\n")
    }

    #[test]
    fn test_compile_in_memory() {
        let compiled = compile(SPEC, None, &modules(), &GenOptions::default()).unwrap();
        assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
        assert!(compiled.source.contains("system_Drift(&w.star.x[i_Star]);"));
        assert!(compiled.source.contains("system_Tally(&w.world.score);"));
        assert_eq!(compiled.modules.len(), 2);
        assert!(compiled.model.entity("Star").is_some());
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let modules = MemoryModules::new().with("Drift", "");
        let err = compile(SPEC, None, &modules, &GenOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingModule);
    }

    #[test]
    fn test_compilations_share_no_state() {
        let first = compile(SPEC, None, &modules(), &GenOptions::default()).unwrap();
        let other = "UNIQUE World:\n@@level int\n";
        let second = compile(other, None, &MemoryModules::new(), &GenOptions::default()).unwrap();
        assert!(first.source.contains("Star_Data"));
        assert!(!second.source.contains("Star_Data"));
        assert!(!second.source.contains("score"));
    }

    #[test]
    fn test_warnings_survive_into_result() {
        let spec = "CONFIG COLOUR blue\nUNIQUE World:\n";
        let compiled = compile(spec, None, &MemoryModules::new(), &GenOptions::default()).unwrap();
        assert!(!compiled.diagnostics.is_empty());
    }
}
