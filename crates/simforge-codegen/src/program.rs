//! Translation-unit assembly: preamble, declarations, wiring and `main`.

use crate::args::{CallSite, call_statement};
use crate::render::{sync_function, write_sync_prototypes, write_sync_routines};
use crate::storage::{write_entity_struct, write_init_world, write_world_struct};
use crate::writer::CWriter;
use simforge_model::{
    CompileError, CompileResult, Diagnostics, Entity, ErrorKind, Module, Phase, SpecModel, Span,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Default directory prefix of module includes.
pub const DEFAULT_MODULE_INCLUDE_DIR: &str = "modules";

/// Generation settings that do not come from the spec.
#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Prefix of `#include "<dir>/<module>.c"` lines.
    pub module_include_dir: String,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            module_include_dir: DEFAULT_MODULE_INCLUDE_DIR.to_string(),
        }
    }
}

/// Generate the translation unit for a resolved model.
///
/// # Parameters
/// - `model`: finalized spec model (phases sorted, SOA expanded)
/// - `modules`: one resolved module per referenced system
/// - `options`: include layout
/// - `diagnostics`: receives scheduling warnings
///
/// # Errors
/// [`ErrorKind::Internal`] if a scheduled system has no resolved module.
pub fn generate(
    model: &SpecModel,
    modules: &BTreeMap<String, Module>,
    options: &GenOptions,
    diagnostics: &mut Diagnostics,
) -> CompileResult<String> {
    for name in model.referenced_systems() {
        if !modules.contains_key(name) {
            return Err(CompileError::new(
                ErrorKind::Internal,
                Span::NONE,
                format!("system '{}' is scheduled but was never resolved", name),
            ));
        }
    }

    let generator = Generator {
        model,
        modules,
        options,
    };
    let mut w = CWriter::new();

    generator.preamble(&mut w, diagnostics);
    for entity in model.entities.values() {
        write_entity_struct(&mut w, model, entity);
        w.blank();
    }
    write_world_struct(&mut w, model);
    w.blank();

    if model.render.is_some() {
        w.line("SceneData s = {0};");
        w.line("SceneSyncState ss = {0};");
        w.blank();
    }

    generator.prototypes(&mut w);
    generator.includes(&mut w);
    if let Some(sync) = &model.render {
        write_sync_routines(&mut w, sync);
        w.blank();
    }
    generator.parallel_wrappers(&mut w);
    write_init_world(&mut w, model);
    w.blank();
    generator.main(&mut w, diagnostics)?;

    debug!(
        entities = model.entities.len(),
        modules = modules.len(),
        render = model.render.is_some(),
        "translation unit generated"
    );
    Ok(w.finish())
}

struct Generator<'a> {
    model: &'a SpecModel,
    modules: &'a BTreeMap<String, Module>,
    options: &'a GenOptions,
}

impl Generator<'_> {
    fn module(&self, name: &str) -> CompileResult<&Module> {
        self.modules.get(name).ok_or_else(|| {
            CompileError::new(
                ErrorKind::Internal,
                Span::NONE,
                format!("system '{}' has no resolved module", name),
            )
        })
    }

    fn backend(&self) -> Option<&str> {
        (!self.model.engine.is_manual_backend()).then_some(self.model.engine.backend.as_str())
    }

    fn preamble(&self, w: &mut CWriter, diagnostics: &mut Diagnostics) {
        w.line("// Generated by simforge. Do not edit.");
        for header in ["<stdint.h>", "<stdbool.h>", "<string.h>", "<math.h>"] {
            w.line(format!("#include {}", header));
        }

        if self.model.render.is_some() {
            w.blank();
            if let Some(backend) = self.backend() {
                w.line(format!("#include \"backend/backend_{}.h\"", backend));
            }
            w.line("#include \"GraphicSystem/graphics_types.h\"");
            w.line("#include \"GraphicSystem/render_protocol.h\"");
            w.line("#include \"GraphicSystem/scene_sync_state.h\"");
        }

        let libraries: BTreeSet<&str> = self
            .modules
            .values()
            .flat_map(|m| m.libraries.iter().map(String::as_str))
            .collect();
        if !libraries.is_empty() {
            w.blank();
            w.line("// Libraries required by modules");
            for library in libraries {
                w.line(library_include(library));
            }
        }

        if self.modules.values().any(Module::is_parallel) && self.model.first_generic().is_none() {
            warn!("parallel systems without any GENERIC entity");
            diagnostics.warn(
                ErrorKind::Structure,
                Span::NONE,
                "PARALLEL systems need a GENERIC entity to dispatch over; their wrappers do nothing"
                    .to_string(),
            );
        }

        w.blank();
        w.line(format!(
            "#define GENERATED_MAX_THREADS {}",
            self.model.engine.max_threads
        ));
        w.line("#include \"MultithreadSupport/parallel.h\"");
        w.blank();
    }

    fn prototypes(&self, w: &mut CWriter) {
        w.line("// Systems");
        if let Some(sync) = &self.model.render {
            write_sync_prototypes(w, sync);
        }
        for module in self.modules.values() {
            if module.is_parallel() {
                w.line(format!(
                    "void system_{}_range(World* w, int start, int end);",
                    module.name
                ));
                w.line(format!("void system_{}_dispatch(World* w);", module.name));
            }
            w.line(format!(
                "void system_{}({});",
                module.name,
                self.parameters(module).join(", ")
            ));
        }
        w.blank();
    }

    fn parameters(&self, module: &Module) -> Vec<String> {
        if module.takes_world() {
            return vec!["World* w".to_string()];
        }
        let types = &self.model.types;
        module
            .requirements
            .iter()
            .map(|req| format!("{}* {}", types.host_type(&req.data_type), req.alias))
            .chain(
                module
                    .struct_requirements
                    .iter()
                    .map(|req| format!("{}_Data* {}", req.entity, req.alias)),
            )
            .collect()
    }

    fn includes(&self, w: &mut CWriter) {
        for name in self.modules.keys() {
            w.line(format!(
                "#include \"{}/{}.c\"",
                self.options.module_include_dir.trim_end_matches('/'),
                name
            ));
        }
        if self.model.render.is_some() {
            if let Some(backend) = self.backend() {
                w.line(format!("#include \"backend/backend_{}.c\"", backend));
            }
        }
        w.blank();
    }

    fn parallel_wrappers(&self, w: &mut CWriter) {
        for module in self.modules.values().filter(|m| m.is_parallel()) {
            w.open(format!("void system_{}_dispatch(World* w)", module.name));
            match self.model.first_generic() {
                Some(entity) => w.line(format!(
                    "parallel_run(w, (SystemRangeFn)system_{}_range, w->{}._active);",
                    module.name,
                    entity.storage_name()
                )),
                None => w.line("// no GENERIC entity to dispatch over"),
            }
            w.close();
            w.blank();
        }
    }

    fn main(&self, w: &mut CWriter, diagnostics: &mut Diagnostics) -> CompileResult<()> {
        self.check_schedule(diagnostics);

        w.open("int main(void)");
        w.line("static World w;");
        w.line("init_world(&w);");
        if let Some(sync) = &self.model.render {
            let count = self
                .model
                .entity(&sync.entity)
                .and_then(Entity::capacity)
                .unwrap_or(0);
            w.line(format!("scene_init(&s, {});", count));
        }

        let globals = &self.model.globals;
        if !globals.get(Phase::PreStart).is_empty() {
            w.blank();
            w.line("// PRE_START");
            self.global_calls(w, Phase::PreStart)?;
        }

        w.blank();
        w.line("// START");
        self.global_calls(w, Phase::Start)?;
        for entity in self.model.entities.values() {
            self.entity_calls(w, entity, Phase::Start)?;
        }

        w.blank();
        w.open("while (w.running)");
        w.line("w.frame++;");
        if self.model.render.is_some() {
            w.line("scene_sync_reset(&ss);");
        }
        if !globals.get(Phase::Loop).is_empty() {
            w.blank();
            w.line("// LOOP");
            self.global_calls(w, Phase::Loop)?;
        }
        if let Some(sync) = &self.model.render {
            w.blank();
            w.line("// render sync");
            w.line(format!("{}(&w, &s, &ss);", sync_function(sync)));
            if let Some(backend) = self.backend() {
                w.line(format!(
                    "backend_{}_update_gpu(&w.world.{}, &s, &ss);",
                    backend, sync.buffer
                ));
                w.line(format!(
                    "backend_{}_draw_instanced(w.world.{}, &s);",
                    backend, sync.model
                ));
            }
        }
        for entity in self.model.entities.values() {
            self.entity_calls(w, entity, Phase::Loop)?;
        }
        if !globals.get(Phase::PostLoop).is_empty() {
            w.blank();
            w.line("// POST_LOOP");
            self.global_calls(w, Phase::PostLoop)?;
        }
        w.close();

        w.blank();
        w.line("// END");
        for entity in self.model.entities.values().rev() {
            self.entity_calls(w, entity, Phase::End)?;
        }
        self.global_calls(w, Phase::End)?;

        if self.model.render.is_some() {
            w.line("scene_free(&s);");
        }
        w.blank();
        w.line("return 0;");
        w.close();
        Ok(())
    }

    fn global_calls(&self, w: &mut CWriter, phase: Phase) -> CompileResult<()> {
        for name in self.model.globals.get(phase) {
            let module = self.module(name)?;
            w.line(call_statement(self.model, module, CallSite::Global)?);
        }
        Ok(())
    }

    fn entity_calls(&self, w: &mut CWriter, entity: &Entity, phase: Phase) -> CompileResult<()> {
        let systems = entity.phases.get(phase);
        if systems.is_empty() {
            return Ok(());
        }

        w.line(format!("// {}.{}", entity.name, phase.as_str()));
        let storage = entity.storage_name();
        let index = entity.loop_var();
        let looped = entity.kind.is_generic();
        if looped {
            w.open(format!(
                "for (int32_t {0} = 0; {0} < w.{1}._active; {0}++)",
                index, storage
            ));
        }
        for name in systems {
            let module = self.module(name)?;
            w.line(call_statement(self.model, module, CallSite::Entity(entity))?);
        }
        if looped {
            w.close();
        }
        Ok(())
    }

    /// Warn about schedules that generate but probably do not mean what
    /// they say.
    fn check_schedule(&self, diagnostics: &mut Diagnostics) {
        for entity in self.model.entities.values() {
            for phase in [Phase::PreStart, Phase::PostLoop] {
                if !entity.phases.get(phase).is_empty() {
                    warn!(entity = %entity.name, phase = phase.as_str(), "entity phase never runs");
                    diagnostics.warn(
                        ErrorKind::Structure,
                        entity.span,
                        format!(
                            "{} systems of '{}' are never called; {} only runs globally",
                            phase.as_str(),
                            entity.name,
                            phase.as_str()
                        ),
                    );
                }
            }

            if !entity.kind.is_generic() {
                continue;
            }
            for phase in [Phase::Start, Phase::Loop, Phase::End] {
                for name in entity.phases.get(phase) {
                    if self.modules.get(name).is_some_and(Module::is_parallel) {
                        warn!(entity = %entity.name, system = %name, "parallel system inside an entity loop");
                        diagnostics.warn(
                            ErrorKind::Structure,
                            entity.span,
                            format!(
                                "PARALLEL system '{}' in {}.{} is dispatched once per instance",
                                name,
                                entity.name,
                                phase.as_str()
                            ),
                        );
                    }
                }
            }
        }
    }
}

/// `#include` line for a `REQ_LIB:` name.
///
/// Names with a path separator or a dot are project headers; bare names are
/// system headers.
pub fn library_include(library: &str) -> String {
    if library.contains('/') || library.contains('.') {
        format!("#include \"{}.h\"", library)
    } else {
        format!("#include <{}.h>", library)
    }
}
