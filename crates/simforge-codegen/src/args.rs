//! Call-site arguments and the indexing discipline.
//!
//! A system scheduled in `(E, phase)` runs inside a loop over `E`'s live
//! instances. Only requirements on `E` itself may use `E`'s loop variable;
//! every other GENERIC entity is passed as its whole storage record (when
//! the module asked for it) or as the base of its array, never offset.

use simforge_model::{
    CompileError, CompileResult, Entity, ErrorKind, Module, Requirement, SpecModel, Span,
};

/// Where a call site sits.
#[derive(Debug, Clone, Copy)]
pub enum CallSite<'a> {
    /// Directly in a global phase.
    Global,
    /// Inside a phase of `entity`; GENERIC entities iterate with their loop
    /// variable.
    Entity(&'a Entity),
}

impl CallSite<'_> {
    /// Loop variable of the owning GENERIC entity, if any.
    fn owner_index(&self) -> Option<(&str, String)> {
        match self {
            CallSite::Entity(entity) if entity.kind.is_generic() => {
                Some((entity.name.as_str(), entity.loop_var()))
            }
            _ => None,
        }
    }
}

/// Arguments for one call of `module` at `site`.
pub fn call_args(model: &SpecModel, module: &Module, site: CallSite<'_>) -> CompileResult<Vec<String>> {
    if module.takes_world() {
        return Ok(vec!["&w".to_string()]);
    }

    let owner = site.owner_index();
    let mut args = Vec::with_capacity(module.requirements.len() + module.struct_requirements.len());
    for req in &module.requirements {
        args.push(requirement_arg(model, module, req, owner.as_ref())?);
    }
    for req in &module.struct_requirements {
        let entity = entity_of(model, module, &req.entity)?;
        args.push(format!("&w.{}", entity.storage_name()));
    }
    Ok(args)
}

fn requirement_arg(
    model: &SpecModel,
    module: &Module,
    req: &Requirement,
    owner: Option<&(&str, String)>,
) -> CompileResult<String> {
    let entity = entity_of(model, module, &req.entity)?;
    let storage = entity.storage_name();

    if req.is_scalar_slot() || !entity.kind.is_generic() {
        return Ok(format!("&w.{}.{}", storage, req.property));
    }
    match owner {
        Some((name, index)) if *name == req.entity => {
            Ok(format!("&w.{}.{}[{}]", storage, req.property, index))
        }
        _ if module.has_struct_for(&req.entity) => Ok(format!("&w.{}", storage)),
        _ => Ok(format!("&w.{}.{}[0]", storage, req.property)),
    }
}

fn entity_of<'m>(model: &'m SpecModel, module: &Module, name: &str) -> CompileResult<&'m Entity> {
    model.entity(name).ok_or_else(|| {
        CompileError::new(
            ErrorKind::Internal,
            Span::NONE,
            format!(
                "module '{}' requires unknown entity '{}' after resolution",
                module.name, name
            ),
        )
        .with_file(&module.path)
    })
}

/// Name of the function a call site invokes.
pub fn callee(module: &Module) -> String {
    if module.is_parallel() {
        format!("system_{}_dispatch", module.name)
    } else {
        format!("system_{}", module.name)
    }
}

/// Complete call statement for `module` at `site`.
pub fn call_statement(model: &SpecModel, module: &Module, site: CallSite<'_>) -> CompileResult<String> {
    let args = if module.is_parallel() {
        vec!["&w".to_string()]
    } else {
        call_args(model, module, site)?
    };
    Ok(format!("{}({});", callee(module), args.join(", ")))
}
