//! Requirement resolution: module markers checked against the model.

use crate::marker::{Located, Marker, scan_markers};
use crate::source::ModuleSource;
use simforge_model::{
    CompileError, CompileResult, Diagnostics, Entity, ErrorKind, Module, RESERVED_FIELD_TYPE,
    Requirement, SpecModel, Span, StructRequirement, Variable, is_reserved_field,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolve every module referenced by the model.
///
/// Modules are returned in name order. The first missing module or
/// unresolvable marker aborts resolution; the error carries the module path.
pub fn resolve_modules(
    model: &SpecModel,
    source: &dyn ModuleSource,
    diagnostics: &mut Diagnostics,
) -> CompileResult<BTreeMap<String, Module>> {
    let mut modules = BTreeMap::new();
    for name in model.referenced_systems() {
        let module = resolve_module(model, name, source, diagnostics)?;
        modules.insert(name.to_string(), module);
    }
    debug!(modules = modules.len(), "requirements resolved");
    Ok(modules)
}

/// Resolve one module by name.
pub fn resolve_module(
    model: &SpecModel,
    name: &str,
    source: &dyn ModuleSource,
    diagnostics: &mut Diagnostics,
) -> CompileResult<Module> {
    let loaded = source.load(name)?;
    let markers = scan_markers(&loaded.text).map_err(|e| e.with_file(&loaded.path))?;

    let mut module = Module {
        name: name.to_string(),
        path: loaded.path.clone(),
        requirements: Vec::new(),
        struct_requirements: Vec::new(),
        libraries: Vec::new(),
        mode: model.mode_of(name),
        has_range_entry: loaded.text.contains(&format!("system_{}_range", name)),
    };

    for Located { marker, span } in markers {
        match marker {
            Marker::Property {
                entity,
                property,
                alias,
            } => {
                let alias = alias.unwrap_or_else(|| property.clone());
                let expanded = resolve_property(model, &entity, &property, &alias, span)
                    .map_err(|e| e.with_file(&loaded.path))?;
                module.requirements.extend(expanded);
            }
            Marker::Struct { entity, alias } => {
                if model.entity(&entity).is_none() {
                    return Err(undefined_entity(&entity, span).with_file(&loaded.path));
                }
                let alias = alias.unwrap_or_else(|| format!("{}_data", entity));
                module.struct_requirements.push(StructRequirement { entity, alias });
            }
            Marker::Library(library) => {
                if !module.libraries.contains(&library) {
                    module.libraries.push(library);
                }
            }
        }
    }

    if module.is_parallel() && !module.has_range_entry {
        warn!(module = %name, "parallel module without a range entry point");
        diagnostics.push(
            CompileError::warning(
                ErrorKind::Structure,
                Span::NONE,
                format!(
                    "PARALLEL module '{}' does not define 'system_{}_range'",
                    name, name
                ),
            )
            .with_file(&loaded.path),
        );
    }

    debug!(
        module = %name,
        requirements = module.requirements.len(),
        structs = module.struct_requirements.len(),
        libraries = module.libraries.len(),
        "module resolved"
    );
    Ok(module)
}

/// Resolve `entity.property` into one requirement, or one per SOA component.
///
/// Lookup order is the shared table, then the per-instance table (both as
/// declared, before SOA expansion), then the reserved fields of a GENERIC
/// entity.
pub fn resolve_property(
    model: &SpecModel,
    entity: &str,
    property: &str,
    alias: &str,
    span: Span,
) -> CompileResult<Vec<Requirement>> {
    let Some(found) = model.entity(entity) else {
        return Err(undefined_entity(entity, span));
    };

    let (var, is_shared) = match lookup(found, property) {
        Some(hit) => hit,
        None if is_reserved_field(property) && found.kind.is_generic() => {
            return Ok(vec![Requirement {
                entity: entity.to_string(),
                property: property.to_string(),
                alias: alias.to_string(),
                data_type: RESERVED_FIELD_TYPE.to_string(),
                is_shared: false,
            }]);
        }
        None => {
            return Err(CompileError::new(
                ErrorKind::UndefinedProperty,
                span,
                format!("entity '{}' has no property '{}'", entity, property),
            ));
        }
    };

    let soa = (!var.strict).then(|| model.types.soa(&var.ty)).flatten();
    let requirements = match soa {
        Some(soa) => soa
            .components
            .iter()
            .map(|component| Requirement {
                entity: entity.to_string(),
                property: format!("{}_{}", property, component),
                alias: format!("{}_{}", alias, component),
                data_type: soa.base.clone(),
                is_shared,
            })
            .collect(),
        None => vec![Requirement {
            entity: entity.to_string(),
            property: property.to_string(),
            alias: alias.to_string(),
            data_type: var.ty.clone(),
            is_shared,
        }],
    };
    Ok(requirements)
}

fn lookup<'a>(entity: &'a Entity, property: &str) -> Option<(&'a Variable, bool)> {
    if let Some(var) = entity.shared.get(property) {
        return Some((var, true));
    }
    entity.vars.get(property).map(|var| (var, false))
}

fn undefined_entity(entity: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorKind::UndefinedEntity,
        span,
        format!("undefined entity '{}'", entity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryModules;
    use simforge_model::{EntityKind, ExecMode, Phase, SoaType, SystemConfig};
    use std::path::PathBuf;

    fn model() -> SpecModel {
        let mut model = SpecModel::new();
        model.types.add_soa(
            "Vec3",
            SoaType {
                base: "float".to_string(),
                components: vec!["x".into(), "y".into(), "z".into()],
            },
        );

        let mut world = Entity::new("World", EntityKind::Unique, Span::line(1));
        world.vars.insert(Variable::new("gravity", "float")).unwrap();
        world.phases.push(Phase::Start, "Spawn");

        let mut ball = Entity::new("Ball", EntityKind::Generic { count: 16 }, Span::line(4));
        ball.vars.insert(Variable::new("position", "Vec3")).unwrap();
        ball.vars.insert(Variable::new("bounds", "Vec3").strict()).unwrap();
        ball.shared.insert(Variable::new("restitution", "float")).unwrap();
        ball.phases.push(Phase::Loop, "Move");

        model.entities.insert("World".to_string(), world);
        model.entities.insert("Ball".to_string(), ball);
        model.globals.push(Phase::Loop, "Physics");
        model.systems.insert(
            "Physics".to_string(),
            SystemConfig {
                mode: ExecMode::Parallel,
                ..SystemConfig::default()
            },
        );
        model.expand_soa(&mut simforge_model::Diagnostics::new()).unwrap();
        model
    }

    #[test]
    fn test_soa_requirement_expands_per_component() {
        let reqs = resolve_property(&model(), "Ball", "position", "pos", Span::NONE).unwrap();
        let pairs: Vec<_> = reqs
            .iter()
            .map(|r| (r.property.as_str(), r.alias.as_str(), r.data_type.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("position_x", "pos_x", "float"),
                ("position_y", "pos_y", "float"),
                ("position_z", "pos_z", "float"),
            ]
        );
    }

    #[test]
    fn test_strict_soa_requirement_stays_whole() {
        let reqs = resolve_property(&model(), "Ball", "bounds", "b", Span::NONE).unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].data_type, "Vec3");
    }

    #[test]
    fn test_shared_and_reserved_lookup() {
        let model = model();
        let shared = resolve_property(&model, "Ball", "restitution", "r", Span::NONE).unwrap();
        assert!(shared[0].is_shared);

        let active = resolve_property(&model, "Ball", "_active", "n", Span::NONE).unwrap();
        assert_eq!(active[0].data_type, "int32");
        assert!(active[0].is_reserved());

        let error = resolve_property(&model, "World", "_capacity", "n", Span::line(3)).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedProperty);
        assert_eq!(error.span, Span::line(3));
    }

    #[test]
    fn test_expanded_component_name_is_not_a_property() {
        let error = resolve_property(&model(), "Ball", "position_x", "x", Span::NONE).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedProperty);
    }

    #[test]
    fn test_resolve_modules_in_name_order() {
        let source = MemoryModules::new()
            .with("Spawn", "void system_Spawn(World* w) {}\n")
            .with(
                "Move",
                "// REQ: Ball.position as pos\n// REQ: World.gravity as g\n// REQ_LIB: <raymath.h>\n// REQ_LIB: raymath\n",
            )
            .with(
                "Physics",
                "// REQ_STRUCT: Ball\nvoid system_Physics_range(World* w, int start, int end) {}\n",
            );
        let mut diagnostics = Diagnostics::new();
        let modules = resolve_modules(&model(), &source, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(modules.keys().collect::<Vec<_>>(), ["Move", "Physics", "Spawn"]);

        let moving = &modules["Move"];
        assert_eq!(moving.requirements.len(), 4);
        assert_eq!(moving.libraries, vec!["raymath".to_string()]);
        assert_eq!(moving.path, PathBuf::from("Move.c"));

        let physics = &modules["Physics"];
        assert!(physics.is_parallel());
        assert!(physics.has_range_entry);
        assert_eq!(physics.struct_requirements[0].alias, "Ball_data");

        assert!(modules["Spawn"].takes_world());
    }

    #[test]
    fn test_parallel_without_range_warns() {
        let source = MemoryModules::new()
            .with("Spawn", "")
            .with("Move", "")
            .with("Physics", "void system_Physics(World* w) {}\n");
        let mut diagnostics = Diagnostics::new();
        resolve_modules(&model(), &source, &mut diagnostics).unwrap();
        assert!(diagnostics.contains(ErrorKind::Structure));
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let source = MemoryModules::new().with("Spawn", "").with("Move", "");
        let error = resolve_modules(&model(), &source, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::MissingModule);
        assert!(error.message.contains("Physics"));
    }

    #[test]
    fn test_marker_errors_carry_module_path() {
        let source = MemoryModules::new()
            .with("Spawn", "")
            .with("Move", "\n// REQ: Ghost.x\n")
            .with("Physics", "");
        let error = resolve_modules(&model(), &source, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedEntity);
        assert_eq!(error.file, Some(PathBuf::from("Move.c")));
        assert_eq!(error.span, Span::line(2));
    }
}
