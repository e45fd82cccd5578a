//! Entity storage types, the world aggregate and world initialization.

use crate::writer::CWriter;
use simforge_model::{ACTIVE_FIELD, CAPACITY_FIELD, Entity, EntityKind, SpecModel, Variable};

/// Size of the frame-time ring buffer in the engine bookkeeping block.
pub const FRAME_TIME_SLOTS: usize = 120;

/// Literals that equal the zero-filled state of a fresh world.
const ZERO_LITERALS: &[&str] = &["0", "0.0", "0.0f", "0.00f", "false", "NULL"];

/// Whether a default literal is already implied by zero-filling.
pub fn is_zero_literal(value: &str) -> bool {
    let value = value.trim();
    if ZERO_LITERALS.contains(&value) {
        return true;
    }
    match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        Some(inner) => inner.split(',').all(is_zero_literal),
        None => false,
    }
}

/// Default literal as an assignable C expression.
fn initializer(model: &SpecModel, var: &Variable, value: &str) -> String {
    let value = value.trim();
    if value.starts_with('{') {
        format!("({}){}", model.types.host_type(&var.ty), value)
    } else {
        value.to_string()
    }
}

/// Non-zero default of a variable, if it needs an explicit assignment.
fn explicit_default<'v>(var: &'v Variable) -> Option<&'v str> {
    var.default
        .as_deref()
        .filter(|value| !value.trim().is_empty() && !is_zero_literal(value))
}

/// `typedef struct { .. } <Name>_Data;` for one entity.
pub fn write_entity_struct(w: &mut CWriter, model: &SpecModel, entity: &Entity) {
    match entity.kind {
        EntityKind::Generic { count } => {
            w.line(format!("// Entity: {} (GENERIC[{}])", entity.name, count));
            w.open("typedef struct");
            w.line(format!("int32_t {};", ACTIVE_FIELD));
            w.line(format!("int32_t {};", CAPACITY_FIELD));
            for var in entity.fields.iter() {
                w.line(format!(
                    "{} {}[{}];",
                    model.types.host_type(&var.ty),
                    var.name,
                    count
                ));
            }
        }
        EntityKind::Unique => {
            w.line(format!("// Entity: {} (UNIQUE)", entity.name));
            w.open("typedef struct");
            for var in entity.fields.iter() {
                w.line(format!("{} {};", model.types.host_type(&var.ty), var.name));
            }
        }
    }
    for var in entity.shared_fields.iter() {
        w.line(format!(
            "{} {};  // shared",
            model.types.host_type(&var.ty),
            var.name
        ));
    }
    w.close_with(&format!(" {}_Data;", entity.name));
}

/// The `World` aggregate: every entity plus engine bookkeeping.
pub fn write_world_struct(w: &mut CWriter, model: &SpecModel) {
    w.open("typedef struct");
    for entity in model.entities.values() {
        w.line(format!("{}_Data {};", entity.name, entity.storage_name()));
    }
    w.blank();
    w.line("bool running;");
    w.line("uint64_t frame;");
    w.line("float delta_time;");
    w.blank();
    w.open("struct");
    w.line("uint64_t start_time;");
    w.line("uint64_t frame_time;");
    w.line("int32_t fps;");
    w.line(format!("float frame_times[{}];", FRAME_TIME_SLOTS));
    w.line("int32_t frame_time_index;");
    w.close_with(" _engine;");
    w.close_with(" World;");
}

/// `static void init_world(World* w)`: zero-fill, engine state, defaults.
pub fn write_init_world(w: &mut CWriter, model: &SpecModel) {
    w.open("static void init_world(World* w)");
    w.line("memset(w, 0, sizeof(World));");
    w.line("w->running = true;");
    w.line("w->frame = 0;");
    w.line("w->delta_time = 0.016f;");
    w.line("w->_engine.fps = 60;");
    w.line("w->_engine.frame_time_index = 0;");

    for entity in model.entities.values() {
        if entity.kind == EntityKind::Unique {
            write_unique_defaults(w, model, entity);
        }
    }
    for entity in model.entities.values() {
        if let EntityKind::Generic { count } = entity.kind {
            write_generic_defaults(w, model, entity, count);
        }
    }
    w.close();
}

fn write_unique_defaults(w: &mut CWriter, model: &SpecModel, entity: &Entity) {
    let storage = entity.storage_name();
    let mut first = true;
    for var in entity.fields.iter().chain(entity.shared_fields.iter()) {
        if let Some(value) = explicit_default(var) {
            if first {
                w.blank();
                first = false;
            }
            w.line(format!(
                "w->{}.{} = {};",
                storage,
                var.name,
                initializer(model, var, value)
            ));
        }
    }
}

fn write_generic_defaults(w: &mut CWriter, model: &SpecModel, entity: &Entity, count: u32) {
    let storage = entity.storage_name();
    let active = entity.active_default.as_deref().unwrap_or("0");

    w.blank();
    w.line(format!("// {}", entity.name));
    w.line(format!("w->{}.{} = {};", storage, CAPACITY_FIELD, count));
    w.line(format!("w->{}.{} = {};", storage, ACTIVE_FIELD, active));

    let per_instance: Vec<(&Variable, &str)> = entity
        .fields
        .iter()
        .filter_map(|var| explicit_default(var).map(|value| (var, value)))
        .collect();
    if !per_instance.is_empty() {
        w.open(format!("for (int i = 0; i < {}; i++)", count));
        for (var, value) in per_instance {
            w.line(format!(
                "w->{}.{}[i] = {};",
                storage,
                var.name,
                initializer(model, var, value)
            ));
        }
        w.close();
    }

    for var in entity.shared_fields.iter() {
        if let Some(value) = explicit_default(var) {
            w.line(format!(
                "w->{}.{} = {};",
                storage,
                var.name,
                initializer(model, var, value)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simforge_model::{Diagnostics, ErrorKind, SoaType, Span};

    fn model() -> SpecModel {
        let mut model = SpecModel::new();
        let mut world = Entity::new("World", EntityKind::Unique, Span::NONE);
        world.vars.insert(Variable::new("gravity", "float").with_default("-9.8f")).unwrap();
        world.vars.insert(Variable::new("paused", "bool").with_default("false")).unwrap();
        world.vars.insert(Variable::new("tint", "Color").with_default("{255, 0, 0, 255}")).unwrap();

        let mut ball = Entity::new("Ball", EntityKind::Generic { count: 5 }, Span::NONE);
        ball.vars.insert(Variable::new("radius", "float").with_default("0.5f")).unwrap();
        ball.vars.insert(Variable::new("hits", "int").with_default("0")).unwrap();
        ball.shared.insert(Variable::new("friction", "double").with_default("0.1")).unwrap();
        ball.active_default = Some("3".to_string());

        model.entities.insert("World".to_string(), world);
        model.entities.insert("Ball".to_string(), ball);
        model.expand_soa(&mut simforge_model::Diagnostics::new()).unwrap();
        model
    }

    #[test]
    fn test_zero_literals() {
        for zero in ["0", " 0.0f ", "false", "NULL", "{0, 0.0f, false}", "{ 0 }"] {
            assert!(is_zero_literal(zero), "{}", zero);
        }
        for value in ["1", "0.5f", "true", "{0, 1}", "0x0", "{}"] {
            assert!(!is_zero_literal(value), "{}", value);
        }
    }

    #[test]
    fn test_generic_struct_has_fixed_arrays() {
        let model = model();
        let mut w = CWriter::new();
        write_entity_struct(&mut w, &model, model.entity("Ball").unwrap());
        assert_eq!(
            w.finish(),
            "\
// Entity: Ball (GENERIC[5])
typedef struct {
    int32_t _active;
    int32_t _capacity;
    float radius[5];
    int hits[5];
    double friction;  // shared
} Ball_Data;
"
        );
    }

    #[test]
    fn test_world_struct() {
        let model = model();
        let mut w = CWriter::new();
        write_world_struct(&mut w, &model);
        let out = w.finish();
        assert!(out.starts_with("typedef struct {\n    World_Data world;\n    Ball_Data ball;\n"));
        assert!(out.contains("        float frame_times[120];\n"));
        assert!(out.ends_with("    } _engine;\n} World;\n"));
    }

    #[test]
    fn test_init_world_skips_zero_defaults() {
        let model = model();
        let mut w = CWriter::new();
        write_init_world(&mut w, &model);
        let out = w.finish();

        assert!(out.contains("    w->world.gravity = -9.8f;\n"));
        assert!(!out.contains("paused"));
        assert!(out.contains("    w->world.tint = (Color){255, 0, 0, 255};\n"));

        assert!(out.contains("    w->ball._capacity = 5;\n"));
        assert!(out.contains("    w->ball._active = 3;\n"));
        assert!(out.contains("    for (int i = 0; i < 5; i++) {\n        w->ball.radius[i] = 0.5f;\n    }\n"));
        assert!(!out.contains("hits"));
        assert!(out.contains("    w->ball.friction = 0.1;\n"));
    }

    #[test]
    fn test_soa_brace_defaults_never_emit_empty_assignments() {
        let mut model = SpecModel::new();
        model.types.add_soa(
            "Vec3",
            SoaType {
                base: "float".to_string(),
                components: vec!["x".into(), "y".into(), "z".into()],
            },
        );
        let mut world = Entity::new("World", EntityKind::Unique, Span::NONE);
        world.vars.insert(Variable::new("p", "Vec3").with_default("{}")).unwrap();
        world
            .vars
            .insert(Variable::new("q", "Vec3").with_default("{1.0f, 2.0f, 3.0f, 4.0f}"))
            .unwrap();
        model.entities.insert("World".to_string(), world);

        let mut diagnostics = Diagnostics::new();
        model.expand_soa(&mut diagnostics).unwrap();
        assert!(diagnostics.contains(ErrorKind::InvalidValue));

        let mut w = CWriter::new();
        write_init_world(&mut w, &model);
        let out = w.finish();
        assert!(!out.contains("= ;"));
        assert!(!out.contains("p_x"));
        assert!(out.contains("    w->world.q_x = 1.0f;\n"));
        assert!(out.contains("    w->world.q_z = 3.0f;\n"));
        assert!(!out.contains("4.0f"));
    }
}
