//! Property typing for rule bindings.
//!
//! A rule file names entity properties but not their types. [`PropertyTypes`]
//! answers the two questions binding needs (is the entity a singleton, and
//! what does one property look like) either from a parsed world spec or, when
//! rules are compiled on their own, from a fixed naming heuristic.

use simforge_model::{
    CompileError, CompileResult, EntityKind, ErrorKind, SpecModel, Span, WORLD_ENTITY,
    is_reserved_field,
};

/// Host type of the reserved `_active`/`_capacity` slots.
const RESERVED_HOST_TYPE: &str = "int32_t";

/// What binding needs to know about one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Host type of one element.
    pub host_type: String,
    /// Stored as one element per instance of a GENERIC entity.
    pub per_instance: bool,
}

impl PropertyInfo {
    fn new(host_type: impl Into<String>, per_instance: bool) -> Self {
        Self {
            host_type: host_type.into(),
            per_instance,
        }
    }
}

/// Source of entity and property types for rule binding.
pub trait PropertyTypes {
    /// Whether `entity` is a UNIQUE entity.
    fn is_unique(&self, entity: &str, span: Span) -> CompileResult<bool>;

    /// Storage shape of `entity.property`.
    fn property(&self, entity: &str, property: &str, span: Span) -> CompileResult<PropertyInfo>;
}

/// Name-based typing used when no world spec is available.
///
/// `World` is the only UNIQUE entity; every other entity is GENERIC and all
/// of its properties are per-instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTypes;

impl HeuristicTypes {
    /// Guess a host type from a property name.
    pub fn guess(property: &str) -> &'static str {
        match property {
            "active" | "is_awake" => "bool",
            "color" | "health" | "ammo" | "team_id" => "int",
            "id" => "uint32_t",
            _ => "float",
        }
    }
}

impl PropertyTypes for HeuristicTypes {
    fn is_unique(&self, entity: &str, _span: Span) -> CompileResult<bool> {
        Ok(entity == WORLD_ENTITY)
    }

    fn property(&self, entity: &str, property: &str, _span: Span) -> CompileResult<PropertyInfo> {
        if is_reserved_field(property) {
            return Ok(PropertyInfo::new(RESERVED_HOST_TYPE, false));
        }
        Ok(PropertyInfo::new(
            Self::guess(property),
            entity != WORLD_ENTITY,
        ))
    }
}

impl PropertyTypes for SpecModel {
    fn is_unique(&self, entity: &str, span: Span) -> CompileResult<bool> {
        match self.entity(entity) {
            Some(found) => Ok(found.kind == EntityKind::Unique),
            None => Err(undefined_entity(entity, span)),
        }
    }

    fn property(&self, entity: &str, property: &str, span: Span) -> CompileResult<PropertyInfo> {
        let Some(found) = self.entity(entity) else {
            return Err(undefined_entity(entity, span));
        };

        if is_reserved_field(property) && found.kind.is_generic() {
            return Ok(PropertyInfo::new(RESERVED_HOST_TYPE, false));
        }
        if let Some(var) = found.fields.get(property) {
            return Ok(PropertyInfo::new(
                self.types.host_type(&var.ty),
                found.kind.is_generic(),
            ));
        }
        if let Some(var) = found.shared_fields.get(property) {
            return Ok(PropertyInfo::new(self.types.host_type(&var.ty), false));
        }

        let mut error = CompileError::new(
            ErrorKind::UndefinedProperty,
            span,
            format!("entity '{}' has no property '{}'", entity, property),
        );
        let declared = found.vars.get(property).or_else(|| found.shared.get(property));
        if let Some(soa) = declared.and_then(|var| self.types.soa(&var.ty)) {
            let components: Vec<String> = soa
                .components
                .iter()
                .map(|component| format!("{}_{}", property, component))
                .collect();
            error = error.with_note(format!(
                "'{}' is split per component; bind one of: {}",
                property,
                components.join(", ")
            ));
        }
        Err(error)
    }
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
    use simforge_model::{Entity, SoaType, Variable};

    fn model() -> SpecModel {
        let mut model = SpecModel::new();
        model.types.add_soa(
            "Vec2",
            SoaType {
                base: "float".to_string(),
                components: vec!["x".into(), "y".into()],
            },
        );
        model.types.add_alias("Meters", "double");

        let mut world = Entity::new("World", EntityKind::Unique, Span::line(1));
        world.vars.insert(Variable::new("gravity", "Meters")).unwrap();
        let mut ball = Entity::new("Ball", EntityKind::Generic { count: 8 }, Span::line(3));
        ball.vars.insert(Variable::new("pos", "Vec2")).unwrap();
        ball.vars.insert(Variable::new("active", "bool")).unwrap();
        ball.shared.insert(Variable::new("bounciness", "float")).unwrap();

        model.entities.insert("World".to_string(), world);
        model.entities.insert("Ball".to_string(), ball);
        model.expand_soa(&mut simforge_model::Diagnostics::new()).unwrap();
        model
    }

    #[test]
    fn test_heuristic_table() {
        let types = HeuristicTypes;
        assert_eq!(types.property("Ball", "active", Span::NONE).unwrap().host_type, "bool");
        assert_eq!(types.property("Ball", "ammo", Span::NONE).unwrap().host_type, "int");
        assert_eq!(types.property("Ball", "id", Span::NONE).unwrap().host_type, "uint32_t");
        assert_eq!(types.property("Ball", "speed", Span::NONE).unwrap().host_type, "float");
        assert!(types.property("Ball", "speed", Span::NONE).unwrap().per_instance);
        assert!(!types.property("World", "speed", Span::NONE).unwrap().per_instance);
        assert!(types.is_unique("World", Span::NONE).unwrap());
        assert!(!types.is_unique("Ball", Span::NONE).unwrap());
    }

    #[test]
    fn test_model_resolves_aliases_and_components() {
        let model = model();
        let gravity = model.property("World", "gravity", Span::NONE).unwrap();
        assert_eq!(gravity, PropertyInfo::new("double", false));

        let pos_x = model.property("Ball", "pos_x", Span::NONE).unwrap();
        assert_eq!(pos_x, PropertyInfo::new("float", true));

        let shared = model.property("Ball", "bounciness", Span::NONE).unwrap();
        assert!(!shared.per_instance);
    }

    #[test]
    fn test_model_rejects_whole_soa_property() {
        let error = model().property("Ball", "pos", Span::line(4)).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedProperty);
        assert_eq!(error.span, Span::line(4));
        assert!(error.notes[0].contains("pos_x, pos_y"));
    }

    #[test]
    fn test_reserved_fields_only_on_generic() {
        let model = model();
        let active = model.property("Ball", "_active", Span::NONE).unwrap();
        assert_eq!(active, PropertyInfo::new("int32_t", false));
        let error = model.property("World", "_active", Span::NONE).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedProperty);
    }

    #[test]
    fn test_model_undefined_entity() {
        let error = model().is_unique("Ghost", Span::NONE).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedEntity);
    }
}
