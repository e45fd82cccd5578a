//! Entities, variables and the SOA expansion of their storage layout.

use crate::error::{CompileError, CompileResult, Diagnostics, ErrorKind};
use crate::phase::PhaseTable;
use crate::span::Span;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use serde::Serialize;

/// Live instance count of a GENERIC entity.
pub const ACTIVE_FIELD: &str = "_active";
/// Declared maximum instance count of a GENERIC entity.
pub const CAPACITY_FIELD: &str = "_capacity";
/// Type name both reserved fields resolve to.
pub const RESERVED_FIELD_TYPE: &str = "int32";

/// Whether `name` is one of the two engine-maintained pseudo-properties.
pub fn is_reserved_field(name: &str) -> bool {
    name == ACTIVE_FIELD || name == CAPACITY_FIELD
}

/// Storage shape of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    /// Exactly one instance; every variable is a scalar field.
    Unique,
    /// Fixed-capacity array of instances.
    Generic { count: u32 },
}

impl EntityKind {
    pub fn is_generic(self) -> bool {
        matches!(self, EntityKind::Generic { .. })
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Unique => "UNIQUE",
            EntityKind::Generic { .. } => "GENERIC",
        }
    }
}

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    /// Type name as written (may be an alias or SOA name).
    pub ty: String,
    /// Default literal as written, `None` when absent.
    pub default: Option<String>,
    /// Strict variables keep SOA types opaque.
    pub strict: bool,
    pub span: Span,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default: None,
            strict: false,
            span: Span::NONE,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Insertion-ordered variable table with name lookup.
///
/// Declaration order is the generated struct field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VarTable {
    vars: IndexMap<String, Variable>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, handing it back if the name is taken.
    pub fn insert(&mut self, var: Variable) -> Result<(), Variable> {
        if self.vars.contains_key(&var.name) {
            return Err(var);
        }
        self.vars.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Split every non-strict SOA variable into per-component scalars.
    ///
    /// A brace default `{a, b, c}` is distributed over the components in
    /// order; a scalar default is given to every component. Empty slots
    /// leave their component without a default.
    ///
    /// # Errors
    /// [`ErrorKind::DuplicateName`] when an expanded name collides with
    /// another variable or component, located at the later declaration.
    pub fn expand_soa(
        &self,
        types: &TypeRegistry,
        diagnostics: &mut Diagnostics,
    ) -> CompileResult<VarTable> {
        let mut expanded = VarTable::new();
        // expanded name -> declared variable it came from
        let mut origin: IndexMap<String, &str> = IndexMap::new();

        for var in self.iter() {
            let soa = match types.soa(&var.ty) {
                Some(soa) if !var.strict => soa,
                _ => {
                    claim(&mut origin, &var.name, var)?;
                    expanded.vars.insert(var.name.clone(), var.clone());
                    continue;
                }
            };

            let defaults = split_component_defaults(var, soa.components.len(), diagnostics);
            for (i, component) in soa.components.iter().enumerate() {
                let name = format!("{}_{}", var.name, component);
                claim(&mut origin, &name, var)?;
                let default = match &defaults {
                    ComponentDefaults::PerComponent(values) => values.get(i).cloned().flatten(),
                    ComponentDefaults::Broadcast(value) => Some(value.clone()),
                    ComponentDefaults::None => None,
                };
                expanded.vars.insert(
                    name.clone(),
                    Variable {
                        name,
                        ty: soa.base.clone(),
                        default,
                        strict: false,
                        span: var.span,
                    },
                );
            }
        }
        Ok(expanded)
    }
}

/// Record that `var` produces the field `name`, rejecting a second producer.
fn claim<'v>(
    origin: &mut IndexMap<String, &'v str>,
    name: &str,
    var: &'v Variable,
) -> CompileResult<()> {
    if let Some(first) = origin.get(name) {
        let mut error = CompileError::new(
            ErrorKind::DuplicateName,
            var.span,
            format!("field '{}' is declared twice", name),
        );
        if *first != name {
            error = error.with_note(format!("'{}' is the SOA expansion of '{}'", name, first));
        }
        if var.name != name {
            error = error.with_note(format!("'{}' is the SOA expansion of '{}'", name, var.name));
        }
        return Err(error);
    }
    origin.insert(name.to_string(), var.name.as_str());
    Ok(())
}

enum ComponentDefaults {
    None,
    Broadcast(String),
    PerComponent(Vec<Option<String>>),
}

fn split_component_defaults(
    var: &Variable,
    components: usize,
    diagnostics: &mut Diagnostics,
) -> ComponentDefaults {
    let Some(default) = var.default.as_deref().map(str::trim) else {
        return ComponentDefaults::None;
    };
    let Some(inner) = default
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        if default.is_empty() {
            return ComponentDefaults::None;
        }
        return ComponentDefaults::Broadcast(default.to_string());
    };

    if inner.contains('{') || inner.contains('}') {
        diagnostics.warn(
            ErrorKind::InvalidValue,
            var.span,
            format!(
                "nested default '{}' of '{}' cannot be split per component; ignored",
                default, var.name
            ),
        );
        return ComponentDefaults::None;
    }
    if inner.trim().is_empty() {
        return ComponentDefaults::None;
    }

    let mut values: Vec<Option<String>> = inner
        .split(',')
        .map(|value| Some(value.trim().to_string()).filter(|v| !v.is_empty()))
        .collect();
    if values.len() > components {
        diagnostics.warn(
            ErrorKind::InvalidValue,
            var.span,
            format!(
                "default of '{}' has {} values but its type has {} components; extra values ignored",
                var.name,
                values.len(),
                components
            ),
        );
        values.truncate(components);
    }
    ComponentDefaults::PerComponent(values)
}

/// A declared entity.
///
/// The original (as-declared) tables are what external requirements are
/// validated against; the expanded tables are what storage is emitted from.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    /// Per-instance variables as declared.
    pub vars: VarTable,
    /// Entity-wide variables as declared.
    pub shared: VarTable,
    /// Per-instance variables after SOA expansion.
    pub fields: VarTable,
    /// Entity-wide variables after SOA expansion.
    pub shared_fields: VarTable,
    /// Initial `_active` count declared through `@@_active`.
    pub active_default: Option<String>,
    pub phases: PhaseTable,
    pub span: Span,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: EntityKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            vars: VarTable::new(),
            shared: VarTable::new(),
            fields: VarTable::new(),
            shared_fields: VarTable::new(),
            active_default: None,
            phases: PhaseTable::new(),
            span,
        }
    }

    /// Field name of this entity inside the aggregate world struct.
    pub fn storage_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Loop variable used when iterating this entity's live instances.
    pub fn loop_var(&self) -> String {
        format!("i_{}", self.name)
    }

    /// Capacity of a GENERIC entity.
    pub fn capacity(&self) -> Option<u32> {
        match self.kind {
            EntityKind::Generic { count } => Some(count),
            EntityKind::Unique => None,
        }
    }

    /// Whether a name is declared in either original table.
    pub fn declares(&self, name: &str) -> bool {
        self.vars.contains(name) || self.shared.contains(name)
    }

    /// Rebuild the expanded tables from the original ones.
    ///
    /// # Errors
    /// [`ErrorKind::DuplicateName`] when two expanded fields share a name,
    /// within one table or across the per-instance and shared tables.
    pub fn expand_soa(
        &mut self,
        types: &TypeRegistry,
        diagnostics: &mut Diagnostics,
    ) -> CompileResult<()> {
        let fields = self.vars.expand_soa(types, diagnostics)?;
        let shared_fields = self.shared.expand_soa(types, diagnostics)?;
        if let Some(clash) = shared_fields.iter().find(|v| fields.contains(&v.name)) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                clash.span,
                format!(
                    "shared field '{}' of '{}' is also a per-instance field",
                    clash.name, self.name
                ),
            ));
        }
        self.fields = fields;
        self.shared_fields = shared_fields;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SoaType;

    fn registry_with_vec3() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.add_soa(
            "Vec3",
            SoaType {
                base: "float".to_string(),
                components: vec!["x".into(), "y".into(), "z".into()],
            },
        );
        types
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut table = VarTable::new();
        assert!(table.insert(Variable::new("hp", "int")).is_ok());
        let rejected = table.insert(Variable::new("hp", "float")).unwrap_err();
        assert_eq!(rejected.ty, "float");
        assert_eq!(table.get("hp").map(|v| v.ty.as_str()), Some("int"));
    }

    #[test]
    fn test_expand_soa_distributes_brace_default() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table
            .insert(Variable::new("position", "Vec3").with_default("{1.0f, 2.0f}"))
            .unwrap();

        let expanded = table.expand_soa(&types, &mut Diagnostics::new()).unwrap();
        let names: Vec<_> = expanded.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["position_x", "position_y", "position_z"]);
        assert_eq!(expanded.get("position_x").unwrap().default.as_deref(), Some("1.0f"));
        assert_eq!(expanded.get("position_y").unwrap().default.as_deref(), Some("2.0f"));
        assert_eq!(expanded.get("position_z").unwrap().default, None);
        assert!(expanded.iter().all(|v| v.ty == "float"));
    }

    #[test]
    fn test_expand_soa_broadcasts_scalar_default() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table
            .insert(Variable::new("scale", "Vec3").with_default("1.0f"))
            .unwrap();
        let expanded = table.expand_soa(&types, &mut Diagnostics::new()).unwrap();
        assert!(expanded.iter().all(|v| v.default.as_deref() == Some("1.0f")));
    }

    #[test]
    fn test_strict_soa_stays_opaque() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table.insert(Variable::new("origin", "Vec3").strict()).unwrap();
        table.insert(Variable::new("alive", "bool")).unwrap();

        let expanded = table.expand_soa(&types, &mut Diagnostics::new()).unwrap();
        let names: Vec<_> = expanded.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["origin", "alive"]);
        assert_eq!(expanded.get("origin").unwrap().ty, "Vec3");
    }

    #[test]
    fn test_expand_soa_rejects_component_collision() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table.insert(Variable::new("p", "Vec3")).unwrap();
        let mut explicit = Variable::new("p_x", "int").with_default("7");
        explicit.span = Span::line(4);
        table.insert(explicit).unwrap();

        let error = table.expand_soa(&types, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::DuplicateName);
        assert_eq!(error.span, Span::line(4));
        assert!(error.notes.iter().any(|n| n.contains("expansion of 'p'")));
    }

    #[test]
    fn test_expand_soa_rejects_collision_in_either_order() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table.insert(Variable::new("p_y", "float")).unwrap();
        table.insert(Variable::new("p", "Vec3")).unwrap();
        let error = table.expand_soa(&types, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::DuplicateName);
        assert!(error.message.contains("'p_y'"));
    }

    #[test]
    fn test_empty_brace_default_leaves_components_unset() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table.insert(Variable::new("p", "Vec3").with_default("{}")).unwrap();
        table.insert(Variable::new("q", "Vec3").with_default("{1.0f, , 3.0f}")).unwrap();

        let mut diagnostics = Diagnostics::new();
        let expanded = table.expand_soa(&types, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert!(["p_x", "p_y", "p_z"].iter().all(|n| expanded.get(n).unwrap().default.is_none()));
        assert_eq!(expanded.get("q_x").unwrap().default.as_deref(), Some("1.0f"));
        assert_eq!(expanded.get("q_y").unwrap().default, None);
        assert_eq!(expanded.get("q_z").unwrap().default.as_deref(), Some("3.0f"));
    }

    #[test]
    fn test_long_or_nested_brace_default_warns() {
        let types = registry_with_vec3();
        let mut table = VarTable::new();
        table.insert(Variable::new("p", "Vec3").with_default("{1, 2, 3, 4}")).unwrap();
        table.insert(Variable::new("q", "Vec3").with_default("{{1, 2}, 3}")).unwrap();

        let mut diagnostics = Diagnostics::new();
        let expanded = table.expand_soa(&types, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.contains(ErrorKind::InvalidValue));
        assert_eq!(expanded.get("p_z").unwrap().default.as_deref(), Some("3"));
        assert!(expanded.iter().filter(|v| v.name.starts_with("q_")).all(|v| v.default.is_none()));
    }

    #[test]
    fn test_shared_field_clash_is_rejected() {
        let types = registry_with_vec3();
        let mut entity = Entity::new("Ball", EntityKind::Generic { count: 2 }, Span::line(1));
        entity.vars.insert(Variable::new("spin", "Vec3")).unwrap();
        entity.shared.insert(Variable::new("spin_z", "float")).unwrap();
        let error = entity.expand_soa(&types, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::DuplicateName);
    }

    #[test]
    fn test_entity_naming() {
        let entity = Entity::new("Particle", EntityKind::Generic { count: 5 }, Span::line(1));
        assert_eq!(entity.storage_name(), "particle");
        assert_eq!(entity.loop_var(), "i_Particle");
        assert_eq!(entity.capacity(), Some(5));
    }
}
