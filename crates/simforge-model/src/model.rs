//! The semantic model built from a world spec.
//!
//! A [`SpecModel`] is created empty by the spec parser, filled line by line,
//! finalized by the post-passes (priority sort, SOA expansion, `World`
//! check) and then handed read-only to the resolver and code generator.
//! It is an ordinary value: nothing outlives the compilation that built it.

use crate::entity::{Entity, EntityKind};
use crate::error::{CompileResult, Diagnostics};
use crate::phase::{ExecMode, PhaseTable, SystemConfig, DEFAULT_PRIORITY};
use crate::render::RenderSync;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Name of the mandatory UNIQUE entity.
pub const WORLD_ENTITY: &str = "World";
/// Worker ceiling used when `CONFIG MAX_THREADS` is absent.
pub const DEFAULT_MAX_THREADS: u32 = 8;
/// Backend used when `BACKEND` is absent.
pub const DEFAULT_BACKEND: &str = "raylib";
/// Backend name that disables generated backend glue.
pub const MANUAL_BACKEND: &str = "manual";

/// Engine-level settings from `CONFIG` and `BACKEND` directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub max_threads: u32,
    /// Lowercased backend name.
    pub backend: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            backend: DEFAULT_BACKEND.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn is_manual_backend(&self) -> bool {
        self.backend == MANUAL_BACKEND
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecModel {
    pub types: TypeRegistry,
    /// Entities in declaration order.
    pub entities: IndexMap<String, Entity>,
    /// Global phase lists.
    pub globals: PhaseTable,
    /// Scheduling attributes of every configured system.
    pub systems: IndexMap<String, SystemConfig>,
    pub engine: EngineConfig,
    pub render: Option<RenderSync>,
}

impl SpecModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Configuration of `system`, or the defaults when it was never configured.
    pub fn system_config(&self, system: &str) -> SystemConfig {
        self.systems.get(system).copied().unwrap_or_default()
    }

    pub fn priority_of(&self, system: &str) -> i32 {
        self.systems
            .get(system)
            .map_or(DEFAULT_PRIORITY, |config| config.priority)
    }

    pub fn mode_of(&self, system: &str) -> ExecMode {
        self.system_config(system).mode
    }

    /// Every system referenced from any global or entity phase, sorted by name.
    pub fn referenced_systems(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.globals.systems().collect();
        for entity in self.entities.values() {
            names.extend(entity.phases.systems());
        }
        names
    }

    /// First GENERIC entity in declaration order.
    pub fn first_generic(&self) -> Option<&Entity> {
        self.entities.values().find(|e| e.kind.is_generic())
    }

    /// Whether the mandatory UNIQUE `World` entity exists.
    pub fn has_world(&self) -> bool {
        self.entities
            .get(WORLD_ENTITY)
            .is_some_and(|e| e.kind == EntityKind::Unique)
    }

    /// Stable-sort every global and entity phase list by priority.
    pub fn sort_phases(&mut self) {
        let systems = &self.systems;
        let priority = |name: &str| {
            systems
                .get(name)
                .map_or(DEFAULT_PRIORITY, |config| config.priority)
        };
        self.globals.sort_by_priority(priority);
        for entity in self.entities.values_mut() {
            entity.phases.sort_by_priority(priority);
        }
    }

    /// Rebuild every entity's expanded field tables.
    pub fn expand_soa(&mut self, diagnostics: &mut Diagnostics) -> CompileResult<()> {
        for entity in self.entities.values_mut() {
            entity.expand_soa(&self.types, diagnostics)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::span::Span;

    fn model_with_entities() -> SpecModel {
        let mut model = SpecModel::new();
        model.entities.insert(
            "World".to_string(),
            Entity::new("World", EntityKind::Unique, Span::line(1)),
        );
        model.entities.insert(
            "Ball".to_string(),
            Entity::new("Ball", EntityKind::Generic { count: 8 }, Span::line(4)),
        );
        model
    }

    #[test]
    fn test_world_check() {
        let mut model = model_with_entities();
        assert!(model.has_world());
        model.entities.shift_remove("World");
        assert!(!model.has_world());
    }

    #[test]
    fn test_generic_world_does_not_count() {
        let mut model = SpecModel::new();
        model.entities.insert(
            "World".to_string(),
            Entity::new("World", EntityKind::Generic { count: 1 }, Span::line(1)),
        );
        assert!(!model.has_world());
    }

    #[test]
    fn test_first_generic_in_declaration_order() {
        let model = model_with_entities();
        assert_eq!(model.first_generic().map(|e| e.name.as_str()), Some("Ball"));
    }

    #[test]
    fn test_sort_phases_uses_configured_priorities() {
        let mut model = model_with_entities();
        model.systems.insert(
            "Late".to_string(),
            SystemConfig {
                mode: ExecMode::Single,
                priority: 500,
            },
        );
        model.systems.insert(
            "Early".to_string(),
            SystemConfig {
                mode: ExecMode::Parallel,
                priority: 1,
            },
        );
        model.globals.push(Phase::Loop, "Late");
        model.globals.push(Phase::Loop, "Plain");
        model.globals.push(Phase::Loop, "Early");
        if let Some(ball) = model.entities.get_mut("Ball") {
            ball.phases.push(Phase::End, "Late");
            ball.phases.push(Phase::End, "Early");
        }

        model.sort_phases();

        assert_eq!(model.globals.get(Phase::Loop), ["Early", "Plain", "Late"]);
        assert_eq!(
            model.entities["Ball"].phases.get(Phase::End),
            ["Early", "Late"]
        );
        assert_eq!(model.mode_of("Early"), ExecMode::Parallel);
        assert_eq!(model.priority_of("Plain"), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_referenced_systems_are_deduplicated_and_sorted() {
        let mut model = model_with_entities();
        model.globals.push(Phase::Start, "Zeta");
        model.globals.push(Phase::Loop, "Alpha");
        if let Some(ball) = model.entities.get_mut("Ball") {
            ball.phases.push(Phase::Loop, "Alpha");
            ball.phases.push(Phase::Loop, "Move");
        }
        let names: Vec<_> = model.referenced_systems().into_iter().collect();
        assert_eq!(names, vec!["Alpha", "Move", "Zeta"]);
    }
}
