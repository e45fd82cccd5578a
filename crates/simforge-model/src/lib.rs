//! Foundation types shared by every simforge stage.
//!
//! - [`span`] — line locations for diagnostics
//! - [`error`] — `CompileError`, `ErrorKind`, `Severity`, `Diagnostics`
//! - [`types`] — the type registry (built-ins, aliases, SOA composites)
//! - [`entity`] — entities, variables and SOA expansion
//! - [`phase`] — lifecycle phases, execution modes, priority scheduling
//! - [`model`] — the complete semantic model of a world spec
//! - [`names`] — identifier rules
//! - [`requirement`] — resolved module records consumed by code generation
//! - [`render`] — render-sync binding for instanced drawing

pub mod entity;
pub mod error;
pub mod model;
pub mod names;
pub mod phase;
pub mod render;
pub mod requirement;
pub mod span;
pub mod types;

pub use entity::{
    ACTIVE_FIELD, CAPACITY_FIELD, Entity, EntityKind, RESERVED_FIELD_TYPE, VarTable, Variable,
    is_reserved_field,
};
pub use error::{CompileError, CompileResult, Diagnostics, ErrorKind, Severity};
pub use names::is_identifier;
pub use model::{EngineConfig, SpecModel, WORLD_ENTITY};
pub use phase::{DEFAULT_PRIORITY, ExecMode, Phase, PhaseTable, SystemConfig};
pub use render::RenderSync;
pub use requirement::{Module, Requirement, StructRequirement};
pub use span::Span;
pub use types::{SoaType, TypeRegistry};
