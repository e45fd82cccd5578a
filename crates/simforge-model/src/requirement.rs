//! Resolved module records: what each system asks of the world.

use crate::entity::is_reserved_field;
use crate::phase::ExecMode;
use serde::Serialize;
use std::path::PathBuf;

/// Direct access to one entity property.
///
/// `property` names a storage field, so an SOA requirement has already been
/// split into one record per component by the time it lands here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub entity: String,
    pub property: String,
    /// Parameter name inside the module.
    pub alias: String,
    /// Type name as declared (resolved to a host type at emission).
    pub data_type: String,
    /// Entity-wide variable rather than a per-instance array.
    pub is_shared: bool,
}

impl Requirement {
    /// Whether this targets `_active` or `_capacity`.
    pub fn is_reserved(&self) -> bool {
        is_reserved_field(&self.property)
    }

    /// Whether the argument is a scalar slot rather than an array element.
    pub fn is_scalar_slot(&self) -> bool {
        self.is_shared || self.is_reserved()
    }
}

/// Access to an entity's whole storage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructRequirement {
    pub entity: String,
    pub alias: String,
}

/// Generator-facing view of a system.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub name: String,
    /// Where the module source was read from.
    pub path: PathBuf,
    pub requirements: Vec<Requirement>,
    pub struct_requirements: Vec<StructRequirement>,
    /// External headers, already stripped of `<>` and `.h`.
    pub libraries: Vec<String>,
    pub mode: ExecMode,
    /// The source defines `system_<name>_range`.
    pub has_range_entry: bool,
}

impl Module {
    /// A module without any requirement receives the whole world.
    pub fn takes_world(&self) -> bool {
        self.requirements.is_empty() && self.struct_requirements.is_empty()
    }

    pub fn is_parallel(&self) -> bool {
        self.mode == ExecMode::Parallel
    }

    /// Whether the module asked for `entity`'s full storage record.
    pub fn has_struct_for(&self, entity: &str) -> bool {
        self.struct_requirements.iter().any(|r| r.entity == entity)
    }
}
