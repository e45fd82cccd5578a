// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Requirement resolution for simforge modules.
//!
//! Every system referenced by a world spec is backed by a C module whose
//! `//` comments declare what it needs from the world. This crate reads
//! those markers through a [`ModuleSource`], validates them against the
//! [`SpecModel`](simforge_model::SpecModel) and produces the generator-facing
//! [`Module`](simforge_model::Module) records.

pub mod marker;
pub mod resolver;
pub mod source;

pub use marker::{Located, Marker, scan_markers};
pub use resolver::{resolve_module, resolve_modules, resolve_property};
pub use source::{FsModules, MemoryModules, ModuleSource, ModuleText};
