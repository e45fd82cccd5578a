//! Front-end for world specs and render-sync files.
//!
//! - [`parse_spec`] turns a world spec into a finalized [`SpecModel`]
//!   (phases sorted by priority, SOA fields expanded, `World` checked)
//! - [`parse_render_sync`] validates a `.gspec` file against that model and
//!   [`apply_render_sync`] attaches it
//!
//! ```
//! use simforge_model::{Diagnostics, Phase};
//! use simforge_spec::parse_spec;
//!
//! let source = "UNIQUE World:\n@@score int = 0\nLOOP:\nTick\n";
//! let model = parse_spec(source, &mut Diagnostics::new()).unwrap();
//! assert_eq!(model.globals.get(Phase::Loop), ["Tick"]);
//! ```
//!
//! [`SpecModel`]: simforge_model::SpecModel

pub mod gspec;
pub mod parser;
pub mod section;

pub use gspec::{apply_render_sync, parse_render_sync};
pub use parser::parse_spec;
pub use section::Section;
