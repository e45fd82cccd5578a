// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! C code generation for a resolved world.
//!
//! Output order: preamble, entity storage types, the `World` aggregate,
//! scene globals, system prototypes, module includes, scene sync routines,
//! parallel dispatch wrappers, `init_world`, and `main` with the phase
//! wiring. See [`args`] for the indexing discipline every call site obeys.

pub mod args;
pub mod program;
pub mod render;
pub mod storage;
pub mod writer;

pub use args::{CallSite, call_args, call_statement};
pub use program::{DEFAULT_MODULE_INCLUDE_DIR, GenOptions, generate, library_include};
pub use storage::is_zero_literal;
pub use writer::CWriter;
