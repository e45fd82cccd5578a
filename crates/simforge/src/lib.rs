// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! simforge: world specs and rule files compiled to one C program.
//!
//! The pipeline runs in fixed stages over an explicit [`Compilation`]:
//!
//! 1. parse the world spec ([`simforge_spec`])
//! 2. optionally attach a render-sync file
//! 3. resolve every scheduled system's module ([`simforge_resolve`])
//! 4. generate the translation unit ([`simforge_codegen`])
//!
//! Rule files ([`simforge_rules`]) compile to ordinary modules that the same
//! pipeline then picks up.
//!
//! ```
//! use simforge::{GenOptions, compile};
//! use simforge_resolve::MemoryModules;
//!
//! let spec = "UNIQUE World:\n@@ticks int\nLOOP:\nTick\n";
//! let modules = MemoryModules::new().with("Tick", "// REQ: World.ticks\n");
//! let compiled = compile(spec, None, &modules, &GenOptions::default()).unwrap();
//! assert!(compiled.source.contains("system_Tick(&w.world.ticks);"));
//! ```

pub mod context;
pub mod driver;
pub mod error;

pub use context::{Compilation, Compiled, compile};
pub use driver::{CompileOptions, compile_files, compile_rules_dir, find_rule_files};
pub use error::{Error, Result};
pub use simforge_codegen::GenOptions;
pub use simforge_model::{CompileError, Diagnostics, ErrorKind, Severity, SpecModel};
