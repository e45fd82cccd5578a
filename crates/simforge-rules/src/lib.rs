//! Rule language: per-entity conditions and actions compiled to C systems.
//!
//! - [`lexer`] — lossless expression tokens
//! - [`ast`] — rule files, bindings and the bound module
//! - [`parser`] — `MODULE_ENTITY:` / `REQ:` / `RULE:` grammar
//! - [`types`] — property typing from a world spec or a naming heuristic
//! - [`transpile`] — alias rewriting inside host expressions
//! - [`emit`] — binding resolution and module emission
//!
//! ```
//! use simforge_model::Diagnostics;
//! use simforge_rules::{HeuristicTypes, compile_rule};
//!
//! let source = "MODULE_ENTITY: Ball\nREQ: Ball.hp as hp READ_WRITE\n\
//!               RULE: regen\nACTIONS:\nSET hp = hp + 1\n";
//! let c = compile_rule("regen", source, &HeuristicTypes, &mut Diagnostics::new()).unwrap();
//! assert!(c.contains("hp[i] = hp[i] + 1;"));
//! ```

pub mod ast;
pub mod emit;
pub mod lexer;
pub mod parser;
pub mod transpile;
pub mod types;

pub use ast::{Access, Binding, RuleFile, RuleModule, Shape};
pub use emit::{bind, compile_rule, emit_module};
pub use parser::parse_rule_file;
pub use transpile::Transpiler;
pub use types::{HeuristicTypes, PropertyInfo, PropertyTypes};
