//! Rule-file syntax tree and the bound module built from it.

use indexmap::IndexMap;
use serde::Serialize;
use simforge_model::Span;
use std::fmt;
use std::str::FromStr;

/// What a rule may do through a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Access {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn can_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl FromStr for Access {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READ" => Ok(Access::Read),
            "WRITE" => Ok(Access::Write),
            "READ_WRITE" => Ok(Access::ReadWrite),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "READ",
            Access::Write => "WRITE",
            Access::ReadWrite => "READ_WRITE",
        })
    }
}

/// Explicit array-or-scalar choice on a `REQ:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shape {
    Array,
    Single,
}

impl FromStr for Shape {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ARRAY" => Ok(Shape::Array),
            "SINGLE" => Ok(Shape::Single),
            _ => Err(()),
        }
    }
}

/// A `REQ:` line as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingDecl {
    pub entity: String,
    pub property: String,
    pub alias: String,
    /// `None` when the shape is left to the default rule.
    pub shape: Option<Shape>,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    /// `SET <target>[.member | ->member ..] = <expr>`
    Set {
        target: String,
        /// Member access written after the target, e.g. `.x` or `->pos.y`.
        member: String,
        value: String,
    },
    /// `EMIT <name> [arg ..]`
    Emit { event: String, args: Vec<String> },
    /// `DESTROY`
    Destroy,
    /// Any other line, emitted as an expression statement.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLine {
    pub action: Action,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    /// Expression text with the `WHEN`/`AND`/`NOT` prefixes already applied.
    pub expr: String,
    pub span: Span,
}

/// A named block of AND-ed conditions and ordered actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<ActionLine>,
    pub span: Span,
}

/// A parsed rule file, before property types are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFile {
    /// Module name without the `sys_` prefix (the file stem).
    pub name: String,
    /// Owning entity from `MODULE_ENTITY:`.
    pub entity: String,
    pub bindings: Vec<BindingDecl>,
    pub rules: Vec<Rule>,
}

/// A binding with its storage resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub alias: String,
    pub entity: String,
    pub property: String,
    /// Host type of one element.
    pub host_type: String,
    /// The property is a per-instance array of a GENERIC entity.
    pub per_instance: bool,
    /// Expressions index the binding with the loop variable.
    pub is_array: bool,
    pub access: Access,
    pub span: Span,
}

/// A rule file whose bindings have been resolved, ready for emission.
#[derive(Debug, Clone, Serialize)]
pub struct RuleModule {
    pub name: String,
    pub entity: String,
    /// Storage name of the owning entity inside `World`.
    pub entity_storage: String,
    pub entity_is_unique: bool,
    pub bindings: IndexMap<String, Binding>,
    pub rules: Vec<Rule>,
}

impl RuleModule {
    /// Name of the generated system, as scheduled in a world spec.
    pub fn system_name(&self) -> String {
        format!("sys_{}", self.name)
    }
}
