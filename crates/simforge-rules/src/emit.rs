//! Binding resolution and C emission for rule modules.
//!
//! A generated module receives the whole world, so it carries no requirement
//! markers of its own and is wired by the code generator exactly like a
//! hand-written whole-world module.

use crate::ast::{Action, ActionLine, Binding, Rule, RuleFile, RuleModule, Shape};
use crate::parser::parse_rule_file;
use crate::transpile::{Transpiler, access, is_keyword};
use crate::types::PropertyTypes;
use indexmap::IndexMap;
use simforge_model::{CompileError, CompileResult, Diagnostics, ErrorKind, Span};
use tracing::{debug, warn};

/// Headers every generated rule module includes.
const MODULE_INCLUDES: &[&str] = &[
    "<math.h>",
    "<stdbool.h>",
    "\"GraphicSystem/graphics_types.h\"",
    "\"ScriptSupport/scriptsupport.h\"",
];

/// Arity of the event-emission primitive.
const EMIT_ARITY: usize = 3;

const INDENT: &str = "    ";

/// Parse, bind and emit one rule file.
///
/// # Parameters
/// - `name`: module name (file stem); the system is called `sys_<name>`
/// - `source`: rule file text
/// - `types`: property types, from a world spec or the naming heuristic
/// - `diagnostics`: receives warnings
///
/// # Returns
/// The generated module source.
pub fn compile_rule(
    name: &str,
    source: &str,
    types: &dyn PropertyTypes,
    diagnostics: &mut Diagnostics,
) -> CompileResult<String> {
    let file = parse_rule_file(name, source)?;
    let module = bind(file, types, diagnostics)?;
    emit_module(&module, diagnostics)
}

/// Resolve every binding of a parsed rule file.
pub fn bind(
    file: RuleFile,
    types: &dyn PropertyTypes,
    diagnostics: &mut Diagnostics,
) -> CompileResult<RuleModule> {
    let entity_is_unique = types.is_unique(&file.entity, Span::NONE)?;
    let mut bindings = IndexMap::new();

    for decl in file.bindings {
        if is_keyword(&decl.alias) {
            return Err(CompileError::new(
                ErrorKind::ReservedName,
                decl.span,
                format!("alias '{}' shadows a reserved identifier", decl.alias),
            ));
        }

        let info = types.property(&decl.entity, &decl.property, decl.span)?;
        let owned = decl.entity == file.entity;
        let is_array = match decl.shape {
            None => owned && info.per_instance,
            Some(Shape::Single) => false,
            Some(Shape::Array) if !info.per_instance => {
                warn!(alias = %decl.alias, "ARRAY binding on a scalar property");
                diagnostics.warn(
                    ErrorKind::InvalidValue,
                    decl.span,
                    format!(
                        "'{}.{}' is not per-instance; '{}' is bound as a scalar",
                        decl.entity, decl.property, decl.alias
                    ),
                );
                false
            }
            Some(Shape::Array) => {
                if !owned {
                    warn!(alias = %decl.alias, entity = %decl.entity, "cross-entity ARRAY binding");
                    diagnostics.warn(
                        ErrorKind::Structure,
                        decl.span,
                        format!(
                            "'{}' indexes '{}' with the loop variable of '{}'",
                            decl.alias, decl.entity, file.entity
                        ),
                    );
                }
                true
            }
        };

        bindings.insert(
            decl.alias.clone(),
            Binding {
                alias: decl.alias,
                entity: decl.entity,
                property: decl.property,
                host_type: info.host_type,
                per_instance: info.per_instance,
                is_array,
                access: decl.access,
                span: decl.span,
            },
        );
    }

    debug!(
        module = %file.name,
        entity = %file.entity,
        bindings = bindings.len(),
        rules = file.rules.len(),
        "rule module bound"
    );

    Ok(RuleModule {
        entity_storage: file.entity.to_lowercase(),
        name: file.name,
        entity: file.entity,
        entity_is_unique,
        bindings,
        rules: file.rules,
    })
}

/// Emit the C source of a bound rule module.
pub fn emit_module(module: &RuleModule, diagnostics: &mut Diagnostics) -> CompileResult<String> {
    let system = module.system_name();
    let transpiler = Transpiler::new(&module.bindings);
    let mut out = String::new();

    push_line(&mut out, 0, &format!("// MODULE: {}", system));
    push_line(&mut out, 0, &format!("// Rules for entity {}", module.entity));
    for include in MODULE_INCLUDES {
        push_line(&mut out, 0, &format!("#include {}", include));
    }
    out.push('\n');

    push_line(
        &mut out,
        0,
        &format!("void system_{}_range(World* w, int start, int end) {{", system),
    );
    for binding in module.bindings.values() {
        push_line(&mut out, 1, &unpack(binding));
    }
    if !module.bindings.is_empty() {
        out.push('\n');
    }

    push_line(&mut out, 1, "for (int i = start; i < end; i++) {");
    if let Some(guard) = active_guard(module) {
        push_line(&mut out, 2, &format!("if (!{}) continue;", guard));
    }
    for rule in &module.rules {
        out.push('\n');
        emit_rule(&mut out, rule, module, &transpiler, diagnostics)?;
    }
    push_line(&mut out, 1, "}");
    out.push_str("}\n\n");

    let bound = if module.entity_is_unique {
        "1".to_string()
    } else {
        format!("w->{}._active", module.entity_storage)
    };
    push_line(&mut out, 0, &format!("void system_{}(World* w) {{", system));
    push_line(
        &mut out,
        1,
        &format!("system_{}_range(w, 0, {});", system, bound),
    );
    out.push_str("}\n");

    Ok(out)
}

/// Append `text` at `depth` indentation levels.
fn push_line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

/// Local pointer declaration for one binding.
fn unpack(binding: &Binding) -> String {
    let storage = binding.entity.to_lowercase();
    let source = if binding.is_array {
        format!("w->{}.{}", storage, binding.property)
    } else if binding.per_instance {
        format!("&w->{}.{}[0]", storage, binding.property)
    } else {
        format!("&w->{}.{}", storage, binding.property)
    };
    let qualifier = if binding.access.can_write() || binding.host_type.starts_with("const ") {
        ""
    } else {
        "const "
    };
    format!(
        "{}{}* {} = {};",
        qualifier, binding.host_type, binding.alias, source
    )
}

/// Access form of the owner's `active` flag, when bound.
fn active_guard(module: &RuleModule) -> Option<String> {
    module
        .bindings
        .values()
        .find(|b| b.entity == module.entity && b.property == "active")
        .map(access)
}

fn emit_rule(
    out: &mut String,
    rule: &Rule,
    module: &RuleModule,
    transpiler: &Transpiler<'_>,
    diagnostics: &mut Diagnostics,
) -> CompileResult<()> {
    let guard = if rule.conditions.is_empty() {
        "true".to_string()
    } else {
        let mut parts = Vec::with_capacity(rule.conditions.len());
        for condition in &rule.conditions {
            parts.push(format!("({})", transpiler.expr(&condition.expr, condition.span)?));
        }
        parts.join(" && ")
    };

    push_line(out, 2, &format!("// rule: {}", rule.name));
    push_line(out, 2, &format!("if ({}) {{", guard));
    for line in &rule.actions {
        let statement = action(line, rule, module, transpiler, diagnostics)?;
        push_line(out, 3, &statement);
    }
    push_line(out, 2, "}");
    Ok(())
}

fn action(
    line: &ActionLine,
    rule: &Rule,
    module: &RuleModule,
    transpiler: &Transpiler<'_>,
    diagnostics: &mut Diagnostics,
) -> CompileResult<String> {
    let statement = match &line.action {
        Action::Set {
            target,
            member,
            value,
        } => {
            let value = transpiler.expr(value, line.span)?;
            match module.bindings.get(target) {
                Some(binding) if !binding.access.can_write() => {
                    let message = format!(
                        "rule '{}' assigns '{}', which is bound {}",
                        rule.name, target, binding.access
                    );
                    warn!(module = %module.name, alias = %target, "write through read-only binding");
                    diagnostics.warn(ErrorKind::AccessViolation, line.span, message.clone());
                    format!("#error \"{}\"", message.replace('"', "'"))
                }
                Some(binding) => format!("{}{} = {};", access(binding), member, value),
                None => {
                    diagnostics.warn(
                        ErrorKind::UndefinedProperty,
                        line.span,
                        format!("'{}' is not a bound alias; assigned verbatim", target),
                    );
                    format!("{}{} = {};", target, member, value)
                }
            }
        }
        Action::Emit { event, args } => {
            if args.len() > EMIT_ARITY {
                warn!(event = %event, args = args.len(), "extra EMIT arguments dropped");
                diagnostics.warn(
                    ErrorKind::InvalidValue,
                    line.span,
                    format!(
                        "EMIT '{}' takes at most {} arguments, {} given; extras are dropped",
                        event,
                        EMIT_ARITY,
                        args.len()
                    ),
                );
            }
            let mut values = Vec::with_capacity(EMIT_ARITY);
            for arg in args.iter().take(EMIT_ARITY) {
                values.push(transpiler.expr(arg, line.span)?);
            }
            values.resize(EMIT_ARITY, "0".to_string());
            let event = if event.starts_with('"') {
                event.clone()
            } else {
                format!("\"{}\"", event)
            };
            format!("emit_custom_event({}, {});", event, values.join(", "))
        }
        Action::Destroy => "script_destroy_self(i);".to_string(),
        Action::Expr(expr) => format!("{};", transpiler.expr(expr, line.span)?),
    };
    Ok(statement)
}
