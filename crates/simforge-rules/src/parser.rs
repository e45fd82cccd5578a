//! Rule-file parser.
//!
//! ```text
//! MODULE_ENTITY: Particle
//! REQ: Particle.active as active
//! REQ: Particle.pos_y as y READ_WRITE
//! REQ: World.gravity as g
//!
//! RULE: fall
//! CONDITIONS:
//!   WHEN y > 0
//! ACTIONS:
//!   SET y = y - g
//!
//! RULE: land
//! CONDITIONS:
//!   WHEN y <= 0
//! ACTIONS:
//!   EMIT landed y
//!   DESTROY
//! ```
//!
//! Keywords are case-insensitive. Lines starting with `#` or `//` are
//! comments.

use crate::ast::{Access, Action, ActionLine, BindingDecl, Condition, Rule, RuleFile, Shape};
use simforge_model::{CompileError, CompileResult, ErrorKind, Span, is_identifier};
use std::collections::HashSet;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Header,
    RuleHeader,
    Conditions,
    Actions,
}

/// Parse one rule file.
///
/// # Parameters
/// - `name`: module name, normally the file stem
/// - `source`: text of the rule file
pub fn parse_rule_file(name: &str, source: &str) -> CompileResult<RuleFile> {
    if !is_identifier(name) {
        return Err(CompileError::new(
            ErrorKind::Syntax,
            Span::NONE,
            format!("rule module name '{}' is not a valid identifier", name),
        ));
    }

    let mut entity: Option<String> = None;
    let mut bindings: Vec<BindingDecl> = Vec::new();
    let mut aliases: HashSet<String> = HashSet::new();
    let mut rules: Vec<Rule> = Vec::new();
    let mut mode = Mode::Header;

    for (index, raw) in source.lines().enumerate() {
        let span = Span::from_index(index);
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let upper = line.to_ascii_uppercase();

        if upper == "CONDITIONS:" || upper == "ACTIONS:" {
            if rules.is_empty() {
                return Err(CompileError::new(
                    ErrorKind::Structure,
                    span,
                    format!("'{}' outside of a RULE block", line),
                ));
            }
            mode = if upper == "CONDITIONS:" {
                Mode::Conditions
            } else {
                Mode::Actions
            };
            continue;
        }

        if let Some(rest) = strip_keyword(line, "RULE:") {
            if rest.is_empty() {
                return Err(CompileError::new(
                    ErrorKind::MalformedDirective,
                    span,
                    "RULE: needs a name".to_string(),
                ));
            }
            trace!(rule = rest, "rule opened");
            rules.push(Rule {
                name: rest.to_string(),
                conditions: Vec::new(),
                actions: Vec::new(),
                span,
            });
            mode = Mode::RuleHeader;
            continue;
        }

        match mode {
            Mode::Header => {
                if let Some(rest) = strip_keyword(line, "MODULE_ENTITY:") {
                    if entity.is_some() {
                        return Err(CompileError::new(
                            ErrorKind::DuplicateName,
                            span,
                            "MODULE_ENTITY: declared twice".to_string(),
                        ));
                    }
                    if !is_identifier(rest) {
                        return Err(CompileError::new(
                            ErrorKind::MalformedDirective,
                            span,
                            format!("malformed MODULE_ENTITY: '{}'", line),
                        )
                        .with_note("usage: MODULE_ENTITY: <Entity>".to_string()));
                    }
                    entity = Some(rest.to_string());
                } else if let Some(rest) = strip_keyword(line, "REQ:") {
                    let decl = parse_binding(rest, line, span)?;
                    if !aliases.insert(decl.alias.clone()) {
                        return Err(CompileError::new(
                            ErrorKind::DuplicateName,
                            span,
                            format!("alias '{}' is bound twice", decl.alias),
                        ));
                    }
                    bindings.push(decl);
                } else {
                    return Err(CompileError::new(
                        ErrorKind::Syntax,
                        span,
                        format!("unexpected line in rule header: '{}'", line),
                    )
                    .with_note("expected MODULE_ENTITY:, REQ: or RULE:".to_string()));
                }
            }
            Mode::RuleHeader => {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    span,
                    format!("expected CONDITIONS: or ACTIONS:, got '{}'", line),
                ));
            }
            Mode::Conditions => {
                let condition = parse_condition(line, span)?;
                if let Some(rule) = rules.last_mut() {
                    rule.conditions.push(condition);
                }
            }
            Mode::Actions => {
                let action = parse_action(line, span)?;
                if let Some(rule) = rules.last_mut() {
                    rule.actions.push(action);
                }
            }
        }
    }

    let Some(entity) = entity else {
        return Err(CompileError::new(
            ErrorKind::Structure,
            Span::NONE,
            format!("rule module '{}' has no MODULE_ENTITY:", name),
        ));
    };

    Ok(RuleFile {
        name: name.to_string(),
        entity,
        bindings,
        rules,
    })
}

/// Strip a case-insensitive keyword prefix and the whitespace after it.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        Some(line[keyword.len()..].trim())
    } else {
        None
    }
}

/// `Entity.prop as alias [ARRAY|SINGLE] [READ|WRITE|READ_WRITE]`
fn parse_binding(rest: &str, line: &str, span: Span) -> CompileResult<BindingDecl> {
    let malformed = || {
        CompileError::new(
            ErrorKind::MalformedDirective,
            span,
            format!("malformed binding '{}'", line),
        )
        .with_note(
            "usage: REQ: <Entity>.<property> as <alias> [ARRAY|SINGLE] [READ|WRITE|READ_WRITE]"
                .to_string(),
        )
    };

    let parts: Vec<&str> = rest.split_whitespace().collect();
    let [path, keyword, alias, options @ ..] = &parts[..] else {
        return Err(malformed());
    };
    let Some((entity, property)) = path.split_once('.') else {
        return Err(malformed());
    };
    if !keyword.eq_ignore_ascii_case("as")
        || !is_identifier(entity)
        || !is_identifier(property)
        || !is_identifier(alias)
    {
        return Err(malformed());
    }

    let mut shape = None;
    let mut access = None;
    for option in options {
        if let Ok(value) = option.parse::<Shape>() {
            if shape.replace(value).is_some() {
                return Err(malformed());
            }
        } else if let Ok(value) = option.parse::<Access>() {
            if access.replace(value).is_some() {
                return Err(malformed());
            }
        } else {
            return Err(malformed());
        }
    }

    Ok(BindingDecl {
        entity: entity.to_string(),
        property: property.to_string(),
        alias: alias.to_string(),
        shape,
        access: access.unwrap_or_default(),
        span,
    })
}

/// One condition line: `[WHEN|AND] [NOT] <expr>`.
fn parse_condition(line: &str, span: Span) -> CompileResult<Condition> {
    let mut expr = line;
    for keyword in ["WHEN", "AND"] {
        if let Some(rest) = strip_word(expr, keyword) {
            expr = rest;
            break;
        }
    }
    if strip_word(expr, "OR").is_some() {
        return Err(CompileError::new(
            ErrorKind::Syntax,
            span,
            format!("OR is not supported in conditions: '{}'", line),
        )
        .with_note("conditions of a rule are AND-ed; split the alternatives into separate rules".to_string()));
    }
    let expr = match strip_word(expr, "NOT") {
        Some(rest) => format!("!({})", rest),
        None => expr.to_string(),
    };
    if expr.is_empty() {
        return Err(CompileError::new(
            ErrorKind::Syntax,
            span,
            format!("empty condition '{}'", line),
        ));
    }
    Ok(Condition { expr, span })
}

/// Strip a leading case-insensitive word followed by whitespace.
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let (head, rest) = text.split_once(char::is_whitespace)?;
    head.eq_ignore_ascii_case(word).then(|| rest.trim_start())
}

/// Split `alias.a->b` into the alias and its member path.
///
/// Every path segment must be `.ident` or `->ident`.
fn split_target(target: &str) -> Option<(&str, &str)> {
    let end = target.find(['.', '-']).unwrap_or(target.len());
    let (alias, member) = target.split_at(end);
    if !is_identifier(alias) {
        return None;
    }
    let mut rest = member;
    while !rest.is_empty() {
        let after = rest
            .strip_prefix("->")
            .or_else(|| rest.strip_prefix('.'))?;
        let next = after.find(['.', '-']).unwrap_or(after.len());
        if !is_identifier(&after[..next]) {
            return None;
        }
        rest = &after[next..];
    }
    Some((alias, member))
}

fn parse_action(line: &str, span: Span) -> CompileResult<ActionLine> {
    let action = if line.eq_ignore_ascii_case("DESTROY") {
        Action::Destroy
    } else if let Some(rest) = strip_word(line, "SET") {
        let Some((target, value)) = rest.split_once('=') else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("SET without '=': '{}'", line),
            ));
        };
        let value = value.trim();
        let Some((target, member)) = split_target(target.trim()).filter(|_| !value.is_empty())
        else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("malformed SET '{}'", line),
            )
            .with_note("usage: SET <alias>[.member] = <expression>".to_string()));
        };
        Action::Set {
            target: target.to_string(),
            member: member.to_string(),
            value: value.to_string(),
        }
    } else if let Some(rest) = strip_word(line, "EMIT").or_else(|| {
        line.eq_ignore_ascii_case("EMIT").then_some("")
    }) {
        let mut words = rest.split_whitespace();
        let Some(event) = words.next() else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                "EMIT needs an event name".to_string(),
            ));
        };
        Action::Emit {
            event: event.to_string(),
            args: words.map(str::to_string).collect(),
        }
    } else {
        Action::Expr(line.trim_end_matches(';').to_string())
    };
    Ok(ActionLine { action, span })
}
