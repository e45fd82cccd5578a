//! Section headers: lines of a world spec that end in `:`.
//!
//! The set of section kinds is closed, so a header is classified once into a
//! [`Section`] and every consumer matches on it exhaustively.

use simforge_model::{CompileError, CompileResult, ErrorKind, Phase, Span, is_identifier};

/// A classified section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// `UNIQUE <name>:`
    UniqueDecl { name: String },
    /// `GENERIC <name> count=<N>:`
    GenericDecl { name: String, count: u32 },
    /// `SHARED <entity>:`
    SharedDecl { entity: String },
    /// `<PHASE>:` opening a global phase.
    PhaseHeader(Phase),
}

impl Section {
    /// Classify the tag of a header line (the text before the trailing `:`).
    pub fn parse(tag: &str, span: Span) -> CompileResult<Section> {
        let tag = tag.trim();
        if let Ok(phase) = tag.parse::<Phase>() {
            return Ok(Section::PhaseHeader(phase));
        }

        let parts: Vec<&str> = tag.split_whitespace().collect();
        match parts.first().copied() {
            Some("UNIQUE") => {
                let [_, name] = parts[..] else {
                    return Err(malformed(span, "UNIQUE <name>:", tag));
                };
                Ok(Section::UniqueDecl {
                    name: entity_name(name, span)?,
                })
            }
            Some("GENERIC") => {
                let [_, name, count] = parts[..] else {
                    return Err(malformed(span, "GENERIC <name> count=<N>:", tag));
                };
                let Some(count) = count.strip_prefix("count=") else {
                    return Err(malformed(span, "GENERIC <name> count=<N>:", tag));
                };
                Ok(Section::GenericDecl {
                    name: entity_name(name, span)?,
                    count: parse_count(name, count, span)?,
                })
            }
            Some("SHARED") => {
                let [_, entity] = parts[..] else {
                    return Err(malformed(span, "SHARED <entity>:", tag));
                };
                Ok(Section::SharedDecl {
                    entity: entity.to_string(),
                })
            }
            _ => Err(CompileError::new(
                ErrorKind::UnknownSection,
                span,
                format!("unknown section '{}'", tag),
            )
            .with_note(
                "expected UNIQUE, GENERIC, SHARED or one of PRE_START, START, LOOP, POST_LOOP, END"
                    .to_string(),
            )),
        }
    }
}

fn malformed(span: Span, usage: &str, tag: &str) -> CompileError {
    CompileError::new(
        ErrorKind::MalformedDirective,
        span,
        format!("malformed section header '{}:'", tag),
    )
    .with_note(format!("usage: {}", usage))
}

fn entity_name(name: &str, span: Span) -> CompileResult<String> {
    if !is_identifier(name) {
        return Err(CompileError::new(
            ErrorKind::Syntax,
            span,
            format!("'{}' is not a valid entity name", name),
        ));
    }
    Ok(name.to_string())
}

fn parse_count(entity: &str, count: &str, span: Span) -> CompileResult<u32> {
    let invalid = |message: String| CompileError::new(ErrorKind::InvalidCapacity, span, message);
    let value: i64 = count.parse().map_err(|_| {
        invalid(format!(
            "count of '{}' must be an integer, got '{}'",
            entity, count
        ))
    })?;
    if value <= 0 {
        return Err(invalid(format!(
            "count of '{}' must be > 0, got {}",
            entity, value
        )));
    }
    u32::try_from(value)
        .map_err(|_| invalid(format!("count of '{}' is too large: {}", entity, value)))
}
