//! Requirement markers embedded in module comments.
//!
//! ```c
//! // REQ: Ball.position as pos
//! // REQ: World.gravity
//! // REQ_STRUCT: Ball as balls
//! // REQ_LIB: <raymath.h>
//! ```
//!
//! Only `//` comments are scanned. A comment that starts with a marker
//! keyword must match its grammar exactly; anything else is a
//! [`ErrorKind::MalformedMarker`] rather than a silently ignored line.

use simforge_model::{CompileError, CompileResult, ErrorKind, Span, is_identifier};

/// One parsed marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// `REQ: <Entity>.<property> [as <alias>]`
    Property {
        entity: String,
        property: String,
        alias: Option<String>,
    },
    /// `REQ_STRUCT: <Entity> [as <alias>]`
    Struct { entity: String, alias: Option<String> },
    /// `REQ_LIB: <header>`, stored without `<>`, quotes or `.h`
    Library(String),
}

/// A marker and the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub marker: Marker,
    pub span: Span,
}

// Longer keywords first so `REQ:` never shadows them.
const KEYWORDS: &[&str] = &["REQ_STRUCT:", "REQ_LIB:", "REQ:"];

/// Collect every marker in a module source, in text order.
pub fn scan_markers(source: &str) -> CompileResult<Vec<Located>> {
    let mut markers = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let Some(start) = line.find("//") else {
            continue;
        };
        let comment = line[start + 2..].trim();
        let Some(keyword) = KEYWORDS.iter().find(|k| comment.starts_with(**k)) else {
            continue;
        };
        let span = Span::from_index(index);
        let body = comment[keyword.len()..].trim();
        let marker = match *keyword {
            "REQ:" => parse_property(body),
            "REQ_STRUCT:" => parse_struct(body),
            _ => parse_library(body),
        };
        let Some(marker) = marker else {
            return Err(CompileError::new(
                ErrorKind::MalformedMarker,
                span,
                format!("malformed marker '{}'", comment),
            )
            .with_note(usage(keyword).to_string()));
        };
        markers.push(Located { marker, span });
    }
    Ok(markers)
}

fn usage(keyword: &str) -> &'static str {
    match keyword {
        "REQ:" => "usage: // REQ: <Entity>.<property> [as <alias>]",
        "REQ_STRUCT:" => "usage: // REQ_STRUCT: <Entity> [as <alias>]",
        _ => "usage: // REQ_LIB: <header>",
    }
}

/// Split `<target> [as <alias>]`.
fn target_and_alias(body: &str) -> Option<(&str, Option<&str>)> {
    let words: Vec<&str> = body.split_whitespace().collect();
    match words[..] {
        [target] => Some((target, None)),
        [target, keyword, alias] if keyword == "as" && is_identifier(alias) => {
            Some((target, Some(alias)))
        }
        _ => None,
    }
}

fn parse_property(body: &str) -> Option<Marker> {
    let (target, alias) = target_and_alias(body)?;
    let (entity, property) = target.split_once('.')?;
    if !is_identifier(entity) || !is_identifier(property) {
        return None;
    }
    Some(Marker::Property {
        entity: entity.to_string(),
        property: property.to_string(),
        alias: alias.map(str::to_string),
    })
}

fn parse_struct(body: &str) -> Option<Marker> {
    let (entity, alias) = target_and_alias(body)?;
    if !is_identifier(entity) {
        return None;
    }
    Some(Marker::Struct {
        entity: entity.to_string(),
        alias: alias.map(str::to_string),
    })
}

fn parse_library(body: &str) -> Option<Marker> {
    let [name] = body.split_whitespace().collect::<Vec<_>>()[..] else {
        return None;
    };
    let name = name.trim_start_matches(['<', '"']).trim_end_matches(['>', '"']);
    let name = name.strip_suffix(".h").unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(Marker::Library(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(source: &str) -> Vec<Marker> {
        scan_markers(source)
            .unwrap()
            .into_iter()
            .map(|located| located.marker)
            .collect()
    }

    #[test]
    fn test_all_marker_kinds() {
        let source = "\
// REQ: Ball.position as pos
int unrelated; // REQ: World.gravity
// REQ_STRUCT: Ball as balls
//REQ_STRUCT: World
// REQ_LIB: <raymath.h>
// REQ_LIB: \"vendor/noise.h\"
";
        assert_eq!(
            markers(source),
            vec![
                Marker::Property {
                    entity: "Ball".to_string(),
                    property: "position".to_string(),
                    alias: Some("pos".to_string()),
                },
                Marker::Property {
                    entity: "World".to_string(),
                    property: "gravity".to_string(),
                    alias: None,
                },
                Marker::Struct {
                    entity: "Ball".to_string(),
                    alias: Some("balls".to_string()),
                },
                Marker::Struct {
                    entity: "World".to_string(),
                    alias: None,
                },
                Marker::Library("raymath".to_string()),
                Marker::Library("vendor/noise".to_string()),
            ]
        );
    }

    #[test]
    fn test_plain_comments_are_ignored() {
        let source = "// Moves every ball.\n/* REQ: not.scanned */\nint REQ = 0;\n";
        assert!(markers(source).is_empty());
    }

    #[test]
    fn test_malformed_markers_fail_with_line() {
        for (line, source) in [
            (1, "// REQ: Ball"),
            (2, "\n// REQ: Ball.position pos"),
            (1, "// REQ: Ball.position as"),
            (1, "// REQ_STRUCT: Ball.position"),
            (1, "// REQ_STRUCT: Ball as 9lives"),
            (1, "// REQ_LIB:"),
            (1, "// REQ_LIB: a b"),
        ] {
            let error = scan_markers(source).unwrap_err();
            assert_eq!(error.kind, ErrorKind::MalformedMarker, "{}", source);
            assert_eq!(error.span, Span::line(line), "{}", source);
            assert!(error.notes[0].starts_with("usage:"));
        }
    }
}
