//! Render-sync (`.gspec`) parser.
//!
//! A render-sync file is INI-style: `[section]` headers followed by
//! `key = value` (or `key: value`) pairs, with `#` and `;` comments. It binds
//! the properties of one GENERIC entity to the instanced renderer:
//!
//! ```text
//! [gcomponent CubeVisuals]
//! entity = Cube
//!
//! [visibility]
//! when = active
//! else = alpha_zero
//!
//! [transform]
//! update_when = is_awake
//! type = translation
//! from = position.x, position.y, position.z
//!
//! [color]
//! type = hex_to_rgba
//! from = color
//! ```
//!
//! Properties are checked against the entity's expanded per-instance fields,
//! so `position.x` names the SOA component field `position_x`.

use indexmap::IndexMap;
use simforge_model::render::{
    ColorKind, ColorSync, DEFAULT_BUFFER_PROPERTY, DEFAULT_MODEL_PROPERTY, DEFAULT_SUPPRESSED,
    HiddenStyle, TransformKind, TransformSync, VisibilitySync,
};
use simforge_model::{
    CompileError, CompileResult, Diagnostics, Entity, ErrorKind, Phase, RenderSync, Span,
    SpecModel,
};
use tracing::{debug, warn};

const COMPONENT_PREFIX: &str = "gcomponent";

/// One `key = value` pair with the line it came from.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    span: Span,
}

#[derive(Debug, Clone)]
struct IniSection {
    span: Span,
    entries: IndexMap<String, Entry>,
}

impl IniSection {
    fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key).filter(|entry| !entry.value.is_empty())
    }
}

/// Split INI text into named sections.
fn parse_ini(source: &str) -> CompileResult<IndexMap<String, IniSection>> {
    let mut sections: IndexMap<String, IniSection> = IndexMap::new();
    let mut current: Option<String> = None;

    for (index, raw) in source.lines().enumerate() {
        let span = Span::from_index(index);
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let Some(name) = header.strip_suffix(']') else {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    span,
                    format!("unterminated section header '{}'", line),
                ));
            };
            let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
            if sections.contains_key(&name) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateName,
                    span,
                    format!("section '[{}]' appears twice", name),
                ));
            }
            sections.insert(
                name.clone(),
                IniSection {
                    span,
                    entries: IndexMap::new(),
                },
            );
            current = Some(name);
            continue;
        }

        let Some((key, value)) = line.split_once(['=', ':']) else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("expected 'key = value', got '{}'", line),
            ));
        };
        let Some(section) = current.as_ref().and_then(|name| sections.get_mut(name)) else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("'{}' appears before any section header", line),
            ));
        };
        section.entries.insert(
            key.trim().to_lowercase(),
            Entry {
                value: value.trim().to_string(),
                span,
            },
        );
    }
    Ok(sections)
}

/// Parse and validate a render-sync description against a finalized model.
///
/// # Parameters
/// - `source`: text of the `.gspec` file
/// - `model`: the spec model whose entity is being bound
/// - `diagnostics`: sink for non-fatal warnings
///
/// # Returns
/// - `Ok(RenderSync)` ready to be attached with [`apply_render_sync`]
/// - `Err(CompileError)` on the first fatal problem
pub fn parse_render_sync(
    source: &str,
    model: &SpecModel,
    diagnostics: &mut Diagnostics,
) -> CompileResult<RenderSync> {
    let sections = parse_ini(source)?;
    let mut checker = Checker { model, diagnostics };

    let mut components = sections
        .iter()
        .filter_map(|(name, section)| {
            let rest = name.strip_prefix(COMPONENT_PREFIX)?;
            Some((rest.trim(), section))
        })
        .filter(|(rest, _)| !rest.is_empty());
    let Some((component, header)) = components.next() else {
        return Err(CompileError::new(
            ErrorKind::RenderSync,
            Span::NONE,
            "no '[gcomponent <Name>]' section found".to_string(),
        ));
    };
    if let Some((extra, section)) = components.next() {
        return Err(CompileError::new(
            ErrorKind::RenderSync,
            section.span,
            format!(
                "only one gcomponent is supported; '{}' follows '{}'",
                extra, component
            ),
        ));
    }

    let Some(entity_entry) = header.get("entity") else {
        return Err(CompileError::new(
            ErrorKind::RenderSync,
            header.span,
            format!("'entity' not set in '[gcomponent {}]'", component),
        ));
    };
    let Some(entity) = model.entity(&entity_entry.value) else {
        return Err(CompileError::new(
            ErrorKind::UndefinedEntity,
            entity_entry.span,
            format!("render-sync entity '{}' is not declared", entity_entry.value),
        ));
    };
    if !entity.kind.is_generic() {
        return Err(CompileError::new(
            ErrorKind::RenderSync,
            entity_entry.span,
            format!(
                "render-sync entity '{}' must be GENERIC to be drawn instanced",
                entity.name
            ),
        ));
    }

    let suppress = match header.get("suppress") {
        Some(entry) => entry
            .value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_SUPPRESSED.iter().map(|s| s.to_string()).collect(),
    };

    let visibility = match sections.get("visibility") {
        Some(section) => Some(checker.visibility(entity, section)?),
        None => None,
    };
    let transform = match sections.get("transform") {
        Some(section) => Some(checker.transform(entity, section)?),
        None => None,
    };
    let color = match sections.get("color") {
        Some(section) => Some(checker.color(entity, section)?),
        None => None,
    };

    for (name, section) in &sections {
        let known = name.starts_with(COMPONENT_PREFIX)
            || matches!(name.as_str(), "visibility" | "transform" | "color");
        if !known {
            checker.warn(
                ErrorKind::UnknownSection,
                section.span,
                format!("unknown render-sync section '[{}]' ignored", name),
            );
        }
    }

    debug!(component, entity = %entity.name, "render sync parsed");
    Ok(RenderSync {
        component: component.to_string(),
        entity: entity.name.clone(),
        model: header
            .get("model")
            .map_or(DEFAULT_MODEL_PROPERTY.to_string(), |e| e.value.clone()),
        buffer: header
            .get("buffer")
            .map_or(DEFAULT_BUFFER_PROPERTY.to_string(), |e| e.value.clone()),
        suppress,
        visibility,
        transform,
        color,
    })
}

/// Attach a render-sync description to the model and drop the hand-written
/// renderers it replaces from the global LOOP phase.
pub fn apply_render_sync(model: &mut SpecModel, sync: RenderSync) {
    let loop_systems = model.globals.get_mut(Phase::Loop);
    loop_systems.retain(|system| {
        let keep = !sync.suppresses(system);
        if !keep {
            debug!(system = %system, "renderer suppressed by render sync");
        }
        keep
    });
    model.render = Some(sync);
}

struct Checker<'a> {
    model: &'a SpecModel,
    diagnostics: &'a mut Diagnostics,
}

impl Checker<'_> {
    fn warn(&mut self, kind: ErrorKind, span: Span, message: String) {
        warn!(%span, "{}", message);
        self.diagnostics.warn(kind, span, message);
    }

    /// Resolve `name` (or `base.component`) to a per-instance field of `entity`.
    fn field(&self, entity: &Entity, name: &str, key: &str, span: Span) -> CompileResult<String> {
        let field = name.replace('.', "_");
        if entity.fields.contains(&field) {
            return Ok(field);
        }
        Err(CompileError::new(
            ErrorKind::UndefinedProperty,
            span,
            format!(
                "property '{}.{}' used by '{}' is not declared",
                entity.name, name, key
            ),
        ))
    }

    fn expect_bool(&mut self, entity: &Entity, field: &str, key: &str, span: Span) {
        let is_bool = entity
            .fields
            .get(field)
            .is_some_and(|var| self.model.types.is_bool(&var.ty));
        if !is_bool {
            self.warn(
                ErrorKind::RenderSync,
                span,
                format!(
                    "'{}.{}' used by '{}' is not boolean",
                    entity.name, field, key
                ),
            );
        }
    }

    fn required<'s>(
        &self,
        section: &'s IniSection,
        name: &str,
        key: &str,
    ) -> CompileResult<&'s Entry> {
        section.get(key).ok_or_else(|| {
            CompileError::new(
                ErrorKind::RenderSync,
                section.span,
                format!("'{}' not set in '[{}]'", key, name),
            )
        })
    }

    fn visibility(&mut self, entity: &Entity, section: &IniSection) -> CompileResult<VisibilitySync> {
        let when = self.required(section, "visibility", "when")?;
        let field = self.field(entity, &when.value, "visibility.when", when.span)?;
        self.expect_bool(entity, &field, "visibility.when", when.span);

        if let Some(otherwise) = section.get("else") {
            if otherwise.value != "alpha_zero" {
                self.warn(
                    ErrorKind::RenderSync,
                    otherwise.span,
                    format!(
                        "unknown visibility 'else' value '{}', using 'alpha_zero'",
                        otherwise.value
                    ),
                );
            }
        }
        Ok(VisibilitySync {
            when: field,
            otherwise: HiddenStyle::AlphaZero,
        })
    }

    fn transform(&mut self, entity: &Entity, section: &IniSection) -> CompileResult<TransformSync> {
        let kind = self.required(section, "transform", "type")?;
        let from = self.required(section, "transform", "from")?;
        if kind.value != "translation" {
            return Err(CompileError::new(
                ErrorKind::RenderSync,
                kind.span,
                format!(
                    "unknown transform type '{}', expected 'translation'",
                    kind.value
                ),
            ));
        }

        let names: Vec<&str> = from.value.split(',').map(str::trim).collect();
        let [x, y, z] = names[..] else {
            return Err(CompileError::new(
                ErrorKind::RenderSync,
                from.span,
                format!(
                    "transform 'from' needs exactly three properties, got '{}'",
                    from.value
                ),
            ));
        };
        let axes = [
            self.field(entity, x, "transform.from", from.span)?,
            self.field(entity, y, "transform.from", from.span)?,
            self.field(entity, z, "transform.from", from.span)?,
        ];

        let update_when = match section.get("update_when") {
            Some(entry) => {
                let field = self.field(entity, &entry.value, "transform.update_when", entry.span)?;
                self.expect_bool(entity, &field, "transform.update_when", entry.span);
                Some(field)
            }
            None => None,
        };

        Ok(TransformSync {
            update_when,
            kind: TransformKind::Translation,
            axes,
        })
    }

    fn color(&mut self, entity: &Entity, section: &IniSection) -> CompileResult<ColorSync> {
        match section.get("type") {
            None => self.warn(
                ErrorKind::RenderSync,
                section.span,
                "'type' not set in '[color]', assuming 'hex_to_rgba'".to_string(),
            ),
            Some(kind) if kind.value != "hex_to_rgba" => {
                return Err(CompileError::new(
                    ErrorKind::RenderSync,
                    kind.span,
                    format!("unknown color type '{}', expected 'hex_to_rgba'", kind.value),
                ));
            }
            Some(_) => {}
        }

        let from = self.required(section, "color", "from")?;
        let field = self.field(entity, &from.value, "color.from", from.span)?;
        let is_integer = entity
            .fields
            .get(&field)
            .is_some_and(|var| self.model.types.is_integer(&var.ty));
        if !is_integer {
            self.warn(
                ErrorKind::RenderSync,
                from.span,
                format!(
                    "'{}.{}' used by 'color.from' is not an integer",
                    entity.name, field
                ),
            );
        }
        Ok(ColorSync {
            kind: ColorKind::HexToRgba,
            from: field,
        })
    }
}
