//! Line-oriented world spec parser.
//!
//! The parser walks the spec one trimmed line at a time and keeps four
//! pieces of state: the open scope (global phase, entity and its active
//! phase, or a SHARED block) and the pending system whose `SYSTEM`
//! configuration block is still accumulating.
//!
//! Directives (`SOA`, `[TYPE ..]`, `BACKEND`, `CONFIG`, `SYSTEM`, `PHASE`,
//! `MODE`, `PRIORITY`, `ENTITY`) are recognized regardless of scope. A
//! pending system is flushed into the schedule when the next `SYSTEM`
//! directive or section header appears, or at end of input.
//!
//! After the last line the model is finalized: every phase list is
//! stable-sorted by priority, SOA variables are expanded and the mandatory
//! UNIQUE `World` entity is checked.

use crate::section::Section;
use simforge_model::{
    ACTIVE_FIELD, CAPACITY_FIELD, CompileError, CompileResult, Diagnostics, Entity, EntityKind,
    ErrorKind, ExecMode, Phase, SoaType, Span, SpecModel, Variable, WORLD_ENTITY, is_identifier,
};
use tracing::{debug, trace, warn};

/// Parse a world spec into a finalized model.
///
/// # Parameters
/// - `source`: full text of the spec
/// - `diagnostics`: sink receiving every non-fatal warning
///
/// # Returns
/// - `Ok(SpecModel)` with sorted phases and expanded SOA fields
/// - `Err(CompileError)` on the first fatal problem
pub fn parse_spec(source: &str, diagnostics: &mut Diagnostics) -> CompileResult<SpecModel> {
    let mut parser = SpecParser::new(diagnostics);
    for (index, raw) in source.lines().enumerate() {
        parser.line(raw.trim(), Span::from_index(index))?;
    }
    parser.finish()
}

/// Where plain lines currently go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    /// Before the first section header.
    Top,
    Global(Phase),
    Entity { name: String, phase: Option<Phase> },
    Shared { entity: String },
}

/// A `SYSTEM` block whose placement is still being configured.
#[derive(Debug)]
struct PendingSystem {
    name: String,
    phase: Option<Phase>,
    entity: Option<String>,
    span: Span,
}

struct SpecParser<'d> {
    model: SpecModel,
    diagnostics: &'d mut Diagnostics,
    scope: Scope,
    pending: Option<PendingSystem>,
}

impl<'d> SpecParser<'d> {
    fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            model: SpecModel::new(),
            diagnostics,
            scope: Scope::Top,
            pending: None,
        }
    }

    fn warn(&mut self, kind: ErrorKind, span: Span, message: String) {
        warn!(%span, "{}", message);
        self.diagnostics.warn(kind, span, message);
    }

    fn line(&mut self, line: &str, span: Span) -> CompileResult<()> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        trace!(%span, line, "spec line");

        let keyword = line.split_whitespace().next().unwrap_or_default();
        match keyword {
            "SOA" => return self.soa(line, span),
            "BACKEND" => return self.backend(line, span),
            "CONFIG" => return self.config(line, span),
            "SYSTEM" => return self.system(line, span),
            "PHASE" | "MODE" | "PRIORITY" | "ENTITY" => {
                return self.system_directive(keyword, line, span);
            }
            _ => {}
        }
        if line.starts_with("[TYPE") {
            return self.type_alias(line, span);
        }
        if line.starts_with("@@") || keyword == "strict" {
            return self.variable(line, span);
        }
        if let Some(tag) = line.strip_suffix(':') {
            self.flush_pending();
            let section = Section::parse(tag, span)?;
            return self.section(section, span);
        }
        self.plain(line, span)
    }

    // === Directives ===

    fn soa(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(arity(span, "SOA <name> <base> <component> [component ..]", line));
        }
        let (name, base, components) = (parts[1], parts[2], &parts[3..]);
        if !is_identifier(name) || !components.iter().all(|c| is_identifier(c)) {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("SOA names must be identifiers: '{}'", line),
            ));
        }
        if self.model.types.contains(name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                span,
                format!("type '{}' is already defined", name),
            ));
        }
        if !self.model.types.contains(base) {
            self.warn(
                ErrorKind::UnknownType,
                span,
                format!("SOA '{}' uses unknown base type '{}'", name, base),
            );
        }
        debug!(soa = name, base, components = components.len(), "SOA type declared");
        self.model.types.add_soa(
            name,
            SoaType {
                base: base.to_string(),
                components: components.iter().map(|c| c.to_string()).collect(),
            },
        );
        Ok(())
    }

    fn type_alias(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let usage = "[TYPE <alias> <base>]";
        let Some(body) = line
            .strip_prefix("[TYPE")
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            return Err(arity(span, usage, line));
        };
        let parts: Vec<&str> = body.split_whitespace().collect();
        let [alias, base] = parts[..] else {
            return Err(arity(span, usage, line));
        };
        if !is_identifier(alias) {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("'{}' is not a valid type name", alias),
            ));
        }
        if self.model.types.contains(alias) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                span,
                format!("type '{}' is already defined", alias),
            ));
        }
        if !self.model.types.add_alias(alias, base) {
            return Err(CompileError::new(
                ErrorKind::UnknownType,
                span,
                format!("unknown base type '{}' for alias '{}'", base, alias),
            ));
        }
        debug!(alias, base, "type alias declared");
        Ok(())
    }

    fn backend(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [_, name] = parts[..] else {
            return Err(arity(span, "BACKEND <name>", line));
        };
        self.model.engine.backend = name.to_lowercase();
        debug!(backend = %self.model.engine.backend, "backend selected");
        Ok(())
    }

    fn config(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(arity(span, "CONFIG <key> <value>", line));
        }
        let (key, value) = (parts[1], parts[2]);
        match key {
            "MAX_THREADS" => {
                let threads = value
                    .parse::<u32>()
                    .ok()
                    .filter(|threads| *threads > 0)
                    .ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::InvalidValue,
                            span,
                            format!("invalid value for MAX_THREADS: '{}'", value),
                        )
                        .with_note("MAX_THREADS must be a positive integer".to_string())
                    })?;
                self.model.engine.max_threads = threads;
                debug!(max_threads = threads, "engine configured");
            }
            _ => self.warn(
                ErrorKind::InvalidValue,
                span,
                format!("unknown CONFIG key '{}' ignored", key),
            ),
        }
        Ok(())
    }

    fn system(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [_, name] = parts[..] else {
            return Err(arity(span, "SYSTEM <name>", line));
        };
        system_name(name, span)?;
        self.flush_pending();
        self.model.systems.entry(name.to_string()).or_default();
        self.pending = Some(PendingSystem {
            name: name.to_string(),
            phase: None,
            entity: None,
            span,
        });
        Ok(())
    }

    fn system_directive(&mut self, keyword: &str, line: &str, span: Span) -> CompileResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [_, value] = parts[..] else {
            return Err(arity(span, &format!("{} <value>", keyword), line));
        };
        let Some(pending) = self.pending.as_mut() else {
            return Err(CompileError::new(
                ErrorKind::Structure,
                span,
                format!("{} directive outside of a SYSTEM block", keyword),
            ));
        };

        match keyword {
            "PHASE" => {
                let phase = value.parse::<Phase>().map_err(|_| {
                    CompileError::new(
                        ErrorKind::UnknownSection,
                        span,
                        format!("unknown phase '{}' for system '{}'", value, pending.name),
                    )
                })?;
                pending.phase = Some(phase);
            }
            "ENTITY" => {
                if !self.model.entities.contains_key(value) {
                    return Err(CompileError::new(
                        ErrorKind::UndefinedEntity,
                        span,
                        format!("entity '{}' is not declared", value),
                    )
                    .with_note("entities must be declared before a SYSTEM block targets them".to_string()));
                }
                pending.entity = Some(value.to_string());
            }
            "MODE" => {
                let mode = value.parse::<ExecMode>().map_err(|_| {
                    CompileError::new(
                        ErrorKind::UnknownMode,
                        span,
                        format!("unknown mode '{}', expected SINGLE or PARALLEL", value),
                    )
                })?;
                self.model.systems.entry(pending.name.clone()).or_default().mode = mode;
            }
            "PRIORITY" => {
                let priority = value.parse::<i32>().map_err(|_| {
                    CompileError::new(
                        ErrorKind::InvalidValue,
                        span,
                        format!("priority must be an integer, got '{}'", value),
                    )
                })?;
                self.model.systems.entry(pending.name.clone()).or_default().priority = priority;
            }
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    span,
                    format!("unhandled system directive '{}'", keyword),
                ));
            }
        }
        Ok(())
    }

    /// Schedule the pending system, if any.
    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(phase) = pending.phase else {
            self.warn(
                ErrorKind::Structure,
                pending.span,
                format!(
                    "system '{}' has no PHASE; it is configured but not scheduled",
                    pending.name
                ),
            );
            return;
        };
        let target = match &pending.entity {
            Some(name) => self.model.entities.get_mut(name),
            None => None,
        };
        match target {
            Some(entity) => {
                debug!(system = %pending.name, entity = %entity.name, %phase, "system scheduled");
                entity.phases.push(phase, pending.name);
            }
            None => {
                debug!(system = %pending.name, %phase, "system scheduled globally");
                self.model.globals.push(phase, pending.name);
            }
        }
    }

    // === Sections ===

    fn section(&mut self, section: Section, span: Span) -> CompileResult<()> {
        match section {
            Section::PhaseHeader(phase) => {
                self.scope = Scope::Global(phase);
            }
            Section::UniqueDecl { name } => {
                self.declare_entity(name, EntityKind::Unique, span)?;
            }
            Section::GenericDecl { name, count } => {
                self.declare_entity(name, EntityKind::Generic { count }, span)?;
            }
            Section::SharedDecl { entity } => {
                if !self.model.entities.contains_key(&entity) {
                    return Err(CompileError::new(
                        ErrorKind::UndefinedEntity,
                        span,
                        format!("SHARED block for undeclared entity '{}'", entity),
                    ));
                }
                self.scope = Scope::Shared { entity };
            }
        }
        Ok(())
    }

    fn declare_entity(&mut self, name: String, kind: EntityKind, span: Span) -> CompileResult<()> {
        if let Some(previous) = self.model.entities.get(&name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                span,
                format!("entity '{}' is already declared", name),
            )
            .with_note(format!("first declared at {}", previous.span)));
        }
        debug!(entity = %name, kind = ?kind, "entity declared");
        self.model
            .entities
            .insert(name.clone(), Entity::new(name.clone(), kind, span));
        self.scope = Scope::Entity { name, phase: None };
        Ok(())
    }

    // === Variables ===

    fn variable(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let (strict, rest) = match line.strip_prefix("strict") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim_start()),
            _ => (false, line),
        };
        let Some(decl) = rest.strip_prefix("@@") else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("expected '@@<name> <type>' after 'strict', got '{}'", line),
            ));
        };

        let (entity_name, shared) = match &self.scope {
            Scope::Entity { name, .. } => (name.clone(), false),
            Scope::Shared { entity } => (entity.clone(), true),
            Scope::Top | Scope::Global(_) => {
                return Err(CompileError::new(
                    ErrorKind::VariableOutsideEntity,
                    span,
                    format!("variable declared outside any entity: '{}'", line),
                ));
            }
        };

        let (decl, default) = match decl.split_once('=') {
            Some((decl, default)) => {
                let default = default.trim();
                if default.is_empty() {
                    return Err(arity(span, "@@<name> <type> [= <default>]", line));
                }
                (decl, Some(default.to_string()))
            }
            None => (decl, None),
        };
        let parts: Vec<&str> = decl.split_whitespace().collect();
        let [name, ty] = parts[..] else {
            return Err(arity(span, "@@<name> <type> [= <default>]", line));
        };
        if !is_identifier(name) {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("'{}' is not a valid variable name", name),
            ));
        }

        if name == CAPACITY_FIELD {
            return Err(reserved(span, name, "it is maintained from the declared count"));
        }

        let Some(entity) = self.model.entities.get_mut(&entity_name) else {
            return Err(CompileError::new(
                ErrorKind::Internal,
                span,
                format!("open entity '{}' missing from the model", entity_name),
            ));
        };

        if name == ACTIVE_FIELD {
            if shared || !entity.kind.is_generic() {
                return Err(reserved(
                    span,
                    name,
                    "only a GENERIC entity's per-instance block may set its initial count",
                ));
            }
            if entity.active_default.is_some() {
                return Err(duplicate(span, name, &entity_name));
            }
            debug!(entity = %entity_name, initial = ?default, "initial active count overridden");
            entity.active_default = default;
            return Ok(());
        }

        if entity.declares(name) {
            return Err(duplicate(span, name, &entity_name));
        }

        let mut variable = Variable::new(name, ty);
        variable.default = default;
        variable.strict = strict;
        variable.span = span;
        let table = if shared {
            &mut entity.shared
        } else {
            &mut entity.vars
        };
        if table.insert(variable).is_err() {
            return Err(duplicate(span, name, &entity_name));
        }
        trace!(entity = %entity_name, variable = name, ty, shared, strict, "variable declared");

        if !self.model.types.contains(ty) {
            self.warn(
                ErrorKind::UnknownType,
                span,
                format!(
                    "type '{}' of '{}.{}' is not registered; emitted verbatim",
                    ty, entity_name, name
                ),
            );
        }
        Ok(())
    }

    // === Plain lines ===

    fn plain(&mut self, line: &str, span: Span) -> CompileResult<()> {
        let phase_open = matches!(
            self.scope,
            Scope::Global(_) | Scope::Entity { phase: Some(_), .. }
        );
        if !phase_open && self.model.entities.contains_key(line) {
            if let Some(pending) = self.pending.as_mut() {
                trace!(system = %pending.name, entity = line, "system targets entity");
                pending.entity = Some(line.to_string());
                return Ok(());
            }
        }

        let phase = line.parse::<Phase>().ok();
        match (&mut self.scope, phase) {
            (Scope::Entity { phase: current, .. }, Some(phase)) => {
                *current = Some(phase);
                Ok(())
            }
            (Scope::Shared { entity }, Some(phase)) => {
                self.scope = Scope::Entity {
                    name: entity.clone(),
                    phase: Some(phase),
                };
                Ok(())
            }
            (Scope::Shared { entity }, None) => Err(CompileError::new(
                ErrorKind::Structure,
                span,
                format!("unexpected '{}' in SHARED block of '{}'", line, entity),
            )
            .with_note("a SHARED block holds only @@ variables".to_string())),
            (Scope::Entity { name, phase: Some(phase) }, None) => {
                system_name(line, span)?;
                let (name, phase) = (name.clone(), *phase);
                if let Some(entity) = self.model.entities.get_mut(&name) {
                    trace!(entity = %name, %phase, system = line, "system referenced");
                    entity.phases.push(phase, line);
                }
                Ok(())
            }
            (Scope::Entity { name, phase: None }, None) => Err(CompileError::new(
                ErrorKind::Structure,
                span,
                format!("system '{}' in entity '{}' has no phase", line, name),
            )
            .with_note("name a phase (e.g. LOOP) on its own line first".to_string())),
            (Scope::Global(phase), _) => {
                system_name(line, span)?;
                let phase = *phase;
                trace!(%phase, system = line, "global system referenced");
                self.model.globals.push(phase, line);
                Ok(())
            }
            (Scope::Top, _) => {
                self.warn(
                    ErrorKind::Syntax,
                    span,
                    format!("line ignored: '{}'", line),
                );
                Ok(())
            }
        }
    }

    // === Finalization ===

    fn finish(mut self) -> CompileResult<SpecModel> {
        self.flush_pending();

        if !self.model.has_world() {
            let mut error = CompileError::new(
                ErrorKind::MissingWorld,
                Span::NONE,
                format!("a UNIQUE entity named '{}' is required", WORLD_ENTITY),
            );
            if let Some(world) = self.model.entity(WORLD_ENTITY) {
                error = error.with_note(format!(
                    "'{}' is declared {} at {}",
                    WORLD_ENTITY,
                    world.kind.label(),
                    world.span
                ));
            }
            return Err(error);
        }

        self.model.sort_phases();
        self.model.expand_soa(self.diagnostics)?;
        debug!(
            entities = self.model.entities.len(),
            systems = self.model.systems.len(),
            "spec parsed"
        );
        Ok(self.model)
    }
}

fn arity(span: Span, usage: &str, line: &str) -> CompileError {
    CompileError::new(
        ErrorKind::MalformedDirective,
        span,
        format!("malformed directive '{}'", line),
    )
    .with_note(format!("usage: {}", usage))
}

fn reserved(span: Span, name: &str, why: &str) -> CompileError {
    CompileError::new(
        ErrorKind::ReservedName,
        span,
        format!("'{}' is a reserved field", name),
    )
    .with_note(why.to_string())
}

fn duplicate(span: Span, name: &str, entity: &str) -> CompileError {
    CompileError::new(
        ErrorKind::DuplicateName,
        span,
        format!("variable '{}' is already declared in '{}'", name, entity),
    )
}

fn system_name(name: &str, span: Span) -> CompileResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(CompileError::new(
            ErrorKind::Syntax,
            span,
            format!("'{}' is not a valid system name", name),
        ))
    }
}
