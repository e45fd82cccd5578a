//! Filesystem drivers: spec files to `main.c`, rule directories to modules.

use crate::context::{Compilation, Compiled};
use crate::error::{Error, Result};
use simforge_codegen::{DEFAULT_MODULE_INCLUDE_DIR, GenOptions};
use simforge_model::{CompileError, Diagnostics, SpecModel};
use simforge_resolve::FsModules;
use simforge_rules::{HeuristicTypes, PropertyTypes, compile_rule};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension of rule source files.
pub const RULE_EXTENSION: &str = "rule";

/// Prefix of modules generated from rule files.
pub const RULE_MODULE_PREFIX: &str = "sys_";

/// Where a filesystem compile reads modules and writes its output.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Directory holding `<system>.c` module sources.
    pub module_dir: PathBuf,
    /// Prefix used in the generated `#include` lines.
    pub module_include_dir: String,
    /// Path of the generated translation unit.
    pub output: PathBuf,
    /// Rule directory compiled into `module_dir` before modules are resolved.
    pub rules_dir: Option<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("modules"),
            module_include_dir: DEFAULT_MODULE_INCLUDE_DIR.to_string(),
            output: PathBuf::from("main.c"),
            rules_dir: None,
        }
    }
}

impl CompileOptions {
    pub fn gen_options(&self) -> GenOptions {
        GenOptions {
            module_include_dir: self.module_include_dir.clone(),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// Stamp `path` on diagnostics that do not carry a file yet.
fn located(error: CompileError, path: &Path) -> CompileError {
    if error.file.is_some() {
        error
    } else {
        error.with_file(path)
    }
}

/// Compile a spec file (and optional render-sync file) and write the result.
///
/// # Parameters
/// - `spec_path`: world spec
/// - `gspec_path`: optional `.gspec` render-sync file
/// - `options`: module directory, include prefix, output path and an
///   optional rule directory to compile first
///
/// # Returns
/// The finished compilation, including collected warnings.
///
/// # Errors
/// I/O failures, or the first fatal diagnostic (located in its file).
pub fn compile_files(
    spec_path: &Path,
    gspec_path: Option<&Path>,
    options: &CompileOptions,
) -> Result<Compiled> {
    info!(spec = %spec_path.display(), "compiling");
    let spec = read(spec_path)?;
    let mut compilation =
        Compilation::from_spec(&spec).map_err(|e| located(e, spec_path))?;

    if let Some(path) = gspec_path {
        let gspec = read(path)?;
        compilation
            .attach_render_sync(&gspec)
            .map_err(|e| located(e, path))?;
    }

    if let Some(rules_dir) = &options.rules_dir {
        let mut warnings = Diagnostics::new();
        compile_rules_dir(
            rules_dir,
            &options.module_dir,
            Some(compilation.model()),
            &mut warnings,
        )?;
        compilation.record(warnings);
    }

    compilation.resolve(&FsModules::new(&options.module_dir))?;
    let compiled = compilation
        .generate(&options.gen_options())
        .map_err(|e| located(e, spec_path))?;

    write(&options.output, &compiled.source)?;
    info!(output = %options.output.display(), "wrote translation unit");
    Ok(compiled)
}

/// Every `*.rule` file below `dir`, in path order.
pub fn find_rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == RULE_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(Error::NoRuleFiles {
            path: dir.to_path_buf(),
        });
    }
    Ok(files)
}

/// Compile every rule file under `rules_dir` into `<out_dir>/sys_<stem>.c`.
///
/// Property types come from `model` when given, otherwise from the naming
/// heuristic. Warnings are located in their rule file and appended to
/// `diagnostics`.
///
/// # Returns
/// Paths of the written modules, in rule-file order.
pub fn compile_rules_dir(
    rules_dir: &Path,
    out_dir: &Path,
    model: Option<&SpecModel>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let types: &dyn PropertyTypes = match model {
        Some(model) => model,
        None => &HeuristicTypes,
    };

    let warnings_before = diagnostics.len();
    let mut written = Vec::new();
    for path in find_rule_files(rules_dir)? {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = read(&path)?;

        let mut local = Diagnostics::new();
        let module =
            compile_rule(&name, &source, types, &mut local).map_err(|e| located(e, &path))?;
        for warning in local.into_vec() {
            diagnostics.push(located(warning, &path));
        }

        let target = out_dir.join(format!("{}{}.c", RULE_MODULE_PREFIX, name));
        write(&target, &module)?;
        debug!(rule = %path.display(), module = %target.display(), "rule compiled");
        written.push(target);
    }

    let warnings = diagnostics.len() - warnings_before;
    if warnings > 0 {
        warn!(warnings, "rule compilation produced warnings");
    }
    info!(modules = written.len(), out = %out_dir.display(), "rules compiled");
    Ok(written)
}
