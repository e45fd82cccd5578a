//! Where module sources come from.

use simforge_model::{CompileError, CompileResult, ErrorKind, Span};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A loaded module: its path and full text.
#[derive(Debug, Clone)]
pub struct ModuleText {
    pub path: PathBuf,
    pub text: String,
}

/// Read access to module sources by system name.
pub trait ModuleSource {
    /// Load the source of module `name`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::MissingModule`] when no source exists for `name`.
    fn load(&self, name: &str) -> CompileResult<ModuleText>;
}

/// Modules stored as `<root>/<name>.c`.
#[derive(Debug, Clone)]
pub struct FsModules {
    root: PathBuf,
}

impl FsModules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.c", name))
    }
}

impl ModuleSource for FsModules {
    fn load(&self, name: &str) -> CompileResult<ModuleText> {
        let path = self.path_of(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(ModuleText { path, text }),
            Err(error) => Err(missing(name)
                .with_note(format!("{}: {}", path.display(), error))
                .with_file(path)),
        }
    }
}

/// In-memory module table.
#[derive(Debug, Clone, Default)]
pub struct MemoryModules {
    modules: BTreeMap<String, String>,
}

impl MemoryModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.modules.insert(name.into(), text.into());
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl ModuleSource for MemoryModules {
    fn load(&self, name: &str) -> CompileResult<ModuleText> {
        match self.modules.get(name) {
            Some(text) => Ok(ModuleText {
                path: PathBuf::from(format!("{}.c", name)),
                text: text.clone(),
            }),
            None => Err(missing(name)),
        }
    }
}

fn missing(name: &str) -> CompileError {
    CompileError::new(
        ErrorKind::MissingModule,
        Span::NONE,
        format!("module '{}' not found", name),
    )
}
