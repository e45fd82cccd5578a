//! Driver error types.

use simforge_model::CompileError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a filesystem-level compile.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("cannot walk rules directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("no .rule files found in '{}'", .path.display())]
    NoRuleFiles { path: PathBuf },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
