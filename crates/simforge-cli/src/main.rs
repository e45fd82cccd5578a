//! simforge - compile world specs and rule files to C
//!
//! `simforge build` turns a world spec (plus an optional render-sync file)
//! into one translation unit; `simforge rules` turns a directory of rule
//! files into system modules.

use clap::{Parser, Subcommand};
use simforge::{
    Compilation, CompileOptions, Diagnostics, Error, SpecModel, compile_files, compile_rules_dir,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use thiserror::Error as ThisError;
use tracing_subscriber::EnvFilter;

/// Failure of a CLI command.
#[derive(Debug, ThisError)]
enum CliError {
    #[error(transparent)]
    Simforge(#[from] Error),

    #[error("cannot serialize model: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "simforge")]
#[command(about = "Compile entity/phase world specs and rule files to C")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the program for a world spec.
    Build {
        /// Path to the world spec
        spec: PathBuf,

        /// Render-sync (.gspec) file
        #[arg(long)]
        gspec: Option<PathBuf>,

        /// Directory holding <System>.c modules
        #[arg(long, env = "SIMFORGE_MODULES", default_value = "modules")]
        modules: PathBuf,

        /// Prefix of the generated module #include lines
        #[arg(long, default_value = "modules")]
        include_dir: String,

        /// Output translation unit
        #[arg(short, long, env = "SIMFORGE_OUT", default_value = "main.c")]
        output: PathBuf,

        /// Compile this rule directory into the module directory first
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Write the parsed model as JSON
        #[arg(long)]
        dump_model: Option<PathBuf>,
    },

    /// Compile every .rule file in a directory to sys_<name>.c modules.
    Rules {
        /// Directory of .rule files
        dir: PathBuf,

        /// Output directory for generated modules
        #[arg(short, long, env = "SIMFORGE_MODULES", default_value = "modules")]
        out: PathBuf,

        /// World spec used to type rule bindings (naming heuristic otherwise)
        #[arg(long)]
        spec: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simforge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn report(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        warn!("{}", diagnostic);
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    fs::write(path, contents).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `model` to `path` as pretty-printed JSON.
fn dump_model(model: &SpecModel, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(model)?;
    write_file(path, &json)?;
    info!(path = %path.display(), "model dumped");
    Ok(())
}

fn build(
    spec: PathBuf,
    gspec: Option<PathBuf>,
    options: CompileOptions,
    dump_model_to: Option<PathBuf>,
) -> Result<(), CliError> {
    let compiled = compile_files(&spec, gspec.as_deref(), &options)?;
    report(&compiled.diagnostics);

    if let Some(path) = dump_model_to {
        dump_model(&compiled.model, &path)?;
    }

    info!(
        "Generated {} ({} warnings)",
        options.output.display(),
        compiled.diagnostics.len()
    );
    Ok(())
}

fn rules(dir: PathBuf, out: PathBuf, spec: Option<PathBuf>) -> Result<(), CliError> {
    let compilation = match &spec {
        Some(path) => {
            let source = fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            let compilation =
                Compilation::from_spec(&source).map_err(|e| Error::from(e.with_file(path)))?;
            report(compilation.diagnostics());
            Some(compilation)
        }
        None => None,
    };

    let mut diagnostics = Diagnostics::new();
    let written = compile_rules_dir(
        &dir,
        &out,
        compilation.as_ref().map(Compilation::model),
        &mut diagnostics,
    )?;
    report(&diagnostics);

    for path in &written {
        info!("Generated {}", path.display());
    }
    Ok(())
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            spec,
            gspec,
            modules,
            include_dir,
            output,
            rules,
            dump_model,
        } => {
            let options = CompileOptions {
                module_dir: modules,
                module_include_dir: include_dir,
                output,
                rules_dir: rules,
            };
            build(spec, gspec, options, dump_model)
        }
        Commands::Rules { dir, out, spec } => rules(dir, out, spec),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
