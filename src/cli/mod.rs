//! The `lessc` command-line interface.
//!
//! Reads one Less file, compiles it with the options built from the flags,
//! and writes the CSS (plus an optional source map) to a file or stdout.

use std::{fs, path::Path, process};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{cli::args::LesscArgs, err_msg, Compiler, LessResult};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = LesscArgs::parse();
    init_logging(args.verbose);

    match compile(&args) {
        Ok(warnings) => output::print_warnings(&warnings),
        Err(e) => {
            output::print_error(e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "lessrs=debug" } else { "lessrs=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Compiles the input named by `args` and writes the results. Returns the
/// warnings raised along the way.
fn compile(args: &LesscArgs) -> LessResult<Vec<String>> {
    let options = args.to_options()?;
    let compiler = Compiler::new(options);

    if args.lint {
        let sheet = compiler.parse_file(&args.input)?;
        debug!(imports = sheet.imports().len(), "lint passed");
        return Ok(Vec::new());
    }

    let result = compiler.render_file(&args.input)?;
    match &args.output {
        Some(path) => write_file(path, &result.css)?,
        None => print!("{}", result.css),
    }
    if let Some(map) = &result.map {
        write_file(&args.map_path(), map)?;
    }
    Ok(result.warnings)
}

fn write_file(path: &Path, contents: &str) -> LessResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| err_msg!(File, "could not create '{}': {}", dir.display(), e))?;
    }
    fs::write(path, contents)
        .map_err(|e| err_msg!(File, "could not write '{}': {}", path.display(), e))
}
