//! Command-line arguments for `lessc`.
//!
//! Flags are layered over the options loaded from `--config`, so a config
//! file supplies defaults and the command line wins.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::{err_msg, LessOptions, LessResult};

#[derive(Debug, Parser)]
#[command(name = "lessc", version, about = "Compiles Less stylesheets to CSS.")]
pub struct LesscArgs {
    /// The Less file to compile.
    pub input: PathBuf,

    /// Where to write the CSS; stdout when omitted.
    pub output: Option<PathBuf>,

    /// Minify the generated CSS.
    #[arg(short = 'x', long)]
    pub compress: bool,

    /// Reject operations on incompatible units.
    #[arg(long)]
    pub strict_units: bool,

    /// When operators are evaluated: always, parens-division or parens.
    #[arg(long, value_name = "MODE")]
    pub math: Option<String>,

    /// Extra directory to search for imports. Repeatable.
    #[arg(long = "include-path", value_name = "DIR")]
    pub include_paths: Vec<PathBuf>,

    /// Variable declared before the source. Repeatable.
    #[arg(long = "global-var", value_name = "NAME=VALUE")]
    pub global_vars: Vec<String>,

    /// Variable declared after the source, overriding it. Repeatable.
    #[arg(long = "modify-var", value_name = "NAME=VALUE")]
    pub modify_vars: Vec<String>,

    /// Rewrite urls in imported files: off, local or all.
    #[arg(long, value_name = "MODE")]
    pub rewrite_urls: Option<String>,

    /// Emit source positions: comments, mediaquery or all.
    #[arg(long, value_name = "MODE")]
    pub line_numbers: Option<String>,

    /// Write a source map next to the output.
    #[arg(long)]
    pub source_map: bool,

    /// JSON options file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Check the input for errors without writing CSS.
    #[arg(long)]
    pub lint: bool,

    /// Log pipeline stages to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl LesscArgs {
    /// The options this invocation compiles with.
    pub fn to_options(&self) -> LessResult<LessOptions> {
        let mut options = match &self.config {
            Some(path) => LessOptions::from_json_file(path)?,
            None => LessOptions::default(),
        };
        options.filename = self.input.to_string_lossy().into_owned();
        options.compress |= self.compress;
        options.strict_units |= self.strict_units;
        options.source_map |= self.source_map;
        options.paths.extend(self.include_paths.iter().cloned());
        if let Some(math) = &self.math {
            options.math = math.parse()?;
        }
        if let Some(mode) = &self.rewrite_urls {
            options.rewrite_urls = mode.parse()?;
        }
        if let Some(mode) = &self.line_numbers {
            options.dump_line_numbers = Some(mode.parse()?);
        }
        for var in &self.global_vars {
            let (name, value) = split_var(var)?;
            options.global_vars.insert(name, value);
        }
        for var in &self.modify_vars {
            let (name, value) = split_var(var)?;
            options.modify_vars.insert(name, value);
        }
        if options.source_map && options.source_map_options.source_map_url.is_none() {
            let map = self.map_path();
            options.source_map_options.source_map_url = map
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        Ok(options)
    }

    /// `<output>.map`, or `<input stem>.css.map` when writing to stdout.
    pub fn map_path(&self) -> PathBuf {
        match &self.output {
            Some(out) => append_extension(out, "map"),
            None => self.input.with_extension("css.map"),
        }
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn split_var(var: &str) -> LessResult<(String, String)> {
    match var.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(err_msg!(
            Syntax,
            "expected NAME=VALUE, got '{}'",
            var
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LineNumbers, MathMode};

    fn args(list: &[&str]) -> LesscArgs {
        LesscArgs::parse_from(std::iter::once("lessc").chain(list.iter().copied()))
    }

    #[test]
    fn test_flags_become_options() {
        let opts = args(&[
            "in.less",
            "--compress",
            "--math",
            "parens",
            "--global-var",
            "w=10px",
            "--modify-var",
            "@c=red",
            "--line-numbers",
            "comments",
            "--include-path",
            "lib",
        ])
        .to_options()
        .unwrap();
        assert!(opts.compress);
        assert_eq!(opts.math, MathMode::Parens);
        assert_eq!(opts.global_vars.get("w").map(String::as_str), Some("10px"));
        assert_eq!(opts.modify_vars.get("@c").map(String::as_str), Some("red"));
        assert_eq!(opts.dump_line_numbers, Some(LineNumbers::Comments));
        assert_eq!(opts.paths, vec![PathBuf::from("lib")]);
        assert_eq!(opts.filename, "in.less");
    }

    #[test]
    fn test_malformed_var_is_rejected() {
        assert!(args(&["in.less", "--global-var", "novalue"]).to_options().is_err());
    }

    #[test]
    fn test_source_map_url_follows_output() {
        let a = args(&["in.less", "out/site.css", "--source-map"]);
        assert_eq!(a.map_path(), PathBuf::from("out/site.css.map"));
        let opts = a.to_options().unwrap();
        assert_eq!(
            opts.source_map_options.source_map_url.as_deref(),
            Some("site.css.map")
        );
    }
}
