//! Compile options.
//!
//! `LessOptions` is plain data: it deserializes from the same JSON shape the
//! reference tooling accepts (`strictUnits`, `rewriteUrls`, ...) so existing
//! config files can be reused, and the CLI layers its flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{err_msg, LessError};

/// When arithmetic operators are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MathMode {
    /// Every operator is evaluated, `/` included.
    #[serde(alias = "0")]
    Always,
    /// `/` only inside parentheses; other operators everywhere.
    #[default]
    #[serde(alias = "1")]
    ParensDivision,
    /// Only inside parentheses.
    #[serde(alias = "2", alias = "strict")]
    Parens,
}

impl std::str::FromStr for MathMode {
    type Err = LessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" | "0" => Ok(MathMode::Always),
            "parens-division" | "1" => Ok(MathMode::ParensDivision),
            "parens" | "strict" | "2" => Ok(MathMode::Parens),
            other => Err(err_msg!(Syntax, "unknown math mode '{}'", other)),
        }
    }
}

/// Url rewriting relative to the importing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteUrls {
    #[default]
    Off,
    /// Only urls starting with `.`.
    Local,
    All,
}

impl std::str::FromStr for RewriteUrls {
    type Err = LessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RewriteUrls::Off),
            "local" => Ok(RewriteUrls::Local),
            "all" => Ok(RewriteUrls::All),
            other => Err(err_msg!(Syntax, "unknown rewrite-urls mode '{}'", other)),
        }
    }
}

/// Debug position info written before each ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineNumbers {
    Comments,
    Mediaquery,
    All,
}

impl std::str::FromStr for LineNumbers {
    type Err = LessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comments" => Ok(LineNumbers::Comments),
            "mediaquery" => Ok(LineNumbers::Mediaquery),
            "all" => Ok(LineNumbers::All),
            other => Err(err_msg!(Syntax, "unknown line-numbers mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceMapOptions {
    /// Value written into the `sourceMappingURL` comment.
    pub source_map_url: Option<String>,
    /// Embed source contents in the map.
    pub outputs_source_files: bool,
    /// Prefix stripped from source filenames.
    pub source_map_basepath: Option<String>,
    /// Prefix prepended to source filenames.
    pub source_map_rootpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LessOptions {
    /// Extra search roots for `@import`.
    pub paths: Vec<PathBuf>,
    pub math: MathMode,
    pub strict_units: bool,
    pub compress: bool,
    pub dump_line_numbers: Option<LineNumbers>,
    /// Variables declared before the source, overridable by it.
    pub global_vars: BTreeMap<String, String>,
    /// Variables declared after the source, overriding it.
    pub modify_vars: BTreeMap<String, String>,
    pub rewrite_urls: RewriteUrls,
    /// Request a source map.
    pub source_map: bool,
    pub source_map_options: SourceMapOptions,
    /// Split the input with the chunker before parsing.
    pub chunk_input: bool,
    /// Imports are only allowed at the top level.
    pub strict_imports: bool,
    /// Every `@import` behaves as `(multiple)`.
    pub import_multiple: bool,
    pub javascript_enabled: bool,
    /// Query string appended to every `url()`.
    pub url_args: Option<String>,
    /// Name used for the entry source in errors and source maps.
    pub filename: String,
    /// Maximum nested mixin/ruleset evaluation depth.
    pub max_depth: usize,
}

impl Default for LessOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            math: MathMode::default(),
            strict_units: false,
            compress: false,
            dump_line_numbers: None,
            global_vars: BTreeMap::new(),
            modify_vars: BTreeMap::new(),
            rewrite_urls: RewriteUrls::default(),
            source_map: false,
            source_map_options: SourceMapOptions::default(),
            chunk_input: false,
            strict_imports: false,
            import_multiple: false,
            javascript_enabled: false,
            url_args: None,
            filename: "input".to_string(),
            max_depth: 1000,
        }
    }
}

impl LessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from a JSON file; unknown keys are ignored.
    pub fn from_json_file(path: &Path) -> Result<Self, LessError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| err_msg!(File, "could not read config '{}': {}", path.display(), e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, LessError> {
        serde_json::from_str(text).map_err(|e| err_msg!(Syntax, "invalid options: {}", e))
    }

    /// Renders injected variables as source text: `@name: value;` per entry.
    pub fn vars_source(vars: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for (name, value) in vars {
            let name = name.trim_start_matches('@');
            let value = value.trim();
            let semi = if value.ends_with(';') { "" } else { ";" };
            out.push_str(&format!("@{name}: {value}{semi}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json_uses_original_names() {
        let opts = LessOptions::from_json(
            r#"{"strictUnits": true, "math": "parens", "rewriteUrls": "local",
                "globalVars": {"color": "red"}, "dumpLineNumbers": "comments"}"#,
        )
        .unwrap();
        assert!(opts.strict_units);
        assert_eq!(opts.math, MathMode::Parens);
        assert_eq!(opts.rewrite_urls, RewriteUrls::Local);
        assert_eq!(opts.dump_line_numbers, Some(LineNumbers::Comments));
        assert_eq!(opts.global_vars.get("color").map(String::as_str), Some("red"));
        assert!(!opts.compress);
    }

    #[test]
    fn test_vars_source() {
        let mut vars = BTreeMap::new();
        vars.insert("@a".to_string(), "1px".to_string());
        vars.insert("b".to_string(), "red;".to_string());
        assert_eq!(LessOptions::vars_source(&vars), "@a: 1px;\n@b: red;\n");
    }

    #[test]
    fn test_math_mode_order() {
        assert!(MathMode::Parens > MathMode::ParensDivision);
        assert_eq!("always".parse::<MathMode>().unwrap(), MathMode::Always);
    }
}
