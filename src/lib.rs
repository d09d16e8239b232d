//! # lessrs
//!
//! A compiler for the Less stylesheet language.
//!
//! ## Pipeline
//!
//! 1. **`parser`**: source text becomes a tree of [`tree::Node`]s
//! 2. **`visitors::import`**: `@import` targets are loaded and parsed
//! 3. **`eval`**: variables, mixins, guards, operations and functions are resolved
//! 4. **`visitors`**: selectors are joined, extends applied, rulesets flattened
//! 5. **`output`**: the lowered tree is written as CSS, optionally with a source map
//!
//! [`render`] runs all of it; [`Compiler`] lets callers swap in a file
//! manager, a script evaluator or extra functions.

use std::path::Path;

pub use crate::compiler::{CompileOutput, Compiler, Stylesheet};
pub use crate::diagnostics::{render_error, ErrorContext, ErrorKind, LessError, LessResult};
pub use crate::eval::{ScriptEvaluator, ScriptValue};
pub use crate::functions::{FnResult, FunctionRegistry};
pub use crate::options::{LessOptions, LineNumbers, MathMode, RewriteUrls, SourceMapOptions};
pub use crate::visitors::{FileManager, FsFileManager, LoadedFile, MemoryFileManager};

pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod eval;
pub mod functions;
pub mod options;
pub mod output;
pub mod parser;
pub mod tree;
pub mod visitors;

/// Parses `source` and loads its imports from the filesystem.
pub fn parse(source: &str, options: &LessOptions) -> LessResult<Stylesheet> {
    Compiler::new(options.clone()).parse(source)
}

/// Evaluates and lowers a parsed stylesheet into CSS.
pub fn to_css(sheet: &Stylesheet, options: &LessOptions) -> LessResult<CompileOutput> {
    Compiler::new(options.clone()).to_css(sheet)
}

pub fn render(source: &str, options: &LessOptions) -> LessResult<CompileOutput> {
    Compiler::new(options.clone()).render(source)
}

pub fn render_file(path: impl AsRef<Path>, options: &LessOptions) -> LessResult<CompileOutput> {
    Compiler::new(options.clone()).render_file(path.as_ref())
}
