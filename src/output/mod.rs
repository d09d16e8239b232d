//! # Output
//!
//! CSS generation is push-based: every node writes its text into an
//! [`OutputSink`] together with the source position it came from. A plain
//! string buffer and a source-map recorder are the two sinks.

use crate::options::{LessOptions, LineNumbers};
use crate::tree::SourcePos;

pub mod css;
pub mod sourcemap;

pub use css::{gen_css, node_css, selector_css};
pub use sourcemap::SourceMapSink;

/// Receives generated CSS chunks in order.
pub trait OutputSink {
    fn add(&mut self, chunk: &str, pos: Option<&SourcePos>);

    fn is_empty(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct StringSink {
    pub css: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.css
    }
}

impl OutputSink for StringSink {
    fn add(&mut self, chunk: &str, _pos: Option<&SourcePos>) {
        self.css.push_str(chunk);
    }

    fn is_empty(&self) -> bool {
        self.css.is_empty()
    }
}

/// Formatting state threaded through generation.
#[derive(Debug, Clone, Default)]
pub struct GenContext {
    pub compress: bool,
    pub strict_units: bool,
    pub dump_line_numbers: Option<LineNumbers>,
    pub tab_level: usize,
    /// Set while the first selector of a path is written.
    pub first_selector: bool,
    /// Set while the last rule of a block is written.
    pub last_rule: bool,
}

impl GenContext {
    pub fn new(options: &LessOptions) -> Self {
        Self {
            compress: options.compress,
            strict_units: options.strict_units,
            dump_line_numbers: options.dump_line_numbers,
            ..Self::default()
        }
    }

    /// Context for turning values into text during evaluation.
    pub fn inline(compress: bool) -> Self {
        Self {
            compress,
            ..Self::default()
        }
    }
}
