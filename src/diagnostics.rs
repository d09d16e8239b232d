//!
//! # Diagnostics
//!
//! The unified, `miette`-based error type for every stage of the compiler:
//! chunking, parsing, import resolution, evaluation and CSS generation.
//!
//! # Error Construction Macros
//!
//! - **`err_msg!`** builds a message-only error:
//!   `err_msg!(Name, "variable {} is undefined", name)`
//! - **`err_at!`** builds an error positioned at a node:
//!   `err_at!(Runtime, &call.pos, "No matching definition was found for `{}`", sig)`
//!
//! Errors raised deep inside value evaluation usually have no position. The
//! nearest enclosing node that does have one attaches it with
//! [`LessError::located`], which never overwrites a position already present.
//!

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::SourcePos;

pub type SourceArc = Arc<NamedSource<String>>;

/// Byte range inside one source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Type-safe error classification matching the `LessError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input detected by the parser or by misplaced constructs.
    Syntax,
    /// Structural scanning failures: unbalanced delimiters, unterminated strings.
    Parse,
    /// Undefined or recursively defined names.
    Name,
    /// Evaluation failures: mixin resolution, guards, extend cycles.
    Runtime,
    /// Bad arguments passed to a builtin function.
    Argument,
    /// Arithmetic on incompatible operands or units.
    Operation,
    /// Import failures.
    File,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax",
            ErrorKind::Parse => "Parse",
            ErrorKind::Name => "Name",
            ErrorKind::Runtime => "Runtime",
            ErrorKind::Argument => "Argument",
            ErrorKind::Operation => "Operation",
            ErrorKind::File => "File",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an error happened, plus optional help.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub filename: Option<String>,
    /// 1-based line number.
    pub line: Option<usize>,
    /// 0-based column, counted in bytes.
    pub column: Option<usize>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a context for `index` in `pos.file`, scanning back for the
    /// preceding newline to find line and column.
    pub fn at(pos: &SourcePos) -> Self {
        let Some(file) = pos.file.as_ref() else {
            return Self {
                span: Some(Span {
                    start: pos.index,
                    end: pos.index,
                }),
                ..Self::default()
            };
        };
        let text = file.contents();
        let index = pos.index.min(text.len());
        let before = &text[..index];
        let line = before.matches('\n').count() + 1;
        let column = before.rfind('\n').map_or(index, |nl| index - nl - 1);
        Self {
            source: Some(Arc::clone(&file.source)),
            span: Some(Span {
                start: index,
                end: index,
            }),
            filename: Some(file.filename.clone()),
            line: Some(line),
            column: Some(column),
            help: None,
        }
    }

    fn is_located(&self) -> bool {
        self.span.is_some()
    }
}

/// Every failure mode of the compiler.
#[derive(Debug, Error)]
pub enum LessError {
    #[error("SyntaxError: {message}")]
    Syntax {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("ParseError: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("NameError: {message}")]
    Name {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("RuntimeError: {message}")]
    Runtime {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("ArgumentError: {message}")]
    Argument {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("OperationError: {message}")]
    Operation {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("FileError: {message}")]
    File {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

pub type LessResult<T> = Result<T, LessError>;

impl LessError {
    fn parts(&self) -> (&String, &ErrorContext) {
        match self {
            LessError::Syntax { message, ctx, .. }
            | LessError::Parse { message, ctx, .. }
            | LessError::Name { message, ctx, .. }
            | LessError::Runtime { message, ctx, .. }
            | LessError::Argument { message, ctx, .. }
            | LessError::Operation { message, ctx, .. }
            | LessError::File { message, ctx, .. } => (message, ctx),
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            LessError::Syntax { ctx, .. }
            | LessError::Parse { ctx, .. }
            | LessError::Name { ctx, .. }
            | LessError::Runtime { ctx, .. }
            | LessError::Argument { ctx, .. }
            | LessError::Operation { ctx, .. }
            | LessError::File { ctx, .. } => ctx,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LessError::Syntax { .. } => ErrorKind::Syntax,
            LessError::Parse { .. } => ErrorKind::Parse,
            LessError::Name { .. } => ErrorKind::Name,
            LessError::Runtime { .. } => ErrorKind::Runtime,
            LessError::Argument { .. } => ErrorKind::Argument,
            LessError::Operation { .. } => ErrorKind::Operation,
            LessError::File { .. } => ErrorKind::File,
        }
    }

    pub fn message(&self) -> &str {
        self.parts().0
    }

    pub fn context(&self) -> &ErrorContext {
        self.parts().1
    }

    /// Attaches `pos` unless the error already carries a position.
    pub fn located(mut self, pos: &SourcePos) -> Self {
        let ctx = self.ctx_mut();
        let located = ctx.is_located() && (ctx.filename.is_some() || pos.file.is_none());
        if !located {
            let help = ctx.help.take();
            *ctx = ErrorContext::at(pos);
            ctx.help = help;
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.ctx_mut().help = Some(help.into());
        self
    }

    /// Single-line description in the classic `Kind: message in file on line N, column M` form.
    pub fn describe(&self) -> String {
        let (message, ctx) = self.parts();
        let mut out = format!("{}Error: {}", self.kind(), message);
        if let Some(filename) = &ctx.filename {
            out.push_str(&format!(" in {filename}"));
        }
        if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
            out.push_str(&format!(" on line {line}, column {}", column + 1));
        }
        out
    }
}

impl Diagnostic for LessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("less::{}", self.kind().as_str().to_lowercase())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.context()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        // A label without source text would point into nothing.
        ctx.source.as_ref()?;
        let span = ctx.span?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(message.clone()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Renders an error with `miette`'s graphical handler.
pub fn render_error(err: LessError) -> String {
    format!("{:?}", miette::Report::new(err))
}

/// Constructs a `LessError` variant with a formatted message and no position.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:expr) => {
        $crate::LessError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $fmt:expr, $($arg:expr),+ $(,)?) => {
        $crate::LessError::$variant {
            message: format!($fmt, $($arg),+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `LessError` variant positioned at a `SourcePos`.
#[macro_export]
macro_rules! err_at {
    ($variant:ident, $pos:expr, $msg:expr) => {
        $crate::err_msg!($variant, $msg).located($pos)
    };
    ($variant:ident, $pos:expr, $fmt:expr, $($arg:expr),+ $(,)?) => {
        $crate::err_msg!($variant, $fmt, $($arg),+).located($pos)
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use std::rc::Rc;

    use miette::Report;

    use super::*;
    use crate::tree::FileInfo;

    fn pos_in(text: &str, index: usize) -> SourcePos {
        SourcePos {
            index,
            file: Some(Rc::new(FileInfo::new("input.less", text))),
        }
    }

    #[test]
    fn test_line_and_column() {
        let pos = pos_in(".a {\n  color: @x;\n}", 14);
        let err = err_at!(Name, &pos, "variable {} is undefined", "@x");
        let ctx = err.context();
        assert_eq!(ctx.line, Some(2));
        assert_eq!(ctx.column, Some(9));
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(
            err.describe(),
            "NameError: variable @x is undefined in input.less on line 2, column 10"
        );
    }

    #[test]
    fn test_located_keeps_first_position() {
        let inner = pos_in("abc\ndef", 5);
        let outer = pos_in("abc\ndef", 1);
        let err = err_at!(Runtime, &inner, "boom").located(&outer);
        assert_eq!(err.context().span.map(|s| s.start), Some(5));
    }

    #[test]
    fn test_report_includes_label_and_help() {
        let pos = pos_in(".a { width: 1px + 1s; }", 12);
        let err = err_at!(Operation, &pos, "Incompatible units").with_help("use unit()");
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("Incompatible units"));
        assert!(output.contains("use unit()"));
    }
}
