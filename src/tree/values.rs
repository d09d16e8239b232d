//! Value nodes: everything that can appear on the right of a declaration.

use crate::tree::ruleset::{FrameRef, Ruleset};
use crate::tree::{Node, SourcePos, Visibility};

/// Uninterpreted text, printed as is.
#[derive(Debug, Clone)]
pub struct Anonymous {
    pub value: String,
    pub pos: SourcePos,
    pub visibility: Visibility,
    /// Rule-level raw text (e.g. an inlined css import) that should get its own line.
    pub rules_visible: bool,
}

impl Anonymous {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pos: SourcePos::default(),
            visibility: Visibility::default(),
            rules_visible: false,
        }
    }

    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = pos;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub value: String,
}

impl Keyword {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// A string literal; `escaped` (`~"..."`) prints without quotes.
#[derive(Debug, Clone)]
pub struct Quoted {
    pub quote: char,
    pub value: String,
    pub escaped: bool,
    /// Raw text captured from a custom property or unknown at-rule: `@var`
    /// and `$prop` are interpolated without braces.
    pub bare_vars: bool,
    pub pos: SourcePos,
}

impl Quoted {
    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = pos;
        self
    }

    pub fn new(quote: char, value: impl Into<String>, escaped: bool) -> Self {
        Self {
            quote,
            value: value.into(),
            escaped,
            bare_vars: false,
            pos: SourcePos::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Url {
    pub value: Box<Node>,
    pub pos: SourcePos,
    pub is_evald: bool,
}

/// `name(args)`, either a builtin or plain CSS.
#[derive(Debug, Clone)]
pub struct Call {
    pub name: String,
    pub args: Vec<Node>,
    pub pos: SourcePos,
}

/// `@name`, or `@@name` for indirection.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub pos: SourcePos,
}

impl Variable {
    pub fn new(name: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            name: name.into(),
            pos,
        }
    }
}

/// `$name`: the value of a same-scope property.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub op: String,
    pub left: Box<Node>,
    pub right: Box<Node>,
    pub is_spaced: bool,
}

impl Operation {
    pub fn new(op: &str, left: Node, right: Node, is_spaced: bool) -> Self {
        Self {
            op: op.trim().to_string(),
            left: Box::new(left),
            right: Box::new(right),
            is_spaced,
        }
    }
}

/// Space-separated list.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub value: Vec<Node>,
    pub no_spacing: bool,
    /// Parenthesized in the source.
    pub parens: bool,
    /// Parenthesized operand of an operation.
    pub parens_in_op: bool,
}

impl Expression {
    pub fn new(value: Vec<Node>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

/// Comma-separated list.
#[derive(Debug, Clone, Default)]
pub struct Value {
    pub value: Vec<Node>,
}

impl Value {
    pub fn new(value: Vec<Node>) -> Self {
        Self { value }
    }
}

/// `key=value` inside legacy filter calls.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub key: String,
    pub value: Box<Node>,
}

/// Guard condition: `and`/`or` of conditions, or a comparison of two values.
#[derive(Debug, Clone)]
pub struct Condition {
    pub op: String,
    pub lvalue: Box<Node>,
    pub rvalue: Box<Node>,
    pub negate: bool,
    pub pos: SourcePos,
}

/// A backtick expression, delegated to the configured script evaluator.
#[derive(Debug, Clone)]
pub struct JavaScript {
    pub expression: String,
    pub escaped: bool,
    pub pos: SourcePos,
}

/// `value[@lookup][...]` on a mixin call result or detached ruleset.
#[derive(Debug, Clone)]
pub struct NamespaceValue {
    pub value: Box<Node>,
    pub lookups: Vec<String>,
    pub pos: SourcePos,
}

/// A ruleset passed around as a value, closing over its definition scope.
#[derive(Debug, Clone)]
pub struct DetachedRuleset {
    pub ruleset: Box<Ruleset>,
    pub frames: Option<Vec<FrameRef>>,
}

/// `@dr();`
#[derive(Debug, Clone)]
pub struct VariableCall {
    pub variable: String,
    pub important: bool,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub value: String,
    /// `// ...`, never printed.
    pub is_line_comment: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

impl Comment {
    /// `/*! ... */` survives compression.
    pub fn is_important(&self) -> bool {
        self.value.starts_with("/*!")
    }

    pub fn is_silent(&self, compress: bool) -> bool {
        self.is_line_comment || (compress && !self.is_important())
    }
}
