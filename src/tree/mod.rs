//! # Stylesheet Tree
//!
//! The closed set of node kinds produced by the parser, rewritten by
//! evaluation and the lowering visitors, and finally emitted as CSS.
//!
//! ## Module Structure
//!
//! - **`color`**, **`dimension`**: numeric values with their arithmetic
//! - **`selector`**: selectors, elements, combinators, attributes
//! - **`ruleset`**: `{}` blocks, their lazy caches and mixin lookup
//! - **`mixin`**: mixin definitions and call sites
//! - **`values`**: the remaining value nodes
//! - **`rules`**: declarations, extends, imports, at-rules and media
//!
//! Evaluation lives in `crate::eval`, emission in `crate::output`.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use miette::NamedSource;

use crate::diagnostics::SourceArc;

pub mod color;
pub mod dimension;
pub mod mixin;
pub mod rules;
pub mod ruleset;
pub mod selector;
pub mod values;

pub use color::Color;
pub use dimension::{Dimension, Unit};
pub use mixin::{MixinArg, MixinCall, MixinDefinition, MixinParam};
pub use rules::{
    AtRule, DebugInfo, DeclName, Declaration, Extend, ExtendOption, Import, ImportOptions, Media,
    Merge,
};
pub use ruleset::{FrameRef, MixinCandidate, MixinRef, Ruleset};
pub use selector::{Attribute, Combinator, Element, ElementValue, Selector};
pub use values::{
    Anonymous, Assignment, Call, Comment, Condition, DetachedRuleset, Expression, JavaScript,
    Keyword, NamespaceValue, Operation, Property, Quoted, Url, Value, Variable, VariableCall,
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique identity used for mixin recursion guards and extend ancestry.
pub fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// POSITIONS
// ============================================================================

/// One loaded source file.
#[derive(Debug)]
pub struct FileInfo {
    pub filename: String,
    /// Directory of `filename`, used to resolve nested imports and urls.
    pub current_directory: PathBuf,
    /// Directory of the entry file.
    pub entry_path: PathBuf,
    /// Loaded through `@import (reference)`.
    pub reference: bool,
    pub source: SourceArc,
}

impl FileInfo {
    pub fn new(filename: &str, contents: &str) -> Self {
        let current_directory = std::path::Path::new(filename)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        Self {
            filename: filename.to_string(),
            entry_path: current_directory.clone(),
            current_directory,
            reference: false,
            source: Arc::new(NamedSource::new(filename, contents.to_string())),
        }
    }

    pub fn contents(&self) -> &str {
        self.source.inner()
    }
}

pub type FileRef = Rc<FileInfo>;

/// Byte offset into a file.
#[derive(Debug, Clone, Default)]
pub struct SourcePos {
    pub index: usize,
    pub file: Option<FileRef>,
}

impl SourcePos {
    pub fn new(index: usize, file: Option<FileRef>) -> Self {
        Self { index, file }
    }

    pub fn filename(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.filename.as_str())
    }

    /// Identity of the position, stable across clones of the node holding it.
    pub fn key(&self) -> (usize, usize) {
        let file = self.file.as_ref().map_or(0, |f| Rc::as_ptr(f) as usize);
        (self.index, file)
    }
}

// ============================================================================
// VISIBILITY
// ============================================================================

/// Output suppression for nodes pulled in by `@import (reference)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    pub blocks: u32,
    pub visible: Option<bool>,
}

impl Visibility {
    pub fn blocks_visibility(&self) -> bool {
        self.blocks > 0
    }

    pub fn add_block(&mut self) {
        self.blocks += 1;
    }

    pub fn remove_block(&mut self) {
        self.blocks = self.blocks.saturating_sub(1);
    }

    pub fn ensure_visible(&mut self) {
        self.visible = Some(true);
    }

    pub fn ensure_invisible(&mut self) {
        self.visible = Some(false);
    }

    /// Only nodes explicitly marked after evaluation count as visible.
    pub fn is_visible(&self) -> bool {
        self.visible == Some(true)
    }
}

// ============================================================================
// NODE
// ============================================================================

#[derive(Debug, Clone)]
pub enum Node {
    Anonymous(Anonymous),
    Keyword(Keyword),
    Color(Color),
    Dimension(Dimension),
    Quoted(Quoted),
    Url(Url),
    UnicodeDescriptor(String),
    Call(Call),
    Variable(Variable),
    Property(Property),
    Operation(Operation),
    Negative(Box<Node>),
    Expression(Expression),
    Value(Value),
    Paren(Box<Node>),
    Assignment(Assignment),
    Attribute(Attribute),
    Condition(Condition),
    JavaScript(JavaScript),
    NamespaceValue(NamespaceValue),
    DetachedRuleset(DetachedRuleset),
    VariableCall(VariableCall),
    Comment(Comment),
    Declaration(Declaration),
    Ruleset(Box<Ruleset>),
    MixinDefinition(Rc<MixinDefinition>),
    MixinCall(MixinCall),
    Extend(Extend),
    Import(Import),
    AtRule(AtRule),
    Media(Media),
}

impl Node {
    pub fn keyword(value: &str) -> Node {
        Node::Keyword(Keyword::new(value))
    }

    pub fn anonymous(value: impl Into<String>) -> Node {
        Node::Anonymous(Anonymous::new(value))
    }

    pub fn boolean(value: bool) -> Node {
        Node::keyword(if value { "true" } else { "false" })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Anonymous(_) => "Anonymous",
            Node::Keyword(_) => "Keyword",
            Node::Color(_) => "Color",
            Node::Dimension(_) => "Dimension",
            Node::Quoted(_) => "Quoted",
            Node::Url(_) => "Url",
            Node::UnicodeDescriptor(_) => "UnicodeDescriptor",
            Node::Call(_) => "Call",
            Node::Variable(_) => "Variable",
            Node::Property(_) => "Property",
            Node::Operation(_) => "Operation",
            Node::Negative(_) => "Negative",
            Node::Expression(_) => "Expression",
            Node::Value(_) => "Value",
            Node::Paren(_) => "Paren",
            Node::Assignment(_) => "Assignment",
            Node::Attribute(_) => "Attribute",
            Node::Condition(_) => "Condition",
            Node::JavaScript(_) => "JavaScript",
            Node::NamespaceValue(_) => "NamespaceValue",
            Node::DetachedRuleset(_) => "DetachedRuleset",
            Node::VariableCall(_) => "VariableCall",
            Node::Comment(_) => "Comment",
            Node::Declaration(_) => "Declaration",
            Node::Ruleset(_) => "Ruleset",
            Node::MixinDefinition(_) => "MixinDefinition",
            Node::MixinCall(_) => "MixinCall",
            Node::Extend(_) => "Extend",
            Node::Import(_) => "Import",
            Node::AtRule(_) => "AtRule",
            Node::Media(_) => "Media",
        }
    }

    /// Source position, for the node kinds that record one.
    pub fn pos(&self) -> Option<&SourcePos> {
        match self {
            Node::Anonymous(n) => Some(&n.pos),
            Node::Quoted(n) => Some(&n.pos),
            Node::Url(n) => Some(&n.pos),
            Node::Call(n) => Some(&n.pos),
            Node::Variable(n) => Some(&n.pos),
            Node::Property(n) => Some(&n.pos),
            Node::Condition(n) => Some(&n.pos),
            Node::JavaScript(n) => Some(&n.pos),
            Node::NamespaceValue(n) => Some(&n.pos),
            Node::VariableCall(n) => Some(&n.pos),
            Node::Comment(n) => Some(&n.pos),
            Node::Declaration(n) => Some(&n.pos),
            Node::Ruleset(n) => Some(&n.pos),
            Node::MixinDefinition(n) => Some(&n.pos),
            Node::MixinCall(n) => Some(&n.pos),
            Node::Extend(n) => Some(&n.pos),
            Node::Import(n) => Some(&n.pos),
            Node::AtRule(n) => Some(&n.pos),
            Node::Media(n) => Some(&n.pos),
            _ => None,
        }
    }

    pub fn visibility(&self) -> Option<&Visibility> {
        match self {
            Node::Anonymous(n) => Some(&n.visibility),
            Node::Comment(n) => Some(&n.visibility),
            Node::Declaration(n) => Some(&n.visibility),
            Node::Ruleset(n) => Some(&n.visibility),
            Node::MixinCall(n) => Some(&n.visibility),
            Node::Extend(n) => Some(&n.visibility),
            Node::Import(n) => Some(&n.visibility),
            Node::AtRule(n) => Some(&n.visibility),
            Node::Media(n) => Some(&n.visibility),
            Node::MixinDefinition(n) => Some(&n.visibility),
            _ => None,
        }
    }

    pub fn visibility_mut(&mut self) -> Option<&mut Visibility> {
        match self {
            Node::Anonymous(n) => Some(&mut n.visibility),
            Node::Comment(n) => Some(&mut n.visibility),
            Node::Declaration(n) => Some(&mut n.visibility),
            Node::Ruleset(n) => Some(&mut n.visibility),
            Node::MixinCall(n) => Some(&mut n.visibility),
            Node::Extend(n) => Some(&mut n.visibility),
            Node::Import(n) => Some(&mut n.visibility),
            Node::AtRule(n) => Some(&mut n.visibility),
            Node::Media(n) => Some(&mut n.visibility),
            _ => None,
        }
    }

    pub fn blocks_visibility(&self) -> bool {
        self.visibility().is_some_and(Visibility::blocks_visibility)
    }

    /// Adds one visibility block to this node only; descendants of a blocked
    /// node are simply never marked visible.
    pub fn add_visibility_block(&mut self) {
        match self {
            Node::MixinDefinition(def) => Rc::make_mut(def).visibility.add_block(),
            other => {
                if let Some(vis) = other.visibility_mut() {
                    vis.add_block();
                }
            }
        }
    }

    /// Copies `vis` onto this node if it tracks visibility.
    pub fn copy_visibility(&mut self, vis: &Visibility) {
        if let Some(own) = self.visibility_mut() {
            *own = *vis;
        }
    }

    pub fn is_variable_declaration(&self) -> bool {
        matches!(self, Node::Declaration(d) if d.variable)
    }

    /// Nodes that carry a nested rule body (`rules` in the tree shape).
    pub fn is_ruleset_like(&self) -> bool {
        matches!(
            self,
            Node::Ruleset(_) | Node::Media(_) | Node::MixinDefinition(_) | Node::DetachedRuleset(_)
        ) || matches!(self, Node::AtRule(at) if at.rules.is_some())
    }

    /// Children in a `Value`/`Expression`, or the node itself.
    pub fn list_items(&self) -> Vec<Node> {
        match self {
            Node::Value(v) => v.value.clone(),
            Node::Expression(e) => e.value.clone(),
            other => vec![other.clone()],
        }
    }
}
