//! Rule-level nodes: declarations, extends, imports and at-rules.

use crate::tree::ruleset::Ruleset;
use crate::tree::selector::Selector;
use crate::tree::{next_id, Node, SourcePos, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// `+:` joins with commas.
    Comma,
    /// `+_:` joins with spaces.
    Space,
}

#[derive(Debug, Clone)]
pub enum DeclName {
    Plain(String),
    /// Name with `@{var}`/`${prop}` parts, joined after evaluation.
    Interpolated(Vec<Node>),
}

impl DeclName {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DeclName::Plain(s) => Some(s),
            DeclName::Interpolated(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: DeclName,
    pub value: Box<Node>,
    /// `""` or `" !important"`.
    pub important: String,
    pub merge: Option<Merge>,
    /// Inside a `style="..."`-like context; no trailing semicolon.
    pub inline: bool,
    pub variable: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: Node, pos: SourcePos) -> Self {
        let name = name.into();
        let variable = name.starts_with('@');
        Self {
            name: DeclName::Plain(name),
            value: Box::new(value),
            important: String::new(),
            merge: None,
            inline: false,
            variable,
            pos,
            visibility: Visibility::default(),
        }
    }

    pub fn with_important(mut self, important: Option<&str>) -> Self {
        self.important = important
            .map(|i| format!(" {}", i.trim()))
            .unwrap_or_default();
        self
    }

    pub fn name_str(&self) -> &str {
        self.name.as_str().unwrap_or("")
    }

    pub fn make_important(&self) -> Declaration {
        let mut d = self.clone();
        d.important = " !important".to_string();
        d
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOption {
    Exact,
    /// Matches anywhere inside target selectors.
    All,
}

/// `:extend(selector all)` on a selector or as an `&:extend()` rule.
#[derive(Debug, Clone)]
pub struct Extend {
    pub selector: Selector,
    pub option: ExtendOption,
    pub object_id: usize,
    pub parent_ids: Vec<usize>,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

impl Extend {
    pub fn new(selector: Selector, option: ExtendOption, pos: SourcePos) -> Self {
        let object_id = next_id();
        Self {
            selector,
            option,
            object_id,
            parent_ids: vec![object_id],
            pos,
            visibility: Visibility::default(),
        }
    }

    /// Fresh identity, same target.
    pub fn renew(&self) -> Self {
        let mut e = Extend::new(self.selector.clone(), self.option, self.pos.clone());
        e.visibility = self.visibility;
        e
    }

    pub fn allows_partial(&self) -> bool {
        self.option == ExtendOption::All
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub reference: bool,
    pub inline: bool,
    /// Explicit `(less)`/`(css)` override.
    pub less: Option<bool>,
    pub once: bool,
    pub multiple: bool,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: Box<Node>,
    pub features: Option<Box<Node>>,
    pub options: ImportOptions,
    /// Kept as a CSS `@import` rather than compiled.
    pub css: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
    /// Parsed contents once loaded.
    pub root: Option<Box<Ruleset>>,
    /// Raw contents for `(inline)` imports.
    pub inline_text: Option<String>,
    pub imported_filename: Option<String>,
    /// Resolved filename for `once` tracking; `None` for `(multiple)`.
    pub once_key: Option<String>,
}

impl Import {
    pub fn new(path: Node, features: Option<Node>, options: ImportOptions, pos: SourcePos) -> Self {
        let mut import = Self {
            path: Box::new(path),
            features: features.map(Box::new),
            options,
            css: false,
            pos,
            visibility: Visibility::default(),
            root: None,
            inline_text: None,
            imported_filename: None,
            once_key: None,
        };
        import.refresh_css();
        import
    }

    /// Decides between compiling and passing through as CSS; re-run once a
    /// variable path has been evaluated.
    pub fn refresh_css(&mut self) {
        self.css = match self.options.less {
            Some(less) => !less || self.options.inline,
            None if self.options.inline => true,
            None => self.path_text().is_some_and(|p| looks_like_css(&p)),
        };
    }

    /// The target as written, without `url()` or quotes, when it is literal.
    pub fn path_text(&self) -> Option<String> {
        match self.path.as_ref() {
            Node::Url(url) => match url.value.as_ref() {
                Node::Quoted(q) => Some(q.value.clone()),
                Node::Anonymous(a) => Some(a.value.clone()),
                _ => None,
            },
            Node::Quoted(q) => Some(q.value.clone()),
            _ => None,
        }
    }

    /// The path still needs variable interpolation.
    pub fn is_variable_import(&self) -> bool {
        let text = match self.path.as_ref() {
            Node::Url(url) => match url.value.as_ref() {
                Node::Quoted(q) => &q.value,
                _ => return false,
            },
            Node::Quoted(q) => &q.value,
            _ => return true,
        };
        text.contains("@{")
    }
}

fn looks_like_css(path: &str) -> bool {
    let base = path.split(['?', ';']).next().unwrap_or(path);
    base.ends_with(".css") && base.len() > 4 && {
        let before = base.as_bytes()[base.len() - 4];
        matches!(before, b'.' | b'#' | b'&')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub line_number: usize,
    pub file_name: String,
}

/// `@name value;` or `@name value { ... }` for everything but media queries.
#[derive(Debug, Clone)]
pub struct AtRule {
    pub name: String,
    pub value: Option<Box<Node>>,
    /// One synthetic ruleset holding the block body; after lowering, the
    /// flattened rulesets of that body.
    pub rules: Option<Vec<Node>>,
    /// Body is never joined with enclosing selectors (`@font-face`, `@keyframes`).
    pub is_rooted: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
    pub debug_info: Option<DebugInfo>,
}

impl AtRule {
    pub fn is_charset(&self) -> bool {
        self.name == "@charset"
    }
}

/// `@media` or `@container` with bubbling.
#[derive(Debug, Clone)]
pub struct Media {
    pub name: String,
    pub features: Box<Node>,
    /// One synthetic `&` ruleset until lowering flattens it.
    pub rules: Vec<Node>,
    pub pos: SourcePos,
    pub visibility: Visibility,
    pub debug_info: Option<DebugInfo>,
}

impl Media {
    pub fn new(name: &str, features: Node, body: Vec<Node>, pos: SourcePos) -> Self {
        let mut ruleset = Ruleset::new(Some(vec![Selector::media_empty(pos.clone())]), body);
        ruleset.allow_imports = true;
        ruleset.pos = pos.clone();
        Self {
            name: name.to_string(),
            features: Box::new(features),
            rules: vec![Node::Ruleset(Box::new(ruleset))],
            pos,
            visibility: Visibility::default(),
            debug_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Quoted;

    #[test]
    fn test_import_css_detection() {
        let quoted = |s: &str| Node::Quoted(Quoted::new('"', s, false));
        let plain = Import::new(quoted("a.css"), None, ImportOptions::default(), SourcePos::default());
        assert!(plain.css);
        let less = Import::new(quoted("a.less"), None, ImportOptions::default(), SourcePos::default());
        assert!(!less.css);
        let forced = ImportOptions {
            less: Some(true),
            ..ImportOptions::default()
        };
        assert!(!Import::new(quoted("a.css"), None, forced, SourcePos::default()).css);
        let inline = ImportOptions {
            inline: true,
            ..ImportOptions::default()
        };
        assert!(Import::new(quoted("a.less"), None, inline, SourcePos::default()).css);
        let var = Import::new(quoted("@{dir}/a.less"), None, ImportOptions::default(), SourcePos::default());
        assert!(var.is_variable_import());
    }

    #[test]
    fn test_extend_ids() {
        let e = Extend::new(Selector::new(Vec::new(), SourcePos::default()), ExtendOption::All, SourcePos::default());
        assert_eq!(e.parent_ids, vec![e.object_id]);
        assert!(e.allows_partial());
        assert_ne!(e.renew().object_id, e.object_id);
    }
}
