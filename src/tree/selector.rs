//! Selectors: element sequences joined by combinators.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tree::rules::Extend;
use crate::tree::{Node, SourcePos, Visibility};

/// The separator in front of an element: `""`, `" "`, `">"`, `"+"`, `"~"`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combinator {
    pub value: String,
}

impl Combinator {
    pub fn new(value: &str) -> Self {
        let value = if value == " " {
            " ".to_string()
        } else {
            value.trim().to_string()
        };
        Self { value }
    }

    pub fn empty() -> Self {
        Self {
            value: String::new(),
        }
    }

    pub fn descendant() -> Self {
        Self {
            value: " ".to_string(),
        }
    }

    pub fn is_empty_or_whitespace(&self) -> bool {
        self.value.is_empty() || self.value == " "
    }

    pub fn to_css(&self, compress: bool) -> String {
        if compress || matches!(self.value.as_str(), "" | " " | "|") {
            self.value.clone()
        } else {
            format!(" {} ", self.value)
        }
    }
}

/// `[key op value cif]`
#[derive(Debug, Clone)]
pub struct Attribute {
    pub key: Box<Node>,
    pub op: Option<String>,
    pub value: Option<Box<Node>>,
    pub cif: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    Text(String),
    Attribute(Attribute),
    /// `(sel, sel)` holding selectors that need parent resolution.
    Paren(Vec<Selector>),
    /// `@{name}` interpolation, resolved to `Text` by evaluation.
    Variable(String),
}

impl ElementValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ElementValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_parent_ref(&self) -> bool {
        self.as_text() == Some("&")
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub combinator: Combinator,
    pub value: ElementValue,
    pub is_variable: bool,
    pub pos: SourcePos,
}

impl Element {
    pub fn new(combinator: Combinator, value: ElementValue, pos: SourcePos) -> Self {
        let is_variable = matches!(value, ElementValue::Variable(_));
        Self {
            combinator,
            value,
            is_variable,
            pos,
        }
    }

    pub fn text(combinator: &str, value: &str) -> Self {
        Self::new(
            Combinator::new(combinator),
            ElementValue::Text(value.to_string()),
            SourcePos::default(),
        )
    }

    /// Raw text used for mixin-name matching.
    pub fn raw_value(&self) -> String {
        match &self.value {
            ElementValue::Text(s) => s.clone(),
            ElementValue::Variable(name) => name.clone(),
            ElementValue::Attribute(_) => "[]".to_string(),
            ElementValue::Paren(_) => "()".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selector {
    pub elements: Vec<Element>,
    pub extend_list: Vec<Extend>,
    /// CSS guard (`when`), evaluated into `evald_condition`.
    pub condition: Option<Box<Node>>,
    pub evald_condition: bool,
    /// Synthetic `&` wrapper of a media/at-rule body; prints no braces.
    pub media_empty: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

static MIXIN_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,&#*.\w-]([\w-]|(\\.))*").expect("static regex"));

impl Selector {
    pub fn new(elements: Vec<Element>, pos: SourcePos) -> Self {
        Self {
            elements,
            extend_list: Vec::new(),
            condition: None,
            evald_condition: true,
            media_empty: false,
            pos,
            visibility: Visibility::default(),
        }
    }

    /// The bare `&` selector, marked `media_empty`.
    pub fn media_empty(pos: SourcePos) -> Self {
        let mut sel = Self::new(vec![Element::text("", "&")], pos);
        sel.media_empty = true;
        sel
    }

    pub fn with_condition(mut self, condition: Option<Node>) -> Self {
        self.evald_condition = condition.is_none();
        self.condition = condition.map(Box::new);
        self
    }

    /// Copy with new elements, keeping flags and position.
    pub fn derive(&self, elements: Vec<Element>) -> Selector {
        Selector {
            elements,
            extend_list: self.extend_list.clone(),
            condition: None,
            evald_condition: self.evald_condition,
            media_empty: self.media_empty,
            pos: self.pos.clone(),
            visibility: self.visibility,
        }
    }

    /// Name tokens used to match mixin calls (`#ns`, `.m`), leading `&` dropped.
    pub fn mixin_elements(&self) -> Vec<String> {
        let joined: String = self
            .elements
            .iter()
            .map(|e| format!("{}{}", e.combinator.value, e.raw_value()))
            .collect();
        let mut tokens: Vec<String> = MIXIN_TOKEN
            .find_iter(&joined)
            .map(|m| m.as_str().to_string())
            .collect();
        if tokens.first().map(String::as_str) == Some("&") {
            tokens.remove(0);
        }
        tokens
    }

    /// Number of leading call elements matched by `candidate`, 0 for none.
    pub fn match_call(&self, candidate: &Selector) -> usize {
        let other = candidate.mixin_elements();
        if other.is_empty() || self.elements.len() < other.len() {
            return 0;
        }
        for (el, token) in self.elements.iter().zip(&other) {
            if el.raw_value() != *token {
                return 0;
            }
        }
        other.len()
    }

    pub fn is_just_parent_selector(&self) -> bool {
        !self.media_empty
            && self.elements.len() == 1
            && self.elements[0].value.is_parent_ref()
            && self.elements[0].combinator.is_empty_or_whitespace()
    }

    pub fn has_variable_element(&self) -> bool {
        self.elements.iter().any(|e| e.is_variable)
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(parts: &[(&str, &str)]) -> Selector {
        Selector::new(
            parts.iter().map(|(c, v)| Element::text(c, v)).collect(),
            SourcePos::default(),
        )
    }

    #[test]
    fn test_mixin_elements_split_compound_names() {
        let s = sel(&[("", "#ns"), (">", ".m")]);
        assert_eq!(s.mixin_elements(), vec!["#ns", ".m"]);
        let s = sel(&[("", "&"), ("", ".a")]);
        assert_eq!(s.mixin_elements(), vec![".a"]);
        let s = sel(&[("", ".a.b")]);
        assert_eq!(s.mixin_elements(), vec![".a", ".b"]);
    }

    #[test]
    fn test_match_call() {
        let call = sel(&[("", "#ns"), ("", ".m")]);
        assert_eq!(call.match_call(&sel(&[("", "#ns")])), 1);
        assert_eq!(call.match_call(&sel(&[("", "#ns"), (" ", ".m")])), 2);
        assert_eq!(call.match_call(&sel(&[("", ".m")])), 0);
    }

    #[test]
    fn test_combinator_css() {
        assert_eq!(Combinator::new(">").to_css(false), " > ");
        assert_eq!(Combinator::new(">").to_css(true), ">");
        assert_eq!(Combinator::new(" ").to_css(false), " ");
        assert_eq!(Combinator::new("  + ").value, "+");
        assert!(sel(&[("", "&")]).is_just_parent_selector());
        assert!(!Selector::media_empty(SourcePos::default()).is_just_parent_selector());
    }
}
