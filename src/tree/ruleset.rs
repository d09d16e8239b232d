//! Rulesets and scope lookup.
//!
//! A ruleset caches its variable and property tables and the results of
//! mixin lookups. Anything that splices `rules` must call
//! [`Ruleset::reset_cache`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::functions::FunctionRegistry;
use crate::tree::mixin::MixinDefinition;
use crate::tree::rules::{DebugInfo, Declaration};
use crate::tree::selector::Selector;
use crate::tree::{next_id, Node, SourcePos, Visibility};

/// A frame on the evaluation stack.
pub type FrameRef = Rc<RefCell<Ruleset>>;

/// Something a mixin call can resolve to.
#[derive(Debug, Clone)]
pub enum MixinRef {
    Definition(Rc<MixinDefinition>),
    /// A plain ruleset called as a mixin.
    Ruleset(Rc<Ruleset>),
}

impl MixinRef {
    pub fn id(&self) -> usize {
        match self {
            MixinRef::Definition(d) => d.id,
            MixinRef::Ruleset(r) => r.id,
        }
    }

    pub fn rules(&self) -> &[Node] {
        match self {
            MixinRef::Definition(d) => &d.rules,
            MixinRef::Ruleset(r) => &r.rules,
        }
    }

    fn selectors(&self) -> &[Selector] {
        match self {
            MixinRef::Definition(d) => &d.selectors,
            MixinRef::Ruleset(r) => r.selectors.as_deref().unwrap_or(&[]),
        }
    }

    /// Accepts a call with no arguments; namespaces must.
    pub fn accepts_no_args(&self) -> bool {
        match self {
            MixinRef::Definition(d) => d.required == 0 || (d.variadic && d.required <= 1),
            MixinRef::Ruleset(_) => true,
        }
    }
}

/// A lookup hit: the mixin plus the namespaces walked to reach it, innermost first.
#[derive(Debug, Clone)]
pub struct MixinCandidate {
    pub mixin: MixinRef,
    pub path: Vec<MixinRef>,
}

#[derive(Debug, Default)]
struct RulesetCache {
    variables: Option<Rc<HashMap<String, Declaration>>>,
    properties: Option<Rc<HashMap<String, Vec<Declaration>>>>,
    lookups: HashMap<String, Vec<MixinCandidate>>,
}

#[derive(Debug)]
pub struct Ruleset {
    /// `None` for the root and for detached/mixin bodies.
    pub selectors: Option<Vec<Selector>>,
    pub rules: Vec<Node>,
    /// Joined selector paths, filled by the selector joiner.
    pub paths: Vec<Vec<Selector>>,
    pub root: bool,
    pub first_root: bool,
    pub multi_media: bool,
    pub allow_imports: bool,
    /// Every path of this ruleset carries an `&:extend()`.
    pub extend_on_every_path: bool,
    /// Identity of the source ruleset, preserved by evaluation.
    pub id: usize,
    pub pos: SourcePos,
    pub visibility: Visibility,
    pub debug_info: Option<DebugInfo>,
    /// Function scope, set during evaluation.
    pub functions: Option<Rc<FunctionRegistry>>,
    cache: RefCell<RulesetCache>,
}

impl Clone for Ruleset {
    fn clone(&self) -> Self {
        Self {
            selectors: self.selectors.clone(),
            rules: self.rules.clone(),
            paths: self.paths.clone(),
            root: self.root,
            first_root: self.first_root,
            multi_media: self.multi_media,
            allow_imports: self.allow_imports,
            extend_on_every_path: self.extend_on_every_path,
            id: self.id,
            pos: self.pos.clone(),
            visibility: self.visibility,
            debug_info: self.debug_info.clone(),
            functions: self.functions.clone(),
            cache: RefCell::default(),
        }
    }
}

impl Ruleset {
    pub fn new(selectors: Option<Vec<Selector>>, rules: Vec<Node>) -> Self {
        Self {
            selectors,
            rules,
            paths: Vec::new(),
            root: false,
            first_root: false,
            multi_media: false,
            allow_imports: false,
            extend_on_every_path: false,
            id: next_id(),
            pos: SourcePos::default(),
            visibility: Visibility::default(),
            debug_info: None,
            functions: None,
            cache: RefCell::default(),
        }
    }

    pub fn root(rules: Vec<Node>) -> Self {
        let mut rs = Self::new(None, rules);
        rs.root = true;
        rs.first_root = true;
        rs.allow_imports = true;
        rs
    }

    pub fn into_frame(self) -> FrameRef {
        Rc::new(RefCell::new(self))
    }

    pub fn reset_cache(&self) {
        *self.cache.borrow_mut() = RulesetCache::default();
    }

    /// `@name` declarations of this block, including loaded imports.
    pub fn variables(&self) -> Rc<HashMap<String, Declaration>> {
        if let Some(vars) = &self.cache.borrow().variables {
            return Rc::clone(vars);
        }
        let mut vars = HashMap::new();
        for rule in &self.rules {
            match rule {
                Node::Declaration(d) if d.variable => {
                    vars.insert(d.name_str().to_string(), d.clone());
                }
                Node::Import(import) => {
                    if let Some(root) = &import.root {
                        for (name, decl) in root.variables().iter() {
                            vars.insert(name.clone(), decl.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        let vars = Rc::new(vars);
        self.cache.borrow_mut().variables = Some(Rc::clone(&vars));
        vars
    }

    pub fn variable(&self, name: &str) -> Option<Declaration> {
        self.variables().get(name).cloned()
    }

    /// Non-variable declarations keyed by `$name`, in source order.
    pub fn properties(&self) -> Rc<HashMap<String, Vec<Declaration>>> {
        if let Some(props) = &self.cache.borrow().properties {
            return Rc::clone(props);
        }
        let mut props: HashMap<String, Vec<Declaration>> = HashMap::new();
        for rule in &self.rules {
            if let Node::Declaration(d) = rule {
                if d.variable {
                    continue;
                }
                let name = match &d.name {
                    crate::tree::DeclName::Plain(s) => s.clone(),
                    crate::tree::DeclName::Interpolated(parts) => match parts.as_slice() {
                        [Node::Keyword(k)] => k.value.clone(),
                        _ => continue,
                    },
                };
                props.entry(format!("${name}")).or_default().push(d.clone());
            }
        }
        let props = Rc::new(props);
        self.cache.borrow_mut().properties = Some(Rc::clone(&props));
        props
    }

    pub fn property(&self, name: &str) -> Option<Vec<Declaration>> {
        self.properties().get(name).cloned()
    }

    pub fn last_declaration(&self) -> Option<Declaration> {
        self.rules.iter().rev().find_map(|r| match r {
            Node::Declaration(d) => Some(d.clone()),
            _ => None,
        })
    }

    /// Mixin candidates matching `selector` among this block's rules.
    pub fn find(&self, selector: &Selector) -> Vec<MixinCandidate> {
        let key = lookup_key(selector);
        if let Some(hit) = self.cache.borrow().lookups.get(&key) {
            return hit.clone();
        }
        let found = find_in_rules(&self.rules, selector, self.id);
        self.cache.borrow_mut().lookups.insert(key, found.clone());
        found
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn lookup_key(selector: &Selector) -> String {
    selector
        .elements
        .iter()
        .map(|e| format!("{}{}", e.combinator.value, e.raw_value()))
        .collect()
}

/// Walks `rules` for rulesets and mixin definitions whose selector matches
/// the head of `selector`, descending into namespaces for the remainder.
pub fn find_in_rules(rules: &[Node], selector: &Selector, self_id: usize) -> Vec<MixinCandidate> {
    let mut found = Vec::new();
    for rule in rules {
        let mixin = match rule {
            Node::Ruleset(rs) if rs.id != self_id => MixinRef::Ruleset(Rc::new(rs.as_ref().clone())),
            Node::MixinDefinition(def) if def.id != self_id => MixinRef::Definition(Rc::clone(def)),
            _ => continue,
        };
        for candidate_selector in mixin.selectors() {
            let matched = selector.match_call(candidate_selector);
            if matched == 0 {
                continue;
            }
            if selector.elements.len() > matched {
                if mixin.accepts_no_args() {
                    let rest = Selector::new(
                        selector.elements[matched..].to_vec(),
                        selector.pos.clone(),
                    );
                    for mut inner in find_in_rules(mixin.rules(), &rest, self_id) {
                        inner.path.push(mixin.clone());
                        found.push(inner);
                    }
                }
            } else {
                found.push(MixinCandidate {
                    mixin: mixin.clone(),
                    path: Vec::new(),
                });
            }
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Element;
    use crate::tree::{Anonymous, Declaration};

    fn call_selector(names: &[&str]) -> Selector {
        Selector::new(
            names.iter().map(|n| Element::text("", n)).collect(),
            SourcePos::default(),
        )
    }

    fn decl(name: &str, value: &str) -> Node {
        Node::Declaration(Declaration::new(
            name,
            Node::Anonymous(Anonymous::new(value)),
            SourcePos::default(),
        ))
    }

    fn ruleset(name: &str, rules: Vec<Node>) -> Node {
        Node::Ruleset(Box::new(Ruleset::new(Some(vec![call_selector(&[name])]), rules)))
    }

    #[test]
    fn test_variables_and_properties() {
        let rs = Ruleset::new(
            None,
            vec![decl("@a", "1"), decl("color", "red"), decl("color", "blue")],
        );
        assert!(rs.variable("@a").is_some());
        assert!(rs.variable("@b").is_none());
        assert_eq!(rs.property("$color").map(|v| v.len()), Some(2));
        assert_eq!(rs.last_declaration().map(|d| d.name_str().to_string()), Some("color".into()));
    }

    #[test]
    fn test_find_through_namespace() {
        let inner = ruleset(".m", vec![decl("color", "red")]);
        let ns = ruleset("#ns", vec![inner]);
        let root = Ruleset::new(None, vec![ns]);
        let hits = root.find(&call_selector(&["#ns", ".m"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.len(), 1);
        assert!(root.find(&call_selector(&[".m"])).is_empty());
    }

    #[test]
    fn test_reset_cache_after_splice() {
        let mut rs = Ruleset::new(None, vec![decl("@a", "1")]);
        assert!(rs.variable("@b").is_none());
        rs.rules.push(decl("@b", "2"));
        assert!(rs.variable("@b").is_none());
        rs.reset_cache();
        assert!(rs.variable("@b").is_some());
    }
}
