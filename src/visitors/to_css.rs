//! Final tree shaping before generation.
//!
//! Nested rulesets are lifted out of their parents so the output is flat,
//! and everything that produces no CSS is dropped: variable declarations,
//! mixin definitions, extends, silent comments, invisible paths and the
//! parts of reference imports nothing made visible. Merged properties
//! (`+:`/`+_:`) are combined and exact duplicate declarations removed.

use std::collections::HashMap;

use crate::diagnostics::LessResult;
use crate::output::{node_css, GenContext};
use crate::tree::{
    AtRule, Combinator, Comment, Declaration, Expression, Media, Merge, Node, Ruleset, Value, Visibility,
};
use crate::{err_at, err_msg};

/// Flattens `root` in place.
pub fn to_css_tree(root: &mut Ruleset, compress: bool) -> LessResult<()> {
    let mut visitor = ToCssVisitor {
        compress,
        charset: false,
    };
    let body = std::mem::replace(root, Ruleset::root(Vec::new()));
    let mut lowered = visitor.visit_ruleset(body)?.into_iter();
    match lowered.next() {
        Some(Node::Ruleset(rs)) => *root = *rs,
        _ => {
            root.first_root = true;
        }
    }
    Ok(())
}

struct ToCssVisitor {
    compress: bool,
    /// A `@charset` was already kept.
    charset: bool,
}

impl ToCssVisitor {
    fn visit_rules(&mut self, rules: Vec<Node>) -> LessResult<Vec<Node>> {
        let mut out = Vec::with_capacity(rules.len());
        for rule in rules {
            out.extend(self.visit(rule)?);
        }
        Ok(out)
    }

    fn visit(&mut self, node: Node) -> LessResult<Vec<Node>> {
        let keep = match &node {
            Node::Declaration(d) => !d.visibility.blocks_visibility() && !d.variable,
            Node::MixinDefinition(_) | Node::Extend(_) => false,
            Node::Comment(c) => !c.visibility.blocks_visibility() && !self.is_silent(c),
            Node::Import(_) | Node::Anonymous(_) => !node.blocks_visibility(),
            _ => true,
        };
        if !keep {
            return Ok(Vec::new());
        }
        match node {
            Node::Ruleset(rs) => self.visit_ruleset(*rs),
            Node::Media(media) => Ok(self.visit_media(media)?.into_iter().collect()),
            Node::AtRule(at) => self.visit_at_rule(at),
            other => Ok(vec![other]),
        }
    }

    fn is_silent(&self, comment: &Comment) -> bool {
        comment.is_line_comment || (self.compress && comment.value.as_bytes().get(2) != Some(&b'!'))
    }

    /// The ruleset followed by every ruleset, media block and at-rule that
    /// was nested in it.
    fn visit_ruleset(&mut self, mut rs: Ruleset) -> LessResult<Vec<Node>> {
        check_valid_nodes(&rs.rules, rs.first_root)?;
        let mut lifted = Vec::new();
        let rules = std::mem::take(&mut rs.rules);
        if rs.root {
            rs.rules = self.visit_rules(rules)?;
        } else {
            compile_paths(&mut rs);
            let mut own = Vec::with_capacity(rules.len());
            for rule in rules {
                if rule.is_ruleset_like() {
                    lifted.extend(self.visit(rule)?);
                } else {
                    own.push(rule);
                }
            }
            rs.rules = self.visit_rules(own)?;
        }
        merge_rules(&mut rs.rules);
        remove_duplicate_rules(&mut rs.rules)?;

        let mut out = Vec::with_capacity(lifted.len() + 1);
        if rs.first_root || (!rs.rules.is_empty() && (rs.root || !rs.paths.is_empty())) {
            rs.visibility.ensure_visible();
            out.push(Node::Ruleset(Box::new(rs)));
        }
        out.extend(lifted);
        Ok(out)
    }

    fn visit_media(&mut self, mut media: Media) -> LessResult<Option<Node>> {
        let original = body_rules(&media.rules);
        media.rules = self.visit_rules(std::mem::take(&mut media.rules))?;
        Ok(self.resolve_visibility(Node::Media(media), &original))
    }

    fn visit_at_rule(&mut self, mut at: AtRule) -> LessResult<Vec<Node>> {
        match at.rules.take() {
            Some(rules) if !rules.is_empty() => {
                let original = body_rules(&rules);
                let mut rules = self.visit_rules(rules)?;
                if let Some(Node::Ruleset(body)) = rules.first_mut() {
                    merge_rules(&mut body.rules);
                }
                at.rules = Some(rules);
                Ok(self.resolve_visibility(Node::AtRule(at), &original).into_iter().collect())
            }
            rules => {
                at.rules = rules;
                if at.visibility.blocks_visibility() {
                    return Ok(Vec::new());
                }
                if at.is_charset() {
                    if self.charset {
                        return Ok(Vec::new());
                    }
                    self.charset = true;
                }
                Ok(vec![Node::AtRule(at)])
            }
        }
    }

    /// A block from a reference import is kept only for the parts that were
    /// made visible; any other block is kept unless it ended up empty.
    fn resolve_visibility(&self, mut node: Node, original: &[Node]) -> Option<Node> {
        if !matches!(node, Node::Media(_) | Node::AtRule(_)) {
            return Some(node);
        }
        let blocked = node.blocks_visibility();
        let rules = match &mut node {
            Node::Media(media) => &mut media.rules,
            Node::AtRule(at) => at.rules.get_or_insert_with(Vec::new),
            _ => return None,
        };
        if !blocked {
            let silent_child = original.iter().any(|rule| match rule {
                Node::Comment(c) => self.is_silent(c) && !c.visibility.blocks_visibility(),
                _ => false,
            });
            if rules.is_empty() && !silent_child {
                return None;
            }
            return Some(node);
        }

        let empty = match rules.first_mut() {
            Some(Node::Ruleset(body)) => {
                body.rules.retain(|rule| rule.visibility().is_some_and(Visibility::is_visible));
                body.rules.is_empty()
            }
            _ => true,
        };
        if empty {
            return None;
        }
        if let Some(visibility) = node.visibility_mut() {
            visibility.ensure_visible();
            visibility.remove_block();
        }
        Some(node)
    }
}

/// Rules of a block's synthetic body ruleset, or the block's own rules.
fn body_rules(rules: &[Node]) -> Vec<Node> {
    match rules {
        [Node::Ruleset(body)] if body.paths.is_empty() => body.rules.clone(),
        other => other.to_vec(),
    }
}

/// Drops paths with no visible selector and strips the leading descendant
/// combinator a joined path starts with.
fn compile_paths(rs: &mut Ruleset) {
    rs.paths.retain_mut(|path| {
        if let Some(first) = path.first_mut().and_then(|s| s.elements.first_mut()) {
            if first.combinator.value == " " {
                first.combinator = Combinator::empty();
            }
        }
        path.iter().any(|s| s.is_visible() && s.evald_condition)
    });
}

fn check_valid_nodes(rules: &[Node], is_root: bool) -> LessResult<()> {
    for rule in rules {
        match rule {
            Node::Declaration(d) if is_root && !d.variable => {
                return Err(err_at!(
                    Syntax,
                    &d.pos,
                    "Properties must be inside selector blocks. They cannot be in the root"
                ));
            }
            Node::Call(call) => {
                return Err(err_at!(Syntax, &call.pos, "Function '{}' did not return a root node", call.name));
            }
            Node::Anonymous(_)
            | Node::Comment(_)
            | Node::Declaration(_)
            | Node::Ruleset(_)
            | Node::MixinDefinition(_)
            | Node::MixinCall(_)
            | Node::Extend(_)
            | Node::Import(_)
            | Node::AtRule(_)
            | Node::Media(_) => {}
            other => {
                let err = err_msg!(Syntax, "{} node returned by a function is not valid here", other.type_name());
                return Err(match other.pos() {
                    Some(pos) => err.located(pos),
                    None => err,
                });
            }
        }
    }
    Ok(())
}

/// Combines `+:` and `+_:` declarations of the same name into the first
/// of them; the others are removed. `+:` starts a new comma-separated
/// part, `+_:` continues the current space-separated one.
pub fn merge_rules(rules: &mut Vec<Node>) {
    let mut group_of: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(usize, Vec<Declaration>)> = Vec::new();
    let mut kept = Vec::with_capacity(rules.len());
    for rule in rules.drain(..) {
        match rule {
            Node::Declaration(decl) if decl.merge.is_some() => {
                match group_of.get(decl.name_str()) {
                    Some(&group) => groups[group].1.push(decl),
                    None => {
                        group_of.insert(decl.name_str().to_string(), groups.len());
                        groups.push((kept.len(), vec![decl.clone()]));
                        kept.push(Node::Declaration(decl));
                    }
                }
            }
            other => kept.push(other),
        }
    }

    for (index, members) in groups {
        let mut comma = Vec::new();
        let mut space = Vec::new();
        let mut important = String::new();
        for decl in members {
            if decl.merge == Some(Merge::Comma) && !space.is_empty() {
                comma.push(Node::Expression(Expression::new(std::mem::take(&mut space))));
            }
            space.push(*decl.value);
            if important.is_empty() {
                important = decl.important;
            }
        }
        comma.push(Node::Expression(Expression::new(space)));
        if let Some(Node::Declaration(first)) = kept.get_mut(index) {
            first.value = Box::new(Node::Value(Value::new(comma)));
            first.important = important;
        }
    }
    *rules = kept;
}

/// Removes a declaration when a later one has the same name and text.
fn remove_duplicate_rules(rules: &mut Vec<Node>) -> LessResult<()> {
    let ctx = GenContext::inline(false);
    let mut seen: HashMap<String, Vec<String>> = HashMap::new();
    for i in (0..rules.len()).rev() {
        let Node::Declaration(decl) = &rules[i] else {
            continue;
        };
        let text = format!("{}{}", node_css(&decl.value, &ctx)?, decl.important);
        let texts = seen.entry(decl.name_str().to_string()).or_default();
        if texts.contains(&text) {
            rules.remove(i);
        } else {
            texts.push(text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Element, Selector, SourcePos};

    fn decl(name: &str, value: &str) -> Node {
        Node::Declaration(Declaration::new(name, Node::keyword(value), SourcePos::default()))
    }

    fn merge_decl(name: &str, value: &str, merge: Merge) -> Node {
        let mut d = Declaration::new(name, Node::keyword(value), SourcePos::default());
        d.merge = Some(merge);
        Node::Declaration(d)
    }

    fn visible_ruleset(name: &str, rules: Vec<Node>) -> Ruleset {
        let mut sel = Selector::new(vec![Element::text("", name)], SourcePos::default());
        sel.visibility.ensure_visible();
        let mut rs = Ruleset::new(Some(vec![sel.clone()]), rules);
        rs.paths = vec![vec![sel]];
        rs
    }

    fn value_css(node: &Node) -> String {
        let Node::Declaration(d) = node else { panic!("not a declaration") };
        node_css(&d.value, &GenContext::inline(false)).unwrap()
    }

    #[test]
    fn test_merge_rules_comma_and_space() {
        let mut rules = vec![
            merge_decl("a", "1", Merge::Comma),
            decl("b", "x"),
            merge_decl("a", "2", Merge::Comma),
            merge_decl("a", "3", Merge::Space),
        ];
        merge_rules(&mut rules);
        assert_eq!(rules.len(), 2);
        assert_eq!(value_css(&rules[0]), "1, 2 3");
    }

    #[test]
    fn test_duplicates_keep_last() {
        let mut rules = vec![decl("color", "red"), decl("color", "blue"), decl("color", "red")];
        remove_duplicate_rules(&mut rules).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(value_css(&rules[0]), "blue");
    }

    #[test]
    fn test_nested_rulesets_are_lifted() {
        let inner = visible_ruleset(".b", vec![decl("x", "1")]);
        let outer = visible_ruleset(".a", vec![decl("y", "2"), Node::Ruleset(Box::new(inner))]);
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(outer))]);
        root.first_root = true;
        to_css_tree(&mut root, false).unwrap();
        assert_eq!(root.rules.len(), 2);
        assert!(root.rules.iter().all(|r| matches!(r, Node::Ruleset(rs) if rs.rules.len() == 1)));
    }

    #[test]
    fn test_variables_and_empty_rulesets_dropped() {
        let outer = visible_ruleset(".a", vec![decl("@v", "1")]);
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(outer)), decl("@w", "2")]);
        root.first_root = true;
        to_css_tree(&mut root, false).unwrap();
        assert!(root.rules.is_empty());
    }

    #[test]
    fn test_root_property_is_an_error() {
        let mut root = Ruleset::root(vec![decl("color", "red")]);
        root.first_root = true;
        let err = to_css_tree(&mut root, false).unwrap_err();
        assert_eq!(
            err.message(),
            "Properties must be inside selector blocks. They cannot be in the root"
        );
    }

    #[test]
    fn test_invisible_paths_removed() {
        let mut rs = visible_ruleset(".a", vec![decl("x", "1")]);
        rs.paths[0][0].visibility = Visibility::default();
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(rs))]);
        root.first_root = true;
        to_css_tree(&mut root, false).unwrap();
        assert!(root.rules.is_empty());
    }
}
