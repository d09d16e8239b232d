//! `:extend()` resolution.
//!
//! Runs after selectors are joined. Every extend is first collected along
//! with the selector path it sits on (its "self" selector) and the ruleset
//! owning that path. Extends are then chained: an extend whose target
//! matches another extend's self selector produces a new extend, so
//! `.c:extend(.b)` and `.b:extend(.a)` together make `.c` extend `.a`.
//! Finally each ruleset path is matched against the extends in scope and
//! the rewritten paths appended.
//!
//! Extends inside `@media` and other at-rule blocks only apply inside that
//! block; top-level extends apply everywhere.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::diagnostics::LessResult;
use crate::output::{node_css, selector_css, GenContext};
use crate::tree::{Combinator, Element, ElementValue, Extend, Node, Ruleset, Selector};
use crate::err_msg;

type Path = Vec<Selector>;

/// Chains deeper than this are treated as circular.
const MAX_CHAIN_ITERATIONS: usize = 100;

/// Applies every extend under `root` and returns one warning per
/// top-level extend that matched nothing.
pub fn process_extends(root: &mut Ruleset) -> LessResult<Vec<String>> {
    let mut processor = ExtendProcessor::default();
    processor.find_in_ruleset(root, None);
    if processor.extends.is_empty() {
        return Ok(Vec::new());
    }
    debug!(extends = processor.extends.len(), "processing extends");

    let root_scope = processor.root_scope.clone();
    let chained = processor.chain(&root_scope, &root_scope, 0)?;
    processor.root_scope.extend(chained);

    processor.ruleset_count = 0;
    processor.block_count = 0;
    let scope = processor.root_scope.clone();
    processor.visit_ruleset(root, &scope)?;
    Ok(processor.unmatched())
}

#[derive(Debug, Clone)]
struct FoundExtend {
    extend: Extend,
    /// What gets substituted for a match: the owning path flattened into one
    /// selector, or for chained extends the rewritten path.
    self_selectors: Vec<Selector>,
    /// Pre-order index of the owning ruleset.
    ruleset: usize,
    /// First extend on its path; chained results are added to the ruleset once.
    first_on_path: bool,
    found_matches: bool,
}

#[derive(Debug, Default)]
struct ExtendProcessor {
    extends: Vec<FoundExtend>,
    root_scope: Vec<usize>,
    /// Own extends of each media/at-rule block, in pre-order.
    block_scopes: Vec<Vec<usize>>,
    /// Paths produced by chaining, waiting for their ruleset to be visited.
    pending: HashMap<usize, Vec<Path>>,
    ruleset_count: usize,
    block_count: usize,
}

/// Where a match of an extend's target starts and ends inside a path.
#[derive(Debug, Clone)]
struct Match {
    path_index: usize,
    index: usize,
    initial_combinator: Combinator,
    end_path_index: usize,
    /// Element index just past the match.
    end_path_element_index: usize,
}

#[derive(Debug)]
struct Candidate {
    path_index: usize,
    index: usize,
    matched: usize,
    initial_combinator: Combinator,
}

impl ExtendProcessor {
    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    fn find_in_rules(&mut self, rules: &mut [Node], scope: Option<usize>) {
        for rule in rules {
            match rule {
                Node::Ruleset(rs) => self.find_in_ruleset(rs, scope),
                Node::Media(media) => {
                    let block = self.open_block();
                    self.find_in_rules(&mut media.rules, Some(block));
                }
                Node::AtRule(at) => {
                    if let Some(rules) = at.rules.as_mut() {
                        let block = self.open_block();
                        self.find_in_rules(rules, Some(block));
                    }
                }
                _ => {}
            }
        }
    }

    fn open_block(&mut self) -> usize {
        self.block_scopes.push(Vec::new());
        self.block_scopes.len() - 1
    }

    fn find_in_ruleset(&mut self, rs: &mut Ruleset, scope: Option<usize>) {
        let index = self.ruleset_count;
        self.ruleset_count += 1;
        if !rs.root {
            let rule_extends: Vec<Extend> = rs
                .rules
                .iter()
                .filter_map(|rule| match rule {
                    Node::Extend(extend) => Some(extend.clone()),
                    _ => None,
                })
                .collect();
            if !rule_extends.is_empty() {
                rs.extend_on_every_path = true;
            }
            for path in &rs.paths {
                let Some(last) = path.last() else {
                    continue;
                };
                for (j, extend) in last.extend_list.iter().chain(&rule_extends).enumerate() {
                    let extend = extend.renew();
                    let found = FoundExtend {
                        self_selectors: vec![self_selector(path, &extend)],
                        extend,
                        ruleset: index,
                        first_on_path: j == 0,
                        found_matches: false,
                    };
                    let id = self.extends.len();
                    self.extends.push(found);
                    match scope {
                        Some(block) => self.block_scopes[block].push(id),
                        None => self.root_scope.push(id),
                    }
                }
            }
        }
        self.find_in_rules(&mut rs.rules, scope);
    }

    // ------------------------------------------------------------------
    // Chaining
    // ------------------------------------------------------------------

    /// Matches each extend of `list` against the self selectors of
    /// `targets`, repeating on the results until nothing new appears.
    fn chain(&mut self, list: &[usize], targets: &[usize], iteration: usize) -> LessResult<Vec<usize>> {
        let mut added = Vec::new();
        for &e in list {
            for &t in targets {
                if self.extends[e].extend.parent_ids.contains(&self.extends[t].extend.object_id) {
                    continue;
                }
                let Some(target_self) = self.extends[t].self_selectors.first() else {
                    continue;
                };
                let haystack = vec![target_self.clone()];
                let matches = find_match(&self.extends[e].extend, &haystack);
                if matches.is_empty() {
                    continue;
                }
                self.extends[e].found_matches = true;

                let visible = self.extends[e].extend.visibility.is_visible();
                let replacements = self.extends[e].self_selectors.clone();
                let parent_ids = self.extends[e].extend.parent_ids.clone();
                let target = self.extends[t].clone();
                for replacement in &replacements {
                    let mut new_path = extend_selector(&matches, &haystack, replacement, visible);
                    let mut new_extend = Extend::new(
                        target.extend.selector.clone(),
                        target.extend.option,
                        target.extend.pos.clone(),
                    );
                    new_extend.visibility = target.extend.visibility;
                    new_extend.parent_ids.extend(&target.extend.parent_ids);
                    new_extend.parent_ids.extend(&parent_ids);
                    if let Some(last) = new_path.last_mut() {
                        last.extend_list = vec![new_extend.clone()];
                    }
                    if target.first_on_path {
                        self.pending.entry(target.ruleset).or_default().push(new_path.clone());
                    }
                    added.push(self.extends.len());
                    self.extends.push(FoundExtend {
                        extend: new_extend,
                        self_selectors: new_path,
                        ruleset: target.ruleset,
                        first_on_path: target.first_on_path,
                        found_matches: false,
                    });
                }
            }
        }
        if added.is_empty() {
            return Ok(added);
        }
        if iteration > MAX_CHAIN_ITERATIONS {
            let first = &self.extends[added[0]];
            let self_text = first
                .self_selectors
                .first()
                .map_or_else(|| "{unable to calculate}".to_string(), selector_text);
            return Err(err_msg!(
                Runtime,
                "extend circular reference detected. One of the circular extends is currently:{}:extend({})",
                self_text,
                selector_text(&first.extend.selector)
            ));
        }
        let more = self.chain(&added, targets, iteration + 1)?;
        added.extend(more);
        Ok(added)
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    fn visit_rules(&mut self, rules: &mut [Node], scope: &[usize]) -> LessResult<()> {
        for rule in rules {
            match rule {
                Node::Ruleset(rs) => self.visit_ruleset(rs, scope)?,
                Node::Media(media) => {
                    let inner = self.enter_block(scope)?;
                    self.visit_rules(&mut media.rules, &inner)?;
                }
                Node::AtRule(at) => {
                    if let Some(rules) = at.rules.as_mut() {
                        let inner = self.enter_block(scope)?;
                        self.visit_rules(rules, &inner)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Extends visible inside the next block: its own, the enclosing ones,
    /// and whatever chaining them onto its own produces.
    fn enter_block(&mut self, outer: &[usize]) -> LessResult<Vec<usize>> {
        let own = self.block_scopes.get(self.block_count).cloned().unwrap_or_default();
        self.block_count += 1;
        let mut all = own.clone();
        all.extend_from_slice(outer);
        let chained = self.chain(&all, &own, 0)?;
        all.extend(chained);
        Ok(all)
    }

    fn visit_ruleset(&mut self, rs: &mut Ruleset, scope: &[usize]) -> LessResult<()> {
        let index = self.ruleset_count;
        self.ruleset_count += 1;
        if let Some(chained) = self.pending.remove(&index) {
            rs.paths.extend(chained);
        }
        if !rs.root && !rs.extend_on_every_path {
            let mut additions = Vec::new();
            for &e in scope {
                for path in &rs.paths {
                    if path.last().is_some_and(|s| !s.extend_list.is_empty()) {
                        continue;
                    }
                    let matches = find_match(&self.extends[e].extend, path);
                    if matches.is_empty() {
                        continue;
                    }
                    let found = &mut self.extends[e];
                    found.found_matches = true;
                    let visible = found.extend.visibility.is_visible();
                    for replacement in &found.self_selectors {
                        additions.push(extend_selector(&matches, path, replacement, visible));
                    }
                }
            }
            rs.paths.extend(additions);
        }
        self.visit_rules(&mut rs.rules, scope)
    }

    fn unmatched(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut warnings = Vec::new();
        for &id in &self.root_scope {
            let found = &self.extends[id];
            if found.found_matches || found.extend.parent_ids.len() != 1 {
                continue;
            }
            let selector = selector_text(&found.extend.selector);
            if seen.insert((found.extend.pos.key(), selector.clone())) {
                let message = format!("extend '{selector}' has no matches");
                warn!("{}", message);
                warnings.push(message);
            }
        }
        warnings
    }
}

/// The path an extend sits on, as one selector.
fn self_selector(path: &[Selector], extend: &Extend) -> Selector {
    let mut elements = Vec::new();
    for (i, selector) in path.iter().enumerate() {
        for (j, element) in selector.elements.iter().enumerate() {
            let mut element = element.clone();
            if i > 0 && j == 0 && element.combinator.value.is_empty() {
                element.combinator = Combinator::descendant();
            }
            elements.push(element);
        }
    }
    let mut selector = Selector::new(elements, extend.pos.clone());
    selector.visibility = extend.visibility;
    selector
}

fn selector_text(selector: &Selector) -> String {
    let mut ctx = GenContext::inline(false);
    ctx.first_selector = true;
    selector_css(selector, &mut ctx)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "_unknown_".to_string())
}

// ============================================================================
// MATCHING
// ============================================================================

/// Every non-overlapping occurrence of the extend's target in `haystack`.
/// Without `all` the target must be the whole path.
fn find_match(extend: &Extend, haystack: &[Selector]) -> Vec<Match> {
    let needle = &extend.selector.elements;
    if needle.is_empty() {
        return Vec::new();
    }
    let partial = extend.allows_partial();
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut matches = Vec::new();

    for (path_index, selector) in haystack.iter().enumerate() {
        for (index, element) in selector.elements.iter().enumerate() {
            if partial || (path_index == 0 && index == 0) {
                candidates.push(Candidate {
                    path_index,
                    index,
                    matched: 0,
                    initial_combinator: element.combinator.clone(),
                });
            }
            // Each selector of a path is written with a leading space.
            let target_combinator = match element.combinator.value.as_str() {
                "" if index == 0 => " ",
                other => other,
            };

            let mut i = 0;
            while i < candidates.len() {
                let candidate = &mut candidates[i];
                let wanted = &needle[candidate.matched];
                if !values_equal(&wanted.value, &element.value)
                    || (candidate.matched > 0 && wanted.combinator.value != target_combinator)
                {
                    candidates.remove(i);
                    continue;
                }
                candidate.matched += 1;
                if candidate.matched < needle.len() {
                    i += 1;
                    continue;
                }
                let trailing = index + 1 < selector.elements.len() || path_index + 1 < haystack.len();
                if !partial && trailing {
                    candidates.remove(i);
                    continue;
                }
                matches.push(Match {
                    path_index: candidate.path_index,
                    index: candidate.index,
                    initial_combinator: candidate.initial_combinator.clone(),
                    end_path_index: path_index,
                    end_path_element_index: index + 1,
                });
                candidates.clear();
            }
        }
    }
    matches
}

fn values_equal(a: &ElementValue, b: &ElementValue) -> bool {
    match (a, b) {
        (ElementValue::Text(x), ElementValue::Text(y)) => x == y,
        (ElementValue::Variable(x), ElementValue::Variable(y)) => x == y,
        (ElementValue::Attribute(x), ElementValue::Attribute(y)) => {
            x.op == y.op
                && attribute_text(&x.key) == attribute_text(&y.key)
                && match (&x.value, &y.value) {
                    (None, None) => true,
                    (Some(v), Some(w)) => attribute_text(v) == attribute_text(w),
                    _ => false,
                }
        }
        (ElementValue::Paren(x), ElementValue::Paren(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(s, t)| selectors_equal(s, t))
        }
        _ => false,
    }
}

/// Element-wise equality; a leading empty combinator equals a space.
fn selectors_equal(a: &Selector, b: &Selector) -> bool {
    a.elements.len() == b.elements.len()
        && a.elements.iter().zip(&b.elements).enumerate().all(|(i, (x, y))| {
            let (cx, cy) = (x.combinator.value.as_str(), y.combinator.value.as_str());
            let space = |c: &str| if c.is_empty() { " " } else { c }.to_string();
            (cx == cy || (i == 0 && space(cx) == space(cy))) && values_equal(&x.value, &y.value)
        })
}

/// Quoted attribute values compare by content, so `[a="x"]` matches `[a='x']`.
fn attribute_text(node: &Node) -> String {
    match node {
        Node::Quoted(q) => q.value.clone(),
        other => node_css(other, &GenContext::inline(false)).unwrap_or_default(),
    }
}

/// `path` with every match replaced by `replacement`.
fn extend_selector(matches: &[Match], path: &[Selector], replacement: &Selector, visible: bool) -> Path {
    let mut current_path = 0;
    let mut current_element = 0;
    let mut out: Path = Vec::new();

    for (n, m) in matches.iter().enumerate() {
        let selector = &path[m.path_index];
        let Some(head) = replacement.elements.first() else {
            continue;
        };
        let first = Element {
            combinator: m.initial_combinator.clone(),
            ..head.clone()
        };

        if m.path_index > current_path && current_element > 0 {
            if let Some(last) = out.last_mut() {
                last.elements
                    .extend_from_slice(&path[current_path].elements[current_element..]);
            }
            current_element = 0;
            current_path += 1;
        }

        let mut elements: Vec<Element> = selector
            .elements
            .get(current_element..m.index)
            .map(<[Element]>::to_vec)
            .unwrap_or_default();
        elements.push(first);
        elements.extend_from_slice(&replacement.elements[1..]);

        if current_path == m.path_index && n > 0 {
            if let Some(last) = out.last_mut() {
                last.elements.extend(elements);
            }
        } else {
            out.extend_from_slice(path.get(current_path..m.path_index).unwrap_or(&[]));
            out.push(Selector::new(elements, selector.pos.clone()));
        }

        current_path = m.end_path_index;
        current_element = m.end_path_element_index;
        if current_element >= path[current_path].elements.len() {
            current_element = 0;
            current_path += 1;
        }
    }

    if current_path < path.len() && current_element > 0 {
        if let Some(last) = out.last_mut() {
            last.elements
                .extend_from_slice(&path[current_path].elements[current_element..]);
        }
        current_path += 1;
    }
    out.extend_from_slice(path.get(current_path..).unwrap_or(&[]));

    out.into_iter()
        .map(|selector| {
            let mut derived = selector.derive(selector.elements.clone());
            if visible {
                derived.visibility.ensure_visible();
            } else {
                derived.visibility.ensure_invisible();
            }
            derived
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::parser::parse_stylesheet;
    use crate::tree::FileInfo;
    use crate::visitors::join::join_selectors;
    use crate::visitors::visibility::mark_visible;

    fn prepare(source: &str) -> Ruleset {
        let file = Rc::new(FileInfo::new("test.less", source));
        let mut root = parse_stylesheet(&file, false, false).unwrap();
        join_selectors(&mut root);
        mark_visible(&mut root);
        root
    }

    fn path_text(path: &[Selector]) -> String {
        let mut ctx = GenContext::inline(false);
        let mut out = String::new();
        for (i, sel) in path.iter().enumerate() {
            ctx.first_selector = i == 0;
            out.push_str(&selector_css(sel, &mut ctx).unwrap());
        }
        out.trim().to_string()
    }

    fn paths_of(root: &Ruleset, index: usize) -> Vec<String> {
        let Node::Ruleset(rs) = &root.rules[index] else {
            panic!("not a ruleset")
        };
        rs.paths.iter().map(|p| path_text(p)).collect()
    }

    #[test]
    fn test_exact_extend_adds_path() {
        let mut root = prepare(".b { color: red; }\n.a:extend(.b) {}");
        let warnings = process_extends(&mut root).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(paths_of(&root, 0), vec![".b", ".a"]);
    }

    #[test]
    fn test_exact_extend_ignores_partial_matches() {
        let mut root = prepare(".x .b { color: red; }\n.a:extend(.b) {}");
        let warnings = process_extends(&mut root).unwrap();
        assert_eq!(paths_of(&root, 0), vec![".x .b"]);
        assert_eq!(warnings, vec!["extend '.b' has no matches".to_string()]);
    }

    #[test]
    fn test_extend_all_replaces_inside_selectors() {
        let mut root = prepare(".x .b.c { color: red; }\n.a:extend(.b all) {}");
        process_extends(&mut root).unwrap();
        assert_eq!(paths_of(&root, 0), vec![".x .b.c", ".x .a.c"]);
    }

    #[test]
    fn test_extend_rule_applies_to_every_path() {
        let mut root = prepare(".b { color: red; }\n.a, .c { &:extend(.b); }");
        process_extends(&mut root).unwrap();
        assert_eq!(paths_of(&root, 0), vec![".b", ".a", ".c"]);
    }

    #[test]
    fn test_extends_chain() {
        let mut root = prepare(".a { color: red; }\n.b:extend(.a) {}\n.c:extend(.b) {}");
        process_extends(&mut root).unwrap();
        assert_eq!(paths_of(&root, 0), vec![".a", ".b", ".c"]);
    }

    #[test]
    fn test_circular_extends_terminate() {
        let mut root = prepare(".a:extend(.b) { x: 1; }\n.b:extend(.a) { x: 2; }");
        process_extends(&mut root).unwrap();
        assert_eq!(paths_of(&root, 0), vec![".a", ".b"]);
        assert_eq!(paths_of(&root, 1), vec![".b", ".a"]);
    }

    #[test]
    fn test_overlong_extend_chain_is_an_error() {
        let mut source = String::from(".a0 { x: y; }\n");
        for i in 1..=110 {
            source.push_str(&format!(".a{i}:extend(.a{}) {{}}\n", i - 1));
        }
        let mut root = prepare(&source);
        let err = process_extends(&mut root).unwrap_err();
        assert_eq!(err.kind(), crate::diagnostics::ErrorKind::Runtime);
        assert!(
            err.message().starts_with("extend circular reference detected"),
            "{}",
            err.message()
        );
    }

    #[test]
    fn test_media_extends_stay_inside_block() {
        let mut root = prepare(".b { x: y; }\n@media print { .a:extend(.b) {} .b { x: z; } }");
        let warnings = process_extends(&mut root).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(paths_of(&root, 0), vec![".b"]);
    }
}
