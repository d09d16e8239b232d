//! Joins nested selectors with their parents into full selector paths.
//!
//! A path is the list of selectors from the outermost ruleset inwards;
//! `.a { .b & { } }` gives the inner ruleset the single path `[.b, .a]`.
//! `&` is replaced by every parent path in turn, so a selector with two
//! `&` under a two-selector parent yields four paths.

use crate::tree::{Combinator, Element, ElementValue, Node, Ruleset, Selector};

type Path = Vec<Selector>;

/// Computes `paths` for every ruleset under `root`.
pub fn join_selectors(root: &mut Ruleset) {
    let mut visitor = JoinSelectorVisitor {
        contexts: vec![Vec::new()],
    };
    visitor.visit_ruleset(root);
}

struct JoinSelectorVisitor {
    /// Paths of the enclosing rulesets, innermost last.
    contexts: Vec<Vec<Path>>,
}

impl JoinSelectorVisitor {
    fn visit_rules(&mut self, rules: &mut [Node]) {
        for rule in rules {
            match rule {
                Node::Ruleset(rs) => self.visit_ruleset(rs),
                Node::Media(media) => {
                    let at_top = self.context().is_empty();
                    if let Some(Node::Ruleset(body)) = media.rules.first_mut() {
                        body.root = at_top;
                    }
                    self.visit_rules(&mut media.rules);
                }
                Node::AtRule(at) => {
                    let at_top = at.is_rooted || self.context().is_empty();
                    if let Some(rules) = at.rules.as_mut() {
                        if let Some(Node::Ruleset(body)) = rules.first_mut() {
                            body.root = at_top;
                        }
                        self.visit_rules(rules);
                    }
                }
                _ => {}
            }
        }
    }

    fn context(&self) -> &[Path] {
        self.contexts.last().map_or(&[], Vec::as_slice)
    }

    fn visit_ruleset(&mut self, rs: &mut Ruleset) {
        let mut paths = Vec::new();
        if !rs.root {
            let context = self.context().to_vec();
            let mut selectors = rs.selectors.take().unwrap_or_default();
            selectors.retain(|s| s.evald_condition);
            if selectors.is_empty() {
                rs.rules.clear();
            } else {
                for selector in &selectors {
                    join_selector(&mut paths, &context, selector);
                }
                rs.selectors = Some(selectors);
            }
            rs.paths = paths.clone();
        }
        self.contexts.push(paths);
        self.visit_rules(&mut rs.rules);
        self.contexts.pop();
    }
}

/// Appends to `paths` every path `selector` produces under the parent
/// paths in `context`.
pub fn join_selector(paths: &mut Vec<Path>, context: &[Path], selector: &Selector) {
    let mut new_paths = Vec::new();
    if !replace_parent_selector(&mut new_paths, context, selector) {
        new_paths = if context.is_empty() {
            vec![vec![selector.clone()]]
        } else {
            context
                .iter()
                .map(|parent| {
                    let mut path: Path = parent
                        .iter()
                        .map(|s| {
                            let mut derived = s.derive(s.elements.clone());
                            derived.visibility = selector.visibility;
                            derived
                        })
                        .collect();
                    path.push(selector.clone());
                    path
                })
                .collect()
        };
    }
    paths.extend(new_paths);
}

/// Replaces every `&` in `selector` with each path of `context`; `false`
/// when there was none, in which case the caller prefixes the context.
fn replace_parent_selector(paths: &mut Vec<Path>, context: &[Path], selector: &Selector) -> bool {
    let mut current: Vec<Element> = Vec::new();
    let mut new_selectors: Vec<Path> = vec![Vec::new()];
    let mut had_parent = false;

    for el in &selector.elements {
        match &el.value {
            ElementValue::Paren(inner) => {
                let mut replaced = Vec::with_capacity(inner.len());
                for nested in inner {
                    let mut nested_paths = Vec::new();
                    had_parent |= replace_parent_selector(&mut nested_paths, context, nested);
                    replaced.extend(nested_paths.into_iter().map(|p| flatten(p, nested)));
                }
                current.push(Element {
                    value: ElementValue::Paren(replaced),
                    ..el.clone()
                });
            }
            value if value.is_parent_ref() => {
                had_parent = true;
                merge_elements(&current, &mut new_selectors, selector);
                current.clear();
                let mut multiplied = Vec::new();
                for mut path in new_selectors {
                    if context.is_empty() {
                        if let Some(first) = path.first_mut() {
                            first.elements.push(Element::new(
                                el.combinator.clone(),
                                ElementValue::Text(String::new()),
                                el.pos.clone(),
                            ));
                        }
                        multiplied.push(path);
                    } else {
                        for parent in context {
                            multiplied.push(add_replacement(&path, parent, el, selector));
                        }
                    }
                }
                new_selectors = multiplied;
            }
            _ => current.push(el.clone()),
        }
    }
    merge_elements(&current, &mut new_selectors, selector);

    for mut path in new_selectors {
        if let Some(last) = path.last_mut() {
            last.extend_list = selector.extend_list.clone();
            paths.push(path);
        }
    }
    had_parent
}

/// Appends `elements` to the last selector of every path.
fn merge_elements(elements: &[Element], selectors: &mut Vec<Path>, original: &Selector) {
    if elements.is_empty() {
        return;
    }
    if selectors.is_empty() {
        selectors.push(vec![Selector::new(elements.to_vec(), original.pos.clone())]);
        return;
    }
    for path in selectors.iter_mut() {
        match path.last_mut() {
            Some(last) => {
                let mut joined = last.elements.clone();
                joined.extend_from_slice(elements);
                *last = last.derive(joined);
            }
            None => path.push(Selector::new(elements.to_vec(), original.pos.clone())),
        }
    }
}

/// `beginning` followed by the parent path that replaces the `&` element
/// `replaced`. The parent's first selector is glued onto the last selector
/// of `beginning`.
fn add_replacement(beginning: &[Selector], parent: &[Selector], replaced: &Element, original: &Selector) -> Path {
    let mut path = beginning.to_vec();
    let mut joined = match path.pop() {
        Some(last) => original.derive(last.elements),
        None => original.derive(Vec::new()),
    };
    if let Some(first) = parent.first() {
        if let Some(parent_el) = first.elements.first() {
            let mut combinator = replaced.combinator.clone();
            if combinator.is_empty_or_whitespace() && !parent_el.combinator.is_empty_or_whitespace() {
                combinator = parent_el.combinator.clone();
            }
            joined.elements.push(Element {
                combinator,
                value: parent_el.value.clone(),
                is_variable: replaced.is_variable,
                pos: replaced.pos.clone(),
            });
            joined.elements.extend(first.elements[1..].iter().cloned());
        }
    }
    if !joined.elements.is_empty() {
        path.push(joined);
    }
    path.extend(parent.iter().skip(1).map(|s| {
        let mut rest = s.derive(s.elements.clone());
        rest.extend_list.clear();
        rest
    }));
    path
}

/// One selector standing for a whole path, as needed inside `( )`.
fn flatten(path: Path, template: &Selector) -> Selector {
    let mut elements = Vec::new();
    for (i, sel) in path.into_iter().enumerate() {
        for (j, mut el) in sel.elements.into_iter().enumerate() {
            if i > 0 && j == 0 && el.combinator.value.is_empty() {
                el.combinator = Combinator::descendant();
            }
            elements.push(el);
        }
    }
    template.derive(elements)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::output::{selector_css, GenContext};
    use crate::parser::parse_stylesheet;
    use crate::tree::FileInfo;

    fn path_css(path: &[Selector]) -> String {
        let mut ctx = GenContext::default();
        let mut out = String::new();
        for (i, sel) in path.iter().enumerate() {
            ctx.first_selector = i == 0;
            out.push_str(&selector_css(sel, &mut ctx).unwrap());
        }
        out.trim().to_string()
    }

    /// Paths of the innermost ruleset along the first-child chain.
    fn innermost(source: &str) -> Vec<String> {
        let file = Rc::new(FileInfo::new("test.less", source));
        let mut root = parse_stylesheet(&file, false, false).unwrap();
        join_selectors(&mut root);
        let mut rs = &root;
        while let Some(Node::Ruleset(child)) = rs.rules.iter().find(|n| matches!(n, Node::Ruleset(_))) {
            rs = child;
        }
        rs.paths.iter().map(|p| path_css(p)).collect()
    }

    #[test]
    fn test_plain_nesting_prefixes_parent() {
        assert_eq!(innermost(".a { .b { x: y; } }"), vec![".a .b"]);
        assert_eq!(innermost(".a, .b { .c { x: y; } }"), vec![".a .c", ".b .c"]);
    }

    #[test]
    fn test_parent_reference_positions() {
        assert_eq!(innermost(".a { .b & { x: y; } }"), vec![".b .a"]);
        assert_eq!(innermost(".a { &-suffix { x: y; } }"), vec![".a-suffix"]);
        assert_eq!(innermost(".a { & > .b { x: y; } }"), vec![".a > .b"]);
    }

    #[test]
    fn test_parent_reference_multiplies() {
        let paths = innermost(".a, .b { & + & { x: y; } }");
        assert_eq!(paths, vec![".a + .a", ".a + .b", ".b + .a", ".b + .b"]);
    }

    #[test]
    fn test_parent_reference_at_root() {
        assert_eq!(innermost("& .a { x: y; }"), vec![".a"]);
    }
}
