//! Marks every node that is not inside a `(reference)` import as visible.
//!
//! Blocked nodes and everything under them keep an unset visibility, so
//! they are only written out if extend or a mixin call makes them visible.

use crate::tree::{Node, Ruleset, Selector};

pub fn mark_visible(root: &mut Ruleset) {
    if root.visibility.blocks_visibility() {
        return;
    }
    root.visibility.ensure_visible();
    visit_ruleset(root);
}

fn visit_node(node: &mut Node) {
    if node.blocks_visibility() {
        return;
    }
    if let Some(visibility) = node.visibility_mut() {
        visibility.ensure_visible();
    }
    match node {
        Node::Ruleset(rs) => visit_ruleset(rs),
        Node::Media(media) => media.rules.iter_mut().for_each(visit_node),
        Node::AtRule(at) => {
            if let Some(rules) = at.rules.as_mut() {
                rules.iter_mut().for_each(visit_node);
            }
        }
        Node::Extend(extend) => visit_selector(&mut extend.selector),
        _ => {}
    }
}

fn visit_ruleset(rs: &mut Ruleset) {
    for path in &mut rs.paths {
        path.iter_mut().for_each(visit_selector);
    }
    if let Some(selectors) = rs.selectors.as_mut() {
        selectors.iter_mut().for_each(visit_selector);
    }
    rs.rules.iter_mut().for_each(visit_node);
}

fn visit_selector(selector: &mut Selector) {
    if selector.visibility.blocks_visibility() {
        return;
    }
    selector.visibility.ensure_visible();
    for extend in &mut selector.extend_list {
        if !extend.visibility.blocks_visibility() {
            extend.visibility.ensure_visible();
            visit_selector(&mut extend.selector);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Declaration, Element, SourcePos};

    fn ruleset(name: &str) -> Ruleset {
        let sel = Selector::new(vec![Element::text("", name)], SourcePos::default());
        let decl = Declaration::new("color", Node::keyword("red"), SourcePos::default());
        let mut rs = Ruleset::new(Some(vec![sel.clone()]), vec![Node::Declaration(decl)]);
        rs.paths = vec![vec![sel]];
        rs
    }

    #[test]
    fn test_unblocked_nodes_become_visible() {
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(ruleset(".a")))]);
        mark_visible(&mut root);
        let Node::Ruleset(rs) = &root.rules[0] else { panic!() };
        assert!(rs.visibility.is_visible());
        assert!(rs.paths[0][0].is_visible());
        assert!(rs.rules[0].visibility().unwrap().is_visible());
    }

    #[test]
    fn test_blocked_subtree_is_left_alone() {
        let mut blocked = ruleset(".ref");
        blocked.visibility.add_block();
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(blocked))]);
        mark_visible(&mut root);
        let Node::Ruleset(rs) = &root.rules[0] else { panic!() };
        assert_eq!(rs.visibility.visible, None);
        assert_eq!(rs.rules[0].visibility().unwrap().visible, None);
        assert!(!rs.paths[0][0].is_visible());
    }
}
