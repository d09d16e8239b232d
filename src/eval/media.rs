//! Media and container queries.
//!
//! Nested queries bubble to the top of the stylesheet. While a query body
//! is evaluated, enclosing queries are recorded on the media path; a nested
//! query of the same kind is merged with them into one `and` query, and the
//! rulesets it passes through wrap its body in their selectors.

use crate::diagnostics::LessResult;
use crate::eval::context::{EvalContext, MediaScope};
use crate::eval::eval_node;
use crate::eval::ruleset::eval_ruleset;
use crate::functions::FunctionRegistry;
use crate::tree::{Anonymous, Expression, Media, Node, Ruleset, Selector, Value};

pub(super) fn eval_media(media: &Media, ctx: &mut EvalContext) -> LessResult<Node> {
    if ctx.media_blocks.is_none() {
        ctx.media_blocks = Some(Vec::new());
        ctx.media_path = Some(Vec::new());
    }
    let features = eval_node(&media.features, ctx)?;
    let mut block = Media {
        features: Box::new(features.clone()),
        rules: Vec::new(),
        ..media.clone()
    };

    if let Some(path) = ctx.media_path.as_mut() {
        path.push(MediaScope {
            name: media.name.clone(),
            features,
        });
    }
    let index = match ctx.media_blocks.as_mut() {
        Some(blocks) => {
            blocks.push(block.clone());
            blocks.len() - 1
        }
        None => 0,
    };

    let mut body = match media.rules.first() {
        Some(Node::Ruleset(rs)) => (**rs).clone(),
        _ => Ruleset::new(Some(vec![Selector::media_empty(media.pos.clone())]), Vec::new()),
    };
    if body.debug_info.is_none() {
        body.debug_info = media.debug_info.clone();
    }
    body.functions = Some(FunctionRegistry::inherit(&ctx.functions()));
    let frame = ctx.new_frame(body.clone());
    ctx.push_frame(frame);
    let result = eval_ruleset(&body, ctx);
    ctx.pop_frame();
    if let Some(path) = ctx.media_path.as_mut() {
        path.pop();
    }
    let body = result?;

    block.rules = vec![Node::Ruleset(Box::new(body))];
    if let Some(stored) = ctx.media_blocks.as_mut().and_then(|b| b.get_mut(index)) {
        stored.rules = block.rules.clone();
    }

    let at_top = ctx.media_path.as_ref().map_or(true, Vec::is_empty);
    if at_top {
        Ok(eval_top(block, ctx))
    } else {
        Ok(eval_nested(block, index, ctx))
    }
}

/// The outermost query returns every block bubbled out of it.
fn eval_top(block: Media, ctx: &mut EvalContext) -> Node {
    let blocks = ctx.media_blocks.take().unwrap_or_default();
    ctx.media_path = None;
    if blocks.len() > 1 {
        let mut wrapper = Ruleset::new(
            Some(vec![Selector::media_empty(block.pos.clone())]),
            blocks.into_iter().map(Node::Media).collect(),
        );
        wrapper.multi_media = true;
        wrapper.visibility = block.visibility;
        wrapper.pos = block.pos.clone();
        return Node::Ruleset(Box::new(wrapper));
    }
    match blocks.into_iter().next() {
        Some(only) => Node::Media(only),
        None => Node::Media(block),
    }
}

/// A nested query merges its features with the enclosing ones and leaves
/// an empty ruleset in place; a query of another kind stays where it is.
fn eval_nested(block: Media, index: usize, ctx: &mut EvalContext) -> Node {
    let scopes: Vec<MediaScope> = ctx.media_path.clone().unwrap_or_default();
    if scopes.iter().any(|scope| scope.name != block.name) {
        if let Some(blocks) = ctx.media_blocks.as_mut() {
            if index < blocks.len() {
                blocks.remove(index);
            }
        }
        return Node::Media(block);
    }

    let lists: Vec<Vec<Node>> = scopes
        .iter()
        .map(|scope| &scope.features)
        .chain(std::iter::once(block.features.as_ref()))
        .map(Node::list_items)
        .collect();
    let queries: Vec<Node> = permute(&lists)
        .into_iter()
        .map(|fragments| {
            let mut parts = Vec::with_capacity(fragments.len() * 2);
            for (i, fragment) in fragments.into_iter().enumerate() {
                if i > 0 {
                    parts.push(Node::Anonymous(Anonymous::new("and")));
                }
                parts.push(fragment);
            }
            Node::Expression(Expression::new(parts))
        })
        .collect();
    if let Some(stored) = ctx.media_blocks.as_mut().and_then(|b| b.get_mut(index)) {
        stored.features = Box::new(Node::Value(Value::new(queries)));
    }
    Node::Ruleset(Box::new(Ruleset::new(Some(Vec::new()), Vec::new())))
}

/// Every combination taking one query from each list, the first list
/// varying fastest.
fn permute(lists: &[Vec<Node>]) -> Vec<Vec<Node>> {
    match lists {
        [] => Vec::new(),
        [only] => only.iter().map(|n| vec![n.clone()]).collect(),
        [first, rest @ ..] => {
            let mut result = Vec::new();
            for tail in permute(rest) {
                for head in first {
                    let mut combination = Vec::with_capacity(tail.len() + 1);
                    combination.push(head.clone());
                    combination.extend(tail.iter().cloned());
                    result.push(combination);
                }
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::helpers::css;

    #[test]
    fn test_permute_order() {
        let lists = vec![
            vec![Node::keyword("a1"), Node::keyword("a2")],
            vec![Node::keyword("b1"), Node::keyword("b2")],
        ];
        let combos: Vec<String> = permute(&lists)
            .iter()
            .map(|c| c.iter().map(css).collect::<Vec<_>>().join("+"))
            .collect();
        assert_eq!(combos, vec!["a1+b1", "a2+b1", "a1+b2", "a2+b2"]);
    }

    #[test]
    fn test_single_list_is_not_nested() {
        let lists = vec![vec![Node::keyword("screen")]];
        assert_eq!(permute(&lists).len(), 1);
        assert!(permute(&[]).is_empty());
    }
}
