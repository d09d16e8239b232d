//! List access and iteration.

use crate::diagnostics::LessResult;
use crate::eval::{call_detached, eval_ruleset, EvalContext};
use crate::functions::helpers::{arg, as_dimension};
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{
    DeclName, Declaration, DetachedRuleset, Dimension, Element, Expression, Node, Ruleset, Selector,
    SourcePos, Value,
};
use crate::err_msg;

pub fn register_list_functions(registry: &mut FunctionRegistry) {
    registry.register("_self", Function::Pure(self_value));
    registry.register("~", Function::Pure(tilde));
    registry.register("length", Function::Pure(length));
    registry.register("extract", Function::Pure(extract));
    registry.register("range", Function::Pure(range));
    registry.register("each", Function::Contextual(each));
}

/// A single value is a list of one.
fn items(node: &Node) -> Vec<Node> {
    node.list_items()
}

fn self_value(args: &[Node]) -> FnResult {
    Ok(Some(arg(args, 0, "_SELF")?.clone()))
}

/// `~(a, b)` builds a comma list.
fn tilde(args: &[Node]) -> FnResult {
    Ok(Some(match args {
        [single] => single.clone(),
        _ => Node::Value(Value::new(args.to_vec())),
    }))
}

fn length(args: &[Node]) -> FnResult {
    let list = arg(args, 0, "length")?;
    Ok(Some(Node::Dimension(Dimension::unitless(items(list).len() as f64))))
}

/// Usage: `extract(@list, 2)`; 1-based, out of range leaves the call as is.
fn extract(args: &[Node]) -> FnResult {
    let list = arg(args, 0, "extract")?;
    let index = as_dimension(arg(args, 1, "extract")?)
        .ok_or_else(|| err_msg!(Argument, "extract index must be a number"))?;
    let position = index.value - 1.0;
    if position < 0.0 || position.fract() != 0.0 {
        return Ok(None);
    }
    Ok(items(list).into_iter().nth(position as usize))
}

/// Usage: `range(10px)`, `range(0, 10, 2)`; the unit comes from the end value.
fn range(args: &[Node]) -> FnResult {
    let number = |index: usize| -> LessResult<&Dimension> {
        as_dimension(arg(args, index, "range")?)
            .ok_or_else(|| err_msg!(Argument, "range expects numbers"))
    };
    let (from, to, step) = match args.len() {
        0 | 1 => (1.0, number(0)?, 1.0),
        2 => (number(0)?.value, number(1)?, 1.0),
        _ => (number(0)?.value, number(1)?, number(2)?.value),
    };
    if step <= 0.0 {
        return Err(err_msg!(Argument, "range step must be positive"));
    }
    let mut list = Vec::new();
    let mut i = from;
    while i <= to.value {
        list.push(Node::Dimension(Dimension::new(i, to.unit.clone())));
        i += step;
    }
    Ok(Some(Node::Expression(Expression::new(list))))
}

/// Usage: `each(@list, { .sel-@{value} { a: @key; } })`. Each item runs the
/// body with `@value`, `@key` and `@index` bound, or with the parameter
/// names of an anonymous mixin `(@v, @k, @i) { ... }`.
fn each(ctx: &mut EvalContext, args: &[Node], pos: &SourcePos) -> FnResult {
    let list = arg(args, 0, "each")?;
    let body = arg(args, 1, "each")?;

    let iterator: Vec<Node> = match list {
        Node::DetachedRuleset(dr) => call_detached(dr, ctx)?.rules,
        Node::Ruleset(rs) => rs.rules.clone(),
        other => items(other),
    };

    let (names, rules, visibility) = match body {
        Node::MixinDefinition(def) => {
            let name = |i: usize| def.params.get(i).and_then(|p| p.name.clone());
            ([name(0), name(1), name(2)], def.rules.clone(), def.visibility)
        }
        Node::DetachedRuleset(DetachedRuleset { ruleset, .. }) => (
            [
                Some("@value".to_string()),
                Some("@key".to_string()),
                Some("@index".to_string()),
            ],
            ruleset.rules.clone(),
            ruleset.visibility,
        ),
        _ => {
            return Err(err_msg!(
                Argument,
                "each expects a detached ruleset or anonymous mixin"
            ))
        }
    };
    let [value_name, key_name, index_name] = names;

    let mut iterations = Vec::new();
    for (i, item) in iterator.into_iter().enumerate() {
        if matches!(item, Node::Comment(_)) {
            continue;
        }
        let position = Node::Dimension(Dimension::unitless((i + 1) as f64));
        let (key, value) = match item {
            Node::Declaration(decl) => {
                let key = match &decl.name {
                    DeclName::Plain(name) => Node::keyword(name),
                    DeclName::Interpolated(parts) => {
                        parts.first().cloned().unwrap_or_else(|| position.clone())
                    }
                };
                (key, *decl.value)
            }
            other => (position.clone(), other),
        };
        let mut scoped = rules.clone();
        if let Some(name) = &value_name {
            scoped.push(Node::Declaration(Declaration::new(name.clone(), value, pos.clone())));
        }
        if let Some(name) = &index_name {
            scoped.push(Node::Declaration(Declaration::new(name.clone(), position, pos.clone())));
        }
        if let Some(name) = &key_name {
            scoped.push(Node::Declaration(Declaration::new(name.clone(), key, pos.clone())));
        }
        let mut iteration = Ruleset::new(Some(vec![parent_selector(pos)]), scoped);
        iteration.visibility = visibility;
        iterations.push(Node::Ruleset(Box::new(iteration)));
    }

    let mut all = Ruleset::new(Some(vec![parent_selector(pos)]), iterations);
    all.visibility = visibility;
    Ok(Some(Node::Ruleset(Box::new(eval_ruleset(&all, ctx)?))))
}

fn parent_selector(pos: &SourcePos) -> Selector {
    Selector::new(vec![Element::text("", "&")], pos.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::helpers::css;

    fn list(values: &[&str]) -> Node {
        Node::Value(Value::new(values.iter().map(|v| Node::keyword(v)).collect()))
    }

    fn num(v: f64) -> Node {
        Node::Dimension(Dimension::unitless(v))
    }

    #[test]
    fn test_length_and_extract() {
        let l = list(&["a", "b", "c"]);
        assert_eq!(css(&length(&[l.clone()]).unwrap().unwrap()), "3");
        assert_eq!(css(&length(&[Node::keyword("x")]).unwrap().unwrap()), "1");
        assert_eq!(css(&extract(&[l.clone(), num(2.0)]).unwrap().unwrap()), "b");
        assert!(extract(&[l.clone(), num(4.0)]).unwrap().is_none());
        assert!(extract(&[l, num(0.0)]).unwrap().is_none());
    }

    #[test]
    fn test_range() {
        let out = range(&[Node::Dimension(Dimension::with_unit(4.0, "px"))]).unwrap().unwrap();
        assert_eq!(css(&out), "1px 2px 3px 4px");
        let out = range(&[num(0.0), num(10.0), num(5.0)]).unwrap().unwrap();
        assert_eq!(css(&out), "0 5 10");
    }

    #[test]
    fn test_tilde_builds_list() {
        let out = tilde(&[Node::keyword("a"), Node::keyword("b")]).unwrap().unwrap();
        assert_eq!(css(&out), "a, b");
    }
}
