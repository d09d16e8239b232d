//! Conditionals and guard helpers.

use crate::eval::{eval_node, guard_passes, is_variable_defined, EvalContext};
use crate::functions::helpers::{arg, css};
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{Anonymous, Node, SourcePos, Variable};
use crate::err_msg;

pub fn register_logic_functions(registry: &mut FunctionRegistry) {
    registry.register("if", Function::SpecialForm(if_function));
    registry.register("boolean", Function::Pure(boolean));
    registry.register("default", Function::Contextual(default));
    registry.register("isdefined", Function::SpecialForm(isdefined));
    registry.register("style", Function::Contextual(style));
}

/// Usage: `if((@mode = dark), black, white)`; only the chosen branch is
/// evaluated. A missing else branch yields nothing.
fn if_function(ctx: &mut EvalContext, args: &[Node], _pos: &SourcePos) -> FnResult {
    let condition = arg(args, 0, "if")?;
    let branch = if guard_passes(condition, ctx)? {
        Some(arg(args, 1, "if")?)
    } else {
        args.get(2)
    };
    Ok(Some(match branch {
        Some(node) => eval_node(node, ctx)?,
        None => Node::Anonymous(Anonymous::new("")),
    }))
}

/// Usage: `boolean(@a > 2)`; stores a condition's result in a variable.
fn boolean(args: &[Node]) -> FnResult {
    let value = arg(args, 0, "boolean")?;
    let truthy = match value {
        Node::Keyword(k) => k.value == "true",
        Node::Dimension(d) => d.value != 0.0,
        Node::Quoted(q) => !q.value.is_empty(),
        _ => true,
    };
    Ok(Some(Node::boolean(truthy)))
}

/// Inside a mixin guard: true when no other candidate matches. Anywhere
/// else it is an error, except in plain values where it stays CSS.
fn default(ctx: &mut EvalContext, _args: &[Node], _pos: &SourcePos) -> FnResult {
    Ok(ctx.default_value()?.map(Node::boolean))
}

/// Usage: `isdefined(@name)`; does not evaluate the variable's value.
fn isdefined(ctx: &mut EvalContext, args: &[Node], _pos: &SourcePos) -> FnResult {
    let defined = match arg(args, 0, "isdefined")? {
        Node::Variable(var) if !var.name.starts_with("@@") => is_variable_defined(&var.name, ctx),
        other => eval_node(other, ctx).is_ok(),
    };
    Ok(Some(Node::boolean(defined)))
}

/// Usage: `style(--theme)` inside container queries; a name that resolves to
/// a variable is replaced by its value.
fn style(ctx: &mut EvalContext, args: &[Node], pos: &SourcePos) -> FnResult {
    let Some(first) = args.first() else {
        return Err(err_msg!(Argument, "one or more arguments required"));
    };
    let name = match first {
        Node::Quoted(q) => q.value.clone(),
        other => css(other),
    };
    if !name.starts_with('@') {
        return Ok(None);
    }
    let variable = Node::Variable(Variable::new(name, pos.clone()));
    let Ok(value) = eval_node(&variable, ctx) else {
        return Ok(None);
    };
    Ok(Some(Node::Anonymous(Anonymous::new(format!("style({})", css(&value))))))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::options::LessOptions;
    use crate::tree::{Condition, Declaration, Dimension, Quoted, Ruleset};

    fn ctx() -> EvalContext {
        let mut ctx =
            EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()));
        let decl = Declaration::new("@a", Node::keyword("red"), SourcePos::default());
        let frame = ctx.new_frame(Ruleset::root(vec![Node::Declaration(decl)]));
        ctx.push_frame(frame);
        ctx
    }

    fn condition(op: &str, l: f64, r: f64) -> Node {
        Node::Condition(Condition {
            op: op.into(),
            lvalue: Box::new(Node::Dimension(Dimension::unitless(l))),
            rvalue: Box::new(Node::Dimension(Dimension::unitless(r))),
            negate: false,
            pos: SourcePos::default(),
        })
    }

    #[test]
    fn test_if_evaluates_one_branch() {
        let mut ctx = ctx();
        let missing = Node::Variable(Variable::new("@missing", SourcePos::default()));
        let args = [condition(">", 2.0, 1.0), Node::keyword("yes"), missing];
        let out = if_function(&mut ctx, &args, &SourcePos::default()).unwrap().unwrap();
        assert_eq!(css(&out), "yes");
        let args = [condition("<", 2.0, 1.0), Node::keyword("yes")];
        let out = if_function(&mut ctx, &args, &SourcePos::default()).unwrap().unwrap();
        assert_eq!(css(&out), "");
    }

    #[test]
    fn test_boolean_truthiness() {
        let check = |n: Node| css(&boolean(&[n]).unwrap().unwrap());
        assert_eq!(check(Node::keyword("true")), "true");
        assert_eq!(check(Node::keyword("false")), "false");
        assert_eq!(check(Node::Dimension(Dimension::unitless(0.0))), "false");
        assert_eq!(check(Node::Quoted(Quoted::new('"', "", false))), "false");
    }

    #[test]
    fn test_isdefined_and_default() {
        let mut ctx = ctx();
        let var = |n: &str| Node::Variable(Variable::new(n, SourcePos::default()));
        let out = isdefined(&mut ctx, &[var("@a")], &SourcePos::default()).unwrap().unwrap();
        assert_eq!(css(&out), "true");
        let out = isdefined(&mut ctx, &[var("@b")], &SourcePos::default()).unwrap().unwrap();
        assert_eq!(css(&out), "false");
        assert!(default(&mut ctx, &[], &SourcePos::default()).unwrap().is_none());
    }
}
