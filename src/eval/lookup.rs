//! Scope lookups: variables, properties, namespace values and detached
//! ruleset calls.

use crate::diagnostics::LessResult;
use crate::eval::context::EvalContext;
use crate::eval::ruleset::{eval_declaration, eval_ruleset};
use crate::eval::{eval_node, mixin};
use crate::functions::helpers::text_of;
use crate::parser::{parse_node, Parsed, Production};
use crate::tree::{
    Declaration, DetachedRuleset, Expression, NamespaceValue, Node, Property, Ruleset, Selector,
    SourcePos, Variable, VariableCall,
};
use crate::visitors::to_css::merge_rules;
use crate::{err_at, err_msg};

/// Raw declaration text is parsed on first use; a value that does not
/// parse stays raw.
pub(crate) fn parsed_value(mut decl: Declaration) -> Declaration {
    let Node::Anonymous(raw) = decl.value.as_ref() else {
        return decl;
    };
    if let Ok(Some(Parsed::Value { value, important })) =
        parse_node(&raw.value, Production::Value, raw.pos.index, raw.pos.file.clone())
    {
        decl.value = Box::new(value);
        if !important.is_empty() {
            decl.important = format!(" {}", important.trim());
        }
    }
    decl
}

fn mark_important(decl: &Declaration, ctx: &mut EvalContext) {
    if !decl.important.is_empty() {
        if let Some(scope) = ctx.important_scope.last_mut() {
            *scope = true;
        }
    }
}

/// Inside `calc()` a referenced value is computed with math on.
fn eval_referenced(value: &Node, ctx: &mut EvalContext) -> LessResult<Node> {
    if !ctx.in_calc {
        return eval_node(value, ctx);
    }
    let saved = ctx.math_on;
    ctx.math_on = true;
    ctx.enter_calc();
    let result = eval_node(value, ctx);
    ctx.exit_calc();
    ctx.math_on = saved;
    Ok(match result? {
        Node::Expression(mut e) if e.value.len() == 1 => e.value.remove(0),
        other => other,
    })
}

// ============================================================================
// VARIABLES
// ============================================================================

pub(super) fn eval_variable(var: &Variable, ctx: &mut EvalContext) -> LessResult<Node> {
    let name = match var.name.strip_prefix("@@") {
        Some(inner) => {
            let inner = Variable::new(format!("@{inner}"), var.pos.clone());
            format!("@{}", text_of(&eval_variable(&inner, ctx)?))
        }
        None => var.name.clone(),
    };
    if !ctx.begin_evaluating(&name, &var.pos) {
        return Err(err_at!(Name, &var.pos, "Recursive variable definition for {}", name));
    }
    let result = find_variable(&name, ctx);
    ctx.end_evaluating(&name, &var.pos);
    result?.ok_or_else(|| err_at!(Name, &var.pos, "variable {} is undefined", name))
}

fn find_variable(name: &str, ctx: &mut EvalContext) -> LessResult<Option<Node>> {
    let frames = ctx.frames.clone();
    for frame in &frames {
        let found = frame.borrow().variable(name);
        if let Some(decl) = found {
            let decl = parsed_value(decl);
            mark_important(&decl, ctx);
            return eval_referenced(&decl.value, ctx).map(Some);
        }
    }
    Ok(None)
}

/// Whether `name` resolves in the current scope, without evaluating it.
pub fn is_variable_defined(name: &str, ctx: &EvalContext) -> bool {
    ctx.frames.iter().any(|f| f.borrow().variable(name).is_some())
}

// ============================================================================
// PROPERTIES
// ============================================================================

pub(super) fn eval_property(prop: &Property, ctx: &mut EvalContext) -> LessResult<Node> {
    let name = prop.name.clone();
    if !ctx.begin_evaluating(&name, &prop.pos) {
        return Err(err_at!(Name, &prop.pos, "Recursive property reference for {}", name));
    }
    let result = find_property(&name, ctx);
    ctx.end_evaluating(&name, &prop.pos);
    result?.ok_or_else(|| err_at!(Name, &prop.pos, "Property '{}' is undefined", name))
}

fn find_property(name: &str, ctx: &mut EvalContext) -> LessResult<Option<Node>> {
    let frames = ctx.frames.clone();
    for frame in &frames {
        let found = frame.borrow().property(name);
        let Some(decls) = found else { continue };
        let Some(decl) = merged_last(decls) else { continue };
        mark_important(&decl, ctx);
        return eval_referenced(&decl.value, ctx).map(Some);
    }
    Ok(None)
}

/// The effective declaration among same-named ones, after `+:` merging.
fn merged_last(decls: Vec<Declaration>) -> Option<Declaration> {
    let mut rules: Vec<Node> = decls
        .into_iter()
        .map(|d| Node::Declaration(parsed_value(d)))
        .collect();
    merge_rules(&mut rules);
    match rules.pop() {
        Some(Node::Declaration(d)) => Some(d),
        _ => None,
    }
}

// ============================================================================
// NAMESPACE VALUES
// ============================================================================

/// What a lookup step is applied to.
enum Scope {
    Rules(Ruleset),
    Value(Node),
}

pub(super) fn eval_namespace_value(ns: &NamespaceValue, ctx: &mut EvalContext) -> LessResult<Node> {
    let mut current = match ns.value.as_ref() {
        Node::MixinCall(call) => {
            let rules = mixin::eval_mixin_call(call, ctx)?;
            Scope::Rules(Ruleset::new(Some(vec![Selector::new(Vec::new(), ns.pos.clone())]), rules))
        }
        Node::VariableCall(call) => Scope::Rules(eval_variable_call(call, ctx)?),
        other => Scope::Value(eval_node(other, ctx)?),
    };
    for lookup in &ns.lookups {
        let rules = match current {
            Scope::Rules(rs) => rs,
            Scope::Value(Node::Ruleset(rs)) => *rs,
            Scope::Value(Node::DetachedRuleset(dr)) => *dr.ruleset,
            Scope::Value(other) => {
                return Err(err_at!(
                    Name,
                    &ns.pos,
                    "cannot look up {} in {}",
                    lookup,
                    other.type_name()
                ))
            }
        };
        let decl = select(&rules, lookup, &ns.pos, ctx)?;
        let decl = eval_declaration(&parsed_value(decl), ctx)?;
        current = match *decl.value {
            Node::DetachedRuleset(dr) => Scope::Rules(eval_ruleset(&dr.ruleset, ctx)?),
            other => Scope::Value(other),
        };
    }
    Ok(match current {
        Scope::Rules(rs) => Node::DetachedRuleset(DetachedRuleset {
            ruleset: Box::new(rs),
            frames: None,
        }),
        Scope::Value(value) => value,
    })
}

/// One `[...]` step: `[]` is the last declaration, `[@x]` a variable,
/// `[$x]`/`[x]` a property.
fn select(
    rules: &Ruleset,
    lookup: &str,
    pos: &SourcePos,
    ctx: &mut EvalContext,
) -> LessResult<Declaration> {
    if lookup.is_empty() {
        return rules
            .last_declaration()
            .ok_or_else(|| err_at!(Name, pos, "no declaration found for lookup []"));
    }
    if lookup.starts_with('@') {
        let name = match lookup.strip_prefix("@@") {
            Some(inner) => {
                let var = Variable::new(format!("@{inner}"), pos.clone());
                format!("@{}", text_of(&eval_variable(&var, ctx)?))
            }
            None => lookup.to_string(),
        };
        return rules
            .variable(&name)
            .ok_or_else(|| err_at!(Name, pos, "variable {} not found", name));
    }
    let name = if let Some(inner) = lookup.strip_prefix("$@") {
        let var = Variable::new(format!("@{inner}"), pos.clone());
        format!("${}", text_of(&eval_variable(&var, ctx)?))
    } else if lookup.starts_with('$') {
        lookup.to_string()
    } else {
        format!("${lookup}")
    };
    rules
        .property(&name)
        .and_then(merged_last)
        .ok_or_else(|| err_at!(Name, pos, "property \"{}\" not found", &name[1..]))
}

// ============================================================================
// DETACHED RULESETS
// ============================================================================

/// Captures the current scope unless the ruleset already closed over one.
pub(super) fn eval_detached(dr: &DetachedRuleset, ctx: &EvalContext) -> Node {
    Node::DetachedRuleset(DetachedRuleset {
        ruleset: dr.ruleset.clone(),
        frames: Some(dr.frames.clone().unwrap_or_else(|| ctx.frames.clone())),
    })
}

/// Evaluates a detached ruleset body in its captured scope plus the caller's.
pub fn call_detached(dr: &DetachedRuleset, ctx: &mut EvalContext) -> LessResult<Ruleset> {
    let frames = match &dr.frames {
        Some(captured) => captured.iter().chain(ctx.frames.iter()).cloned().collect(),
        None => ctx.frames.clone(),
    };
    ctx.with_frames(frames, |c| eval_ruleset(&dr.ruleset, c))
}

/// `@dr();` as a statement or the head of a lookup.
pub(super) fn eval_variable_call(call: &VariableCall, ctx: &mut EvalContext) -> LessResult<Ruleset> {
    let value = eval_variable(&Variable::new(call.variable.clone(), call.pos.clone()), ctx)?;
    let detached = match value {
        Node::DetachedRuleset(dr) => dr,
        Node::Ruleset(rs) => DetachedRuleset {
            ruleset: rs,
            frames: None,
        },
        Node::Expression(Expression { value, .. }) if value.iter().all(Node::is_ruleset_like) => {
            DetachedRuleset {
                ruleset: Box::new(Ruleset::new(None, value)),
                frames: None,
            }
        }
        _ => {
            return Err(
                err_msg!(Syntax, "Could not evaluate variable call {}", call.variable).located(&call.pos),
            )
        }
    };
    call_detached(&detached, ctx)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::functions::helpers::css;
    use crate::functions::FunctionRegistry;
    use crate::options::LessOptions;
    use crate::tree::{Anonymous, Merge};

    fn ctx_with(rules: Vec<Node>) -> EvalContext {
        let mut ctx =
            EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()));
        let frame = ctx.new_frame(Ruleset::root(rules));
        ctx.push_frame(frame);
        ctx
    }

    fn decl(name: &str, value: &str) -> Node {
        Node::Declaration(Declaration::new(
            name,
            Node::Anonymous(Anonymous::new(value)),
            SourcePos::default(),
        ))
    }

    #[test]
    fn test_variable_lookup_parses_raw_values() {
        let mut ctx = ctx_with(vec![decl("@a", "1px + 2px")]);
        let value = eval_variable(&Variable::new("@a", SourcePos::default()), &mut ctx).unwrap();
        assert_eq!(css(&value), "3px");
    }

    #[test]
    fn test_indirect_variable() {
        let mut ctx = ctx_with(vec![decl("@name", "color"), decl("@color", "red")]);
        let value = eval_variable(&Variable::new("@@name", SourcePos::default()), &mut ctx).unwrap();
        assert_eq!(css(&value), "red");
    }

    #[test]
    fn test_undefined_and_recursive_variables() {
        let mut ctx = ctx_with(vec![decl("@a", "@a")]);
        let err = eval_variable(&Variable::new("@b", SourcePos::default()), &mut ctx).unwrap_err();
        assert_eq!(err.message(), "variable @b is undefined");
        let err = eval_variable(&Variable::new("@a", SourcePos::default()), &mut ctx).unwrap_err();
        assert_eq!(err.message(), "Recursive variable definition for @a");
    }

    #[test]
    fn test_property_merge() {
        let mut first = Declaration::new("", Node::keyword("a"), SourcePos::default());
        first.name = crate::tree::DeclName::Plain("box-shadow".into());
        first.variable = false;
        first.merge = Some(Merge::Comma);
        let mut second = first.clone();
        second.value = Box::new(Node::keyword("b"));
        let mut ctx = ctx_with(vec![Node::Declaration(first), Node::Declaration(second)]);
        let prop = Property {
            name: "$box-shadow".into(),
            pos: SourcePos::default(),
        };
        assert_eq!(css(&eval_property(&prop, &mut ctx).unwrap()), "a, b");
    }
}
