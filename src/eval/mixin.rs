//! Mixin calls: candidate lookup, argument matching, `default()` guard
//! grouping and parameter binding.

use std::rc::Rc;

use crate::diagnostics::LessResult;
use crate::eval::context::{DefaultState, EvalContext};
use crate::eval::ruleset::{eval_ruleset, eval_selector, make_important};
use crate::eval::value::guard_passes;
use crate::eval::eval_node;
use crate::functions::helpers::css;
use crate::functions::FunctionRegistry;
use crate::output::{selector_css, GenContext};
use crate::tree::{
    Declaration, Expression, FrameRef, MixinCall, MixinCandidate, MixinDefinition, MixinRef,
    Node, Ruleset, Selector,
};
use crate::{err_at, err_msg};

/// An evaluated call argument.
#[derive(Debug, Clone)]
struct Arg {
    name: Option<String>,
    value: Node,
}

/// How a candidate's guard depends on `default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultGroup {
    /// Passes whatever `default()` returns.
    None,
    /// Passes only when `default()` is true.
    True,
    /// Passes only when `default()` is false.
    False,
}

/// A definition closes over the scope it was evaluated in.
pub(super) fn eval_definition(def: &Rc<MixinDefinition>, ctx: &EvalContext) -> Node {
    if def.frames.is_some() {
        return Node::MixinDefinition(Rc::clone(def));
    }
    let mut closed = (**def).clone();
    closed.frames = Some(ctx.frames.clone());
    Node::MixinDefinition(Rc::new(closed))
}

// One nested call level fits in the red zone even in unoptimized builds, so
// `max_depth` is reached before the native stack runs out.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

pub(crate) fn eval_mixin_call(call: &MixinCall, ctx: &mut EvalContext) -> LessResult<Vec<Node>> {
    ctx.enter_depth(&call.pos)?;
    let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || expand(call, ctx));
    ctx.exit_depth();
    result.map_err(|e| e.located(&call.pos))
}

fn expand(call: &MixinCall, ctx: &mut EvalContext) -> LessResult<Vec<Node>> {
    let selector = eval_selector(&call.selector, ctx)?;
    let mut args = Vec::with_capacity(call.arguments.len());
    for arg in &call.arguments {
        let value = eval_node(&arg.value, ctx)?;
        if arg.expand && matches!(value, Node::Value(_) | Node::Expression(_)) {
            args.extend(value.list_items().into_iter().map(|value| Arg { name: None, value }));
        } else {
            args.push(Arg {
                name: arg.name.clone(),
                value,
            });
        }
    }

    let frames = ctx.frames.clone();
    let mut found = false;
    for frame in &frames {
        let candidates = frame.borrow().find(&selector);
        if candidates.is_empty() {
            continue;
        }
        found = true;

        let mut matching = Vec::new();
        let mut any_match = false;
        let grouped = (|| -> LessResult<()> {
            for candidate in candidates {
                if is_recursive(&candidate.mixin, &frames) {
                    continue;
                }
                if !match_args(&candidate.mixin, &args, ctx)? {
                    continue;
                }
                any_match = true;
                if let Some(group) = default_group(&candidate, &args, ctx)? {
                    matching.push((candidate.mixin, group));
                }
            }
            Ok(())
        })();
        ctx.default_func = DefaultState::Unset;
        grouped?;

        // `default()` is true only when no candidate matched on its own.
        let defaults_only = !matching.iter().any(|(_, g)| *g == DefaultGroup::None);
        if defaults_only && matching.len() > 1 {
            return Err(err_msg!(
                Runtime,
                "Ambiguous use of `default()` found when matching for `{}`",
                describe_call(&selector, &args)
            ));
        }

        let mut rules = Vec::new();
        for (mixin, group) in matching {
            let fires = match group {
                DefaultGroup::None => true,
                DefaultGroup::True => defaults_only,
                DefaultGroup::False => !defaults_only,
            };
            if !fires {
                continue;
            }
            let body = match &mixin {
                MixinRef::Definition(def) => eval_call(def, &args, call.important, ctx)?,
                MixinRef::Ruleset(rs) => {
                    let def = MixinDefinition::from_ruleset(
                        rs.rules.clone(),
                        rs.id,
                        rs.visibility,
                        rs.pos.clone(),
                    );
                    eval_call(&def, &args, call.important, ctx)?
                }
            };
            rules.extend(body);
        }
        if any_match {
            if call.visibility.blocks_visibility() {
                for rule in &mut rules {
                    rule.add_visibility_block();
                }
            }
            return Ok(rules);
        }
    }

    if found {
        Err(err_msg!(
            Runtime,
            "No matching definition was found for `{}`",
            describe_call(&selector, &args)
        ))
    } else {
        Err(err_msg!(
            Name,
            "{} is undefined",
            selector_text(&selector)
        ))
    }
}

/// A ruleset called from inside itself.
fn is_recursive(mixin: &MixinRef, frames: &[FrameRef]) -> bool {
    match mixin {
        MixinRef::Ruleset(rs) => frames.iter().any(|f| f.borrow().id == rs.id),
        MixinRef::Definition(_) => false,
    }
}

fn selector_text(selector: &Selector) -> String {
    let mut gen = GenContext::inline(false);
    gen.first_selector = true;
    selector_css(selector, &mut gen)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// `.m(@a:1, 2px)` as shown in error messages.
fn describe_call(selector: &Selector, args: &[Arg]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|a| match &a.name {
            Some(name) => format!("{name}:{}", css(&a.value)),
            None => css(&a.value),
        })
        .collect();
    format!("{}({})", selector_text(selector), args.join(", "))
}

// ============================================================================
// MATCHING
// ============================================================================

fn match_args(mixin: &MixinRef, args: &[Arg], ctx: &mut EvalContext) -> LessResult<bool> {
    let def = match mixin {
        MixinRef::Ruleset(_) => return Ok(args.is_empty()),
        MixinRef::Definition(def) => def,
    };
    let required_args = args
        .iter()
        .filter(|a| {
            a.name
                .as_ref()
                .map_or(true, |n| !def.optional_params.contains(n))
        })
        .count();
    if def.variadic {
        if required_args + 1 < def.required {
            return Ok(false);
        }
    } else if required_args < def.required || args.len() > def.params.len() {
        return Ok(false);
    }
    for (param, arg) in def.params.iter().zip(args).take(required_args.min(def.arity)) {
        if param.name.is_some() || param.variadic {
            continue;
        }
        let pattern = match &param.value {
            Some(value) => css(&eval_node(value, ctx)?),
            None => String::new(),
        };
        if css(&arg.value) != pattern {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates the guards along the candidate's namespace path and its own
/// guard with `default()` false, then true. `None` if neither passes.
fn default_group(
    candidate: &MixinCandidate,
    args: &[Arg],
    ctx: &mut EvalContext,
) -> LessResult<Option<DefaultGroup>> {
    let mut passes = [false; 2];
    for (slot, value) in [false, true].into_iter().enumerate() {
        ctx.default_func = DefaultState::Value(value);
        let mut ok = true;
        for namespace in &candidate.path {
            if !match_condition(namespace, &[], ctx)? {
                ok = false;
                break;
            }
        }
        passes[slot] = ok && match_condition(&candidate.mixin, args, ctx)?;
    }
    Ok(match passes {
        [true, true] => Some(DefaultGroup::None),
        [false, true] => Some(DefaultGroup::True),
        [true, false] => Some(DefaultGroup::False),
        [false, false] => None,
    })
}

fn match_condition(mixin: &MixinRef, args: &[Arg], ctx: &mut EvalContext) -> LessResult<bool> {
    match mixin {
        // A ruleset's guard sits on its last selector.
        MixinRef::Ruleset(rs) => {
            let Some(selector) = rs.selectors.as_ref().and_then(|s| s.last()) else {
                return Ok(true);
            };
            if !selector.evald_condition {
                return Ok(false);
            }
            match &selector.condition {
                Some(condition) => guard_passes(condition, ctx),
                None => Ok(true),
            }
        }
        MixinRef::Definition(def) => {
            let Some(condition) = &def.condition else {
                return Ok(true);
            };
            let mixin_frames = definition_frames(def, ctx);
            let mut evaluated = Vec::new();
            let params = eval_params(def, args, &mixin_frames, &mut evaluated, ctx)?;
            let frames = std::iter::once(params).chain(mixin_frames).collect();
            ctx.with_frames(frames, |c| guard_passes(condition, c))
        }
    }
}

// ============================================================================
// CALLING
// ============================================================================

/// The definition's captured scope followed by the caller's.
fn definition_frames(def: &MixinDefinition, ctx: &EvalContext) -> Vec<FrameRef> {
    def.frames
        .iter()
        .flatten()
        .chain(ctx.frames.iter())
        .cloned()
        .collect()
}

fn eval_call(
    def: &MixinDefinition,
    args: &[Arg],
    important: bool,
    ctx: &mut EvalContext,
) -> LessResult<Vec<Node>> {
    let mixin_frames = definition_frames(def, ctx);
    let mut evaluated = Vec::new();
    let params = eval_params(def, args, &mixin_frames, &mut evaluated, ctx)?;

    let arguments = Expression::new(evaluated.into_iter().flatten().collect());
    let arguments = eval_node(&Node::Expression(arguments), ctx)?;
    prepend(&params, Declaration::new("@arguments", arguments, def.pos.clone()));

    let mut own = Ruleset::new(None, def.rules.clone());
    own.id = def.id;
    let own = ctx.new_frame(own);
    let frames: Vec<FrameRef> = [own, params].into_iter().chain(mixin_frames).collect();

    let mut body = Ruleset::new(None, def.rules.clone());
    body.id = def.id;
    body.pos = def.pos.clone();
    let result = ctx.with_frames(frames, |c| eval_ruleset(&body, c))?;
    Ok(if important {
        result.rules.into_iter().map(make_important).collect()
    } else {
        result.rules
    })
}

fn prepend(frame: &FrameRef, decl: Declaration) {
    let mut f = frame.borrow_mut();
    f.rules.insert(0, Node::Declaration(decl));
    f.reset_cache();
}

/// Binds arguments to parameters in a fresh frame. `evaluated` receives the
/// bound values by parameter position, for `@arguments`.
fn eval_params(
    def: &MixinDefinition,
    args: &[Arg],
    mixin_frames: &[FrameRef],
    evaluated: &mut Vec<Option<Node>>,
    ctx: &mut EvalContext,
) -> LessResult<FrameRef> {
    let functions = mixin_frames
        .iter()
        .find_map(|f| f.borrow().functions.clone())
        .unwrap_or_else(|| Rc::clone(&ctx.registry));
    let mut scope = Ruleset::new(None, Vec::new());
    scope.functions = Some(FunctionRegistry::inherit(&functions));
    let frame = ctx.new_frame(scope);

    let given = args.len();
    let mut args: Vec<Arg> = args.to_vec();
    evaluated.clear();
    evaluated.resize(def.params.len().max(given), None);

    let mut i = 0;
    while i < args.len() {
        let Some(name) = args[i].name.clone() else {
            i += 1;
            continue;
        };
        let slot = def
            .params
            .iter()
            .enumerate()
            .position(|(j, p)| evaluated[j].is_none() && p.name.as_deref() == Some(name.as_str()));
        let Some(slot) = slot else {
            return Err(err_msg!(
                Runtime,
                "Named argument for {} {} not found",
                def.name,
                name
            ));
        };
        let value = args.remove(i).value;
        evaluated[slot] = Some(value.clone());
        prepend(&frame, Declaration::new(name, value, def.pos.clone()));
    }

    let mut next = 0;
    for (i, param) in def.params.iter().enumerate() {
        if evaluated[i].is_some() {
            continue;
        }
        if let Some(name) = &param.name {
            if param.variadic {
                let rest: Vec<Node> = args.iter().skip(next).map(|a| a.value.clone()).collect();
                let rest = eval_node(&Node::Expression(Expression::new(rest)), ctx)?;
                prepend(&frame, Declaration::new(name.clone(), rest, def.pos.clone()));
            } else {
                let value = match (args.get(next), &param.value) {
                    (Some(arg), _) => arg.value.clone(),
                    (None, Some(default)) => {
                        let scope: Vec<FrameRef> = std::iter::once(Rc::clone(&frame))
                            .chain(mixin_frames.iter().cloned())
                            .collect();
                        let value = ctx.with_frames(scope, |c| eval_node(default, c))?;
                        frame.borrow().reset_cache();
                        value
                    }
                    (None, None) => {
                        return Err(err_at!(
                            Runtime,
                            &def.pos,
                            "wrong number of arguments for {} ({} for {})",
                            def.name,
                            given,
                            def.arity
                        ))
                    }
                };
                prepend(&frame, Declaration::new(name.clone(), value.clone(), def.pos.clone()));
                evaluated[i] = Some(value);
            }
        }
        if param.variadic {
            for (j, arg) in args.iter().enumerate().skip(next) {
                if j >= evaluated.len() {
                    evaluated.resize(j + 1, None);
                }
                evaluated[j] = Some(arg.value.clone());
            }
        }
        next += 1;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;
    use crate::options::LessOptions;
    use crate::tree::FileInfo;

    fn eval_source(source: &str) -> LessResult<Ruleset> {
        let file = Rc::new(FileInfo::new("test.less", source));
        let root = crate::parser::parse_stylesheet(&file, false, false)?;
        let mut ctx =
            EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()));
        crate::eval::evaluate(root, &mut ctx)
    }

    /// `name: value` pairs of the declarations in the last top-level ruleset.
    fn last_declarations(root: &Ruleset) -> Vec<(String, String)> {
        let Some(Node::Ruleset(rs)) = root.rules.last() else {
            panic!("expected a trailing ruleset");
        };
        rs.rules
            .iter()
            .filter_map(|r| match r {
                Node::Declaration(d) => Some((d.name_str().to_string(), css(&d.value))),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_defaults_and_named_arguments() {
        let root = eval_source(".m(@a; @b: 2) { x: @a; y: @b; } .c { .m(@b: 3; 1); }").unwrap();
        assert_eq!(
            last_declarations(&root),
            vec![("x".into(), "1".into()), ("y".into(), "3".into())]
        );
    }

    #[test]
    fn test_pattern_matching_and_arguments_variable() {
        let root = eval_source(
            ".m(dark; @c) { color: darken(@c, 10%); } .m(light; @c) { color: @c; } \
             .m(@_; @c) { all: @arguments; } .c { .m(light; red); }",
        )
        .unwrap();
        assert_eq!(
            last_declarations(&root),
            vec![("color".into(), "red".into()), ("all".into(), "light red".into())]
        );
    }

    #[test]
    fn test_default_guard_picks_fallback() {
        let root = eval_source(
            ".m(@x) when (@x > 0) { a: pos; } .m(@x) when (default()) { a: other; } \
             .c { .m(-1); }",
        )
        .unwrap();
        assert_eq!(last_declarations(&root), vec![("a".into(), "other".into())]);
    }

    #[test]
    fn test_variadic_rest() {
        let root = eval_source(".m(@a; @rest...) { r: @rest; } .c { .m(1; 2; 3); }").unwrap();
        assert_eq!(last_declarations(&root), vec![("r".into(), "2 3".into())]);
    }

    #[test]
    fn test_ruleset_called_as_mixin() {
        let root = eval_source(".a { color: red; } .b { .a(); }").unwrap();
        assert_eq!(last_declarations(&root), vec![("color".into(), "red".into())]);
    }

    #[test]
    fn test_call_errors() {
        let err = eval_source(".c { .missing(); }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.message(), ".missing is undefined");

        let err = eval_source(".m(@a) { x: @a; } .c { .m(1; 2); }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.message(), "No matching definition was found for `.m(1, 2)`");

        let err = eval_source(".m(@a) { x: @a; } .c { .m(@b: 1); }").unwrap_err();
        assert_eq!(err.message(), "Named argument for .m @b not found");

        let err = eval_source(".m(@a) { x: @a; } .m(@a; @b) { y: @b; } .c { .m(); }").unwrap_err();
        assert_eq!(err.message(), "No matching definition was found for `.m()`");
    }

    #[test]
    fn test_recursion_depth_is_bounded() {
        let file = Rc::new(FileInfo::new("test.less", ".m() { .m(); } .c { .m(); }"));
        let root = crate::parser::parse_stylesheet(&file, false, false).unwrap();
        let options = LessOptions {
            max_depth: 20,
            ..LessOptions::default()
        };
        let mut ctx = EvalContext::new(&options, Rc::new(FunctionRegistry::with_builtins()));
        let err = crate::eval::evaluate(root, &mut ctx).unwrap_err();
        assert_eq!(err.message(), "Maximum mixin call depth exceeded");
    }
}
