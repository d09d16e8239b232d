//! Value evaluation: strings, urls, function calls, arithmetic and guards.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::diagnostics::{LessError, LessResult};
use crate::err_msg;
use crate::eval::context::{path_diff, EvalContext, ScriptValue};
use crate::eval::eval_node;
use crate::functions::helpers::css;
use crate::options::{MathMode, RewriteUrls};
use crate::tree::{
    Anonymous, Assignment, Attribute, Call, Color, Condition, Dimension, Expression, JavaScript,
    Node, Operation, Property, Quoted, SourcePos, Url, Value, Variable,
};

static VAR_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\{([\w-]+)\}").expect("static regex"));
static PROP_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([\w-]+)\}").expect("static regex"));
static BARE_VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([\w-]+)|@\{([\w-]+)\}").expect("static regex"));
static BARE_PROP_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([\w-]+)|\$\{([\w-]+)\}").expect("static regex"));
static URL_ESCAPES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[()'"\s]"#).expect("static regex"));
static DATA_URI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*data:").expect("static regex"));

// ============================================================================
// STRINGS
// ============================================================================

/// Replaces every match of `re` in `text` with `f(name)`, where `name` is
/// the first capture group that matched.
fn replace_refs(
    text: &str,
    re: &Regex,
    mut f: impl FnMut(&str) -> LessResult<String>,
) -> LessResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let name = first_group(&caps);
        out.push_str(&text[last..whole.start()]);
        out.push_str(&f(name)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn first_group<'t>(caps: &Captures<'t>) -> &'t str {
    (1..caps.len())
        .find_map(|i| caps.get(i))
        .map_or("", |m| m.as_str())
}

/// Repeats `replace_refs` until the text stops changing.
fn replace_until_stable(
    text: &str,
    re: &Regex,
    mut f: impl FnMut(&str) -> LessResult<String>,
) -> LessResult<String> {
    let mut current = text.to_string();
    loop {
        let next = replace_refs(&current, re, &mut f)?;
        if next == current {
            return Ok(next);
        }
        current = next;
    }
}

/// Text a value contributes when interpolated into a string.
fn interpolated_text(node: &Node) -> String {
    match node {
        Node::Quoted(q) => q.value.clone(),
        other => css(other),
    }
}

pub(super) fn eval_quoted(quoted: &Quoted, ctx: &mut EvalContext) -> LessResult<Node> {
    let (var_re, prop_re): (&Regex, &Regex) = if quoted.bare_vars {
        (&BARE_VAR_REF, &BARE_PROP_REF)
    } else {
        (&VAR_REF, &PROP_REF)
    };
    let pos = quoted.pos.clone();
    let value = replace_until_stable(&quoted.value, var_re, |name| {
        let var = Node::Variable(Variable::new(format!("@{name}"), pos.clone()));
        Ok(interpolated_text(&eval_node(&var, ctx)?))
    })?;
    let value = replace_until_stable(&value, prop_re, |name| {
        let prop = Node::Property(Property {
            name: format!("${name}"),
            pos: pos.clone(),
        });
        Ok(interpolated_text(&eval_node(&prop, ctx)?))
    })?;
    Ok(Node::Quoted(
        Quoted::new(quoted.quote, value, quoted.escaped).at(quoted.pos.clone()),
    ))
}

// ============================================================================
// URLS
// ============================================================================

/// Directory of the file at `pos` relative to the entry file, when urls
/// are being rewritten.
pub(super) fn rootpath(pos: &SourcePos, ctx: &EvalContext) -> String {
    match (&ctx.rewrite_urls, pos.file.as_ref()) {
        (RewriteUrls::Off, _) | (_, None) => String::new(),
        (_, Some(file)) => path_diff(&file.current_directory, &file.entry_path),
    }
}

pub(super) fn eval_url(url: &Url, ctx: &mut EvalContext) -> LessResult<Node> {
    let mut value = eval_node(&url.value, ctx)?;
    if !url.is_evald {
        let rootpath = rootpath(&url.pos, ctx);
        let (text, quoted) = match &mut value {
            Node::Quoted(q) => (Some(&mut q.value), true),
            Node::Anonymous(a) => (Some(&mut a.value), false),
            _ => (None, false),
        };
        if let Some(text) = text {
            if ctx.path_requires_rewrite(text) {
                let rootpath = if !quoted && !rootpath.is_empty() {
                    URL_ESCAPES.replace_all(&rootpath, r"\$0").into_owned()
                } else {
                    rootpath
                };
                *text = ctx.rewrite_path(text, &rootpath);
            } else {
                *text = super::context::normalize_path(text);
            }
            if let Some(args) = &ctx.url_args {
                if !DATA_URI.is_match(text) {
                    let separator = if text.contains('?') { "&" } else { "?" };
                    let query = format!("{separator}{args}");
                    match text.find('#') {
                        Some(hash) => text.insert_str(hash, &query),
                        None => text.push_str(&query),
                    }
                }
            }
        }
    }
    Ok(Node::Url(Url {
        value: Box::new(value),
        pos: url.pos.clone(),
        is_evald: true,
    }))
}

// ============================================================================
// CALLS
// ============================================================================

pub(super) fn eval_call(call: &Call, ctx: &mut EvalContext) -> LessResult<Node> {
    let is_calc = call.name == "calc";
    let saved_math = ctx.math_on;
    ctx.math_on = !is_calc;
    let calc_entered = is_calc || ctx.in_calc;
    if calc_entered {
        ctx.enter_calc();
    }
    let result = call_function(call, ctx);
    let result = match result {
        Ok(Some(node)) => Ok(node),
        Ok(None) => call
            .args
            .iter()
            .map(|a| eval_node(a, ctx))
            .collect::<LessResult<Vec<_>>>()
            .map(|args| {
                Node::Call(Call {
                    name: call.name.clone(),
                    args,
                    pos: call.pos.clone(),
                })
            }),
        Err(err) => Err(err),
    };
    if calc_entered {
        ctx.exit_calc();
    }
    ctx.math_on = saved_math;
    result
}

/// Runs a registered function; `Ok(None)` leaves the call as CSS.
fn call_function(call: &Call, ctx: &mut EvalContext) -> LessResult<Option<Node>> {
    let Some(function) = ctx.functions().lookup(&call.name.to_ascii_lowercase()) else {
        return Ok(None);
    };
    let wrap = |err: LessError| {
        let message = format!("Error evaluating function `{}`: {}", call.name, err.message());
        rekind(&err, message).located(&call.pos)
    };
    let args = if function.evaluates_args() {
        call.args
            .iter()
            .map(|a| eval_node(a, ctx))
            .collect::<LessResult<Vec<_>>>()
            .map_err(wrap)?
    } else {
        call.args.clone()
    };
    let args = prepare_args(args);
    function.call(ctx, &args, &call.pos).map_err(wrap)
}

/// Same error kind, new message, no position.
fn rekind(err: &LessError, message: String) -> LessError {
    match err {
        LessError::Syntax { .. } => err_msg!(Syntax, message),
        LessError::Parse { .. } => err_msg!(Parse, message),
        LessError::Name { .. } => err_msg!(Name, message),
        LessError::Runtime { .. } => err_msg!(Runtime, message),
        LessError::Argument { .. } => err_msg!(Argument, message),
        LessError::Operation { .. } => err_msg!(Operation, message),
        LessError::File { .. } => err_msg!(File, message),
    }
}

/// Drops comments and unwraps single-item expressions, except a
/// parenthesized division which must stay intact.
fn prepare_args(args: Vec<Node>) -> Vec<Node> {
    args.into_iter()
        .filter(|a| !matches!(a, Node::Comment(_)))
        .map(|a| match a {
            Node::Expression(e) => {
                let mut items: Vec<Node> = e
                    .value
                    .iter()
                    .filter(|i| !matches!(i, Node::Comment(_)))
                    .cloned()
                    .collect();
                if items.len() == 1 {
                    if e.parens && matches!(&items[0], Node::Operation(op) if op.op == "/") {
                        return Node::Expression(e);
                    }
                    items.remove(0)
                } else {
                    Node::Expression(Expression::new(items))
                }
            }
            other => other,
        })
        .collect()
}

// ============================================================================
// ARITHMETIC
// ============================================================================

pub(super) fn eval_operation(op: &Operation, ctx: &mut EvalContext) -> LessResult<Node> {
    let mut a = eval_node(&op.left, ctx)?;
    let mut b = eval_node(&op.right, ctx)?;
    if !ctx.is_math_on(Some(&op.op)) {
        return Ok(Node::Operation(Operation::new(&op.op, a, b, op.is_spaced)));
    }
    let operator = if op.op == "./" { "/" } else { op.op.as_str() };
    if let (Node::Dimension(d), Node::Color(_)) = (&a, &b) {
        a = Node::Color(Color::new([d.value; 3], 1.0));
    }
    if let (Node::Color(_), Node::Dimension(d)) = (&a, &b) {
        b = Node::Color(Color::new([d.value; 3], 1.0));
    }
    match (&a, &b) {
        (Node::Dimension(x), Node::Dimension(y)) => {
            Ok(Node::Dimension(x.operate(operator, y, ctx.strict_units)?))
        }
        (Node::Color(x), Node::Color(y)) => Ok(Node::Color(x.operate(operator, y))),
        _ => {
            let is_division = |n: &Node| matches!(n, Node::Operation(o) if o.op == "/");
            if (is_division(&a) || is_division(&b)) && ctx.math == MathMode::ParensDivision {
                return Ok(Node::Operation(Operation::new(&op.op, a, b, op.is_spaced)));
            }
            Err(err_msg!(Operation, "Operation on an invalid type"))
        }
    }
}

pub(super) fn eval_negative(inner: &Node, ctx: &mut EvalContext) -> LessResult<Node> {
    if ctx.is_math_on(None) {
        let product = Operation::new(
            "*",
            Node::Dimension(Dimension::unitless(-1.0)),
            inner.clone(),
            false,
        );
        return eval_operation(&product, ctx);
    }
    Ok(Node::Negative(Box::new(eval_node(inner, ctx)?)))
}

pub(super) fn eval_expression(expr: &Expression, ctx: &mut EvalContext) -> LessResult<Node> {
    let math_on = ctx.is_math_on(None);
    if expr.parens {
        ctx.in_parens();
    }
    let mut double_paren = false;
    let result = match expr.value.as_slice() {
        [] => Ok(Node::Expression(expr.clone())),
        [single] => {
            if let Node::Expression(inner) = single {
                double_paren = inner.parens && !inner.parens_in_op && !ctx.in_calc;
            }
            eval_node(single, ctx)
        }
        items => items
            .iter()
            .map(|i| eval_node(i, ctx))
            .collect::<LessResult<Vec<_>>>()
            .map(|value| {
                Node::Expression(Expression {
                    value,
                    no_spacing: expr.no_spacing,
                    ..Expression::default()
                })
            }),
    };
    if expr.parens {
        ctx.out_of_parens();
    }
    let result = result?;
    if expr.parens
        && expr.parens_in_op
        && !math_on
        && !double_paren
        && !matches!(result, Node::Dimension(_))
    {
        return Ok(Node::Paren(Box::new(result)));
    }
    Ok(result)
}

pub(super) fn eval_value(value: &Value, ctx: &mut EvalContext) -> LessResult<Node> {
    if let [single] = value.value.as_slice() {
        return eval_node(single, ctx);
    }
    let items = value
        .value
        .iter()
        .map(|v| eval_node(v, ctx))
        .collect::<LessResult<Vec<_>>>()?;
    Ok(Node::Value(Value::new(items)))
}

pub(super) fn eval_assignment(assignment: &Assignment, ctx: &mut EvalContext) -> LessResult<Node> {
    Ok(Node::Assignment(Assignment {
        key: assignment.key.clone(),
        value: Box::new(eval_node(&assignment.value, ctx)?),
    }))
}

pub(super) fn eval_attribute(attr: &Attribute, ctx: &mut EvalContext) -> LessResult<Attribute> {
    Ok(Attribute {
        key: Box::new(eval_node(&attr.key, ctx)?),
        op: attr.op.clone(),
        value: match &attr.value {
            Some(v) => Some(Box::new(eval_node(v, ctx)?)),
            None => None,
        },
        cif: attr.cif.clone(),
    })
}

// ============================================================================
// GUARDS
// ============================================================================

pub(super) fn eval_condition(cond: &Condition, ctx: &mut EvalContext) -> LessResult<bool> {
    let a = eval_node(&cond.lvalue, ctx)?;
    let b = eval_node(&cond.rvalue, ctx)?;
    let result = match cond.op.as_str() {
        "and" => is_true(&a) && is_true(&b),
        "or" => is_true(&a) || is_true(&b),
        op => match compare_nodes(&a, &b) {
            Some(Ordering::Less) => matches!(op, "<" | "=<" | "<="),
            Some(Ordering::Equal) => matches!(op, "=" | ">=" | "=<" | "<="),
            Some(Ordering::Greater) => matches!(op, ">" | ">="),
            None => false,
        },
    };
    Ok(result != cond.negate)
}

/// Evaluates a guard (a condition or any value) to a boolean.
pub fn guard_passes(guard: &Node, ctx: &mut EvalContext) -> LessResult<bool> {
    match guard {
        Node::Condition(cond) => eval_condition(cond, ctx),
        other => Ok(is_true(&eval_node(other, ctx)?)),
    }
}

fn is_true(node: &Node) -> bool {
    matches!(node, Node::Keyword(k) if k.value == "true")
}

/// Ordering between two evaluated values; `None` when incomparable.
pub fn compare_nodes(a: &Node, b: &Node) -> Option<Ordering> {
    match (a, b) {
        (Node::Dimension(x), Node::Dimension(y)) => x.compare(y),
        (Node::Color(x), Node::Color(y)) => x.same_as(y).then_some(Ordering::Equal),
        (Node::Quoted(x), Node::Quoted(y)) if !x.escaped && !y.escaped => {
            Some(x.value.cmp(&y.value))
        }
        (Node::Quoted(_) | Node::Anonymous(_), _) | (_, Node::Quoted(_) | Node::Anonymous(_)) => {
            (css(a) == css(b)).then_some(Ordering::Equal)
        }
        (Node::Keyword(x), Node::Keyword(y)) => (x.value == y.value).then_some(Ordering::Equal),
        (Node::Expression(_) | Node::Value(_), Node::Expression(_) | Node::Value(_)) => {
            let (xs, ys) = (a.list_items(), b.list_items());
            if xs.len() != ys.len() {
                return None;
            }
            xs.iter()
                .zip(&ys)
                .all(|(x, y)| compare_nodes(x, y) == Some(Ordering::Equal))
                .then_some(Ordering::Equal)
        }
        _ if a.type_name() == b.type_name() => (css(a) == css(b)).then_some(Ordering::Equal),
        _ => None,
    }
}

// ============================================================================
// SCRIPTS
// ============================================================================

pub(super) fn eval_javascript(js: &JavaScript, ctx: &mut EvalContext) -> LessResult<Node> {
    let script = match (&ctx.script, ctx.javascript_enabled) {
        (Some(script), true) => std::rc::Rc::clone(script),
        _ => {
            return Err(err_msg!(Syntax, "Inline JavaScript is not enabled").located(&js.pos));
        }
    };
    let pos = js.pos.clone();
    let expression = replace_refs(&js.expression, &VAR_REF, |name| {
        let value = eval_node(&Node::Variable(Variable::new(format!("@{name}"), pos.clone())), ctx)?;
        Ok(match &value {
            Node::Value(_) | Node::Expression(_) => {
                let items: Vec<String> = value.list_items().iter().map(css).collect();
                format!("[{}]", items.join(", "))
            }
            other => css(other),
        })
    })?;
    let result = script
        .evaluate(&expression)
        .map_err(|message| err_msg!(Syntax, "JavaScript evaluation error: {}", message).located(&js.pos))?;
    Ok(match result {
        ScriptValue::Number(n) => Node::Dimension(Dimension::unitless(n)),
        ScriptValue::Text(text) => Node::Quoted(Quoted::new('"', text, js.escaped).at(js.pos.clone())),
        ScriptValue::List(items) => Node::Anonymous(Anonymous::new(items.join(", ")).at(js.pos.clone())),
    })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::options::LessOptions;
    use crate::tree::Keyword;

    fn ctx() -> EvalContext {
        EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()))
    }

    fn px(v: f64) -> Node {
        Node::Dimension(Dimension::with_unit(v, "px"))
    }

    #[test]
    fn test_division_outside_parens_is_kept() {
        let mut c = ctx();
        let op = Operation::new("/", px(10.0), px(2.0), false);
        assert_eq!(css(&eval_operation(&op, &mut c).unwrap()), "10px/2px");
        let mut paren = Expression::new(vec![Node::Operation(op)]);
        paren.parens = true;
        assert_eq!(css(&eval_expression(&paren, &mut c).unwrap()), "5px");
    }

    #[test]
    fn test_color_arithmetic_with_number() {
        let mut c = ctx();
        let red = Node::Color(Color::new([100.0, 0.0, 0.0], 1.0));
        let op = Operation::new("+", red, Node::Dimension(Dimension::unitless(10.0)), true);
        assert_eq!(css(&eval_operation(&op, &mut c).unwrap()), "#6e0a0a");
    }

    #[test]
    fn test_invalid_operand() {
        let mut c = ctx();
        let op = Operation::new("+", px(1.0), Node::keyword("auto"), true);
        let err = eval_operation(&op, &mut c).unwrap_err();
        assert_eq!(err.message(), "Operation on an invalid type");
    }

    #[test]
    fn test_compare_nodes() {
        assert_eq!(compare_nodes(&px(1.0), &px(2.0)), Some(Ordering::Less));
        let kw = |s: &str| Node::Keyword(Keyword::new(s));
        assert_eq!(compare_nodes(&kw("a"), &kw("a")), Some(Ordering::Equal));
        assert_eq!(compare_nodes(&kw("a"), &kw("b")), None);
        let q = |s: &str| Node::Quoted(Quoted::new('"', s, false));
        assert_eq!(compare_nodes(&q("a"), &q("b")), Some(Ordering::Less));
        assert_eq!(compare_nodes(&px(1.0), &kw("a")), None);
    }

    #[test]
    fn test_unknown_function_stays_css() {
        let mut c = ctx();
        let call = Call {
            name: "foo".into(),
            args: vec![px(1.0)],
            pos: Default::default(),
        };
        assert_eq!(css(&eval_call(&call, &mut c).unwrap()), "foo(1px)");
    }

    #[test]
    fn test_url_args_before_fragment() {
        let mut c = ctx();
        c.url_args = Some("v=1".into());
        let url = Url {
            value: Box::new(Node::Quoted(Quoted::new('"', "a.svg#icon", false))),
            pos: Default::default(),
            is_evald: false,
        };
        assert_eq!(css(&eval_url(&url, &mut c).unwrap()), "url(\"a.svg?v=1#icon\")");
    }

    #[test]
    fn test_script_requires_evaluator() {
        let mut c = ctx();
        let js = JavaScript {
            expression: "1 + 1".into(),
            escaped: false,
            pos: Default::default(),
        };
        let err = eval_javascript(&js, &mut c).unwrap_err();
        assert_eq!(err.message(), "Inline JavaScript is not enabled");
    }
}
