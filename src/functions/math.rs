//! Numeric functions. Unit handling follows the argument unless the
//! function fixes one (trigonometry, `percentage`).

use std::f64::consts::PI;

use crate::diagnostics::LessResult;
use crate::err_msg;
use crate::functions::helpers::arg;
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{Dimension, Node, Unit};

pub fn register_math_functions(registry: &mut FunctionRegistry) {
    let table: &[(&str, fn(&[Node]) -> FnResult)] = &[
        ("ceil", |a| apply(a, "ceil", f64::ceil, None)),
        ("floor", |a| apply(a, "floor", f64::floor, None)),
        ("sqrt", |a| apply(a, "sqrt", f64::sqrt, None)),
        ("abs", |a| apply(a, "abs", f64::abs, None)),
        ("tan", |a| apply(a, "tan", f64::tan, Some(""))),
        ("sin", |a| apply(a, "sin", f64::sin, Some(""))),
        ("cos", |a| apply(a, "cos", f64::cos, Some(""))),
        ("atan", |a| apply(a, "atan", f64::atan, Some("rad"))),
        ("asin", |a| apply(a, "asin", f64::asin, Some("rad"))),
        ("acos", |a| apply(a, "acos", f64::acos, Some("rad"))),
        ("percentage", |a| apply(a, "percentage", |n| n * 100.0, Some("%"))),
        ("round", round),
        ("pi", |_| Ok(Some(Node::Dimension(Dimension::unitless(PI))))),
        ("mod", modulo),
        ("pow", pow),
        ("min", |a| min_max(a, true)),
        ("max", |a| min_max(a, false)),
    ];
    for (name, f) in table {
        registry.register(name, Function::Pure(*f));
    }
}

/// Applies `f` to the value. A fixed `unit` first converts the argument to
/// base units.
fn apply(args: &[Node], name: &str, f: fn(f64) -> f64, unit: Option<&str>) -> FnResult {
    let Node::Dimension(n) = arg(args, 0, name)? else {
        return Err(err_msg!(Argument, "argument must be a number"));
    };
    let (value, unit) = match unit {
        None => (n.value, n.unit.clone()),
        Some(u) => (n.unify().value, Unit::atom(u)),
    };
    checked(Dimension::new(f(value), unit))
}

fn checked(d: Dimension) -> FnResult {
    if d.value.is_nan() {
        return Err(err_msg!(Argument, "Dimension is not a number"));
    }
    Ok(Some(Node::Dimension(d)))
}

fn round(args: &[Node]) -> FnResult {
    let Node::Dimension(n) = arg(args, 0, "round")? else {
        return Err(err_msg!(Argument, "argument must be a number"));
    };
    let places = match args.get(1) {
        Some(Node::Dimension(f)) => f.value.max(0.0) as i32,
        Some(_) => return Err(err_msg!(Argument, "argument must be a number")),
        None => 0,
    };
    let factor = 10f64.powi(places);
    checked(Dimension::new((n.value * factor).round() / factor, n.unit.clone()))
}

fn numbers<'a>(args: &'a [Node], name: &str) -> LessResult<(&'a Dimension, &'a Dimension)> {
    match (arg(args, 0, name)?, arg(args, 1, name)?) {
        (Node::Dimension(a), Node::Dimension(b)) => Ok((a, b)),
        _ => Err(err_msg!(Argument, "arguments must be numbers")),
    }
}

fn modulo(args: &[Node]) -> FnResult {
    let (a, b) = numbers(args, "mod")?;
    checked(Dimension::new(a.value % b.value, a.unit.clone()))
}

fn pow(args: &[Node]) -> FnResult {
    let (x, y) = numbers(args, "pow")?;
    checked(Dimension::new(x.value.powf(y.value), x.unit.clone()))
}

/// `min`/`max` over numbers with compatible units. A unitless argument
/// takes the unit of the first dimensioned one for comparison. List
/// arguments are flattened; any other value leaves the call as CSS.
fn min_max(args: &[Node], is_min: bool) -> FnResult {
    if args.is_empty() {
        return Err(err_msg!(Argument, "one or more arguments required"));
    }
    let mut queue: Vec<Node> = args.to_vec();
    let mut best: Option<(Dimension, f64)> = None;
    let mut first_unit: Option<String> = None;
    let mut unified_unit: Option<String> = None;
    let mut i = 0;
    while i < queue.len() {
        let current = queue[i].clone();
        i += 1;
        let d = match current {
            Node::Dimension(d) => d,
            Node::Value(v) => {
                queue.extend(v.value);
                continue;
            }
            Node::Expression(e) => {
                queue.extend(e.value);
                continue;
            }
            _ => return Ok(None),
        };
        let unified = match (&first_unit, d.unit.is_empty()) {
            (Some(u), true) => Dimension::with_unit(d.value, u).unify(),
            _ => d.unify(),
        };
        let unit = unified.unit.to_css(false);
        if !unit.is_empty() {
            match &unified_unit {
                Some(expected) if *expected != unit => {
                    return Err(err_msg!(Argument, "incompatible types"));
                }
                Some(_) => {}
                None => {
                    unified_unit = Some(unit);
                    first_unit = Some(d.unit.to_css(false));
                }
            }
        }
        let replace = match &best {
            None => true,
            Some((_, value)) if is_min => unified.value < *value,
            Some((_, value)) => unified.value > *value,
        };
        if replace {
            best = Some((d, unified.value));
        }
    }
    Ok(best.map(|(d, _)| Node::Dimension(d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::helpers::css;

    fn dim(v: f64, unit: &str) -> Node {
        Node::Dimension(Dimension::with_unit(v, unit))
    }

    fn run(f: fn(&[Node]) -> FnResult, args: &[Node]) -> String {
        css(&f(args).unwrap().expect("declined"))
    }

    #[test]
    fn test_unit_preserving() {
        let ceil = |a: &[Node]| apply(a, "ceil", f64::ceil, None);
        assert_eq!(run(ceil, &[dim(3.2, "px")]), "4px");
        assert_eq!(run(round, &[dim(1.67, "em"), dim(1.0, "")]), "1.7em");
        assert_eq!(run(modulo, &[dim(11.0, "px"), dim(3.0, "")]), "2px");
        assert_eq!(run(pow, &[dim(2.0, "cm"), dim(3.0, "")]), "8cm");
    }

    #[test]
    fn test_fixed_units() {
        let pct = |a: &[Node]| apply(a, "percentage", |n| n * 100.0, Some("%"));
        assert_eq!(run(pct, &[dim(0.5, "")]), "50%");
        let sin = |a: &[Node]| apply(a, "sin", f64::sin, Some(""));
        assert_eq!(run(sin, &[dim(90.0, "deg")]), "1");
        let sqrt = |a: &[Node]| apply(a, "sqrt", f64::sqrt, None);
        assert_eq!(sqrt(&[dim(-1.0, "")]).unwrap_err().message(), "Dimension is not a number");
    }

    #[test]
    fn test_min_max() {
        assert_eq!(run(|a| min_max(a, true), &[dim(3.0, "px"), dim(1.0, "cm"), dim(2.0, "")]), "2");
        assert_eq!(run(|a| min_max(a, false), &[dim(1.0, "cm"), dim(20.0, "mm")]), "20mm");
        let err = min_max(&[dim(1.0, "px"), dim(1.0, "s")], true).unwrap_err();
        assert_eq!(err.message(), "incompatible types");
        assert!(min_max(&[Node::keyword("auto"), dim(1.0, "px")], true).unwrap().is_none());
    }
}
