//! Unit manipulation.

use crate::err_msg;
use crate::functions::helpers::{arg, css, text_of};
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{Anonymous, Dimension, Node, Unit};

pub fn register_number_functions(registry: &mut FunctionRegistry) {
    registry.register("unit", Function::Pure(unit));
    registry.register("get-unit", Function::Pure(get_unit));
    registry.register("convert", Function::Pure(convert));
}

/// Usage: `unit(5px, em)` gives `5em`; `unit(5px)` strips the unit.
fn unit(args: &[Node]) -> FnResult {
    let value = arg(args, 0, "unit")?;
    let Node::Dimension(d) = value else {
        let hint = if matches!(value, Node::Operation(_)) {
            ". Have you forgotten parenthesis?"
        } else {
            ""
        };
        return Err(err_msg!(
            Argument,
            "the first argument to unit must be a number{}",
            hint
        ));
    };
    let unit = match args.get(1) {
        Some(Node::Keyword(k)) => k.value.clone(),
        Some(other) => css(other),
        None => String::new(),
    };
    Ok(Some(Node::Dimension(Dimension::new(d.value, Unit::atom(&unit)))))
}

fn get_unit(args: &[Node]) -> FnResult {
    match arg(args, 0, "get-unit")? {
        Node::Dimension(d) => Ok(Some(Node::Anonymous(Anonymous::new(d.unit.to_string())))),
        _ => Err(err_msg!(Argument, "argument must be a number")),
    }
}

/// Usage: `convert(1s, ms)`; incompatible groups keep the value as is.
fn convert(args: &[Node]) -> FnResult {
    let Node::Dimension(d) = arg(args, 0, "convert")? else {
        return Err(err_msg!(Argument, "argument must be a number"));
    };
    let target = text_of(arg(args, 1, "convert")?);
    Ok(Some(Node::Dimension(d.convert_to_unit(&target))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(v: f64, unit: &str) -> Node {
        Node::Dimension(Dimension::with_unit(v, unit))
    }

    #[test]
    fn test_unit_and_get_unit() {
        let out = unit(&[dim(5.0, "px"), Node::keyword("em")]).unwrap().unwrap();
        assert_eq!(css(&out), "5em");
        let out = unit(&[dim(5.0, "px")]).unwrap().unwrap();
        assert_eq!(css(&out), "5");
        let out = get_unit(&[dim(5.0, "px")]).unwrap().unwrap();
        assert_eq!(css(&out), "px");
    }

    #[test]
    fn test_unit_hints_parenthesis() {
        let op = Node::Operation(crate::tree::Operation::new("+", dim(1.0, ""), dim(2.0, ""), true));
        let err = unit(&[op]).unwrap_err();
        assert_eq!(
            err.message(),
            "the first argument to unit must be a number. Have you forgotten parenthesis?"
        );
    }

    #[test]
    fn test_convert() {
        let out = convert(&[dim(1.0, "s"), Node::keyword("ms")]).unwrap().unwrap();
        assert_eq!(css(&out), "1000ms");
        let out = convert(&[dim(2.0, "px"), Node::keyword("s")]).unwrap().unwrap();
        assert_eq!(css(&out), "2px");
    }
}
