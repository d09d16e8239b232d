//! Argument extraction shared by the builtin domains.

use crate::diagnostics::LessResult;
use crate::output::{node_css, GenContext};
use crate::tree::{Color, Dimension, Node};
use crate::err_msg;

/// The argument at `index`, or an `Argument` error naming the function.
pub fn arg<'a>(args: &'a [Node], index: usize, function: &str) -> LessResult<&'a Node> {
    args.get(index).ok_or_else(|| {
        err_msg!(
            Argument,
            "{} expects at least {} argument{}",
            function,
            index + 1,
            if index == 0 { "" } else { "s" }
        )
    })
}

pub fn as_color(node: &Node) -> Option<&Color> {
    match node {
        Node::Color(c) => Some(c),
        _ => None,
    }
}

/// The color at `index`, erroring when the argument is not one.
pub fn color_arg<'a>(args: &'a [Node], index: usize, function: &str) -> LessResult<&'a Color> {
    as_color(arg(args, index, function)?)
        .ok_or_else(|| err_msg!(Argument, "Argument cannot be evaluated to a color"))
}

pub fn as_dimension(node: &Node) -> Option<&Dimension> {
    match node {
        Node::Dimension(d) => Some(d),
        _ => None,
    }
}

/// The numeric value of a dimension argument, regardless of unit.
pub fn value_of(args: &[Node], index: usize, function: &str) -> LessResult<f64> {
    match arg(args, index, function)? {
        Node::Dimension(d) => Ok(d.value),
        _ => Err(err_msg!(Argument, "argument must be a number")),
    }
}

/// A color channel parameter: percentages are fractions of one.
pub fn number(node: &Node) -> LessResult<f64> {
    match node {
        Node::Dimension(d) if d.unit.is("%") => Ok(d.value / 100.0),
        Node::Dimension(d) => Ok(d.value),
        _ => Err(err_msg!(Argument, "color functions take numbers as parameters")),
    }
}

/// Like [`number`], but percentages scale to `size`.
pub fn scaled(node: &Node, size: f64) -> LessResult<f64> {
    match node {
        Node::Dimension(d) if d.unit.is("%") => Ok(d.value * size / 100.0),
        other => number(other),
    }
}

pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Text of a keyword-like argument (`relative`, units, flags).
pub fn text_of(node: &Node) -> String {
    match node {
        Node::Keyword(k) => k.value.clone(),
        Node::Quoted(q) => q.value.clone(),
        Node::Anonymous(a) => a.value.clone(),
        other => css(other),
    }
}

/// CSS text of a value as it would print uncompressed.
pub fn css(node: &Node) -> String {
    node_css(node, &GenContext::inline(false)).unwrap_or_default()
}

pub fn dimension(value: f64, unit: &str) -> Option<Node> {
    Some(Node::Dimension(Dimension::with_unit(value, unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_and_scaled() {
        let pct = Node::Dimension(Dimension::with_unit(50.0, "%"));
        assert_eq!(number(&pct).unwrap(), 0.5);
        assert_eq!(scaled(&pct, 255.0).unwrap(), 127.5);
        let err = number(&Node::keyword("x")).unwrap_err();
        assert_eq!(err.message(), "color functions take numbers as parameters");
    }

    #[test]
    fn test_missing_argument() {
        let err = arg(&[], 1, "mix").unwrap_err();
        assert_eq!(err.message(), "mix expects at least 2 arguments");
    }
}
