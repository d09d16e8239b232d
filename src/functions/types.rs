//! Type predicates returning the keywords `true` and `false`.

use crate::err_msg;
use crate::functions::helpers::arg;
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::Node;

pub fn register_type_functions(registry: &mut FunctionRegistry) {
    let table: &[(&str, fn(&[Node]) -> FnResult)] = &[
        ("isruleset", |a| is(a, "isruleset", |n| matches!(n, Node::DetachedRuleset(_)))),
        ("iscolor", |a| is(a, "iscolor", |n| matches!(n, Node::Color(_)))),
        ("isnumber", |a| is(a, "isnumber", |n| matches!(n, Node::Dimension(_)))),
        ("isstring", |a| is(a, "isstring", |n| matches!(n, Node::Quoted(_)))),
        ("iskeyword", |a| is(a, "iskeyword", |n| matches!(n, Node::Keyword(_)))),
        ("isurl", |a| is(a, "isurl", |n| matches!(n, Node::Url(_)))),
        ("ispixel", |a| has_unit(a, "px")),
        ("ispercentage", |a| has_unit(a, "%")),
        ("isem", |a| has_unit(a, "em")),
        ("islength", |a| {
            is(a, "islength", |n| matches!(n, Node::Dimension(d) if d.unit.is_length()))
        }),
        ("isunit", isunit),
    ];
    for (name, f) in table {
        registry.register(name, Function::Pure(*f));
    }
}

fn is(args: &[Node], name: &str, test: fn(&Node) -> bool) -> FnResult {
    Ok(Some(Node::boolean(test(arg(args, 0, name)?))))
}

fn has_unit(args: &[Node], unit: &str) -> FnResult {
    let n = arg(args, 0, "isunit")?;
    Ok(Some(Node::boolean(
        matches!(n, Node::Dimension(d) if d.unit.is(unit)),
    )))
}

/// Usage: `isunit(11px, px)`; the unit may be a keyword or a string.
fn isunit(args: &[Node]) -> FnResult {
    let Some(unit) = args.get(1) else {
        return Err(err_msg!(
            Argument,
            "missing the required second argument to isunit."
        ));
    };
    let unit = match unit {
        Node::Keyword(k) => k.value.clone(),
        Node::Quoted(q) => q.value.clone(),
        Node::Anonymous(a) => a.value.clone(),
        _ => {
            return Err(err_msg!(
                Argument,
                "Second argument to isunit should be a unit or a string."
            ))
        }
    };
    has_unit(args, &unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::helpers::css;
    use crate::tree::{Color, Dimension};

    fn check(f: fn(&[Node]) -> FnResult, args: &[Node]) -> String {
        css(&f(args).unwrap().unwrap())
    }

    #[test]
    fn test_predicates() {
        let px = Node::Dimension(Dimension::with_unit(11.0, "px"));
        let red = Node::Color(Color::new([255.0, 0.0, 0.0], 1.0));
        assert_eq!(check(|a| is(a, "iscolor", |n| matches!(n, Node::Color(_))), &[red.clone()]), "true");
        assert_eq!(check(|a| has_unit(a, "px"), &[px.clone()]), "true");
        assert_eq!(check(|a| has_unit(a, "em"), &[px.clone()]), "false");
        assert_eq!(check(isunit, &[px.clone(), Node::keyword("px")]), "true");
        assert_eq!(check(isunit, &[red, Node::keyword("px")]), "false");
    }

    #[test]
    fn test_isunit_requires_unit() {
        let px = Node::Dimension(Dimension::with_unit(1.0, "px"));
        let err = isunit(&[px]).unwrap_err();
        assert_eq!(err.message(), "missing the required second argument to isunit.");
    }
}
