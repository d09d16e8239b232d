//! Values, expressions, arithmetic and guard conditions.

use crate::diagnostics::LessResult;
use crate::parser::Parser;
use crate::tree::{Anonymous, Condition, Expression, Node, Operation, Value};

impl Parser {
    /// Comma-separated expressions.
    pub(super) fn value(&mut self) -> LessResult<Option<Node>> {
        let mut expressions = Vec::new();
        while let Some(e) = self.expression()? {
            expressions.push(e);
            if !self.input.char(',') {
                break;
            }
        }
        Ok((!expressions.is_empty()).then(|| Node::Value(Value::new(expressions))))
    }

    /// Space-separated operations and entities. A `/` between two items
    /// that did not form a division (`small/20px`) is kept as text.
    pub(super) fn expression(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let mut entities = Vec::new();
        loop {
            if let Some(comment) = self.comment() {
                entities.push(comment);
                continue;
            }
            let e = match self.addition()? {
                Some(e) => Some(e),
                None => self.entity()?,
            };
            match e {
                Some(Node::Comment(_)) | None => break,
                Some(e) => {
                    entities.push(e);
                    if !self.input.peek_re(regex!(r"^/[/*]")) && self.input.char('/') {
                        entities.push(Node::Anonymous(Anonymous::new("/").at(self.pos(index))));
                    }
                }
            }
        }
        Ok((!entities.is_empty()).then(|| Node::Expression(Expression::new(entities))))
    }

    /// `( addition )`
    fn sub(&mut self) -> LessResult<Option<Node>> {
        self.input.save();
        if !self.input.char('(') {
            self.input.restore(None);
            return Ok(None);
        }
        if let Some(a) = self.addition()? {
            if self.input.char(')') {
                self.input.forget();
                return Ok(Some(Node::Expression(Expression {
                    value: vec![a],
                    parens: true,
                    ..Expression::default()
                })));
            }
        }
        self.input.restore(Some("Expected ')'"));
        Ok(None)
    }

    fn multiplication(&mut self) -> LessResult<Option<Node>> {
        let Some(mut m) = self.operand()? else {
            return Ok(None);
        };
        let mut is_spaced = self.input.is_whitespace(-1);
        loop {
            if self.input.peek_re(regex!(r"^/[*/]")) {
                break;
            }
            self.input.save();
            let op = if self.input.char('/') {
                "/"
            } else if self.input.char('*') {
                "*"
            } else if self.input.str("./") {
                "./"
            } else {
                self.input.forget();
                break;
            };
            let Some(a) = self.operand()? else {
                self.input.restore(None);
                break;
            };
            self.input.forget();
            m = Node::Operation(Operation::new(op, in_op(m), in_op(a), is_spaced));
            is_spaced = self.input.is_whitespace(-1);
        }
        Ok(Some(m))
    }

    pub(super) fn addition(&mut self) -> LessResult<Option<Node>> {
        let Some(mut m) = self.multiplication()? else {
            return Ok(None);
        };
        let mut is_spaced = self.input.is_whitespace(-1);
        loop {
            let op = match self.input.re_str(regex!(r"^[-+]\s+")) {
                Some(op) => op.trim().to_string(),
                None if !is_spaced && self.input.char('+') => "+".to_string(),
                None if !is_spaced && self.input.char('-') => "-".to_string(),
                None => break,
            };
            let Some(a) = self.multiplication()? else {
                break;
            };
            m = Node::Operation(Operation::new(&op, in_op(m), in_op(a), is_spaced));
            is_spaced = self.input.is_whitespace(-1);
        }
        Ok(Some(m))
    }

    /// Anything that can take part in an operation; `-@x`, `-$p` and
    /// `-(...)` negate.
    fn operand(&mut self) -> LessResult<Option<Node>> {
        let negate = self.input.peek_re(regex!(r"^-[@$(]")) && self.input.char('-');
        let o = alt!(
            self.sub()?,
            self.dimension(),
            self.color(),
            self.variable()?,
            self.property(),
            self.call()?,
            self.quoted(true)?,
            self.color_keyword(),
            self.mixin_lookup()?,
        );
        Ok(match o {
            Some(o) if negate => Some(Node::Negative(Box::new(in_op(o)))),
            other => other,
        })
    }

    /// Guards: conditions joined by `,` (meaning `or`).
    pub(super) fn conditions(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let Some(mut result) = self.condition(true)? else {
            return Ok(None);
        };
        while self.input.peek_re(regex!(r"^,\s*(not\s*)?\(")) && self.input.char(',') {
            let Some(b) = self.condition(true)? else {
                break;
            };
            result = self.logical("or", result, b, index);
        }
        Ok(Some(result))
    }

    /// `a or b`. With `needs_parens`, bare comparisons are not accepted.
    pub(super) fn condition(&mut self, needs_parens: bool) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let Some(result) = self.condition_and(needs_parens)? else {
            return Ok(None);
        };
        if self.input.str("or") {
            return Ok(self
                .condition(needs_parens)?
                .map(|next| self.logical("or", result, next, index)));
        }
        Ok(Some(result))
    }

    fn condition_and(&mut self, needs_parens: bool) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let mut result = alt!(
            self.negated_condition(needs_parens)?,
            self.parenthesis_condition(needs_parens)?,
        );
        if result.is_none() && !needs_parens {
            result = self.atomic_condition(needs_parens, None)?;
        }
        let Some(result) = result else {
            return Ok(None);
        };
        if self.input.str("and") {
            return Ok(self
                .condition_and(needs_parens)?
                .map(|next| self.logical("and", result, next, index)));
        }
        Ok(Some(result))
    }

    fn negated_condition(&mut self, needs_parens: bool) -> LessResult<Option<Node>> {
        if !self.input.str("not") {
            return Ok(None);
        }
        Ok(match self.parenthesis_condition(needs_parens)? {
            Some(Node::Condition(mut c)) => {
                c.negate = !c.negate;
                Some(Node::Condition(c))
            }
            other => other,
        })
    }

    fn parenthesis_condition(&mut self, needs_parens: bool) -> LessResult<Option<Node>> {
        self.input.save();
        if !self.input.str("(") {
            self.input.restore(None);
            return Ok(None);
        }

        self.input.save();
        if let Some(body) = self.condition(needs_parens)? {
            if self.input.char(')') {
                self.input.forget();
                self.input.forget();
                return Ok(Some(body));
            }
        }
        self.input.restore(None);

        let Some(body) = self.atomic_condition(needs_parens, None)? else {
            self.input.restore(None);
            return Ok(None);
        };
        if !self.input.char(')') {
            let got = self.input.current_char().map(String::from).unwrap_or_default();
            self.input.restore(Some(&format!("expected ')' got '{got}'")));
            return Ok(None);
        }
        self.input.forget();
        Ok(Some(body))
    }

    /// `a op b`, or a lone `a` meaning `a = true`. With `preparsed`, the
    /// left side is given and only `op b` is read.
    pub(super) fn atomic_condition(
        &mut self,
        _needs_parens: bool,
        preparsed: Option<Node>,
    ) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let has_preparsed = preparsed.is_some();
        let a = match preparsed {
            Some(a) => a,
            None => match self.condition_operand()? {
                Some(a) => a,
                None => return Ok(None),
            },
        };

        let op = if self.input.char('>') {
            Some(if self.input.char('=') { ">=" } else { ">" })
        } else if self.input.char('<') {
            Some(if self.input.char('=') { "<=" } else { "<" })
        } else if self.input.char('=') {
            Some(if self.input.char('>') {
                "=>"
            } else if self.input.char('<') {
                "=<"
            } else {
                "="
            })
        } else {
            None
        };

        match op {
            Some(op) => match self.condition_operand()? {
                Some(b) => Ok(Some(self.comparison(op, a, b, index))),
                None => Err(self.error("expected expression")),
            },
            None if !has_preparsed => Ok(Some(self.comparison("=", a, Node::keyword("true"), index))),
            None => Ok(None),
        }
    }

    fn condition_operand(&mut self) -> LessResult<Option<Node>> {
        Ok(alt!(
            self.addition()?,
            self.keyword(),
            self.quoted(false)?,
            self.mixin_lookup()?,
        ))
    }

    fn comparison(&self, op: &str, a: Node, b: Node, index: usize) -> Node {
        self.logical(op, a, b, index)
    }

    fn logical(&self, op: &str, a: Node, b: Node, index: usize) -> Node {
        Node::Condition(Condition {
            op: op.to_string(),
            lvalue: Box::new(a),
            rvalue: Box::new(b),
            negate: false,
            pos: self.pos(index),
        })
    }
}

/// Marks a parenthesized operand so evaluation knows it sits inside an operation.
fn in_op(node: Node) -> Node {
    match node {
        Node::Expression(mut e) => {
            e.parens_in_op = true;
            Node::Expression(e)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse_node, Parsed, Production};
    use crate::tree::Node;

    fn value(text: &str) -> Node {
        match parse_node(text, Production::Value, 0, None).unwrap() {
            Some(Parsed::Value { value, .. }) => value,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn single(text: &str) -> Node {
        match value(text) {
            Node::Value(mut v) => match v.value.remove(0) {
                Node::Expression(mut e) if e.value.len() == 1 => e.value.remove(0),
                other => other,
            },
            other => other,
        }
    }

    #[test]
    fn test_precedence() {
        let Node::Operation(op) = single("1 + 2 * 3") else { panic!() };
        assert_eq!(op.op, "+");
        assert!(matches!(op.right.as_ref(), Node::Operation(m) if m.op == "*"));
    }

    #[test]
    fn test_spaced_negative_starts_a_new_item() {
        let Node::Value(v) = value("1px -1px") else { panic!() };
        let Node::Expression(e) = &v.value[0] else { panic!() };
        assert_eq!(e.value.len(), 2);
        assert!(matches!(single("2px-1px"), Node::Operation(_)));
    }

    #[test]
    fn test_slash_between_keywords_is_literal() {
        let Node::Value(v) = value("small/20px serif") else { panic!() };
        let Node::Expression(e) = &v.value[0] else { panic!() };
        assert!(matches!(&e.value[1], Node::Anonymous(a) if a.value == "/"));
    }

    #[test]
    fn test_parens_mark_expression() {
        let Node::Operation(op) = single("(1 + 2) * 3") else { panic!() };
        assert!(matches!(op.left.as_ref(), Node::Expression(e) if e.parens && e.parens_in_op));
    }

    #[test]
    fn test_important_after_value() {
        match parse_node("red !important", Production::Value, 0, None).unwrap() {
            Some(Parsed::Value { important, .. }) => assert_eq!(important, "!important"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
