//! Selectors, elements, combinators, attribute selectors and `:extend()`.

use crate::diagnostics::LessResult;
use crate::parser::Parser;
use crate::tree::{
    Attribute, Combinator, Element, ElementValue, Extend, ExtendOption, Node, Selector,
};

impl Parser {
    /// `:extend(.a all, .b)` on a selector, or `&:extend(...)` as a rule.
    pub(super) fn extend(&mut self, is_rule: bool) -> LessResult<Option<Vec<Extend>>> {
        let index = self.input.i;
        if !self.input.str(if is_rule { "&:extend(" } else { ":extend(" }) {
            return Ok(None);
        }
        let mut extends = Vec::new();
        loop {
            let mut elements = Vec::new();
            let mut option = ExtendOption::Exact;
            loop {
                if self.extend_all_option() {
                    option = ExtendOption::All;
                    break;
                }
                match self.element()? {
                    Some(e) => elements.push(e),
                    None => break,
                }
            }
            if elements.is_empty() {
                return Err(self.error("Missing target selector for :extend()."));
            }
            let pos = self.pos(index);
            extends.push(Extend::new(Selector::new(elements, pos.clone()), option, pos));
            if !self.input.char(',') {
                break;
            }
        }
        self.expect_char(')')?;
        if is_rule {
            self.expect_char(';')?;
        }
        Ok(Some(extends))
    }

    /// `all` directly followed by `)` or `,`.
    fn extend_all_option(&mut self) -> bool {
        if !self.input.peek("all") {
            return false;
        }
        let after = self.input.input()[self.input.i + 3..].trim_start();
        if after.starts_with(')') || after.starts_with(',') {
            return self.input.str("all");
        }
        false
    }

    pub(super) fn element(&mut self) -> LessResult<Option<Element>> {
        let index = self.input.i;
        let combinator = self.combinator();

        let mut value = self
            .input
            .re_str(regex!(r"^(?:\d+\.\d+|\d+)%"))
            .or_else(|| {
                self.input.re_str(regex!(
                    r"^(?:[.#]?|:*)(?:[\w-]|[^\x00-\x9f]|\\(?:[A-Fa-f0-9]{1,6} ?|[^A-Fa-f0-9]))+"
                ))
            })
            .map(ElementValue::Text);

        if value.is_none() {
            for c in ['*', '&'] {
                if self.input.char(c) {
                    value = Some(ElementValue::Text(c.to_string()));
                    break;
                }
            }
        }
        if value.is_none() {
            value = self.attribute()?.map(ElementValue::Attribute);
        }
        if value.is_none() {
            value = self
                .input
                .re_str(regex!(r"^\([^&()@]+\)"))
                .map(ElementValue::Text);
        }
        if value.is_none() {
            // `.`, `#` or `:` glued to a following `@{var}`.
            if let Some(c) = self.input.current_char() {
                if matches!(c, '.' | '#' | ':') && self.input.char_at(1) == Some('@') {
                    self.input.char(c);
                    value = Some(ElementValue::Text(c.to_string()));
                }
            }
        }
        if value.is_none() {
            value = match self.variable_curly() {
                Some(Node::Variable(v)) => Some(ElementValue::Variable(v.name)),
                _ => None,
            };
        }
        if value.is_none() {
            self.input.save();
            if self.input.char('(') {
                match self.selector(false)? {
                    Some(first) => {
                        let mut selectors = vec![first];
                        while self.input.char(',') {
                            match self.selector(false)? {
                                Some(s) => selectors.push(s),
                                None => break,
                            }
                        }
                        if self.input.char(')') {
                            self.input.forget();
                            value = Some(ElementValue::Paren(selectors));
                        } else {
                            self.input.restore(Some("Missing closing ')'"));
                        }
                    }
                    None => self.input.restore(Some("Missing closing ')'")),
                }
            } else {
                self.input.forget();
            }
        }

        Ok(value.map(|v| Element::new(combinator, v, self.pos(index))))
    }

    /// The combinator in front of an element. Descendant when whitespace precedes.
    pub(super) fn combinator(&mut self) -> Combinator {
        let c = self.input.current_char();
        if c == Some('/') {
            if let Some(slashed) = self.input.re_str(regex!(r"(?i)^/[a-z]+/")) {
                return Combinator::new(&slashed);
            }
        }
        match c {
            Some(op @ ('>' | '+' | '~' | '|' | '^')) => {
                self.input.advance(1);
                let mut value = op.to_string();
                if op == '^' && self.input.current_char() == Some('^') {
                    value.push('^');
                    self.input.advance(1);
                }
                while self.input.is_whitespace(0) {
                    self.input.advance(1);
                }
                Combinator::new(&value)
            }
            _ if self.input.is_whitespace(-1) => Combinator::descendant(),
            _ => Combinator::empty(),
        }
    }

    /// One comma-free selector. `is_less` allows `:extend()` and `when` guards.
    pub(super) fn selector(&mut self, is_less: bool) -> LessResult<Option<Selector>> {
        let index = self.input.i;
        let mut elements: Vec<Element> = Vec::new();
        let mut all_extends: Vec<Extend> = Vec::new();
        let mut condition: Option<Node> = None;

        loop {
            if is_less {
                if let Some(extends) = self.extend(false)? {
                    if condition.is_some() {
                        return Err(self.error("CSS guard can only be used at the end of selector"));
                    }
                    all_extends.extend(extends);
                    continue;
                }
                if self.input.str("when") {
                    match self.conditions()? {
                        Some(cond) => condition = Some(cond),
                        None => return Err(self.error("expected condition")),
                    }
                    continue;
                }
            }
            let Some(e) = self.element()? else {
                break;
            };
            if condition.is_some() {
                return Err(self.error("CSS guard can only be used at the end of selector"));
            }
            if !all_extends.is_empty() {
                return Err(self.error("Extend can only be used at the end of selector"));
            }
            let c = self.input.current_char();
            elements.push(e);
            if matches!(c, Some('{' | '}' | ';' | ',' | ')')) {
                break;
            }
        }

        if !elements.is_empty() {
            let mut selector = Selector::new(elements, self.pos(index)).with_condition(condition);
            selector.extend_list = all_extends;
            return Ok(Some(selector));
        }
        if !all_extends.is_empty() {
            return Err(self.error(
                "Extend must be used to extend a selector, it cannot be used on its own",
            ));
        }
        Ok(None)
    }

    pub(super) fn selectors(&mut self) -> LessResult<Option<Vec<Selector>>> {
        let mut selectors: Vec<Selector> = Vec::new();
        while let Some(s) = self.selector(true)? {
            let guarded = s.condition.is_some();
            selectors.push(s);
            self.clear_comments();
            if guarded && selectors.len() > 1 {
                return Err(self.error("Guards are only currently allowed on a single selector."));
            }
            if !self.input.char(',') {
                break;
            }
            if guarded {
                return Err(self.error("Guards are only currently allowed on a single selector."));
            }
            self.clear_comments();
        }
        Ok((!selectors.is_empty()).then_some(selectors))
    }

    /// `[key]`, `[key=value]`, `[key="v" i]`, with `@{var}` allowed in key and value.
    pub(super) fn attribute(&mut self) -> LessResult<Option<Attribute>> {
        if !self.input.char('[') {
            return Ok(None);
        }
        let key = match self.variable_curly() {
            Some(var) => var,
            None => match self
                .input
                .re_str(regex!(r"^(?:[_A-Za-z0-9\-*]*\|)?(?:[_A-Za-z0-9-]|\\.)+"))
            {
                Some(text) => Node::keyword(&text),
                None => return Err(self.error("unexpected token")),
            },
        };

        let mut value = None;
        let mut cif = None;
        let op = self.input.re_str(regex!(r"^[|~*$^]?="));
        if op.is_some() {
            value = match self.quoted(false)? {
                Some(q) => Some(q),
                None => self
                    .input
                    .re_str(regex!(r"^[0-9]+%"))
                    .or_else(|| self.input.re_str(regex!(r"^[\w-]+")))
                    .map(|text| Node::keyword(&text))
                    .or_else(|| self.variable_curly()),
            };
            if value.is_some() {
                cif = self.input.re_str(regex!(r"^[iIsS]"));
            }
        }
        self.expect_char(']')?;
        Ok(Some(Attribute {
            key: Box::new(key),
            op,
            value: value.map(Box::new),
            cif,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse_node, Parsed, Production};
    use crate::tree::{ElementValue, ExtendOption, Selector};

    fn selectors(text: &str) -> Vec<Selector> {
        match parse_node(text, Production::Selectors, 0, None).unwrap() {
            Some(Parsed::Selectors(s)) => s,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_combinators() {
        let s = &selectors("ul > li + a ~ b c")[0];
        let combs: Vec<&str> = s.elements.iter().map(|e| e.combinator.value.as_str()).collect();
        assert_eq!(combs, vec!["", ">", "+", "~", " "]);
    }

    #[test]
    fn test_compound_and_pseudo_elements() {
        let s = &selectors("a.b#c:hover::before")[0];
        let texts: Vec<&str> = s
            .elements
            .iter()
            .filter_map(|e| e.value.as_text())
            .collect();
        assert_eq!(texts, vec!["a", ".b", "#c", ":hover", "::before"]);
    }

    #[test]
    fn test_attribute_and_interpolation() {
        let s = &selectors(".@{name}-x[data-a^=\"v\" i]")[0];
        assert!(matches!(s.elements[1].value, ElementValue::Variable(ref n) if n == "@name"));
        match &s.elements.last().unwrap().value {
            ElementValue::Attribute(attr) => {
                assert_eq!(attr.op.as_deref(), Some("^="));
                assert_eq!(attr.cif.as_deref(), Some("i"));
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn test_extend_on_selector() {
        let s = &selectors(".a:extend(.b all, .c)")[0];
        assert_eq!(s.extend_list.len(), 2);
        assert_eq!(s.extend_list[0].option, ExtendOption::All);
        assert_eq!(s.extend_list[1].option, ExtendOption::Exact);
    }

    #[test]
    fn test_guard_rules() {
        let s = &selectors(".a when (@x = 1)")[0];
        assert!(s.condition.is_some());
        let err = parse_node(".a when (@x), .b", Production::Selectors, 0, None).unwrap_err();
        assert_eq!(err.message(), "Guards are only currently allowed on a single selector.");
    }
}
