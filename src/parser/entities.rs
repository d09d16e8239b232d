//! Value atoms: the tokens an expression is built from.

use crate::diagnostics::LessResult;
use crate::parser::mixins::Lookups;
use crate::parser::Parser;
use crate::tree::{
    Anonymous, Assignment, Call, Color, Declaration, Dimension, JavaScript, Node, Property,
    Quoted, Url, Variable,
};

impl Parser {
    /// `"..."`, `'...'`, or escaped `~"..."`. With `force_escaped` only the
    /// escaped form is accepted.
    pub(super) fn quoted(&mut self, force_escaped: bool) -> LessResult<Option<Node>> {
        let index = self.input.i;
        self.input.save();
        let escaped = self.input.char('~');
        if !escaped && force_escaped {
            self.input.restore(None);
            return Ok(None);
        }
        let Some(text) = self.input.quoted() else {
            self.input.restore(None);
            return Ok(None);
        };
        self.input.forget();
        let quote = text.chars().next().unwrap_or('"');
        let inner = &text[1..text.len() - 1];
        Ok(Some(Node::Quoted(
            Quoted::new(quote, inner, escaped).at(self.pos(index)),
        )))
    }

    /// A bare word such as `black` or `border-collapse`; named colors become colors.
    pub(super) fn keyword(&mut self) -> Option<Node> {
        let word = if self.input.char('%') {
            "%".to_string()
        } else {
            self.input.re_str(regex!(
                r"^\[?(?:[\w-]|\\(?:[A-Fa-f0-9]{1,6} ?|[^A-Fa-f0-9]))+\]?"
            ))?
        };
        Some(match Color::from_keyword(&word) {
            Some(color) => Node::Color(color),
            None => Node::keyword(&word),
        })
    }

    /// `name(args)`. `alpha(opacity=..)`, `boolean(cond)` and `if(cond, ..)`
    /// get special argument parsing.
    pub(super) fn call(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if self.input.peek_re(regex!(r"(?i)^url\(")) {
            return Ok(None);
        }
        self.input.save();
        let Some(caps) = self.input.re(regex!(r"^([\w-]+|%|~|progid:[\w.]+)\(")) else {
            self.input.forget();
            return Ok(None);
        };
        let name = caps.get(1).unwrap_or_default().to_string();

        let mut prev_args = None;
        match name.to_ascii_lowercase().as_str() {
            "alpha" => {
                if let Some(alpha) = self.ie_alpha()? {
                    self.input.forget();
                    return Ok(Some(alpha));
                }
            }
            "boolean" | "if" => {
                let Some(condition) = self.condition(false)? else {
                    return Err(self.error("expected condition"));
                };
                prev_args = Some(vec![condition]);
            }
            _ => {}
        }

        let args = self.arguments(prev_args)?;
        if !self.input.char(')') {
            self.input.restore(Some("Could not parse call arguments or missing ')'"));
            return Ok(None);
        }
        self.input.forget();
        Ok(Some(Node::Call(Call {
            name,
            args,
            pos: self.pos(index),
        })))
    }

    /// `name(property: value)` inside media features.
    pub(super) fn declaration_call(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        self.input.save();
        let Some(opening) = self.input.re_str(regex!(r"^\w+\(")) else {
            self.input.forget();
            return Ok(None);
        };
        let name = opening.trim_end().trim_end_matches('(').to_string();
        let mut args = Vec::new();
        if let Some(prop) = self.rule_property()? {
            if let Some(value) = self.value()? {
                let name = Self::decl_name(prop.parts);
                let mut decl = Declaration::new("", value, self.here());
                decl.variable = false;
                decl.name = name;
                decl.inline = true;
                args.push(Node::Declaration(decl));
            }
        }
        if !self.input.char(')') {
            self.input.restore(Some("Could not parse call arguments or missing ')'"));
            return Ok(None);
        }
        self.input.forget();
        Ok(Some(Node::Call(Call {
            name,
            args,
            pos: self.pos(index),
        })))
    }

    /// Call arguments, comma separated, or semicolon separated when any `;`
    /// appears (each group then becomes one comma list).
    pub(super) fn arguments(&mut self, prev: Option<Vec<Node>>) -> LessResult<Vec<Node>> {
        let mut skip_first = prev.is_some();
        let mut args_comma = prev.unwrap_or_default();
        let mut args_semicolon = Vec::new();
        let mut semicolon_separated = false;
        self.input.save();
        loop {
            if skip_first {
                skip_first = false;
            } else {
                let value = alt!(
                    self.detached_ruleset()?,
                    self.assignment()?,
                    self.expression()?,
                );
                let Some(value) = value else {
                    break;
                };
                args_comma.push(unwrap_single(value));
            }
            if self.input.char(',') {
                continue;
            }
            if self.input.char(';') || semicolon_separated {
                semicolon_separated = true;
                if !args_comma.is_empty() {
                    let group = std::mem::take(&mut args_comma);
                    args_semicolon.push(Node::Value(crate::tree::Value::new(group)));
                }
            }
        }
        self.input.forget();
        Ok(if semicolon_separated {
            args_semicolon
        } else {
            args_comma
        })
    }

    pub(super) fn literal(&mut self) -> LessResult<Option<Node>> {
        Ok(alt!(
            self.dimension(),
            self.color(),
            self.quoted(false)?,
            self.unicode_descriptor(),
        ))
    }

    /// `key=value` inside legacy IE filter calls.
    pub(super) fn assignment(&mut self) -> LessResult<Option<Node>> {
        let Some(caps) = regex!(r"(?i)^(\w+)\s?=").captures(self.input.rest()) else {
            return Ok(None);
        };
        let key = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        self.input.save();
        self.input.re_str(regex!(r"^\w+"));
        if !self.input.char('=') {
            self.input.restore(None);
            return Ok(None);
        }
        match self.entity()? {
            Some(value) => {
                self.input.forget();
                Ok(Some(Node::Assignment(Assignment {
                    key,
                    value: Box::new(value),
                })))
            }
            None => {
                self.input.restore(None);
                Ok(None)
            }
        }
    }

    /// `url(...)`, whose unquoted contents are kept verbatim.
    pub(super) fn url(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        self.input.auto_comment_absorb = false;
        if !self.input.str("url(") {
            self.input.auto_comment_absorb = true;
            return Ok(None);
        }
        let value = alt!(self.quoted(false)?, self.variable()?, self.property());
        let value = match value {
            Some(node) => node,
            None => {
                let raw = self
                    .input
                    .re_str(regex!(r#"^(?:(?:\\[()'"])|[^()'"])+"#))
                    .unwrap_or_default();
                Node::Anonymous(Anonymous::new(raw.trim_end()).at(self.pos(index)))
            }
        };
        self.input.auto_comment_absorb = true;
        self.expect_char(')')?;
        Ok(Some(Node::Url(Url {
            value: Box::new(value),
            pos: self.pos(index),
            is_evald: false,
        })))
    }

    /// `@name` or `@@name`; followed by `(` or `[` it may be a detached ruleset call.
    pub(super) fn variable(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if self.input.current_char() != Some('@') {
            return Ok(None);
        }
        self.input.save();
        let Some(name) = self.input.re_str(regex!(r"^@@?[\w-]+")) else {
            self.input.restore(None);
            return Ok(None);
        };
        let ch = self.input.current_char();
        let after_space = self.input.prev_char().is_some_and(char::is_whitespace);
        if ch == Some('(') || (ch == Some('[') && !after_space) {
            if let Some(call) = self.variable_call(Some(name.clone()))? {
                self.input.forget();
                return Ok(Some(call));
            }
        }
        self.input.forget();
        Ok(Some(Node::Variable(Variable::new(name, self.pos(index)))))
    }

    /// `@{name}`
    pub(super) fn variable_curly(&mut self) -> Option<Node> {
        let index = self.input.i;
        if self.input.current_char() != Some('@') {
            return None;
        }
        let caps = self.input.re(regex!(r"^@\{([\w-]+)\}"))?;
        Some(Node::Variable(Variable::new(
            format!("@{}", caps.get(1).unwrap_or_default()),
            self.pos(index),
        )))
    }

    /// `$name`
    pub(super) fn property(&mut self) -> Option<Node> {
        let index = self.input.i;
        if self.input.current_char() != Some('$') {
            return None;
        }
        let name = self.input.re_str(regex!(r"^\$[\w-]+"))?;
        Some(Node::Property(Property {
            name,
            pos: self.pos(index),
        }))
    }

    /// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`, not followed by more name characters.
    pub(super) fn color(&mut self) -> Option<Node> {
        if self.input.current_char() != Some('#') {
            return None;
        }
        self.input.save();
        if let Some(caps) = self.input.re(regex!(
            r"^#([A-Fa-f0-9]{8}|[A-Fa-f0-9]{6}|[A-Fa-f0-9]{3,4})([\w.#\[])?"
        )) {
            if caps.get(2).is_none() {
                if let Some(color) = Color::from_hex(caps.get(1).unwrap_or_default()) {
                    self.input.forget();
                    return Some(Node::Color(color.with_value(caps.full())));
                }
            }
        }
        self.input.restore(None);
        None
    }

    /// A named color, only when the whole word is one.
    pub(super) fn color_keyword(&mut self) -> Option<Node> {
        self.input.save();
        let absorb = self.input.auto_comment_absorb;
        self.input.auto_comment_absorb = false;
        let word = self.input.re_str(regex!(r"^[_A-Za-z-][_A-Za-z0-9-]+"));
        self.input.auto_comment_absorb = absorb;
        let Some(word) = word else {
            self.input.forget();
            return None;
        };
        self.input.restore(None);
        let color = Color::from_keyword(&word)?;
        self.input.str(&word);
        Some(Node::Color(color))
    }

    /// `0.5em`, `95%`, `10`
    pub(super) fn dimension(&mut self) -> Option<Node> {
        if self.input.peek_not_numeric() {
            return None;
        }
        let caps = self.input.re(regex!(r"(?i)^([+-]?\d*\.?\d+)(%|[a-z_]+)?"))?;
        let value: f64 = caps.get(1).unwrap_or("0").parse().unwrap_or(0.0);
        Some(Node::Dimension(Dimension::with_unit(
            value,
            caps.get(2).unwrap_or(""),
        )))
    }

    /// `U+0??` or `U+00A1-00A9`
    pub(super) fn unicode_descriptor(&mut self) -> Option<Node> {
        let text = self
            .input
            .re_str(regex!(r"^U\+[0-9a-fA-F?]+(-[0-9a-fA-F?]+)?"))?;
        Some(Node::UnicodeDescriptor(text))
    }

    /// `` `expr` `` or `` ~`expr` ``
    pub(super) fn javascript(&mut self) -> Option<Node> {
        let index = self.input.i;
        self.input.save();
        let escaped = self.input.char('~');
        if !self.input.char('`') {
            self.input.restore(None);
            return None;
        }
        match self.input.re_str(regex!(r"^[^`]*`")) {
            Some(js) => {
                self.input.forget();
                Some(Node::JavaScript(JavaScript {
                    expression: js[..js.len() - 1].to_string(),
                    escaped,
                    pos: self.pos(index),
                }))
            }
            None => {
                self.input.restore(Some("invalid javascript definition"));
                None
            }
        }
    }

    pub(super) fn entity(&mut self) -> LessResult<Option<Node>> {
        Ok(alt!(
            self.comment(),
            self.literal()?,
            self.variable()?,
            self.url()?,
            self.property(),
            self.call()?,
            self.keyword(),
            self.mixin_call(true, Lookups::Optional)?,
            self.javascript(),
        ))
    }

    pub(super) fn mixin_lookup(&mut self) -> LessResult<Option<Node>> {
        self.mixin_call(true, Lookups::Required)
    }

    /// The inside of `alpha(opacity=NN)`, after the opening paren.
    fn ie_alpha(&mut self) -> LessResult<Option<Node>> {
        if self.input.re(regex!(r"(?i)^opacity=")).is_none() {
            return Ok(None);
        }
        let value = match self.input.re_str(regex!(r"^\d+")) {
            Some(digits) => digits,
            None => match self.variable()? {
                Some(Node::Variable(var)) => format!("@{{{}}}", &var.name[1..]),
                _ => return Err(self.error("Could not parse alpha")),
            },
        };
        self.expect_char(')')?;
        Ok(Some(Node::Quoted(Quoted::new(
            '"',
            format!("alpha(opacity={value})"),
            true,
        ))))
    }
}

/// A one-item expression stands for its item.
pub(super) fn unwrap_single(node: Node) -> Node {
    match node {
        Node::Expression(mut e) if e.value.len() == 1 => e.value.remove(0),
        other => other,
    }
}
