//! Rule-level productions: rulesets, declarations, imports and at-rules.

use std::rc::Rc;

use crate::diagnostics::LessResult;
use crate::parser::input::RawPart;
use crate::parser::Parser;
use crate::tree::{
    Anonymous, AtRule, DeclName, Declaration, DetachedRuleset, Expression, Import, ImportOptions,
    Media, Merge, MixinDefinition, Node, Property, Quoted, Ruleset, Selector, Value, Variable,
};
use crate::err_at;

/// A property name split into literal and interpolated parts.
pub(super) struct RuleProperty {
    pub parts: Vec<Node>,
    pub merge: Option<Merge>,
}

impl Parser {
    /// `selectors { ... }`
    pub(super) fn ruleset(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        self.input.save();
        let debug_info = self.debug_info(index);
        if let Some(selectors) = self.selectors()? {
            if let Some(rules) = self.block()? {
                self.input.forget();
                let mut ruleset = Ruleset::new(Some(selectors), rules);
                ruleset.pos = self.pos(index);
                ruleset.debug_info = debug_info;
                return Ok(Some(Node::Ruleset(Box::new(ruleset))));
            }
        }
        self.input.restore(None);
        Ok(None)
    }

    /// `name: value;`, `@var: value;`, `@dr: { ... }`, `--custom: anything;`
    pub(super) fn declaration(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if matches!(self.input.current_char(), Some('.' | '#' | '&' | ':')) {
            return Ok(None);
        }
        self.input.save();

        let variable_name = self.variable_name();
        let property = match variable_name {
            Some(_) => None,
            None => match self.rule_property()? {
                Some(p) => Some(p),
                None => {
                    self.input.restore(None);
                    return Ok(None);
                }
            },
        };

        let mut value = None;
        let mut has_detached = false;
        if variable_name.is_some() {
            value = self.detached_ruleset()?;
            has_detached = value.is_some();
        }
        self.clear_comments();

        let mut important = None;
        let make = |parser: &Self, value: Node| {
            let pos = parser.pos(index);
            match (&variable_name, &property) {
                (Some(name), _) => Declaration::new(name.as_str(), value, pos),
                (None, Some(prop)) => {
                    let mut decl = Declaration::new("", value, pos);
                    decl.name = Self::decl_name(prop.parts.clone());
                    decl.variable = false;
                    decl.merge = prop.merge;
                    decl
                }
                (None, None) => Declaration::new("", value, pos),
            }
        };

        if value.is_none() {
            let is_custom = property.as_ref().is_some_and(|p| {
                matches!(p.parts.first(), Some(Node::Keyword(k)) if k.value.starts_with("--"))
            });
            let fast = if is_custom {
                if self.input.peek_char(';') {
                    Some(Node::Anonymous(Anonymous::new("").at(self.pos(self.input.i))))
                } else {
                    self.permissive_value(&|c| c == ';' || c == '}')?
                }
            } else {
                self.anonymous_value()
            };
            if let Some(fast) = fast {
                self.input.forget();
                let (fast, important) = split_important(fast);
                let decl = make(self, fast).with_important(important.as_deref());
                return Ok(Some(Node::Declaration(decl)));
            }

            value = self.value()?;
            if value.is_some() {
                important = self.important();
            } else if variable_name.is_some() {
                value = self.permissive_value(&|c| c == ';')?;
            }
        }

        match value {
            Some(value) if has_detached || self.end() => {
                self.input.forget();
                let decl = make(self, value).with_important(important.as_deref());
                Ok(Some(Node::Declaration(decl)))
            }
            _ => {
                self.input.restore(None);
                Ok(None)
            }
        }
    }

    /// `@name:` at the start of a variable declaration.
    fn variable_name(&mut self) -> Option<String> {
        if self.input.current_char() != Some('@') {
            return None;
        }
        let caps = self.input.re(regex!(r"^(@[\w-]+)\s*:"))?;
        caps.get(1).map(str::to_string)
    }

    /// A property name: plain, `*`-hacked, or with `@{var}`/`${prop}`
    /// interpolation, optionally followed by a `+`/`+_` merge marker.
    pub(super) fn rule_property(&mut self) -> LessResult<Option<RuleProperty>> {
        self.input.save();
        if let Some(caps) = self.input.re(regex!(r"^([_a-zA-Z0-9-]+)\s*:")) {
            self.input.forget();
            return Ok(Some(RuleProperty {
                parts: vec![Node::keyword(caps.get(1).unwrap_or_default())],
                merge: None,
            }));
        }

        let mut parts: Vec<(usize, String)> = Vec::new();
        let star_index = self.input.i;
        if let Some(star) = self.input.re_str(regex!(r"^\*?")) {
            parts.push((star_index, star));
        }
        loop {
            let index = self.input.i;
            match self
                .input
                .re(regex!(r"^((?:[\w-]+)|(?:[@$]\{[\w-]+\}))"))
            {
                Some(caps) => parts.push((index, caps.get(1).unwrap_or_default().to_string())),
                None => break,
            }
        }
        let marker = if parts.len() > 1 {
            self.input
                .re(regex!(r"^((?:\+_|\+)?)\s*:"))
                .map(|caps| caps.get(1).unwrap_or_default().to_string())
        } else {
            None
        };
        let Some(marker) = marker else {
            self.input.restore(None);
            return Ok(None);
        };
        self.input.forget();

        if parts.first().is_some_and(|(_, s)| s.is_empty()) {
            parts.remove(0);
        }
        let parts = parts
            .into_iter()
            .map(|(index, s)| {
                if let Some(name) = s.strip_prefix("@{") {
                    Node::Variable(Variable::new(
                        format!("@{}", name.trim_end_matches('}')),
                        self.pos(index),
                    ))
                } else if let Some(name) = s.strip_prefix("${") {
                    Node::Property(Property {
                        name: format!("${}", name.trim_end_matches('}')),
                        pos: self.pos(index),
                    })
                } else {
                    Node::keyword(&s)
                }
            })
            .collect();
        let merge = match marker.as_str() {
            "+" => Some(Merge::Comma),
            "+_" => Some(Merge::Space),
            _ => None,
        };
        Ok(Some(RuleProperty { parts, merge }))
    }

    /// Literal parts join into a plain name; anything interpolated waits for eval.
    pub(super) fn decl_name(parts: Vec<Node>) -> DeclName {
        let mut plain = String::new();
        for part in &parts {
            match part {
                Node::Keyword(k) => plain.push_str(&k.value),
                _ => return DeclName::Interpolated(parts),
            }
        }
        DeclName::Plain(plain)
    }

    /// Values free of anything that needs evaluation, kept as raw text
    /// and re-parsed only when a lookup needs their structure.
    fn anonymous_value(&mut self) -> Option<Node> {
        let index = self.input.i;
        let caps = self.input.re(regex!(r#"^([^.#@$+/'"*`(;{}-]*);"#))?;
        let text = caps.get(1).unwrap_or_default().trim_end().to_string();
        Some(Node::Anonymous(Anonymous::new(text).at(self.pos(index))))
    }

    /// Almost anything up to an outer-level `until` char: used for custom
    /// properties, unknown at-rule preludes and unparsable variable values.
    pub(super) fn permissive_value(&mut self, until: &dyn Fn(char) -> bool) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let at_stop = |parser: &Self| parser.input.current_char().is_some_and(until);
        if at_stop(self) {
            return Ok(None);
        }

        let mut result = Vec::new();
        let mut value = Vec::new();
        loop {
            if let Some(comment) = self.comment() {
                value.push(comment);
                continue;
            }
            let e = self.entity()?;
            let matched = e.is_some();
            if let Some(e) = e {
                value.push(e);
            }
            if self.input.peek(",") {
                value.push(Node::Anonymous(Anonymous::new(",").at(self.here())));
                self.input.char(',');
            }
            if !matched {
                break;
            }
        }

        let done = at_stop(self);
        if !value.is_empty() {
            let expr = Node::Expression(Expression::new(value));
            if done {
                return Ok(Some(expr));
            }
            result.push(expr);
            if self.input.prev_char() == Some(' ') {
                result.push(Node::Anonymous(Anonymous::new(" ").at(self.pos(index))));
            }
        }

        self.input.save();
        let parts = match self.input.parse_until(until) {
            Err(expected) => {
                return Err(err_at!(Parse, &self.here(), "Expected '{}'", expected));
            }
            Ok(None) => {
                self.input.restore(None);
                return Ok(None);
            }
            Ok(Some(parts)) => parts,
        };
        if parts.len() == 1 && parts[0] == RawPart::Text(" ".into()) {
            self.input.forget();
            return Ok(Some(Node::Anonymous(Anonymous::new("").at(self.pos(index)))));
        }
        let last = parts.len().saturating_sub(1);
        for (i, part) in parts.into_iter().enumerate() {
            let quoted = match part {
                RawPart::Quoted(quote, text) => Quoted::new(quote, text, true),
                RawPart::Text(text) => {
                    let text = if i == last { text.trim().to_string() } else { text };
                    let mut q = Quoted::new('\'', text, true);
                    q.bare_vars = true;
                    q
                }
            };
            result.push(Node::Quoted(quoted.at(self.pos(index))));
        }
        self.input.forget();
        Ok(Some(Node::Expression(Expression {
            value: result,
            no_spacing: true,
            ..Expression::default()
        })))
    }

    /// `@import (options) "path" media;`
    fn import(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if self.input.re(regex!(r"^@import\s+")).is_none() {
            return Ok(None);
        }
        let options = self.import_options()?;
        let path = match self.quoted(false)? {
            Some(p) => Some(p),
            None => self.url()?,
        };
        let Some(path) = path else {
            self.input.rewind(index);
            return Err(self.error("malformed import statement"));
        };
        let features = self.media_features(false)?;
        if !self.input.char(';') {
            self.input.rewind(index);
            return Err(self.error("missing semi-colon or unrecognised media features on import"));
        }
        let features = features.map(|f| Node::Value(Value::new(f)));
        Ok(Some(Node::Import(Import::new(
            path,
            features,
            options,
            self.pos(index),
        ))))
    }

    fn import_options(&mut self) -> LessResult<ImportOptions> {
        let mut options = ImportOptions::default();
        if !self.input.char('(') {
            return Ok(options);
        }
        while let Some(option) = self
            .input
            .re_str(regex!(r"^(less|css|multiple|once|inline|reference|optional)"))
        {
            match option.as_str() {
                "less" => options.less = Some(true),
                "css" => options.less = Some(false),
                "multiple" => options.multiple = true,
                "once" => {
                    options.once = true;
                    options.multiple = false;
                }
                "inline" => options.inline = true,
                "reference" => options.reference = true,
                _ => options.optional = true,
            }
            if !self.input.char(',') {
                break;
            }
        }
        self.expect_char(')')?;
        Ok(options)
    }

    /// `name:` inside a media feature.
    fn media_property(&mut self) -> Option<String> {
        let caps = self.input.re(regex!(r"^(\*?-?[_a-zA-Z0-9-]+)\s*:"))?;
        caps.get(1).map(str::to_string)
    }

    /// One comma-free media query: keywords, variables and `( ... )` tests.
    fn media_feature(&mut self, query_in_parens: bool) -> LessResult<Option<Node>> {
        let mut nodes = Vec::new();
        self.input.save();
        loop {
            let e = alt!(
                self.declaration_call()?,
                self.keyword(),
                self.variable()?,
                self.mixin_lookup()?,
            );
            if let Some(e) = e {
                nodes.push(e);
                continue;
            }
            if !self.input.char('(') {
                break;
            }
            let property = self.media_property();
            let mut value = None;
            let mut range = None;
            if property.is_none()
                && query_in_parens
                && self.input.peek_re(regex!(r"^[0-9a-z-]*\s*([<>]=|<=|>=|[<>]|=)"))
            {
                range = self.range_query()?;
            } else {
                value = self.value()?;
            }
            if !self.input.char(')') {
                return Err(err_at!(Parse, &self.here(), "Missing closing ')'"));
            }
            let node = match (property, value, range) {
                (_, _, Some(range)) => range,
                (Some(name), Some(value), None) => {
                    let mut decl = Declaration::new(name, value, self.here());
                    decl.inline = true;
                    Node::Declaration(decl)
                }
                (None, Some(value), None) => value,
                _ => return Err(self.error("badly formed media feature definition")),
            };
            nodes.push(Node::Paren(Box::new(node)));
        }
        self.input.forget();
        Ok((!nodes.is_empty()).then(|| Node::Expression(Expression::new(nodes))))
    }

    /// `(width < 600px)` or `(400px <= width < 800px)`, kept as a spaced expression.
    fn range_query(&mut self) -> LessResult<Option<Node>> {
        let Some(Node::Condition(first)) = self.condition(false)? else {
            return Ok(None);
        };
        let mut parts = vec![
            *first.lvalue,
            Node::anonymous(first.op.clone()),
            *first.rvalue.clone(),
        ];
        self.input.save();
        match self.atomic_condition(false, Some(*first.rvalue))? {
            Some(Node::Condition(second)) => {
                self.input.forget();
                parts.push(Node::anonymous(second.op));
                parts.push(*second.rvalue);
            }
            _ => self.input.restore(None),
        }
        Ok(Some(Node::Expression(Expression::new(parts))))
    }

    fn media_features(&mut self, query_in_parens: bool) -> LessResult<Option<Vec<Node>>> {
        let mut features = Vec::new();
        loop {
            let e = match self.media_feature(query_in_parens)? {
                Some(e) => Some(e),
                None => alt!(self.variable()?, self.mixin_lookup()?),
            };
            let Some(e) = e else {
                break;
            };
            features.push(e);
            if !self.input.char(',') {
                break;
            }
        }
        Ok((!features.is_empty()).then_some(features))
    }

    /// `@media`, `@container` and block-form `@layer`, all of which bubble.
    fn nestable_at_rule(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if !self.input.peek_char('@') {
            return Ok(None);
        }
        let debug_info = self.debug_info(index);
        self.input.save();

        for name in ["@media", "@container"] {
            if self.input.str(name) {
                let features = self.media_features(true)?.unwrap_or_default();
                let Some(rules) = self.block()? else {
                    return Err(self.error(
                        "nested at-rules require block statements after any features",
                    ));
                };
                self.input.forget();
                let mut media = Media::new(
                    name,
                    Node::Value(Value::new(features)),
                    rules,
                    self.pos(index),
                );
                media.debug_info = debug_info;
                return Ok(Some(Node::Media(media)));
            }
        }

        if self.input.re(regex!(r"^@layer\b")).is_some() {
            let layer_name = self.keyword();
            if let Some(rules) = self.block()? {
                self.input.forget();
                let features = layer_name.unwrap_or_else(|| Node::anonymous(""));
                let mut media = Media::new("@layer", features, rules, self.pos(index));
                media.debug_info = debug_info;
                return Ok(Some(Node::Media(media)));
            }
        }

        self.input.restore(None);
        Ok(None)
    }

    /// Any `@rule`, dispatching to imports and nestable rules first.
    pub(super) fn at_rule(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        if self.input.current_char() != Some('@') {
            return Ok(None);
        }
        if let Some(node) = self.import()? {
            return Ok(Some(node));
        }
        if self.input.peek_re(regex!(r"^@plugin\s")) {
            return Err(self.error("@plugin is not supported"));
        }
        if let Some(node) = self.nestable_at_rule()? {
            return Ok(Some(node));
        }

        self.input.save();
        let Some(name) = self.input.re_str(regex!(r"^@[a-z-]+")) else {
            self.input.forget();
            return Ok(None);
        };
        let base_name = match name[2..].find('-') {
            Some(dash) if name.as_bytes()[1] == b'-' => format!("@{}", &name[dash + 3..]),
            _ => name.clone(),
        };

        let mut has_block = true;
        let mut is_rooted = true;
        enum Prelude {
            Identifier,
            Expression,
            Unknown,
        }
        let prelude = match base_name.as_str() {
            "@charset" => {
                has_block = false;
                Prelude::Identifier
            }
            "@namespace" => {
                has_block = false;
                Prelude::Expression
            }
            "@keyframes" | "@counter-style" => Prelude::Identifier,
            "@document" | "@supports" => {
                is_rooted = false;
                Prelude::Unknown
            }
            _ => Prelude::Unknown,
        };
        self.clear_comments();

        let value = match prelude {
            Prelude::Identifier => match self.entity()? {
                Some(v) => Some(v),
                None => return Err(self.error(format!("expected {name} identifier"))),
            },
            Prelude::Expression => match self.expression()? {
                Some(v) => Some(v),
                None => return Err(self.error(format!("expected {name} expression"))),
            },
            Prelude::Unknown => {
                let value = self.permissive_value(&|c| c == '{' || c == ';')?;
                has_block = self.input.peek_char('{');
                match value {
                    None => {
                        if !has_block && !self.input.peek_char(';') {
                            return Err(self.error(format!(
                                "{name} rule is missing block or ending semi-colon"
                            )));
                        }
                        None
                    }
                    Some(Node::Anonymous(a)) if a.value.is_empty() => None,
                    Some(v) => Some(v),
                }
            }
        };

        let body = if has_block { self.block()? } else { None };
        if body.is_some() || (!has_block && value.is_some() && self.input.char(';')) {
            self.input.forget();
            let pos = self.pos(index);
            let rules = body.map(|rules| {
                let mut ruleset =
                    Ruleset::new(Some(vec![Selector::media_empty(pos.clone())]), rules);
                ruleset.allow_imports = true;
                ruleset.pos = pos.clone();
                vec![Node::Ruleset(Box::new(ruleset))]
            });
            return Ok(Some(Node::AtRule(AtRule {
                name,
                value: value.map(Box::new),
                rules,
                is_rooted,
                pos,
                visibility: Default::default(),
                debug_info: self.debug_info(index),
            })));
        }

        self.input.restore(Some("at-rule options not recognised"));
        Ok(None)
    }

    /// `{ ... }` as a value, or `#(@a) { ... }` for an anonymous mixin.
    pub(super) fn detached_ruleset(&mut self) -> LessResult<Option<Node>> {
        let index = self.input.i;
        self.input.save();
        let mut params = None;
        if self.input.re(regex!(r"^[.#]\(")).is_some() {
            let info = self.mixin_args(false)?;
            if !self.input.char(')') {
                self.input.restore(None);
                return Ok(None);
            }
            params = Some(info);
        }
        let Some(ruleset) = self.block_ruleset()? else {
            self.input.restore(None);
            return Ok(None);
        };
        self.input.forget();
        Ok(Some(match params {
            Some(info) => Node::MixinDefinition(Rc::new(MixinDefinition::new(
                "",
                info.args.into_iter().map(|a| a.into_param()).collect(),
                ruleset.rules,
                None,
                info.variadic,
                self.pos(index),
            ))),
            None => Node::DetachedRuleset(DetachedRuleset {
                ruleset: Box::new(ruleset),
                frames: None,
            }),
        }))
    }
}

/// Moves a trailing `!important` out of fast-path text.
fn split_important(value: Node) -> (Node, Option<String>) {
    if let Node::Anonymous(mut a) = value {
        if let Some(m) = regex!(r"\s*! *important$").find(&a.value) {
            let important = m.as_str().trim().to_string();
            a.value.truncate(m.start());
            return (Node::Anonymous(a), Some(important));
        }
        return (Node::Anonymous(a), None);
    }
    (value, None)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::parser::parse_stylesheet;
    use crate::tree::{DeclName, FileInfo, Merge, Node, Ruleset};

    fn parse(text: &str) -> Ruleset {
        let file = Rc::new(FileInfo::new("test.less", text));
        parse_stylesheet(&file, false, false).unwrap()
    }

    fn first_decl(rules: &[Node]) -> &crate::tree::Declaration {
        rules
            .iter()
            .find_map(|r| match r {
                Node::Declaration(d) => Some(d),
                _ => None,
            })
            .expect("declaration")
    }

    #[test]
    fn test_simple_values_take_the_fast_path() {
        let root = parse("@a: 10px solid;");
        let decl = first_decl(&root.rules);
        assert!(decl.variable);
        assert!(matches!(decl.value.as_ref(), Node::Anonymous(a) if a.value == "10px solid"));
    }

    #[test]
    fn test_important_is_split_from_fast_path() {
        let root = parse(".a { color: red !important; }");
        let Node::Ruleset(rs) = &root.rules[0] else { panic!() };
        let decl = first_decl(&rs.rules);
        assert_eq!(decl.important, " !important");
        assert!(matches!(decl.value.as_ref(), Node::Anonymous(a) if a.value == "red"));
    }

    #[test]
    fn test_interpolated_name_and_merge() {
        let root = parse(".a { @{p}-color+_: red; }");
        let Node::Ruleset(rs) = &root.rules[0] else { panic!() };
        let decl = first_decl(&rs.rules);
        assert_eq!(decl.merge, Some(Merge::Space));
        assert!(matches!(&decl.name, DeclName::Interpolated(parts) if parts.len() == 2));
    }

    #[test]
    fn test_custom_property_is_permissive() {
        let root = parse(".a { --x: { a: b }; }");
        let Node::Ruleset(rs) = &root.rules[0] else { panic!() };
        let decl = first_decl(&rs.rules);
        assert_eq!(decl.name_str(), "--x");
        assert!(matches!(decl.value.as_ref(), Node::Expression(e) if e.no_spacing));
    }

    #[test]
    fn test_media_and_at_rules() {
        let root = parse(
            "@charset \"utf-8\";\n@media screen and (min-width: 100px) { .a { b: c; } }\n@font-face { font-family: x; }\n@supports (display: grid) { .b { c: d; } }",
        );
        let kinds: Vec<&str> = root.rules.iter().map(Node::type_name).collect();
        assert_eq!(kinds, vec!["AtRule", "Media", "AtRule", "AtRule"]);
        let Node::AtRule(supports) = &root.rules[3] else { panic!() };
        assert!(!supports.is_rooted);
    }

    #[test]
    fn test_import_options() {
        let root = parse("@import (reference, optional) \"a.less\" screen;");
        let Node::Import(import) = &root.rules[0] else { panic!() };
        assert!(import.options.reference);
        assert!(import.options.optional);
        assert!(import.features.is_some());
    }

    #[test]
    fn test_detached_ruleset_and_call() {
        let root = parse("@dr: { color: red; };\n.a { @dr(); }");
        let decl = first_decl(&root.rules);
        assert!(matches!(decl.value.as_ref(), Node::DetachedRuleset(_)));
        let Node::Ruleset(rs) = &root.rules[1] else { panic!() };
        assert!(matches!(rs.rules[0], Node::VariableCall(_)));
    }

    #[test]
    fn test_missing_import_semicolon() {
        let file = Rc::new(FileInfo::new("t.less", "@import \"a.less\" screen {"));
        let err = parse_stylesheet(&file, false, false).unwrap_err();
        assert_eq!(err.message(), "missing semi-colon or unrecognised media features on import");
    }
}
