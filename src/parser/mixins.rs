//! Mixin calls, mixin definitions and value lookups.

use std::rc::Rc;

use crate::diagnostics::LessResult;
use crate::parser::Parser;
use crate::tree::{
    Combinator, Element, ElementValue, MixinArg, MixinCall, MixinDefinition, MixinParam,
    NamespaceValue, Node, Selector, Value, VariableCall, Visibility,
};

/// Whether a mixin call may, must, or must not carry `[lookups]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Lookups {
    Never,
    Optional,
    Required,
}

/// Parsed `( ... )` of a mixin call or definition.
pub(super) struct MixinArgs {
    pub args: Vec<ArgSlot>,
    pub variadic: bool,
}

/// One argument slot, shared by calls and definitions.
#[derive(Debug, Clone, Default)]
pub(super) struct ArgSlot {
    pub name: Option<String>,
    pub value: Option<Node>,
    pub expand: bool,
    pub variadic: bool,
}

impl Parser {
    /// `.m(args) !important;`, `#ns > .m();`, or in values `.m()[@result]`.
    pub(super) fn mixin_call(&mut self, in_value: bool, lookups_mode: Lookups) -> LessResult<Option<Node>> {
        let s = self.input.current_char();
        if s != Some('.') && s != Some('#') {
            return Ok(None);
        }
        let index = self.input.i;
        self.input.save();

        let Some(elements) = self.mixin_elements() else {
            self.input.restore(None);
            return Ok(None);
        };

        let mut args = Vec::new();
        let mut has_parens = false;
        if self.input.char('(') {
            args = self.mixin_args(true)?.args;
            self.expect_char(')')?;
            has_parens = true;
        }

        let lookups = if lookups_mode == Lookups::Never {
            None
        } else {
            self.rule_lookups()
        };
        if (lookups_mode == Lookups::Required && lookups.is_none())
            || (in_value && lookups.is_none() && !has_parens)
        {
            self.input.restore(None);
            return Ok(None);
        }

        let important = !in_value && self.important().is_some();

        if in_value || self.end() {
            self.input.forget();
            let pos = self.pos(index);
            let call = MixinCall {
                selector: Selector::new(elements, pos.clone()),
                arguments: args
                    .into_iter()
                    .filter_map(|slot| {
                        Some(MixinArg {
                            name: slot.name,
                            value: slot.value?,
                            expand: slot.expand,
                        })
                    })
                    .collect(),
                important: lookups.is_none() && important,
                pos: pos.clone(),
                visibility: Visibility::default(),
            };
            return Ok(Some(match lookups {
                Some(lookups) => Node::NamespaceValue(NamespaceValue {
                    value: Box::new(Node::MixinCall(call)),
                    lookups,
                    pos,
                }),
                None => Node::MixinCall(call),
            }));
        }

        self.input.restore(None);
        Ok(None)
    }

    /// `#ns > .m` name segments; `>` between them is optional.
    fn mixin_elements(&mut self) -> Option<Vec<Element>> {
        let mut elements = Vec::new();
        let mut combinator = Combinator::empty();
        loop {
            let index = self.input.i;
            let Some(name) = self.input.re_str(regex!(
                r"^[#.](?:[\w-]|\\(?:[A-Fa-f0-9]{1,6} ?|[^A-Fa-f0-9]))+"
            )) else {
                break;
            };
            elements.push(Element::new(
                combinator,
                ElementValue::Text(name),
                self.pos(index),
            ));
            combinator = if self.input.char('>') {
                Combinator::new(">")
            } else {
                Combinator::empty()
            };
        }
        (!elements.is_empty()).then_some(elements)
    }

    /// Arguments of a call (`is_call`) or parameters of a definition.
    ///
    /// Separators are `,` unless a `;` appears, in which case each
    /// `;`-delimited group is one argument and commas inside it build a list.
    pub(super) fn mixin_args(&mut self, is_call: bool) -> LessResult<MixinArgs> {
        let mut result = MixinArgs {
            args: Vec::new(),
            variadic: false,
        };
        let mut expressions: Vec<Node> = Vec::new();
        let mut args_semicolon: Vec<ArgSlot> = Vec::new();
        let mut args_comma: Vec<ArgSlot> = Vec::new();
        let mut semicolon_separated = false;
        let mut expression_contains_named = false;
        let mut name: Option<String> = None;
        let mut has_sep = true;

        self.input.save();

        loop {
            let arg = if is_call {
                alt!(self.detached_ruleset()?, self.expression()?)
            } else {
                self.clear_comments();
                if self.input.str("...") {
                    result.variadic = true;
                    if self.input.char(';') && !semicolon_separated {
                        semicolon_separated = true;
                    }
                    let slot = ArgSlot {
                        variadic: true,
                        ..ArgSlot::default()
                    };
                    if semicolon_separated {
                        args_semicolon.push(slot);
                    } else {
                        args_comma.push(slot);
                    }
                    break;
                }
                alt!(
                    self.variable()?,
                    self.property(),
                    self.literal()?,
                    self.keyword(),
                    self.mixin_call(true, Lookups::Optional)?,
                )
            };

            let Some(arg) = arg else {
                break;
            };
            if !has_sep {
                break;
            }

            let mut name_loop: Option<String> = None;
            let mut expand = false;
            let mut value: Option<Node> = Some(arg.clone());

            let val = if is_call {
                match &arg {
                    Node::Expression(e) if e.value.len() == 1 => Some(e.value[0].clone()),
                    _ => None,
                }
            } else {
                Some(arg.clone())
            };
            let var_name = match &val {
                Some(Node::Variable(v)) => Some(v.name.clone()),
                Some(Node::Property(p)) => Some(p.name.clone()),
                _ => None,
            };

            if let Some(var_name) = var_name {
                if self.input.char(':') {
                    if !expressions.is_empty() {
                        if semicolon_separated {
                            return Err(self.error("Cannot mix ; and , as delimiter types"));
                        }
                        expression_contains_named = true;
                    }
                    value = alt!(self.detached_ruleset()?, self.expression()?);
                    if value.is_none() {
                        if is_call {
                            return Err(self.error("could not understand value for named argument"));
                        }
                        self.input.restore(None);
                        result.args = Vec::new();
                        return Ok(result);
                    }
                    name = Some(var_name.clone());
                    name_loop = Some(var_name);
                } else if self.input.str("...") {
                    if !is_call {
                        result.variadic = true;
                        if self.input.char(';') && !semicolon_separated {
                            semicolon_separated = true;
                        }
                        let slot = ArgSlot {
                            name: Some(var_name),
                            variadic: true,
                            ..ArgSlot::default()
                        };
                        if semicolon_separated {
                            args_semicolon.push(slot);
                        } else {
                            args_comma.push(slot);
                        }
                        break;
                    }
                    expand = true;
                } else if !is_call {
                    name = Some(var_name.clone());
                    name_loop = Some(var_name);
                    value = None;
                }
            }

            if let Some(v) = &value {
                expressions.push(v.clone());
            }

            args_comma.push(ArgSlot {
                name: name_loop,
                value: value.clone(),
                expand,
                variadic: false,
            });

            if self.input.char(',') {
                has_sep = true;
                continue;
            }
            has_sep = self.input.char(';');

            if has_sep || semicolon_separated {
                if expression_contains_named {
                    return Err(self.error("Cannot mix ; and , as delimiter types"));
                }
                semicolon_separated = true;
                let group_value = if expressions.len() > 1 {
                    Some(Node::Value(Value::new(std::mem::take(&mut expressions))))
                } else {
                    value
                };
                args_semicolon.push(ArgSlot {
                    name: name.take(),
                    value: group_value,
                    expand,
                    variadic: false,
                });
                expressions.clear();
                expression_contains_named = false;
            }
        }

        self.input.forget();
        result.args = if semicolon_separated {
            args_semicolon
        } else {
            args_comma
        };
        Ok(result)
    }

    /// `.m(@a; @b: 2) when (guard) { ... }`
    pub(super) fn mixin_definition(&mut self) -> LessResult<Option<Node>> {
        let c = self.input.current_char();
        if (c != Some('.') && c != Some('#')) || self.input.peek_re(regex!(r"^[^{]*\}")) {
            return Ok(None);
        }
        let index = self.input.i;
        self.input.save();

        let Some(caps) = self.input.re(regex!(
            r"^([#.](?:[\w-]|\\(?:[A-Fa-f0-9]{1,6} ?|[^A-Fa-f0-9]))+)\s*\("
        )) else {
            self.input.restore(None);
            return Ok(None);
        };
        let name = caps.get(1).unwrap_or_default().to_string();

        let arg_info = self.mixin_args(false)?;
        if !self.input.char(')') {
            self.input.restore(Some("Missing closing ')'"));
            return Ok(None);
        }
        self.clear_comments();

        let mut condition = None;
        if self.input.str("when") {
            match self.conditions()? {
                Some(c) => condition = Some(c),
                None => return Err(self.error("expected condition")),
            }
        }

        match self.block()? {
            Some(rules) => {
                self.input.forget();
                let params = arg_info.args.into_iter().map(ArgSlot::into_param).collect();
                Ok(Some(Node::MixinDefinition(Rc::new(MixinDefinition::new(
                    &name,
                    params,
                    rules,
                    condition,
                    arg_info.variadic,
                    self.pos(index),
                )))))
            }
            None => {
                self.input.restore(None);
                Ok(None)
            }
        }
    }

    /// `[@a][b][]` after a mixin call or detached ruleset variable.
    pub(super) fn rule_lookups(&mut self) -> Option<Vec<String>> {
        if self.input.current_char() != Some('[') {
            return None;
        }
        let mut lookups = Vec::new();
        loop {
            self.input.save();
            match self.lookup_value() {
                Some(rule) => {
                    lookups.push(rule);
                    self.input.forget();
                }
                None => {
                    self.input.restore(None);
                    break;
                }
            }
        }
        (!lookups.is_empty()).then_some(lookups)
    }

    fn lookup_value(&mut self) -> Option<String> {
        self.input.save();
        if !self.input.char('[') {
            self.input.restore(None);
            return None;
        }
        let name = self
            .input
            .re_str(regex!(r"^(?:[@$]{0,2})[_a-zA-Z0-9-]*"))
            .unwrap_or_default();
        if !self.input.char(']') {
            self.input.restore(None);
            return None;
        }
        self.input.forget();
        Some(name)
    }

    /// `@dr();` as a statement, or `@dr[@key]` / `@dr()[@key]` in a value
    /// when `parsed_name` was already consumed.
    pub(super) fn variable_call(&mut self, parsed_name: Option<String>) -> LessResult<Option<Node>> {
        let index = self.input.i;
        let in_value = parsed_name.is_some();
        self.input.save();

        let (name, has_parens) = match parsed_name {
            Some(name) => (name, false),
            None => {
                if self.input.current_char() != Some('@') {
                    self.input.restore(None);
                    return Ok(None);
                }
                match self.input.re(regex!(r"^(@[\w-]+)(\(\s*\))?")) {
                    Some(caps) => (
                        caps.get(1).unwrap_or_default().to_string(),
                        caps.get(2).is_some(),
                    ),
                    None => {
                        self.input.restore(None);
                        return Ok(None);
                    }
                }
            }
        };

        let called = if in_value {
            self.input.str("()")
        } else {
            has_parens
        };
        let lookups = self.rule_lookups();
        if lookups.is_none() && !called {
            self.input.restore(Some("Missing '[...]' lookup in variable call"));
            return Ok(None);
        }

        let pos = self.pos(index);
        let call = VariableCall {
            variable: name,
            important: false,
            pos: pos.clone(),
        };
        if !in_value && self.end() {
            self.input.forget();
            return Ok(Some(Node::VariableCall(call)));
        }
        self.input.forget();
        Ok(Some(Node::NamespaceValue(NamespaceValue {
            value: Box::new(Node::VariableCall(call)),
            lookups: lookups.unwrap_or_default(),
            pos,
        })))
    }
}

impl ArgSlot {
    pub(super) fn into_param(self) -> MixinParam {
        MixinParam {
            name: self.name,
            value: self.value,
            variadic: self.variadic,
        }
    }
}
