//! CSS text generation for every node kind.

use crate::diagnostics::LessResult;
use crate::options::LineNumbers;
use crate::output::{GenContext, OutputSink, StringSink};
use crate::tree::{
    AtRule, Attribute, DebugInfo, DeclName, Declaration, Element, ElementValue, Media, Node,
    Ruleset, Selector,
};

/// Writes `node` into `out`.
pub fn gen_css(node: &Node, ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    match node {
        Node::Anonymous(a) => {
            if !a.value.is_empty() {
                out.add(&a.value, Some(&a.pos));
            }
        }
        Node::Keyword(k) => out.add(&k.value, None),
        Node::Color(c) => out.add(&c.to_css(ctx.compress), None),
        Node::Dimension(d) => out.add(&d.to_css(ctx.compress, ctx.strict_units)?, None),
        Node::Quoted(q) => {
            if q.escaped {
                out.add(&q.value, Some(&q.pos));
            } else {
                out.add(&format!("{}{}{}", q.quote, q.value, q.quote), Some(&q.pos));
            }
        }
        Node::Url(url) => {
            out.add("url(", Some(&url.pos));
            gen_css(&url.value, ctx, out)?;
            out.add(")", None);
        }
        Node::UnicodeDescriptor(text) => out.add(text, None),
        Node::Call(call) => {
            out.add(&format!("{}(", call.name), Some(&call.pos));
            for (i, arg) in call.args.iter().enumerate() {
                gen_css(arg, ctx, out)?;
                if i + 1 < call.args.len() {
                    out.add(", ", None);
                }
            }
            out.add(")", None);
        }
        Node::Variable(v) => out.add(&v.name, Some(&v.pos)),
        Node::Property(p) => out.add(&p.name, Some(&p.pos)),
        Node::Operation(op) => {
            gen_css(&op.left, ctx, out)?;
            if op.is_spaced {
                out.add(" ", None);
            }
            out.add(&op.op, None);
            if op.is_spaced {
                out.add(" ", None);
            }
            gen_css(&op.right, ctx, out)?;
        }
        Node::Negative(inner) => {
            out.add("-", None);
            gen_css(inner, ctx, out)?;
        }
        Node::Expression(e) => {
            for (i, item) in e.value.iter().enumerate() {
                gen_css(item, ctx, out)?;
                let next_is_comma = matches!(e.value.get(i + 1), Some(Node::Anonymous(a)) if a.value == ",");
                if !e.no_spacing && i + 1 < e.value.len() && !next_is_comma {
                    out.add(" ", None);
                }
            }
        }
        Node::Value(v) => {
            for (i, item) in v.value.iter().enumerate() {
                gen_css(item, ctx, out)?;
                if i + 1 < v.value.len() {
                    out.add(if ctx.compress { "," } else { ", " }, None);
                }
            }
        }
        Node::Paren(inner) => {
            out.add("(", None);
            gen_css(inner, ctx, out)?;
            out.add(")", None);
        }
        Node::Assignment(a) => {
            out.add(&format!("{}=", a.key), None);
            gen_css(&a.value, ctx, out)?;
        }
        Node::Attribute(attr) => out.add(&attribute_css(attr, ctx)?, None),
        Node::JavaScript(js) => out.add(&js.expression, Some(&js.pos)),
        Node::Comment(c) => out.add(&c.value, Some(&c.pos)),
        Node::Declaration(d) => gen_declaration(d, ctx, out)?,
        Node::Ruleset(rs) => gen_ruleset(rs, ctx, out)?,
        Node::Import(import) => {
            if import.css {
                out.add("@import ", Some(&import.pos));
                gen_css(&import.path, ctx, out)?;
                if let Some(features) = &import.features {
                    out.add(" ", None);
                    gen_css(features, ctx, out)?;
                }
                out.add(";", None);
            }
        }
        Node::AtRule(at) => gen_at_rule(at, ctx, out)?,
        Node::Media(media) => gen_media(media, ctx, out)?,
        Node::Condition(_)
        | Node::NamespaceValue(_)
        | Node::DetachedRuleset(_)
        | Node::VariableCall(_)
        | Node::MixinDefinition(_)
        | Node::MixinCall(_)
        | Node::Extend(_) => {}
    }
    Ok(())
}

/// The CSS text of one node.
pub fn node_css(node: &Node, ctx: &GenContext) -> LessResult<String> {
    let mut ctx = ctx.clone();
    let mut out = StringSink::new();
    gen_css(node, &mut ctx, &mut out)?;
    Ok(out.into_string())
}

fn attribute_css(attr: &Attribute, ctx: &GenContext) -> LessResult<String> {
    let mut text = node_css(&attr.key, ctx)?;
    if let Some(op) = &attr.op {
        text.push_str(op);
        if let Some(value) = &attr.value {
            text.push_str(&node_css(value, ctx)?);
        }
    }
    if let Some(cif) = &attr.cif {
        text.push(' ');
        text.push_str(cif);
    }
    Ok(format!("[{text}]"))
}

// ============================================================================
// SELECTORS
// ============================================================================

pub fn element_css(element: &Element, ctx: &mut GenContext) -> LessResult<String> {
    let value = match &element.value {
        ElementValue::Text(text) => text.clone(),
        ElementValue::Variable(name) => name.clone(),
        ElementValue::Attribute(attr) => attribute_css(attr, ctx)?,
        ElementValue::Paren(selectors) => {
            let first = ctx.first_selector;
            ctx.first_selector = true;
            let mut parts = Vec::new();
            for sel in selectors {
                parts.push(selector_css(sel, ctx)?);
            }
            ctx.first_selector = first;
            format!("({})", parts.join(","))
        }
    };
    if value.is_empty() && element.combinator.value.starts_with('&') {
        return Ok(String::new());
    }
    Ok(format!("{}{}", element.combinator.to_css(ctx.compress), value))
}

/// A selector as it appears in a path; a leading empty combinator is
/// written as a space unless this is the first selector of the path.
pub fn selector_css(selector: &Selector, ctx: &mut GenContext) -> LessResult<String> {
    let mut text = String::new();
    if !ctx.first_selector
        && selector
            .elements
            .first()
            .is_some_and(|e| e.combinator.value.is_empty())
    {
        text.push(' ');
    }
    for element in &selector.elements {
        text.push_str(&element_css(element, ctx)?);
    }
    Ok(text)
}

// ============================================================================
// RULES
// ============================================================================

fn gen_declaration(decl: &Declaration, ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    let name = match &decl.name {
        DeclName::Plain(name) => name.clone(),
        DeclName::Interpolated(parts) => {
            let mut name = String::new();
            for part in parts {
                name.push_str(&node_css(part, ctx)?);
            }
            name
        }
    };
    out.add(
        &format!("{name}{}", if ctx.compress { ":" } else { ": " }),
        Some(&decl.pos),
    );
    gen_css(&decl.value, ctx, out).map_err(|e| e.located(&decl.pos))?;
    let terminator = if decl.inline || (ctx.last_rule && ctx.compress) {
        ""
    } else {
        ";"
    };
    out.add(&format!("{}{terminator}", decl.important), Some(&decl.pos));
    Ok(())
}

/// Rules that were not explicitly hidden.
fn shows(node: &Node) -> bool {
    node.visibility().map_or(true, |v| v.visible != Some(false))
}

fn gen_ruleset(rs: &Ruleset, ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    if !rs.root {
        ctx.tab_level += 1;
    }
    let tab_rule = if ctx.compress {
        String::new()
    } else {
        "  ".repeat(ctx.tab_level)
    };
    let tab_set = if ctx.compress {
        String::new()
    } else {
        "  ".repeat(ctx.tab_level.saturating_sub(1))
    };

    // Comments and charsets first, then css imports, then the rest.
    let mut ordered: Vec<&Node> = Vec::with_capacity(rs.rules.len());
    let mut charset_index = 0;
    let mut import_index = 0;
    for (i, rule) in rs.rules.iter().enumerate() {
        match rule {
            Node::Comment(_) => {
                if import_index == i {
                    import_index += 1;
                }
                ordered.push(rule);
            }
            Node::AtRule(at) if at.is_charset() => {
                ordered.insert(charset_index, rule);
                charset_index += 1;
                import_index += 1;
            }
            Node::Import(_) => {
                ordered.insert(import_index.min(ordered.len()), rule);
                import_index += 1;
            }
            _ => ordered.push(rule),
        }
    }

    if !rs.root {
        if let Some(info) = &rs.debug_info {
            let debug = debug_info_css(ctx, info, &tab_set);
            if !debug.is_empty() {
                out.add(&debug, None);
                out.add(&tab_set, None);
            }
        }
        let sep = if ctx.compress {
            ",".to_string()
        } else {
            format!(",\n{tab_set}")
        };
        let mut first = true;
        for path in &rs.paths {
            if path.is_empty() {
                continue;
            }
            if !first {
                out.add(&sep, None);
            }
            first = false;
            ctx.first_selector = true;
            let head = selector_css(&path[0], ctx)?;
            out.add(&head, Some(&path[0].pos));
            ctx.first_selector = false;
            for sel in &path[1..] {
                let text = selector_css(sel, ctx)?;
                out.add(&text, Some(&sel.pos));
            }
        }
        out.add(
            &format!("{}{tab_rule}", if ctx.compress { "{" } else { " {\n" }),
            None,
        );
    }

    for (i, rule) in ordered.iter().enumerate() {
        if i + 1 == ordered.len() {
            ctx.last_rule = true;
        }
        let current_last = ctx.last_rule;
        if rule.is_ruleset_like() {
            ctx.last_rule = false;
        }
        gen_css(rule, ctx, out)?;
        ctx.last_rule = current_last;
        if !ctx.last_rule && shows(rule) {
            if !ctx.compress {
                out.add(&format!("\n{tab_rule}"), None);
            }
        } else {
            ctx.last_rule = false;
        }
    }

    if !rs.root {
        out.add(
            &if ctx.compress {
                "}".to_string()
            } else {
                format!("\n{tab_set}}}")
            },
            None,
        );
        ctx.tab_level -= 1;
    }

    if rs.first_root && !ctx.compress && !out.is_empty() {
        out.add("\n", None);
    }
    Ok(())
}

/// The body of an at-rule or media block.
fn gen_block(rules: &[Node], ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    ctx.tab_level += 1;
    if ctx.compress {
        out.add("{", None);
        for rule in rules {
            gen_css(rule, ctx, out)?;
        }
        out.add("}", None);
        ctx.tab_level -= 1;
        return Ok(());
    }
    let tab_set = format!("\n{}", "  ".repeat(ctx.tab_level - 1));
    let tab_rule = format!("{tab_set}  ");
    if rules.is_empty() {
        out.add(&format!(" {{{tab_set}}}"), None);
    } else {
        out.add(&format!(" {{{tab_rule}"), None);
        gen_css(&rules[0], ctx, out)?;
        for rule in &rules[1..] {
            out.add(&tab_rule, None);
            gen_css(rule, ctx, out)?;
        }
        out.add(&format!("{tab_set}}}"), None);
    }
    ctx.tab_level -= 1;
    Ok(())
}

fn gen_at_rule(at: &AtRule, ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    out.add(&at.name, Some(&at.pos));
    if let Some(value) = &at.value {
        out.add(" ", None);
        gen_css(value, ctx, out)?;
    }
    match &at.rules {
        Some(rules) => gen_block(rules, ctx, out),
        None => {
            out.add(";", None);
            Ok(())
        }
    }
}

fn gen_media(media: &Media, ctx: &mut GenContext, out: &mut dyn OutputSink) -> LessResult<()> {
    let features = node_css(&media.features, ctx)?;
    if features.is_empty() {
        out.add(&media.name, Some(&media.pos));
    } else {
        out.add(&format!("{} ", media.name), Some(&media.pos));
        out.add(&features, None);
    }
    gen_block(&media.rules, ctx, out)
}

// ============================================================================
// DEBUG INFO
// ============================================================================

fn debug_comment(info: &DebugInfo) -> String {
    format!("/* line {}, {} */\n", info.line_number, info.file_name)
}

fn debug_media_query(info: &DebugInfo) -> String {
    let mut filename = info.file_name.clone();
    if !regex_has_protocol(&filename) {
        filename = format!("file://{filename}");
    }
    let mut escaped = String::new();
    for c in filename.chars() {
        match c {
            '\\' => escaped.push_str("\\/"),
            '.' | ':' | '/' => {
                escaped.push('\\');
                escaped.push(c);
            }
            other => escaped.push(other),
        }
    }
    format!(
        "@media -sass-debug-info{{filename{{font-family:{escaped}}}line{{font-family:\\00003{}}}}}\n",
        info.line_number
    )
}

fn regex_has_protocol(name: &str) -> bool {
    match name.find("://") {
        Some(i) => i > 0 && name[..i].chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// Line-number annotation written before a ruleset.
pub fn debug_info_css(ctx: &GenContext, info: &DebugInfo, separator: &str) -> String {
    if ctx.compress {
        return String::new();
    }
    match ctx.dump_line_numbers {
        None => String::new(),
        Some(LineNumbers::Comments) => debug_comment(info),
        Some(LineNumbers::Mediaquery) => debug_media_query(info),
        Some(LineNumbers::All) => format!("{}{separator}{}", debug_comment(info), debug_media_query(info)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Anonymous, Color, Dimension, Expression, SourcePos, Value};

    fn css(node: &Node, compress: bool) -> String {
        node_css(node, &GenContext::inline(compress)).unwrap()
    }

    #[test]
    fn test_value_and_expression_spacing() {
        let list = Node::Value(Value::new(vec![
            Node::Expression(Expression::new(vec![
                Node::Dimension(Dimension::with_unit(1.0, "px")),
                Node::keyword("solid"),
            ])),
            Node::Color(Color::new([0.0, 0.0, 0.0], 1.0)),
        ]));
        assert_eq!(css(&list, false), "1px solid, #000000");
        assert_eq!(css(&list, true), "1px solid,#000");
        let with_comma = Node::Expression(Expression::new(vec![
            Node::keyword("a"),
            Node::Anonymous(Anonymous::new(",")),
            Node::keyword("b"),
        ]));
        assert_eq!(css(&with_comma, false), "a, b");
    }

    #[test]
    fn test_ruleset_layout() {
        let decl = Node::Declaration(Declaration::new(
            "color",
            Node::keyword("red"),
            SourcePos::default(),
        ));
        let mut rs = Ruleset::new(Some(vec![]), vec![decl.clone(), decl]);
        rs.paths = vec![vec![Selector::new(vec![Element::text("", ".a")], SourcePos::default())]];
        let mut root = Ruleset::root(vec![Node::Ruleset(Box::new(rs))]);
        root.first_root = true;
        let node = Node::Ruleset(Box::new(root));
        assert_eq!(css(&node, false), ".a {\n  color: red;\n  color: red;\n}\n");
        assert_eq!(css(&node, true), ".a{color:red;color:red}");
    }

    #[test]
    fn test_debug_info_forms() {
        let info = DebugInfo {
            line_number: 3,
            file_name: "a/b.less".into(),
        };
        let mut ctx = GenContext::inline(false);
        ctx.dump_line_numbers = Some(LineNumbers::Comments);
        assert_eq!(debug_info_css(&ctx, &info, ""), "/* line 3, a/b.less */\n");
        ctx.dump_line_numbers = Some(LineNumbers::Mediaquery);
        assert_eq!(
            debug_info_css(&ctx, &info, ""),
            "@media -sass-debug-info{filename{font-family:file\\:\\/\\/a\\/b\\.less}line{font-family:\\000033}}\n"
        );
    }
}
