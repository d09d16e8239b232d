//! String escaping, formatting and replacement.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::err_msg;
use crate::functions::helpers::{arg, css, text_of};
use crate::functions::{FnResult, Function, FunctionRegistry};
use crate::tree::{Anonymous, Node, Quoted};

pub fn register_string_functions(registry: &mut FunctionRegistry) {
    registry.register("e", Function::Pure(e));
    registry.register("escape", Function::Pure(escape));
    registry.register("replace", Function::Pure(replace));
    registry.register("%", Function::Pure(format));
}

/// Usage: `e("ms:alwaysHasItsOwnSyntax")` prints the text unquoted.
fn e(args: &[Node]) -> FnResult {
    let text = match arg(args, 0, "e")? {
        Node::JavaScript(js) => js.expression.clone(),
        other => text_of(other),
    };
    Ok(Some(Node::Quoted(Quoted::new('"', text, true))))
}

/// Percent-encodes every byte outside `keep`.
fn percent_encode(text: &str, keep: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || keep.contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    out
}

/// URI escaping that also covers `= : # ; ( )`.
fn escape(args: &[Node]) -> FnResult {
    let text = text_of(arg(args, 0, "escape")?);
    Ok(Some(Node::Anonymous(Anonymous::new(percent_encode(
        &text,
        ",/?@&+$-_.!~*'",
    )))))
}

fn encode_component(text: &str) -> String {
    percent_encode(text, "-_.!~*'()")
}

static GROUP_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").expect("static regex"));

/// Rewrites `$&` and `$1` replacement references to the `${0}` form.
fn replacement_syntax(text: &str) -> String {
    GROUP_REF
        .replace_all(&text.replace("$&", "${0}"), "$${${1}}")
        .into_owned()
}

/// Usage: `replace(string, pattern, replacement, flags)`; `g` replaces
/// every match, `i` ignores case.
fn replace(args: &[Node]) -> FnResult {
    let subject = arg(args, 0, "replace")?;
    let pattern = text_of(arg(args, 1, "replace")?);
    let replacement = match arg(args, 2, "replace")? {
        Node::Quoted(q) => q.value.clone(),
        other => css(other),
    };
    let flags = args.get(3).map(text_of).unwrap_or_default();
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build()
        .map_err(|err| err_msg!(Argument, "invalid pattern for replace: {}", err))?;
    let replacement = replacement_syntax(&replacement);
    let source = text_of(subject);
    let result = if flags.contains('g') {
        re.replace_all(&source, replacement.as_str())
    } else {
        re.replace(&source, replacement.as_str())
    };
    Ok(Some(Node::Quoted(requote(subject, result.into_owned()))))
}

/// A new string with the quoting of `template`.
fn requote(template: &Node, value: String) -> Quoted {
    match template {
        Node::Quoted(q) => Quoted::new(q.quote, value, q.escaped),
        _ => Quoted::new('"', value, true),
    }
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)%[sda]").expect("static regex"));

/// Usage: `%("repetitions: %d file: %s", 1 + 2, "directory/file.less")`.
/// Upper-case placeholders URL-encode their argument.
fn format(args: &[Node]) -> FnResult {
    let template = arg(args, 0, "%")?;
    let mut result = text_of(template);
    for value in &args[1..] {
        let Some(m) = PLACEHOLDER.find(&result) else {
            break;
        };
        let token = m.as_str();
        let text = match value {
            Node::Quoted(q) if token.eq_ignore_ascii_case("%s") => q.value.clone(),
            other => css(other),
        };
        let text = if token.ends_with(|c: char| c.is_ascii_uppercase()) {
            encode_component(&text)
        } else {
            text
        };
        result.replace_range(m.range(), &text);
    }
    Ok(Some(Node::Quoted(requote(template, result.replace("%%", "%")))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Dimension;

    fn quoted(text: &str) -> Node {
        Node::Quoted(Quoted::new('"', text, false))
    }

    #[test]
    fn test_escape_and_e() {
        let out = escape(&[quoted("a=1")]).unwrap().unwrap();
        assert_eq!(css(&out), "a%3D1");
        let out = escape(&[quoted("#;( )")]).unwrap().unwrap();
        assert_eq!(css(&out), "%23%3B%28%20%29");
        let out = e(&[quoted("-ms-foo")]).unwrap().unwrap();
        assert_eq!(css(&out), "-ms-foo");
    }

    #[test]
    fn test_replace() {
        let out = replace(&[quoted("Hello, Mars?"), quoted("Mars\\?"), quoted("Earth!")])
            .unwrap()
            .unwrap();
        assert_eq!(css(&out), "\"Hello, Earth!\"");
        let out = replace(&[quoted("a-b-c"), quoted("(\\w)"), quoted("[$1]"), quoted("g")])
            .unwrap()
            .unwrap();
        assert_eq!(css(&out), "\"[a]-[b]-[c]\"");
    }

    #[test]
    fn test_format() {
        let args = [
            quoted("repetitions: %d file: %s"),
            Node::Dimension(Dimension::unitless(3.0)),
            quoted("dir/file.less"),
        ];
        let out = format(&args).unwrap().unwrap();
        assert_eq!(css(&out), "\"repetitions: 3 file: dir/file.less\"");
        let out = format(&[quoted("%A 100%%"), quoted("a b")]).unwrap().unwrap();
        assert_eq!(css(&out), "\"%22a%20b%22 100%\"");
    }
}
