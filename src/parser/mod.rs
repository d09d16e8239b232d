//! # Parser
//!
//! A predictive, backtracking recursive-descent parser. There is no token
//! stream: every production matches directly against the source through
//! [`ParserInput`], trying alternatives in order and rewinding on failure.
//!
//! ## Module Structure
//!
//! - **`input`**: the cursor, checkpoints, comment store, furthest-error tracking
//! - **`chunker`**: optional pre-split of the source with balance checks
//! - **`entities`**: literals, variables, calls, urls and other value atoms
//! - **`values`**: values, expressions, operations and guard conditions
//! - **`selectors`**: elements, combinators, attributes, `:extend()`
//! - **`mixins`**: mixin calls, definitions, arguments and `[lookups]`
//! - **`rules`**: declarations, rulesets, at-rules, imports and media
//!
//! Each production returns `Ok(None)` when it does not apply and leaves the
//! cursor where it found it; `Err` is a fatal syntax error.

use crate::diagnostics::{LessError, LessResult};
use crate::tree::{
    Comment, DebugInfo, Declaration, FileRef, Node, Ruleset, Selector, SourcePos, Visibility,
};
use crate::{err_at, err_msg};

/// A lazily compiled, anchored regex living in a function-local static.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($re).expect("static regex"));
        &*RE
    }};
}

/// Ordered choice: evaluates each alternative in turn until one is `Some`.
macro_rules! alt {
    ($($e:expr),+ $(,)?) => {{
        let mut found = None;
        $(
            if found.is_none() {
                found = $e;
            }
        )+
        found
    }};
}

pub mod chunker;
mod entities;
pub mod input;
mod mixins;
mod rules;
mod selectors;
mod values;

pub use input::ParserInput;

/// Named entry productions for [`parse_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Selectors,
    /// A value followed by an optional `!important`.
    Value,
    Declaration,
    Ruleset,
}

/// Result of [`parse_node`], one variant per [`Production`].
#[derive(Debug, Clone)]
pub enum Parsed {
    Selectors(Vec<Selector>),
    Value { value: Node, important: String },
    Declaration(Declaration),
    Ruleset(Ruleset),
}

pub struct Parser {
    input: ParserInput,
    file: Option<FileRef>,
    /// Added to every local index; non-zero when re-parsing a fragment.
    offset: usize,
    dump_line_numbers: bool,
}

/// Line endings normalised to `\n` and a leading byte order mark removed.
pub fn normalize_source(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Parses a whole stylesheet into a root ruleset.
///
/// `file.contents()` is the text parsed; positions index into it.
pub fn parse_stylesheet(
    file: &FileRef,
    chunk_input: bool,
    dump_line_numbers: bool,
) -> LessResult<Ruleset> {
    let text = file.contents();
    let chunks = if chunk_input {
        chunker::chunk(text, Some(file))?
    } else {
        Vec::new()
    };
    let mut parser = Parser {
        input: ParserInput::new(text, chunks),
        file: Some(file.clone()),
        offset: 0,
        dump_line_numbers,
    };
    let rules = parser.primary()?;
    let end = parser.input.end();
    if !end.is_finished {
        let message = end.furthest_message.unwrap_or_else(|| {
            let mut message = "Unrecognised input".to_string();
            match end.furthest_char {
                Some('}') => message.push_str(". Possibly missing opening '{'"),
                Some(')') => message.push_str(". Possibly missing opening '('"),
                _ if end.furthest_reached_end => message.push_str(". Possibly missing something"),
                _ => {}
            }
            message
        });
        return Err(err_at!(Parse, &parser.pos(end.furthest), message));
    }
    let mut root = Ruleset::root(rules);
    root.pos = parser.pos(0);
    Ok(root)
}

/// Re-parses a fragment with one production. `index` is where the fragment
/// came from in `file`, so errors and positions point back at the source.
///
/// Returns `Ok(None)` if the production does not consume the whole text.
pub fn parse_node(
    text: &str,
    production: Production,
    index: usize,
    file: Option<FileRef>,
) -> LessResult<Option<Parsed>> {
    let mut parser = Parser {
        input: ParserInput::new(text, Vec::new()),
        file,
        offset: index,
        dump_line_numbers: false,
    };
    let parsed = match production {
        Production::Selectors => parser.selectors()?.map(Parsed::Selectors),
        Production::Value => match parser.value()? {
            Some(value) => Some(Parsed::Value {
                value,
                important: parser.important().unwrap_or_default(),
            }),
            None => None,
        },
        Production::Declaration => match parser.declaration()? {
            Some(Node::Declaration(d)) => Some(Parsed::Declaration(d)),
            _ => None,
        },
        Production::Ruleset => match parser.ruleset()? {
            Some(Node::Ruleset(rs)) => Some(Parsed::Ruleset(*rs)),
            _ => None,
        },
    };
    if !parser.input.end().is_finished {
        return Ok(None);
    }
    Ok(parsed)
}

impl Parser {
    fn pos(&self, index: usize) -> SourcePos {
        SourcePos::new(index + self.offset, self.file.clone())
    }

    fn here(&self) -> SourcePos {
        self.pos(self.input.i)
    }

    /// A `Syntax` error at the cursor.
    fn error(&self, msg: impl Into<String>) -> LessError {
        err_msg!(Syntax, msg.into()).located(&self.here())
    }

    fn expect_char(&mut self, c: char) -> LessResult<()> {
        if self.input.char(c) {
            return Ok(());
        }
        let got = self.input.current_char().map(String::from).unwrap_or_default();
        Err(self.error(format!("expected '{c}' got '{got}'")))
    }

    fn debug_info(&self, index: usize) -> Option<DebugInfo> {
        if !self.dump_line_numbers {
            return None;
        }
        let before = &self.input.input()[..index.min(self.input.input().len())];
        Some(DebugInfo {
            line_number: before.matches('\n').count() + 1,
            file_name: self
                .file
                .as_ref()
                .map(|f| f.filename.clone())
                .unwrap_or_default(),
        })
    }

    /// `(comment | extendRule | mixinDefinition | declaration | mixinCall |
    /// ruleset | variableCall | entityCall | atRule)*` up to `}` or the end.
    fn primary(&mut self) -> LessResult<Vec<Node>> {
        let mut root = Vec::new();
        loop {
            while let Some(comment) = self.comment() {
                root.push(comment);
            }
            if self.input.finished() || self.input.peek("}") {
                break;
            }
            if let Some(extends) = self.extend(true)? {
                root.extend(extends.into_iter().map(Node::Extend));
                continue;
            }
            let node = alt!(
                self.mixin_definition()?,
                self.declaration()?,
                self.mixin_call(false, mixins::Lookups::Never)?,
                self.ruleset()?,
                self.variable_call(None)?,
                self.call()?,
                self.at_rule()?,
            );
            match node {
                Some(node) => root.push(node),
                None => {
                    let mut found_semicolon = false;
                    while self.input.char(';') {
                        found_semicolon = true;
                    }
                    if !found_semicolon {
                        break;
                    }
                }
            }
        }
        Ok(root)
    }

    fn comment(&mut self) -> Option<Node> {
        let stored = self.input.comment_store.pop_front()?;
        Some(Node::Comment(Comment {
            value: stored.text,
            is_line_comment: stored.is_line_comment,
            pos: self.pos(stored.index),
            visibility: Visibility::default(),
        }))
    }

    fn clear_comments(&mut self) {
        self.input.comment_store.clear();
    }

    fn block(&mut self) -> LessResult<Option<Vec<Node>>> {
        self.input.save();
        if self.input.char('{') {
            let content = self.primary()?;
            if self.input.char('}') {
                self.input.forget();
                return Ok(Some(content));
            }
        }
        self.input.restore(None);
        Ok(None)
    }

    fn block_ruleset(&mut self) -> LessResult<Option<Ruleset>> {
        Ok(self.block()?.map(|rules| Ruleset::new(None, rules)))
    }

    /// `;` or a following `}`.
    fn end(&mut self) -> bool {
        self.input.char(';') || self.input.peek("}")
    }

    fn important(&mut self) -> Option<String> {
        if self.input.current_char() == Some('!') {
            return self.input.re_str(regex!(r"^! *important"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::tree::FileInfo;

    fn parse(text: &str) -> LessResult<Ruleset> {
        let file = Rc::new(FileInfo::new("test.less", text));
        parse_stylesheet(&file, false, false)
    }

    #[test]
    fn test_parse_empty_and_comments() {
        let root = parse("/* a */\n// b\n").unwrap();
        assert_eq!(root.rules.len(), 2);
        assert!(root.root);
    }

    #[test]
    fn test_unrecognised_input_reports_position() {
        let err = parse(".a { color: red; }\n}").unwrap_err();
        assert_eq!(err.kind(), crate::diagnostics::ErrorKind::Parse);
        assert!(err.message().starts_with("Unrecognised input"));
        assert_eq!(err.context().line, Some(2));
    }

    #[test]
    fn test_chunked_parse_matches_unchunked() {
        let text = ".a { color: red; }\n".repeat(50);
        let file = Rc::new(FileInfo::new("test.less", &text));
        let chunked = parse_stylesheet(&file, true, false).unwrap();
        assert_eq!(chunked.rules.len(), 50);
    }

    #[test]
    fn test_parse_node_selectors() {
        match parse_node(".a > .b, .c", Production::Selectors, 0, None).unwrap() {
            Some(Parsed::Selectors(sels)) => {
                assert_eq!(sels.len(), 2);
                assert_eq!(sels[0].elements.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_node(".a {", Production::Selectors, 0, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("\u{feff}a\r\nb\rc"), "a\nb\nc");
    }
}
