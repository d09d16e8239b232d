//! The parser cursor.
//!
//! All matching is anchored at the current offset. A successful match moves
//! the cursor past the token and any following whitespace; comments met
//! while skipping are parked in the comment store for the grammar to pick up
//! where a comment node is allowed.
//!
//! Backtracking is explicit: `save()` pushes an `(offset, chunk)`
//! checkpoint, `restore()` pops and rewinds to it, `forget()` pops and keeps
//! the current position. `restore(Some(msg))` records the position and
//! message if it is the furthest the parser has reached, which is what a
//! failed parse reports.

use std::collections::VecDeque;
use std::ops::Range;

use regex::Regex;

/// A comment absorbed while skipping whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredComment {
    pub index: usize,
    pub text: String,
    pub is_line_comment: bool,
}

/// Capture groups of a successful `re` match; group 0 is the whole match.
#[derive(Debug, Clone)]
pub struct Captures(Vec<Option<String>>);

impl Captures {
    pub fn full(&self) -> &str {
        self.get(0).unwrap_or("")
    }

    pub fn get(&self, n: usize) -> Option<&str> {
        self.0.get(n).and_then(|g| g.as_deref())
    }
}

/// A piece of raw text returned by [`ParserInput::parse_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPart {
    Text(String),
    /// A quoted string, quotes included.
    Quoted(char, String),
}

/// How the parse ended, used to build the final error.
#[derive(Debug, Clone)]
pub struct EndInfo {
    pub is_finished: bool,
    pub furthest: usize,
    pub furthest_message: Option<String>,
    pub furthest_reached_end: bool,
    pub furthest_char: Option<char>,
}

pub struct ParserInput {
    input: String,
    pub i: usize,
    j: usize,
    chunks: Vec<Range<usize>>,
    furthest: usize,
    furthest_message: Option<String>,
    save_stack: Vec<(usize, usize)>,
    pub auto_comment_absorb: bool,
    pub comment_store: VecDeque<StoredComment>,
    /// End of the last comment stored; re-absorbing after a restore is a no-op.
    comment_mark: usize,
}

impl ParserInput {
    pub fn new(input: &str, chunks: Vec<Range<usize>>) -> Self {
        let chunks = if chunks.is_empty() {
            vec![0..input.len()]
        } else {
            chunks
        };
        let mut p = Self {
            input: input.to_string(),
            i: 0,
            j: 0,
            chunks,
            furthest: 0,
            furthest_message: None,
            save_stack: Vec::new(),
            auto_comment_absorb: true,
            comment_store: VecDeque::new(),
            comment_mark: 0,
        };
        p.skip_whitespace(0);
        p
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    fn chunk_end(&self) -> usize {
        self.chunks[self.j].end.max(self.i)
    }

    /// Moves past `length` bytes, then whitespace and (when absorbing) comments.
    fn skip_whitespace(&mut self, length: usize) {
        self.i += length;
        loop {
            while self.j + 1 < self.chunks.len() && self.i >= self.chunks[self.j].end {
                self.j += 1;
            }
            let end = self.chunk_end();
            if self.i >= end {
                return;
            }
            let c = self.input.as_bytes()[self.i];
            if self.auto_comment_absorb && c == b'/' {
                match self.input.as_bytes().get(self.i + 1) {
                    Some(b'/') => {
                        let stop = self.input[self.i + 2..]
                            .find('\n')
                            .map_or(end, |n| self.i + 2 + n);
                        let text = self.input[self.i..stop].to_string();
                        self.store_comment(self.i, text, true);
                        self.i = stop;
                        continue;
                    }
                    Some(b'*') => {
                        if let Some(n) = self.input[self.i + 2..].find("*/") {
                            let stop = self.i + 2 + n + 2;
                            let text = self.input[self.i..stop].to_string();
                            self.store_comment(self.i, text, false);
                            self.i = stop;
                            continue;
                        }
                        return;
                    }
                    _ => return,
                }
            }
            if !matches!(c, b' ' | b'\n' | b'\t' | b'\r') {
                return;
            }
            self.i += 1;
        }
    }

    fn store_comment(&mut self, index: usize, text: String, is_line_comment: bool) {
        if index < self.comment_mark {
            return;
        }
        self.comment_mark = index + text.len();
        self.comment_store.push_back(StoredComment {
            index,
            text,
            is_line_comment,
        });
    }

    pub fn save(&mut self) {
        self.save_stack.push((self.i, self.j));
    }

    pub fn restore(&mut self, possible_error: Option<&str>) {
        if self.i > self.furthest
            || (self.i == self.furthest && possible_error.is_some() && self.furthest_message.is_none())
        {
            self.furthest = self.i;
            self.furthest_message = possible_error.map(str::to_string);
        }
        if let Some((i, j)) = self.save_stack.pop() {
            self.i = i;
            self.j = j;
        }
    }

    pub fn forget(&mut self) {
        self.save_stack.pop();
    }

    /// Rewinds without touching the checkpoint stack.
    pub fn rewind(&mut self, index: usize) {
        self.i = index;
        while self.j > 0 && self.chunks[self.j].start > index {
            self.j -= 1;
        }
    }

    pub fn is_whitespace(&self, offset: isize) -> bool {
        let pos = self.i as isize + offset;
        if pos < 0 {
            return false;
        }
        matches!(
            self.input.as_bytes().get(pos as usize),
            Some(b' ' | b'\r' | b'\t' | b'\n')
        )
    }

    /// Text from the cursor to the end of the current chunk.
    pub fn rest(&self) -> &str {
        &self.input[self.i..self.chunk_end()]
    }

    /// Matches an anchored regex against the current chunk.
    pub fn re(&mut self, re: &Regex) -> Option<Captures> {
        let caps = re.captures(self.rest())?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        let groups = caps
            .iter()
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        let len = whole.end();
        self.skip_whitespace(len);
        Some(Captures(groups))
    }

    /// Like `re`, returning only the whole match.
    pub fn re_str(&mut self, re: &Regex) -> Option<String> {
        self.re(re).map(|c| c.full().to_string())
    }

    pub fn char(&mut self, c: char) -> bool {
        if self.current_char() != Some(c) {
            return false;
        }
        self.skip_whitespace(c.len_utf8());
        true
    }

    pub fn str(&mut self, tok: &str) -> bool {
        if !self.input[self.i..].starts_with(tok) {
            return false;
        }
        self.skip_whitespace(tok.len());
        true
    }

    /// Consumes a quoted string at the cursor, returning it with its quotes.
    pub fn quoted(&mut self) -> Option<String> {
        let s = self.quoted_at(self.i)?;
        self.skip_whitespace(s.len());
        Some(s)
    }

    fn quoted_at(&self, pos: usize) -> Option<String> {
        let bytes = self.input.as_bytes();
        let start = *bytes.get(pos)?;
        if start != b'\'' && start != b'"' {
            return None;
        }
        let mut k = pos + 1;
        while k < bytes.len() {
            match bytes[k] {
                b'\\' => k += 2,
                c if c == start => return Some(self.input[pos..=k].to_string()),
                _ => k += 1,
            }
        }
        None
    }

    pub fn peek(&self, tok: &str) -> bool {
        self.input[self.i..].starts_with(tok)
    }

    pub fn peek_re(&self, re: &Regex) -> bool {
        re.find(self.rest()).is_some_and(|m| m.start() == 0)
    }

    pub fn peek_char(&self, c: char) -> bool {
        self.current_char() == Some(c)
    }

    pub fn current_char(&self) -> Option<char> {
        self.input[self.i..].chars().next()
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.i + offset..)?.chars().next()
    }

    pub fn prev_char(&self) -> Option<char> {
        self.input[..self.i].chars().next_back()
    }

    /// Moves forward without skipping whitespace or comments.
    pub fn advance(&mut self, n: usize) {
        self.i = (self.i + n).min(self.input.len());
    }

    /// The next char cannot start a number.
    pub fn peek_not_numeric(&self) -> bool {
        match self.input.as_bytes().get(self.i) {
            Some(&c) => c > b'9' || c < b'+' || c == b'/' || c == b',',
            None => true,
        }
    }

    pub fn finished(&self) -> bool {
        self.i >= self.input.len()
    }

    /// Scans raw text up to the first `stop` char outside nesting, strings
    /// and comments. `Err` carries the closing char that was expected instead.
    /// Returns `Ok(None)` when the input ends first.
    pub fn parse_until(&mut self, stop: &dyn Fn(char) -> bool) -> Result<Option<Vec<RawPart>>, char> {
        let bytes = self.input.as_bytes();
        let len = bytes.len();
        let mut parts = Vec::new();
        let mut block_stack: Vec<u8> = Vec::new();
        let mut in_comment = false;
        let mut last = self.i;
        let mut k = self.i;
        while k < len {
            let c = bytes[k];
            if block_stack.is_empty() && !in_comment && stop(c as char) {
                let text = &self.input[last..k];
                parts.push(RawPart::Text(if text.is_empty() {
                    " ".to_string()
                } else {
                    text.to_string()
                }));
                self.i = k;
                self.skip_whitespace(0);
                return Ok(Some(parts));
            }
            if in_comment {
                if c == b'*' && bytes.get(k + 1) == Some(&b'/') {
                    k += 1;
                    in_comment = false;
                }
                k += 1;
                continue;
            }
            match c {
                b'\\' => {
                    k += 1;
                    if k < len {
                        parts.push(RawPart::Text(self.input[last..=k].to_string()));
                        last = k + 1;
                    }
                }
                b'/' if bytes.get(k + 1) == Some(&b'*') => {
                    k += 1;
                    in_comment = true;
                }
                b'\'' | b'"' => match self.quoted_at(k) {
                    Some(q) => {
                        parts.push(RawPart::Text(self.input[last..k].to_string()));
                        let n = q.len();
                        parts.push(RawPart::Quoted(c as char, q));
                        k += n - 1;
                        last = k + 1;
                    }
                    None => {
                        self.i = k;
                        self.skip_whitespace(0);
                        return Err(c as char);
                    }
                },
                b'{' => block_stack.push(b'}'),
                b'(' => block_stack.push(b')'),
                b'[' => block_stack.push(b']'),
                b'}' | b')' | b']' => {
                    if let Some(expected) = block_stack.pop() {
                        if expected != c {
                            self.i = k;
                            self.skip_whitespace(0);
                            return Err(expected as char);
                        }
                    }
                }
                _ => {}
            }
            k += 1;
        }
        Ok(None)
    }

    pub fn end(&mut self) -> EndInfo {
        let is_finished = self.finished();
        let mut message = None;
        if self.i < self.furthest {
            message = self.furthest_message.clone();
            self.i = self.furthest;
        }
        EndInfo {
            is_finished,
            furthest: self.i,
            furthest_message: message,
            furthest_reached_end: self.i + 1 >= self.input.len(),
            furthest_char: self.current_char(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> ParserInput {
        ParserInput::new(text, Vec::new())
    }

    #[test]
    fn test_match_skips_whitespace_and_stores_comments() {
        let mut p = input("  foo /* c */ bar");
        let re = Regex::new(r"^[a-z]+").unwrap();
        assert_eq!(p.re_str(&re).as_deref(), Some("foo"));
        assert_eq!(p.comment_store.len(), 1);
        assert_eq!(p.comment_store[0].text, "/* c */");
        assert_eq!(p.re_str(&re).as_deref(), Some("bar"));
        assert!(p.finished());
    }

    #[test]
    fn test_restore_records_furthest_error() {
        let mut p = input("abc def");
        p.save();
        assert!(p.str("abc"));
        p.restore(Some("expected thing"));
        assert_eq!(p.i, 0);
        let end = p.end();
        assert!(!end.is_finished);
        assert_eq!(end.furthest, 4);
        assert_eq!(end.furthest_message.as_deref(), Some("expected thing"));
    }

    #[test]
    fn test_restored_comment_is_not_stored_twice() {
        let mut p = input("a /* x */ b");
        p.save();
        assert!(p.char('a'));
        p.restore(None);
        assert!(p.char('a'));
        assert_eq!(p.comment_store.len(), 1);
    }

    #[test]
    fn test_quoted_handles_escapes() {
        let mut p = input(r#""a\"b" rest"#);
        assert_eq!(p.quoted().as_deref(), Some(r#""a\"b""#));
        assert!(p.peek("rest"));
    }

    #[test]
    fn test_parse_until_respects_nesting() {
        let mut p = input("foo(a;b) 'x;y' ; tail");
        let parts = p.parse_until(&|c| c == ';').unwrap().unwrap();
        assert_eq!(
            parts,
            vec![
                RawPart::Text("foo(a;b) ".into()),
                RawPart::Quoted('\'', "'x;y'".into()),
                RawPart::Text(" ".into()),
            ]
        );
        assert!(p.peek(";"));
        let mut bad = input("(a]");
        assert_eq!(bad.parse_until(&|c| c == ';'), Err(')'));
    }
}
