//! Splits source text into coarse segments at top-level `;` and `}`.
//!
//! Chunking is optional (see `LessOptions::chunk_input`). It validates
//! brace, paren, string and comment balance on the way, so malformed input
//! fails here with a precise position.

use std::ops::Range;

use crate::diagnostics::LessResult;
use crate::err_at;
use crate::tree::{FileRef, SourcePos};

/// Segments shorter than this are merged into the next one.
const MIN_CHUNK: usize = 512;

pub fn chunk(input: &str, file: Option<&FileRef>) -> LessResult<Vec<Range<usize>>> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let fail = |msg: &str, index: usize| err_at!(Parse, &SourcePos::new(index, file.cloned()), msg);

    let mut chunks = Vec::new();
    let mut emit_from = 0;
    let mut level = 0i64;
    let mut paren_level = 0i64;
    let mut last_opening = 0;
    let mut last_opening_paren = 0;
    let mut last_multi_comment: Option<usize> = None;
    let mut last_multi_comment_end_brace: Option<usize> = None;

    let mut emit = |chunks: &mut Vec<Range<usize>>, at: usize, force: bool| {
        let size = at.saturating_sub(emit_from);
        if (size < MIN_CHUNK && !force) || size == 0 {
            return;
        }
        let end = (at + 1).min(len);
        chunks.push(emit_from..end);
        emit_from = end;
    };

    let mut i = 0;
    while i < len {
        let c = bytes[i];
        if c.is_ascii_lowercase() || c < b'"' {
            i += 1;
            continue;
        }
        match c {
            b'(' => {
                paren_level += 1;
                last_opening_paren = i;
            }
            b')' => {
                paren_level -= 1;
                if paren_level < 0 {
                    return Err(fail("missing opening `(`", i));
                }
            }
            b';' => {
                if paren_level == 0 {
                    emit(&mut chunks, i, false);
                }
            }
            b'{' => {
                level += 1;
                last_opening = i;
            }
            b'}' => {
                level -= 1;
                if level < 0 {
                    return Err(fail("missing opening `{`", i));
                }
                if level == 0 && paren_level == 0 {
                    emit(&mut chunks, i, false);
                }
            }
            b'\\' => {
                if i < len - 1 {
                    i += 2;
                    continue;
                }
                return Err(fail("unescaped `\\`", i));
            }
            b'"' | b'\'' | b'`' => {
                let start = i;
                let mut matched = false;
                i += 1;
                while i < len {
                    let c2 = bytes[i];
                    if c2 > 96 {
                        i += 1;
                        continue;
                    }
                    if c2 == c {
                        matched = true;
                        break;
                    }
                    if c2 == b'\\' {
                        if i == len - 1 {
                            return Err(fail("unescaped `\\`", i));
                        }
                        i += 1;
                    }
                    i += 1;
                }
                if !matched {
                    return Err(fail(&format!("unmatched `{}`", c as char), start));
                }
            }
            b'/' => {
                if paren_level == 0 && i != len - 1 {
                    match bytes[i + 1] {
                        b'/' => {
                            i += 2;
                            while i < len && bytes[i] != b'\n' && bytes[i] != b'\r' {
                                i += 1;
                            }
                        }
                        b'*' => {
                            let start = i;
                            last_multi_comment = Some(start);
                            i += 2;
                            while i < len - 1 {
                                if bytes[i] == b'}' {
                                    last_multi_comment_end_brace = Some(i);
                                }
                                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                                    break;
                                }
                                i += 1;
                            }
                            if i >= len - 1 {
                                return Err(fail("missing closing `*/`", start));
                            }
                            i += 1;
                        }
                        _ => {}
                    }
                }
            }
            b'*' => {
                if i < len - 1 && bytes[i + 1] == b'/' {
                    return Err(fail("unmatched `/*`", i));
                }
            }
            _ => {}
        }
        i += 1;
    }

    if level != 0 {
        let comment_hides_brace = matches!(
            (last_multi_comment, last_multi_comment_end_brace),
            (Some(c), Some(b)) if c > last_opening && b > c
        );
        let msg = if comment_hides_brace {
            "missing closing `}` or `*/`"
        } else {
            "missing closing `}`"
        };
        return Err(fail(msg, last_opening));
    }
    if paren_level != 0 {
        return Err(fail("missing closing `)`", last_opening_paren));
    }

    emit(&mut chunks, len, true);
    if chunks.is_empty() {
        chunks.push(0..len);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(input: &str) -> String {
        chunk(input, None).unwrap_err().message().to_string()
    }

    #[test]
    fn test_small_input_is_one_chunk() {
        let input = ".a { color: red; }\n.b { color: blue; }";
        assert_eq!(chunk(input, None).unwrap(), vec![0..input.len()]);
    }

    #[test]
    fn test_large_input_splits_at_top_level() {
        let rule = ".a { color: red; }\n";
        let input = rule.repeat(60);
        let chunks = chunk(&input, None).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.last().map(|c| c.end), Some(input.len()));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_eq!(&input[pair[0].end - 1..pair[0].end], "}");
        }
    }

    #[test]
    fn test_balance_errors() {
        assert_eq!(message(".a { color: red; "), "missing closing `}`");
        assert_eq!(message(".a } "), "missing opening `{`");
        assert_eq!(message("a(b"), "missing closing `)`");
        assert_eq!(message("a)"), "missing opening `(`");
        assert_eq!(message(".a { content: \"x; }"), "unmatched `\"`");
        assert_eq!(message("/* open"), "missing closing `*/`");
        assert_eq!(message(".a { /* } */"), "missing closing `}` or `*/`");
    }

    #[test]
    fn test_strings_and_comments_hide_delimiters() {
        assert!(chunk(".a { content: \"}\"; }", None).is_ok());
        assert!(chunk("// { \n.a {}", None).is_ok());
        assert!(chunk(".a { /* { */ }", None).is_ok());
    }
}
