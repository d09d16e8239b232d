//! User-facing output for `lessc`: warnings, errors and diffs.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{render_error, LessError};

/// Prints each warning to stderr in yellow.
pub fn print_warnings(warnings: &[String]) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for warning in warnings {
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(stderr, "warning");
        let _ = stderr.reset();
        let _ = writeln!(stderr, ": {warning}");
    }
}

pub fn print_error(error: LessError) {
    eprintln!("{}", render_error(error));
}

/// A line diff of `expected` against `actual`, `-` for missing lines and
/// `+` for unexpected ones.
pub fn diff_text(expected: &str, actual: &str) -> String {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut out = String::new();
    for diff in &changeset.diffs {
        let (mark, text) = match diff {
            Difference::Same(x) => (' ', x),
            Difference::Add(x) => ('+', x),
            Difference::Rem(x) => ('-', x),
        };
        for line in text.lines() {
            out.push(mark);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_marks_changed_lines() {
        let diff = diff_text("a {\n  color: red;\n}", "a {\n  color: blue;\n}");
        assert!(diff.contains("-  color: red;"));
        assert!(diff.contains("+  color: blue;"));
        assert!(diff.contains(" a {"));
    }
}
