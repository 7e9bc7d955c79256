//! Plain-text rendering of diagnostics with a source excerpt.
//!
//! The layout is one header line followed by the offending source line and
//! a caret underline:
//!
//! ```text
//! books/main.bean: [Error] transaction does not balance: 5 EUR left over
//! 2024-01-01 * "transfer"
//! ^^^^^^^^^^
//! ```

use std::path::Path;

use super::errors::{ErrorDetails, Severity};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

impl ErrorDetails {
    /// Render the diagnostic with its source excerpt. `cwd` shortens the
    /// path header; `color` switches ANSI escapes on.
    pub fn render(&self, cwd: &Path, color: bool) -> String {
        let label = match self.severity() {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        let (tint, reset) = if color {
            let tint = match self.severity() {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
            };
            (tint, RESET)
        } else {
            ("", "")
        };

        let mut out = format!(
            "{}: {}[{}]{} {}\n",
            self.uri.relative(cwd),
            tint,
            label,
            reset,
            self.message()
        );

        let (line, prefix_chars, token_chars) = self.excerpt();
        out.push_str(line);
        out.push('\n');
        for _ in 0..prefix_chars {
            out.push(' ');
        }
        if color {
            out.push_str(tint);
        }
        for _ in 0..token_chars.max(1) {
            out.push('^');
        }
        if color {
            out.push_str(reset);
        }
        out.push('\n');
        out
    }

    /// The source line holding the token, with the char counts before and
    /// inside the token for underline alignment. Line boundaries are found
    /// by scanning the raw bytes; a token never straddles a newline.
    fn excerpt(&self) -> (&str, usize, usize) {
        let source = self.source.as_slice();
        let start = self.token.start.min(source.len());
        let line_start = source[..start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let line_end = source[start..]
            .iter()
            .position(|&b| b == b'\n' || b == 0)
            .map(|p| start + p)
            .unwrap_or(source.len());
        debug_assert!(
            self.token.end <= line_end || self.token.kind == crate::syntax::token::TokenKind::String,
            "token straddles a newline"
        );

        let line = std::str::from_utf8(&source[line_start..line_end]).unwrap_or("");
        let prefix = std::str::from_utf8(&source[line_start..start])
            .map(|s| s.chars().count())
            .unwrap_or(0);
        let token_end = self.token.end.min(line_end);
        let width = std::str::from_utf8(&source[start..token_end])
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line, prefix, width)
    }

    /// 0-based (line, column) of the token start, computed by scanning the
    /// source for newlines.
    pub fn position(&self) -> (u32, u32) {
        let source = self.source.as_slice();
        let start = self.token.start.min(source.len());
        let line = source[..start].iter().filter(|&&b| b == b'\n').count() as u32;
        let line_start = source[..start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let col = std::str::from_utf8(&source[line_start..start])
            .map(|s| s.chars().count())
            .unwrap_or(0) as u32;
        (line, col)
    }
}
