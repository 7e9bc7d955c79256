//! Streaming tokenizer for ledger source.
//!
//! The lexer walks raw UTF-8 bytes terminated by a NUL sentinel and emits
//! one token at a time. It never fails: bytes outside the grammar become
//! `Invalid` tokens and scanning resumes at the next whitespace boundary,
//! so a single typo surfaces as one diagnostic instead of poisoning the
//! rest of the file.
//!
//! The only lexer state besides the cursor is `at_line_start`, which flips
//! on every newline. Line starts are special in three ways: org-mode-style
//! comment lines (`*`, `:`, `#`, and the flag-like letters `!&?%PSTCURM`)
//! are skipped wholesale, leading whitespace becomes a single `Indent`
//! token, and a whitespace-only line produces no `Indent` at all.

use super::token::{Token, TokenKind, KEYWORDS};

/// Longest currency lexeme, in bytes.
const MAX_CURRENCY_LEN: usize = 24;

pub struct Lexer<'s> {
    src: &'s [u8],
    pos: usize,
    line: u32,
    col: u32,
    at_line_start: bool,
}

fn utf8_width(byte: u8) -> usize {
    match byte {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

fn is_tag_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'/' | b'.')
}

/// Characters allowed anywhere inside an account segment.
fn is_account_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte >= 0x80
}

/// Characters allowed to open an account segment after the first.
fn is_segment_start(byte: u8) -> bool {
    byte.is_ascii_uppercase() || byte.is_ascii_digit() || byte >= 0x80
}

/// Word characters scanned before deciding currency vs. invalid.
fn is_word_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'\'' | b'.' | b'_' | b'-')
}

fn is_valid_currency(word: &[u8]) -> bool {
    if word.len() > MAX_CURRENCY_LEN || word.is_empty() {
        return false;
    }
    if !word[0].is_ascii_uppercase() {
        return false;
    }
    let last = word[word.len() - 1];
    if !(last.is_ascii_uppercase() || last.is_ascii_digit()) {
        return false;
    }
    word.iter().all(|&b| {
        b.is_ascii_uppercase() || b.is_ascii_digit() || matches!(b, b'\'' | b'.' | b'_' | b'-')
    })
}

impl<'s> Lexer<'s> {
    /// Create a lexer over `src`, which must end with a NUL sentinel.
    pub fn new(src: &'s [u8]) -> Self {
        assert!(
            src.last() == Some(&0),
            "lexer input must carry a NUL sentinel"
        );
        Lexer {
            src,
            pos: 0,
            line: 0,
            col: 0,
            at_line_start: true,
        }
    }

    /// Tokenize an entire buffer, ending with an `Eof` token.
    pub fn tokenize(src: &'s [u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn peek(&self) -> u8 {
        self.src[self.pos]
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.src.get(self.pos + offset).unwrap_or(&0)
    }

    fn at_eof(&self) -> bool {
        self.pos + 1 >= self.src.len()
    }

    /// Advance one character. Newlines update the line counter but do not
    /// flip `at_line_start`; only the token loop does that.
    fn bump(&mut self) {
        let byte = self.src[self.pos];
        if byte == b'\n' {
            self.pos += 1;
            self.line += 1;
            self.col = 0;
            return;
        }
        let width = utf8_width(byte);
        self.pos += width;
        // Supplementary-plane characters take two UTF-16 code units.
        self.col += if width == 4 { 2 } else { 1 };
    }

    fn token(&self, kind: TokenKind, start: usize, line: u32, col_start: u32) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
            line,
            col_start,
            end_line: self.line,
            col_end: self.col,
        }
    }

    fn skip_to_eol(&mut self) {
        while self.peek() != b'\n' && !(self.peek() == 0 && self.at_eof()) {
            self.bump();
        }
    }

    /// Produce the next token. Never fails; the final token is `Eof`.
    pub fn next_token(&mut self) -> Token {
        loop {
            if self.at_line_start {
                self.at_line_start = false;
                let byte = self.peek();
                if matches!(
                    byte,
                    b'*' | b':' | b'#' | b'!' | b'&' | b'?' | b'%' | b'P' | b'S' | b'T' | b'C'
                        | b'U' | b'R' | b'M'
                ) {
                    // Org-mode titles, property drawers and flag-like prose.
                    self.skip_to_eol();
                    continue;
                }
                if byte == b' ' || byte == b'\t' {
                    let (start, line, col) = (self.pos, self.line, self.col);
                    while matches!(self.peek(), b' ' | b'\t' | b'\r') {
                        self.bump();
                    }
                    if self.peek() == b'\n' || (self.peek() == 0 && self.at_eof()) {
                        // Whitespace-only line: no indent token.
                        continue;
                    }
                    return self.token(TokenKind::Indent, start, line, col);
                }
            }

            let (start, line, col) = (self.pos, self.line, self.col);
            let byte = self.peek();
            match byte {
                0 if self.at_eof() => {
                    return self.token(TokenKind::Eof, start, line, col);
                }
                b'\n' => {
                    self.bump();
                    self.at_line_start = true;
                    let mut token = self.token(TokenKind::Eol, start, line, col);
                    token.end_line = line;
                    token.col_end = col + 1;
                    return token;
                }
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                    continue;
                }
                b';' => {
                    self.skip_to_eol();
                    continue;
                }
                b'"' => return self.lex_string(),
                b'0'..=b'9' => return self.lex_number_or_date(),
                b'a'..=b'z' => return self.lex_keyword_or_key(),
                _ if byte.is_ascii_uppercase() || byte >= 0x80 => return self.lex_word(),
                b'#' => {
                    self.bump();
                    if is_tag_char(self.peek()) {
                        while is_tag_char(self.peek()) {
                            self.bump();
                        }
                        return self.token(TokenKind::Tag, start, line, col);
                    }
                    return self.token(TokenKind::Hash, start, line, col);
                }
                b'^' => {
                    self.bump();
                    if is_tag_char(self.peek()) {
                        while is_tag_char(self.peek()) {
                            self.bump();
                        }
                        return self.token(TokenKind::Link, start, line, col);
                    }
                    return self.invalid_from(start, line, col);
                }
                b'@' => {
                    self.bump();
                    if self.peek() == b'@' {
                        self.bump();
                        return self.token(TokenKind::AtAt, start, line, col);
                    }
                    return self.token(TokenKind::At, start, line, col);
                }
                b'{' => {
                    self.bump();
                    if self.peek() == b'{' {
                        self.bump();
                        return self.token(TokenKind::LLBrace, start, line, col);
                    }
                    return self.token(TokenKind::LBrace, start, line, col);
                }
                b'}' => {
                    self.bump();
                    if self.peek() == b'}' {
                        self.bump();
                        return self.token(TokenKind::RRBrace, start, line, col);
                    }
                    return self.token(TokenKind::RBrace, start, line, col);
                }
                b'!' | b'&' | b'?' | b'%' => {
                    self.bump();
                    return self.token(TokenKind::Flag, start, line, col);
                }
                b'|' | b',' | b'~' | b'+' | b'-' | b'/' | b'(' | b')' | b'*' | b':' => {
                    self.bump();
                    let kind = match byte {
                        b'|' => TokenKind::Pipe,
                        b',' => TokenKind::Comma,
                        b'~' => TokenKind::Tilde,
                        b'+' => TokenKind::Plus,
                        b'-' => TokenKind::Minus,
                        b'/' => TokenKind::Slash,
                        b'(' => TokenKind::LParen,
                        b')' => TokenKind::RParen,
                        b'*' => TokenKind::Asterisk,
                        _ => TokenKind::Colon,
                    };
                    return self.token(kind, start, line, col);
                }
                _ => {
                    self.bump();
                    return self.invalid_from(start, line, col);
                }
            }
        }
    }

    /// Finish an `Invalid` token by skipping to the next whitespace boundary.
    fn invalid_from(&mut self, start: usize, line: u32, col: u32) -> Token {
        loop {
            let byte = self.peek();
            if matches!(byte, b' ' | b'\t' | b'\r' | b'\n') || (byte == 0 && self.at_eof()) {
                break;
            }
            self.bump();
        }
        self.token(TokenKind::Invalid, start, line, col)
    }

    /// Double-quoted string; a backslash escapes the single following byte;
    /// may span lines. Unterminated strings are invalid.
    fn lex_string(&mut self) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        self.bump();
        loop {
            let byte = self.peek();
            if byte == 0 && self.at_eof() {
                return self.token(TokenKind::Invalid, start, line, col);
            }
            if byte == b'\\' {
                self.bump();
                if !(self.peek() == 0 && self.at_eof()) {
                    self.bump();
                }
                continue;
            }
            if byte == b'"' {
                self.bump();
                return self.token(TokenKind::String, start, line, col);
            }
            self.bump();
        }
    }

    /// Numbers `[0-9][0-9,]*(\.[0-9]+)?` where `,` and `.` must be followed
    /// by a digit. An integer run of four or more digits meeting `-` or `/`
    /// switches into date mode and consumes `[0-9-/]*`.
    fn lex_number_or_date(&mut self) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        let mut digits = 0usize;
        let mut grouped = false;
        loop {
            let byte = self.peek();
            if byte.is_ascii_digit() {
                self.bump();
                digits += 1;
            } else if byte == b',' && self.peek_at(1).is_ascii_digit() {
                self.bump();
                grouped = true;
            } else {
                break;
            }
        }
        if digits >= 4 && !grouped && matches!(self.peek(), b'-' | b'/') {
            while matches!(self.peek(), b'0'..=b'9' | b'-' | b'/') {
                self.bump();
            }
            return self.token(TokenKind::Date, start, line, col);
        }
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            self.bump();
            while self.peek().is_ascii_digit() {
                self.bump();
            }
        }
        self.token(TokenKind::Number, start, line, col)
    }

    /// Lowercase identifiers: a metadata key when a `:` follows, otherwise
    /// a keyword from the fixed table.
    fn lex_keyword_or_key(&mut self) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        while self.peek().is_ascii_alphanumeric() || matches!(self.peek(), b'-' | b'_') {
            self.bump();
        }
        if self.peek() == b':' {
            return self.token(TokenKind::Key, start, line, col);
        }
        let word = &self.src[start..self.pos];
        match std::str::from_utf8(word).ok().and_then(|w| KEYWORDS.get(w)) {
            Some(&kind) => self.token(kind, start, line, col),
            None => self.invalid_from(start, line, col),
        }
    }

    /// Words opening with an uppercase letter or a non-ASCII code point:
    /// accounts when a colon-separated segment follows, otherwise currency
    /// candidates (with `TRUE`/`FALSE`/`NULL` retagged as literals).
    fn lex_word(&mut self) -> Token {
        if self.account_ahead() {
            return self.lex_account();
        }
        let (start, line, col) = (self.pos, self.line, self.col);
        while is_word_char(self.peek()) {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        match word {
            b"TRUE" => self.token(TokenKind::True, start, line, col),
            b"FALSE" => self.token(TokenKind::False, start, line, col),
            b"NULL" => self.token(TokenKind::Null, start, line, col),
            _ if is_valid_currency(word) => self.token(TokenKind::Currency, start, line, col),
            _ => self.invalid_from(start, line, col),
        }
    }

    /// Lookahead: does an account (first segment plus at least one valid
    /// `:`-separated continuation) begin here?
    fn account_ahead(&self) -> bool {
        let mut scan = self.pos;
        while scan < self.src.len() && is_account_char(self.src[scan]) {
            scan += 1;
        }
        scan > self.pos
            && scan + 1 < self.src.len()
            && self.src[scan] == b':'
            && is_segment_start(self.src[scan + 1])
    }

    fn lex_account(&mut self) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        loop {
            while is_account_char(self.peek()) {
                self.bump();
            }
            if self.peek() == b':' && is_segment_start(self.peek_at(1)) {
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Account, start, line, col)
    }
}
