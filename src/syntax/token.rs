//! Token types produced by the lexer.
//!
//! Tokens are index-based: they carry byte offsets into their file's source
//! buffer instead of borrowed slices, so the buffer can be shared between
//! the parsed data and the diagnostics without lifetime plumbing. Columns
//! are counted in UTF-16 code units, matching the LSP convention.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ========================================================================
    // Literals
    // ========================================================================
    /// A date: `2024-06-01` (also accepts `/` separators).
    Date,
    /// A decimal number, possibly with `,` thousands separators.
    Number,
    /// A double-quoted string, possibly spanning lines.
    String,
    /// A `:`-separated account path: `Assets:Bank:Checking`.
    Account,
    /// An uppercase commodity code: `USD`, `AAPL`.
    Currency,
    /// A single-character flag such as `!`.
    Flag,
    /// A lowercase metadata key (the trailing `:` is its own token).
    Key,
    /// A `^link-name`.
    Link,
    /// A `#tag-name`.
    Tag,

    // ========================================================================
    // Structure
    // ========================================================================
    /// End of line.
    Eol,
    /// Leading whitespace on a non-blank line.
    Indent,
    /// End of input.
    Eof,
    /// A byte sequence outside the grammar.
    Invalid,

    // ========================================================================
    // Punctuation
    // ========================================================================
    Pipe,
    At,
    AtAt,
    LBrace,
    RBrace,
    LLBrace,
    RRBrace,
    Comma,
    Tilde,
    Plus,
    Minus,
    Slash,
    LParen,
    RParen,
    Hash,
    Asterisk,
    Colon,

    // ========================================================================
    // Keywords
    // ========================================================================
    Txn,
    Balance,
    Open,
    Close,
    Commodity,
    Pad,
    Event,
    Query,
    Custom,
    Price,
    Note,
    Document,
    Pushtag,
    Poptag,
    Pushmeta,
    Popmeta,
    Option,
    Plugin,
    Include,

    // ========================================================================
    // Boolean / null literals
    // ========================================================================
    True,
    False,
    Null,
}

/// The fixed lowercase keyword table.
pub static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    HashMap::from([
        ("txn", TokenKind::Txn),
        ("balance", TokenKind::Balance),
        ("open", TokenKind::Open),
        ("close", TokenKind::Close),
        ("commodity", TokenKind::Commodity),
        ("pad", TokenKind::Pad),
        ("event", TokenKind::Event),
        ("query", TokenKind::Query),
        ("custom", TokenKind::Custom),
        ("price", TokenKind::Price),
        ("note", TokenKind::Note),
        ("document", TokenKind::Document),
        ("pushtag", TokenKind::Pushtag),
        ("poptag", TokenKind::Poptag),
        ("pushmeta", TokenKind::Pushmeta),
        ("popmeta", TokenKind::Popmeta),
        ("option", TokenKind::Option),
        ("plugin", TokenKind::Plugin),
        ("include", TokenKind::Include),
    ])
});

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Date => "date",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Account => "account",
            TokenKind::Currency => "currency",
            TokenKind::Flag => "flag",
            TokenKind::Key => "key",
            TokenKind::Link => "link",
            TokenKind::Tag => "tag",
            TokenKind::Eol => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Eof => "end of file",
            TokenKind::Invalid => "invalid token",
            TokenKind::Pipe => "'|'",
            TokenKind::At => "'@'",
            TokenKind::AtAt => "'@@'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LLBrace => "'{{'",
            TokenKind::RRBrace => "'}}'",
            TokenKind::Comma => "','",
            TokenKind::Tilde => "'~'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Slash => "'/'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Hash => "'#'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Colon => "':'",
            TokenKind::Txn => "txn",
            TokenKind::Balance => "balance",
            TokenKind::Open => "open",
            TokenKind::Close => "close",
            TokenKind::Commodity => "commodity",
            TokenKind::Pad => "pad",
            TokenKind::Event => "event",
            TokenKind::Query => "query",
            TokenKind::Custom => "custom",
            TokenKind::Price => "price",
            TokenKind::Note => "note",
            TokenKind::Document => "document",
            TokenKind::Pushtag => "pushtag",
            TokenKind::Poptag => "poptag",
            TokenKind::Pushmeta => "pushmeta",
            TokenKind::Popmeta => "popmeta",
            TokenKind::Option => "option",
            TokenKind::Plugin => "plugin",
            TokenKind::Include => "include",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Null => "NULL",
        };
        f.write_str(name)
    }
}

/// A lexed token: kind plus byte span and line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first byte in the source buffer.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    /// 0-based line of the first byte.
    pub line: u32,
    /// 0-based start column in UTF-16 code units.
    pub col_start: u32,
    /// 0-based line of the last byte (strings may span lines).
    pub end_line: u32,
    /// 0-based end column in UTF-16 code units.
    pub col_end: u32,
}

impl Token {
    /// The lexeme, sliced out of the owning file's source buffer.
    pub fn text<'a>(&self, source: &'a [u8]) -> &'a str {
        std::str::from_utf8(&source[self.start..self.end]).unwrap_or("")
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
