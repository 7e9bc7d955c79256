//! Parsed representation of one ledger file.
//!
//! A [`Data`] owns the source bytes of its file plus flat arenas for
//! postings, tag/link references and metadata. Entries index into those
//! arenas with contiguous ranges, so a transaction's postings are a slice
//! and rebuilding a file replaces everything at once. Tokens carry byte
//! offsets into the shared source buffer.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use crate::date::Date;
use crate::number::Decimal;
use crate::report::Diagnostic;
use crate::syntax::token::Token;

/// How reducing postings select lots on a booked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingMethod {
    Fifo,
    Lifo,
    Strict,
}

impl BookingMethod {
    /// Parse an `open` directive's booking string.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "FIFO" => Some(BookingMethod::Fifo),
            "LIFO" => Some(BookingMethod::Lifo),
            "STRICT" => Some(BookingMethod::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMethod::Fifo => "FIFO",
            BookingMethod::Lifo => "LIFO",
            BookingMethod::Strict => "STRICT",
        }
    }
}

/// A possibly-partial (number, currency) pair. Complete when both are set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Amount {
    pub number: Option<Decimal>,
    pub currency: Option<String>,
}

impl Amount {
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Amount {
            number: Some(number),
            currency: Some(currency.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.number.is_some() && self.currency.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.currency.is_none()
    }
}

/// Per-lot acquisition data attached to a posting: `{2.00 USD, 2024-01-01,
/// "batch"}`. A doubled brace (`{{..}}`) marks the cost as a total.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LotSpec {
    pub cost: Amount,
    pub date: Option<Date>,
    pub label: Option<String>,
    pub total: bool,
}

/// A price annotation: `@` per-unit or `@@` total.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAnnotation {
    pub amount: Amount,
    pub total: bool,
}

/// One leg of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub flag: Option<Token>,
    pub account: Token,
    pub amount: Amount,
    pub lot: Option<LotSpec>,
    pub price: Option<PriceAnnotation>,
    /// Range into [`Data::meta`].
    pub meta: Range<u32>,
}

/// A tag or link reference attached to an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TagLink {
    Tag(Token),
    Link(Token),
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Str(String),
    Number(Decimal),
    Date(Date),
    Currency(String),
    Account(String),
    Amount(Amount),
    Bool(bool),
    Null,
}

/// A `key: value` metadata line.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaItem {
    pub key: Token,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub flag: Option<Token>,
    pub payee: Option<String>,
    pub narration: Option<String>,
    /// Range into [`Data::postings`].
    pub postings: Range<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    pub account: Token,
    /// Currency whitelist; empty means unrestricted.
    pub currencies: Vec<String>,
    pub booking: Option<BookingMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    pub account: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commodity {
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub account: Token,
    pub pad_to: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub account: Token,
    pub amount: Amount,
    /// Explicit `~` tolerance, when given.
    pub tolerance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceDecl {
    pub currency: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDecl {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub account: Token,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub account: Token,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Custom {
    pub name: String,
    pub values: Vec<MetaValue>,
}

/// The dated statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPayload {
    Transaction(Transaction),
    Open(Open),
    Close(Close),
    Commodity(Commodity),
    Pad(Pad),
    Balance(Balance),
    Price(PriceDecl),
    Event(Event),
    Query(QueryDecl),
    Note(Note),
    Document(Document),
    Custom(Custom),
}

/// A dated ledger statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub date: Date,
    /// The date token that opened the entry.
    pub main_token: Token,
    pub payload: EntryPayload,
    /// Range into [`Data::tags_links`].
    pub tags_links: Range<u32>,
    /// Range into [`Data::meta`].
    pub meta: Range<u32>,
}

/// An `include` directive, with the unquoted path.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub token: Token,
    pub path: String,
}

/// Everything parsed out of a single file.
#[derive(Debug, Clone, Default)]
pub struct Data {
    /// Source bytes, NUL-terminated, shared with diagnostics.
    pub source: Arc<Vec<u8>>,
    pub entries: Vec<Entry>,
    pub postings: Vec<Posting>,
    pub tags_links: Vec<TagLink>,
    pub meta: Vec<MetaItem>,
    pub imports: Vec<Import>,
    /// `option` pairs; only recorded for the root file.
    pub options: Vec<(String, String)>,
    /// `plugin` names; only recorded for the root file.
    pub plugins: Vec<String>,
    /// Every currency lexeme that appeared in the file.
    pub currencies: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Data {
    /// A token's lexeme.
    pub fn text(&self, token: &Token) -> &str {
        token.text(&self.source)
    }

    /// The postings of a transaction.
    pub fn postings_of(&self, tx: &Transaction) -> &[Posting] {
        &self.postings[tx.postings.start as usize..tx.postings.end as usize]
    }

    /// Mutable postings of a transaction (the solver writes resolved
    /// amounts back through this).
    pub fn postings_of_mut(&mut self, postings: &Range<u32>) -> &mut [Posting] {
        &mut self.postings[postings.start as usize..postings.end as usize]
    }

    /// Tag and link references of an entry.
    pub fn tags_links_of(&self, entry: &Entry) -> &[TagLink] {
        &self.tags_links[entry.tags_links.start as usize..entry.tags_links.end as usize]
    }

    /// Metadata items in an arena range.
    pub fn meta_of(&self, range: &Range<u32>) -> &[MetaItem] {
        &self.meta[range.start as usize..range.end as usize]
    }

    /// True when any error-severity diagnostic was recorded.
    pub fn has_severe_diagnostics(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity() == crate::report::Severity::Error)
    }
}
