//! Recursive-descent parser for ledger files.
//!
//! Single-token lookahead, no backtracking. Parsing functions either
//! consume tokens and produce a value, return `None` without consuming
//! anything, or push a diagnostic and bail with [`Recovered`]; the
//! declaration loop then skips to the end of the line and continues, so
//! one bad declaration never poisons the rest of the file.
//!
//! `pushtag`/`pushmeta` state lives in the parser and is attached to every
//! entry parsed while active; the stacks are scoped to a single file.

use std::ops::Range;
use std::sync::Arc;

use crate::date::Date;
use crate::number::Decimal;
use crate::report::{Diagnostic, ErrorKind};
use crate::syntax::ast::*;
use crate::syntax::lexer::Lexer;
use crate::syntax::token::{Token, TokenKind};

/// Marker for a parse failure that was already reported and recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered;

type PResult<T> = Result<T, Recovered>;

/// Parse one file's source (NUL-terminated) into [`Data`]. `is_root`
/// controls whether `option`/`plugin` directives are recorded.
pub fn parse(source: Arc<Vec<u8>>, is_root: bool) -> Data {
    let tokens = Lexer::tokenize(&source);
    let mut parser = Parser {
        tokens,
        pos: 0,
        data: Data {
            source,
            ..Data::default()
        },
        is_root,
        active_tags: Vec::new(),
        active_meta: Vec::new(),
    };
    parser.run();
    parser.data
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    data: Data,
    is_root: bool,
    /// `pushtag` tokens currently in effect.
    active_tags: Vec<Token>,
    /// `pushmeta` items currently in effect.
    active_meta: Vec<MetaItem>,
}

impl Parser {
    // ========================================================================
    // Token plumbing
    // ========================================================================

    fn current(&self) -> Token {
        self.tokens[self.pos]
    }

    fn ahead(&self) -> Token {
        self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn diag(&mut self, kind: ErrorKind, token: Token) {
        self.data.diagnostics.push(Diagnostic::new(kind, token));
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        match self.eat(kind) {
            Some(token) => Ok(token),
            None => {
                let current = self.current();
                self.diag(ErrorKind::ExpectedToken(kind), current);
                Err(Recovered)
            }
        }
    }

    /// Skip to and over the next end of line.
    fn recover_to_eol(&mut self) {
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn text(&self, token: &Token) -> String {
        token.text(&self.data.source).to_string()
    }

    /// A string token's content with the quotes stripped and backslash
    /// escapes reduced to the escaped byte.
    fn string_value(&self, token: &Token) -> String {
        let raw = token.text(&self.data.source);
        let inner = raw
            .strip_prefix('"')
            .map(|s| s.strip_suffix('"').unwrap_or(s))
            .unwrap_or(raw);
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    // ========================================================================
    // Declaration loop
    // ========================================================================

    fn run(&mut self) {
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.advance();
                }
                // Orphan indented lines between declarations are tolerated,
                // like blank indented lines inside an entry.
                TokenKind::Indent => self.recover_to_eol(),
                TokenKind::Date => {
                    let _ = self.parse_entry();
                }
                TokenKind::Pushtag
                | TokenKind::Poptag
                | TokenKind::Pushmeta
                | TokenKind::Popmeta
                | TokenKind::Option
                | TokenKind::Plugin
                | TokenKind::Include => {
                    if self.parse_directive().is_err() {
                        self.recover_to_eol();
                    }
                }
                _ => {
                    let current = self.current();
                    self.diag(ErrorKind::ExpectedDeclaration, current);
                    self.recover_to_eol();
                }
            }
        }
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn parse_directive(&mut self) -> PResult<()> {
        let keyword = self.advance();
        match keyword.kind {
            TokenKind::Pushtag => {
                let tag = self.expect(TokenKind::Tag)?;
                let name = self.text(&tag);
                if self.active_tags.iter().any(|t| self.text(t) == name) {
                    self.diag(ErrorKind::TagAlreadyPushed, tag);
                } else {
                    self.active_tags.push(tag);
                }
            }
            TokenKind::Poptag => {
                let tag = self.expect(TokenKind::Tag)?;
                let name = self.text(&tag);
                match self.active_tags.iter().position(|t| self.text(t) == name) {
                    Some(index) => {
                        self.active_tags.remove(index);
                    }
                    None => self.diag(ErrorKind::TagNotPushed, tag),
                }
            }
            TokenKind::Pushmeta => {
                let key = match self.eat(TokenKind::Key) {
                    Some(key) => key,
                    None => {
                        let current = self.current();
                        self.diag(ErrorKind::ExpectedKeyValue, current);
                        return Err(Recovered);
                    }
                };
                self.expect(TokenKind::Colon)?;
                let value = self.parse_value()?;
                let name = self.text(&key);
                if self.active_meta.iter().any(|m| self.text(&m.key) == name) {
                    self.diag(ErrorKind::MetaAlreadyPushed, key);
                } else {
                    self.active_meta.push(MetaItem { key, value });
                }
            }
            TokenKind::Popmeta => {
                let key = match self.eat(TokenKind::Key) {
                    Some(key) => key,
                    None => {
                        let current = self.current();
                        self.diag(ErrorKind::ExpectedKeyValue, current);
                        return Err(Recovered);
                    }
                };
                self.expect(TokenKind::Colon)?;
                let name = self.text(&key);
                match self
                    .active_meta
                    .iter()
                    .position(|m| self.text(&m.key) == name)
                {
                    Some(index) => {
                        self.active_meta.remove(index);
                    }
                    None => self.diag(ErrorKind::MetaNotPushed, key),
                }
            }
            TokenKind::Option => {
                let name = self.expect(TokenKind::String)?;
                let value = self.expect(TokenKind::String)?;
                if self.is_root {
                    let pair = (self.string_value(&name), self.string_value(&value));
                    self.data.options.push(pair);
                }
            }
            TokenKind::Plugin => {
                let name = self.expect(TokenKind::String)?;
                // Optional configuration string.
                let _config = self.eat(TokenKind::String);
                if self.is_root {
                    let name = self.string_value(&name);
                    self.data.plugins.push(name);
                }
            }
            TokenKind::Include => {
                let path = self.expect(TokenKind::String)?;
                let import = Import {
                    token: path,
                    path: self.string_value(&path),
                };
                self.data.imports.push(import);
            }
            _ => unreachable!("directive dispatch"),
        }
        self.expect_line_end()
    }

    /// Consume the end of the current line (or EOF).
    fn expect_line_end(&mut self) -> PResult<()> {
        if self.at(TokenKind::Eof) {
            return Ok(());
        }
        self.expect(TokenKind::Eol)?;
        Ok(())
    }

    // ========================================================================
    // Entries
    // ========================================================================

    fn parse_entry(&mut self) -> PResult<()> {
        let date_token = self.advance();
        let date = match Date::parse(date_token.text(&self.data.source)) {
            Ok(date) => date,
            Err(_) => {
                self.diag(ErrorKind::InvalidDate, date_token);
                self.recover_to_eol();
                return Err(Recovered);
            }
        };

        let payload = match self.parse_payload() {
            Ok(payload) => payload,
            Err(err) => {
                self.recover_to_eol();
                return Err(err);
            }
        };

        // Tags and links written by this entry, then the pushed set.
        let tags_links_start = self.data.tags_links.len() as u32;
        loop {
            if let Some(tag) = self.eat(TokenKind::Tag) {
                self.data.tags_links.push(TagLink::Tag(tag));
            } else if let Some(link) = self.eat(TokenKind::Link) {
                self.data.tags_links.push(TagLink::Link(link));
            } else {
                break;
            }
        }
        for tag in &self.active_tags {
            self.data.tags_links.push(TagLink::Tag(*tag));
        }
        let tags_links = tags_links_start..self.data.tags_links.len() as u32;

        if self.expect_line_end().is_err() {
            self.recover_to_eol();
            return Err(Recovered);
        }

        // Pushed metadata comes first so the entry's meta range stays
        // contiguous in the arena.
        let meta_start = self.data.meta.len() as u32;
        let pushed: Vec<MetaItem> = self.active_meta.clone();
        self.data.meta.extend(pushed);
        let mut entry_meta = meta_start..self.data.meta.len() as u32;

        let payload = match payload {
            PayloadDraft::Transaction(flag, payee, narration) => {
                let postings = self.parse_transaction_block(&mut entry_meta);
                EntryPayload::Transaction(Transaction {
                    flag,
                    payee,
                    narration,
                    postings,
                })
            }
            PayloadDraft::Other(payload) => {
                self.parse_meta_block(&mut entry_meta);
                payload
            }
        };

        self.data.entries.push(Entry {
            date,
            main_token: date_token,
            payload,
            tags_links,
            meta: entry_meta,
        });
        Ok(())
    }

    fn parse_payload(&mut self) -> PResult<PayloadDraft> {
        let token = self.current();
        match token.kind {
            TokenKind::Txn | TokenKind::Asterisk | TokenKind::Hash | TokenKind::Flag => {
                self.advance();
                if token.kind == TokenKind::Flag && token.text(&self.data.source) == "!" {
                    self.diag(ErrorKind::Flagged, token);
                }
                let first = self.eat(TokenKind::String);
                let second = self.eat(TokenKind::String);
                let (payee, narration) = match (first, second) {
                    (Some(payee), Some(narration)) => (
                        Some(self.string_value(&payee)),
                        Some(self.string_value(&narration)),
                    ),
                    (Some(narration), None) => (None, Some(self.string_value(&narration))),
                    _ => (None, None),
                };
                Ok(PayloadDraft::Transaction(Some(token), payee, narration))
            }
            TokenKind::Open => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                let mut currencies = Vec::new();
                while let Some(currency) = self.eat(TokenKind::Currency) {
                    let name = self.text(&currency);
                    self.data.currencies.insert(name.clone());
                    currencies.push(name);
                    if self.eat(TokenKind::Comma).is_none() && !self.at(TokenKind::Currency) {
                        break;
                    }
                }
                let booking = match self.eat(TokenKind::String) {
                    Some(token) => {
                        let name = self.string_value(&token);
                        match BookingMethod::parse(&name) {
                            Some(method) => Some(method),
                            None => {
                                self.diag(ErrorKind::InvalidBookingMethod, token);
                                None
                            }
                        }
                    }
                    None => None,
                };
                Ok(PayloadDraft::Other(EntryPayload::Open(Open {
                    account,
                    currencies,
                    booking,
                })))
            }
            TokenKind::Close => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                Ok(PayloadDraft::Other(EntryPayload::Close(Close { account })))
            }
            TokenKind::Commodity => {
                self.advance();
                let currency = self.expect(TokenKind::Currency)?;
                let name = self.text(&currency);
                self.data.currencies.insert(name.clone());
                Ok(PayloadDraft::Other(EntryPayload::Commodity(Commodity {
                    currency: name,
                })))
            }
            TokenKind::Pad => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                let pad_to = self.expect(TokenKind::Account)?;
                Ok(PayloadDraft::Other(EntryPayload::Pad(Pad {
                    account,
                    pad_to,
                })))
            }
            TokenKind::Balance => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                let number = match self.parse_number_expr()? {
                    Some(number) => number,
                    None => {
                        let current = self.current();
                        self.diag(ErrorKind::ExpectedAmount, current);
                        return Err(Recovered);
                    }
                };
                let currency = self.expect(TokenKind::Currency)?;
                let currency = self.text(&currency);
                self.data.currencies.insert(currency.clone());
                let tolerance = if self.eat(TokenKind::Tilde).is_some() {
                    match self.parse_number_expr()? {
                        Some(tolerance) => Some(tolerance),
                        None => {
                            let current = self.current();
                            self.diag(ErrorKind::ExpectedAmount, current);
                            return Err(Recovered);
                        }
                    }
                } else {
                    None
                };
                Ok(PayloadDraft::Other(EntryPayload::Balance(Balance {
                    account,
                    amount: Amount::new(number, currency),
                    tolerance,
                })))
            }
            TokenKind::Price => {
                self.advance();
                let currency = self.expect(TokenKind::Currency)?;
                let currency = self.text(&currency);
                self.data.currencies.insert(currency.clone());
                let amount = self.parse_amount()?;
                if !amount.is_complete() {
                    let current = self.current();
                    self.diag(ErrorKind::ExpectedAmount, current);
                    return Err(Recovered);
                }
                Ok(PayloadDraft::Other(EntryPayload::Price(PriceDecl {
                    currency,
                    amount,
                })))
            }
            TokenKind::Event => {
                self.advance();
                let name = self.expect(TokenKind::String)?;
                let value = self.expect(TokenKind::String)?;
                Ok(PayloadDraft::Other(EntryPayload::Event(Event {
                    name: self.string_value(&name),
                    value: self.string_value(&value),
                })))
            }
            TokenKind::Query => {
                self.advance();
                let name = self.expect(TokenKind::String)?;
                let query = self.expect(TokenKind::String)?;
                Ok(PayloadDraft::Other(EntryPayload::Query(QueryDecl {
                    name: self.string_value(&name),
                    query: self.string_value(&query),
                })))
            }
            TokenKind::Note => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                let comment = self.expect(TokenKind::String)?;
                Ok(PayloadDraft::Other(EntryPayload::Note(Note {
                    account,
                    comment: self.string_value(&comment),
                })))
            }
            TokenKind::Document => {
                self.advance();
                let account = self.expect(TokenKind::Account)?;
                let path = self.expect(TokenKind::String)?;
                Ok(PayloadDraft::Other(EntryPayload::Document(Document {
                    account,
                    path: self.string_value(&path),
                })))
            }
            TokenKind::Custom => {
                self.advance();
                let name = self.expect(TokenKind::String)?;
                let mut values = Vec::new();
                while !matches!(
                    self.current().kind,
                    TokenKind::Eol | TokenKind::Eof | TokenKind::Tag | TokenKind::Link
                ) {
                    values.push(self.parse_value()?);
                }
                Ok(PayloadDraft::Other(EntryPayload::Custom(Custom {
                    name: self.string_value(&name),
                    values,
                })))
            }
            _ => {
                self.diag(ErrorKind::ExpectedEntry, token);
                Err(Recovered)
            }
        }
    }

    // ========================================================================
    // Indented blocks
    // ========================================================================

    /// Metadata lines under a non-transaction entry.
    fn parse_meta_block(&mut self, entry_meta: &mut Range<u32>) {
        while self.at(TokenKind::Indent) {
            match self.ahead().kind {
                TokenKind::Eol => {
                    self.advance();
                    self.advance();
                }
                TokenKind::Key => {
                    self.advance();
                    match self.parse_key_value() {
                        Ok(item) => {
                            self.data.meta.push(item);
                            entry_meta.end = self.data.meta.len() as u32;
                        }
                        Err(_) => self.recover_to_eol(),
                    }
                }
                _ => break,
            }
        }
    }

    /// Metadata and postings under a transaction. Key lines before the
    /// first posting belong to the entry, afterwards to the last posting.
    fn parse_transaction_block(&mut self, entry_meta: &mut Range<u32>) -> Range<u32> {
        let postings_start = self.data.postings.len() as u32;
        let mut has_posting = false;
        while self.at(TokenKind::Indent) {
            match self.ahead().kind {
                TokenKind::Eol => {
                    self.advance();
                    self.advance();
                }
                TokenKind::Key => {
                    self.advance();
                    match self.parse_key_value() {
                        Ok(item) => {
                            self.data.meta.push(item);
                            let end = self.data.meta.len() as u32;
                            if has_posting {
                                self.data
                                    .postings
                                    .last_mut()
                                    .expect("posting precedes its metadata")
                                    .meta
                                    .end = end;
                            } else {
                                entry_meta.end = end;
                            }
                        }
                        Err(_) => self.recover_to_eol(),
                    }
                }
                _ => {
                    self.advance();
                    match self.parse_posting() {
                        Ok(posting) => {
                            self.data.postings.push(posting);
                            has_posting = true;
                        }
                        Err(_) => self.recover_to_eol(),
                    }
                }
            }
        }
        postings_start..self.data.postings.len() as u32
    }

    fn parse_key_value(&mut self) -> PResult<MetaItem> {
        let key = self.expect(TokenKind::Key)?;
        self.expect(TokenKind::Colon)?;
        let value = self.parse_value()?;
        self.expect_line_end()?;
        Ok(MetaItem { key, value })
    }

    fn parse_value(&mut self) -> PResult<MetaValue> {
        let token = self.current();
        match token.kind {
            TokenKind::String => {
                self.advance();
                Ok(MetaValue::Str(self.string_value(&token)))
            }
            TokenKind::Date => {
                self.advance();
                match Date::parse(token.text(&self.data.source)) {
                    Ok(date) => Ok(MetaValue::Date(date)),
                    Err(_) => {
                        self.diag(ErrorKind::InvalidDate, token);
                        Err(Recovered)
                    }
                }
            }
            TokenKind::Account => {
                self.advance();
                Ok(MetaValue::Account(self.text(&token)))
            }
            TokenKind::True => {
                self.advance();
                Ok(MetaValue::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(MetaValue::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(MetaValue::Null)
            }
            TokenKind::Currency => {
                self.advance();
                let name = self.text(&token);
                self.data.currencies.insert(name.clone());
                Ok(MetaValue::Currency(name))
            }
            TokenKind::Minus | TokenKind::Plus | TokenKind::Number => {
                let number = self
                    .parse_number_expr()?
                    .expect("dispatch guarantees a number expression");
                match self.eat(TokenKind::Currency) {
                    Some(currency) => {
                        let name = self.text(&currency);
                        self.data.currencies.insert(name.clone());
                        Ok(MetaValue::Amount(Amount::new(number, name)))
                    }
                    None => Ok(MetaValue::Number(number)),
                }
            }
            _ => {
                self.diag(ErrorKind::ExpectedValue, token);
                Err(Recovered)
            }
        }
    }

    // ========================================================================
    // Postings
    // ========================================================================

    fn parse_posting(&mut self) -> PResult<Posting> {
        let flag = match self.current().kind {
            TokenKind::Flag | TokenKind::Asterisk | TokenKind::Hash => {
                let token = self.advance();
                if token.kind == TokenKind::Flag && token.text(&self.data.source) == "!" {
                    self.diag(ErrorKind::Flagged, token);
                }
                Some(token)
            }
            _ => None,
        };
        let account = self.expect(TokenKind::Account)?;
        let amount = self.parse_amount()?;

        let mut lot = None;
        if self.at(TokenKind::LBrace) || self.at(TokenKind::LLBrace) {
            lot = Some(self.parse_lot_spec()?);
        }

        let mut price = None;
        if self.at(TokenKind::At) || self.at(TokenKind::AtAt) {
            let marker = self.advance();
            let amount = self.parse_amount()?;
            price = Some(PriceAnnotation {
                amount,
                total: marker.kind == TokenKind::AtAt,
            });
        }

        self.expect_line_end()?;
        let meta_end = self.data.meta.len() as u32;
        Ok(Posting {
            flag,
            account,
            amount,
            lot,
            price,
            meta: meta_end..meta_end,
        })
    }

    /// An optional signed number.
    fn parse_number_expr(&mut self) -> PResult<Option<Decimal>> {
        let mut signed = false;
        let mut negative = false;
        if self.eat(TokenKind::Minus).is_some() {
            signed = true;
            negative = true;
        } else if self.eat(TokenKind::Plus).is_some() {
            signed = true;
        }
        match self.eat(TokenKind::Number) {
            Some(token) => match Decimal::parse(token.text(&self.data.source)) {
                Ok(number) => Ok(Some(if negative { number.neg() } else { number })),
                Err(_) => {
                    self.diag(ErrorKind::InvalidNumber, token);
                    Err(Recovered)
                }
            },
            None if signed => {
                let current = self.current();
                self.diag(ErrorKind::ExpectedToken(TokenKind::Number), current);
                Err(Recovered)
            }
            None => Ok(None),
        }
    }

    /// An amount with optional number and optional currency; either side
    /// may be missing and is then left for the solver to fill in.
    fn parse_amount(&mut self) -> PResult<Amount> {
        let number = self.parse_number_expr()?;
        let currency = self.eat(TokenKind::Currency).map(|token| {
            let name = self.text(&token);
            self.data.currencies.insert(name.clone());
            name
        });
        Ok(Amount { number, currency })
    }

    /// `{..}` or `{{..}}` with amount, date and label components in any
    /// order, separated by commas.
    fn parse_lot_spec(&mut self) -> PResult<LotSpec> {
        let opener = self.advance();
        let total = opener.kind == TokenKind::LLBrace;
        let closing = if total {
            TokenKind::RRBrace
        } else {
            TokenKind::RBrace
        };
        let mut lot = LotSpec {
            total,
            ..LotSpec::default()
        };
        loop {
            let token = self.current();
            match token.kind {
                kind if kind == closing => break,
                TokenKind::Date => {
                    self.advance();
                    let date = match Date::parse(token.text(&self.data.source)) {
                        Ok(date) => date,
                        Err(_) => {
                            self.diag(ErrorKind::InvalidDate, token);
                            return Err(Recovered);
                        }
                    };
                    if lot.date.replace(date).is_some() {
                        self.diag(ErrorKind::DuplicateLotSpec, token);
                    }
                }
                TokenKind::String => {
                    self.advance();
                    let label = self.string_value(&token);
                    if lot.label.replace(label).is_some() {
                        self.diag(ErrorKind::DuplicateLotSpec, token);
                    }
                }
                TokenKind::Minus | TokenKind::Plus | TokenKind::Number | TokenKind::Currency => {
                    let amount = self.parse_amount()?;
                    if !lot.cost.is_empty() {
                        self.diag(ErrorKind::DuplicateLotSpec, token);
                    }
                    lot.cost = amount;
                }
                _ => {
                    self.diag(ErrorKind::ExpectedValue, token);
                    return Err(Recovered);
                }
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(closing)?;
        Ok(lot)
    }
}

/// Half-built payload: transactions defer their posting block.
enum PayloadDraft {
    Transaction(Option<Token>, Option<String>, Option<String>),
    Other(EntryPayload),
}
