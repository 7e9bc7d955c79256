//! Render parsed data back to ledger text.
//!
//! The output is a normal form: one space between fields, two-space posting
//! indentation, pushed tags and metadata flattened onto their entries.
//! Re-parsing rendered text yields the same entries, which the round-trip
//! tests rely on.

use std::fmt::Write;

use crate::syntax::ast::*;

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn write_amount(out: &mut String, amount: &Amount) {
    if let Some(number) = &amount.number {
        let _ = write!(out, " {}", number);
    }
    if let Some(currency) = &amount.currency {
        let _ = write!(out, " {}", currency);
    }
}

fn write_meta_value(out: &mut String, value: &MetaValue) {
    match value {
        MetaValue::Str(s) => out.push_str(&quote(s)),
        MetaValue::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        MetaValue::Date(d) => {
            let _ = write!(out, "{}", d);
        }
        MetaValue::Currency(c) => out.push_str(c),
        MetaValue::Account(a) => out.push_str(a),
        MetaValue::Amount(amount) => {
            let mut buf = String::new();
            write_amount(&mut buf, amount);
            out.push_str(buf.trim_start());
        }
        MetaValue::Bool(true) => out.push_str("TRUE"),
        MetaValue::Bool(false) => out.push_str("FALSE"),
        MetaValue::Null => out.push_str("NULL"),
    }
}

impl Data {
    /// Render the whole file in normal form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.options {
            let _ = writeln!(out, "option {} {}", quote(name), quote(value));
        }
        for plugin in &self.plugins {
            let _ = writeln!(out, "plugin {}", quote(plugin));
        }
        for import in &self.imports {
            let _ = writeln!(out, "include {}", quote(&import.path));
        }
        for entry in &self.entries {
            self.render_entry(&mut out, entry);
        }
        out
    }

    fn render_entry(&self, out: &mut String, entry: &Entry) {
        let _ = write!(out, "{}", entry.date);
        match &entry.payload {
            EntryPayload::Transaction(tx) => {
                let flag = tx
                    .flag
                    .map(|token| self.text(&token).to_string())
                    .unwrap_or_else(|| "txn".to_string());
                let _ = write!(out, " {}", flag);
                if let Some(payee) = &tx.payee {
                    let _ = write!(out, " {}", quote(payee));
                }
                if let Some(narration) = &tx.narration {
                    let _ = write!(out, " {}", quote(narration));
                }
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
                for posting in self.postings_of(tx) {
                    self.render_posting(out, posting);
                }
            }
            EntryPayload::Open(open) => {
                let _ = write!(out, " open {}", self.text(&open.account));
                if !open.currencies.is_empty() {
                    let _ = write!(out, " {}", open.currencies.join(","));
                }
                if let Some(booking) = open.booking {
                    let _ = write!(out, " {}", quote(booking.as_str()));
                }
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Close(close) => {
                let _ = write!(out, " close {}", self.text(&close.account));
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Commodity(commodity) => {
                let _ = write!(out, " commodity {}", commodity.currency);
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Pad(pad) => {
                let _ = write!(
                    out,
                    " pad {} {}",
                    self.text(&pad.account),
                    self.text(&pad.pad_to)
                );
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Balance(balance) => {
                let _ = write!(out, " balance {}", self.text(&balance.account));
                write_amount(out, &balance.amount);
                if let Some(tolerance) = &balance.tolerance {
                    let _ = write!(out, " ~ {}", tolerance);
                }
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Price(price) => {
                let _ = write!(out, " price {}", price.currency);
                write_amount(out, &price.amount);
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Event(event) => {
                let _ = write!(out, " event {} {}", quote(&event.name), quote(&event.value));
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Query(query) => {
                let _ = write!(out, " query {} {}", quote(&query.name), quote(&query.query));
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Note(note) => {
                let _ = write!(
                    out,
                    " note {} {}",
                    self.text(&note.account),
                    quote(&note.comment)
                );
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Document(document) => {
                let _ = write!(
                    out,
                    " document {} {}",
                    self.text(&document.account),
                    quote(&document.path)
                );
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
            EntryPayload::Custom(custom) => {
                let _ = write!(out, " custom {}", quote(&custom.name));
                for value in &custom.values {
                    out.push(' ');
                    write_meta_value(out, value);
                }
                self.render_tags_links(out, entry);
                out.push('\n');
                self.render_meta(out, &entry.meta, "  ");
            }
        }
    }

    fn render_tags_links(&self, out: &mut String, entry: &Entry) {
        for tag_link in self.tags_links_of(entry) {
            match tag_link {
                TagLink::Tag(token) => {
                    let _ = write!(out, " {}", self.text(token));
                }
                TagLink::Link(token) => {
                    let _ = write!(out, " {}", self.text(token));
                }
            }
        }
    }

    fn render_meta(&self, out: &mut String, range: &std::ops::Range<u32>, indent: &str) {
        for item in self.meta_of(range) {
            let _ = write!(out, "{}{}: ", indent, self.text(&item.key));
            write_meta_value(out, &item.value);
            out.push('\n');
        }
    }

    fn render_posting(&self, out: &mut String, posting: &Posting) {
        out.push_str("  ");
        if let Some(flag) = &posting.flag {
            let _ = write!(out, "{} ", self.text(flag));
        }
        out.push_str(self.text(&posting.account));
        write_amount(out, &posting.amount);
        if let Some(lot) = &posting.lot {
            out.push(' ');
            out.push_str(if lot.total { "{{" } else { "{" });
            let mut parts: Vec<String> = Vec::new();
            if !lot.cost.is_empty() {
                let mut buf = String::new();
                write_amount(&mut buf, &lot.cost);
                parts.push(buf.trim_start().to_string());
            }
            if let Some(date) = &lot.date {
                parts.push(date.to_string());
            }
            if let Some(label) = &lot.label {
                parts.push(quote(label));
            }
            out.push_str(&parts.join(", "));
            out.push_str(if lot.total { "}}" } else { "}" });
        }
        if let Some(price) = &posting.price {
            out.push_str(if price.total { " @@" } else { " @" });
            write_amount(out, &price.amount);
        }
        out.push('\n');
        self.render_meta(out, &posting.meta, "    ");
    }
}
