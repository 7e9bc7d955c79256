//! Journal slices and the price table.
//!
//! Front-ends render an account's history as a journal: one row per
//! entry that touched the account's subtree, with the per-currency delta
//! and the running balance after it. Rows are owned values, detached from
//! the project's borrow, so a server can serialize them freely.
//!
//! The price table collects explicit `price` entries plus the `@`/`@@`
//! annotations observed on postings, and answers latest-rate lookups.

use std::collections::BTreeMap;

use crate::date::Date;
use crate::number::Decimal;
use crate::project::{Project, Uri};
use crate::syntax::ast::EntryPayload;

/// What produced a journal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalKind {
    Transaction,
    /// A pad-generated transaction, shown at the pad's date.
    Synthetic,
    /// A balance assertion checkpoint; its delta is empty.
    Balance,
}

/// One row of an account's journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalLine {
    pub date: Date,
    pub uri: Uri,
    pub kind: JournalKind,
    /// Transaction narration or balance description.
    pub description: String,
    /// Per-currency change to the account's subtree.
    pub deltas: BTreeMap<String, Decimal>,
    /// Per-currency subtree units after this row.
    pub running: BTreeMap<String, Decimal>,
}

/// Dated exchange rates keyed by (commodity, quote currency).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    rates: BTreeMap<(String, String), Vec<(Date, Decimal)>>,
}

impl PriceTable {
    fn insert(&mut self, commodity: &str, quote: &str, date: Date, rate: Decimal) {
        self.rates
            .entry((commodity.to_string(), quote.to_string()))
            .or_default()
            .push((date, rate));
    }

    fn sort(&mut self) {
        for series in self.rates.values_mut() {
            series.sort_by_key(|&(date, _)| date);
        }
    }

    /// The most recent rate on or before `at` (or the latest known rate
    /// when `at` is `None`).
    pub fn latest(&self, commodity: &str, quote: &str, at: Option<Date>) -> Option<Decimal> {
        let series = self
            .rates
            .get(&(commodity.to_string(), quote.to_string()))?;
        let mut found = None;
        for &(date, rate) in series {
            if at.map(|limit| date > limit).unwrap_or(false) {
                break;
            }
            found = Some(rate);
        }
        found
    }

    /// All (commodity, quote) pairs with at least one rate.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rates
            .keys()
            .map(|(commodity, quote)| (commodity.as_str(), quote.as_str()))
    }
}

/// Is `name` equal to `root` or inside its subtree?
fn in_subtree(name: &str, root: &str) -> bool {
    name == root
        || (name.len() > root.len()
            && name.starts_with(root)
            && name.as_bytes()[root.len()] == b':')
}

impl Project {
    /// The journal of an account's subtree, in global date order, with
    /// running per-currency unit totals. Pad-generated transactions show
    /// up at their pad's position.
    pub fn journal(&self, account: &str) -> Vec<JournalLine> {
        let mut lines = Vec::new();
        let mut running: BTreeMap<String, Decimal> = BTreeMap::new();

        let apply = |deltas: &BTreeMap<String, Decimal>,
                     running: &mut BTreeMap<String, Decimal>| {
            for (currency, delta) in deltas {
                let slot = running
                    .entry(currency.clone())
                    .or_insert_with(Decimal::zero);
                *slot = slot.add(delta);
            }
        };

        for handle in self.sorted_handles() {
            let (file_index, entry_index) = handle;
            let file = &self.files()[file_index];
            let data = &file.data;
            let entry = &data.entries[entry_index];
            match &entry.payload {
                EntryPayload::Transaction(tx) => {
                    let mut deltas: BTreeMap<String, Decimal> = BTreeMap::new();
                    for posting in data.postings_of(tx) {
                        let (Some(number), Some(currency)) =
                            (&posting.amount.number, &posting.amount.currency)
                        else {
                            continue;
                        };
                        if in_subtree(data.text(&posting.account), account) {
                            let slot = deltas
                                .entry(currency.clone())
                                .or_insert_with(Decimal::zero);
                            *slot = slot.add(number);
                        }
                    }
                    if deltas.is_empty() {
                        continue;
                    }
                    apply(&deltas, &mut running);
                    lines.push(JournalLine {
                        date: entry.date,
                        uri: file.uri.clone(),
                        kind: JournalKind::Transaction,
                        description: tx.narration.clone().unwrap_or_default(),
                        deltas,
                        running: running.clone(),
                    });
                }
                EntryPayload::Pad(_) => {
                    let Some(synthetic) = self.synthetic_for_pad(file_index, entry_index) else {
                        continue;
                    };
                    let mut deltas: BTreeMap<String, Decimal> = BTreeMap::new();
                    for posting in &synthetic.postings {
                        if in_subtree(&posting.account, account) {
                            let slot = deltas
                                .entry(posting.currency.clone())
                                .or_insert_with(Decimal::zero);
                            *slot = slot.add(&posting.number);
                        }
                    }
                    if deltas.is_empty() {
                        continue;
                    }
                    apply(&deltas, &mut running);
                    lines.push(JournalLine {
                        date: synthetic.date,
                        uri: file.uri.clone(),
                        kind: JournalKind::Synthetic,
                        description: "padding".to_string(),
                        deltas,
                        running: running.clone(),
                    });
                }
                EntryPayload::Balance(balance) => {
                    if !in_subtree(data.text(&balance.account), account) {
                        continue;
                    }
                    let description = match (&balance.amount.number, &balance.amount.currency) {
                        (Some(number), Some(currency)) => {
                            format!("balance {} {}", number, currency)
                        }
                        _ => "balance".to_string(),
                    };
                    lines.push(JournalLine {
                        date: entry.date,
                        uri: file.uri.clone(),
                        kind: JournalKind::Balance,
                        description,
                        deltas: BTreeMap::new(),
                        running: running.clone(),
                    });
                }
                _ => {}
            }
        }
        lines
    }

    /// Collect explicit `price` entries and posting price annotations into
    /// a lookup table.
    pub fn price_table(&self) -> PriceTable {
        let mut table = PriceTable::default();
        for handle in self.sorted_handles() {
            let (file_index, entry_index) = handle;
            let data = &self.files()[file_index].data;
            let entry = &data.entries[entry_index];
            match &entry.payload {
                EntryPayload::Price(price) => {
                    if let (Some(number), Some(quote)) =
                        (&price.amount.number, &price.amount.currency)
                    {
                        table.insert(&price.currency, quote, entry.date, *number);
                    }
                }
                EntryPayload::Transaction(tx) => {
                    for posting in data.postings_of(tx) {
                        let Some(annotation) = &posting.price else {
                            continue;
                        };
                        if annotation.total {
                            continue;
                        }
                        let (Some(commodity), Some(number), Some(quote)) = (
                            &posting.amount.currency,
                            &annotation.amount.number,
                            &annotation.amount.currency,
                        ) else {
                            continue;
                        };
                        table.insert(commodity, quote, entry.date, *number);
                    }
                }
                _ => {}
            }
        }
        table.sort();
        table
    }
}
