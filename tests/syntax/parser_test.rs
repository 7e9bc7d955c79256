//! Parser behavior over complete files.

use std::sync::Arc;

use indoc::indoc;
use tally::syntax::ast::EntryPayload;
use tally::syntax::parser::parse;
use tally::syntax::Data;

fn parse_str(source: &str) -> Data {
    let mut bytes = source.as_bytes().to_vec();
    bytes.push(0);
    parse(Arc::new(bytes), true)
}

#[test]
fn test_main_token_is_the_date_lexeme() {
    let data = parse_str(indoc! {r#"
        2024-06-01 open Assets:Cash
        2024/06/02 open Assets:Bank
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    assert_eq!(data.text(&data.entries[0].main_token), "2024-06-01");
    // The lexeme keeps its original separators even though both entries
    // parse to the same calendar type.
    assert_eq!(data.text(&data.entries[1].main_token), "2024/06/02");
    assert_eq!(data.entries[1].date, tally::Date::new(2024, 6, 2).unwrap());
}

#[test]
fn test_full_file_shape() {
    let data = parse_str(indoc! {r#"
        option "title" "Family books"
        plugin "auto_accounts"
        include "prices.bean"

        pushtag #family

        2024-01-01 open Assets:Cash USD
        2024-01-01 open Expenses:Food

        2024-01-05 * "Grocer" "weekly shop" ^receipt-17
          note: "paid cash"
          Expenses:Food 42.00 USD
          Assets:Cash

        2024-02-01 balance Assets:Cash -42.00 USD

        poptag #family
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    assert_eq!(data.entries.len(), 4);
    assert_eq!(data.options.len(), 1);
    assert_eq!(data.plugins, vec!["auto_accounts"]);
    assert_eq!(data.imports.len(), 1);
    assert!(data.currencies.contains("USD"));

    // Every entry parsed under the pushed tag carries it.
    for entry in &data.entries {
        let tags = data.tags_links_of(entry);
        assert!(
            tags.iter().any(|t| matches!(
                t,
                tally::syntax::ast::TagLink::Tag(token) if data.text(token) == "#family"
            )),
            "entry at {} lacks the pushed tag",
            entry.date
        );
    }
}

#[test]
fn test_recovery_is_local() {
    let data = parse_str(indoc! {r#"
        2024-01-01 open Assets:Cash
        2024-01-02 open open open
        2024-01-03 open Assets:Bank
        2024-01-04 ~ nonsense
        2024-01-05 open Assets:Other
    "#});
    // Two bad declarations, three good entries.
    let opened: Vec<&str> = data
        .entries
        .iter()
        .filter_map(|entry| match &entry.payload {
            EntryPayload::Open(open) => Some(data.text(&open.account)),
            _ => None,
        })
        .collect();
    assert_eq!(opened, vec!["Assets:Cash", "Assets:Bank", "Assets:Other"]);
    assert_eq!(data.diagnostics.len(), 2);
}

#[test]
fn test_posting_flags_and_prices() {
    let data = parse_str(indoc! {r#"
        2024-01-01 * "transfer"
          ! Assets:Checking -10.00 USD
          Assets:Wallet 9.00 USD
          Expenses:Fees 1.00 USD @ 1 USD
    "#});
    let entry = &data.entries[0];
    let tx = match &entry.payload {
        EntryPayload::Transaction(tx) => tx,
        other => panic!("expected transaction, got {other:?}"),
    };
    let postings = data.postings_of(tx);
    assert!(postings[0].flag.is_some());
    assert!(postings[1].flag.is_none());
    assert!(postings[2].price.is_some());
}
