//! Rendering round-trips: normal-form output re-parses to the same data.

use std::sync::Arc;

use indoc::indoc;
use tally::syntax::parser::parse;
use tally::syntax::Data;

fn parse_str(source: &str) -> Data {
    let mut bytes = source.as_bytes().to_vec();
    bytes.push(0);
    parse(Arc::new(bytes), true)
}

const FIXTURE: &str = indoc! {r#"
    option "title" "Round trip"
    plugin "noop"
    include "other.bean"

    pushtag #y2024

    2024-01-01 open Assets:Bank:Checking USD,EUR "STRICT"
    2024-01-01 open Assets:Broker AAPL "FIFO"
    2024-01-01 open Expenses:Food
    2024-01-01 commodity USD
      name: "US Dollar"

    2024-01-05 * "Grocer" "weekly shop" ^receipt-1
      invoice: "INV-1"
      Assets:Bank:Checking -42.00 USD
        channel: "card"
      Expenses:Food 42.00 USD

    2024-01-10 ! "needs review"
      Assets:Bank:Checking -10.00 USD
      Expenses:Food 10.00 USD

    2024-02-01 * "buy stock"
      Assets:Broker 2 AAPL {180.00 USD, 2024-02-01, "feb"} @ 181.00 USD
      Assets:Bank:Checking -362.00 USD

    2024-03-01 balance Assets:Bank:Checking -414.00 USD ~ 0.01
    2024-03-02 price AAPL 185.00 USD
    2024-03-03 event "location" "home"
    2024-03-04 query "food" "SELECT account"
    2024-03-05 note Assets:Bank:Checking "rate changed"
    2024-03-06 document Assets:Bank:Checking "statement.pdf"
    2024-03-07 custom "budget" "monthly" 450.00 USD TRUE

    poptag #y2024
"#};

#[test]
fn test_fixture_parses_clean_except_flag_warning() {
    let data = parse_str(FIXTURE);
    // The `!` transaction produces exactly one warning, nothing else.
    assert_eq!(data.diagnostics.len(), 1);
    assert!(!data.has_severe_diagnostics());
    assert_eq!(data.entries.len(), 14);
}

#[test]
fn test_render_parse_render_is_identity() {
    let first = parse_str(FIXTURE);
    let rendered = first.render();
    let second = parse_str(&rendered);
    assert!(
        !second.has_severe_diagnostics(),
        "{:?}",
        second.diagnostics
    );
    assert_eq!(first.entries.len(), second.entries.len());
    assert_eq!(rendered, second.render());
}

#[test]
fn test_render_preserves_payload_counts() {
    let first = parse_str(FIXTURE);
    let second = parse_str(&first.render());
    assert_eq!(first.options, second.options);
    assert_eq!(first.plugins, second.plugins);
    assert_eq!(
        first.imports.iter().map(|i| &i.path).collect::<Vec<_>>(),
        second.imports.iter().map(|i| &i.path).collect::<Vec<_>>()
    );
    assert_eq!(first.postings.len(), second.postings.len());
    assert_eq!(first.meta.len(), second.meta.len());
    assert_eq!(first.currencies, second.currencies);
}
