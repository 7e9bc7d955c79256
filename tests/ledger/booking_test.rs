//! Lot booking exercised through a full project load.

use indoc::indoc;
use tally::report::ErrorKind;
use tally::{Decimal, Project};

fn project_from(source: &str) -> Project {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.bean");
    std::fs::write(&path, source).unwrap();
    Project::load(path).unwrap()
}

fn dec(text: &str) -> Decimal {
    Decimal::parse(text).unwrap()
}

#[test]
fn test_fifo_sale_keeps_late_lots() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Broker AAPL "FIFO"
        2024-01-01 open Assets:Cash USD
        2024-01-01 open Income:Gains USD

        2024-01-10 * "buy cheap"
          Assets:Broker 10 AAPL {2.00 USD}
          Assets:Cash -20.00 USD

        2024-02-10 * "buy dear"
          Assets:Broker 10 AAPL {3.00 USD}
          Assets:Cash -30.00 USD

        2024-03-10 * "sell most"
          Assets:Broker -15 AAPL {} @ 4.00 USD
          Assets:Cash 60.00 USD
          Income:Gains

        2024-04-01 balance Assets:Broker 5 AAPL
    "#});
    let kinds: Vec<_> = project
        .collect_errors()
        .values()
        .flatten()
        .map(|d| d.kind.clone())
        .collect();
    // Two purchase warnings about prices inferred from cost; nothing else.
    assert_eq!(
        kinds,
        vec![ErrorKind::InferredPrice, ErrorKind::InferredPrice]
    );
    assert!(!project.has_errors());

    let summary = project
        .tree()
        .inventory_aggregated_by_account("Assets:Broker");
    assert_eq!(summary.units("AAPL"), dec("5"));
    // FIFO consumed the whole 2.00 lot and a third of the 3.00 lot.
    assert_eq!(summary.positions["AAPL"].cost["USD"], dec("15.00"));
}

#[test]
fn test_strict_requires_disambiguation() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Broker AAPL "STRICT"
        2024-01-01 open Assets:Cash USD
        2024-01-01 open Income:Gains USD

        2024-01-10 * "buy"
          Assets:Broker 10 AAPL {2.00 USD}
          Assets:Cash -20.00 USD

        2024-02-10 * "buy again"
          Assets:Broker 10 AAPL {3.00 USD}
          Assets:Cash -30.00 USD

        2024-03-10 * "partial sale without a selector"
          Assets:Broker -5 AAPL {} @ 4.00 USD
          Assets:Cash 20.00 USD
          Income:Gains
    "#});
    let kinds: Vec<_> = project
        .collect_errors()
        .values()
        .flatten()
        .map(|d| d.kind.clone())
        .collect();
    assert!(kinds.contains(&ErrorKind::AmbiguousStrictBooking), "{kinds:?}");
}

#[test]
fn test_strict_selector_sale() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Broker AAPL "STRICT"
        2024-01-01 open Assets:Cash USD
        2024-01-01 open Income:Gains USD

        2024-01-10 * "buy"
          Assets:Broker 10 AAPL {2.00 USD}
          Assets:Cash -20.00 USD

        2024-02-10 * "buy again"
          Assets:Broker 10 AAPL {3.00 USD}
          Assets:Cash -30.00 USD

        2024-03-10 * "sell the dear lot"
          Assets:Broker -10 AAPL {3.00 USD} @ 4.00 USD
          Assets:Cash 40.00 USD
          Income:Gains
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
    let summary = project
        .tree()
        .inventory_aggregated_by_account("Assets:Broker");
    assert_eq!(summary.units("AAPL"), dec("10"));
    assert_eq!(summary.positions["AAPL"].cost["USD"], dec("20.00"));
}

#[test]
fn test_currency_whitelist_enforced() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Cash USD
        2024-01-01 open Expenses:Misc

        2024-01-02 * "wrong currency"
          Assets:Cash -5 EUR
          Expenses:Misc 5 EUR
    "#});
    let kinds: Vec<_> = project
        .collect_errors()
        .values()
        .flatten()
        .map(|d| d.kind.clone())
        .collect();
    assert_eq!(kinds, vec![ErrorKind::AccountDoesNotHoldCurrency]);
}
