//! Solver behavior: resolution, diagnostics, and the balance property.

use std::collections::BTreeMap;
use std::sync::Arc;

use indoc::indoc;
use tally::ledger::solver::solve_all;
use tally::report::ErrorKind;
use tally::syntax::ast::EntryPayload;
use tally::syntax::parser::parse;
use tally::syntax::Data;
use tally::Decimal;

fn solve_str(source: &str) -> Data {
    let mut bytes = source.as_bytes().to_vec();
    bytes.push(0);
    let mut data = parse(Arc::new(bytes), true);
    solve_all(&mut data);
    data
}

/// Plain postings must sum to zero per currency after a successful solve.
fn assert_balanced(data: &Data) {
    for entry in &data.entries {
        let EntryPayload::Transaction(tx) = &entry.payload else {
            continue;
        };
        let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
        for posting in data.postings_of(tx) {
            if posting.price.is_some() || posting.lot.is_some() {
                continue;
            }
            let (Some(number), Some(currency)) =
                (&posting.amount.number, &posting.amount.currency)
            else {
                panic!("posting left unresolved: {posting:?}");
            };
            let sum = sums.entry(currency.as_str()).or_insert_with(Decimal::zero);
            *sum = sum.add(number);
        }
        for (currency, sum) in sums {
            if data
                .postings_of(tx)
                .iter()
                .all(|p| p.price.is_none() && p.lot.is_none())
            {
                assert!(
                    sum.is_within_tolerance(&Decimal::zero()),
                    "transaction at {} leaks {} {}",
                    entry.date,
                    sum,
                    currency
                );
            }
        }
    }
}

#[test]
fn test_fills_second_posting() {
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A 10 USD
          Assets:B
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    let EntryPayload::Transaction(tx) = &data.entries[0].payload else {
        unreachable!();
    };
    let filled = &data.postings_of(tx)[1].amount;
    assert_eq!(filled.number, Some(Decimal::parse("-10").unwrap()));
    assert_eq!(filled.currency.as_deref(), Some("USD"));
    assert_balanced(&data);
}

#[test]
fn test_unbalanced_pair_reports_both_currencies() {
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A 5 EUR
          Assets:B -5 USD
    "#});
    let currencies: Vec<&str> = data
        .diagnostics
        .iter()
        .filter_map(|d| match &d.kind {
            ErrorKind::TxDoesNotBalance { currency, .. } => Some(currency.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(currencies, vec!["EUR", "USD"]);
}

#[test]
fn test_unique_solution_is_found() {
    // Three postings, one unknown amount and one unknown currency; the
    // system still has exactly one consistent completion.
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A 7.50 USD
          Assets:B -2.50 USD
          Assets:C
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    let EntryPayload::Transaction(tx) = &data.entries[0].payload else {
        unreachable!();
    };
    let third = &data.postings_of(tx)[2].amount;
    assert_eq!(third.number, Some(Decimal::parse("-5.00").unwrap()));
    assert_eq!(third.currency.as_deref(), Some("USD"));
    assert_balanced(&data);
}

#[test]
fn test_ambiguity_is_never_guessed() {
    // Two balanced currency groups and a free posting: either currency
    // admits a zero completion, so the solver must refuse to choose.
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A 10 USD
          Assets:B -10 USD
          Assets:C 5 EUR
          Assets:D -5 EUR
          Assets:E
    "#});
    let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
    assert_eq!(kinds, vec![ErrorKind::TxMultipleSolutions]);
}

#[test]
fn test_insoluble_system_reports_no_solution() {
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A 10 USD
          Assets:B -9 EUR
          Assets:C
    "#});
    let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
    assert_eq!(kinds, vec![ErrorKind::TxNoSolution]);
}

#[test]
fn test_price_conversion_balances() {
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:CHF 100.00 CHF @ 1.05 USD
          Assets:USD -105.00 USD
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
}

#[test]
fn test_missing_price_number_resolved() {
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:CHF 100.00 CHF @ USD
          Assets:USD -105.00 USD
    "#});
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    let EntryPayload::Transaction(tx) = &data.entries[0].payload else {
        unreachable!();
    };
    let price = data.postings_of(tx)[0].price.as_ref().unwrap();
    assert_eq!(price.amount.number, Some(Decimal::parse("1.05").unwrap()));
}

#[test]
fn test_number_variable_cap_fails_loudly() {
    // Nine unknown amounts exceed the hard cap; the solver refuses
    // instead of truncating.
    let mut source = String::from("2020-01-01 *\n  Assets:Funded 90 USD\n");
    for i in 0..9 {
        source.push_str(&format!("  Assets:Leg{} USD\n", i));
    }
    let data = solve_str(&source);
    let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
    assert_eq!(kinds, vec![ErrorKind::TxTooManyVariables]);
}

#[test]
fn test_empty_transaction_is_trivially_balanced() {
    let data = solve_str("2020-01-01 * \"no postings\"\n");
    assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
}

#[test]
fn test_division_by_zero() {
    // The unknown unit count sits behind a zero price, so the only
    // equation for it divides by zero.
    let data = solve_str(indoc! {r#"
        2020-01-01 *
          Assets:A CHF @ 0 USD
          Assets:B -5 USD
    "#});
    let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
    assert_eq!(kinds, vec![ErrorKind::TxDivisionByZero]);
}
