//! The project pipeline end to end: pads, assertions, ordering.

use indoc::indoc;
use tally::report::{ErrorKind, Severity};
use tally::{Date, Decimal, Project};

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
fn test_pad_synthesizes_transaction_at_pad_date() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Checking
        2024-01-01 open Equity:Opening
        2024-06-01 pad Assets:Checking Equity:Opening
        2024-07-01 balance Assets:Checking 100 USD
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());

    let synthetics = project.synthetics();
    assert_eq!(synthetics.len(), 1);
    assert_eq!(synthetics[0].date, Date::new(2024, 6, 1).unwrap());
    assert_eq!(synthetics[0].postings[0].account, "Assets:Checking");
    assert_eq!(synthetics[0].postings[0].number, dec("100"));
    assert_eq!(synthetics[0].postings[0].currency, "USD");
    assert_eq!(synthetics[0].postings[1].account, "Equity:Opening");
    assert_eq!(synthetics[0].postings[1].number, dec("-100"));

    let tree = project.tree();
    assert_eq!(
        tree.inventory_aggregated_by_account("Assets:Checking").units("USD"),
        dec("100")
    );
    assert_eq!(
        tree.inventory_aggregated_by_account("Equity:Opening").units("USD"),
        dec("-100")
    );
}

#[test]
fn test_pad_covers_only_the_gap() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Checking
        2024-01-01 open Equity:Opening
        2024-01-01 open Income:Job
        2024-06-01 pad Assets:Checking Equity:Opening
        2024-06-15 * "salary"
          Assets:Checking 40 USD
          Income:Job -40 USD
        2024-07-01 balance Assets:Checking 100 USD
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
    // The transaction supplied 40; the pad fills the remaining 60.
    assert_eq!(project.synthetics()[0].postings[0].number, dec("60"));
}

#[test]
fn test_balance_zero_on_empty_account_passes() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Cash
        2024-07-01 balance Assets:Cash 0 USD
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
}

#[test]
fn test_balance_outside_tolerance_fails() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Cash
        2024-01-01 open Income:Job
        2024-01-02 * "s"
          Assets:Cash 0.02 USD
          Income:Job -0.02 USD
        2024-07-01 balance Assets:Cash 0.00 USD
    "#});
    let errors = project.collect_errors();
    let details = errors
        .values()
        .flatten()
        .find(|d| matches!(d.kind, ErrorKind::BalanceAssertionFailed { .. }))
        .expect("balance assertion diagnostic");
    assert_eq!(details.severity(), Severity::Error);
}

#[test]
fn test_explicit_tolerance_overrides_default() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Cash
        2024-01-01 open Income:Job
        2024-01-02 * "s"
          Assets:Cash 0.05 USD
          Income:Job -0.05 USD
        2024-07-01 balance Assets:Cash 0.00 USD ~ 0.10
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
}

#[test]
fn test_balance_aggregates_the_subtree() {
    let project = project_from(indoc! {r#"
        2024-01-01 open Assets:Bank:Checking
        2024-01-01 open Assets:Bank:Savings
        2024-01-01 open Income:Job
        2024-01-02 * "split salary"
          Assets:Bank:Checking 70 USD
          Assets:Bank:Savings 30 USD
          Income:Job -100 USD
        2024-07-01 balance Assets:Bank 100 USD
    "#});
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
}

#[test]
fn test_diagnostics_in_source_order_per_file() {
    let project = project_from(indoc! {r#"
        2024-01-02 * "second error first line"
          Assets:NotOpen -1 USD
          Expenses:AlsoNot 1 USD
        2024-01-03 note Assets:Missing "x"
    "#});
    let errors = project.collect_errors();
    let offsets: Vec<usize> = errors
        .values()
        .flatten()
        .map(|details| details.token.start)
        .collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
    assert_eq!(offsets.len(), 3);
}

#[test]
fn test_multi_file_errors_keyed_by_uri() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("main.bean"),
        "include \"other.bean\"\n2024-01-02 note Assets:Nope \"x\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("other.bean"),
        "2024-01-03 note Assets:AlsoNope \"y\"\n",
    )
    .unwrap();
    let project = Project::load(dir.path().join("main.bean")).unwrap();
    let errors = project.collect_errors();
    assert_eq!(errors.len(), 2);
    for list in errors.values() {
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, ErrorKind::AccountNotOpen);
    }
}

#[test]
fn test_rendered_diagnostic_has_excerpt() {
    let project = project_from(indoc! {r#"
        2024-01-02 note Assets:Nope "x"
    "#});
    let errors = project.collect_errors();
    let details = errors.values().flatten().next().unwrap();
    let rendered = details.render(std::path::Path::new("/"), false);
    assert!(rendered.contains("[Error] account is not open"));
    assert!(rendered.contains("2024-01-02 note Assets:Nope \"x\""));
    assert!(rendered.contains("^^^^^^^^^^^"));
}

#[test]
fn test_update_file_is_atomic_per_file() {
    let mut project = project_from(indoc! {r#"
        2024-01-01 open Assets:Cash
        2024-01-01 open Income:Job
        2024-01-02 * "s"
          Assets:Cash 1 USD
          Income:Job -1 USD
    "#});
    assert!(!project.has_errors());
    let uri = project.root_uri().unwrap().clone();

    // Introduce an error, then fix it again.
    project
        .update_file(&uri, "2024-01-02 note Assets:Gone \"x\"\n")
        .unwrap();
    assert!(project.has_errors());

    project
        .update_file(&uri, "2024-01-01 open Assets:Cash\n")
        .unwrap();
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
}
