//! End-to-end load of the bundled demo ledger.

use std::path::Path;

use tally::project::JournalKind;
use tally::{Decimal, Project};

fn demo_path() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/example/main.bean"))
}

fn dec(text: &str) -> Decimal {
    Decimal::parse(text).unwrap()
}

#[test]
fn test_demo_loads_clean() {
    let project = Project::load(demo_path()).unwrap();
    assert!(!project.has_errors(), "{:?}", project.collect_errors());
    assert_eq!(project.files().len(), 3);
}

#[test]
fn test_demo_balances() {
    let project = Project::load(demo_path()).unwrap();
    let tree = project.tree();

    // 3,000.00 - 120.50 - 1,100.00 + 470.00
    assert_eq!(
        tree.inventory_aggregated_by_account("Assets:Bank:Checking").units("USD"),
        dec("2249.50")
    );
    assert_eq!(
        tree.inventory_aggregated_by_account("Assets:Broker").units("VTI"),
        dec("3")
    );
    // The pad filled the cash account up to its assertion.
    assert_eq!(
        tree.inventory_aggregated_by_account("Assets:Cash").units("USD"),
        dec("200.00")
    );
    // Sale proceeds above cost landed in gains.
    assert_eq!(
        tree.inventory_aggregated_by_account("Income:Gains").units("USD"),
        dec("-30.00")
    );
}

#[test]
fn test_demo_synthetics_and_journal() {
    let project = Project::load(demo_path()).unwrap();
    assert_eq!(project.synthetics().len(), 1);
    assert_eq!(project.synthetics()[0].postings[0].number, dec("200.00"));

    let journal = project.journal("Assets:Cash");
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0].kind, JournalKind::Synthetic);
    assert_eq!(journal[1].kind, JournalKind::Balance);

    let prices = project.price_table();
    assert_eq!(prices.latest("VTI", "USD", None), Some(dec("235.00")));
}

#[test]
fn test_demo_caches() {
    let project = Project::load(demo_path()).unwrap();
    assert!(project.accounts().any(|a| a == "Assets:Broker"));
    assert!(project.tags().any(|t| t == "y2024"));
    let (uri, _) = project.account_open_pos("Assets:Cash").unwrap();
    assert!(uri.absolute().ends_with("accounts.bean"));
}
