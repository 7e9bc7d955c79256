//! The hierarchical account registry.
//!
//! Accounts form a tree over `:`-separated paths. Opening a leaf creates
//! its intermediate nodes without opening them; only opened nodes carry an
//! inventory and accept postings. Aggregation walks a subtree and merges
//! the summaries, so a parent's rollup equals the sum of its descendants.

use std::collections::BTreeMap;
use std::fmt::Write;

use thiserror::Error;

use crate::date::Date;
use crate::ledger::inventory::{Inventory, InventoryError, Summary};
use crate::number::Decimal;
use crate::syntax::ast::{BookingMethod, LotSpec};

/// Failures from tree operations; inventory errors pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("account is not open")]
    NotOpen,

    #[error("account is already open")]
    AlreadyOpen,

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// An opened account's bookkeeping state.
#[derive(Debug, Clone)]
struct AccountState {
    /// Currency whitelist from `open`; empty means unrestricted.
    currencies: Vec<String>,
    booking: Option<BookingMethod>,
    inventory: Inventory,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
struct Node {
    children: BTreeMap<String, Node>,
    state: Option<AccountState>,
}

impl Node {
    fn walk(&self, path: &str) -> Option<&Node> {
        let mut node = self;
        for segment in path.split(':') {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn walk_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = self;
        for segment in path.split(':') {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    fn aggregate_into(&self, summary: &mut Summary) {
        if let Some(state) = &self.state {
            summary.merge(&state.inventory.aggregate_by_currency());
        }
        for child in self.children.values() {
            child.aggregate_into(summary);
        }
    }
}

/// The account tree rebuilt by every pipeline run.
#[derive(Debug, Clone, Default)]
pub struct AccountTree {
    root: Node,
}

impl AccountTree {
    pub fn new() -> Self {
        AccountTree::default()
    }

    /// Open an account, creating intermediate nodes along the way without
    /// opening them.
    pub fn open(
        &mut self,
        path: &str,
        currencies: &[String],
        booking: Option<BookingMethod>,
    ) -> Result<(), TreeError> {
        let mut node = &mut self.root;
        for segment in path.split(':') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        if node.state.is_some() {
            return Err(TreeError::AlreadyOpen);
        }
        node.state = Some(AccountState {
            currencies: currencies.to_vec(),
            booking,
            inventory: Inventory::default(),
            closed: false,
        });
        Ok(())
    }

    /// Mark an account closed; later postings fail.
    pub fn close(&mut self, path: &str) -> Result<(), TreeError> {
        let node = self.walkable_state(path)?;
        node.closed = true;
        Ok(())
    }

    /// Is `path` open (and not closed)?
    pub fn account_open(&self, path: &str) -> bool {
        self.root
            .walk(path)
            .and_then(|node| node.state.as_ref())
            .map(|state| !state.closed)
            .unwrap_or(false)
    }

    fn walkable_state(&mut self, path: &str) -> Result<&mut AccountState, TreeError> {
        let state = self
            .root
            .walk_mut(path)
            .and_then(|node| node.state.as_mut())
            .ok_or(TreeError::NotOpen)?;
        if state.closed {
            return Err(TreeError::NotOpen);
        }
        Ok(state)
    }

    /// Route one concrete posting into the account's inventory.
    pub fn post_inventory(
        &mut self,
        date: Date,
        path: &str,
        number: &Decimal,
        currency: &str,
        lot: Option<&LotSpec>,
    ) -> Result<(), TreeError> {
        let state = self.walkable_state(path)?;
        if !state.currencies.is_empty() && !state.currencies.iter().any(|c| c == currency) {
            return Err(InventoryError::DoesNotHoldCurrency.into());
        }
        let booking = state.booking;
        state
            .inventory
            .apply_posting(date, number, currency, lot, booking)?;
        Ok(())
    }

    /// Merge the summaries of `path` and everything below it. An unknown
    /// path yields an empty summary.
    pub fn inventory_aggregated_by_account(&self, path: &str) -> Summary {
        let mut summary = Summary::default();
        if let Some(node) = self.root.walk(path) {
            node.aggregate_into(&mut summary);
        }
        summary
    }

    /// Render the tree with per-account balances, two spaces per level.
    pub fn print(&self) -> String {
        let mut out = String::new();
        Self::print_node(&self.root, 0, &mut out);
        out
    }

    fn print_node(node: &Node, depth: usize, out: &mut String) {
        for (name, child) in &node.children {
            for _ in 0..depth {
                out.push_str("  ");
            }
            out.push_str(name);
            if let Some(state) = &child.state {
                let summary = state.inventory.aggregate_by_currency();
                let positions: Vec<String> = summary
                    .positions
                    .iter()
                    .map(|(currency, position)| format!("{} {}", position.units, currency))
                    .collect();
                if !positions.is_empty() {
                    let _ = write!(out, "  {}", positions.join(", "));
                }
                if state.closed {
                    out.push_str("  (closed)");
                }
            }
            out.push('\n');
            Self::print_node(child, depth + 1, out);
        }
    }
}
