//! Bookkeeping semantics: balancing, holdings and the account tree.
//!
//! - [`solver`] proves every transaction balances and fills in missing
//!   amounts, currencies and prices.
//! - [`inventory`] tracks what an account holds, either as plain balances
//!   or as cost-basis lots under a booking policy.
//! - [`tree`] arranges accounts hierarchically and rolls holdings up.

pub mod inventory;
pub mod solver;
pub mod tree;

pub use inventory::{Inventory, InventoryError, Summary};
pub use tree::{AccountTree, TreeError};
