//! # Tally
//!
//! A fast engine for a Beancount-style plain-text double-entry accounting
//! language: it loads a root ledger plus its includes, proves every
//! transaction balances, replays the history against an account tree with
//! multi-currency inventories, and answers the structured queries that
//! interactive front-ends (a language server, a web UI) are built on.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Ledger files (root + includes)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [syntax: lexer + parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Data (entries, postings, diagnostics)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [ledger: solver]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Balanced transactions (amounts resolved)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [project: sort + pad + check]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Account tree + inventories + synthetic transactions     │
//! │          + diagnostics with source excerpts               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is synchronous and single-writer; hosts serialize
//! [`project::Project::update_file`] against reads and run it on a worker
//! thread when they need responsiveness.

pub mod date;
pub mod ledger;
pub mod number;
pub mod project;
pub mod report;
pub mod syntax;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::date::Date;
    pub use crate::ledger::inventory::{Inventory, Summary};
    pub use crate::ledger::tree::AccountTree;
    pub use crate::number::Decimal;
    pub use crate::project::{LoadError, Project, ProjectConfig, Uri};
    pub use crate::report::{ErrorDetails, ErrorKind, Severity};
    pub use crate::syntax::{Data, Token, TokenKind};
}

pub use date::Date;
pub use number::Decimal;
pub use project::Project;
