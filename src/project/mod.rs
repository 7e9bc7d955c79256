//! Project state: every loaded file plus everything derived from them.
//!
//! Loading starts at the root ledger, follows `include` directives
//! relative to the including file, refuses cycles, and runs the solver
//! over every transaction. The pipeline then rebuilds the derived state
//! from scratch: a globally date-sorted entry view, the account/tag/link
//! caches the language server queries, and, when no severe parse error
//! exists, the temporal `check` pass that maintains the account tree,
//! expands pad directives into synthetic transactions and verifies
//! balance assertions.
//!
//! A `Project` is single-writer: callers serialize `update_file` against
//! reads. Re-running the pipeline on an unchanged project is idempotent.

pub mod config;
pub mod journal;
pub mod uri;
pub mod watch;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::date::Date;
use crate::ledger::inventory::{InventoryError, Summary};
use crate::ledger::solver::solve_all;
use crate::ledger::tree::{AccountTree, TreeError};
use crate::number::Decimal;
use crate::report::{Diagnostic, ErrorDetails, ErrorKind, Severity};
use crate::syntax::ast::{Data, Entry, EntryPayload};
use crate::syntax::parser::parse;
use crate::syntax::token::Token;

pub use config::{ConfigError, ProjectConfig};
pub use journal::{JournalKind, JournalLine, PriceTable};
pub use uri::Uri;
pub use watch::ChangeBroadcast;

/// Fatal loading failures. Everything recoverable is a diagnostic instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {uri}: {source}")]
    Io {
        uri: Uri,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve the working directory: {0}")]
    Cwd(std::io::Error),

    #[error("import cycle detected at {0}")]
    ImportCycle(Uri),

    #[error("unknown file {0}")]
    UnknownFile(Uri),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One loaded source file.
#[derive(Debug)]
pub struct File {
    pub uri: Uri,
    pub data: Data,
}

/// A pipeline-generated posting (no tokens of its own).
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPosting {
    pub account: String,
    pub number: Decimal,
    pub currency: String,
}

/// A transaction synthesized from a pad/balance pair, dated at the pad.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticTransaction {
    pub date: Date,
    /// (file index, entry index) of the pad that produced it.
    pub pad: (usize, usize),
    pub postings: Vec<SyntheticPosting>,
}

/// Where an account was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountOpenPos {
    pub file: usize,
    pub line: u32,
}

/// The role an account token plays, for definition/highlight queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRefKind {
    Open,
    Close,
    Pad,
    PadTo,
    Balance,
    Posting,
    Note,
    Document,
}

/// One account mention in a file.
#[derive(Debug, Clone, Copy)]
pub struct AccountRef<'a> {
    pub uri: &'a Uri,
    pub token: Token,
    pub kind: AccountRefKind,
}

/// A sorted-view handle on one entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub uri: &'a Uri,
    pub data: &'a Data,
    pub entry: &'a Entry,
}

/// The loaded project and all derived state.
#[derive(Debug, Default)]
pub struct Project {
    files: Vec<File>,
    /// (file index, entry index), globally sorted by date; ties keep file
    /// order then in-file order.
    sorted: Vec<(u32, u32)>,
    synthetics: Vec<SyntheticTransaction>,
    /// Check-pass diagnostics, keyed by file index.
    pipeline_diagnostics: Vec<(usize, Diagnostic)>,
    accounts: BTreeMap<String, AccountOpenPos>,
    tags: std::collections::BTreeSet<String>,
    links: std::collections::BTreeSet<String>,
    tree: AccountTree,
}

impl Project {
    // ====================================================================
    // Loading
    // ====================================================================

    /// Load a project from its root ledger path (blocking).
    pub fn load(root: impl AsRef<Path>) -> Result<Project, LoadError> {
        let root_uri = Uri::from_relative_to_cwd(root.as_ref()).map_err(LoadError::Cwd)?;
        let mut project = Project::default();
        let mut stack = Vec::new();
        project.load_file(root_uri, &mut stack)?;
        for file in &mut project.files {
            solve_all(&mut file.data);
        }
        info!("loaded {} file(s)", project.files.len());
        project.run_pipeline();
        Ok(project)
    }

    fn load_file(&mut self, uri: Uri, stack: &mut Vec<Uri>) -> Result<(), LoadError> {
        if stack.contains(&uri) {
            return Err(LoadError::ImportCycle(uri));
        }
        if self.files.iter().any(|file| file.uri == uri) {
            // Diamond include: already loaded through another path.
            return Ok(());
        }
        debug!("loading {}", uri);
        let bytes = uri.load_nullterminated().map_err(|source| LoadError::Io {
            uri: uri.clone(),
            source,
        })?;
        let is_root = self.files.is_empty();
        let data = parse(Arc::new(bytes), is_root);
        let index = self.files.len();
        self.files.push(File {
            uri: uri.clone(),
            data,
        });

        stack.push(uri.clone());
        let imports: Vec<String> = self.files[index]
            .data
            .imports
            .iter()
            .map(|import| import.path.clone())
            .collect();
        for path in imports {
            let target = uri.move_relative(&path);
            self.load_file(target, stack)?;
        }
        stack.pop();
        Ok(())
    }

    /// Replace one file's source, re-parse it and re-run the pipeline.
    /// Newly referenced includes are loaded; includes that vanish stay
    /// loaded but become unreferenced.
    pub fn update_file(&mut self, uri: &Uri, source: &str) -> Result<(), LoadError> {
        let index = self
            .files
            .iter()
            .position(|file| &file.uri == uri)
            .ok_or_else(|| LoadError::UnknownFile(uri.clone()))?;
        let mut bytes = source.as_bytes().to_vec();
        bytes.push(0);
        let mut data = parse(Arc::new(bytes), index == 0);
        solve_all(&mut data);
        self.files[index].data = data;

        let imports: Vec<String> = self.files[index]
            .data
            .imports
            .iter()
            .map(|import| import.path.clone())
            .collect();
        for path in imports {
            let target = uri.move_relative(&path);
            if !self.files.iter().any(|file| file.uri == target) {
                let before_count = self.files.len();
                let mut stack = vec![uri.clone()];
                if let Err(err) = self.load_file(target, &mut stack) {
                    debug!("skipping new include: {}", err);
                }
                for file in &mut self.files[before_count..] {
                    solve_all(&mut file.data);
                }
            }
        }
        self.run_pipeline();
        Ok(())
    }

    // ====================================================================
    // Pipeline
    // ====================================================================

    /// Rebuild all derived state. Safe to call repeatedly; the outcome
    /// depends only on the loaded files.
    pub fn run_pipeline(&mut self) {
        self.synthetics.clear();
        self.pipeline_diagnostics.clear();

        // Global date sort; stable, so ties keep (file, entry) order.
        self.sorted = self
            .files
            .iter()
            .enumerate()
            .flat_map(|(file_index, file)| {
                (0..file.data.entries.len()).map(move |entry_index| {
                    (file_index as u32, entry_index as u32)
                })
            })
            .collect();
        let files = &self.files;
        self.sorted.sort_by_key(|&(file_index, entry_index)| {
            files[file_index as usize].data.entries[entry_index as usize].date
        });

        self.refresh_caches();

        let severe = self
            .files
            .iter()
            .any(|file| file.data.has_severe_diagnostics());
        if severe {
            debug!("skipping check pass: severe parse diagnostics present");
            self.tree = AccountTree::new();
            return;
        }

        let outcome = run_check(&self.files, &self.sorted);
        self.tree = outcome.tree;
        self.synthetics = outcome.synthetics;
        self.pipeline_diagnostics = outcome.diagnostics;
    }

    /// Account, tag and link caches for completion and definition.
    fn refresh_caches(&mut self) {
        self.accounts.clear();
        self.tags.clear();
        self.links.clear();
        for (file_index, file) in self.files.iter().enumerate() {
            let data = &file.data;
            for entry in &data.entries {
                if let EntryPayload::Open(open) = &entry.payload {
                    let name = data.text(&open.account).to_string();
                    self.accounts.entry(name).or_insert(AccountOpenPos {
                        file: file_index,
                        line: open.account.line,
                    });
                }
            }
            for tag_link in &data.tags_links {
                match tag_link {
                    crate::syntax::ast::TagLink::Tag(token) => {
                        self.tags.insert(data.text(token).trim_start_matches('#').to_string());
                    }
                    crate::syntax::ast::TagLink::Link(token) => {
                        self.links
                            .insert(data.text(token).trim_start_matches('^').to_string());
                    }
                }
            }
        }
    }

    // ====================================================================
    // Queries
    // ====================================================================

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn root_uri(&self) -> Option<&Uri> {
        self.files.first().map(|file| &file.uri)
    }

    pub fn synthetics(&self) -> &[SyntheticTransaction] {
        &self.synthetics
    }

    /// The synthetic transaction a pad entry produced, if any.
    pub fn synthetic_for_pad(&self, file: usize, entry: usize) -> Option<&SyntheticTransaction> {
        self.synthetics.iter().find(|s| s.pad == (file, entry))
    }

    /// The account tree as of the last check pass.
    pub fn tree(&self) -> &AccountTree {
        &self.tree
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(|name| name.as_str())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|name| name.as_str())
    }

    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|name| name.as_str())
    }

    /// Where `account` was opened.
    pub fn account_open_pos(&self, account: &str) -> Option<(&Uri, u32)> {
        self.accounts
            .get(account)
            .map(|pos| (&self.files[pos.file].uri, pos.line))
    }

    /// Raw (file index, entry index) pairs of the sorted view.
    pub(crate) fn sorted_handles(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sorted
            .iter()
            .map(|&(file_index, entry_index)| (file_index as usize, entry_index as usize))
    }

    /// All entries in global date order.
    pub fn sorted_entries(&self) -> impl Iterator<Item = EntryRef<'_>> {
        self.sorted.iter().map(move |&(file_index, entry_index)| {
            let file = &self.files[file_index as usize];
            EntryRef {
                uri: &file.uri,
                data: &file.data,
                entry: &file.data.entries[entry_index as usize],
            }
        })
    }

    /// Every account mention, optionally restricted to one file. Seed for
    /// definition and highlight queries.
    pub fn account_refs(&self, uri: Option<&Uri>) -> Vec<AccountRef<'_>> {
        let mut refs = Vec::new();
        for file in &self.files {
            if let Some(filter) = uri {
                if &file.uri != filter {
                    continue;
                }
            }
            let data = &file.data;
            for entry in &data.entries {
                match &entry.payload {
                    EntryPayload::Open(open) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: open.account,
                            kind: AccountRefKind::Open,
                        });
                    }
                    EntryPayload::Close(close) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: close.account,
                            kind: AccountRefKind::Close,
                        });
                    }
                    EntryPayload::Pad(pad) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: pad.account,
                            kind: AccountRefKind::Pad,
                        });
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: pad.pad_to,
                            kind: AccountRefKind::PadTo,
                        });
                    }
                    EntryPayload::Balance(balance) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: balance.account,
                            kind: AccountRefKind::Balance,
                        });
                    }
                    EntryPayload::Note(note) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: note.account,
                            kind: AccountRefKind::Note,
                        });
                    }
                    EntryPayload::Document(document) => {
                        refs.push(AccountRef {
                            uri: &file.uri,
                            token: document.account,
                            kind: AccountRefKind::Document,
                        });
                    }
                    EntryPayload::Transaction(tx) => {
                        for posting in data.postings_of(tx) {
                            refs.push(AccountRef {
                                uri: &file.uri,
                                token: posting.account,
                                kind: AccountRefKind::Posting,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        refs
    }

    /// Subtree summaries of `account` immediately before and at the end of
    /// the ledger, split at the first entry of `uri` on or after `line`.
    pub fn account_inventory_until_line(
        &self,
        account: &str,
        uri: &Uri,
        line: u32,
    ) -> Option<(Summary, Summary)> {
        let file_index = self.files.iter().position(|file| &file.uri == uri)?;
        let anchor = self.sorted.iter().position(|&(f, e)| {
            f as usize == file_index
                && self.files[f as usize].data.entries[e as usize].main_token.line >= line
        })?;

        let mut tree = AccountTree::new();
        let mut before = None;
        for (position, &(f, e)) in self.sorted.iter().enumerate() {
            if position == anchor {
                before = Some(tree.inventory_aggregated_by_account(account));
            }
            self.replay_entry(&mut tree, f as usize, e as usize);
        }
        let after = tree.inventory_aggregated_by_account(account);
        before.map(|before| (before, after))
    }

    /// Re-apply one entry to a scratch tree, ignoring failures (the check
    /// pass already reported them).
    fn replay_entry(&self, tree: &mut AccountTree, file_index: usize, entry_index: usize) {
        let data = &self.files[file_index].data;
        let entry = &data.entries[entry_index];
        match &entry.payload {
            EntryPayload::Open(open) => {
                let name = data.text(&open.account);
                let _ = tree.open(name, &open.currencies, open.booking);
            }
            EntryPayload::Close(close) => {
                let _ = tree.close(data.text(&close.account));
            }
            EntryPayload::Transaction(tx) => {
                for posting in data.postings_of(tx) {
                    let (Some(number), Some(currency)) =
                        (&posting.amount.number, &posting.amount.currency)
                    else {
                        continue;
                    };
                    let _ = tree.post_inventory(
                        entry.date,
                        data.text(&posting.account),
                        number,
                        currency,
                        posting.lot.as_ref(),
                    );
                }
            }
            EntryPayload::Pad(_) => {
                if let Some(synthetic) = self.synthetic_for_pad(file_index, entry_index) {
                    for posting in &synthetic.postings {
                        let _ = tree.post_inventory(
                            synthetic.date,
                            &posting.account,
                            &posting.number,
                            &posting.currency,
                            None,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// All diagnostics, keyed by URI in URI order; source order per file.
    pub fn collect_errors(&self) -> BTreeMap<Uri, Vec<ErrorDetails>> {
        let mut map = BTreeMap::new();
        for (file_index, file) in self.files.iter().enumerate() {
            let mut list: Vec<ErrorDetails> = file
                .data
                .diagnostics
                .iter()
                .map(|diagnostic| ErrorDetails {
                    kind: diagnostic.kind.clone(),
                    token: diagnostic.token,
                    uri: file.uri.clone(),
                    source: Arc::clone(&file.data.source),
                })
                .collect();
            list.extend(
                self.pipeline_diagnostics
                    .iter()
                    .filter(|(index, _)| *index == file_index)
                    .map(|(_, diagnostic)| ErrorDetails {
                        kind: diagnostic.kind.clone(),
                        token: diagnostic.token,
                        uri: file.uri.clone(),
                        source: Arc::clone(&file.data.source),
                    }),
            );
            list.sort_by_key(|details| details.token.start);
            if !list.is_empty() {
                map.insert(file.uri.clone(), list);
            }
        }
        map
    }

    /// Is any error-severity diagnostic present?
    pub fn has_errors(&self) -> bool {
        self.files
            .iter()
            .any(|file| file.data.has_severe_diagnostics())
            || self
                .pipeline_diagnostics
                .iter()
                .any(|(_, diagnostic)| diagnostic.severity() == Severity::Error)
    }
}

// ========================================================================
// Check pass
// ========================================================================

struct CheckOutcome {
    tree: AccountTree,
    synthetics: Vec<SyntheticTransaction>,
    diagnostics: Vec<(usize, Diagnostic)>,
}

/// A pad waiting for its balance assertion.
struct PendingPad {
    date: Date,
    pad_to: String,
    file: usize,
    entry: usize,
    account_token: Token,
}

fn tree_error_kind(err: TreeError) -> ErrorKind {
    match err {
        TreeError::NotOpen => ErrorKind::AccountNotOpen,
        TreeError::AlreadyOpen => ErrorKind::AccountAlreadyOpen,
        TreeError::Inventory(inner) => match inner {
            InventoryError::DoesNotHoldCurrency => ErrorKind::AccountDoesNotHoldCurrency,
            InventoryError::IsBooked => ErrorKind::AccountIsBooked,
            InventoryError::DoesNotSupportLotSpec => ErrorKind::AccountDoesNotSupportLotSpec,
            InventoryError::AmbiguousMatch => ErrorKind::LotSpecAmbiguousMatch,
            InventoryError::MatchTooSmall => ErrorKind::LotSpecMatchTooSmall,
            InventoryError::NoMatch => ErrorKind::LotSpecNoMatch,
            InventoryError::AmbiguousStrictBooking => ErrorKind::AmbiguousStrictBooking,
        },
    }
}

/// Walk the sorted entries with a fresh tree: maintain open/close state,
/// collect pending pads, expand them at balance assertions, post every
/// transaction, and verify notes and documents refer to open accounts.
fn run_check(files: &[File], sorted: &[(u32, u32)]) -> CheckOutcome {
    let mut tree = AccountTree::new();
    let mut synthetics = Vec::new();
    let mut diagnostics: Vec<(usize, Diagnostic)> = Vec::new();
    let mut pending: BTreeMap<String, PendingPad> = BTreeMap::new();

    for &(file_index, entry_index) in sorted {
        let file_index = file_index as usize;
        let entry_index = entry_index as usize;
        let data = &files[file_index].data;
        let entry = &data.entries[entry_index];
        match &entry.payload {
            EntryPayload::Open(open) => {
                let name = data.text(&open.account);
                if let Err(err) = tree.open(name, &open.currencies, open.booking) {
                    diagnostics.push((
                        file_index,
                        Diagnostic::new(tree_error_kind(err), open.account),
                    ));
                }
            }
            EntryPayload::Close(close) => {
                if let Err(err) = tree.close(data.text(&close.account)) {
                    diagnostics.push((
                        file_index,
                        Diagnostic::new(tree_error_kind(err), close.account),
                    ));
                }
            }
            EntryPayload::Pad(pad) => {
                let name = data.text(&pad.account).to_string();
                for token in [pad.account, pad.pad_to] {
                    if !tree.account_open(data.text(&token)) {
                        diagnostics.push((
                            file_index,
                            Diagnostic::new(ErrorKind::AccountNotOpen, token),
                        ));
                    }
                }
                if pending.contains_key(&name) {
                    diagnostics.push((
                        file_index,
                        Diagnostic::new(ErrorKind::MultiplePads, pad.account),
                    ));
                } else {
                    pending.insert(
                        name,
                        PendingPad {
                            date: entry.date,
                            pad_to: data.text(&pad.pad_to).to_string(),
                            file: file_index,
                            entry: entry_index,
                            account_token: pad.account,
                        },
                    );
                }
            }
            EntryPayload::Balance(balance) => {
                let name = data.text(&balance.account);
                let (Some(expected), Some(currency)) =
                    (&balance.amount.number, &balance.amount.currency)
                else {
                    continue;
                };
                let accumulated = tree.inventory_aggregated_by_account(name).units(currency);
                let missing = expected.sub(&accumulated);
                if let Some(pad) = pending.remove(name) {
                    if !missing.is_zero() {
                        let synthetic = SyntheticTransaction {
                            date: pad.date,
                            pad: (pad.file, pad.entry),
                            postings: vec![
                                SyntheticPosting {
                                    account: name.to_string(),
                                    number: missing,
                                    currency: currency.clone(),
                                },
                                SyntheticPosting {
                                    account: pad.pad_to.clone(),
                                    number: missing.neg(),
                                    currency: currency.clone(),
                                },
                            ],
                        };
                        for posting in &synthetic.postings {
                            if let Err(err) = tree.post_inventory(
                                synthetic.date,
                                &posting.account,
                                &posting.number,
                                &posting.currency,
                                None,
                            ) {
                                diagnostics.push((
                                    pad.file,
                                    Diagnostic::new(tree_error_kind(err), pad.account_token),
                                ));
                            }
                        }
                        synthetics.push(synthetic);
                    }
                } else {
                    let within = match &balance.tolerance {
                        Some(tolerance) => {
                            missing.abs().cmp(tolerance) != std::cmp::Ordering::Greater
                        }
                        None => expected.is_within_tolerance(&accumulated),
                    };
                    if !within {
                        diagnostics.push((
                            file_index,
                            Diagnostic::new(
                                ErrorKind::BalanceAssertionFailed {
                                    expected: *expected,
                                    accumulated,
                                },
                                balance.account,
                            ),
                        ));
                    }
                }
            }
            EntryPayload::Transaction(tx) => {
                for posting in data.postings_of(tx) {
                    let (Some(number), Some(currency)) =
                        (&posting.amount.number, &posting.amount.currency)
                    else {
                        continue;
                    };
                    if let Err(err) = tree.post_inventory(
                        entry.date,
                        data.text(&posting.account),
                        number,
                        currency,
                        posting.lot.as_ref(),
                    ) {
                        diagnostics.push((
                            file_index,
                            Diagnostic::new(tree_error_kind(err), posting.account),
                        ));
                    }
                }
            }
            EntryPayload::Note(note) => {
                if !tree.account_open(data.text(&note.account)) {
                    diagnostics.push((
                        file_index,
                        Diagnostic::new(ErrorKind::AccountNotOpen, note.account),
                    ));
                }
            }
            EntryPayload::Document(document) => {
                if !tree.account_open(data.text(&document.account)) {
                    diagnostics.push((
                        file_index,
                        Diagnostic::new(ErrorKind::AccountNotOpen, document.account),
                    ));
                }
            }
            _ => {}
        }
    }

    CheckOutcome {
        tree,
        synthetics,
        diagnostics,
    }
}
