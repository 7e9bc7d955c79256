//! The diagnostic taxonomy.
//!
//! Every user-visible problem in a ledger is one of the kinds below, tied
//! to the token that triggered it. Parse errors are recovered locally and
//! accumulate per file; solver and semantic errors are added by the
//! project pipeline. Only fatal I/O problems abort loading (see
//! [`crate::project::LoadError`]), everything else flows through here.

use std::sync::Arc;

use crate::number::Decimal;
use crate::project::uri::Uri;
use crate::syntax::token::{Token, TokenKind};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Every diagnostic kind the engine can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // ========================================================================
    // Parse
    // ========================================================================
    ExpectedDeclaration,
    ExpectedEntry,
    ExpectedToken(TokenKind),
    ExpectedKeyValue,
    ExpectedValue,
    ExpectedAmount,
    InvalidNumber,
    InvalidDate,
    InvalidBookingMethod,
    DuplicateLotSpec,
    TagAlreadyPushed,
    MetaAlreadyPushed,
    TagNotPushed,
    MetaNotPushed,

    // ========================================================================
    // Solver
    // ========================================================================
    TxBalanceNoCurrency,
    TxDoesNotBalance { sum: Decimal, currency: String },
    TxNoSolution,
    TxTooManyVariables,
    TxDivisionByZero,
    TxMultipleSolutions,
    CannotInferAmountCurrencyWhenPriceSet,

    // ========================================================================
    // Semantic
    // ========================================================================
    AccountNotOpen,
    AccountAlreadyOpen,
    MultiplePads,
    BalanceAssertionFailed { expected: Decimal, accumulated: Decimal },
    AccountDoesNotHoldCurrency,
    AccountIsBooked,
    AccountDoesNotSupportLotSpec,
    LotSpecAmbiguousMatch,
    LotSpecMatchTooSmall,
    LotSpecNoMatch,
    AmbiguousStrictBooking,

    // ========================================================================
    // Warnings
    // ========================================================================
    Flagged,
    InferredPrice,
}

impl ErrorKind {
    /// Default severity for this kind.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Flagged | ErrorKind::InferredPrice => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ExpectedDeclaration => {
                write!(f, "expected a dated entry or a directive")
            }
            ErrorKind::ExpectedEntry => {
                write!(f, "expected an entry keyword or transaction flag after the date")
            }
            ErrorKind::ExpectedToken(kind) => write!(f, "expected {}", kind),
            ErrorKind::ExpectedKeyValue => write!(f, "expected a key: value pair"),
            ErrorKind::ExpectedValue => write!(f, "expected a metadata value"),
            ErrorKind::ExpectedAmount => write!(f, "expected an amount"),
            ErrorKind::InvalidNumber => write!(f, "invalid number"),
            ErrorKind::InvalidDate => write!(f, "invalid date"),
            ErrorKind::InvalidBookingMethod => {
                write!(f, "invalid booking method, expected \"FIFO\", \"LIFO\" or \"STRICT\"")
            }
            ErrorKind::DuplicateLotSpec => write!(f, "duplicate component in lot spec"),
            ErrorKind::TagAlreadyPushed => write!(f, "tag is already pushed"),
            ErrorKind::MetaAlreadyPushed => write!(f, "metadata key is already pushed"),
            ErrorKind::TagNotPushed => write!(f, "tag was never pushed"),
            ErrorKind::MetaNotPushed => write!(f, "metadata key was never pushed"),
            ErrorKind::TxBalanceNoCurrency => {
                write!(f, "transaction has no currency to balance against")
            }
            ErrorKind::TxDoesNotBalance { sum, currency } => {
                write!(f, "transaction does not balance: {} {} left over", sum, currency)
            }
            ErrorKind::TxNoSolution => {
                write!(f, "no assignment of the missing amounts balances the transaction")
            }
            ErrorKind::TxTooManyVariables => {
                write!(f, "too many unknowns in one currency group")
            }
            ErrorKind::TxDivisionByZero => {
                write!(f, "cannot solve posting: division by zero")
            }
            ErrorKind::TxMultipleSolutions => {
                write!(f, "transaction is ambiguous: multiple solutions balance it")
            }
            ErrorKind::CannotInferAmountCurrencyWhenPriceSet => {
                write!(f, "cannot infer the amount currency of a posting with a price")
            }
            ErrorKind::AccountNotOpen => write!(f, "account is not open"),
            ErrorKind::AccountAlreadyOpen => write!(f, "account is already open"),
            ErrorKind::MultiplePads => {
                write!(f, "account already has a pending pad with no balance in between")
            }
            ErrorKind::BalanceAssertionFailed { expected, accumulated } => {
                write!(
                    f,
                    "balance assertion failed: expected {}, accumulated {}",
                    expected, accumulated
                )
            }
            ErrorKind::AccountDoesNotHoldCurrency => {
                write!(f, "account does not hold this currency")
            }
            ErrorKind::AccountIsBooked => {
                write!(f, "account holds lots; a plain amount cannot be posted to it")
            }
            ErrorKind::AccountDoesNotSupportLotSpec => {
                write!(f, "account does not support lot specs")
            }
            ErrorKind::LotSpecAmbiguousMatch => write!(f, "lot spec matches more than one lot"),
            ErrorKind::LotSpecMatchTooSmall => {
                write!(f, "matched lot is smaller than the amount to remove")
            }
            ErrorKind::LotSpecNoMatch => write!(f, "lot spec matches no lot"),
            ErrorKind::AmbiguousStrictBooking => {
                write!(f, "strict booking requires exactly one matching lot or a full cancellation")
            }
            ErrorKind::Flagged => write!(f, "flagged for review"),
            ErrorKind::InferredPrice => {
                write!(f, "price inferred from the cost basis rather than an explicit '@'")
            }
        }
    }
}

/// A file-local diagnostic as produced by the parser, solver and checks.
/// The owning file contributes the URI and source when it is surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub token: Token,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, token: Token) -> Self {
        Diagnostic { kind, token }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

/// A fully-resolved diagnostic, ready to render: the kind and token plus
/// the owning file's URI and a shared handle on its source bytes.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub kind: ErrorKind,
    pub token: Token,
    pub uri: Uri,
    pub source: Arc<Vec<u8>>,
}

impl ErrorDetails {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}
