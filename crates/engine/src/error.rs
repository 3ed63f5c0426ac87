//! The module contains the error the engine can throw.
//!
//! Every variant belongs to exactly one [`ErrorKind`]:
//!
//! - validation errors are raised before anything is written;
//! - state-conflict errors are raised mid-transaction when the stored ledger
//!   does not allow the operation (e.g. [`NoOutstandingBalance`]);
//! - storage errors come straight from the database ([`Database`]).
//!
//! In all three cases the enclosing transaction is rolled back.
//!
//!  [`NoOutstandingBalance`]: EngineError::NoOutstandingBalance
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Coarse classification callers can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Storage,
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("cannot settle balance with self ({0})")]
    SelfSettlement(String),
    #[error("no outstanding balance from \"{from}\" to \"{to}\"")]
    NoOutstandingBalance { from: String, to: String },
    #[error(
        "settlement of {requested} from \"{from}\" to \"{to}\" exceeds outstanding balance {outstanding}"
    )]
    ExceedsOutstandingBalance {
        from: String,
        to: String,
        requested: f64,
        outstanding: f64,
    },
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidInput(_)
            | Self::InvalidSplit(_)
            | Self::SelfSettlement(_) => ErrorKind::Validation,
            Self::NoOutstandingBalance { .. }
            | Self::ExceedsOutstandingBalance { .. }
            | Self::KeyNotFound(_)
            | Self::ExistingKey(_) => ErrorKind::StateConflict,
            Self::Database(_) => ErrorKind::Storage,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::SelfSettlement(a), Self::SelfSettlement(b)) => a == b,
            (
                Self::NoOutstandingBalance { from: f1, to: t1 },
                Self::NoOutstandingBalance { from: f2, to: t2 },
            ) => f1 == f2 && t1 == t2,
            (
                Self::ExceedsOutstandingBalance {
                    from: f1,
                    to: t1,
                    requested: r1,
                    outstanding: o1,
                },
                Self::ExceedsOutstandingBalance {
                    from: f2,
                    to: t2,
                    requested: r2,
                    outstanding: o2,
                },
            ) => f1 == f2 && t1 == t2 && r1 == r2 && o1 == o2,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
