// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Period;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failures surfaced by ledger operations. Any of them aborts the unit of
/// work without writes.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Transaction date {date} is in closed period {period}")]
    PeriodClosed { date: NaiveDate, period: Period },
    #[error("No exchange rate found for {from} to {to} on {date}")]
    RateNotFound {
        from: String,
        to: String,
        date: NaiveDate,
    },
    #[error("No default bank account found for user {0}")]
    NoDefaultAccount(i64),
    #[error("Target account must be provided for transfer transactions")]
    MissingTarget,
    #[error("Category {category_id} does not exist for user {user_id}")]
    UnknownCategory { category_id: i64, user_id: i64 },
    #[error("Account {account_id} does not exist for user {user_id}")]
    UnknownAccount { account_id: i64, user_id: i64 },
    #[error("Invalid transaction direction '{0}'. Use 'debit' or 'credit'")]
    InvalidDirection(String),
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Period {period} is already closed for user {user_id}")]
    AlreadyClosed { period: Period, user_id: i64 },
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl LedgerError {
    /// Decimal overflow while applying an amount.
    pub fn out_of_range() -> Self {
        LedgerError::Validation("amount out of range".into())
    }

    /// True for the caller-error family (bad field, unknown reference, locked
    /// period, missing default account).
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            LedgerError::Db(_) | LedgerError::RateNotFound { .. }
        )
    }
}
