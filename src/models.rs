// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::LedgerError;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Implements `as_str`, `Display`, `FromStr` and the SQLite text mapping for a
/// plain enum stored as its lowercase token.
macro_rules! text_enum {
    ($ty:ident, $err:expr, { $($variant:ident => $token:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($token => Ok($ty::$variant),)+
                    other => Err($err(other.to_string())),
                }
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: LedgerError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Transfer,
}

text_enum!(TransactionType, |v| LedgerError::Validation(format!(
    "invalid transaction type '{v}', use 'debit', 'credit' or 'transfer'"
)), {
    Credit => "credit",
    Debit => "debit",
    Transfer => "transfer",
});

/// Sign applied to a balance row: debit subtracts, credit adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
}

text_enum!(Direction, LedgerError::InvalidDirection, {
    Debit => "debit",
    Credit => "credit",
});

impl Direction {
    pub fn flipped(self) -> Direction {
        match self {
            Direction::Debit => Direction::Credit,
            Direction::Credit => Direction::Debit,
        }
    }

    /// Flips when `reverse` is set; used to undo a previously applied effect.
    pub fn reversed_if(self, reverse: bool) -> Direction {
        if reverse { self.flipped() } else { self }
    }

    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Direction::Debit => -amount,
            Direction::Credit => amount,
        }
    }
}

impl TryFrom<TransactionType> for Direction {
    type Error = LedgerError;

    fn try_from(t: TransactionType) -> Result<Self, Self::Error> {
        match t {
            TransactionType::Debit => Ok(Direction::Debit),
            TransactionType::Credit => Ok(Direction::Credit),
            TransactionType::Transfer => Err(LedgerError::InvalidDirection(t.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

text_enum!(Recurrence, |v| LedgerError::Validation(format!(
    "invalid recurrence '{v}', use daily, weekly, monthly or yearly"
)), {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    Yearly => "yearly",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannedStatus {
    Planned,
    Realized,
    Overdue,
    Cancelled,
}

text_enum!(PlannedStatus, |v| LedgerError::Validation(format!(
    "invalid planned status '{v}'"
)), {
    Planned => "planned",
    Realized => "realized",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

pub const LOAN_ACCOUNT: &str = "loan";
pub const BANK_ACCOUNT: &str = "bank";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub r#type: String,
    pub currency: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl Account {
    pub fn is_loan(&self) -> bool {
        self.r#type.eq_ignore_ascii_case(LOAN_ACCOUNT)
    }

    pub fn is_active(&self) -> bool {
        self.effective_to.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryState {
    Active,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl Category {
    pub fn state(&self) -> CategoryState {
        match self.effective_to {
            None => CategoryState::Active,
            Some(_) => CategoryState::Retired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub category_id: i64,
    pub target_account_id: Option<i64>,
    pub r#type: TransactionType,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub recurrence: Recurrence,
    pub amount: Decimal,
    pub due_date_day: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTransaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub transaction_id: Option<i64>,
    pub status: PlannedStatus,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub realized_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentBalance {
    pub user_id: i64,
    pub account_id: i64,
    pub balance: Decimal,
    pub currency: String,
    pub last_modified: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub balance: Decimal,
    pub currency: String,
    pub month: NaiveDate, // first day of the snapshotted month
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub date: NaiveDate,
}

/// A calendar month, the unit of closing and planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(LedgerError::Validation(format!(
                "invalid period {year}-{month:02}"
            )));
        }
        Ok(Period { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Period {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The given day of this month: non-positive days map to the 1st and days
    /// past the month end map to the last day.
    pub fn day(&self, day: i32) -> NaiveDate {
        let d = day.clamp(1, self.days() as i32) as u32;
        self.first_day().with_day(d).unwrap_or_else(|| self.first_day())
    }

    pub fn in_year(&self, year: i32) -> Period {
        Period {
            year,
            month: self.month,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map_err(|_| {
            LedgerError::Validation(format!("invalid month '{s}', expected YYYY-MM"))
        })?;
        Ok(Period::of(date))
    }
}
