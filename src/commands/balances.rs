// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LedgerError, LedgerResult};
use crate::models::{BalanceSnapshot, CurrentBalance, Direction, Period, BANK_ACCOUNT};
use crate::utils::{
    get_decimal, id_for_account, maybe_print_json, parse_decimal, parse_month, pretty_table, today,
};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub)?,
        Some(("history", sub)) => history(conn, sub)?,
        Some(("check", sub)) => check(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Adds a signed delta to the running balance of (account, user), creating
/// the row with the delta as its opening value when none exists yet. The
/// amount must already be in the account's currency. Returns the new balance.
pub fn apply_delta(
    conn: &Connection,
    account_id: i64,
    user_id: i64,
    amount: Decimal,
    direction: Direction,
    currency: &str,
) -> LedgerResult<Decimal> {
    let delta = direction.signed(amount);
    let existing: Option<Decimal> = conn
        .query_row(
            "SELECT balance FROM current_account_balance WHERE account_id=?1 AND user_id=?2",
            params![account_id, user_id],
            |r| get_decimal(r, 0),
        )
        .optional()?;

    let new_balance = match existing {
        Some(current) => {
            let updated = current
                .checked_add(delta)
                .ok_or_else(LedgerError::out_of_range)?;
            conn.execute(
                "UPDATE current_account_balance SET balance=?1, last_modified_date=?2
                 WHERE account_id=?3 AND user_id=?4",
                params![updated.to_string(), today(), account_id, user_id],
            )?;
            updated
        }
        None => {
            conn.execute(
                "INSERT INTO current_account_balance(user_id, account_id, balance, currency, last_modified_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, account_id, delta.to_string(), currency, today()],
            )?;
            delta
        }
    };
    tracing::debug!(account_id, user_id, %delta, balance = %new_balance, "balance updated");
    Ok(new_balance)
}

/// Administrative overwrite of a balance row, used when an account is edited.
/// Not a ledger event: nothing in the transaction log explains the change.
pub fn set_balance(
    conn: &Connection,
    account_id: i64,
    user_id: i64,
    amount: Decimal,
    currency: &str,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO current_account_balance(user_id, account_id, balance, currency, last_modified_date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, account_id) DO UPDATE SET
            balance=excluded.balance,
            currency=excluded.currency,
            last_modified_date=excluded.last_modified_date",
        params![user_id, account_id, amount.to_string(), currency, today()],
    )?;
    tracing::info!(account_id, user_id, %amount, "balance overwritten");
    Ok(())
}

pub fn current_balance(
    conn: &Connection,
    account_id: i64,
    user_id: i64,
) -> LedgerResult<Option<CurrentBalance>> {
    Ok(conn
        .query_row(
            "SELECT user_id, account_id, balance, currency, last_modified_date
             FROM current_account_balance WHERE account_id=?1 AND user_id=?2",
            params![account_id, user_id],
            |r| {
                Ok(CurrentBalance {
                    user_id: r.get(0)?,
                    account_id: r.get(1)?,
                    balance: get_decimal(r, 2)?,
                    currency: r.get(3)?,
                    last_modified: r.get(4)?,
                })
            },
        )
        .optional()?)
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceRow {
    pub account_id: i64,
    pub account: String,
    pub account_type: String,
    pub balance: Decimal,
    pub currency: String,
    pub last_modified: String,
}

pub fn list_balances(conn: &Connection, user_id: i64) -> LedgerResult<Vec<BalanceRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.type, b.balance, b.currency, b.last_modified_date
         FROM current_account_balance b JOIN accounts a ON b.account_id=a.id
         WHERE b.user_id=?1 AND a.user_id=?1
         ORDER BY a.name, a.id",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok(BalanceRow {
            account_id: r.get(0)?,
            account: r.get(1)?,
            account_type: r.get(2)?,
            balance: get_decimal(r, 3)?,
            currency: r.get(4)?,
            last_modified: r.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn balance_history(
    conn: &Connection,
    user_id: i64,
    period: Option<Period>,
) -> LedgerResult<Vec<BalanceSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, account_id, balance, currency, month, created_at
         FROM balance_history
         WHERE user_id=?1 AND (?2 IS NULL OR month=?2)
         ORDER BY month, account_id, id",
    )?;
    let month = period.map(|p| p.first_day());
    let rows = stmt.query_map(params![user_id, month], |r| {
        Ok(BalanceSnapshot {
            id: r.get(0)?,
            user_id: r.get(1)?,
            account_id: r.get(2)?,
            balance: get_decimal(r, 3)?,
            currency: r.get(4)?,
            month: r.get(5)?,
            created_at: r.get(6)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceCheck {
    pub account_id: i64,
    pub account: String,
    pub recorded: Decimal,
    pub real: Decimal,
    pub delta: Decimal,
}

/// Compares recorded bank balances with balances reported by the user.
/// Accounts without a reported figure are taken as matching.
pub fn check_balances(
    conn: &Connection,
    user_id: i64,
    real: &HashMap<i64, Decimal>,
) -> LedgerResult<Vec<BalanceCheck>> {
    list_balances(conn, user_id)?
        .into_iter()
        .filter(|b| b.account_type.eq_ignore_ascii_case(BANK_ACCOUNT))
        .map(|b| {
            let reported = real.get(&b.account_id).copied().unwrap_or(b.balance);
            let delta = reported
                .checked_sub(b.balance)
                .ok_or_else(LedgerError::out_of_range)?;
            Ok(BalanceCheck {
                account_id: b.account_id,
                account: b.account,
                recorded: b.balance,
                real: reported,
                delta,
            })
        })
        .collect()
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let data = list_balances(conn, user_id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|b| {
                vec![
                    b.account.clone(),
                    b.account_type.clone(),
                    format!("{:.2}", b.balance),
                    b.currency.clone(),
                    b.last_modified.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Account", "Type", "Balance", "CCY", "Modified"], rows)
        );
    }
    Ok(())
}

fn history(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let period = match sub.get_one::<String>("month") {
        Some(m) => Some(parse_month(m)?),
        None => None,
    };
    let data = balance_history(conn, user_id, period)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|h| {
                vec![
                    Period::of(h.month).to_string(),
                    h.account_id.to_string(),
                    format!("{:.2}", h.balance),
                    h.currency.clone(),
                    h.created_at.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Month", "Account", "Balance", "CCY", "Snapshot"], rows)
        );
    }
    Ok(())
}

fn check(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let mut real = HashMap::new();
    if let Some(values) = sub.get_many::<String>("real") {
        for raw in values {
            let (name, amount) = raw
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected ACCOUNT=AMOUNT, got '{}'", raw))?;
            let account_id = id_for_account(conn, user_id, name)?;
            let amount = parse_decimal(amount)
                .with_context(|| format!("Invalid real balance for '{}'", name))?;
            real.insert(account_id, amount);
        }
    }
    let data = check_balances(conn, user_id, &real)?;
    let rows = data
        .iter()
        .map(|c| {
            vec![
                c.account.clone(),
                format!("{:.2}", c.recorded),
                format!("{:.2}", c.real),
                format!("{:+.2}", c.delta),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Account", "Recorded", "Real", "Delta"], rows)
    );
    Ok(())
}
