// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::balances::{apply_delta, set_balance};
use crate::commands::users::get_user;
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Account, BANK_ACCOUNT, Direction};
use crate::utils::{
    atomically, get_default_currency, id_for_account, parse_currency, parse_decimal,
    pretty_table, today,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

const ACCOUNT_COLUMNS: &str = "id, user_id, name, type, currency, effective_from, effective_to";

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap().trim().to_string();
            let typ = sub.get_one::<String>("type").unwrap().trim().to_lowercase();
            let ccy = match sub.get_one::<String>("currency") {
                Some(c) => parse_currency(c)?,
                None => get_default_currency(conn)?,
            };
            let amount = match sub.get_one::<String>("amount") {
                Some(a) => parse_decimal(a)?,
                None => Decimal::ZERO,
            };
            let id = sub.get_one::<i64>("id").copied();
            let account_id = add_modify_account(conn, user_id, &name, &typ, &ccy, amount, id)?;
            println!(
                "Saved account '{}' ({}, {}) with balance {} [id {}]",
                name, typ, ccy, amount, account_id
            );
        }
        Some(("list", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let data = list_accounts(conn, user_id, sub.get_flag("all"))?;
            let rows = data
                .into_iter()
                .map(|a| {
                    vec![
                        a.id.to_string(),
                        a.name,
                        a.r#type,
                        a.currency,
                        a.effective_from.to_string(),
                        a.effective_to.map(|d| d.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["ID", "Name", "Type", "Currency", "From", "To"], rows)
            );
        }
        Some(("close", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let account_id = id_for_account(conn, user_id, name)?;
            close_account(conn, account_id, user_id, today())?;
            println!("Closed account '{}'", name.trim());
        }
        _ => {}
    }
    Ok(())
}

fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        r#type: r.get(3)?,
        currency: r.get(4)?,
        effective_from: r.get(5)?,
        effective_to: r.get(6)?,
    })
}

/// Looks up an account owned by `user_id`, active or not.
pub fn get_account(conn: &Connection, account_id: i64, user_id: i64) -> LedgerResult<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id=?1 AND user_id=?2"),
        params![account_id, user_id],
        account_from_row,
    )
    .optional()?
    .ok_or(LedgerError::UnknownAccount {
        account_id,
        user_id,
    })
}

/// The account used when a transaction names none: the user's oldest active
/// bank account.
pub fn default_account(conn: &Connection, user_id: i64) -> LedgerResult<Account> {
    conn.query_row(
        &format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE user_id=?1 AND type=?2 AND effective_to IS NULL
             ORDER BY id LIMIT 1"
        ),
        params![user_id, BANK_ACCOUNT],
        account_from_row,
    )
    .optional()?
    .ok_or(LedgerError::NoDefaultAccount(user_id))
}

pub fn list_accounts(
    conn: &Connection,
    user_id: i64,
    include_closed: bool,
) -> LedgerResult<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts
         WHERE user_id=?1 AND (?2 OR effective_to IS NULL)
         ORDER BY name, id"
    ))?;
    let rows = stmt.query_map(params![user_id, include_closed], account_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Creates the account or edits the matching active one (by id when given,
/// otherwise by name). A new account gets `amount` as its opening balance;
/// an edited one has its balance overwritten with it.
pub fn add_modify_account(
    conn: &mut Connection,
    user_id: i64,
    name: &str,
    account_type: &str,
    currency: &str,
    amount: Decimal,
    account_id: Option<i64>,
) -> LedgerResult<i64> {
    atomically(conn, |tx| {
        upsert_account(tx, user_id, name, account_type, currency, amount, account_id)
    })
}

pub fn upsert_account(
    conn: &Connection,
    user_id: i64,
    name: &str,
    account_type: &str,
    currency: &str,
    amount: Decimal,
    account_id: Option<i64>,
) -> LedgerResult<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::Validation("account name must not be empty".into()));
    }
    let account_type = account_type.trim().to_lowercase();
    if account_type.is_empty() {
        return Err(LedgerError::Validation("account type must not be empty".into()));
    }
    let currency = parse_currency(currency)?;
    get_user(conn, user_id)?;

    let existing: Option<i64> = match account_id {
        Some(id) => conn
            .query_row(
                "SELECT id FROM accounts WHERE id=?1 AND user_id=?2 AND effective_to IS NULL",
                params![id, user_id],
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT id FROM accounts WHERE name=?1 AND user_id=?2 AND effective_to IS NULL
                 ORDER BY id DESC LIMIT 1",
                params![name, user_id],
                |r| r.get(0),
            )
            .optional()?,
    };

    match existing {
        None => {
            conn.execute(
                "INSERT INTO accounts(user_id, name, type, currency, effective_from)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, name, account_type, currency, today()],
            )?;
            let id = conn.last_insert_rowid();
            apply_delta(conn, id, user_id, amount, Direction::Credit, &currency)?;
            tracing::info!(user_id, account_id = id, name, "account created");
            Ok(id)
        }
        Some(id) => {
            let current = get_account(conn, id, user_id)?;
            if current.currency != currency && has_transactions(conn, id)? {
                return Err(LedgerError::Validation(format!(
                    "account '{}' has transactions, its currency {} cannot change",
                    current.name, current.currency
                )));
            }
            conn.execute(
                "UPDATE accounts SET name=?1, type=?2, currency=?3 WHERE id=?4",
                params![name, account_type, currency, id],
            )?;
            set_balance(conn, id, user_id, amount, &currency)?;
            tracing::info!(user_id, account_id = id, name, "account updated");
            Ok(id)
        }
    }
}

fn has_transactions(conn: &Connection, account_id: i64) -> LedgerResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM transactions WHERE account_id=?1 OR target_account_id=?1 LIMIT 1",
            params![account_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Retires an account from `date` on. Its history and balance row stay.
pub fn close_account(
    conn: &Connection,
    account_id: i64,
    user_id: i64,
    date: NaiveDate,
) -> LedgerResult<()> {
    let account = get_account(conn, account_id, user_id)?;
    if !account.is_active() {
        return Err(LedgerError::Validation(format!(
            "account '{}' is already closed",
            account.name
        )));
    }
    conn.execute(
        "UPDATE accounts SET effective_to=?1 WHERE id=?2",
        params![date, account_id],
    )?;
    Ok(())
}
