// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::accounts::upsert_account;
use crate::commands::categories::{DEFAULT_CATEGORIES, add_modify_category};
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{BANK_ACCOUNT, User};
use crate::utils::{atomically, get_default_currency, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let first = sub.get_one::<String>("first").unwrap();
            let last = sub.get_one::<String>("last").unwrap();
            let balance = match sub.get_one::<String>("balance") {
                Some(b) => parse_decimal(b)?,
                None => Decimal::ZERO,
            };
            let (user_id, account_id) = add_new_user(conn, first, last, balance)?;
            println!(
                "Added user {} {} [id {}] with default account {}",
                first.trim(),
                last.trim(),
                user_id,
                account_id
            );
        }
        Some(("list", _)) => {
            let rows = list_users(conn)?
                .into_iter()
                .map(|u| vec![u.id.to_string(), u.first_name, u.last_name])
                .collect();
            println!("{}", pretty_table(&["ID", "First", "Last"], rows));
        }
        _ => {}
    }
    Ok(())
}

/// Creates a user with the default categories and a `Bank` account holding
/// `balance` in the default currency. Returns `(user_id, account_id)`.
pub fn add_new_user(
    conn: &mut Connection,
    first_name: &str,
    last_name: &str,
    balance: Decimal,
) -> LedgerResult<(i64, i64)> {
    atomically(conn, |tx| {
        let first_name = first_name.trim();
        if first_name.is_empty() {
            return Err(LedgerError::Validation("first name must not be empty".into()));
        }
        tx.execute(
            "INSERT INTO users(first_name, last_name) VALUES (?1, ?2)",
            params![first_name, last_name.trim()],
        )?;
        let user_id = tx.last_insert_rowid();

        for category in DEFAULT_CATEGORIES {
            add_modify_category(tx, user_id, category, None)?;
        }

        let currency = get_default_currency(tx)?;
        let account_id = upsert_account(tx, user_id, "Bank", BANK_ACCOUNT, &currency, balance, None)?;
        tracing::info!(user_id, account_id, "user created");
        Ok((user_id, account_id))
    })
}

pub fn get_user(conn: &Connection, user_id: i64) -> LedgerResult<User> {
    conn.query_row(
        "SELECT id, first_name, last_name FROM users WHERE id=?1",
        params![user_id],
        |r| {
            Ok(User {
                id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or(LedgerError::NotFound {
        entity: "User",
        id: user_id,
    })
}

pub fn list_users(conn: &Connection) -> LedgerResult<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, first_name, last_name FROM users ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(User {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
