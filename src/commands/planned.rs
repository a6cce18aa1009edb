// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::categories::get_category;
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Period, PlannedStatus, PlannedTransaction};
use crate::utils::{
    atomically, get_decimal, get_default_currency, id_for_category, maybe_print_json,
    parse_currency, parse_date, parse_decimal, parse_month, pretty_table, today,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

const PLANNED_COLUMNS: &str =
    "id, user_id, category_id, transaction_id, status, amount, currency, due_date, realized_date";

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let category_id =
                id_for_category(conn, user_id, sub.get_one::<String>("category").unwrap())?;
            let due = parse_date(sub.get_one::<String>("due").unwrap())?;
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let currency = match sub.get_one::<String>("currency") {
                Some(c) => parse_currency(c)?,
                None => get_default_currency(conn)?,
            };
            let status: PlannedStatus = match sub.get_one::<String>("status") {
                Some(s) => s.parse()?,
                None => PlannedStatus::Planned,
            };
            let id = add_modify_planned(
                conn,
                user_id,
                category_id,
                due,
                amount,
                &currency,
                status,
                sub.get_one::<i64>("id").copied(),
            )?;
            println!("Saved planned transaction {} due {}", id, due);
        }
        Some(("list", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let period = match sub.get_one::<String>("month") {
                Some(m) => Some(parse_month(m)?),
                None => None,
            };
            let data = list_planned(conn, user_id, period)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.due_date.to_string(),
                            p.category_id.to_string(),
                            p.status.to_string(),
                            format!("{:.2}", p.amount),
                            p.currency.clone(),
                            p.transaction_id.map(|t| t.to_string()).unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Due", "Category", "Status", "Amount", "CCY", "Transaction"],
                        rows
                    )
                );
            }
        }
        Some(("link", sub)) => {
            let transaction_id = *sub.get_one::<i64>("transaction").unwrap();
            let planned_id = *sub.get_one::<i64>("planned").unwrap();
            link_planned_transaction(conn, transaction_id, planned_id)?;
            println!(
                "Linked transaction {} to planned transaction {}",
                transaction_id, planned_id
            );
        }
        Some(("overdue", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let n = mark_overdue(conn, user_id, today())?;
            println!("Marked {} planned transaction(s) overdue", n);
        }
        _ => {}
    }
    Ok(())
}

fn planned_from_row(r: &Row<'_>) -> rusqlite::Result<PlannedTransaction> {
    Ok(PlannedTransaction {
        id: r.get(0)?,
        user_id: r.get(1)?,
        category_id: r.get(2)?,
        transaction_id: r.get(3)?,
        status: r.get(4)?,
        amount: get_decimal(r, 5)?,
        currency: r.get(6)?,
        due_date: r.get(7)?,
        realized_date: r.get(8)?,
    })
}

pub fn get_planned(conn: &Connection, planned_id: i64) -> LedgerResult<PlannedTransaction> {
    conn.query_row(
        &format!("SELECT {PLANNED_COLUMNS} FROM planned_transactions WHERE id=?1"),
        params![planned_id],
        planned_from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound {
        entity: "Planned transaction",
        id: planned_id,
    })
}

/// Creates a planned transaction, or rewrites the user's planned row
/// `planned_id` when it exists.
#[allow(clippy::too_many_arguments)]
pub fn add_modify_planned(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    due_date: NaiveDate,
    amount: Decimal,
    currency: &str,
    status: PlannedStatus,
    planned_id: Option<i64>,
) -> LedgerResult<i64> {
    get_category(conn, category_id, user_id)?;
    if amount.is_sign_negative() {
        return Err(LedgerError::Validation(format!(
            "planned amount must not be negative, got {amount}"
        )));
    }
    let currency = parse_currency(currency)?;

    let existing: Option<i64> = match planned_id {
        Some(id) => conn
            .query_row(
                "SELECT id FROM planned_transactions WHERE id=?1 AND user_id=?2",
                params![id, user_id],
                |r| r.get(0),
            )
            .optional()?,
        None => None,
    };
    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE planned_transactions SET category_id=?1, amount=?2, currency=?3, due_date=?4, status=?5
                 WHERE id=?6",
                params![category_id, amount.to_string(), currency, due_date, status, id],
            )?;
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO planned_transactions(user_id, category_id, status, amount, currency, due_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, category_id, status, amount.to_string(), currency, due_date],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

pub fn list_planned(
    conn: &Connection,
    user_id: i64,
    period: Option<Period>,
) -> LedgerResult<Vec<PlannedTransaction>> {
    let (from, to) = match period {
        Some(p) => (Some(p.first_day()), Some(p.last_day())),
        None => (None, None),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLANNED_COLUMNS} FROM planned_transactions
         WHERE user_id=?1 AND (?2 IS NULL OR due_date BETWEEN ?2 AND ?3)
         ORDER BY due_date, id"
    ))?;
    let rows = stmt.query_map(params![user_id, from, to], planned_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Most recent realized occurrence for a category, by due date.
pub fn last_realized(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
) -> LedgerResult<Option<PlannedTransaction>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {PLANNED_COLUMNS} FROM planned_transactions
                 WHERE user_id=?1 AND category_id=?2 AND status=?3
                 ORDER BY due_date DESC, id DESC LIMIT 1"
            ),
            params![user_id, category_id, PlannedStatus::Realized],
            planned_from_row,
        )
        .optional()?)
}

/// Binds a recorded transaction to the planned row it fulfils: the row turns
/// realized and takes the transaction's amount and date.
pub fn link_planned_transaction(
    conn: &mut Connection,
    transaction_id: i64,
    planned_id: i64,
) -> LedgerResult<()> {
    atomically(conn, |tx| {
        let trx: Option<(i64, NaiveDate, Decimal)> = tx
            .query_row(
                "SELECT user_id, date, amount FROM transactions WHERE id=?1",
                params![transaction_id],
                |r| Ok((r.get(0)?, r.get(1)?, get_decimal(r, 2)?)),
            )
            .optional()?;
        let (user_id, date, amount) = trx.ok_or(LedgerError::NotFound {
            entity: "Transaction",
            id: transaction_id,
        })?;
        let planned = get_planned(tx, planned_id)?;
        if planned.user_id != user_id {
            return Err(LedgerError::Validation(format!(
                "planned transaction {planned_id} and transaction {transaction_id} belong to different users"
            )));
        }
        tx.execute(
            "UPDATE planned_transactions
             SET transaction_id=?1, status=?2, amount=?3, realized_date=?4
             WHERE id=?5",
            params![
                transaction_id,
                PlannedStatus::Realized,
                amount.to_string(),
                date,
                planned_id
            ],
        )?;
        tracing::info!(transaction_id, planned_id, "planned transaction realized");
        Ok(())
    })
}

/// Flips still-planned rows whose due date is before `today` to overdue.
pub fn mark_overdue(conn: &Connection, user_id: i64, today: NaiveDate) -> LedgerResult<usize> {
    let n = conn.execute(
        "UPDATE planned_transactions SET status=?1
         WHERE user_id=?2 AND status=?3 AND transaction_id IS NULL AND due_date < ?4",
        params![PlannedStatus::Overdue, user_id, PlannedStatus::Planned, today],
    )?;
    if n > 0 {
        tracing::info!(user_id, count = n, "planned transactions overdue");
    }
    Ok(n)
}
