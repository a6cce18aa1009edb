// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::recurring::plan_month;
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Period, PlannedStatus};
use crate::utils::{atomically, parse_month, pretty_table, today};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("close", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let period = parse_month(sub.get_one::<String>("month").unwrap())?;
            let summary = close_month(conn, user_id, period, today())?;
            println!(
                "Closed {} for user {}: {} balance snapshot(s), {} cancelled, {} planned for {}",
                summary.period,
                user_id,
                summary.snapshots,
                summary.cancelled,
                summary.planned.len(),
                summary.period.next()
            );
        }
        Some(("list", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let rows = closed_periods(conn, user_id)?
                .into_iter()
                .map(|p| vec![p.to_string()])
                .collect();
            println!("{}", pretty_table(&["Closed month"], rows));
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseSummary {
    pub period: Period,
    pub snapshots: usize,
    pub cancelled: usize,
    pub planned: Vec<i64>,
}

pub fn is_closed(conn: &Connection, user_id: i64, period: Period) -> LedgerResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM closed_months WHERE user_id=?1 AND year=?2 AND month=?3",
            params![user_id, period.year, period.month],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn closed_periods(conn: &Connection, user_id: i64) -> LedgerResult<Vec<Period>> {
    let mut stmt = conn.prepare(
        "SELECT year, month FROM closed_months WHERE user_id=?1 ORDER BY year, month",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok(Period {
            year: r.get(0)?,
            month: r.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Closes `period` for the user in one unit of work: snapshots the user's
/// current balances, cancels planned rows of the month that were never
/// realized, plans the following month from the recurring rules and locks
/// the month. A month can be closed once.
pub fn close_month(
    conn: &mut Connection,
    user_id: i64,
    period: Period,
    today: NaiveDate,
) -> LedgerResult<CloseSummary> {
    atomically(conn, |tx| {
        if is_closed(tx, user_id, period)? {
            return Err(LedgerError::AlreadyClosed { period, user_id });
        }
        tracing::info!(user_id, period = %period, "closing month");

        let snapshots = tx.execute(
            "INSERT INTO balance_history(user_id, account_id, balance, currency, month, created_at)
             SELECT user_id, account_id, balance, currency, ?2, ?3
             FROM current_account_balance WHERE user_id=?1
             ORDER BY account_id",
            params![user_id, period.first_day(), today],
        )?;

        let cancelled = tx.execute(
            "UPDATE planned_transactions SET status=?1
             WHERE user_id=?2 AND due_date BETWEEN ?3 AND ?4 AND status != ?5",
            params![
                PlannedStatus::Cancelled,
                user_id,
                period.first_day(),
                period.last_day(),
                PlannedStatus::Realized
            ],
        )?;

        let planned = plan_month(tx, user_id, period.next())?;

        tx.execute(
            "INSERT INTO closed_months(user_id, month, year) VALUES (?1, ?2, ?3)",
            params![user_id, period.month, period.year],
        )?;

        tracing::info!(
            user_id,
            period = %period,
            snapshots,
            cancelled,
            planned = planned.len(),
            "month closed"
        );
        Ok(CloseSummary {
            period,
            snapshots,
            cancelled,
            planned,
        })
    })
}
