// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::LedgerResult;
use crate::models::PlannedStatus;
use crate::utils::{pretty_table, today};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user_id = *m.get_one::<i64>("user").unwrap();
    let issues = diagnose(conn, user_id, today())?;
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

/// Integrity report for one user's ledger.
pub fn diagnose(conn: &Connection, user_id: i64, today: NaiveDate) -> LedgerResult<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) Transactions whose balance effect needs a rate that is not stored
    let mut stmt = conn.prepare(
        "SELECT t.id, t.date, t.currency, a.currency, ta.currency
         FROM transactions t
         JOIN accounts a ON t.account_id=a.id
         LEFT JOIN accounts ta ON t.target_account_id=ta.id AND t.type='transfer'
         WHERE t.user_id=?1
         ORDER BY t.date, t.id",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, NaiveDate>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
        ))
    })?;
    let mut rate_stmt = conn.prepare(
        "SELECT 1 FROM exchange_rates WHERE from_currency=?1 AND to_currency=?2 AND date=?3",
    )?;
    for row in rows {
        let (id, date, ccy, account_ccy, target_ccy) = row?;
        for to in std::iter::once(account_ccy).chain(target_ccy) {
            if to == ccy {
                continue;
            }
            let ok: Option<i32> = rate_stmt
                .query_row(params![ccy, to, date], |r| r.get(0))
                .optional()?;
            if ok.is_none() {
                issues.push(Issue {
                    kind: "missing_fx",
                    detail: format!("transaction {} on {}: {} -> {}", id, date, ccy, to),
                });
            }
        }
    }

    // 2) Active accounts the ledger has never seen
    let mut stmt2 = conn.prepare(
        "SELECT a.name FROM accounts a
         LEFT JOIN current_account_balance b ON b.account_id=a.id AND b.user_id=a.user_id
         WHERE a.user_id=?1 AND a.effective_to IS NULL AND b.id IS NULL
         ORDER BY a.name",
    )?;
    let names = stmt2.query_map(params![user_id], |r| r.get::<_, String>(0))?;
    for name in names {
        issues.push(Issue {
            kind: "no_balance_row",
            detail: name?,
        });
    }

    // 3) Planned items past due that nobody linked
    let mut stmt3 = conn.prepare(
        "SELECT id, due_date FROM planned_transactions
         WHERE user_id=?1 AND status IN (?2, ?3) AND transaction_id IS NULL AND due_date < ?4
         ORDER BY due_date, id",
    )?;
    let overdue = stmt3.query_map(
        params![user_id, PlannedStatus::Planned, PlannedStatus::Overdue, today],
        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, NaiveDate>(1)?)),
    )?;
    for row in overdue {
        let (id, due) = row?;
        issues.push(Issue {
            kind: "overdue_plan",
            detail: format!("planned transaction {} due {}", id, due),
        });
    }

    Ok(issues)
}
