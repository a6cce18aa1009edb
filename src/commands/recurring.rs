// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::categories::{get_category, is_active};
use crate::commands::planned::{add_modify_planned, last_realized};
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Period, PlannedStatus, PlannedTransaction, Recurrence, RecurringTransaction};
use crate::utils::{
    get_decimal, get_default_currency, id_for_category, parse_decimal, parse_month, pretty_table,
};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

/// Weekly rules look this many weeks ahead of their anchor.
const WEEKLY_SPAN: i64 = 6;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let category = sub.get_one::<String>("category").unwrap();
            let category_id = id_for_category(conn, user_id, category)?;
            let recurrence: Recurrence = sub.get_one::<String>("recurrence").unwrap().parse()?;
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let day = *sub.get_one::<i32>("day").unwrap_or(&10);
            let id = add_recurring(conn, user_id, category_id, recurrence, amount, day)?;
            println!(
                "Added {} rule for '{}' ({} on day {}) [id {}]",
                recurrence,
                category.trim(),
                amount,
                day,
                id
            );
        }
        Some(("list", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let rows = list_recurring(conn, user_id)?
                .into_iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.category_id.to_string(),
                        r.recurrence.to_string(),
                        format!("{:.2}", r.amount),
                        r.due_date_day.to_string(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["ID", "Category", "Recurrence", "Amount", "Day"], rows)
            );
        }
        Some(("preview", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let period = parse_month(sub.get_one::<String>("month").unwrap())?;
            let rows = preview_month(conn, user_id, period)?
                .into_iter()
                .map(|p| {
                    vec![
                        p.due_date.to_string(),
                        p.category_id.to_string(),
                        format!("{:.2}", p.amount),
                        p.currency,
                    ]
                })
                .collect();
            println!("{}", pretty_table(&["Due", "Category", "Amount", "CCY"], rows));
        }
        _ => {}
    }
    Ok(())
}

/// Registers a standing rule for a category the user owns.
pub fn add_recurring(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    recurrence: Recurrence,
    amount: Decimal,
    due_date_day: i32,
) -> LedgerResult<i64> {
    get_category(conn, category_id, user_id)?;
    if amount.is_sign_negative() {
        return Err(LedgerError::Validation(format!(
            "recurring amount must not be negative, got {amount}"
        )));
    }
    conn.execute(
        "INSERT INTO recurring_transactions(user_id, category_id, recurrence, amount, due_date_day)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, category_id, recurrence, amount.to_string(), due_date_day],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_recurring(conn: &Connection, user_id: i64) -> LedgerResult<Vec<RecurringTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category_id, recurrence, amount, due_date_day
         FROM recurring_transactions WHERE user_id=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok(RecurringTransaction {
            id: r.get(0)?,
            user_id: r.get(1)?,
            category_id: r.get(2)?,
            recurrence: r.get(3)?,
            amount: get_decimal(r, 4)?,
            due_date_day: r.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// One occurrence a rule produces for a target month.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub category_id: i64,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
}

/// Due dates of a rule in `target`. `previous` is the latest realized
/// occurrence of the rule's category, used by weekly and yearly rules.
pub fn due_dates(
    rule: &RecurringTransaction,
    target: Period,
    previous: Option<&PlannedTransaction>,
) -> Vec<NaiveDate> {
    let previous_date = previous.map(|p| p.realized_date.unwrap_or(p.due_date));
    match rule.recurrence {
        Recurrence::Monthly => vec![target.day(rule.due_date_day)],
        Recurrence::Yearly => match previous_date {
            None => vec![target.day(rule.due_date_day)],
            Some(last) => vec![target.in_year(last.year() + 1).day(rule.due_date_day)],
        },
        Recurrence::Weekly => {
            let anchor = previous_date.unwrap_or_else(|| target.day(rule.due_date_day));
            (0..WEEKLY_SPAN)
                .map(|i| anchor + Duration::weeks(i))
                .filter(|d| target.contains(*d))
                .collect()
        }
        Recurrence::Daily => {
            let first = target.first_day();
            (0..=31)
                .map(|i| first + Duration::days(i))
                .filter(|d| target.contains(*d))
                .collect()
        }
    }
}

/// Occurrences of every rule of the user for `target`, without writing them.
/// Rules whose category is retired are skipped.
pub fn preview_month(conn: &Connection, user_id: i64, target: Period) -> LedgerResult<Vec<Occurrence>> {
    let default_ccy = get_default_currency(conn)?;
    let mut out = Vec::new();
    for rule in list_recurring(conn, user_id)? {
        if !is_active(conn, rule.category_id)? {
            tracing::warn!(
                rule_id = rule.id,
                category_id = rule.category_id,
                "skipping recurring transaction: category is no longer active"
            );
            continue;
        }
        let previous = match rule.recurrence {
            Recurrence::Weekly | Recurrence::Yearly => {
                last_realized(conn, user_id, rule.category_id)?
            }
            Recurrence::Monthly | Recurrence::Daily => None,
        };
        // yearly rules carry the amount and currency of the last payment
        let (amount, currency) = match (&rule.recurrence, &previous) {
            (Recurrence::Yearly, Some(p)) => (p.amount, p.currency.clone()),
            _ => (rule.amount, default_ccy.clone()),
        };
        for due_date in due_dates(&rule, target, previous.as_ref()) {
            out.push(Occurrence {
                category_id: rule.category_id,
                due_date,
                amount,
                currency: currency.clone(),
            });
        }
    }
    Ok(out)
}

/// Materializes the user's recurring rules as planned transactions for
/// `target`. Returns the ids of the new rows.
pub fn plan_month(conn: &Connection, user_id: i64, target: Period) -> LedgerResult<Vec<i64>> {
    let mut ids = Vec::new();
    for occ in preview_month(conn, user_id, target)? {
        let id = add_modify_planned(
            conn,
            user_id,
            occ.category_id,
            occ.due_date,
            occ.amount,
            &occ.currency,
            PlannedStatus::Planned,
            None,
        )?;
        ids.push(id);
    }
    tracing::info!(user_id, period = %target, planned = ids.len(), "planned transactions generated");
    Ok(ids)
}
