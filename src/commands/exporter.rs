// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::balances::balance_history;
use crate::commands::transactions::list_transactions;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        Some(("history", sub)) => export_history(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();

    let mut rows = list_transactions(conn, user_id, None, None)?;
    rows.reverse();

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id", "date", "type", "account", "target", "category", "amount", "currency",
                "comment",
            ])?;
            for r in rows {
                wtr.write_record([
                    r.id.to_string(),
                    r.date,
                    r.r#type,
                    r.account,
                    r.target,
                    r.category,
                    r.amount,
                    r.currency,
                    r.comment,
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(&rows)?)?;
        }
        _ => return Err(anyhow!("Unknown format: {} (use csv|json)", fmt)),
    }
    println!("Exported transactions to {}", out);
    Ok(())
}

fn export_history(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();

    let rows = balance_history(conn, user_id, None)?;
    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record(["month", "account_id", "balance", "currency", "created_at"])?;
            for h in rows {
                wtr.write_record([
                    h.month.format("%Y-%m").to_string(),
                    h.account_id.to_string(),
                    h.balance.to_string(),
                    h.currency,
                    h.created_at.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = rows
                .iter()
                .map(|h| {
                    json!({
                        "month": h.month.format("%Y-%m").to_string(),
                        "account_id": h.account_id,
                        "balance": h.balance.to_string(),
                        "currency": h.currency,
                        "created_at": h.created_at.to_string(),
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => return Err(anyhow!("Unknown format: {} (use csv|json)", fmt)),
    }
    println!("Exported balance history to {}", out);
    Ok(())
}
