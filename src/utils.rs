// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::time::Duration;

use crate::errors::{LedgerError, LedgerResult};
use crate::models::Period;

pub const FALLBACK_CURRENCY: &str = "HUF";

const UA: &str = concat!("purse/", env!("CARGO_PKG_VERSION"));

static CURRENCY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));

pub fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_month(s: &str) -> Result<Period> {
    Ok(s.parse::<Period>()?)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Normalizes an ISO 4217 code; anything but three letters is rejected.
pub fn parse_currency(s: &str) -> LedgerResult<String> {
    let code = s.trim().to_uppercase();
    if CURRENCY_CODE.is_match(&code) {
        Ok(code)
    } else {
        Err(LedgerError::Validation(format!(
            "Invalid currency '{}', expected a three letter ISO code",
            s
        )))
    }
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {}", ccy, d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Reads a decimal stored as TEXT.
pub fn get_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    s.trim().parse::<Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Runs `f` inside one store transaction. Nothing is committed unless `f`
/// returns `Ok`; dropping the transaction on error rolls every write back.
pub fn atomically<T, E, F>(conn: &mut Connection, f: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, E>,
{
    let tx = conn.transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

pub fn id_for_account(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare(
        "SELECT id FROM accounts WHERE user_id=?1 AND name=?2 AND effective_to IS NULL ORDER BY id DESC LIMIT 1",
    )?;
    let id: i64 = stmt
        .query_row(params![user_id, name.trim()], |r| r.get(0))
        .with_context(|| format!("Account '{}' not found for user {}", name, user_id))?;
    Ok(id)
}

pub fn id_for_category(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare(
        "SELECT id FROM categories WHERE user_id=?1 AND name=?2 ORDER BY effective_to IS NOT NULL, id DESC LIMIT 1",
    )?;
    let id: i64 = stmt
        .query_row(params![user_id, name.trim()], |r| r.get(0))
        .with_context(|| format!("Category '{}' not found for user {}", name, user_id))?;
    Ok(id)
}

pub fn get_setting(conn: &Connection, key: &str) -> LedgerResult<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| r.get(0))
        .optional()?)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Currency used when a transaction, account or plan does not name one.
pub fn get_default_currency(conn: &Connection) -> LedgerResult<String> {
    Ok(get_setting(conn, "default_currency")?.unwrap_or_else(|| FALLBACK_CURRENCY.to_string()))
}

pub fn set_default_currency(conn: &Connection, ccy: &str) -> LedgerResult<String> {
    let code = parse_currency(ccy)?;
    set_setting(conn, "default_currency", &code)?;
    Ok(code)
}

/// Converts `amount` from `from_ccy` to `to_ccy` with the rate stamped exactly
/// on `date`. Same-currency conversion never touches the store.
pub fn fx_convert(
    conn: &Connection,
    date: NaiveDate,
    amount: Decimal,
    from_ccy: &str,
    to_ccy: &str,
) -> LedgerResult<Decimal> {
    if from_ccy == to_ccy {
        return Ok(amount);
    }
    let rate: Option<Decimal> = conn
        .query_row(
            "SELECT rate FROM exchange_rates WHERE from_currency=?1 AND to_currency=?2 AND date=?3",
            params![from_ccy, to_ccy, date],
            |r| get_decimal(r, 0),
        )
        .optional()?;
    match rate {
        Some(r) => amount.checked_mul(r).ok_or_else(LedgerError::out_of_range),
        None => Err(LedgerError::RateNotFound {
            from: from_ccy.to_string(),
            to: to_ccy.to_string(),
            date,
        }),
    }
}
