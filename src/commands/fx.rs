// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{DEFAULT_SYMBOLS, RatesConfig};
use crate::errors::LedgerResult;
use crate::models::ExchangeRate;
use crate::utils::{
    atomically, fmt_money, fx_convert, get_decimal, http_client, parse_currency, parse_date,
    parse_decimal, pretty_table, set_default_currency, today,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

const PIVOT: &str = "USD";

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches, rates: &RatesConfig) -> Result<()> {
    match m.subcommand() {
        Some(("set-default", sub)) => {
            let ccy = set_default_currency(conn, sub.get_one::<String>("currency").unwrap())?;
            println!("Default currency set to {}", ccy);
        }
        Some(("fetch", _)) => {
            let source = OpenExchangeRates::new(rates.clone())?;
            let n = load_exchange_rates(conn, &source)?;
            if n == 0 {
                println!("No exchange rates available right now.");
            } else {
                println!("Stored {} exchange rate(s).", n);
            }
        }
        Some(("set", sub)) => {
            let rate = ExchangeRate {
                from_currency: parse_currency(sub.get_one::<String>("from").unwrap())?,
                to_currency: parse_currency(sub.get_one::<String>("to").unwrap())?,
                rate: parse_decimal(sub.get_one::<String>("rate").unwrap())?,
                date: match sub.get_one::<String>("date") {
                    Some(d) => parse_date(d)?,
                    None => today(),
                },
            };
            store_rate(conn, &rate)?;
            println!(
                "Stored {}/{} = {} on {}",
                rate.from_currency, rate.to_currency, rate.rate, rate.date
            );
        }
        Some(("list", _)) => {
            let rows = list_rates(conn, 50)?
                .into_iter()
                .map(|r| {
                    vec![
                        r.date.to_string(),
                        r.from_currency,
                        r.to_currency,
                        r.rate.to_string(),
                    ]
                })
                .collect();
            println!("{}", pretty_table(&["Date", "From", "To", "Rate"], rows));
        }
        Some(("convert", sub)) => {
            let date = match sub.get_one::<String>("date") {
                Some(d) => parse_date(d)?,
                None => today(),
            };
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let from = parse_currency(sub.get_one::<String>("from").unwrap())?;
            let to = parse_currency(sub.get_one::<String>("to").unwrap())?;
            let res = fx_convert(conn, date, amount, &from, &to)?;
            println!("{} -> {}", fmt_money(&amount, &from), fmt_money(&res, &to));
        }
        _ => {}
    }
    Ok(())
}

/// A provider of today's exchange rates. Implementations never fail: an
/// unavailable feed yields no rates.
pub trait RateSource {
    fn latest(&self, symbols: &[String]) -> Vec<ExchangeRate>;
}

/// Open Exchange Rates `latest.json` client. The service always quotes
/// against USD; other pairs are derived through that pivot.
pub struct OpenExchangeRates {
    client: reqwest::blocking::Client,
    cfg: RatesConfig,
}

#[derive(Debug, Deserialize)]
struct Latest {
    rates: HashMap<String, f64>,
}

impl OpenExchangeRates {
    pub fn new(cfg: RatesConfig) -> Result<Self> {
        let client = http_client(cfg.timeout)?;
        Ok(OpenExchangeRates { client, cfg })
    }

    fn fetch_usd_rates(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        let app_id = self
            .cfg
            .app_id
            .as_deref()
            .context("PURSE_RATES_APP_ID is not set")?;
        let url = format!("{}/latest.json", self.cfg.base_url.trim_end_matches('/'));
        let joined = symbols.join(",");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("app_id", app_id), ("symbols", joined.as_str())])
            .send()?
            .error_for_status()?;
        let body: Latest = resp.json().context("Parse exchange rate response")?;
        Ok(usd_rates(body.rates))
    }
}

impl RateSource for OpenExchangeRates {
    fn latest(&self, symbols: &[String]) -> Vec<ExchangeRate> {
        if symbols.is_empty() {
            return Vec::new();
        }
        match self.fetch_usd_rates(symbols) {
            Ok(usd) => pivot_rates(&usd, symbols, today()),
            Err(err) => {
                tracing::warn!(error = %err, "error fetching exchange rates");
                Vec::new()
            }
        }
    }
}

/// Converts raw feed quotes to decimals, dropping values that do not fit.
pub fn usd_rates(raw: HashMap<String, f64>) -> HashMap<String, Decimal> {
    raw.into_iter()
        .filter_map(|(ccy, v)| match Decimal::try_from(v) {
            Ok(d) => Some((ccy, d)),
            Err(_) => {
                tracing::warn!(currency = %ccy, value = v, "unusable rate in feed response");
                None
            }
        })
        .collect()
}

/// Every ordered pair among `symbols` present in `usd` (USD-based quotes),
/// with `rate(from -> to) = usd[to] / usd[from]`. Missing symbols are skipped.
pub fn pivot_rates(
    usd: &HashMap<String, Decimal>,
    symbols: &[String],
    date: NaiveDate,
) -> Vec<ExchangeRate> {
    let mut out = Vec::new();
    for from in symbols {
        let Some(from_rate) = usd.get(from) else {
            tracing::debug!(currency = %from, "symbol not found in the response");
            continue;
        };
        if from != PIVOT && from_rate.is_zero() {
            continue;
        }
        for to in symbols {
            let Some(to_rate) = usd.get(to) else {
                continue;
            };
            let rate = if from == PIVOT {
                *to_rate
            } else {
                match to_rate.checked_div(*from_rate) {
                    Some(r) => r,
                    None => {
                        tracing::warn!(from = %from, to = %to, "cross rate out of range");
                        continue;
                    }
                }
            };
            out.push(ExchangeRate {
                from_currency: from.clone(),
                to_currency: to.clone(),
                rate,
                date,
            });
        }
    }
    out
}

/// Currencies the ledger knows about: stored rates, accounts and transactions.
pub fn distinct_currencies(conn: &Connection) -> LedgerResult<Vec<String>> {
    let mut out = Vec::<String>::new();
    for sql in [
        "SELECT DISTINCT from_currency FROM exchange_rates",
        "SELECT DISTINCT currency FROM accounts",
        "SELECT DISTINCT currency FROM transactions",
    ] {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        for row in rows {
            let c: String = row?;
            if !c.is_empty() && !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out.sort();
    Ok(out)
}

pub fn store_rate(conn: &Connection, rate: &ExchangeRate) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO exchange_rates(from_currency, to_currency, rate, date) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(from_currency, to_currency, date) DO UPDATE SET rate=excluded.rate",
        params![
            rate.from_currency,
            rate.to_currency,
            rate.rate.to_string(),
            rate.date
        ],
    )?;
    Ok(())
}

/// Refreshes the rate store from `source` for every currency in use (or the
/// default set on an empty ledger). The feed is queried outside the write
/// transaction. Returns how many rates were stored; zero when the feed had
/// nothing to offer.
pub fn load_exchange_rates(conn: &mut Connection, source: &dyn RateSource) -> LedgerResult<usize> {
    let mut symbols = distinct_currencies(conn)?;
    if symbols.is_empty() {
        symbols = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
    }
    let rates = source.latest(&symbols);
    if rates.is_empty() {
        tracing::warn!("no exchange rates available, keeping stored rates");
        return Ok(0);
    }
    atomically(conn, |tx| {
        for rate in &rates {
            store_rate(tx, rate)?;
        }
        Ok(rates.len())
    })
}

pub fn list_rates(conn: &Connection, limit: usize) -> LedgerResult<Vec<ExchangeRate>> {
    let mut stmt = conn.prepare(
        "SELECT from_currency, to_currency, rate, date FROM exchange_rates
         ORDER BY date DESC, from_currency, to_currency LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |r| {
        Ok(ExchangeRate {
            from_currency: r.get(0)?,
            to_currency: r.get(1)?,
            rate: get_decimal(r, 2)?,
            date: r.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
