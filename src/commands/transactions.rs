// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::accounts::{default_account, get_account};
use crate::commands::balances::apply_delta;
use crate::commands::categories::get_category;
use crate::commands::close::is_closed;
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Account, Direction, Period, Transaction, TransactionType};
use crate::utils::{
    atomically, fx_convert, get_decimal, get_default_currency, id_for_account, id_for_category,
    maybe_print_json, parse_currency, parse_date, parse_decimal, parse_month, pretty_table,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("edit", sub)) => edit(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Input of [`post_transaction`]. Account and currency fall back to the
/// user's default bank account and the configured default currency.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub category_id: i64,
    pub r#type: TransactionType,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub account_id: Option<i64>,
    pub currency: Option<String>,
    pub comment: Option<String>,
    pub target_account_id: Option<i64>,
}

impl NewTransaction {
    pub fn new(
        user_id: i64,
        category_id: i64,
        r#type: TransactionType,
        date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        NewTransaction {
            user_id,
            category_id,
            r#type,
            date,
            amount,
            account_id: None,
            currency: None,
            comment: None,
            target_account_id: None,
        }
    }

    pub fn account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn target(mut self, account_id: i64) -> Self {
        self.target_account_id = Some(account_id);
        self
    }
}

/// The fields of a recorded transaction that may be edited. `None` leaves a
/// field unchanged. The stored target is dropped when the resulting type is
/// not a transfer.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub target_account_id: Option<i64>,
    pub r#type: Option<TransactionType>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub comment: Option<String>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.category_id.is_none()
            && self.target_account_id.is_none()
            && self.r#type.is_none()
            && self.date.is_none()
            && self.amount.is_none()
            && self.currency.is_none()
            && self.comment.is_none()
    }

    /// True when applying the changes alters the transaction's balance effect.
    pub fn affects_balance(&self) -> bool {
        self.amount.is_some()
            || self.account_id.is_some()
            || self.target_account_id.is_some()
            || self.r#type.is_some()
            || self.currency.is_some()
            || self.date.is_some()
    }

    fn merged_into(&self, trx: &Transaction) -> Transaction {
        let mut next = trx.clone();
        if let Some(v) = self.account_id {
            next.account_id = v;
        }
        if let Some(v) = self.category_id {
            next.category_id = v;
        }
        if let Some(v) = self.target_account_id {
            next.target_account_id = Some(v);
        }
        if let Some(v) = self.r#type {
            next.r#type = v;
        }
        if let Some(v) = self.date {
            next.date = v;
        }
        if let Some(v) = self.amount {
            next.amount = v;
        }
        if let Some(v) = &self.currency {
            next.currency = v.clone();
        }
        if let Some(v) = &self.comment {
            next.comment = Some(v.clone());
        }
        if next.r#type != TransactionType::Transfer {
            next.target_account_id = None;
        }
        next
    }
}

/// Fails with `PeriodClosed` when `date` lies in a month closed for the user.
pub fn ensure_open(conn: &Connection, user_id: i64, date: NaiveDate) -> LedgerResult<()> {
    let period = Period::of(date);
    if is_closed(conn, user_id, period)? {
        return Err(LedgerError::PeriodClosed { date, period });
    }
    Ok(())
}

fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn active_account(conn: &Connection, account_id: i64, user_id: i64) -> LedgerResult<Account> {
    let account = get_account(conn, account_id, user_id)?;
    if !account.is_active() {
        return Err(LedgerError::Validation(format!(
            "account '{}' is closed",
            account.name
        )));
    }
    Ok(account)
}

fn ensure_transfer_target(trx: &Transaction) -> LedgerResult<()> {
    if trx.r#type != TransactionType::Transfer {
        return match trx.target_account_id {
            Some(_) => Err(target_not_allowed(trx.r#type)),
            None => Ok(()),
        };
    }
    match trx.target_account_id {
        None => Err(LedgerError::MissingTarget),
        Some(target) if target == trx.account_id => Err(LedgerError::Validation(
            "transfer source and target must differ".into(),
        )),
        Some(_) => Ok(()),
    }
}

fn target_not_allowed(kind: TransactionType) -> LedgerError {
    LedgerError::Validation(format!(
        "a {kind} transaction cannot have a target account"
    ))
}

/// Records a transaction and applies its balance effect as one unit of work.
pub fn post_transaction(conn: &mut Connection, req: &NewTransaction) -> LedgerResult<i64> {
    atomically(conn, |tx| record_transaction(tx, req))
}

/// [`post_transaction`] for callers that already hold a unit of work.
pub fn record_transaction(conn: &Connection, req: &NewTransaction) -> LedgerResult<i64> {
    let user_id = req.user_id;
    let account = match req.account_id {
        Some(id) => active_account(conn, id, user_id)?,
        None => {
            let account = default_account(conn, user_id)?;
            tracing::info!(
                user_id,
                account = %account.name,
                "no account provided, using default bank account"
            );
            account
        }
    };
    match (req.r#type, req.target_account_id) {
        (TransactionType::Transfer, None) => return Err(LedgerError::MissingTarget),
        (kind, Some(_)) if kind != TransactionType::Transfer => {
            return Err(target_not_allowed(kind));
        }
        _ => {}
    }
    get_category(conn, req.category_id, user_id)?;
    ensure_open(conn, user_id, req.date)?;
    ensure_positive(req.amount)?;
    if let Some(target) = req.target_account_id {
        active_account(conn, target, user_id)?;
    }
    let currency = match &req.currency {
        Some(c) => parse_currency(c)?,
        None => get_default_currency(conn)?,
    };

    let mut trx = Transaction {
        id: 0,
        user_id,
        account_id: account.id,
        category_id: req.category_id,
        target_account_id: req.target_account_id,
        r#type: req.r#type,
        date: req.date,
        amount: req.amount,
        currency,
        comment: req.comment.clone(),
    };
    ensure_transfer_target(&trx)?;

    conn.execute(
        "INSERT INTO transactions(user_id, account_id, category_id, target_account_id, type, date, amount, currency, comment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            trx.user_id,
            trx.account_id,
            trx.category_id,
            trx.target_account_id,
            trx.r#type,
            trx.date,
            trx.amount.to_string(),
            trx.currency,
            trx.comment,
        ],
    )?;
    trx.id = conn.last_insert_rowid();
    apply_balance_effect(conn, &trx, false)?;
    tracing::info!(user_id, transaction_id = trx.id, kind = %trx.r#type, amount = %trx.amount, "transaction recorded");
    Ok(trx.id)
}

/// Applies (or with `reverse`, undoes) the effect of `trx` on the current
/// balances. The amount is converted into each touched account's currency at
/// the transaction date. A transfer debits the source and credits the target,
/// except that a loan target is debited as well: paying into a loan reduces
/// the outstanding debt.
pub fn apply_balance_effect(conn: &Connection, trx: &Transaction, reverse: bool) -> LedgerResult<()> {
    let source = get_account(conn, trx.account_id, trx.user_id)?;
    let source_amount = fx_convert(conn, trx.date, trx.amount, &trx.currency, &source.currency)?;

    match trx.r#type {
        TransactionType::Debit | TransactionType::Credit => {
            let direction = Direction::try_from(trx.r#type)?.reversed_if(reverse);
            apply_delta(
                conn,
                source.id,
                trx.user_id,
                source_amount,
                direction,
                &source.currency,
            )?;
        }
        TransactionType::Transfer => {
            let target_id = trx.target_account_id.ok_or(LedgerError::MissingTarget)?;
            let target = get_account(conn, target_id, trx.user_id)?;
            let target_amount =
                fx_convert(conn, trx.date, trx.amount, &trx.currency, &target.currency)?;
            let target_direction = if target.is_loan() {
                Direction::Debit
            } else {
                Direction::Credit
            };
            apply_delta(
                conn,
                source.id,
                trx.user_id,
                source_amount,
                Direction::Debit.reversed_if(reverse),
                &source.currency,
            )?;
            apply_delta(
                conn,
                target.id,
                trx.user_id,
                target_amount,
                target_direction.reversed_if(reverse),
                &target.currency,
            )?;
        }
    }
    Ok(())
}

pub fn get_transaction(conn: &Connection, id: i64, user_id: i64) -> LedgerResult<Transaction> {
    conn.query_row(
        "SELECT id, user_id, account_id, category_id, target_account_id, type, date, amount, currency, comment
         FROM transactions WHERE id=?1 AND user_id=?2",
        params![id, user_id],
        |r| {
            Ok(Transaction {
                id: r.get(0)?,
                user_id: r.get(1)?,
                account_id: r.get(2)?,
                category_id: r.get(3)?,
                target_account_id: r.get(4)?,
                r#type: r.get(5)?,
                date: r.get(6)?,
                amount: get_decimal(r, 7)?,
                currency: r.get(8)?,
                comment: r.get(9)?,
            })
        },
    )
    .optional()?
    .ok_or(LedgerError::NotFound {
        entity: "Transaction",
        id,
    })
}

/// Edits a recorded transaction. The whole changeset is validated before
/// anything is written; when the balance effect changes, the old effect is
/// reversed with the stored values and the new one applied with the merged
/// values, so each transaction is reflected exactly once in the balances.
pub fn modify_transaction(
    conn: &mut Connection,
    id: i64,
    user_id: i64,
    changes: &TransactionChanges,
) -> LedgerResult<i64> {
    atomically(conn, |tx| amend_transaction(tx, id, user_id, changes))
}

/// [`modify_transaction`] for callers that already hold a unit of work.
pub fn amend_transaction(
    conn: &Connection,
    id: i64,
    user_id: i64,
    changes: &TransactionChanges,
) -> LedgerResult<i64> {
    let trx = get_transaction(conn, id, user_id)?;
    if changes.is_empty() {
        return Ok(trx.id);
    }

    let mut changes = changes.clone();
    if let Some(c) = &changes.currency {
        changes.currency = Some(parse_currency(c)?);
    }
    let next = changes.merged_into(&trx);
    if changes.target_account_id.is_some() && next.r#type != TransactionType::Transfer {
        return Err(target_not_allowed(next.r#type));
    }

    ensure_open(conn, user_id, trx.date)?;
    if let Some(date) = changes.date {
        ensure_open(conn, user_id, date)?;
    }
    if let Some(category_id) = changes.category_id {
        get_category(conn, category_id, user_id)?;
    }
    if let Some(account_id) = changes.account_id {
        active_account(conn, account_id, user_id)?;
    }
    if let Some(target) = changes.target_account_id {
        active_account(conn, target, user_id)?;
    }
    if let Some(amount) = changes.amount {
        ensure_positive(amount)?;
    }
    ensure_transfer_target(&next)?;

    if changes.affects_balance() {
        apply_balance_effect(conn, &trx, true)?;
        apply_balance_effect(conn, &next, false)?;
    }

    conn.execute(
        "UPDATE transactions SET account_id=?1, category_id=?2, target_account_id=?3, type=?4,
                date=?5, amount=?6, currency=?7, comment=?8
         WHERE id=?9",
        params![
            next.account_id,
            next.category_id,
            next.target_account_id,
            next.r#type,
            next.date,
            next.amount.to_string(),
            next.currency,
            next.comment,
            next.id,
        ],
    )?;
    tracing::info!(user_id, transaction_id = id, "transaction modified");
    Ok(next.id)
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub r#type: String,
    pub account: String,
    pub target: String,
    pub category: String,
    pub amount: String,
    pub currency: String,
    pub comment: String,
}

pub fn list_transactions(
    conn: &Connection,
    user_id: i64,
    period: Option<Period>,
    limit: Option<usize>,
) -> LedgerResult<Vec<TransactionRow>> {
    let (from, to) = match period {
        Some(p) => (Some(p.first_day()), Some(p.last_day())),
        None => (None, None),
    };
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT t.id, t.date, t.type, a.name, ta.name, c.name, t.amount, t.currency, t.comment
         FROM transactions t
         LEFT JOIN accounts a ON t.account_id=a.id
         LEFT JOIN accounts ta ON t.target_account_id=ta.id
         LEFT JOIN categories c ON t.category_id=c.id
         WHERE t.user_id=?1 AND (?2 IS NULL OR t.date BETWEEN ?2 AND ?3)
         ORDER BY t.date DESC, t.id DESC
         LIMIT ?4",
    )?;
    let rows = stmt.query_map(params![user_id, from, to, limit], |r| {
        Ok(TransactionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            r#type: r.get(2)?,
            account: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
            target: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            category: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
            amount: r.get(6)?,
            currency: r.get(7)?,
            comment: r.get::<_, Option<String>>(8)?.unwrap_or_default(),
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let category_id = id_for_category(conn, user_id, sub.get_one::<String>("category").unwrap())?;
    let kind: TransactionType = sub.get_one::<String>("type").unwrap().parse()?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;

    let mut req = NewTransaction::new(user_id, category_id, kind, date, amount);
    if let Some(name) = sub.get_one::<String>("account") {
        req = req.account(id_for_account(conn, user_id, name)?);
    }
    if let Some(name) = sub.get_one::<String>("target") {
        req = req.target(id_for_account(conn, user_id, name)?);
    }
    if let Some(ccy) = sub.get_one::<String>("currency") {
        req = req.currency(ccy);
    }
    if let Some(comment) = sub.get_one::<String>("comment") {
        req = req.comment(comment);
    }
    let id = post_transaction(conn, &req)?;
    println!("Recorded {} {} on {} [id {}]", kind, amount, date, id);
    Ok(())
}

fn edit(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let id = *sub.get_one::<i64>("id").unwrap();
    let mut changes = TransactionChanges::default();
    if let Some(name) = sub.get_one::<String>("account") {
        changes.account_id = Some(id_for_account(conn, user_id, name)?);
    }
    if let Some(name) = sub.get_one::<String>("target") {
        changes.target_account_id = Some(id_for_account(conn, user_id, name)?);
    }
    if let Some(name) = sub.get_one::<String>("category") {
        changes.category_id = Some(id_for_category(conn, user_id, name)?);
    }
    if let Some(kind) = sub.get_one::<String>("type") {
        changes.r#type = Some(kind.parse()?);
    }
    if let Some(date) = sub.get_one::<String>("date") {
        changes.date = Some(parse_date(date)?);
    }
    if let Some(amount) = sub.get_one::<String>("amount") {
        changes.amount = Some(parse_decimal(amount)?);
    }
    if let Some(ccy) = sub.get_one::<String>("currency") {
        changes.currency = Some(ccy.clone());
    }
    if let Some(comment) = sub.get_one::<String>("comment") {
        changes.comment = Some(comment.clone());
    }
    modify_transaction(conn, id, user_id, &changes)?;
    println!("Updated transaction {}", id);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user_id = *sub.get_one::<i64>("user").unwrap();
    let period = match sub.get_one::<String>("month") {
        Some(m) => Some(parse_month(m)?),
        None => None,
    };
    let limit = sub.get_one::<usize>("limit").copied();
    let data = list_transactions(conn, user_id, period, limit)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.r#type.clone(),
                    r.account.clone(),
                    r.target.clone(),
                    r.category.clone(),
                    r.amount.clone(),
                    r.currency.clone(),
                    r.comment.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Type", "Account", "Target", "Category", "Amount", "CCY", "Comment"],
                rows,
            )
        );
    }
    Ok(())
}
