// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use purse::commands::accounts::add_modify_account;
use purse::commands::balances::current_balance;
use purse::commands::fx::{
    RateSource, distinct_currencies, list_rates, load_exchange_rates, pivot_rates, store_rate,
    usd_rates,
};
use purse::commands::transactions::{
    NewTransaction, TransactionChanges, list_transactions, modify_transaction, post_transaction,
};
use purse::commands::users::add_new_user;
use purse::db::open_in_memory;
use purse::errors::LedgerError;
use purse::models::{ExchangeRate, TransactionType};
use purse::utils::{fx_convert, get_default_currency, id_for_category, set_default_currency};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::HashMap;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn rate(from: &str, to: &str, r: &str, date: NaiveDate) -> ExchangeRate {
    ExchangeRate {
        from_currency: from.into(),
        to_currency: to.into(),
        rate: dec(r),
        date,
    }
}

struct StubSource {
    rates: Vec<ExchangeRate>,
    asked: RefCell<Vec<String>>,
}

impl StubSource {
    fn new(rates: Vec<ExchangeRate>) -> Self {
        StubSource {
            rates,
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl RateSource for StubSource {
    fn latest(&self, symbols: &[String]) -> Vec<ExchangeRate> {
        self.asked.borrow_mut().extend(symbols.iter().cloned());
        self.rates.clone()
    }
}

#[test]
fn converts_with_rate_of_the_day() {
    let conn = open_in_memory().unwrap();
    store_rate(&conn, &rate("HUF", "EUR", "0.0028", d(2025, 1, 15))).unwrap();

    let eur = fx_convert(&conn, d(2025, 1, 15), dec("10000"), "HUF", "EUR").unwrap();
    assert_eq!(eur, dec("28"));

    let same = fx_convert(&conn, d(1999, 1, 1), dec("42"), "HUF", "HUF").unwrap();
    assert_eq!(same, dec("42"));

    let err = fx_convert(&conn, d(2025, 1, 16), dec("1"), "HUF", "EUR").unwrap_err();
    assert!(matches!(err, LedgerError::RateNotFound { ref from, ref to, .. } if from == "HUF" && to == "EUR"));
    assert!(!err.is_validation());
}

#[test]
fn foreign_currency_posting_converts_into_account_currency() {
    let mut conn = open_in_memory().unwrap();
    let (user, _) = add_new_user(&mut conn, "Alice", "Smith", Decimal::ZERO).unwrap();
    let euro = add_modify_account(&mut conn, user, "Euro", "bank", "EUR", Decimal::ZERO, None)
        .unwrap();
    let cat = id_for_category(&conn, user, "Correction").unwrap();
    store_rate(&conn, &rate("HUF", "EUR", "0.0028", d(2025, 1, 15))).unwrap();

    post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Credit, d(2025, 1, 15), dec("10000"))
            .account(euro)
            .currency("huf"),
    )
    .unwrap();

    let bal = current_balance(&conn, euro, user).unwrap().unwrap();
    assert_eq!(bal.balance, dec("28"));
    assert_eq!(bal.currency, "EUR");
}

#[test]
fn missing_rate_rolls_the_posting_back() {
    let mut conn = open_in_memory().unwrap();
    let (user, _) = add_new_user(&mut conn, "Bob", "Jones", Decimal::ZERO).unwrap();
    let euro = add_modify_account(&mut conn, user, "Euro", "bank", "EUR", dec("5"), None).unwrap();
    let cat = id_for_category(&conn, user, "Correction").unwrap();

    let err = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 1, 15), dec("100"))
            .account(euro)
            .currency("HUF"),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::RateNotFound { .. }));
    assert!(list_transactions(&conn, user, None, None).unwrap().is_empty());
    assert_eq!(current_balance(&conn, euro, user).unwrap().unwrap().balance, dec("5"));
}

#[test]
fn cross_currency_transfer_converts_each_side() {
    let mut conn = open_in_memory().unwrap();
    let (user, bank) = add_new_user(&mut conn, "Cy", "Lee", dec("10000")).unwrap();
    let euro = add_modify_account(&mut conn, user, "Euro", "saving", "EUR", Decimal::ZERO, None)
        .unwrap();
    let cat = id_for_category(&conn, user, "Correction").unwrap();
    store_rate(&conn, &rate("HUF", "EUR", "0.0025", d(2025, 5, 2))).unwrap();

    post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Transfer, d(2025, 5, 2), dec("4000"))
            .target(euro),
    )
    .unwrap();

    assert_eq!(current_balance(&conn, bank, user).unwrap().unwrap().balance, dec("6000"));
    assert_eq!(current_balance(&conn, euro, user).unwrap().unwrap().balance, dec("10"));
}

#[test]
fn default_currency_setting() {
    let conn = open_in_memory().unwrap();
    assert_eq!(get_default_currency(&conn).unwrap(), "HUF");
    assert_eq!(set_default_currency(&conn, " eur ").unwrap(), "EUR");
    assert_eq!(get_default_currency(&conn).unwrap(), "EUR");
    assert!(set_default_currency(&conn, "EURO").is_err());
}

#[test]
fn pivot_derives_cross_rates_through_usd() {
    let usd: HashMap<String, Decimal> = [("EUR", "0.9"), ("HUF", "360"), ("USD", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), dec(v)))
        .collect();
    let symbols: Vec<String> = ["EUR", "HUF", "USD", "GBP"].iter().map(|s| s.to_string()).collect();
    let day = d(2025, 6, 1);

    let rates = pivot_rates(&usd, &symbols, day);
    assert_eq!(rates.len(), 9);
    let find = |from: &str, to: &str| {
        rates
            .iter()
            .find(|r| r.from_currency == from && r.to_currency == to)
            .map(|r| r.rate)
    };
    assert_eq!(find("USD", "EUR"), Some(dec("0.9")));
    assert_eq!(find("EUR", "HUF"), Some(dec("400")));
    assert_eq!(find("HUF", "HUF"), Some(dec("1")));
    assert_eq!(find("GBP", "EUR"), None);
    assert!(rates.iter().all(|r| r.date == day));
}

#[test]
fn feed_quotes_become_decimals() {
    let raw: HashMap<String, f64> = [("EUR".to_string(), 0.5), ("HUF".to_string(), 350.25)]
        .into_iter()
        .collect();
    let usd = usd_rates(raw);
    assert_eq!(usd.get("EUR"), Some(&dec("0.5")));
    assert_eq!(usd.get("HUF"), Some(&dec("350.25")));
}

#[test]
fn load_stores_rates_for_ledger_currencies() {
    let mut conn = open_in_memory().unwrap();
    let (user, _) = add_new_user(&mut conn, "Dee", "Ray", Decimal::ZERO).unwrap();
    add_modify_account(&mut conn, user, "Euro", "bank", "EUR", Decimal::ZERO, None).unwrap();
    assert_eq!(distinct_currencies(&conn).unwrap(), vec!["EUR", "HUF"]);

    let day = d(2025, 6, 1);
    let source = StubSource::new(vec![
        rate("EUR", "HUF", "400", day),
        rate("HUF", "EUR", "0.0025", day),
    ]);
    assert_eq!(load_exchange_rates(&mut conn, &source).unwrap(), 2);
    assert_eq!(*source.asked.borrow(), vec!["EUR".to_string(), "HUF".to_string()]);
    assert_eq!(fx_convert(&conn, day, dec("2"), "EUR", "HUF").unwrap(), dec("800"));

    // a second load of the same day replaces instead of duplicating
    let again = StubSource::new(vec![rate("EUR", "HUF", "410", day)]);
    assert_eq!(load_exchange_rates(&mut conn, &again).unwrap(), 1);
    assert_eq!(list_rates(&conn, 10).unwrap().len(), 2);
    assert_eq!(fx_convert(&conn, day, dec("1"), "EUR", "HUF").unwrap(), dec("410"));
}

#[test]
fn empty_ledger_asks_for_default_symbols() {
    let mut conn = open_in_memory().unwrap();
    let source = StubSource::new(Vec::new());
    assert_eq!(load_exchange_rates(&mut conn, &source).unwrap(), 0);
    assert_eq!(source.asked.borrow().len(), 4);
    assert!(list_rates(&conn, 10).unwrap().is_empty());
}

#[test]
fn transfer_date_edit_reconverts_at_the_new_rate() {
    let mut conn = open_in_memory().unwrap();
    let (user, bank) = add_new_user(&mut conn, "Eve", "Hart", dec("10000")).unwrap();
    let euro = add_modify_account(&mut conn, user, "Euro", "saving", "EUR", Decimal::ZERO, None)
        .unwrap();
    let cat = id_for_category(&conn, user, "Correction").unwrap();
    store_rate(&conn, &rate("HUF", "EUR", "0.0025", d(2025, 5, 2))).unwrap();
    store_rate(&conn, &rate("HUF", "EUR", "0.0030", d(2025, 5, 9))).unwrap();

    let id = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Transfer, d(2025, 5, 2), dec("4000"))
            .target(euro),
    )
    .unwrap();
    assert_eq!(current_balance(&conn, euro, user).unwrap().unwrap().balance, dec("10"));

    let changes = TransactionChanges {
        date: Some(d(2025, 5, 9)),
        ..Default::default()
    };
    modify_transaction(&mut conn, id, user, &changes).unwrap();
    assert_eq!(current_balance(&conn, bank, user).unwrap().unwrap().balance, dec("6000"));
    assert_eq!(current_balance(&conn, euro, user).unwrap().unwrap().balance, dec("12"));
}

#[test]
fn oversized_foreign_amount_is_refused() {
    let mut conn = open_in_memory().unwrap();
    let (user, bank) = add_new_user(&mut conn, "Fay", "Moss", Decimal::ZERO).unwrap();
    let cat = id_for_category(&conn, user, "Correction").unwrap();
    let day = d(2025, 5, 3);
    store_rate(&conn, &rate("EUR", "HUF", "400", day)).unwrap();

    let err = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Credit, day, Decimal::MAX)
            .account(bank)
            .currency("EUR"),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(ref msg) if msg == "amount out of range"));
    assert!(list_transactions(&conn, user, None, None).unwrap().is_empty());
    assert_eq!(current_balance(&conn, bank, user).unwrap().unwrap().balance, Decimal::ZERO);
}

#[test]
fn pivot_skips_cross_rates_out_of_range() {
    let usd: HashMap<String, Decimal> = [
        ("EUR", Decimal::new(1, 28)),
        ("HUF", Decimal::MAX),
        ("USD", Decimal::ONE),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let symbols: Vec<String> = ["EUR", "HUF", "USD"].iter().map(|s| s.to_string()).collect();

    let rates = pivot_rates(&usd, &symbols, d(2025, 6, 2));
    let has = |from: &str, to: &str| {
        rates
            .iter()
            .any(|r| r.from_currency == from && r.to_currency == to)
    };
    assert!(!has("EUR", "HUF"));
    assert!(has("EUR", "USD"));
    assert!(has("USD", "HUF"));
}
