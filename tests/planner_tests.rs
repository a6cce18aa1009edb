// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use purse::commands::balances::balance_history;
use purse::commands::categories::retire_category;
use purse::commands::close::{close_month, closed_periods, is_closed};
use purse::commands::planned::{
    add_modify_planned, get_planned, link_planned_transaction, list_planned, mark_overdue,
};
use purse::commands::recurring::{add_recurring, due_dates, preview_month};
use purse::commands::transactions::{
    NewTransaction, TransactionChanges, modify_transaction, post_transaction,
};
use purse::commands::users::add_new_user;
use purse::db::open_in_memory;
use purse::errors::LedgerError;
use purse::models::{Period, PlannedStatus, Recurrence, RecurringTransaction, TransactionType};
use purse::utils::id_for_category;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn p(y: i32, m: u32) -> Period {
    Period::new(y, m).unwrap()
}

fn rule(recurrence: Recurrence, day: i32) -> RecurringTransaction {
    RecurringTransaction {
        id: 1,
        user_id: 1,
        category_id: 1,
        recurrence,
        amount: dec("10"),
        due_date_day: day,
    }
}

fn user_with_category(conn: &mut Connection, category: &str) -> (i64, i64) {
    let (user, _) = add_new_user(conn, "Alice", "Smith", dec("500")).unwrap();
    let cat = id_for_category(conn, user, category).unwrap();
    (user, cat)
}

#[test]
fn periods_parse_and_roll_over() {
    let jan: Period = "2025-01".parse().unwrap();
    assert_eq!(jan, p(2025, 1));
    assert_eq!(p(2024, 12).next(), p(2025, 1));
    assert_eq!(p(2024, 2).last_day(), d(2024, 2, 29));
    assert_eq!(p(2025, 2).day(31), d(2025, 2, 28));
    assert_eq!(p(2025, 2).day(0), d(2025, 2, 1));
    assert_eq!(p(2025, 3).to_string(), "2025-03");
    assert!(Period::new(2025, 13).is_err());
    assert!("2025-3x".parse::<Period>().is_err());
}

#[test]
fn monthly_rule_lands_on_its_day() {
    assert_eq!(due_dates(&rule(Recurrence::Monthly, 15), p(2025, 2), None), vec![d(2025, 2, 15)]);
    assert_eq!(due_dates(&rule(Recurrence::Monthly, 31), p(2025, 4), None), vec![d(2025, 4, 30)]);
}

#[test]
fn weekly_rule_stays_inside_the_month() {
    let dates = due_dates(&rule(Recurrence::Weekly, 3), p(2025, 2), None);
    assert_eq!(dates, vec![d(2025, 2, 3), d(2025, 2, 10), d(2025, 2, 17), d(2025, 2, 24)]);
}

#[test]
fn daily_rule_covers_every_day() {
    let dates = due_dates(&rule(Recurrence::Daily, 1), p(2025, 2), None);
    assert_eq!(dates.len(), 28);
    assert_eq!(dates.first(), Some(&d(2025, 2, 1)));
    assert_eq!(dates.last(), Some(&d(2025, 2, 28)));
    assert_eq!(due_dates(&rule(Recurrence::Daily, 1), p(2024, 2), None).len(), 29);
}

#[test]
fn closing_plans_next_month_from_monthly_rule() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Telco");
    add_recurring(&conn, user, cat, Recurrence::Monthly, dec("100"), 15).unwrap();

    let summary = close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();
    assert_eq!(summary.planned.len(), 1);
    assert_eq!(summary.snapshots, 1);

    let planned = list_planned(&conn, user, Some(p(2025, 2))).unwrap();
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].due_date, d(2025, 2, 15));
    assert_eq!(planned[0].amount, dec("100"));
    assert_eq!(planned[0].currency, "HUF");
    assert_eq!(planned[0].status, PlannedStatus::Planned);
}

#[test]
fn close_snapshots_balances_for_the_month() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Correction");
    post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 1, 20), dec("120")),
    )
    .unwrap();
    close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();

    // later activity does not change the snapshot
    post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 2, 3), dec("80")),
    )
    .unwrap();

    let history = balance_history(&conn, user, Some(p(2025, 1))).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].balance, dec("380"));
    assert_eq!(history[0].month, d(2025, 1, 1));
    assert_eq!(history[0].created_at, d(2025, 2, 1));
}

#[test]
fn closed_month_is_locked() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Car");
    let id = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 1, 10), dec("5")),
    )
    .unwrap();
    close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();
    assert!(is_closed(&conn, user, p(2025, 1)).unwrap());
    assert_eq!(closed_periods(&conn, user).unwrap(), vec![p(2025, 1)]);

    let err = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 1, 20), dec("5")),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { period, .. } if period == p(2025, 1)));

    let edit = TransactionChanges {
        amount: Some(dec("6")),
        ..Default::default()
    };
    let err = modify_transaction(&mut conn, id, user, &edit).unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));

    let again = close_month(&mut conn, user, p(2025, 1), d(2025, 2, 2)).unwrap_err();
    assert!(matches!(again, LedgerError::AlreadyClosed { .. }));
    assert_eq!(balance_history(&conn, user, None).unwrap().len(), 1);
}

#[test]
fn moving_into_a_closed_month_is_refused() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Car");
    close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();
    let id = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 2, 10), dec("5")),
    )
    .unwrap();

    let edit = TransactionChanges {
        date: Some(d(2025, 1, 31)),
        ..Default::default()
    };
    let err = modify_transaction(&mut conn, id, user, &edit).unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));
}

#[test]
fn close_cancels_unrealized_plans_of_the_month() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Water");
    let open = add_modify_planned(
        &conn, user, cat, d(2025, 1, 20), dec("30"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();
    let done = add_modify_planned(
        &conn, user, cat, d(2025, 1, 5), dec("30"), "HUF", PlannedStatus::Realized, None,
    )
    .unwrap();
    let next_year = add_modify_planned(
        &conn, user, cat, d(2026, 1, 20), dec("30"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();

    let summary = close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();
    assert_eq!(summary.cancelled, 1);
    assert_eq!(get_planned(&conn, open).unwrap().status, PlannedStatus::Cancelled);
    assert_eq!(get_planned(&conn, done).unwrap().status, PlannedStatus::Realized);
    assert_eq!(get_planned(&conn, next_year).unwrap().status, PlannedStatus::Planned);
}

#[test]
fn close_only_touches_the_closing_user() {
    let mut conn = open_in_memory().unwrap();
    let (alice, _) = add_new_user(&mut conn, "Alice", "A", dec("10")).unwrap();
    let (bob, _) = add_new_user(&mut conn, "Bob", "B", dec("20")).unwrap();

    close_month(&mut conn, alice, p(2025, 1), d(2025, 2, 1)).unwrap();
    assert_eq!(balance_history(&conn, alice, None).unwrap().len(), 1);
    assert!(balance_history(&conn, bob, None).unwrap().is_empty());
    assert!(!is_closed(&conn, bob, p(2025, 1)).unwrap());
}

#[test]
fn weekly_rule_continues_from_last_payment() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "BKV");
    add_recurring(&conn, user, cat, Recurrence::Weekly, dec("7"), 3).unwrap();
    add_modify_planned(
        &conn, user, cat, d(2025, 1, 29), dec("7"), "HUF", PlannedStatus::Realized, None,
    )
    .unwrap();

    let dates: Vec<NaiveDate> = preview_month(&conn, user, p(2025, 2))
        .unwrap()
        .into_iter()
        .map(|o| o.due_date)
        .collect();
    assert_eq!(dates, vec![d(2025, 2, 5), d(2025, 2, 12), d(2025, 2, 19), d(2025, 2, 26)]);
}

#[test]
fn yearly_rule_follows_last_payment() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Car");
    add_recurring(&conn, user, cat, Recurrence::Yearly, dec("300"), 5).unwrap();

    let first = preview_month(&conn, user, p(2025, 3)).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].due_date, d(2025, 3, 5));
    assert_eq!(first[0].amount, dec("300"));

    add_modify_planned(
        &conn, user, cat, d(2024, 3, 5), dec("320"), "EUR", PlannedStatus::Realized, None,
    )
    .unwrap();
    let next = preview_month(&conn, user, p(2025, 3)).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].due_date, d(2025, 3, 5));
    assert_eq!(next[0].amount, dec("320"));
    assert_eq!(next[0].currency, "EUR");
}

#[test]
fn retired_category_rules_are_skipped() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Heating");
    let telco = id_for_category(&conn, user, "Telco").unwrap();
    add_recurring(&conn, user, cat, Recurrence::Monthly, dec("50"), 10).unwrap();
    add_recurring(&conn, user, telco, Recurrence::Monthly, dec("20"), 12).unwrap();
    retire_category(&conn, cat, user, d(2025, 1, 15)).unwrap();

    let summary = close_month(&mut conn, user, p(2025, 1), d(2025, 2, 1)).unwrap();
    assert_eq!(summary.planned.len(), 1);
    let planned = list_planned(&conn, user, Some(p(2025, 2))).unwrap();
    assert_eq!(planned[0].category_id, telco);
}

#[test]
fn recurring_rules_need_an_owned_category() {
    let mut conn = open_in_memory().unwrap();
    let (user, _) = user_with_category(&mut conn, "Car");
    let err = add_recurring(&conn, user, 4242, Recurrence::Monthly, dec("1"), 1).unwrap_err();
    assert!(matches!(err, LedgerError::UnknownCategory { .. }));
}

#[test]
fn linking_realizes_the_plan() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Electricity");
    let planned = add_modify_planned(
        &conn, user, cat, d(2025, 2, 15), dec("100"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();
    let trx = post_transaction(
        &mut conn,
        &NewTransaction::new(user, cat, TransactionType::Debit, d(2025, 2, 14), dec("95")),
    )
    .unwrap();

    link_planned_transaction(&mut conn, trx, planned).unwrap();
    let row = get_planned(&conn, planned).unwrap();
    assert_eq!(row.status, PlannedStatus::Realized);
    assert_eq!(row.transaction_id, Some(trx));
    assert_eq!(row.amount, dec("95"));
    assert_eq!(row.realized_date, Some(d(2025, 2, 14)));

    let err = link_planned_transaction(&mut conn, 999, planned).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { id: 999, .. }));
}

#[test]
fn linking_across_users_is_refused() {
    let mut conn = open_in_memory().unwrap();
    let (alice, alice_cat) = user_with_category(&mut conn, "Water");
    let (bob, _) = add_new_user(&mut conn, "Bob", "B", dec("10")).unwrap();
    let bob_cat = id_for_category(&conn, bob, "Water").unwrap();
    let planned = add_modify_planned(
        &conn, alice, alice_cat, d(2025, 2, 15), dec("10"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();
    let trx = post_transaction(
        &mut conn,
        &NewTransaction::new(bob, bob_cat, TransactionType::Debit, d(2025, 2, 14), dec("10")),
    )
    .unwrap();

    let err = link_planned_transaction(&mut conn, trx, planned).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(get_planned(&conn, planned).unwrap().status, PlannedStatus::Planned);
}

#[test]
fn past_due_plans_turn_overdue() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Water");
    let late = add_modify_planned(
        &conn, user, cat, d(2025, 2, 10), dec("10"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();
    let later = add_modify_planned(
        &conn, user, cat, d(2025, 3, 10), dec("10"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();

    assert_eq!(mark_overdue(&conn, user, d(2025, 3, 1)).unwrap(), 1);
    assert_eq!(get_planned(&conn, late).unwrap().status, PlannedStatus::Overdue);
    assert_eq!(get_planned(&conn, later).unwrap().status, PlannedStatus::Planned);
    assert_eq!(mark_overdue(&conn, user, d(2025, 3, 1)).unwrap(), 0);
}

#[test]
fn planned_rows_can_be_edited_in_place() {
    let mut conn = open_in_memory().unwrap();
    let (user, cat) = user_with_category(&mut conn, "Water");
    let id = add_modify_planned(
        &conn, user, cat, d(2025, 2, 10), dec("10"), "HUF", PlannedStatus::Planned, None,
    )
    .unwrap();
    let same = add_modify_planned(
        &conn, user, cat, d(2025, 2, 12), dec("12"), "eur", PlannedStatus::Cancelled, Some(id),
    )
    .unwrap();
    assert_eq!(same, id);
    let row = get_planned(&conn, id).unwrap();
    assert_eq!(row.due_date, d(2025, 2, 12));
    assert_eq!(row.currency, "EUR");
    assert_eq!(row.status, PlannedStatus::Cancelled);
    assert!(
        add_modify_planned(&conn, user, cat, d(2025, 2, 1), dec("-1"), "HUF", PlannedStatus::Planned, None)
            .is_err()
    );
}
