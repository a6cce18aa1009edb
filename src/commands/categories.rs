// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Category, CategoryState};
use crate::utils::{id_for_category, pretty_table, today};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

pub const DEFAULT_CATEGORIES: [&str; 9] = [
    "Water",
    "Electricity",
    "Heating",
    "Telco",
    "Common Expenses",
    "Bank Charges",
    "Car",
    "BKV",
    "Correction",
];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let id = add_modify_category(conn, user_id, name, None)?;
            println!("Saved category '{}' [id {}]", name.trim(), id);
        }
        Some(("rename", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let from = sub.get_one::<String>("from").unwrap();
            let to = sub.get_one::<String>("to").unwrap();
            let id = id_for_category(conn, user_id, from)?;
            add_modify_category(conn, user_id, to, Some(id))?;
            println!("Renamed category '{}' to '{}'", from.trim(), to.trim());
        }
        Some(("retire", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_category(conn, user_id, name)?;
            retire_category(conn, id, user_id, today())?;
            println!("Retired category '{}'", name.trim());
        }
        Some(("reactivate", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_category(conn, user_id, name)?;
            reactivate_category(conn, id, user_id)?;
            println!("Reactivated category '{}'", name.trim());
        }
        Some(("list", sub)) => {
            let user_id = *sub.get_one::<i64>("user").unwrap();
            let data = list_categories(conn, user_id, !sub.get_flag("all"))?;
            let rows = data
                .into_iter()
                .map(|c| {
                    let state = match c.state() {
                        CategoryState::Active => "active",
                        CategoryState::Retired => "retired",
                    };
                    vec![c.id.to_string(), c.name, state.to_string()]
                })
                .collect();
            println!("{}", pretty_table(&["ID", "Category", "State"], rows));
        }
        _ => {}
    }
    Ok(())
}

fn category_from_row(r: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        effective_from: r.get(3)?,
        effective_to: r.get(4)?,
    })
}

/// Category owned by `user_id`, in any state.
pub fn get_category(conn: &Connection, category_id: i64, user_id: i64) -> LedgerResult<Category> {
    conn.query_row(
        "SELECT id, user_id, name, effective_from, effective_to
         FROM categories WHERE id=?1 AND user_id=?2",
        params![category_id, user_id],
        category_from_row,
    )
    .optional()?
    .ok_or(LedgerError::UnknownCategory {
        category_id,
        user_id,
    })
}

pub fn is_active(conn: &Connection, category_id: i64) -> LedgerResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE id=?1 AND effective_to IS NULL",
            params![category_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn list_categories(
    conn: &Connection,
    user_id: i64,
    active_only: bool,
) -> LedgerResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, effective_from, effective_to FROM categories
         WHERE user_id=?1 AND (NOT ?2 OR effective_to IS NULL)
         ORDER BY name, id",
    )?;
    let rows = stmt.query_map(params![user_id, active_only], category_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Creates a category, or renames an existing one in place when
/// `category_id` is given. Adding a name the user already has returns the
/// existing id.
pub fn add_modify_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    category_id: Option<i64>,
) -> LedgerResult<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::Validation("category name must not be empty".into()));
    }
    if let Some(id) = category_id {
        get_category(conn, id, user_id)?;
        conn.execute(
            "UPDATE categories SET name=?1 WHERE id=?2",
            params![name, id],
        )?;
        return Ok(id);
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE user_id=?1 AND name=?2 ORDER BY id LIMIT 1",
            params![user_id, name],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO categories(user_id, name, effective_from) VALUES (?1, ?2, ?3)",
        params![user_id, name, today()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Moves a category to the retired state. Existing transactions keep it;
/// its recurring rules stop producing planned rows.
pub fn retire_category(
    conn: &Connection,
    category_id: i64,
    user_id: i64,
    date: NaiveDate,
) -> LedgerResult<()> {
    let cat = get_category(conn, category_id, user_id)?;
    if cat.state() == CategoryState::Retired {
        return Err(LedgerError::Validation(format!(
            "category '{}' is already retired",
            cat.name
        )));
    }
    conn.execute(
        "UPDATE categories SET effective_to=?1 WHERE id=?2",
        params![date, category_id],
    )?;
    Ok(())
}

pub fn reactivate_category(conn: &Connection, category_id: i64, user_id: i64) -> LedgerResult<()> {
    get_category(conn, category_id, user_id)?;
    conn.execute(
        "UPDATE categories SET effective_to=NULL WHERE id=?1",
        params![category_id],
    )?;
    Ok(())
}
