// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use purse::config::{self, Config};
use purse::{cli, commands, db};

fn main() -> Result<()> {
    let cfg = Config::from_env();
    config::init_tracing();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init(&cfg)?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path(&cfg)?.display());
        }
        Some(("user", sub)) => commands::users::handle(&mut conn, sub)?,
        Some(("account", sub)) => commands::accounts::handle(&mut conn, sub)?,
        Some(("category", sub)) => commands::categories::handle(&conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&mut conn, sub)?,
        Some(("recurring", sub)) => commands::recurring::handle(&conn, sub)?,
        Some(("planned", sub)) => commands::planned::handle(&mut conn, sub)?,
        Some(("month", sub)) => commands::close::handle(&mut conn, sub)?,
        Some(("balance", sub)) => commands::balances::handle(&conn, sub)?,
        Some(("fx", sub)) => commands::fx::handle(&mut conn, sub, &cfg.rates)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
