// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .short('u')
        .required(true)
        .value_parser(value_parser!(i64))
        .help("Owning user id")
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn json_flags() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    ]
}

fn format_args() -> [Arg; 2] {
    [
        opt("format", "csv or json").default_value("csv"),
        req("out", "Output file path"),
    ]
}

pub fn build_cli() -> Command {
    Command::new("purse")
        .about("Multi-currency personal ledger with recurring plans and month close")
        .version(clap::crate_version!())
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("user")
                .about("Manage users")
                .subcommand(
                    Command::new("add")
                        .about("Add a user with default categories and a Bank account")
                        .arg(req("first", "First name"))
                        .arg(req("last", "Last name"))
                        .arg(opt("balance", "Opening balance of the Bank account").allow_hyphen_values(true)),
                )
                .subcommand(Command::new("list").about("List users")),
        )
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .about("Create an account, or edit the active one with this name")
                        .arg(user_arg())
                        .arg(req("name", "Account name"))
                        .arg(opt("type", "bank, saving, loan, ...").default_value("bank"))
                        .arg(opt("currency", "ISO currency code"))
                        .arg(opt("amount", "Opening or overriding balance").allow_hyphen_values(true))
                        .arg(opt("id", "Account id to edit").value_parser(value_parser!(i64))),
                )
                .subcommand(
                    Command::new("list")
                        .about("List accounts")
                        .arg(user_arg())
                        .arg(
                            Arg::new("all")
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("Include closed accounts"),
                        ),
                )
                .subcommand(
                    Command::new("close")
                        .about("Retire an account")
                        .arg(user_arg())
                        .arg(req("name", "Account name")),
                ),
        )
        .subcommand(
            Command::new("category")
                .about("Manage transaction categories")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(req("name", "Category name")),
                )
                .subcommand(
                    Command::new("rename")
                        .arg(user_arg())
                        .arg(req("from", "Current name"))
                        .arg(req("to", "New name")),
                )
                .subcommand(
                    Command::new("retire")
                        .arg(user_arg())
                        .arg(req("name", "Category name")),
                )
                .subcommand(
                    Command::new("reactivate")
                        .arg(user_arg())
                        .arg(req("name", "Category name")),
                )
                .subcommand(
                    Command::new("list").arg(user_arg()).arg(
                        Arg::new("all")
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("Include retired categories"),
                    ),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and edit transactions")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(req("category", "Category name"))
                        .arg(req("type", "credit, debit or transfer"))
                        .arg(req("date", "YYYY-MM-DD"))
                        .arg(req("amount", "Positive amount"))
                        .arg(opt("account", "Source account (default: the Bank account)"))
                        .arg(opt("target", "Target account for transfers"))
                        .arg(opt("currency", "Transaction currency"))
                        .arg(opt("comment", "Free text")),
                )
                .subcommand(
                    Command::new("edit")
                        .arg(user_arg())
                        .arg(req("id", "Transaction id").value_parser(value_parser!(i64)))
                        .arg(opt("account", "New source account"))
                        .arg(opt("target", "New target account"))
                        .arg(opt("category", "New category"))
                        .arg(opt("type", "New type"))
                        .arg(opt("date", "New date"))
                        .arg(opt("amount", "New amount"))
                        .arg(opt("currency", "New currency"))
                        .arg(opt("comment", "New comment")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(user_arg())
                        .arg(opt("month", "YYYY-MM"))
                        .arg(opt("limit", "Maximum rows").value_parser(value_parser!(usize)))
                        .args(json_flags()),
                ),
        )
        .subcommand(
            Command::new("recurring")
                .about("Standing rules that feed the monthly plan")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(req("category", "Category name"))
                        .arg(req("recurrence", "daily, weekly, monthly or yearly"))
                        .arg(req("amount", "Amount per occurrence"))
                        .arg(
                            opt("day", "Day of month anchor")
                                .value_parser(value_parser!(i32))
                                .allow_hyphen_values(true)
                                .default_value("10"),
                        ),
                )
                .subcommand(Command::new("list").arg(user_arg()))
                .subcommand(
                    Command::new("preview")
                        .about("Show what closing would plan for a month")
                        .arg(user_arg())
                        .arg(req("month", "YYYY-MM")),
                ),
        )
        .subcommand(
            Command::new("planned")
                .about("Planned transactions")
                .subcommand(
                    Command::new("add")
                        .arg(user_arg())
                        .arg(req("category", "Category name"))
                        .arg(req("due", "YYYY-MM-DD"))
                        .arg(req("amount", "Amount"))
                        .arg(opt("currency", "Currency"))
                        .arg(opt("status", "planned, realized, overdue or cancelled"))
                        .arg(opt("id", "Planned id to edit").value_parser(value_parser!(i64))),
                )
                .subcommand(
                    Command::new("list")
                        .arg(user_arg())
                        .arg(opt("month", "YYYY-MM"))
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("link")
                        .about("Mark a planned transaction realized by a transaction")
                        .arg(req("transaction", "Transaction id").value_parser(value_parser!(i64)))
                        .arg(req("planned", "Planned transaction id").value_parser(value_parser!(i64))),
                )
                .subcommand(
                    Command::new("overdue")
                        .about("Flag past-due planned transactions")
                        .arg(user_arg()),
                ),
        )
        .subcommand(
            Command::new("month")
                .about("Month close")
                .subcommand(
                    Command::new("close")
                        .arg(user_arg())
                        .arg(req("month", "YYYY-MM")),
                )
                .subcommand(Command::new("list").arg(user_arg())),
        )
        .subcommand(
            Command::new("balance")
                .about("Current balances and history")
                .subcommand(Command::new("list").arg(user_arg()).args(json_flags()))
                .subcommand(
                    Command::new("history")
                        .arg(user_arg())
                        .arg(opt("month", "YYYY-MM"))
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("check")
                        .about("Compare bank balances with real ones")
                        .arg(user_arg())
                        .arg(
                            Arg::new("real")
                                .long("real")
                                .action(ArgAction::Append)
                                .help("ACCOUNT=AMOUNT, repeatable"),
                        ),
                ),
        )
        .subcommand(
            Command::new("fx")
                .about("Exchange rates")
                .subcommand(
                    Command::new("set-default")
                        .about("Set the default currency")
                        .arg(req("currency", "ISO code")),
                )
                .subcommand(Command::new("fetch").about("Fetch today's rates from the feed"))
                .subcommand(
                    Command::new("set")
                        .about("Store a rate by hand")
                        .arg(req("from", "From currency"))
                        .arg(req("to", "To currency"))
                        .arg(req("rate", "1 FROM = RATE TO"))
                        .arg(opt("date", "YYYY-MM-DD (default: today)")),
                )
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("convert")
                        .arg(req("amount", "Amount"))
                        .arg(req("from", "From currency"))
                        .arg(req("to", "To currency"))
                        .arg(opt("date", "YYYY-MM-DD (default: today)")),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("transactions")
                        .arg(user_arg())
                        .args(format_args()),
                )
                .subcommand(Command::new("history").arg(user_arg()).args(format_args())),
        )
        .subcommand(
            Command::new("doctor")
                .about("Check ledger integrity")
                .arg(user_arg()),
        )
}
