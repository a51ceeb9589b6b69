//! `pb start`, `pb end`, `pb backlog` — move entries through their lifecycle.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Args;
use pebble_core::backend::Registry;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Entry id to start.
    pub id: i64,

    /// Optional deadline: a date (YYYY-MM-DD) or a day count like 3d.
    pub deadline: Option<String>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Entry id.
    pub id: i64,
}

pub fn run_start(args: &StartArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let deadline = match &args.deadline {
        Some(raw) => match parse_deadline(raw, Utc::now()) {
            Some(date) => Some(date),
            None => {
                println!(
                    "Couldn't read deadline '{raw}' (use YYYY-MM-DD or a day count like 3d)"
                );
                return Ok(());
            }
        },
        None => None,
    };

    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };

    registry.start_entry(&entry, deadline)?;
    match deadline {
        Some(date) => println!("Started {:04}, due {}", args.id, date.format("%Y-%m-%d")),
        None => println!("Started {:04}", args.id),
    }
    Ok(())
}

pub fn run_end(args: &IdArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };
    registry.end_entry(&entry)?;
    println!("Ended {:04}", args.id);
    Ok(())
}

pub fn run_backlog(args: &IdArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };
    registry.backlog_entry(&entry)?;
    println!("Moved {:04} to backlog", args.id);
    Ok(())
}

/// Deadlines come in two shapes: an absolute date, or days from now.
fn parse_deadline(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(days) = raw.strip_suffix('d') {
        let days: i64 = days.parse().ok()?;
        return Some(now + Duration::days(days));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    date.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc())
}
