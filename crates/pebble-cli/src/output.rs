//! Plain-text rendering for listings, the entry detail view, and the
//! burndown chart.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use pebble_core::{burndown::Projection, model::Entry};

const RULE: &str = "----------------------------------------------";

/// Render the listing: feature buckets after the loose entries, one line per
/// entry, and an open/total footer. Finished entries only appear with `all`.
pub fn print_entries(
    entries: &[Entry],
    features: &BTreeSet<String>,
    all: bool,
    now: DateTime<Utc>,
) {
    let total = entries.len();
    let open = entries.iter().filter(|entry| entry.is_open()).count();

    let visible: Vec<&Entry> = entries
        .iter()
        .filter(|entry| all || entry.is_open())
        .collect();
    let maxtag = visible
        .iter()
        .map(|entry| display_tags(entry).len())
        .max()
        .unwrap_or(0);

    let mut buckets: Vec<(&str, Vec<&Entry>)> = features
        .iter()
        .map(|feature| (feature.as_str(), Vec::new()))
        .collect();
    let mut loose = Vec::new();
    'entries: for entry in visible {
        for (feature, bucket) in &mut buckets {
            if entry.tags.contains(*feature) {
                bucket.push(entry);
                continue 'entries;
            }
        }
        loose.push(entry);
    }

    for entry in &loose {
        println!("{}", entry_line(entry, maxtag, all, now));
    }
    for (feature, bucket) in &buckets {
        if bucket.is_empty() {
            continue;
        }
        println!("{feature}:");
        for entry in bucket {
            println!("{}", entry_line(entry, maxtag, all, now));
        }
    }

    println!("{open} open / {total} total");
}

/// Render one entry in full: header line, message, deadline, and history.
pub fn print_entry(entry: &Entry) {
    let id = entry.id.unwrap_or_default();
    println!(
        "{id:04} | {} | {} | ({})",
        display_tags(entry),
        date_span(entry, true),
        entry.points
    );
    println!("{RULE}");
    println!("{}", entry.msg);

    if let Some(deadline) = entry.deadline {
        println!();
        println!("deadline: {}", stamp(deadline));
    }
    if !entry.history.is_empty() {
        println!();
        println!("history:");
        for event in &entry.history {
            println!("  {:<8} {}", event.kind.as_str(), stamp(event.date));
        }
    }
}

/// Render the burndown chart followed by the forecast line.
///
/// Day columns draw the open-point level (the last day gets the filled
/// star), with a dotted drop line underneath; forecast columns descend at
/// `velocity` per day and finish on the flag.
pub fn print_burndown(projection: &Projection) {
    let days = projection.days();
    let predicted = projection.predicted_days;
    let velocity = projection.velocity;

    println!();
    let mut y_end: Vec<Option<i64>> = vec![None; days];
    let mut y = projection.max_level();
    while y >= 0 {
        let mut line = String::new();
        for (x, &level) in projection.levels.iter().enumerate() {
            if level == y {
                y_end[x] = Some(y);
                line.push_str(if x + 1 == days { "★ " } else { "⭑ " });
            } else if y_end[x].is_some_and(|end| y < end) {
                line.push_str(". ");
            } else {
                line.push_str("  ");
            }
        }
        for x in 0..predicted {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let forecast = ((predicted - x) as f64 * velocity).floor() as i64;
            if y == forecast {
                line.push_str(if x + 1 == predicted { "🏁" } else { "● " });
            } else {
                line.push_str("  ");
            }
        }
        println!("{}", line.trim_end());
        y -= 1;
    }

    println!(
        "Finish in {predicted} days on {} (velocity {velocity:.1})",
        projection.end_date.format("%A %d %b %Y")
    );
}

fn entry_line(entry: &Entry, maxtag: usize, all: bool, now: DateTime<Utc>) -> String {
    let mut summary = entry.summary().to_string();
    if entry.body().is_some() {
        summary.push_str(" ...");
    }

    let mut line = format!(
        "{:04}  {:<width$}  {summary} {} ({})",
        entry.id.unwrap_or_default(),
        display_tags(entry),
        date_span(entry, all),
        entry.points,
        width = maxtag,
    );
    if entry.is_open() {
        if let Some(deadline) = entry.deadline {
            line.push(' ');
            line.push_str(&deadline_note(deadline, now));
        }
    }
    line
}

fn display_tags(entry: &Entry) -> String {
    entry
        .tags
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// The creation stamp, extended with `-> done` for finished entries when the
/// listing includes them.
fn date_span(entry: &Entry, with_done: bool) -> String {
    let created = entry.created().map_or_else(String::new, stamp);
    if with_done && !entry.is_open() {
        if let Some(done) = entry.done_date() {
            return format!("{created} -> {}", stamp(done));
        }
    }
    created
}

fn stamp(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

fn deadline_note(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (deadline.date_naive() - now.date_naive()).num_days();
    if days > 0 {
        format!("[due in {days}d]")
    } else if days == 0 {
        "[due today]".to_string()
    } else {
        format!("[overdue {}d]", -days)
    }
}
