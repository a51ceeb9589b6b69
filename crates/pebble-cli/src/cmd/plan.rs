//! `pb plan` — bulk-add entries from an $EDITOR buffer.
//!
//! Each line reads `msg [tags] points`; both suffixes are optional and
//! lines starting with `#` are skipped. Every planned entry is tagged
//! `task`, plus the plan name when one is given.

use std::collections::BTreeSet;

use clap::Args;
use pebble_core::{backend::Registry, model::Entry};

use crate::cmd::add::parse_tags;
use crate::editor;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Optional plan name; added as a tag to every planned entry.
    pub name: Option<String>,
}

pub fn run_plan(args: &PlanArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(content) = editor::edit_text(None)? else {
        println!("Cancelled plan");
        return Ok(());
    };

    let mut count = 0usize;
    for line in content.lines() {
        let Some(planned) = parse_line(line) else {
            continue;
        };

        let mut tags = planned.tags;
        tags.insert("task".to_string());
        if let Some(name) = &args.name {
            tags.insert(name.clone());
        }

        let mut entry = Entry::new(planned.msg, planned.points, tags);
        registry.add_entry(&mut entry)?;
        if let Some(id) = entry.id {
            println!("Added {id:04}: {}", entry.summary());
        }
        count += 1;
    }

    if count == 0 {
        println!("Nothing planned");
    }
    Ok(())
}

struct PlannedEntry {
    msg: String,
    tags: BTreeSet<String>,
    points: u32,
}

fn parse_line(line: &str) -> Option<PlannedEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut rest = line;

    // A trailing whitespace-separated positive integer is the estimate.
    let mut points = 1u32;
    if let Some((head, tail)) = rest.rsplit_once(char::is_whitespace) {
        if let Ok(n) = tail.parse::<u32>() {
            if n > 0 {
                points = n;
                rest = head.trim_end();
            }
        }
    }

    let mut tags = BTreeSet::new();
    if let Some(stripped) = rest.strip_suffix(']') {
        if let Some((head, csv)) = stripped.rsplit_once('[') {
            tags = parse_tags(csv);
            rest = head.trim_end();
        }
    }

    if rest.is_empty() {
        return None;
    }
    Some(PlannedEntry {
        msg: rest.to_string(),
        tags,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::{PlanArgs, parse_line};
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: PlanArgs,
    }

    #[test]
    fn name_is_optional() {
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.name.is_none());

        let w = Wrapper::parse_from(["test", "sprint-9"]);
        assert_eq!(w.args.name.as_deref(), Some("sprint-9"));
    }

    #[test]
    fn a_bare_message_defaults_to_one_point() {
        let planned = parse_line("Fix the header").unwrap();
        assert_eq!(planned.msg, "Fix the header");
        assert!(planned.tags.is_empty());
        assert_eq!(planned.points, 1);
    }

    #[test]
    fn a_trailing_number_is_the_estimate() {
        let planned = parse_line("Fix the header 3").unwrap();
        assert_eq!(planned.msg, "Fix the header");
        assert_eq!(planned.points, 3);
    }

    #[test]
    fn tags_and_points_both_parse() {
        let planned = parse_line("Fix the header [bug, api] 3").unwrap();
        assert_eq!(planned.msg, "Fix the header");
        assert_eq!(planned.points, 3);
        assert!(planned.tags.contains("bug"));
        assert!(planned.tags.contains("api"));
    }

    #[test]
    fn tags_alone_work_too() {
        let planned = parse_line("Fix the header [bug]").unwrap();
        assert_eq!(planned.msg, "Fix the header");
        assert_eq!(planned.points, 1);
        assert!(planned.tags.contains("bug"));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert!(parse_line("# tomorrow maybe").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn a_version_number_at_the_end_reads_as_points() {
        // Quirk of the grammar: quote or reword to keep the digit.
        let planned = parse_line("Release Version 2").unwrap();
        assert_eq!(planned.msg, "Release Version");
        assert_eq!(planned.points, 2);
    }

    #[test]
    fn zero_is_not_an_estimate() {
        let planned = parse_line("Reset counters 0").unwrap();
        assert_eq!(planned.msg, "Reset counters 0");
        assert_eq!(planned.points, 1);
    }

    #[test]
    fn tags_without_a_message_are_dropped() {
        assert!(parse_line("[bug] 3").is_none());
    }
}
