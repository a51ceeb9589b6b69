//! Burndown projection: day-bucketed open points and a finish forecast.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::model::Entry;

/// A projection over a window of days ending today.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// First day of the window: the earliest creation date seen.
    pub start: NaiveDate,
    /// Open points at the end of each day, from `start` through today.
    pub levels: Vec<i64>,
    /// Net points burned per day across the window.
    pub velocity: f64,
    /// Days from today until the open points hit zero at `velocity`.
    pub predicted_days: i64,
    /// The projected finish date.
    pub end_date: NaiveDate,
}

impl Projection {
    /// Open points at the start of the window.
    #[must_use]
    pub fn first(&self) -> i64 {
        self.levels.first().copied().unwrap_or(0)
    }

    /// Open points today.
    #[must_use]
    pub fn last(&self) -> i64 {
        self.levels.last().copied().unwrap_or(0)
    }

    /// Tallest level in the window; the chart height.
    #[must_use]
    pub fn max_level(&self) -> i64 {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    /// Window width in days; the chart width before the forecast columns.
    #[must_use]
    pub fn days(&self) -> usize {
        self.levels.len()
    }
}

/// Project the remaining work from an entry set, as of `today`.
///
/// Points are bucketed by creation day and, for finished entries, by
/// completion day, then summed into a running open-points level per day.
/// Velocity is the net burn across the window; a flat window gets a velocity
/// of one point per day so the forecast stays finite.
///
/// Returns `None` when no entry has a usable creation date.
#[must_use]
pub fn project(entries: &[Entry], today: NaiveDate) -> Option<Projection> {
    let mut created: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut finished: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut start: Option<NaiveDate> = None;

    for entry in entries {
        let Some(created_at) = entry.created() else {
            debug!(entry = ?entry.id, "entry has no creation event; leaving it off the chart");
            continue;
        };
        let day = created_at.date_naive();
        let points = i64::from(entry.points);
        *created.entry(day).or_insert(0) += points;
        start = Some(start.map_or(day, |first| first.min(day)));

        if !entry.is_open() {
            if let Some(done_at) = entry.done_date() {
                *finished.entry(done_at.date_naive()).or_insert(0) += points;
            }
        }
    }

    let start = start?;
    let days = (today - start).num_days().max(0) + 1;

    let mut levels = Vec::new();
    let mut level = 0_i64;
    for offset in 0..days {
        let day = start + Duration::days(offset);
        level += created.get(&day).copied().unwrap_or(0);
        level -= finished.get(&day).copied().unwrap_or(0);
        levels.push(level);
    }

    let first = levels.first().copied().unwrap_or(0);
    let last = levels.last().copied().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let velocity = if first == last {
        1.0
    } else {
        (first - last) as f64 / days as f64
    };
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let predicted_days = (last as f64 / velocity).ceil() as i64;
    let end_date = today + Duration::days(predicted_days);

    Some(Projection {
        start,
        levels,
        velocity,
        predicted_days,
        end_date,
    })
}
