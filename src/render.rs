//! # Tide Report Rendering
//!
//! Plain-text output for the command line: the current state, the next tide,
//! an ASCII graph of the current half-cycle, and a day-by-day listing.
//! Everything returns a `String` so the caller decides where it goes.

use crate::interpolate::TideState;
use crate::query::{self, NextTide};
use crate::{PortCache, TideRecord};
use chrono::{DateTime, TimeZone};
use std::f64::consts::PI;
use std::fmt::{Display, Write};

/// Message shown whenever a query has no answer.
pub const NO_DATA: &str = "No tide data available for current time";

/// Layout knobs for [`report`].
#[derive(Debug, Clone, Copy)]
pub struct ReportLayout {
    pub listing_days: u32,
    pub graph_rows: usize,
    pub graph_cols: usize,
}

/// Hours and minutes, e.g. `3h07m`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}h{:02}m", seconds / 3600, (seconds / 60) % 60)
}

/// `Now` for anything due, otherwise `In 3h07m`.
pub fn time_remaining(seconds_until: i64) -> String {
    if seconds_until <= 0 {
        "Now".to_string()
    } else {
        format!("In {}", format_duration(seconds_until))
    }
}

/// Height with a leading space in place of a plus sign.
fn format_height(height: f64, decimals: usize) -> String {
    if height < 0.0 {
        format!("{:.*}", decimals, height)
    } else {
        format!(" {:.*}", decimals, height)
    }
}

fn local<Tz: TimeZone>(tz: &Tz, timestamp: i64) -> Option<DateTime<Tz>> {
    tz.timestamp_opt(timestamp, 0).single()
}

/// ASCII sketch of the half-cycle from `previous` to `next` with a `|` at `t`.
///
/// Draws one full sine period across the width, inverted for a falling tide,
/// and places the marker by the cosine phase of `t`.
pub fn tide_graph(
    previous: &TideRecord,
    next: &TideRecord,
    t: i64,
    rows: usize,
    cols: usize,
) -> String {
    let span = next.timestamp - previous.timestamp;
    if rows == 0 || cols < 2 || span <= 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; cols]; rows];

    let direction = if previous.height > next.height { -1.0 } else { 1.0 };
    for column in 0..cols {
        let x = (1.0 + direction * (column as f64 * 2.0 * PI / (cols - 1) as f64).sin()) / 2.0;
        let row = ((rows - 1) as f64 * x + 0.5) as usize;
        grid[row.min(rows - 1)][column] = '*';
    }

    let omega = PI / span as f64;
    let phase = omega * (t - previous.timestamp) as f64;
    let x = (phase + PI / 2.0) / (2.0 * PI);
    let marker = ((cols - 1) as f64 * x + 0.5).clamp(0.0, (cols - 1) as f64) as usize;
    for row in grid.iter_mut() {
        row[marker] = '|';
    }

    let mut out = String::with_capacity(rows * (cols + 1));
    for row in grid {
        out.extend(row);
        out.push('\n');
    }
    out
}

/// Records grouped by day, with a month heading whenever the month changes.
///
/// ```text
/// Jan 2025
/// Wed 01  HIGH 04:12 2.90m
///          low 10:31 0.40m
/// ```
pub fn listing<Tz>(records: &[TideRecord], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let mut last_month = String::new();
    let mut last_day = String::new();

    for record in records {
        let Some(when) = local(tz, record.timestamp) else {
            continue;
        };

        let month = when.format("%b %Y").to_string();
        if month != last_month {
            let _ = writeln!(out, "{month}");
            last_month = month;
        }

        let day = when.format("%a %d").to_string();
        let day_label = if day != last_day {
            last_day = day.clone();
            day
        } else {
            " ".repeat(day.len())
        };

        let kind = if record.is_high_tide { " HIGH" } else { "  low" };
        let _ = writeln!(
            out,
            "{day_label} {kind} {}{}m",
            when.format("%H:%M"),
            format_height(f64::from(record.height), 2)
        );
    }
    out
}

/// One-line summary of the current state.
pub fn current_line(state: &TideState) -> String {
    format!(
        "Now: {}m, {} {:.0} cm/hr",
        format_height(state.height, 1),
        if state.is_rising() { "rising" } else { "falling" },
        state.rate_per_hour.abs() * 100.0
    )
}

/// One-line summary of the next tide.
pub fn next_line<Tz>(next: &NextTide, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let at = local(tz, next.timestamp)
        .map(|when| when.format("%H:%M").to_string())
        .unwrap_or_default();
    format!(
        "Next: {} at {at},{}m ({})",
        next.label(),
        format_height(f64::from(next.height), 2),
        time_remaining(next.seconds_until)
    )
}

/// Full text report for one port at `t`.
pub fn report<Tz>(cache: &PortCache, t: i64, layout: &ReportLayout, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "{}", cache.station());

    if let Some(when) = local(tz, t) {
        let _ = writeln!(out, "{}", when.format("%H:%M %a %d/%m/%y %Z"));
    }

    if !query::is_fresh(cache, t) {
        let _ = writeln!(out, "{NO_DATA}");
        return out;
    }

    match query::current_state(cache, t) {
        Some(state) => {
            let _ = writeln!(out, "{}", current_line(&state));
        }
        None => {
            let _ = writeln!(out, "{NO_DATA}");
        }
    }

    if let Some(next) = query::next_extremum(cache, t) {
        let _ = writeln!(out, "{}", next_line(&next, tz));
    }

    if let Some((previous, next)) = query::interval_at(cache, t) {
        out.push('\n');
        out.push_str(&tide_graph(
            &previous,
            &next,
            t,
            layout.graph_rows,
            layout.graph_cols,
        ));
    }

    let upcoming = query::upcoming(cache, t, layout.listing_days);
    if !upcoming.is_empty() {
        out.push('\n');
        out.push_str(&listing(upcoming, tz));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0h00m");
        assert_eq!(format_duration(3 * 3600 + 7 * 60 + 59), "3h07m");
        assert_eq!(format_duration(-30), "0h00m");
        assert_eq!(time_remaining(0), "Now");
        assert_eq!(time_remaining(5400), "In 1h30m");
    }

    #[test]
    fn test_format_height_sign_column() {
        assert_eq!(format_height(1.234, 2), " 1.23");
        assert_eq!(format_height(-0.26, 1), "-0.3");
    }

    #[test]
    fn test_graph_dimensions_and_marker() {
        let low = TideRecord::new(0, 0.5, false);
        let high = TideRecord::new(21_600, 2.5, true);
        let graph = tide_graph(&low, &high, 0, 10, 40);

        let lines: Vec<&str> = graph.lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines.iter().all(|line| line.chars().count() == 40));

        // At the previous tide the phase is zero, so the marker sits a quarter of the way in
        let marker = ((39.0 * 0.25) + 0.5) as usize;
        assert!(lines
            .iter()
            .all(|line| line.chars().nth(marker) == Some('|')));
        assert!(graph.contains('*'));
    }

    #[test]
    fn test_graph_degenerate_input() {
        let a = TideRecord::new(100, 1.0, false);
        assert!(tide_graph(&a, &a, 100, 10, 40).is_empty());
        let b = TideRecord::new(200, 2.0, true);
        assert!(tide_graph(&a, &b, 150, 0, 40).is_empty());
    }

    #[test]
    fn test_listing_groups_by_day() {
        // 2025-01-01 04:00 UTC, 10:00 UTC, then 2025-01-02 00:30 UTC
        let records = [
            TideRecord::new(1_735_704_000, 2.9, true),
            TideRecord::new(1_735_725_600, 0.4, false),
            TideRecord::new(1_735_777_800, 3.0, true),
        ];
        let text = listing(&records, &Utc);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Jan 2025");
        assert_eq!(lines[1], "Wed 01  HIGH 04:00 2.90m");
        assert_eq!(lines[2], "         low 10:00 0.40m");
        assert_eq!(lines[3], "Thu 02  HIGH 00:30 3.00m");
    }
}
