use std::collections::BTreeSet;
use serde::Serialize;
use serde_json::Value;

/// Longest closed range (in slots) a payload may spell out. Anything wider is
/// treated as malformed rather than expanded.
pub const MAX_RANGE_SPAN: i64 = 256;

/// Keys that may hold the slot specification, in priority order
static SLOT_KEYS: [&str; 2] = ["s", "slots"];

/// Default teaching periods of the weekly grid (start, end)
const DEFAULT_PERIODS: [(&str, &str); 13] = [
    ("08:10", "09:00"),
    ("09:10", "10:00"),
    ("10:10", "11:00"),
    ("11:10", "12:00"),
    ("13:10", "14:00"),
    ("14:10", "15:00"),
    ("15:10", "16:00"),
    ("16:10", "17:00"),
    ("17:10", "18:00"),
    ("18:20", "19:10"),
    ("19:15", "20:05"),
    ("20:10", "21:00"),
    ("21:05", "21:55"),
];

/// Length of a period and the break before the next one, used when the grid
/// is configured with more rows than there are default periods
const PERIOD_MINUTES: u32 = 50;
const BREAK_MINUTES: u32 = 5;

/// A labelled row of the weekly grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Number of rows the default grid displays
pub fn default_slot_count() -> u32 {
    DEFAULT_PERIODS.len() as u32
}

/// Parses a time string (HH:MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight to time string (HH:MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}:{:02}", hours % 24, mins)
}

/// Builds the row labels for a grid of `count` slots.
/// The default periods come first; extra rows continue after the last one.
pub fn time_slots(count: u32) -> Vec<TimeSlot> {
    let mut slots: Vec<TimeSlot> = DEFAULT_PERIODS
        .iter()
        .take(count as usize)
        .map(|(start, end)| TimeSlot { start: start.to_string(), end: end.to_string() })
        .collect();

    let (_, last_end) = DEFAULT_PERIODS[DEFAULT_PERIODS.len() - 1];
    let mut current_end = parse_time_to_minutes(last_end).unwrap_or(22 * 60);
    while (slots.len() as u32) < count {
        let start = current_end + BREAK_MINUTES;
        let end = start + PERIOD_MINUTES;
        slots.push(TimeSlot {
            start: minutes_to_time_string(start),
            end: minutes_to_time_string(end),
        });
        current_end = end;
    }

    slots
}

/// Reads an integer from a JSON number (integral floats included) or a
/// numeric string
pub fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Inclusive range expansion; None when reversed or wider than MAX_RANGE_SPAN
fn expand_range(start: i64, end: i64) -> Option<std::ops::RangeInclusive<i64>> {
    let span = end.checked_sub(start)?;
    if !(0..MAX_RANGE_SPAN).contains(&span) {
        return None;
    }
    Some(start..=end)
}

/// Parses `"a-b"`, `"n"`, or a comma separated list of those.
/// Parts that do not parse are skipped.
fn parse_slot_string(text: &str) -> BTreeSet<i64> {
    let mut slots = BTreeSet::new();

    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let bounds = start.trim().parse::<i64>().ok().zip(end.trim().parse::<i64>().ok());
                if let Some(range) = bounds.and_then(|(start, end)| expand_range(start, end)) {
                    slots.extend(range);
                }
            }
            None => {
                if let Ok(slot) = part.parse::<i64>() {
                    slots.insert(slot);
                }
            }
        }
    }

    slots
}

/// Interprets one raw slot specification, before any rebasing
fn raw_slots(spec: &Value) -> BTreeSet<i64> {
    match spec {
        // Explicit index collection
        Value::Array(items) => items.iter().filter_map(integer_of).collect(),
        // Closed range {start, end}
        Value::Object(range) => {
            let start = range.get("start").and_then(integer_of);
            let end = range.get("end").and_then(integer_of);
            start
                .zip(end)
                .and_then(|(start, end)| expand_range(start, end))
                .map(|range| range.collect())
                .unwrap_or_default()
        }
        Value::String(text) => parse_slot_string(text),
        Value::Number(_) => integer_of(spec).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

/// Finds the slot specification of an entry: inside the `d` descriptor first,
/// then at the top level
fn locate_slot_spec(candidate: &Value) -> Option<&Value> {
    let descriptor = candidate.get("d").filter(|d| d.is_object());
    descriptor
        .into_iter()
        .chain(std::iter::once(candidate))
        .flat_map(|holder| SLOT_KEYS.iter().filter_map(move |key| holder.get(*key)))
        .find(|spec| !spec.is_null())
}

/// Outcome of resolving an entry's slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotResolution {
    /// Zero-based slots inside the displayed grid
    pub slots: BTreeSet<u32>,
    /// How many distinct raw slot values the payload named
    pub raw_count: usize,
    /// Largest zero-based slot named, before dropping out-of-range ones
    pub max_seen: Option<u32>,
}

/// Resolves an entry's slot specification to zero-based grid rows.
///
/// If the smallest raw value is 1 or more the whole set is taken as one-based
/// and shifted down by one; otherwise it is already zero-based. A zero-based
/// set that happens to start at 1 cannot be told apart from a one-based set
/// and will be shifted too. Rows outside `[0, slot_count)` are dropped.
pub fn resolve_slots(candidate: &Value, slot_count: u32) -> SlotResolution {
    let raw = locate_slot_spec(candidate).map(raw_slots).unwrap_or_default();

    let shift = match raw.first() {
        Some(&min) if min >= 1 => 1,
        _ => 0,
    };
    let rebased: Vec<i64> = raw.iter().map(|slot| slot - shift).collect();

    let max_seen = rebased
        .iter()
        .copied()
        .filter(|slot| *slot >= 0)
        .max()
        .map(|slot| u32::try_from(slot).unwrap_or(u32::MAX));

    let slots = rebased
        .iter()
        .filter_map(|slot| u32::try_from(*slot).ok())
        .filter(|slot| *slot < slot_count)
        .collect();

    SlotResolution {
        slots,
        raw_count: raw.len(),
        max_seen,
    }
}
