use serde_json::Value;

use super::slot_utils::integer_of;
use super::types::{Course, FIRST_DAY, LAST_DAY};

/// Aliases for each canonical course attribute, in priority order
static NAME_KEYS: [&str; 3] = ["n", "name", "title"];
static CODE_KEYS: [&str; 2] = ["m", "code"];
static ROOM_KEYS: [&str; 3] = ["e", "room", "loc"];
static TEACHER_KEYS: [&str; 2] = ["t", "teacher"];
static DAY_KEYS: [&str; 2] = ["w", "week"];

/// Nested day/slot descriptor key
pub const DESCRIPTOR_KEY: &str = "d";

/// A normalized entry that may still lack its load-bearing day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCourseEntry {
    pub course: Course,
    pub day: Option<u8>,
}

/// Renders a scalar field as text. Strings are trimmed, numbers keep their
/// JSON spelling, anything else counts as absent.
fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    // Blank counts as absent, but the text itself is kept as written
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First present, non-empty value among `keys`, or an empty string
pub fn resolve_field(candidate: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| candidate.get(*key))
        .find_map(text_of)
        .unwrap_or_default()
}

/// Day from the `d` descriptor, falling back to the top level.
/// The first present value decides; it must be an integer weekday.
pub fn resolve_day(candidate: &Value) -> Option<u8> {
    let descriptor = candidate.get(DESCRIPTOR_KEY).filter(|d| d.is_object());
    let raw = descriptor
        .into_iter()
        .chain(std::iter::once(candidate))
        .flat_map(|holder| DAY_KEYS.iter().filter_map(move |key| holder.get(*key)))
        .find(|value| !value.is_null())?;

    integer_of(raw)
        .filter(|day| (i64::from(FIRST_DAY)..=i64::from(LAST_DAY)).contains(day))
        .map(|day| day as u8)
}

/// Maps an untrusted entry onto canonical course fields.
/// Never fails; entries that are not JSON objects come back empty.
pub fn normalize_entry(candidate: &Value) -> PartialCourseEntry {
    if !candidate.is_object() {
        return PartialCourseEntry::default();
    }

    PartialCourseEntry {
        course: Course {
            name: resolve_field(candidate, &NAME_KEYS),
            code: resolve_field(candidate, &CODE_KEYS),
            room: resolve_field(candidate, &ROOM_KEYS),
            teacher: resolve_field(candidate, &TEACHER_KEYS),
        },
        day: resolve_day(candidate),
    }
}
