use csv::{ReaderBuilder, StringRecord};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ImportError;
use super::reconcile::{reconcile, Reconciliation};
use super::slot_utils::{time_slots, TimeSlot};

/// A timetable row needs at least day, start, end and a course name
const MIN_COLUMNS: usize = 4;

/// Maps a `start,end` pair onto one-based grid rows using the row labels.
/// An end that matches no row at or after the start keeps the course to one row.
fn rows_between(start: &str, end: &str, slots: &[TimeSlot]) -> Vec<u32> {
    let first = match slots.iter().position(|slot| slot.start == start.trim()) {
        Some(first) => first,
        None => return Vec::new(),
    };
    let last = slots[first..]
        .iter()
        .position(|slot| slot.end == end.trim())
        .map_or(first, |offset| first + offset);

    (first..=last).map(|row| row as u32 + 1).collect()
}

/// Turns one CSV record into a payload entry; None for lines that are not
/// timetable rows (headers, notes, short lines)
fn entry_of(record: &StringRecord, slots: &[TimeSlot]) -> Option<Value> {
    if record.len() < MIN_COLUMNS {
        return None;
    }
    let day: i64 = record.get(0)?.trim().parse().ok()?;
    let field = |index: usize| record.get(index).unwrap_or("");

    Some(json!({
        "n": field(3),
        "m": field(4),
        "e": field(5),
        "t": field(6),
        "d": { "w": day, "s": rows_between(field(1), field(2), slots) }
    }))
}

/// Reads `day,start,end,name[,code,room,teacher]` lines (comma or tab
/// separated) and reconciles them like a JSON payload. Start and end times are
/// looked up in the labels of a `slot_count` grid.
///
/// Fails with `PayloadNotParseable` when no line looks like a timetable row.
pub fn reconcile_csv(text: &str, slot_count: u32) -> Result<Reconciliation, ImportError> {
    let text = text.trim();
    let delimiter = if text.contains(',') { b',' } else { b'\t' };
    let slots = time_slots(slot_count);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let entries: Vec<Value> = reader
        .records()
        .filter_map(Result::ok)
        .filter_map(|record| entry_of(&record, &slots))
        .collect();

    if entries.is_empty() {
        return Err(ImportError::PayloadNotParseable);
    }
    debug!("payload read as {} CSV rows", entries.len());
    reconcile(&Value::Array(entries), slot_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::write_csv;
    use crate::schedule::{import_text, RejectReason, SlotKey};

    #[test]
    fn tab_separated_rows_cover_their_time_span() {
        let result = reconcile_csv("2\t09:10\t11:00\tCalculus", 13).unwrap();
        assert_eq!(result.placed, 2);
        for slot in [1, 2] {
            assert_eq!(result.schedule.get(&SlotKey::new(2, slot)).unwrap()[0].name, "Calculus");
        }
    }

    #[test]
    fn unknown_end_keeps_a_single_row() {
        let result = reconcile_csv("1,13:10,13:55,Lab,L2,R9,Lin", 13).unwrap();
        let courses = result.schedule.get(&SlotKey::new(1, 4)).unwrap();
        assert_eq!(result.placed, 1);
        assert_eq!((courses[0].code.as_str(), courses[0].teacher.as_str()), ("L2", "Lin"));
    }

    #[test]
    fn bad_rows_are_ignored_individually() {
        let text = "day,start,end,name\n1,08:10,09:00,A\n7,08:10,09:00,B\n2,07:00,08:00,C\n";
        let result = reconcile_csv(text, 13).unwrap();
        assert_eq!(result.placed, 1);
        assert_eq!(result.ignored, 2);
        assert_eq!(result.rejections[0].reason, RejectReason::DayUnresolved);
        assert_eq!(result.rejections[1].reason, RejectReason::NoSlots);
    }

    #[test]
    fn text_without_rows_is_not_parseable() {
        for text in ["hello world", "a,b,c,d", "1,2", ""] {
            assert!(matches!(reconcile_csv(text, 13), Err(ImportError::PayloadNotParseable)));
        }
    }

    #[test]
    fn csv_export_imports_back_identically() {
        let payload = r#"[
            {"n":"Lecture","m":"M1","e":"R1","t":"Chen","d":{"w":3,"s":[1,2]}},
            {"n":"Lab, part 2","e":"R2","d":{"w":3,"s":[1]}},
            {"n":"Late","d":{"w":5,"s":[14]}}
        ]"#;
        let original = import_text(payload, 15).unwrap().schedule;

        let mut out = Vec::new();
        write_csv(&mut out, &original, &time_slots(15)).unwrap();
        let text = String::from_utf8(out).unwrap();

        let again = import_text(&text, 15).unwrap();
        assert_eq!(again.schedule, original);
        assert_eq!(again.ignored, 0);
    }
}
