use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ImportError;
use crate::parser::extract_payload;
use super::normalize::normalize_entry;
use super::slot_utils::resolve_slots;
use super::tabular::reconcile_csv;
use super::types::{CourseEntry, ScheduleMap, SlotKey};

/// Key of the entry array when the payload is wrapped in an object
pub const COURSES_KEY: &str = "courses";

/// Why a single payload entry was left out of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The entry is not a JSON object
    NotARecord,
    /// No weekday in 1..=5 could be read
    DayUnresolved,
    /// No slot specification could be read
    NoSlots,
    /// Every slot fell outside the displayed grid
    SlotsOutOfRange,
}

/// A rejected entry: its position in the payload and the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRejection {
    pub index: usize,
    pub reason: RejectReason,
}

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// A brand-new schedule built only from this payload
    pub schedule: ScheduleMap,
    /// Number of (day, slot) placements made
    pub placed: usize,
    /// Number of entries rejected
    pub ignored: usize,
    /// Largest zero-based slot any entry named, including dropped ones
    pub max_slot_seen: Option<u32>,
    pub rejections: Vec<EntryRejection>,
}

impl Reconciliation {
    /// True when some entry named a slot the grid cannot display
    pub fn truncated(&self, slot_count: u32) -> bool {
        self.max_slot_seen.map_or(false, |max| max >= slot_count)
    }

    /// Committing would wipe the current schedule without placing anything
    pub fn commit_allowed(&self) -> bool {
        !(self.placed == 0 && self.ignored > 0)
    }
}

/// Returns the entry sequence of a parsed payload: a top-level array or the
/// array under `courses`. Anything else invalidates the whole payload.
pub fn entries_of(parsed: &Value) -> Result<&[Value], ImportError> {
    match parsed {
        Value::Array(entries) => Ok(entries.as_slice()),
        Value::Object(record) => match record.get(COURSES_KEY) {
            Some(Value::Array(entries)) => Ok(entries.as_slice()),
            Some(_) => Err(ImportError::SchemaInvalid(format!("`{}` is not an array", COURSES_KEY))),
            None => Err(ImportError::SchemaInvalid(format!("object has no `{}` array", COURSES_KEY))),
        },
        _ => Err(ImportError::SchemaInvalid("payload is neither an array nor an object".to_string())),
    }
}

/// Validates one entry into a canonical course, or says why it was rejected
fn canonical_entry(
    candidate: &Value,
    slot_count: u32,
    max_slot_seen: &mut Option<u32>,
) -> Result<CourseEntry, RejectReason> {
    if !candidate.is_object() {
        return Err(RejectReason::NotARecord);
    }

    let partial = normalize_entry(candidate);
    let resolution = resolve_slots(candidate, slot_count);
    // Tracked before any rejection so truncated displays can be reported
    *max_slot_seen = (*max_slot_seen).max(resolution.max_seen);

    let day = partial.day.ok_or(RejectReason::DayUnresolved)?;
    if resolution.raw_count == 0 {
        return Err(RejectReason::NoSlots);
    }
    if resolution.slots.is_empty() {
        return Err(RejectReason::SlotsOutOfRange);
    }

    Ok(CourseEntry {
        course: partial.course,
        day,
        slots: resolution.slots,
    })
}

/// Converts a parsed payload into a fresh schedule.
///
/// Entries that cannot be placed are counted in `ignored` and skipped as a
/// whole; they never stop the remaining entries from being placed.
pub fn reconcile(parsed: &Value, slot_count: u32) -> Result<Reconciliation, ImportError> {
    let entries = entries_of(parsed)?;

    let mut schedule = ScheduleMap::new();
    let mut placed = 0;
    let mut rejections = Vec::new();
    let mut max_slot_seen = None;

    for (index, candidate) in entries.iter().enumerate() {
        match canonical_entry(candidate, slot_count, &mut max_slot_seen) {
            Ok(entry) => {
                for &slot in &entry.slots {
                    schedule.push(SlotKey::new(entry.day, slot), entry.course.clone());
                    placed += 1;
                }
            }
            Err(reason) => {
                debug!("Entry {} rejected: {:?}", index, reason);
                rejections.push(EntryRejection { index, reason });
            }
        }
    }

    info!(
        "Reconciled {} entries: {} placements, {} ignored",
        entries.len(),
        placed,
        rejections.len()
    );

    Ok(Reconciliation {
        schedule,
        placed,
        ignored: rejections.len(),
        max_slot_seen,
        rejections,
    })
}

/// Extracts and reconciles raw decoded text in one step. Text that holds no
/// JSON is read as CSV timetable lines before giving up.
pub fn import_text(raw: &str, slot_count: u32) -> Result<Reconciliation, ImportError> {
    match extract_payload(raw) {
        Ok(parsed) => reconcile(&parsed, slot_count),
        Err(ImportError::PayloadNotParseable) => reconcile_csv(raw, slot_count),
        Err(e) => Err(e),
    }
}
