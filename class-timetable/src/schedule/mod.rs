pub mod types;
pub mod slot_utils;
pub mod normalize;
pub mod reconcile;
pub mod tabular;

pub use types::{Course, CourseEntry, ScheduleMap, SlotKey, FIRST_DAY, LAST_DAY};
pub use slot_utils::{default_slot_count, resolve_slots, time_slots, SlotResolution, TimeSlot};
pub use normalize::{normalize_entry, PartialCourseEntry};
pub use reconcile::{import_text, reconcile, EntryRejection, Reconciliation, RejectReason};
pub use tabular::reconcile_csv;
