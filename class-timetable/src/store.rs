use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Serialize, Deserialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schedule::{default_slot_count, Course, ScheduleMap, SlotKey, FIRST_DAY, LAST_DAY};

/// Version written into every schedule document
pub const DOCUMENT_VERSION: u32 = 1;

/// Persisted form of a schedule: cells keyed by `"<day>-<slot>"`
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub version: u32,
    #[serde(default)]
    pub saved_at: Option<String>,
    pub entries: BTreeMap<String, Vec<Course>>,
}

impl ScheduleDocument {
    pub fn from_schedule(schedule: &ScheduleMap) -> Self {
        ScheduleDocument {
            version: DOCUMENT_VERSION,
            saved_at: Some(Utc::now().to_rfc3339()),
            entries: schedule
                .iter()
                .map(|(key, courses)| (key.to_string(), courses.clone()))
                .collect(),
        }
    }

    /// Rebuilds the schedule. Cells beyond `slot_count` are dropped (the grid
    /// may have been configured smaller since the save); malformed keys and
    /// days outside the week make the whole document corrupt.
    pub fn into_schedule(self, slot_count: u32) -> Result<ScheduleMap, StoreError> {
        if self.version != DOCUMENT_VERSION {
            return Err(StoreError::Corrupt(format!("unsupported document version {}", self.version)));
        }

        let mut schedule = ScheduleMap::new();
        let mut dropped = 0;
        for (raw_key, courses) in self.entries {
            let key: SlotKey = raw_key.parse().map_err(StoreError::Corrupt)?;
            if !(FIRST_DAY..=LAST_DAY).contains(&key.day) {
                return Err(StoreError::Corrupt(format!("day out of range in key {:?}", raw_key)));
            }
            if key.slot >= slot_count {
                dropped += courses.len();
                continue;
            }
            for course in courses {
                schedule.push(key, course);
            }
        }

        if dropped > 0 {
            warn!("Dropped {} stored placements beyond the {} displayed slots", dropped, slot_count);
        }
        Ok(schedule)
    }
}

/// Serializes a schedule into its document text
pub fn encode_schedule(schedule: &ScheduleMap) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(&ScheduleDocument::from_schedule(schedule))?)
}

/// Parses document text back into a schedule
pub fn decode_schedule(text: &str, slot_count: u32) -> Result<ScheduleMap, StoreError> {
    let document: ScheduleDocument =
        serde_json::from_str(text).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    document.into_schedule(slot_count)
}

/// Decodes a stored document, substituting an empty schedule when it is corrupt
fn decode_or_empty(text: &str, slot_count: u32) -> ScheduleMap {
    match decode_schedule(text, slot_count) {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!("Ignoring stored schedule: {}", e);
            ScheduleMap::new()
        }
    }
}

/// Durable home of the current schedule, replaced as a whole on every save
pub trait ScheduleStore: Send + Sync {
    /// Current schedule; missing or corrupt data yields an empty schedule
    fn load(&self) -> ScheduleMap;

    /// Replaces the stored schedule with a single whole-document write
    fn save(&self, schedule: &ScheduleMap) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Stores the schedule document as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    slot_count: u32,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P, slot_count: u32) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
            slot_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for JsonFileStore {
    fn load(&self) -> ScheduleMap {
        match fs::read_to_string(&self.path) {
            Ok(text) => decode_or_empty(&text, self.slot_count),
            Err(e) if e.kind() == ErrorKind::NotFound => ScheduleMap::new(),
            Err(e) => {
                warn!("Could not read {}: {}", self.path.display(), e);
                ScheduleMap::new()
            }
        }
    }

    fn save(&self, schedule: &ScheduleMap) -> Result<(), StoreError> {
        let text = encode_schedule(schedule)?;

        // Write next to the target, then rename over it
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        info!("Saved {} placements to {}", schedule.placements(), self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("Cleared schedule at {}", self.path.display());
        Ok(())
    }
}

/// Keeps the schedule document in memory
#[derive(Debug)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
    slot_count: u32,
}

impl MemoryStore {
    pub fn new(slot_count: u32) -> Self {
        MemoryStore {
            document: Mutex::new(None),
            slot_count,
        }
    }

    /// Starts from an existing (possibly corrupt) document text
    pub fn with_document(text: impl Into<String>, slot_count: u32) -> Self {
        MemoryStore {
            document: Mutex::new(Some(text.into())),
            slot_count,
        }
    }

    /// The raw document text, if one is stored
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(default_slot_count())
    }
}

impl ScheduleStore for MemoryStore {
    fn load(&self) -> ScheduleMap {
        match self.document() {
            Some(text) => decode_or_empty(&text, self.slot_count),
            None => ScheduleMap::new(),
        }
    }

    fn save(&self, schedule: &ScheduleMap) -> Result<(), StoreError> {
        let text = encode_schedule(schedule)?;
        *self.document.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(text);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.document.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScheduleMap {
        let mut schedule = ScheduleMap::new();
        let course = Course {
            name: "Signals".to_string(),
            code: "6810".to_string(),
            room: "EE207".to_string(),
            teacher: String::new(),
        };
        schedule.push(SlotKey::new(2, 1), course.clone());
        schedule.push(SlotKey::new(2, 10), course);
        schedule.push(SlotKey::new(2, 10), Course { name: "Lab".to_string(), ..Course::default() });
        schedule
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new(13);
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn default_memory_store_keeps_the_default_grid() {
        let store = MemoryStore::default();
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn document_uses_day_slot_keys() {
        let text = encode_schedule(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["entries"]["2-1"][0]["room"], "EE207");
        assert_eq!(value["entries"]["2-10"][1]["name"], "Lab");
        assert_eq!(value["entries"]["2-10"][1]["teacher"], "");
    }

    #[test]
    fn corrupt_documents_load_empty() {
        for text in [
            "not json",
            r#"{"version": 2, "entries": {}}"#,
            r#"{"version": 1, "entries": {"x": []}}"#,
            r#"{"version": 1, "entries": {"7-0": [{"name": "Sat"}]}}"#,
            r#"{"version": 1}"#,
        ] {
            assert!(MemoryStore::with_document(text, 13).load().is_empty(), "{}", text);
        }
    }

    #[test]
    fn cells_beyond_grid_are_dropped_on_load() {
        let store = MemoryStore::new(5);
        store.save(&sample()).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get(&SlotKey::new(2, 1)).is_some());
    }

    #[test]
    fn file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("timetable.json"), 13);

        assert!(store.load().is_empty());
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());

        store.clear().unwrap();
        assert!(store.load().is_empty());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn file_store_tolerates_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.json");
        fs::write(&path, "{ truncated").unwrap();
        assert!(JsonFileStore::new(&path, 13).load().is_empty());
    }
}
