use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/// First and last weekday a course can be placed on (Monday = 1 ... Friday = 5)
pub const FIRST_DAY: u8 = 1;
pub const LAST_DAY: u8 = 5;

/// The part of a course that is stored in every grid cell it occupies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub teacher: String,
}

/// A fully validated course: concrete day and a non-empty, in-range slot set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseEntry {
    pub course: Course,
    pub day: u8,
    pub slots: BTreeSet<u32>,
}

/// Grid coordinate of a schedule cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub day: u8,
    pub slot: u32,
}

impl SlotKey {
    pub fn new(day: u8, slot: u32) -> Self {
        SlotKey { day, slot }
    }

    /// True when the key addresses a cell of a grid with `slot_count` rows
    pub fn in_bounds(&self, slot_count: u32) -> bool {
        (FIRST_DAY..=LAST_DAY).contains(&self.day) && self.slot < slot_count
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.slot)
    }
}

impl FromStr for SlotKey {
    type Err = String;

    /// Parses the persisted `"<day>-<slot>"` form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, slot) = s
            .split_once('-')
            .ok_or_else(|| format!("slot key without separator: {:?}", s))?;
        let day = day.trim().parse::<u8>().map_err(|e| format!("bad day in {:?}: {}", s, e))?;
        let slot = slot.trim().parse::<u32>().map_err(|e| format!("bad slot in {:?}: {}", s, e))?;
        Ok(SlotKey { day, slot })
    }
}

/// Weekly schedule: cell -> courses held in that cell, in processing order.
/// Several courses may share a cell (combined lecture/lab).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleMap {
    cells: BTreeMap<SlotKey, Vec<Course>>,
}

impl ScheduleMap {
    pub fn new() -> Self {
        ScheduleMap::default()
    }

    /// Appends `course` to the cell at `key`, keeping earlier courses in place
    pub fn push(&mut self, key: SlotKey, course: Course) {
        self.cells.entry(key).or_default().push(course);
    }

    pub fn get(&self, key: &SlotKey) -> Option<&[Course]> {
        self.cells.get(key).map(|courses| courses.as_slice())
    }

    /// Iterates occupied cells ordered by day, then slot
    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &Vec<Course>)> {
        self.cells.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Number of (cell, course) placements across the whole week
    pub fn placements(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Highest occupied slot index, if any
    pub fn max_slot(&self) -> Option<u32> {
        self.cells.keys().map(|key| key.slot).max()
    }
}
