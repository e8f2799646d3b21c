use class_timetable::export::export_payload;
use class_timetable::import::ImportSession;
use class_timetable::parser::RawPayload;
use class_timetable::schedule::{import_text, reconcile, Course, ScheduleMap, SlotKey};
use class_timetable::store::{JsonFileStore, ScheduleStore};
use serde_json::json;

const SLOTS: u32 = 13;

fn names_at(schedule: &ScheduleMap, day: u8, slot: u32) -> Vec<String> {
    schedule
        .get(&SlotKey::new(day, slot))
        .map(|courses| courses.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default()
}

fn commit(session: &mut ImportSession, store: &dyn ScheduleStore, raw: &str) -> ScheduleMap {
    session.preview(&RawPayload::pasted(raw)).unwrap();
    session.commit(store).unwrap()
}

#[test]
fn scenario_signals_lands_on_tuesday() {
    let raw = r#"[{"n":"Signals","m":"6810","e":"EE207","d":{"w":2,"s":[2,3,4]}}]"#;
    let result = import_text(raw, SLOTS).unwrap();

    let expected = Course {
        name: "Signals".to_string(),
        code: "6810".to_string(),
        room: "EE207".to_string(),
        teacher: String::new(),
    };
    let keys: Vec<SlotKey> = result.schedule.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, vec![SlotKey::new(2, 1), SlotKey::new(2, 2), SlotKey::new(2, 3)]);
    for (_, courses) in result.schedule.iter() {
        assert_eq!(courses, &vec![expected.clone()]);
    }
    assert_eq!((result.placed, result.ignored), (3, 0));
}

#[test]
fn round_trip_through_canonical_payload() {
    let mut original = ScheduleMap::new();
    let lecture = Course { name: "Lecture".into(), code: "L1".into(), room: "R1".into(), teacher: "Wu".into() };
    let lab = Course { name: " Lab ".into(), room: "R2".into(), ..Course::default() };
    original.push(SlotKey::new(1, 0), lecture.clone());
    original.push(SlotKey::new(1, 0), lab.clone());
    original.push(SlotKey::new(1, 1), lab);
    original.push(SlotKey::new(1, 1), lecture.clone());
    original.push(SlotKey::new(5, 12), lecture);

    let serialized = serde_json::to_string(&export_payload(&original)).unwrap();
    let result = import_text(&serialized, SLOTS).unwrap();
    assert_eq!(result.schedule, original);
}

#[test]
fn importing_twice_is_idempotent() {
    let raw = r#"noise {"courses":[{"title":"Optics","loc":"P3","week":3,"slots":{"start":5,"end":7}},{"n":"Bad"}]} tail"#;
    let first = import_text(raw, SLOTS).unwrap();
    let second = import_text(raw, SLOTS).unwrap();
    assert_eq!(first, second);
    assert_eq!((first.placed, first.ignored), (3, 1));
}

#[test]
fn later_import_replaces_earlier_one_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("timetable.json"), SLOTS);
    let mut session = ImportSession::new(SLOTS);

    commit(&mut session, &store, r#"[{"n":"A","d":{"w":1,"s":[1]}}]"#);
    commit(&mut session, &store, r#"[{"n":"B","d":{"w":2,"s":[1]}}]"#);

    let stored = store.load();
    assert!(names_at(&stored, 1, 0).is_empty());
    assert_eq!(names_at(&stored, 2, 0), vec!["B"]);

    commit(&mut session, &store, "[]");
    assert!(store.load().is_empty());
}

#[test]
fn slot_base_heuristic() {
    let slots = |spec: serde_json::Value, count: u32| -> Vec<u32> {
        let result = reconcile(&json!([{"n": "X", "d": {"w": 1, "s": spec}}]), count).unwrap();
        result.schedule.iter().map(|(key, _)| key.slot).collect()
    };
    assert_eq!(slots(json!([1, 2, 3]), SLOTS), vec![0, 1, 2]);
    assert_eq!(slots(json!([0, 1, 2]), SLOTS), vec![0, 1, 2]);
    assert_eq!(slots(json!([2, 3]), 2), vec![1]);
}

#[test]
fn day_bounds_only_affect_ignored() {
    for day in [0, 6] {
        let parsed = json!([
            {"n": "Off", "d": {"w": day, "s": [1, 2]}},
            {"n": "On", "d": {"w": 3, "s": [1, 2]}}
        ]);
        let result = reconcile(&parsed, SLOTS).unwrap();
        assert_eq!(result.placed, 2);
        assert_eq!(result.ignored, 1);
    }
}

#[test]
fn faulty_entries_do_not_block_valid_ones() {
    let parsed = json!([
        {"n": "A", "d": {"w": 1, "s": [1, 2]}},
        {"n": "Missing", "d": {"w": 1}},
        {"n": "B", "d": {"w": 2, "s": [3, 4]}},
        {"n": "Null", "d": {"w": 2, "s": null}},
        {"n": "C", "d": {"w": 5, "s": [5, 6]}}
    ]);
    let result = reconcile(&parsed, SLOTS).unwrap();
    assert_eq!(result.placed, 3 * 2);
    assert_eq!(result.ignored, 2);
    assert_eq!(names_at(&result.schedule, 1, 1), vec!["A"]);
    assert_eq!(names_at(&result.schedule, 2, 3), vec!["B"]);
    assert_eq!(names_at(&result.schedule, 5, 5), vec!["C"]);
}

#[test]
fn failed_import_keeps_stored_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("timetable.json"), SLOTS);
    let mut session = ImportSession::new(SLOTS);
    let saved = commit(&mut session, &store, r#"[{"n":"Keep","w":4,"s":"2-3"}]"#);

    assert!(session.preview(&RawPayload::scanned("%%% not a payload")).is_err());
    assert!(session.preview(&RawPayload::scanned(r#"{"items":[]}"#)).is_err());
    assert_eq!(store.load(), saved);
}
