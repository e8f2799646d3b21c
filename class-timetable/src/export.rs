use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::WriterBuilder;
use serde_json::{json, Value};

use crate::schedule::{ScheduleMap, TimeSlot};

/// Exports the schedule as an importable payload.
///
/// One entry per placed course and cell, written with the short canonical
/// keys and one-based slots, so importing the result rebuilds the same
/// schedule (including the order of courses sharing a cell).
pub fn export_payload(schedule: &ScheduleMap) -> Value {
    let entries: Vec<Value> = schedule
        .iter()
        .flat_map(|(key, courses)| {
            courses.iter().map(move |course| {
                json!({
                    "n": course.name,
                    "m": course.code,
                    "e": course.room,
                    "t": course.teacher,
                    "d": { "w": key.day, "s": [key.slot + 1] }
                })
            })
        })
        .collect();
    Value::Array(entries)
}

/// Writes the importable payload to a JSON file
pub fn export_payload_to_file(schedule: &ScheduleMap, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer_pretty(&mut file, &export_payload(schedule))?;
    writeln!(file)?;
    Ok(())
}

/// Writes the schedule as CSV lines `day,start,end,name,code,room,teacher`
pub fn write_csv<W: Write>(writer: W, schedule: &ScheduleMap, slots: &[TimeSlot]) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    wtr.write_record(["day", "start", "end", "name", "code", "room", "teacher"])?;

    for (key, courses) in schedule.iter() {
        let (start, end) = slots
            .get(key.slot as usize)
            .map(|time| (time.start.as_str(), time.end.as_str()))
            .unwrap_or(("", ""));
        let day = key.day.to_string();
        for course in courses {
            wtr.write_record([
                day.as_str(),
                start,
                end,
                course.name.as_str(),
                course.code.as_str(),
                course.room.as_str(),
                course.teacher.as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the CSV export to a file
pub fn export_csv_to_file(schedule: &ScheduleMap, slots: &[TimeSlot], path: &Path) -> csv::Result<()> {
    let file = File::create(path)?;
    write_csv(file, schedule, slots)
}
