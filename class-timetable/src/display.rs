use std::io::{self, Write};

use tracing::warn;

use crate::import::Renderer;
use crate::schedule::{Course, Reconciliation, RejectReason, ScheduleMap, SlotKey, TimeSlot, FIRST_DAY, LAST_DAY};

const DAY_NAMES: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

/// Shown in place of a missing course name
pub const UNNAMED_COURSE: &str = "(unnamed course)";

/// Weekday name for days 1..=5
pub fn day_name(day: u8) -> &'static str {
    match day {
        1..=5 => DAY_NAMES[usize::from(day - 1)],
        _ => "?",
    }
}

/// Formats a course as `name [code・room] (teacher)`, leaving out empty parts
pub fn format_course(course: &Course) -> String {
    let name = if course.name.is_empty() { UNNAMED_COURSE } else { course.name.as_str() };

    let meta: Vec<&str> = [course.code.as_str(), course.room.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

    let mut text = name.to_string();
    if !meta.is_empty() {
        text.push_str(&format!(" [{}]", meta.join("・")));
    }
    if !course.teacher.is_empty() {
        text.push_str(&format!(" ({})", course.teacher));
    }
    text
}

fn reason_text(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::NotARecord => "not a course record",
        RejectReason::DayUnresolved => "no weekday between 1 and 5",
        RejectReason::NoSlots => "no time slots",
        RejectReason::SlotsOutOfRange => "all time slots outside the timetable",
    }
}

/// Summary shown before the user confirms an import
pub fn preview_text(reconciliation: &Reconciliation, slot_count: u32) -> String {
    let mut lines = vec![format!(
        "{} placements across {} cells, {} entries ignored.",
        reconciliation.placed,
        reconciliation.schedule.len(),
        reconciliation.ignored
    )];

    for rejection in &reconciliation.rejections {
        lines.push(format!("  - entry {} skipped: {}", rejection.index + 1, reason_text(rejection.reason)));
    }

    if let Some(max) = reconciliation.max_slot_seen.filter(|max| *max >= slot_count) {
        lines.push(format!(
            "Warning: the payload uses slot {} but only {} slots are displayed; later slots are left out.",
            max + 1,
            slot_count
        ));
    }

    if !reconciliation.commit_allowed() {
        lines.push("Nothing could be placed, the current schedule will be kept.".to_string());
    } else {
        lines.push("Importing replaces the current schedule.".to_string());
    }

    lines.join("\n")
}

/// Writes the schedule day by day, one line per occupied slot
pub fn write_schedule<W: Write>(out: &mut W, schedule: &ScheduleMap, slots: &[TimeSlot]) -> io::Result<()> {
    writeln!(out, "=== Weekly Schedule ===")?;
    if schedule.is_empty() {
        writeln!(out, "(empty)")?;
        return Ok(());
    }

    for day in FIRST_DAY..=LAST_DAY {
        writeln!(out, "\n{}", day_name(day))?;
        let mut any = false;
        for (index, time) in slots.iter().enumerate() {
            let key = SlotKey::new(day, index as u32);
            if let Some(courses) = schedule.get(&key) {
                let names: Vec<String> = courses.iter().map(format_course).collect();
                writeln!(out, "  Slot {:>2} ({}) -> {}", index + 1, time.label(), names.join(" / "))?;
                any = true;
            }
        }
        if !any {
            writeln!(out, "  (no classes)")?;
        }
    }

    writeln!(out, "\nTotal placements: {}", schedule.placements())?;
    Ok(())
}

/// Renders the schedule as text into any writer
pub struct TextGridRenderer<W: Write> {
    out: W,
    slots: Vec<TimeSlot>,
}

impl<W: Write> TextGridRenderer<W> {
    pub fn new(out: W, slots: Vec<TimeSlot>) -> Self {
        TextGridRenderer { out, slots }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextGridRenderer<W> {
    fn render(&mut self, schedule: &ScheduleMap) {
        if let Err(e) = write_schedule(&mut self.out, schedule, &self.slots) {
            warn!("Failed to render schedule: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{import_text, time_slots};

    #[test]
    fn formats_course_parts() {
        let course = Course {
            name: "Signals".to_string(),
            code: "6810".to_string(),
            room: "EE207".to_string(),
            teacher: "Lin".to_string(),
        };
        assert_eq!(format_course(&course), "Signals [6810・EE207] (Lin)");
        assert_eq!(format_course(&Course::default()), UNNAMED_COURSE);
        let room_only = Course { name: "Lab".to_string(), room: "B1".to_string(), ..Course::default() };
        assert_eq!(format_course(&room_only), "Lab [B1]");
    }

    #[test]
    fn preview_reports_rejections_and_truncation() {
        let raw = r#"[{"n":"A","w":1,"s":[1,14]},{"n":"B","w":8,"s":[1]}]"#;
        let result = import_text(raw, 13).unwrap();
        let text = preview_text(&result, 13);
        assert!(text.contains("1 placements"));
        assert!(text.contains("1 entries ignored"));
        assert!(text.contains("entry 2 skipped: no weekday"));
        assert!(text.contains("uses slot 14"));
    }

    #[test]
    fn renders_grid_lines() {
        let result = import_text(r#"[{"n":"Signals","e":"EE207","d":{"w":2,"s":[2]}}]"#, 13).unwrap();
        let mut renderer = TextGridRenderer::new(Vec::new(), time_slots(13));
        renderer.render(&result.schedule);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains("Tuesday"));
        assert!(text.contains("Slot  2 (09:10-10:00) -> Signals [EE207]"));
        assert!(text.contains("Total placements: 1"));
    }

    #[test]
    fn renders_empty_schedule() {
        let mut out = Vec::new();
        write_schedule(&mut out, &ScheduleMap::new(), &time_slots(13)).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("(empty)"));
    }
}
