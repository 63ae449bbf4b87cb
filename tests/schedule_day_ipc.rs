
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

// 2025-09-01 is a Monday.
const MONDAY: &str = "2025-09-01";
const TUESDAY: &str = "2025-09-02";

struct Harness {
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u32,
}

impl Harness {
    fn new(workspace_prefix: &str) -> Self {
        let workspace = temp_dir(workspace_prefix);
        let (_child, mut stdin, mut reader) = spawn_sidecar();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "0",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        Harness {
            stdin,
            reader,
            next_id: 1,
        }
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.next_id.to_string();
        self.next_id += 1;
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn offering(&mut self, code: &str, room: Option<&str>) -> String {
        self.call(
            "offerings.create",
            json!({
                "teacherId": "t1",
                "courseCode": code,
                "courseName": format!("{} Lecture", code),
                "section": "A",
                "room": room
            }),
        )
        .get("offeringId")
        .and_then(|v| v.as_str())
        .expect("offeringId")
        .to_string()
    }

    fn monday_slot(&mut self, offering_id: &str, start: &str, end: &str) {
        let _ = self.call(
            "timetable.add",
            json!({
                "offeringId": offering_id,
                "weekday": "monday",
                "startTime": start,
                "endTime": end
            }),
        );
    }

    fn day(&mut self, date: &str) -> Vec<serde_json::Value> {
        self.call("schedule.day", json!({ "teacherId": "t1", "date": date }))
            .get("sessions")
            .and_then(|v| v.as_array())
            .cloned()
            .expect("sessions array")
    }

    fn day_at(&mut self, date: &str, now: &str) -> Vec<serde_json::Value> {
        self.call(
            "schedule.day",
            json!({ "teacherId": "t1", "date": date, "now": now }),
        )
        .get("sessions")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("sessions array")
    }
}

fn field<'a>(row: &'a serde_json::Value, key: &str) -> &'a str {
    row.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

#[test]
fn plain_weekday_is_the_timetable_sorted_by_start() {
    let mut h = Harness::new("academix-day-plain");
    let late = h.offering("CSE301", Some("R101"));
    let early = h.offering("MAT210", Some("R102"));
    h.monday_slot(&late, "13:00", "14:00");
    h.monday_slot(&early, "10:00", "11:00");

    let sessions = h.day(MONDAY);
    assert_eq!(sessions.len(), 2);
    assert_eq!(field(&sessions[0], "courseCode"), "MAT210");
    assert_eq!(field(&sessions[0], "kind"), "regular");
    assert_eq!(field(&sessions[1], "courseCode"), "CSE301");

    // Tuesday has no timetable rows.
    assert!(h.day(TUESDAY).is_empty());

    // Unchanged data reconciles identically.
    let again = h.day(MONDAY);
    assert_eq!(sessions, again);
}

#[test]
fn cancellation_empties_the_slot() {
    let mut h = Harness::new("academix-day-cancel");
    let offering = h.offering("CSE301", Some("R101"));
    h.monday_slot(&offering, "10:00", "11:00");

    let _ = h.call(
        "exceptions.create",
        json!({ "offeringId": offering, "originalDate": MONDAY }),
    );

    assert!(h.day(MONDAY).is_empty());
}

#[test]
fn same_day_move_yields_one_rescheduled_entry() {
    let mut h = Harness::new("academix-day-same-day-move");
    let offering = h.offering("CSE301", Some("R101"));
    h.monday_slot(&offering, "10:00", "11:00");

    let _ = h.call(
        "exceptions.create",
        json!({
            "offeringId": offering,
            "originalDate": MONDAY,
            "newDate": MONDAY,
            "newStartTime": "14:00",
            "newEndTime": "15:00"
        }),
    );

    let sessions = h.day(MONDAY);
    assert_eq!(sessions.len(), 1);
    assert_eq!(field(&sessions[0], "kind"), "rescheduled");
    assert_eq!(field(&sessions[0], "startTime"), "14:00");
    assert_eq!(field(&sessions[0], "endTime"), "15:00");
    // Room falls back to the offering's regular room.
    assert_eq!(field(&sessions[0], "room"), "R101");
}

#[test]
fn move_to_another_day_and_ad_hoc_extra() {
    let mut h = Harness::new("academix-day-moves");
    let moved = h.offering("CSE301", Some("R101"));
    let steady = h.offering("MAT210", Some("R102"));
    let extra = h.offering("PHY101", Some("Lab 2"));
    h.monday_slot(&moved, "10:00", "11:00");
    h.monday_slot(&steady, "13:00", "14:00");

    // Move CSE301 from Monday to Tuesday morning, with a room override.
    let _ = h.call(
        "exceptions.create",
        json!({
            "offeringId": moved,
            "originalDate": MONDAY,
            "newDate": TUESDAY,
            "newStartTime": "09:00",
            "newEndTime": "10:00",
            "room": "R303"
        }),
    );
    // Ad-hoc PHY101 class on Monday, no timetable row at all.
    let _ = h.call(
        "exceptions.create",
        json!({
            "offeringId": extra,
            "newDate": MONDAY,
            "newStartTime": "08:00",
            "newEndTime": "09:00"
        }),
    );

    let monday = h.day(MONDAY);
    assert_eq!(monday.len(), 2);
    assert_eq!(field(&monday[0], "courseCode"), "PHY101");
    assert_eq!(field(&monday[0], "kind"), "rescheduled");
    assert_eq!(field(&monday[0], "room"), "Lab 2");
    assert_eq!(field(&monday[1], "courseCode"), "MAT210");
    assert_eq!(field(&monday[1], "kind"), "regular");

    let tuesday = h.day(TUESDAY);
    assert_eq!(tuesday.len(), 1);
    assert_eq!(field(&tuesday[0], "courseCode"), "CSE301");
    assert_eq!(field(&tuesday[0], "kind"), "rescheduled");
    assert_eq!(field(&tuesday[0], "room"), "R303");
}

#[test]
fn live_flags_follow_the_provided_clock() {
    let mut h = Harness::new("academix-day-live");
    let offering = h.offering("CSE301", Some("R101"));
    h.monday_slot(&offering, "10:00", "11:00");

    let live = |rows: &[serde_json::Value]| {
        rows[0]
            .get("live")
            .and_then(|v| v.as_bool())
            .expect("live flag")
    };

    let rows = h.day_at(MONDAY, "2025-09-01T10:00:00");
    assert!(live(&rows));
    let rows = h.day_at(MONDAY, "2025-09-01T11:00:00");
    assert!(live(&rows));
    let rows = h.day_at(MONDAY, "2025-09-01T11:00:01");
    assert!(!live(&rows));
    let rows = h.day_at(MONDAY, "2025-09-01T09:59:59");
    assert!(!live(&rows));
    // Same clock time on the wrong date is not live.
    let rows = h.day_at(MONDAY, "2025-09-02T10:30:00");
    assert!(!live(&rows));
}

#[test]
fn unknown_teacher_reconciles_to_an_empty_day() {
    let mut h = Harness::new("academix-day-empty");
    let day = h.call(
        "schedule.day",
        json!({ "teacherId": "nobody", "date": MONDAY }),
    );
    assert_eq!(field(&day, "weekday"), "monday");
    assert_eq!(
        day.get("sessions").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}
