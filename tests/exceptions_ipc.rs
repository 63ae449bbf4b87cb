
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn setup_offering(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "setup-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "setup-2",
        "offerings.create",
        json!({
            "teacherId": "t1",
            "courseCode": "CSE301",
            "courseName": "Algorithms",
            "room": "R101"
        }),
    );
    let offering_id = created
        .get("offeringId")
        .and_then(|v| v.as_str())
        .expect("offeringId")
        .to_string();
    let _ = request_ok(
        stdin,
        reader,
        "setup-3",
        "timetable.add",
        json!({
            "offeringId": offering_id,
            "weekday": "monday",
            "startTime": "10:00",
            "endTime": "11:00"
        }),
    );
    offering_id
}

#[test]
fn exception_validation_and_listing() {
    let workspace = temp_dir("academix-exceptions");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let offering_id = setup_offering(&mut stdin, &mut reader, &workspace);

    // A ledger row with neither date is meaningless.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "exceptions.create",
        json!({ "offeringId": offering_id }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "exceptions.create",
        json!({ "offeringId": offering_id, "originalDate": "01/09/2025" }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "exceptions.create",
        json!({ "offeringId": "nope", "originalDate": "2025-09-01" }),
    );
    assert_eq!(code, "not_found");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "exceptions.create",
        json!({
            "offeringId": offering_id,
            "originalDate": "2025-09-01",
            "newDate": "2025-09-03",
            "newStartTime": "09:00",
            "newEndTime": "10:00",
            "room": "R202"
        }),
    );
    let exception_id = created
        .get("exceptionId")
        .and_then(|v| v.as_str())
        .expect("exceptionId")
        .to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "exceptions.list",
        json!({ "offeringId": offering_id }),
    );
    let rows = listed
        .get("exceptions")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id").and_then(|v| v.as_str()), Some(exception_id.as_str()));
    assert_eq!(rows[0].get("status").and_then(|v| v.as_str()), Some("active"));
    assert_eq!(
        rows[0].get("originalDate").and_then(|v| v.as_str()),
        Some("2025-09-01")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "exceptions.delete",
        json!({ "exceptionId": exception_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "exceptions.delete",
        json!({ "exceptionId": exception_id }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn status_toggle_controls_schedule_effect() {
    let workspace = temp_dir("academix-exception-status");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let offering_id = setup_offering(&mut stdin, &mut reader, &workspace);

    // 2025-09-01 is a Monday; cancel it.
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exceptions.create",
        json!({ "offeringId": offering_id, "originalDate": "2025-09-01" }),
    );
    let exception_id = created
        .get("exceptionId")
        .and_then(|v| v.as_str())
        .expect("exceptionId")
        .to_string();

    let day_sessions = |stdin: &mut ChildStdin,
                        reader: &mut BufReader<ChildStdout>,
                        id: &str|
     -> usize {
        let day = request_ok(
            stdin,
            reader,
            id,
            "schedule.day",
            json!({ "teacherId": "t1", "date": "2025-09-01" }),
        );
        day.get("sessions")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(usize::MAX)
    };

    assert_eq!(day_sessions(&mut stdin, &mut reader, "2"), 0);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "exceptions.setStatus",
        json!({ "exceptionId": exception_id, "status": "paused" }),
    );
    assert_eq!(code, "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "exceptions.setStatus",
        json!({ "exceptionId": exception_id, "status": "inactive" }),
    );
    assert_eq!(day_sessions(&mut stdin, &mut reader, "5"), 1);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "exceptions.setStatus",
        json!({ "exceptionId": exception_id, "status": "active" }),
    );
    assert_eq!(day_sessions(&mut stdin, &mut reader, "7"), 0);
}
