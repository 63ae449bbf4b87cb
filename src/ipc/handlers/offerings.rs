use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::parse_weekday;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn query(e: rusqlite::Error) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }

    fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key)))?
                .trim()
                .to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

fn offering_exists(conn: &Connection, offering_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM offerings WHERE id = ?", [offering_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::query)
}

fn offerings_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let course_code = get_required_str(params, "courseCode")?;
    let course_name = get_required_str(params, "courseName")?;
    let section = get_optional_str(params, "section")?;
    let room = get_optional_str(params, "room")?;

    let offering_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO offerings(id, teacher_id, course_code, course_name, section, room)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &offering_id,
            &teacher_id,
            &course_code,
            &course_name,
            section.as_deref(),
            room.as_deref(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "offerings" })),
    })?;

    Ok(json!({ "offeringId": offering_id }))
}

fn offerings_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;

    let mut stmt = conn
        .prepare(
            "SELECT o.id,
                    o.course_code,
                    o.course_name,
                    o.section,
                    o.room,
                    (SELECT COUNT(*) FROM regular_sessions rs
                     WHERE rs.offering_id = o.id) AS session_count,
                    (SELECT COUNT(*) FROM reschedule_exceptions x
                     WHERE x.offering_id = o.id AND x.status = 'active') AS exception_count
             FROM offerings o
             WHERE o.teacher_id = ?
             ORDER BY o.course_code, o.section",
        )
        .map_err(HandlerErr::query)?;

    let offerings = stmt
        .query_map([&teacher_id], |row| {
            let id: String = row.get(0)?;
            let course_code: String = row.get(1)?;
            let course_name: String = row.get(2)?;
            let section: Option<String> = row.get(3)?;
            let room: Option<String> = row.get(4)?;
            let session_count: i64 = row.get(5)?;
            let exception_count: i64 = row.get(6)?;
            Ok(json!({
                "id": id,
                "courseCode": course_code,
                "courseName": course_name,
                "section": section,
                "room": room,
                "sessionCount": session_count,
                "activeExceptionCount": exception_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    Ok(json!({ "offerings": offerings }))
}

fn offerings_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let offering_id = get_required_str(params, "offeringId")?;

    if !offering_exists(conn, &offering_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "offering not found".to_string(),
            details: None,
        });
    }

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;

    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    for (sql, table) in [
        (
            "DELETE FROM reschedule_exceptions WHERE offering_id = ?",
            "reschedule_exceptions",
        ),
        (
            "DELETE FROM regular_sessions WHERE offering_id = ?",
            "regular_sessions",
        ),
        ("DELETE FROM offerings WHERE id = ?", "offerings"),
    ] {
        if let Err(e) = tx.execute(sql, [&offering_id]) {
            let _ = tx.rollback();
            return Err(HandlerErr {
                code: "db_delete_failed",
                message: e.to_string(),
                details: Some(json!({ "table": table })),
            });
        }
    }

    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({ "ok": true }))
}

fn timetable_add(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let offering_id = get_required_str(params, "offeringId")?;
    let weekday = get_required_str(params, "weekday")?;
    let start_time = get_required_str(params, "startTime")?;
    let end_time = get_required_str(params, "endTime")?;
    let room = get_optional_str(params, "room")?;

    let Some(day) = parse_weekday(&weekday) else {
        return Err(HandlerErr::bad_params(
            "weekday must be one of monday..sunday",
        ));
    };

    if !offering_exists(conn, &offering_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "offering not found".to_string(),
            details: None,
        });
    }

    let session_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO regular_sessions(id, offering_id, weekday, start_time, end_time, room)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &session_id,
            &offering_id,
            crate::schedule::weekday_code(day),
            &start_time,
            &end_time,
            room.as_deref(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "regular_sessions" })),
    })?;

    Ok(json!({ "sessionId": session_id }))
}

fn timetable_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let offering_id = get_required_str(params, "offeringId")?;

    if !offering_exists(conn, &offering_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "offering not found".to_string(),
            details: None,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, weekday, start_time, end_time, room
             FROM regular_sessions
             WHERE offering_id = ?
             ORDER BY weekday, start_time",
        )
        .map_err(HandlerErr::query)?;

    let sessions = stmt
        .query_map([&offering_id], |row| {
            let id: String = row.get(0)?;
            let weekday: String = row.get(1)?;
            let start_time: String = row.get(2)?;
            let end_time: String = row.get(3)?;
            let room: Option<String> = row.get(4)?;
            Ok(json!({
                "id": id,
                "weekday": weekday,
                "startTime": start_time,
                "endTime": end_time,
                "room": room
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    Ok(json!({ "sessions": sessions }))
}

fn timetable_remove(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;

    let changed = conn
        .execute("DELETE FROM regular_sessions WHERE id = ?", [&session_id])
        .map_err(|e| HandlerErr {
            code: "db_delete_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "regular_sessions" })),
        })?;
    if changed == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: "session not found".to_string(),
            details: None,
        });
    }

    Ok(json!({ "ok": true }))
}

fn with_conn(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "offerings.create" => Some(with_conn(state, req, offerings_create)),
        "offerings.list" => Some(with_conn(state, req, offerings_list)),
        "offerings.delete" => Some(with_conn(state, req, offerings_delete)),
        "timetable.add" => Some(with_conn(state, req, timetable_add)),
        "timetable.list" => Some(with_conn(state, req, timetable_list)),
        "timetable.remove" => Some(with_conn(state, req, timetable_remove)),
        _ => None,
    }
}
