use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
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

fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    let Some(s) = get_optional_str(params, key)? else {
        return Ok(None);
    };
    if NaiveDate::parse_from_str(&s, "%Y-%m-%d").is_err() {
        return Err(HandlerErr::bad_params(format!(
            "{} must be YYYY-MM-DD",
            key
        )));
    }
    Ok(Some(s))
}

fn exceptions_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let offering_id = get_required_str(params, "offeringId")?;
    let original_date = get_optional_date(params, "originalDate")?;
    let new_date = get_optional_date(params, "newDate")?;
    let new_start_time = get_optional_str(params, "newStartTime")?;
    let new_end_time = get_optional_str(params, "newEndTime")?;
    let room = get_optional_str(params, "room")?;

    if original_date.is_none() && new_date.is_none() {
        return Err(HandlerErr::bad_params(
            "at least one of originalDate/newDate is required",
        ));
    }

    let offering_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM offerings WHERE id = ?", [&offering_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(HandlerErr::query)?;
    if offering_exists.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "offering not found".to_string(),
            details: None,
        });
    }

    let exception_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO reschedule_exceptions(
           id,
           offering_id,
           original_date,
           new_date,
           new_start_time,
           new_end_time,
           room,
           status,
           created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, 'active', strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &exception_id,
            &offering_id,
            original_date.as_deref(),
            new_date.as_deref(),
            new_start_time.as_deref(),
            new_end_time.as_deref(),
            room.as_deref(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "reschedule_exceptions" })),
    })?;

    Ok(json!({ "exceptionId": exception_id }))
}

fn exceptions_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let offering_id = get_required_str(params, "offeringId")?;

    let mut stmt = conn
        .prepare(
            "SELECT id, original_date, new_date, new_start_time, new_end_time, room, status
             FROM reschedule_exceptions
             WHERE offering_id = ?
             ORDER BY created_at, id",
        )
        .map_err(HandlerErr::query)?;

    let exceptions = stmt
        .query_map([&offering_id], |row| {
            let id: String = row.get(0)?;
            let original_date: Option<String> = row.get(1)?;
            let new_date: Option<String> = row.get(2)?;
            let new_start_time: Option<String> = row.get(3)?;
            let new_end_time: Option<String> = row.get(4)?;
            let room: Option<String> = row.get(5)?;
            let status: String = row.get(6)?;
            Ok(json!({
                "id": id,
                "originalDate": original_date,
                "newDate": new_date,
                "newStartTime": new_start_time,
                "newEndTime": new_end_time,
                "room": room,
                "status": status
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    Ok(json!({ "exceptions": exceptions }))
}

fn exceptions_set_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exception_id = get_required_str(params, "exceptionId")?;
    let status = get_required_str(params, "status")?;

    if status != "active" && status != "inactive" {
        return Err(HandlerErr::bad_params(
            "status must be 'active' or 'inactive'",
        ));
    }

    let changed = conn
        .execute(
            "UPDATE reschedule_exceptions SET status = ? WHERE id = ?",
            (&status, &exception_id),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "reschedule_exceptions" })),
        })?;
    if changed == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: "exception not found".to_string(),
            details: None,
        });
    }

    Ok(json!({ "ok": true }))
}

fn exceptions_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exception_id = get_required_str(params, "exceptionId")?;

    let changed = conn
        .execute(
            "DELETE FROM reschedule_exceptions WHERE id = ?",
            [&exception_id],
        )
        .map_err(|e| HandlerErr {
            code: "db_delete_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "reschedule_exceptions" })),
        })?;
    if changed == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: "exception not found".to_string(),
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
        "exceptions.create" => Some(with_conn(state, req, exceptions_create)),
        "exceptions.list" => Some(with_conn(state, req, exceptions_list)),
        "exceptions.setStatus" => Some(with_conn(state, req, exceptions_set_status)),
        "exceptions.delete" => Some(with_conn(state, req, exceptions_delete)),
        _ => None,
    }
}
