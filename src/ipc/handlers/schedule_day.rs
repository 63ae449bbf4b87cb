use crate::catalog::Store;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, weekday_code};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::json;

fn handle_schedule_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match req.params.get("teacherId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing teacherId", None),
    };
    let date_raw = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing date", None),
    };
    let Ok(date) = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d") else {
        return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
    };

    // Presentation passes its own clock for testability; default to ours.
    let now = match req.params.get("now").and_then(|v| v.as_str()) {
        Some(raw) => match NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S") {
            Ok(v) => v,
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "now must be YYYY-MM-DDTHH:MM:SS",
                    None,
                )
            }
        },
        None => chrono::Local::now().naive_local(),
    };

    let store = Store::new(conn);
    let sessions = match schedule::reconcile(&store, &store, &teacher_id, date) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows: Vec<serde_json::Value> = sessions
        .iter()
        .map(|s| {
            let mut v = serde_json::to_value(s).unwrap_or_else(|_| json!({}));
            v["live"] = json!(schedule::is_live(s, date, now));
            v
        })
        .collect();

    ok(
        &req.id,
        json!({
            "date": date_raw,
            "weekday": weekday_code(date.weekday()),
            "sessions": rows
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.day" => Some(handle_schedule_day(state, req)),
        _ => None,
    }
}
