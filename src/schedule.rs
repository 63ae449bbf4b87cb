use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::collections::HashSet;

/// Lowercase symbolic token used in storage and on the wire.
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// A recurring timetable row, owned by the course catalog.
#[derive(Debug, Clone)]
pub struct RegularSession {
    pub offering_id: String,
    pub weekday: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
    pub course_code: String,
    pub course_name: String,
    pub section: Option<String>,
}

/// A one-off deviation from the weekly timetable. The ledger only hands the
/// reconciler rows whose status is active.
#[derive(Debug, Clone)]
pub struct RescheduleException {
    pub offering_id: String,
    pub original_date: Option<NaiveDate>,
    pub new_date: Option<NaiveDate>,
    pub new_start_time: Option<String>,
    pub new_end_time: Option<String>,
    pub room: Option<String>,
}

/// Catalog metadata for an offering, used when a moved-in session has no
/// regular row on the target weekday to copy display fields from.
#[derive(Debug, Clone)]
pub struct OfferingMeta {
    pub course_code: String,
    pub course_name: String,
    pub section: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Regular,
    Rescheduled,
}

/// One row of the reconciled day view. Computed fresh per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSession {
    pub offering_id: String,
    pub course_code: String,
    pub course_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub kind: SessionKind,
}

pub trait CourseCatalog {
    fn sessions_on(&self, teacher_id: &str, weekday: Weekday)
        -> anyhow::Result<Vec<RegularSession>>;
    fn offering_meta(
        &self,
        teacher_id: &str,
        offering_id: &str,
    ) -> anyhow::Result<Option<OfferingMeta>>;
}

pub trait RescheduleLedger {
    fn active_exceptions_touching(
        &self,
        teacher_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<RescheduleException>>;
}

/// Times are compared as strings; pad bare HH:MM to HH:MM:SS so mixed
/// precisions order correctly.
fn normalize_time(t: &str) -> String {
    let t = t.trim();
    if t.len() == 5 {
        format!("{}:00", t)
    } else {
        t.to_string()
    }
}

/// Produce the ordered list of sessions for `teacher_id` on `date`:
/// the weekday's regular rows, minus slots suppressed by an active exception
/// whose original date is `date`, plus moved-in entries for exceptions whose
/// new date is `date`. A same-day time change suppresses the regular slot and
/// reinserts exactly one rescheduled entry, so each `(date, offeringId)` pair
/// yields at most one output row.
pub fn reconcile(
    catalog: &dyn CourseCatalog,
    ledger: &dyn RescheduleLedger,
    teacher_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<ResolvedSession>> {
    let regulars = catalog.sessions_on(teacher_id, date.weekday())?;
    let exceptions = ledger.active_exceptions_touching(teacher_id, date)?;

    let suppressed: HashSet<&str> = exceptions
        .iter()
        .filter(|x| x.original_date == Some(date))
        .map(|x| x.offering_id.as_str())
        .collect();

    // Moved-in entries first; the final sort is stable, so on a start-time
    // tie they stay ahead of regular rows.
    let mut out: Vec<ResolvedSession> = Vec::new();
    for x in &exceptions {
        if x.new_date != Some(date) {
            continue;
        }
        let same_day = regulars.iter().find(|r| r.offering_id == x.offering_id);
        let meta = match same_day {
            Some(r) => Some(OfferingMeta {
                course_code: r.course_code.clone(),
                course_name: r.course_name.clone(),
                section: r.section.clone(),
                room: r.room.clone(),
            }),
            None => catalog.offering_meta(teacher_id, &x.offering_id)?,
        };
        // No catalog trace of the offering at all: nothing to display, drop it.
        let Some(meta) = meta else {
            continue;
        };
        let start_time = x
            .new_start_time
            .clone()
            .or_else(|| same_day.map(|r| r.start_time.clone()))
            .unwrap_or_default();
        let end_time = x
            .new_end_time
            .clone()
            .or_else(|| same_day.map(|r| r.end_time.clone()))
            .unwrap_or_default();
        out.push(ResolvedSession {
            offering_id: x.offering_id.clone(),
            course_code: meta.course_code,
            course_name: meta.course_name,
            section: meta.section,
            room: x.room.clone().or(meta.room),
            start_time,
            end_time,
            kind: SessionKind::Rescheduled,
        });
    }

    for r in &regulars {
        if suppressed.contains(r.offering_id.as_str()) {
            continue;
        }
        out.push(ResolvedSession {
            offering_id: r.offering_id.clone(),
            course_code: r.course_code.clone(),
            course_name: r.course_name.clone(),
            section: r.section.clone(),
            room: r.room.clone(),
            start_time: r.start_time.clone(),
            end_time: r.end_time.clone(),
            kind: SessionKind::Regular,
        });
    }

    out.sort_by(|a, b| normalize_time(&a.start_time).cmp(&normalize_time(&b.start_time)));
    Ok(out)
}

/// A session is live when `now` falls on the reconciled date and its
/// time-of-day lies within the session window, inclusive at both ends.
pub fn is_live(session: &ResolvedSession, date: NaiveDate, now: NaiveDateTime) -> bool {
    if now.date() != date {
        return false;
    }
    let t = now.format("%H:%M:%S").to_string();
    normalize_time(&session.start_time) <= t && t <= normalize_time(&session.end_time)
}
