use crate::schedule::{
    weekday_code, CourseCatalog, OfferingMeta, RegularSession, RescheduleException,
    RescheduleLedger,
};
use chrono::{NaiveDate, Weekday};
use rusqlite::{Connection, OptionalExtension};

/// SQLite-backed course catalog and reschedule ledger, borrowing the open
/// workspace connection.
pub struct Store<'a> {
    pub conn: &'a Connection,
}

impl<'a> Store<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Store { conn }
    }
}

fn parse_date_cell(v: Option<String>) -> Option<NaiveDate> {
    v.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

impl CourseCatalog for Store<'_> {
    fn sessions_on(
        &self,
        teacher_id: &str,
        weekday: Weekday,
    ) -> anyhow::Result<Vec<RegularSession>> {
        // Rows are stored with the normalized lowercase token, so the match
        // happens entirely in SQL; a malformed token is unreachable from any
        // date and simply never shows up.
        let mut stmt = self.conn.prepare(
            "SELECT rs.offering_id,
                    rs.start_time,
                    rs.end_time,
                    COALESCE(rs.room, o.room),
                    o.course_code,
                    o.course_name,
                    o.section
             FROM regular_sessions rs
             JOIN offerings o ON o.id = rs.offering_id
             WHERE o.teacher_id = ? AND rs.weekday = ?
             ORDER BY rs.start_time, o.course_code",
        )?;
        let rows = stmt
            .query_map((teacher_id, weekday_code(weekday)), |row| {
                Ok(RegularSession {
                    offering_id: row.get(0)?,
                    weekday,
                    start_time: row.get(1)?,
                    end_time: row.get(2)?,
                    room: row.get(3)?,
                    course_code: row.get(4)?,
                    course_name: row.get(5)?,
                    section: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn offering_meta(
        &self,
        teacher_id: &str,
        offering_id: &str,
    ) -> anyhow::Result<Option<OfferingMeta>> {
        let meta = self
            .conn
            .query_row(
                "SELECT course_code, course_name, section, room
                 FROM offerings
                 WHERE id = ? AND teacher_id = ?",
                (offering_id, teacher_id),
                |row| {
                    Ok(OfferingMeta {
                        course_code: row.get(0)?,
                        course_name: row.get(1)?,
                        section: row.get(2)?,
                        room: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }
}

impl RescheduleLedger for Store<'_> {
    fn active_exceptions_touching(
        &self,
        teacher_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<RescheduleException>> {
        let date_s = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT x.offering_id,
                    x.original_date,
                    x.new_date,
                    x.new_start_time,
                    x.new_end_time,
                    x.room
             FROM reschedule_exceptions x
             JOIN offerings o ON o.id = x.offering_id
             WHERE o.teacher_id = ?1
               AND x.status = 'active'
               AND (x.original_date = ?2 OR x.new_date = ?2)
             ORDER BY x.created_at, x.id",
        )?;
        let rows = stmt
            .query_map((teacher_id, &date_s), |row| {
                let original_date: Option<String> = row.get(1)?;
                let new_date: Option<String> = row.get(2)?;
                Ok(RescheduleException {
                    offering_id: row.get(0)?,
                    original_date: parse_date_cell(original_date),
                    new_date: parse_date_cell(new_date),
                    new_start_time: row.get(3)?,
                    new_end_time: row.get(4)?,
                    room: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
