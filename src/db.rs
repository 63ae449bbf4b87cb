use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("academix.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS offerings(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            section TEXT,
            room TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_offerings_teacher ON offerings(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS regular_sessions(
            id TEXT PRIMARY KEY,
            offering_id TEXT NOT NULL,
            weekday TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            room TEXT,
            FOREIGN KEY(offering_id) REFERENCES offerings(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regular_sessions_offering
         ON regular_sessions(offering_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regular_sessions_weekday
         ON regular_sessions(weekday)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reschedule_exceptions(
            id TEXT PRIMARY KEY,
            offering_id TEXT NOT NULL,
            original_date TEXT,
            new_date TEXT,
            new_start_time TEXT,
            new_end_time TEXT,
            room TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT,
            FOREIGN KEY(offering_id) REFERENCES offerings(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reschedule_exceptions_offering
         ON reschedule_exceptions(offering_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reschedule_exceptions_original_date
         ON reschedule_exceptions(original_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reschedule_exceptions_new_date
         ON reschedule_exceptions(new_date)",
        [],
    )?;

    Ok(conn)
}
