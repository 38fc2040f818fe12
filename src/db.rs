// ==========================================
// VitalVida Sync Pipeline - SQLite connection setup
// ==========================================
// Goals:
// - every Connection::open goes through the same PRAGMA setup
//   (foreign keys are per-connection in SQLite)
// - one busy_timeout for all connections so concurrent workers
//   do not trip over SQLITE_BUSY
// - one timestamp format for every TEXT time column
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version this build expects (see `migrations/v0.1_schema.sql`)
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Storage format for all timestamp columns.
///
/// Lexicographic order equals chronological order, which the queue relies on
/// for `available_at <= ?` comparisons.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA_V1: &str = include_str!("../migrations/v0.1_schema.sql");

/// Apply the shared PRAGMAs to a connection
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the shared configuration
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Open an in-memory database with the full schema applied (tests, dry runs)
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    apply_migrations(&conn)?;
    Ok(conn)
}

/// Create all tables if missing and record the schema version.
///
/// Idempotent: every statement is `IF NOT EXISTS` / `OR IGNORE`.
pub fn apply_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let before = read_schema_version(conn)?;
    conn.execute_batch(SCHEMA_V1)?;

    match before {
        None => tracing::info!(version = CURRENT_SCHEMA_VERSION, "schema created"),
        Some(v) if v < CURRENT_SCHEMA_VERSION => {
            tracing::info!(from = v, to = CURRENT_SCHEMA_VERSION, "schema upgraded")
        }
        Some(v) if v > CURRENT_SCHEMA_VERSION => tracing::warn!(
            db_version = v,
            expected = CURRENT_SCHEMA_VERSION,
            "database schema is newer than this build"
        ),
        Some(_) => {}
    }
    Ok(())
}

/// Read schema_version (None if the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Format a timestamp for storage
pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp, surfacing bad values as a column conversion error
pub fn parse_ts(raw: &str, col: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an optional stored timestamp
pub fn parse_opt_ts(raw: Option<String>, col: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(&s, col)).transpose()
}

/// Decode a stored enum code, surfacing unknown codes as a column conversion error
pub fn parse_code<T>(
    raw: &str,
    col: usize,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("unknown code '{}'", raw).into(),
        )
    })
}

/// Decode an optional JSON text column
pub fn parse_opt_json(raw: Option<String>, col: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// Current UTC time truncated to whole seconds (matches the storage precision)
pub fn now_ts() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    NaiveDateTime::parse_from_str(&fmt_ts(&now), TS_FORMAT).unwrap_or(now)
}
