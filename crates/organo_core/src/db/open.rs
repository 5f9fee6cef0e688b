use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Writers wait this long for a competing `IMMEDIATE` transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) a database file with foreign keys on and the schema
/// migrated.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result: DbResult<Connection> = Connection::open(path.as_ref())
        .map_err(Into::into)
        .and_then(|mut conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            prepare(&mut conn)?;
            Ok(conn)
        });
    log_open("file", started_at, &result);
    result
}

/// In-memory variant of `open_db`, used by tests and dry runs.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    let result: DbResult<Connection> = Connection::open_in_memory()
        .map_err(Into::into)
        .and_then(|mut conn| {
            prepare(&mut conn)?;
            Ok(conn)
        });
    log_open("memory", started_at, &result);
    result
}

fn prepare(conn: &mut Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}

fn log_open(mode: &str, started_at: Instant, result: &DbResult<Connection>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!("event=db_open module=db status=ok mode={mode} duration_ms={duration_ms}"),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={duration_ms} error={err}"
        ),
    }
}
