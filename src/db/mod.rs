pub mod migrations;
pub mod queries;

use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

/// Opens the sheet grid database and brings its schema up to date.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open sheet database at {path}"))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        .context("failed to set sheet database pragmas")?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("failed to set sheet database busy timeout")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}
