//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when the database is
//! opened. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Version recorded in the database, 0 for a fresh one.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get::<_, i32>(0))
        .unwrap_or_else(|e| {
            if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                tracing::warn!(error = %e, "failed to read schema_version");
            }
            0
        })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: directory, demand, team, cells, unavailability.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS people (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name      TEXT NOT NULL,
            role_code      TEXT NOT NULL,
            email          TEXT,
            daily_capacity REAL,
            active         INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS initiatives (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            methodology TEXT NOT NULL,
            start_date  TEXT NOT NULL,
            end_date    TEXT NOT NULL,
            CHECK (start_date <= end_date)
        );

        CREATE TABLE IF NOT EXISTS role_demand (
            initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
            role          TEXT NOT NULL,
            planned_hours REAL NOT NULL CHECK (planned_hours >= 0),
            PRIMARY KEY (initiative_id, role)
        );

        CREATE TABLE IF NOT EXISTS initiative_people (
            initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
            person_id     INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            PRIMARY KEY (initiative_id, person_id)
        );

        CREATE TABLE IF NOT EXISTS daily_allocations (
            initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
            person_id     INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            date          TEXT NOT NULL,
            hours         REAL NOT NULL CHECK (hours >= 0 AND hours <= 24),
            PRIMARY KEY (initiative_id, person_id, date)
        );

        CREATE TABLE IF NOT EXISTS unavailability (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id  INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            start_date TEXT NOT NULL,
            end_date   TEXT NOT NULL,
            reason     TEXT,
            CHECK (start_date <= end_date)
        );

        CREATE INDEX IF NOT EXISTS idx_daily_allocations_person_date ON daily_allocations(person_id, date);
        CREATE INDEX IF NOT EXISTS idx_unavailability_person ON unavailability(person_id, start_date);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: weekly capacity and the allocation audit trail.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE people ADD COLUMN weekly_capacity_hours REAL;

        CREATE TABLE IF NOT EXISTS allocation_audit (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id        TEXT NOT NULL,
            kind          TEXT NOT NULL,
            initiative_id INTEGER NOT NULL,
            person_id     INTEGER NOT NULL,
            date          TEXT NOT NULL,
            before_hours  REAL NOT NULL,
            after_hours   REAL NOT NULL,
            recorded_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_allocation_audit_initiative ON allocation_audit(initiative_id, date);
        CREATE INDEX IF NOT EXISTS idx_allocation_audit_run ON allocation_audit(run_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
