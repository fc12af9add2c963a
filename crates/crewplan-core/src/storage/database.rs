//! SQLite-backed allocation store.
//!
//! Provides persistent storage for:
//! - the people directory and initiatives
//! - role demand and team membership
//! - daily allocation cells and unavailability windows
//! - the allocation audit trail
//!
//! Also the reference [`AllocationStore`] used by the CLI.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{AllocationError, CoreError, DatabaseError, Result};
use crate::model::{
    check_cell_hours, AllocationCell, AuditEntry, AuditKind, CellWrite, Initiative, InitiativeId,
    Methodology, Person, PersonId, RoleCode, RoleDemand, Snapshot, UnavailabilityWindow,
};
use crate::service::AllocationStore;

/// SQLite database holding the directory, cells, and audit rows.
pub struct AllocationDb {
    conn: Connection,
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| conversion_error(idx, format!("bad date '{raw}': {e}")))
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        full_name: row.get(1)?,
        role_code: row.get(2)?,
        email: row.get(3)?,
        daily_capacity: row.get(4)?,
        weekly_capacity_hours: row.get(5)?,
        active: row.get(6)?,
    })
}

fn initiative_from_row(row: &Row<'_>) -> rusqlite::Result<Initiative> {
    let raw: String = row.get(2)?;
    let methodology = Methodology::parse(&raw)
        .ok_or_else(|| conversion_error(2, format!("unknown methodology '{raw}'")))?;
    Ok(Initiative {
        id: row.get(0)?,
        name: row.get(1)?,
        methodology,
        start_date: date_at(row, 3)?,
        end_date: date_at(row, 4)?,
    })
}

fn cell_from_row(row: &Row<'_>) -> rusqlite::Result<AllocationCell> {
    Ok(AllocationCell {
        initiative_id: row.get(0)?,
        person_id: row.get(1)?,
        date: date_at(row, 2)?,
        hours: row.get(3)?,
    })
}

fn window_from_row(row: &Row<'_>) -> rusqlite::Result<UnavailabilityWindow> {
    Ok(UnavailabilityWindow {
        id: row.get(0)?,
        person_id: row.get(1)?,
        start_date: date_at(row, 2)?,
        end_date: date_at(row, 3)?,
        reason: row.get(4)?,
    })
}

const PERSON_COLUMNS: &str =
    "id, full_name, role_code, email, daily_capacity, weekly_capacity_hours, active";
const CELL_COLUMNS: &str = "initiative_id, person_id, date, hours";

impl AllocationDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/crewplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("crewplan.db"))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, committing on success and rolling
    /// back on error.
    fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result = f(&self.conn).and_then(|value| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(value)
        });
        if result.is_err() {
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
        result.map_err(Into::into)
    }

    // People

    /// Insert a directory entry. `person.id` is ignored; the stored record
    /// with its new id is returned.
    pub fn add_person(&self, person: &Person) -> Result<Person> {
        if let Some(cap) = person.daily_capacity {
            check_cell_hours("daily_capacity", cap)?;
        }
        self.conn.execute(
            "INSERT INTO people (full_name, role_code, email, daily_capacity, weekly_capacity_hours, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                person.full_name,
                person.role_code,
                person.email,
                person.daily_capacity,
                person.weekly_capacity_hours,
                person.active,
            ],
        )?;
        Ok(Person {
            id: self.conn.last_insert_rowid(),
            ..person.clone()
        })
    }

    pub fn get_person(&self, id: PersonId) -> Result<Person> {
        self.conn
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1"),
                params![id],
                person_from_row,
            )
            .optional()?
            .ok_or_else(|| DatabaseError::NotFound { entity: "person", id }.into())
    }

    pub fn list_people(&self) -> Result<Vec<Person>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PERSON_COLUMNS} FROM people ORDER BY full_name, id"))?;
        let rows = stmt.query_map([], person_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_person_active(&self, id: PersonId, active: bool) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE people SET active = ?1 WHERE id = ?2", params![active, id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "person", id }.into());
        }
        Ok(())
    }

    // Initiatives

    /// Insert an initiative. `initiative.id` is ignored.
    pub fn create_initiative(&self, initiative: &Initiative) -> Result<Initiative> {
        initiative.validate()?;
        self.conn.execute(
            "INSERT INTO initiatives (name, methodology, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                initiative.name,
                initiative.methodology.as_str(),
                initiative.start_date.to_string(),
                initiative.end_date.to_string(),
            ],
        )?;
        Ok(Initiative {
            id: self.conn.last_insert_rowid(),
            ..initiative.clone()
        })
    }

    /// Fails with `MissingInitiative` when absent.
    pub fn get_initiative(&self, id: InitiativeId) -> Result<Initiative> {
        self.conn
            .query_row(
                "SELECT id, name, methodology, start_date, end_date FROM initiatives WHERE id = ?1",
                params![id],
                initiative_from_row,
            )
            .optional()?
            .ok_or_else(|| AllocationError::MissingInitiative(id).into())
    }

    pub fn list_initiatives(&self) -> Result<Vec<Initiative>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, methodology, start_date, end_date FROM initiatives
             ORDER BY start_date, id",
        )?;
        let rows = stmt.query_map([], initiative_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Role demand

    /// Upsert the demand of one role.
    pub fn set_role_demand(&self, initiative_id: InitiativeId, role: RoleCode, planned_hours: f64) -> Result<()> {
        if planned_hours < 0.0 || !planned_hours.is_finite() {
            return Err(AllocationError::NegativeInput {
                field: format!("role_demand.{role}"),
                value: planned_hours,
            }
            .into());
        }
        self.get_initiative(initiative_id)?;
        self.conn.execute(
            "INSERT INTO role_demand (initiative_id, role, planned_hours) VALUES (?1, ?2, ?3)
             ON CONFLICT(initiative_id, role) DO UPDATE SET planned_hours = excluded.planned_hours",
            params![initiative_id, role.as_str(), planned_hours],
        )?;
        Ok(())
    }

    pub fn role_demand(&self, initiative_id: InitiativeId) -> Result<Vec<RoleDemand>> {
        self.query_role_demand(Some(initiative_id))
    }

    /// Demand rows of every initiative.
    pub fn all_role_demand(&self) -> Result<Vec<RoleDemand>> {
        self.query_role_demand(None)
    }

    fn query_role_demand(&self, initiative_id: Option<InitiativeId>) -> Result<Vec<RoleDemand>> {
        let mut stmt = self.conn.prepare(
            "SELECT initiative_id, role, planned_hours FROM role_demand
             WHERE ?1 IS NULL OR initiative_id = ?1
             ORDER BY initiative_id, role",
        )?;
        let rows = stmt.query_map(params![initiative_id], |row| {
            let raw: String = row.get(1)?;
            let role = RoleCode::parse(&raw)
                .ok_or_else(|| conversion_error(1, format!("unknown role '{raw}'")))?;
            Ok(RoleDemand {
                initiative_id: row.get(0)?,
                role,
                planned_hours: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Team

    /// Replace the team of `initiative_id` in one transaction.
    pub fn set_team(&self, initiative_id: InitiativeId, person_ids: &[PersonId]) -> Result<()> {
        self.get_initiative(initiative_id)?;
        for &id in person_ids {
            self.get_person(id)?;
        }
        let unique: BTreeSet<PersonId> = person_ids.iter().copied().collect();
        self.in_transaction(|conn| {
            conn.execute(
                "DELETE FROM initiative_people WHERE initiative_id = ?1",
                params![initiative_id],
            )?;
            for id in &unique {
                conn.execute(
                    "INSERT INTO initiative_people (initiative_id, person_id) VALUES (?1, ?2)",
                    params![initiative_id, id],
                )?;
            }
            Ok(())
        })?;
        tracing::debug!(initiative_id, members = unique.len(), "team replaced");
        Ok(())
    }

    pub fn team(&self, initiative_id: InitiativeId) -> Result<Vec<PersonId>> {
        let mut stmt = self.conn.prepare(
            "SELECT person_id FROM initiative_people WHERE initiative_id = ?1 ORDER BY person_id",
        )?;
        let rows = stmt.query_map(params![initiative_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Unavailability

    /// Register an absence. `window.id` is ignored.
    pub fn add_unavailability(&self, window: &UnavailabilityWindow) -> Result<UnavailabilityWindow> {
        if window.start_date > window.end_date {
            return Err(AllocationError::InvalidRange {
                start: window.start_date,
                end: window.end_date,
            }
            .into());
        }
        self.get_person(window.person_id)?;
        self.conn.execute(
            "INSERT INTO unavailability (person_id, start_date, end_date, reason)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                window.person_id,
                window.start_date.to_string(),
                window.end_date.to_string(),
                window.reason,
            ],
        )?;
        Ok(UnavailabilityWindow {
            id: self.conn.last_insert_rowid(),
            ..window.clone()
        })
    }

    /// Windows of `person_id`, or of everyone.
    pub fn unavailability(&self, person_id: Option<PersonId>) -> Result<Vec<UnavailabilityWindow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_id, start_date, end_date, reason FROM unavailability
             WHERE ?1 IS NULL OR person_id = ?1
             ORDER BY person_id, start_date, id",
        )?;
        let rows = stmt.query_map(params![person_id], window_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn unavailability_overlapping(
        &self,
        person_id: PersonId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UnavailabilityWindow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_id, start_date, end_date, reason FROM unavailability
             WHERE person_id = ?1 AND start_date <= ?3 AND end_date >= ?2
             ORDER BY start_date, id",
        )?;
        let rows = stmt.query_map(
            params![person_id, start.to_string(), end.to_string()],
            window_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Cells

    /// Manual edit of one cell (upsert).
    pub fn set_cell(&self, cell: &AllocationCell) -> Result<()> {
        check_cell_hours("hours", cell.hours)?;
        self.get_initiative(cell.initiative_id)?;
        self.get_person(cell.person_id)?;
        upsert_cell(
            &self.conn,
            &CellWrite {
                initiative_id: cell.initiative_id,
                person_id: cell.person_id,
                date: cell.date,
                hours: cell.hours,
            },
        )?;
        Ok(())
    }

    /// Cells filtered by initiative and/or person, ordered by date.
    pub fn cells(&self, initiative_id: Option<InitiativeId>, person_id: Option<PersonId>) -> Result<Vec<AllocationCell>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CELL_COLUMNS} FROM daily_allocations
             WHERE (?1 IS NULL OR initiative_id = ?1) AND (?2 IS NULL OR person_id = ?2)
             ORDER BY date, person_id, initiative_id"
        ))?;
        let rows = stmt.query_map(params![initiative_id, person_id], cell_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every cell dated within `start..=end`.
    pub fn cells_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AllocationCell>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CELL_COLUMNS} FROM daily_allocations
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date, person_id, initiative_id"
        ))?;
        let rows = stmt.query_map(params![start.to_string(), end.to_string()], cell_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn person_cells_between(
        &self,
        person_id: PersonId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AllocationCell>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CELL_COLUMNS} FROM daily_allocations
             WHERE person_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, initiative_id"
        ))?;
        let rows = stmt.query_map(
            params![person_id, start.to_string(), end.to_string()],
            cell_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Audit

    /// Audit rows of an initiative, oldest first.
    pub fn audit(&self, initiative_id: InitiativeId) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, kind, initiative_id, person_id, date, before_hours, after_hours, recorded_at
             FROM allocation_audit WHERE initiative_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![initiative_id], |row| {
            let kind_raw: String = row.get(1)?;
            let kind = AuditKind::parse(&kind_raw)
                .ok_or_else(|| conversion_error(1, format!("unknown audit kind '{kind_raw}'")))?;
            let recorded_raw: String = row.get(7)?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_raw)
                .map_err(|e| conversion_error(7, format!("bad timestamp '{recorded_raw}': {e}")))?
                .with_timezone(&Utc);
            Ok(AuditEntry {
                run_id: row.get(0)?,
                kind,
                initiative_id: row.get(2)?,
                person_id: row.get(3)?,
                date: date_at(row, 4)?,
                before_hours: row.get(5)?,
                after_hours: row.get(6)?,
                recorded_at,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn upsert_cell(conn: &Connection, write: &CellWrite) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO daily_allocations (initiative_id, person_id, date, hours) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(initiative_id, person_id, date) DO UPDATE SET hours = excluded.hours",
        params![write.initiative_id, write.person_id, write.date.to_string(), write.hours],
    )
}

impl AllocationStore for AllocationDb {
    fn load_snapshot(&self, initiative_id: InitiativeId, extra_people: &[PersonId]) -> Result<Snapshot> {
        let initiative = self.get_initiative(initiative_id)?;
        let team = self.team(initiative_id)?;
        let role_demand = self.role_demand(initiative_id)?;

        let in_scope: BTreeSet<PersonId> = team.iter().chain(extra_people).copied().collect();
        let mut people = Vec::with_capacity(in_scope.len());
        let mut cells = Vec::new();
        let mut unavailability = Vec::new();
        for &id in &in_scope {
            // Unknown ids are left out; the planner reports them.
            match self.get_person(id) {
                Ok(person) => people.push(person),
                Err(CoreError::Database(DatabaseError::NotFound { .. })) => continue,
                Err(err) => return Err(err),
            }
            cells.extend(self.person_cells_between(id, initiative.start_date, initiative.end_date)?);
            unavailability.extend(self.unavailability_overlapping(
                id,
                initiative.start_date,
                initiative.end_date,
            )?);
        }

        Ok(Snapshot {
            initiative,
            role_demand,
            team,
            people,
            cells,
            unavailability,
        })
    }

    fn commit(&self, writes: &[CellWrite], audit: &[AuditEntry]) -> Result<()> {
        for write in writes {
            check_cell_hours("hours", write.hours)?;
        }
        self.in_transaction(|conn| {
            for write in writes {
                upsert_cell(conn, write)?;
            }
            for entry in audit {
                conn.execute(
                    "INSERT INTO allocation_audit
                     (run_id, kind, initiative_id, person_id, date, before_hours, after_hours, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        entry.run_id,
                        entry.kind.as_str(),
                        entry.initiative_id,
                        entry.person_id,
                        entry.date.to_string(),
                        entry.before_hours,
                        entry.after_hours,
                        entry.recorded_at.to_rfc3339(),
                    ],
                )?;
            }
            Ok(())
        })?;
        tracing::debug!(writes = writes.len(), audit = audit.len(), "allocation writes committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn seeded() -> (AllocationDb, Initiative, Person) {
        let db = AllocationDb::open_memory().unwrap();
        let person = db.add_person(&Person::new(0, "Ada", "DEV")).unwrap();
        let initiative = db
            .create_initiative(&Initiative {
                id: 0,
                name: "Checkout".into(),
                methodology: Methodology::Agile,
                start_date: date(3),
                end_date: date(7),
            })
            .unwrap();
        (db, initiative, person)
    }

    #[test]
    fn people_and_initiatives_round_trip() {
        let (db, initiative, person) = seeded();
        assert_eq!(db.get_person(person.id).unwrap(), person);
        assert_eq!(db.get_initiative(initiative.id).unwrap(), initiative);
        assert_eq!(db.list_people().unwrap().len(), 1);
        assert!(matches!(
            db.get_initiative(99),
            Err(CoreError::Allocation(AllocationError::MissingInitiative(99)))
        ));
        assert!(matches!(
            db.get_person(99),
            Err(CoreError::Database(DatabaseError::NotFound { entity: "person", id: 99 }))
        ));
    }

    #[test]
    fn inverted_initiative_is_rejected() {
        let db = AllocationDb::open_memory().unwrap();
        let result = db.create_initiative(&Initiative {
            id: 0,
            name: "Backwards".into(),
            methodology: Methodology::Hybrid,
            start_date: date(7),
            end_date: date(3),
        });
        assert!(matches!(
            result,
            Err(CoreError::Allocation(AllocationError::InvalidRange { .. }))
        ));
    }

    #[test]
    fn role_demand_upserts() {
        let (db, initiative, _) = seeded();
        db.set_role_demand(initiative.id, RoleCode::Developer, 10.0).unwrap();
        db.set_role_demand(initiative.id, RoleCode::Developer, 12.0).unwrap();
        let demand = db.role_demand(initiative.id).unwrap();
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].planned_hours, 12.0);
        assert!(db.set_role_demand(initiative.id, RoleCode::Tester, -1.0).is_err());
    }

    #[test]
    fn set_team_replaces_membership() {
        let (db, initiative, ada) = seeded();
        let bo = db.add_person(&Person::new(0, "Bo", "TESTER")).unwrap();
        db.set_team(initiative.id, &[ada.id, bo.id, ada.id]).unwrap();
        assert_eq!(db.team(initiative.id).unwrap(), vec![ada.id, bo.id]);
        db.set_team(initiative.id, &[bo.id]).unwrap();
        assert_eq!(db.team(initiative.id).unwrap(), vec![bo.id]);
        assert!(db.set_team(initiative.id, &[bo.id, 404]).is_err());
        assert_eq!(db.team(initiative.id).unwrap(), vec![bo.id]);
    }

    #[test]
    fn cells_upsert_and_filter() {
        let (db, initiative, ada) = seeded();
        db.set_cell(&AllocationCell::new(initiative.id, ada.id, date(3), 2.0)).unwrap();
        db.set_cell(&AllocationCell::new(initiative.id, ada.id, date(3), 3.5)).unwrap();
        db.set_cell(&AllocationCell::new(initiative.id, ada.id, date(4), 1.0)).unwrap();
        let cells = db.cells(Some(initiative.id), None).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].hours, 3.5);
        assert_eq!(db.cells_between(date(4), date(10)).unwrap().len(), 1);
        assert!(db.set_cell(&AllocationCell::new(initiative.id, ada.id, date(5), 25.0)).is_err());
    }

    #[test]
    fn snapshot_covers_team_and_extra_people() {
        let (db, initiative, ada) = seeded();
        let bo = db.add_person(&Person::new(0, "Bo", "TESTER")).unwrap();
        let other = db
            .create_initiative(&Initiative {
                id: 0,
                name: "Other".into(),
                methodology: Methodology::Waterfall,
                start_date: date(1),
                end_date: date(20),
            })
            .unwrap();
        db.set_team(initiative.id, &[ada.id]).unwrap();
        db.set_cell(&AllocationCell::new(other.id, ada.id, date(4), 2.0)).unwrap();
        db.set_cell(&AllocationCell::new(other.id, ada.id, date(12), 2.0)).unwrap();
        db.add_unavailability(&UnavailabilityWindow {
            id: 0,
            person_id: bo.id,
            start_date: date(6),
            end_date: date(9),
            reason: Some("leave".into()),
        })
        .unwrap();

        let snapshot = db.load_snapshot(initiative.id, &[bo.id, 404]).unwrap();
        assert_eq!(snapshot.team, vec![ada.id]);
        assert_eq!(snapshot.people.len(), 2);
        assert_eq!(snapshot.cells.len(), 1);
        assert_eq!(snapshot.unavailability.len(), 1);
    }

    #[test]
    fn commit_writes_cells_and_audit_atomically() {
        let (db, initiative, ada) = seeded();
        let write = CellWrite {
            initiative_id: initiative.id,
            person_id: ada.id,
            date: date(3),
            hours: 4.0,
        };
        let entry = AuditEntry {
            run_id: "run-1".into(),
            kind: AuditKind::AutoAllocate,
            initiative_id: initiative.id,
            person_id: ada.id,
            date: date(3),
            before_hours: 0.0,
            after_hours: 4.0,
            recorded_at: Utc::now(),
        };
        db.commit(&[write.clone()], &[entry]).unwrap();
        assert_eq!(db.cells(Some(initiative.id), Some(ada.id)).unwrap()[0].hours, 4.0);
        let audit = db.audit(initiative.id).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].run_id, "run-1");

        // A cell pointing at a missing person violates the foreign key and
        // rolls back the earlier write in the same batch.
        let bad = CellWrite {
            person_id: 404,
            ..write.clone()
        };
        let update = CellWrite { hours: 1.0, ..write };
        assert!(db.commit(&[update, bad], &[]).is_err());
        assert_eq!(db.cells(Some(initiative.id), Some(ada.id)).unwrap()[0].hours, 4.0);
    }

    #[test]
    fn failed_commit_leaves_no_open_transaction() {
        let (db, _, _) = seeded();
        db.conn()
            .execute_batch(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .unwrap();

        // The deferred foreign key is only checked at COMMIT.
        let result = db.in_transaction(|conn| conn.execute("INSERT INTO child (parent_id) VALUES (99)", []));
        assert!(result.is_err());
        assert!(db.conn().is_autocommit());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM child", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(db.in_transaction(|conn| conn.execute("INSERT INTO parent (id) VALUES (1)", [])).is_ok());
    }
}
