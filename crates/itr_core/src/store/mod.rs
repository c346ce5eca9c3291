use std::collections::BTreeMap;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{now_ts, Clock};
use crate::db;
use crate::domain::{Category, Incident, IncidentDraft, IncidentPatch, Priority, Status};
use crate::error::AppError;
use crate::seed::sample_incidents;

macro_rules! sql_text_enum {
    ($($name:ty),+) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(Priority, Category, Status);

const SELECT_INCIDENT_COLUMNS: &str = r#"
      SELECT
        id, title, description, reporter, priority, category, status,
        assigned_to, created_date, updated_date, resolved_date, resolution_notes
      FROM incidents
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializeSummary {
    /// Number of sample incidents inserted; zero on every run after the first.
    pub seeded: usize,
}

fn incident_from_row(row: &Row<'_>) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        reporter: row.get(3)?,
        priority: row.get(4)?,
        category: row.get(5)?,
        status: row.get(6)?,
        assigned_to: row.get(7)?,
        created_date: row.get(8)?,
        updated_date: row.get(9)?,
        resolved_date: row.get(10)?,
        resolution_notes: row.get(11)?,
    })
}

fn begin_write(conn: &mut Connection) -> Result<rusqlite::Transaction<'_>, AppError> {
    // IMMEDIATE takes the SQLite write lock up front: one writer at a time.
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| {
            AppError::new("DB_TX_FAILED", "Failed to start write transaction")
                .with_details(e.to_string())
        })
}

fn commit(tx: rusqlite::Transaction<'_>) -> Result<(), AppError> {
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit write transaction")
            .with_details(e.to_string())
    })
}

fn require_text(code: &str, field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(code, format!("{field} is required")));
    }
    Ok(())
}

/// Cross-field invariants every persisted row must satisfy.
fn check_invariants(incident: &Incident) -> Result<(), AppError> {
    let resolved = incident.status == Status::Resolved;
    if incident.resolved_date.is_some() != resolved {
        return Err(AppError::validation(
            "VALIDATION_RESOLVED_DATE_MISMATCH",
            "resolved_date must be present exactly when status is Resolved",
        )
        .with_details(format!("id={}; status={}", incident.id, incident.status)));
    }
    if incident.resolution_notes.is_some() && !resolved {
        return Err(AppError::validation(
            "VALIDATION_RESOLUTION_NOTES_MISMATCH",
            "resolution_notes may only be present when status is Resolved",
        )
        .with_details(format!("id={}; status={}", incident.id, incident.status)));
    }
    if let Some(updated) = incident.updated_date.as_deref() {
        if updated < incident.created_date.as_str() {
            return Err(AppError::validation(
                "VALIDATION_UPDATED_BEFORE_CREATED",
                "updated_date must not precede created_date",
            )
            .with_details(format!(
                "created_date={}; updated_date={updated}",
                incident.created_date
            )));
        }
    }
    Ok(())
}

fn insert_row(conn: &Connection, incident: &Incident) -> Result<i64, AppError> {
    conn.execute(
        r#"
      INSERT INTO incidents (
        title, description, reporter, priority, category, status,
        assigned_to, created_date, updated_date, resolved_date, resolution_notes
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
      "#,
        params![
            incident.title,
            incident.description,
            incident.reporter,
            incident.priority,
            incident.category,
            incident.status,
            incident.assigned_to,
            incident.created_date,
            incident.updated_date,
            incident.resolved_date,
            incident.resolution_notes,
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert incident").with_details(e.to_string())
    })?;
    Ok(conn.last_insert_rowid())
}

/// Ensure the schema exists and seed the sample incidents on the first-ever run.
///
/// Safe to call on every process start: seeding only happens while the table is empty.
pub fn initialize(conn: &mut Connection, clock: &dyn Clock) -> Result<InitializeSummary, AppError> {
    db::migrate(conn)?;

    let tx = begin_write(conn)?;
    if count_incidents(&tx)? > 0 {
        return Ok(InitializeSummary { seeded: 0 });
    }

    let now = now_ts(clock)?;
    let samples = sample_incidents(&now);
    for sample in &samples {
        check_invariants(sample)?;
        insert_row(&tx, sample)?;
    }
    commit(tx)?;

    info!(seeded = samples.len(), "seeded sample incidents into empty store");
    Ok(InitializeSummary {
        seeded: samples.len(),
    })
}

/// Insert a new incident in `Open` state, stamped with the clock's current time.
pub fn insert_incident(
    conn: &mut Connection,
    clock: &dyn Clock,
    draft: &IncidentDraft,
) -> Result<i64, AppError> {
    require_text("VALIDATION_TITLE_REQUIRED", "title", &draft.title)?;
    require_text("VALIDATION_REPORTER_REQUIRED", "reporter", &draft.reporter)?;

    let incident = Incident {
        id: 0,
        title: draft.title.clone(),
        description: draft.description.clone(),
        reporter: draft.reporter.clone(),
        priority: draft.priority,
        category: draft.category,
        status: Status::Open,
        assigned_to: None,
        created_date: now_ts(clock)?,
        updated_date: None,
        resolved_date: None,
        resolution_notes: None,
    };

    let tx = begin_write(conn)?;
    let id = insert_row(&tx, &incident)?;
    commit(tx)?;
    Ok(id)
}

pub fn get_incident(conn: &Connection, id: i64) -> Result<Incident, AppError> {
    let sql = format!("{SELECT_INCIDENT_COLUMNS} WHERE id = ?1");
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare incident query")
            .with_details(e.to_string())
    })?;

    stmt.query_row([id], incident_from_row)
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?
        .ok_or_else(|| {
            AppError::not_found("DB_NOT_FOUND", "Incident not found")
                .with_details(format!("id={id}"))
        })
}

/// All incidents, newest first. Ties on `created_date` fall back to id, newest first.
pub fn list_incidents(conn: &Connection) -> Result<Vec<Incident>, AppError> {
    let sql = format!("{SELECT_INCIDENT_COLUMNS} ORDER BY created_date DESC, id DESC");
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare incidents query")
            .with_details(e.to_string())
    })?;

    let rows = stmt.query_map([], incident_from_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query incidents").with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?);
    }

    debug!(count = out.len(), "listed incidents");
    Ok(out)
}

pub fn count_incidents(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count incidents")
                .with_details(e.to_string())
        })
}

/// Per-status row counts. Every status is present, zero when unused.
pub fn count_by_status(conn: &Connection) -> Result<BTreeMap<Status, i64>, AppError> {
    let mut out: BTreeMap<Status, i64> = Status::ALL.iter().map(|s| (*s, 0)).collect();

    let mut stmt = conn
        .prepare("SELECT status, COUNT(*) FROM incidents GROUP BY status")
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare status count query")
                .with_details(e.to_string())
        })?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, Status>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count incidents by status")
                .with_details(e.to_string())
        })?;

    for r in rows {
        let (status, n) = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode status count row")
                .with_details(e.to_string())
        })?;
        out.insert(status, n);
    }
    Ok(out)
}

/// Read-modify-write of one incident on an already-open connection or transaction.
pub(crate) fn apply_patch(
    conn: &Connection,
    id: i64,
    patch: &IncidentPatch,
) -> Result<Incident, AppError> {
    let mut incident = get_incident(conn, id)?;
    patch.apply_to(&mut incident);
    check_invariants(&incident)?;

    conn.execute(
        r#"
      UPDATE incidents
      SET status = ?1, assigned_to = ?2, updated_date = ?3,
          resolved_date = ?4, resolution_notes = ?5
      WHERE id = ?6
      "#,
        params![
            incident.status,
            incident.assigned_to,
            incident.updated_date,
            incident.resolved_date,
            incident.resolution_notes,
            id,
        ],
    )
    .map_err(|e| {
        AppError::new("DB_UPDATE_FAILED", "Failed to update incident")
            .with_details(format!("id={id}: {e}"))
    })?;

    Ok(incident)
}

/// Apply a partial set of field changes all-or-nothing. Returns the updated record.
///
/// An empty patch writes nothing and returns the stored record.
pub fn update_incident(
    conn: &mut Connection,
    id: i64,
    patch: &IncidentPatch,
) -> Result<Incident, AppError> {
    if patch.is_empty() {
        return get_incident(conn, id);
    }
    let tx = begin_write(conn)?;
    let updated = apply_patch(&tx, id, patch)?;
    commit(tx)?;
    Ok(updated)
}

/// Run `f` inside one write transaction; nothing is committed if it fails.
pub(crate) fn with_write_tx<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Connection) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let tx = begin_write(conn)?;
    let out = f(&tx)?;
    commit(tx)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use time::macros::datetime;

    fn store() -> Connection {
        let mut conn = db::open_in_memory().expect("open");
        db::migrate(&mut conn).expect("migrate");
        conn
    }

    fn draft(title: &str) -> IncidentDraft {
        IncidentDraft {
            title: title.to_string(),
            description: None,
            reporter: "Jane Smith".to_string(),
            priority: Priority::Medium,
            category: Category::Hardware,
        }
    }

    #[test]
    fn insert_forces_open_status_and_created_date() {
        let mut conn = store();
        let clock = FixedClock(datetime!(2026-02-01 10:00:00 UTC));
        let id = insert_incident(&mut conn, &clock, &draft("Printer jam")).unwrap();

        let inc = get_incident(&conn, id).unwrap();
        assert_eq!(inc.status, Status::Open);
        assert_eq!(inc.created_date, "2026-02-01T10:00:00Z");
        assert_eq!(inc.updated_date, None);
        assert_eq!(inc.assigned_to, None);
    }

    #[test]
    fn insert_rejects_blank_title() {
        let mut conn = store();
        let clock = FixedClock(datetime!(2026-02-01 10:00:00 UTC));
        let err = insert_incident(&mut conn, &clock, &draft("   ")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(count_incidents(&conn).unwrap(), 0);
    }

    #[test]
    fn update_of_missing_id_is_not_found() {
        let mut conn = store();
        let patch = IncidentPatch {
            assigned_to: Some(Some("Tech Support".to_string())),
            ..IncidentPatch::default()
        };
        let err = update_incident(&mut conn, 42, &patch).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_patch_leaves_row_untouched() {
        let mut conn = store();
        let clock = FixedClock(datetime!(2026-02-01 10:00:00 UTC));
        let id = insert_incident(&mut conn, &clock, &draft("Printer jam")).unwrap();
        let before = get_incident(&conn, id).unwrap();

        let after = update_incident(&mut conn, id, &IncidentPatch::default()).unwrap();
        assert_eq!(after, before);

        let err = update_incident(&mut conn, 42, &IncidentPatch::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn update_violating_invariants_writes_nothing() {
        let mut conn = store();
        let clock = FixedClock(datetime!(2026-02-01 10:00:00 UTC));
        let id = insert_incident(&mut conn, &clock, &draft("VPN flaps")).unwrap();

        // Resolved without a resolved_date must be rejected as a whole.
        let patch = IncidentPatch {
            status: Some(Status::Resolved),
            assigned_to: Some(Some("IT Team".to_string())),
            ..IncidentPatch::default()
        };
        let err = update_incident(&mut conn, id, &patch).unwrap_err();
        assert_eq!(err.code, "VALIDATION_RESOLVED_DATE_MISMATCH");

        let inc = get_incident(&conn, id).unwrap();
        assert_eq!(inc.status, Status::Open);
        assert_eq!(inc.assigned_to, None);
    }

    #[test]
    fn count_by_status_reports_every_status() {
        let mut conn = store();
        let clock = FixedClock(datetime!(2026-02-01 10:00:00 UTC));
        insert_incident(&mut conn, &clock, &draft("a")).unwrap();
        insert_incident(&mut conn, &clock, &draft("b")).unwrap();

        let counts = count_by_status(&conn).unwrap();
        assert_eq!(counts.get(&Status::Open), Some(&2));
        assert_eq!(counts.get(&Status::InProgress), Some(&0));
        assert_eq!(counts.get(&Status::Resolved), Some(&0));
    }
}
