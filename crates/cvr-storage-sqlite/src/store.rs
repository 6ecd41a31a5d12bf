use std::path::Path;
use std::sync::Mutex;

use cvr_core::{
    EvidenceRef, Incident, IncidentDraft, IncidentId, IncidentState, Location, ReportSource,
    Status, WorkerId, WorkflowError, WorkflowResult,
};
use cvr_storage::{IncidentStore, Mutator};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Durable incident repository over sqlite. `INTEGER PRIMARY KEY
/// AUTOINCREMENT` keeps id allocation append-only across restarts.
///
/// Updates run in a transaction while holding the connection mutex, a
/// strict superset of the per-id critical section the trait requires.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> WorkflowResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).map_err(WorkflowError::dependency)?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql).map_err(WorkflowError::dependency)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn source_to_cols(source: &ReportSource) -> (&'static str, &str) {
        match source {
            ReportSource::Citizen { reporter } => ("citizen", reporter),
            ReportSource::Camera { node } => ("camera", node),
        }
    }

    fn source_from_cols(kind: &str, label: String) -> ReportSource {
        match kind {
            "camera" => ReportSource::Camera { node: label },
            _ => ReportSource::Citizen { reporter: label },
        }
    }
}

/// Flat row image; turned into the tagged `IncidentState` after the read.
struct IncidentRow {
    id: u64,
    category: String,
    lat: f64,
    lng: f64,
    address: String,
    original: String,
    resolved: Option<String>,
    status: String,
    worker: Option<String>,
    note: Option<String>,
    source_kind: String,
    source_label: String,
    created_at: i64,
    updated_at: i64,
}

const COLUMNS: &str = "id, category, lat, lng, address, original, resolved, status, worker, note, source_kind, source_label, created_at, updated_at";

fn read_row(r: &Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok(IncidentRow {
        id: r.get::<_, i64>(0)? as u64,
        category: r.get(1)?,
        lat: r.get(2)?,
        lng: r.get(3)?,
        address: r.get(4)?,
        original: r.get(5)?,
        resolved: r.get(6)?,
        status: r.get(7)?,
        worker: r.get(8)?,
        note: r.get(9)?,
        source_kind: r.get(10)?,
        source_label: r.get(11)?,
        created_at: r.get(12)?,
        updated_at: r.get(13)?,
    })
}

fn row_to_incident(row: IncidentRow) -> WorkflowResult<Incident> {
    let id = IncidentId(row.id);
    let worker = row.worker.map(WorkerId::from_str);
    let resolved = row.resolved.map(EvidenceRef::from_str);
    let state = match (row.status.as_str(), worker, resolved) {
        ("pending", None, _) => IncidentState::Open,
        ("pending", Some(worker), _) => IncidentState::Assigned { worker },
        ("completed", Some(worker), Some(resolved)) => IncidentState::Completed { worker, resolved },
        ("verified", Some(worker), Some(resolved)) => IncidentState::Verified {
            worker,
            resolved,
            note: row.note,
        },
        (status, _, _) => {
            return Err(WorkflowError::dependency(format!(
                "incident {id} row is inconsistent (status={status})"
            )))
        }
    };
    Ok(Incident {
        id,
        category: row.category,
        location: Location {
            lat: row.lat,
            lng: row.lng,
            address: row.address,
        },
        original: EvidenceRef::from_str(row.original),
        state,
        source: SqliteStore::source_from_cols(&row.source_kind, row.source_label),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl IncidentStore for SqliteStore {
    fn create(&self, draft: IncidentDraft) -> WorkflowResult<Incident> {
        let conn = self.conn.lock().unwrap();
        let (kind, label) = Self::source_to_cols(&draft.source);
        conn.execute(
            "INSERT INTO incidents(category, lat, lng, address, original, status, source_kind, source_label, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?8)",
            params![
                draft.category,
                draft.location.lat,
                draft.location.lng,
                draft.location.address,
                draft.original.as_str(),
                kind,
                label,
                draft.created_at,
            ],
        )
        .map_err(WorkflowError::dependency)?;
        let id = conn.last_insert_rowid() as u64;
        Ok(Incident {
            id: IncidentId(id),
            category: draft.category,
            location: draft.location,
            original: draft.original,
            state: IncidentState::Open,
            source: draft.source,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        })
    }

    fn get(&self, id: IncidentId) -> WorkflowResult<Incident> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM incidents WHERE id=?1"),
                params![id.value() as i64],
                read_row,
            )
            .optional()
            .map_err(WorkflowError::dependency)?
            .ok_or(WorkflowError::NotFound(id))?;
        row_to_incident(row)
    }

    fn update(&self, id: IncidentId, mutator: Mutator) -> WorkflowResult<Incident> {
        let conn = self.conn.lock().unwrap();
        let tx = conn
            .unchecked_transaction()
            .map_err(WorkflowError::dependency)?;

        let row = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM incidents WHERE id=?1"),
                params![id.value() as i64],
                read_row,
            )
            .optional()
            .map_err(WorkflowError::dependency)?
            .ok_or(WorkflowError::NotFound(id))?;
        let current = row_to_incident(row)?;

        let next = mutator(&current)?;

        tx.execute(
            "UPDATE incidents SET category=?1, status=?2, worker=?3, resolved=?4, note=?5, updated_at=?6 WHERE id=?7",
            params![
                next.category,
                next.status().as_str(),
                next.assignee().map(|w| w.as_str().to_string()),
                next.state.resolved().map(|r| r.as_str().to_string()),
                next.state.verification_note().map(str::to_string),
                next.updated_at,
                id.value() as i64,
            ],
        )
        .map_err(WorkflowError::dependency)?;
        tx.commit().map_err(WorkflowError::dependency)?;
        Ok(next)
    }

    fn list(&self, status: Option<Status>) -> WorkflowResult<Vec<Incident>> {
        let conn = self.conn.lock().unwrap();
        let mut out = vec![];
        match status {
            Some(status) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {COLUMNS} FROM incidents WHERE status=?1 ORDER BY id"
                    ))
                    .map_err(WorkflowError::dependency)?;
                let rows = stmt
                    .query_map(params![status.as_str()], read_row)
                    .map_err(WorkflowError::dependency)?;
                for row in rows {
                    out.push(row_to_incident(row.map_err(WorkflowError::dependency)?)?);
                }
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!("SELECT {COLUMNS} FROM incidents ORDER BY id"))
                    .map_err(WorkflowError::dependency)?;
                let rows = stmt
                    .query_map([], read_row)
                    .map_err(WorkflowError::dependency)?;
                for row in rows {
                    out.push(row_to_incident(row.map_err(WorkflowError::dependency)?)?);
                }
            }
        }
        Ok(out)
    }
}
