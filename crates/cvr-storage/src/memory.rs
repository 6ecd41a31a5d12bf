use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use cvr_core::{Incident, IncidentDraft, IncidentId, IncidentState, Status, WorkflowError, WorkflowResult};

use crate::traits::{IncidentStore, Mutator};

/// In-memory store. Not durable; used by tests and database-free runs.
///
/// Each record sits behind its own mutex, so transitions on the same
/// incident serialize while unrelated incidents proceed in parallel.
/// The outer `RwLock` only guards the id index.
pub struct MemoryStore {
    records: RwLock<BTreeMap<u64, Arc<Mutex<Incident>>>>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn record(&self, id: IncidentId) -> WorkflowResult<Arc<Mutex<Incident>>> {
        let records = self.records.read().unwrap();
        records
            .get(&id.value())
            .cloned()
            .ok_or(WorkflowError::NotFound(id))
    }
}

impl IncidentStore for MemoryStore {
    fn create(&self, draft: IncidentDraft) -> WorkflowResult<Incident> {
        let id = IncidentId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let incident = Incident {
            id,
            category: draft.category,
            location: draft.location,
            original: draft.original,
            state: IncidentState::Open,
            source: draft.source,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        let mut records = self.records.write().unwrap();
        records.insert(id.value(), Arc::new(Mutex::new(incident.clone())));
        Ok(incident)
    }

    fn get(&self, id: IncidentId) -> WorkflowResult<Incident> {
        let record = self.record(id)?;
        let guard = record.lock().unwrap();
        Ok(guard.clone())
    }

    fn update(&self, id: IncidentId, mutator: Mutator) -> WorkflowResult<Incident> {
        let record = self.record(id)?;
        let mut guard = record.lock().unwrap();
        let next = mutator(&guard)?;
        *guard = next.clone();
        Ok(next)
    }

    fn list(&self, status: Option<Status>) -> WorkflowResult<Vec<Incident>> {
        let records = self.records.read().unwrap();
        let mut out = Vec::with_capacity(records.len());
        for record in records.values() {
            let incident = record.lock().unwrap().clone();
            if status.map_or(true, |want| want == incident.status()) {
                out.push(incident);
            }
        }
        Ok(out)
    }
}
