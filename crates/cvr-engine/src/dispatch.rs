use cvr_core::{Incident, IncidentId, Status, WorkerId, WorkflowError, WorkflowResult};
use tracing::info;

use crate::engine::Engine;

/// Routes pending incidents to workers. Worker selection is the
/// operator's call; the dispatcher only enforces that the incident is
/// still in the unassigned-pending pool, then hands off to the engine,
/// whose transition is the authoritative check under the per-id lock.
pub struct Dispatcher<'a> {
    engine: &'a Engine,
}

impl<'a> Dispatcher<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn dispatch(&self, id: IncidentId, worker: WorkerId) -> WorkflowResult<Incident> {
        let incident = self.engine.get(id)?;
        if incident.status() != Status::Pending || incident.assignee().is_some() {
            return Err(WorkflowError::conflict(format!(
                "incident {id} is not in the unassigned pool"
            )));
        }
        let updated = self.engine.assign(id, worker.clone())?;
        info!(id = %id, worker = %worker, "dispatched");
        Ok(updated)
    }

    /// The set the dispatch form offers: pending and unassigned.
    pub fn unassigned_pool(&self) -> WorkflowResult<Vec<Incident>> {
        let pending = self.engine.list(Some(Status::Pending))?;
        Ok(pending
            .into_iter()
            .filter(|i| i.assignee().is_none())
            .collect())
    }
}
