use cvr_core::{Decision, Incident, IncidentId, Status, WorkflowError, WorkflowResult};
use tracing::info;

use crate::engine::Engine;

/// The terminal human check on a worker's completion proof. Approve
/// makes the incident `verified` (no further transitions); reject
/// returns it to the unassigned pool for redispatch.
pub struct VerificationGate<'a> {
    engine: &'a Engine,
}

impl<'a> VerificationGate<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn review(
        &self,
        id: IncidentId,
        decision: Decision,
        note: Option<String>,
    ) -> WorkflowResult<Incident> {
        let incident = self.engine.get(id)?;
        if incident.status() != Status::Completed {
            return Err(WorkflowError::conflict(format!(
                "incident {id} is {} and cannot be reviewed",
                incident.status().as_str()
            )));
        }
        // `Completed` carries the resolved reference structurally; the
        // original is set at creation, so both proof images are present.
        let updated = self.engine.verify(id, decision, note)?;
        info!(id = %id, decision = ?decision, "review recorded");
        Ok(updated)
    }

    /// Incidents awaiting review.
    pub fn queue(&self) -> WorkflowResult<Vec<Incident>> {
        self.engine.list(Some(Status::Completed))
    }
}
