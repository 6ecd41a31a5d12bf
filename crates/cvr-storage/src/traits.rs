use cvr_core::{Incident, IncidentDraft, IncidentId, Status, WorkflowResult};

/// Mutators run inside the store's per-id critical section. They take the
/// current record and return the complete replacement, so a transition is
/// applied whole or not at all; an `Err` leaves the record untouched.
pub type Mutator<'a> = &'a dyn Fn(&Incident) -> WorkflowResult<Incident>;

/// The authoritative incident repository. Owns identity assignment
/// (ids are allocated at `create` and never reused) and serializes
/// concurrent `update` calls per incident id.
pub trait IncidentStore: Send + Sync {
    fn create(&self, draft: IncidentDraft) -> WorkflowResult<Incident>;

    fn get(&self, id: IncidentId) -> WorkflowResult<Incident>;

    /// Apply `mutator` to the incident under its per-id lock. Concurrent
    /// updates on the same id serialize; different ids proceed in
    /// parallel. Returns the updated record.
    fn update(&self, id: IncidentId, mutator: Mutator) -> WorkflowResult<Incident>;

    /// Finite listing in repository (id) order. Every returned record is
    /// a fully applied state; this is a read, not a live stream.
    fn list(&self, status: Option<Status>) -> WorkflowResult<Vec<Incident>>;
}
