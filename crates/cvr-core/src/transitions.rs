//! Pure transition functions over `IncidentState`.
//!
//! The imperative shell (cvr-engine) runs these inside the repository's
//! per-id critical section; each function either produces the complete
//! next state or a `Conflict`/`InvalidInput`, so a transition can never
//! half-apply.

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::WorkerId;
use crate::incident::IncidentState;
use crate::model::{Decision, EvidenceRef};

impl IncidentState {
    /// pending+unassigned -> pending+assigned. Never overwrites an
    /// existing assignee; a second assign is a `Conflict`.
    pub fn assign(&self, worker: WorkerId) -> WorkflowResult<Self> {
        match self {
            Self::Open => Ok(Self::Assigned { worker }),
            Self::Assigned { worker: current } => Err(WorkflowError::conflict(format!(
                "already assigned to {current}"
            ))),
            Self::Completed { .. } => Err(WorkflowError::conflict("awaiting verification")),
            Self::Verified { .. } => Err(WorkflowError::conflict("already verified")),
        }
    }

    /// pending+assigned -> completed. Only the recorded assignee may
    /// complete, and a resolved evidence reference is required.
    pub fn complete(&self, caller: &WorkerId, resolved: EvidenceRef) -> WorkflowResult<Self> {
        if resolved.as_str().is_empty() {
            return Err(WorkflowError::invalid("resolved evidence reference is empty"));
        }
        match self {
            Self::Assigned { worker } if worker == caller => Ok(Self::Completed {
                worker: worker.clone(),
                resolved,
            }),
            Self::Assigned { worker } => Err(WorkflowError::conflict(format!(
                "assigned to {worker}, not {caller}"
            ))),
            Self::Open => Err(WorkflowError::conflict("not assigned to any worker")),
            Self::Completed { .. } => Err(WorkflowError::conflict("already completed")),
            Self::Verified { .. } => Err(WorkflowError::conflict("already verified")),
        }
    }

    /// completed -> verified (terminal) on approve, or back to the
    /// unassigned pool on reject. Reject is a full reopen: assignee,
    /// resolved evidence, and any note are all dropped together.
    pub fn verify(&self, decision: Decision, note: Option<String>) -> WorkflowResult<Self> {
        match self {
            Self::Completed { worker, resolved } => Ok(match decision {
                Decision::Approve => Self::Verified {
                    worker: worker.clone(),
                    resolved: resolved.clone(),
                    note,
                },
                Decision::Reject => Self::Open,
            }),
            Self::Open | Self::Assigned { .. } => {
                Err(WorkflowError::conflict("no completion to verify"))
            }
            Self::Verified { .. } => Err(WorkflowError::conflict("already verified")),
        }
    }
}
