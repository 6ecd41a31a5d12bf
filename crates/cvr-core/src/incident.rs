use serde::{Deserialize, Serialize};

use crate::ids::{IncidentId, WorkerId};
use crate::model::{EvidenceRef, Location, ReportSource, Status};

/// Composite lifecycle state. The three-value external `Status` plus the
/// assignee overlay are derived from this, never stored separately, so
/// the resolved-evidence invariant holds by construction: `resolved`
/// exists exactly in the `Completed` and `Verified` variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentState {
    Open,
    Assigned {
        worker: WorkerId,
    },
    Completed {
        worker: WorkerId,
        resolved: EvidenceRef,
    },
    Verified {
        worker: WorkerId,
        resolved: EvidenceRef,
        note: Option<String>,
    },
}

impl IncidentState {
    pub fn status(&self) -> Status {
        match self {
            Self::Open | Self::Assigned { .. } => Status::Pending,
            Self::Completed { .. } => Status::Completed,
            Self::Verified { .. } => Status::Verified,
        }
    }

    pub fn assignee(&self) -> Option<&WorkerId> {
        match self {
            Self::Open => None,
            Self::Assigned { worker }
            | Self::Completed { worker, .. }
            | Self::Verified { worker, .. } => Some(worker),
        }
    }

    pub fn resolved(&self) -> Option<&EvidenceRef> {
        match self {
            Self::Open | Self::Assigned { .. } => None,
            Self::Completed { resolved, .. } | Self::Verified { resolved, .. } => Some(resolved),
        }
    }

    pub fn verification_note(&self) -> Option<&str> {
        match self {
            Self::Verified { note, .. } => note.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Incident {
    pub id: IncidentId,
    pub category: String,
    pub location: Location,
    pub original: EvidenceRef,
    pub state: IncidentState,
    pub source: ReportSource,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Incident {
    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn assignee(&self) -> Option<&WorkerId> {
        self.state.assignee()
    }

    pub fn view(&self) -> IncidentView {
        IncidentView {
            id: self.id.value(),
            category: self.category.clone(),
            status: self.status(),
            location: self.location.clone(),
            images: EvidenceView {
                original: self.original.as_str().to_string(),
                resolved: self.state.resolved().map(|r| r.as_str().to_string()),
            },
            assigned_to: self.assignee().map(|w| w.as_str().to_string()),
            verification_note: self.state.verification_note().map(str::to_string),
            source: self.source.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Everything the repository needs to mint a new incident. The store
/// assigns the id; the caller supplies the clock reading.
#[derive(Clone, Debug)]
pub struct IncidentDraft {
    pub category: String,
    pub location: Location,
    pub original: EvidenceRef,
    pub source: ReportSource,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvidenceView {
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

/// Boundary shape returned to clients: flat status string, nullable
/// assignee, both image references under `images`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IncidentView {
    pub id: u64,
    pub category: String,
    pub status: Status,
    pub location: Location,
    pub images: EvidenceView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_note: Option<String>,
    pub source: ReportSource,
    pub created_at: i64,
    pub updated_at: i64,
}
