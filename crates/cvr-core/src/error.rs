use thiserror::Error;

use crate::ids::IncidentId;

/// Workflow error taxonomy. Every operation either fully applies its
/// transition or returns one of these; nothing is silently dropped.
///
/// `InvalidInput` and `Conflict` are never retried automatically.
/// `DependencyUnavailable` is safe to retry: dependency calls happen
/// before any incident mutation, so no partial state is left behind.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("incident {0} not found")]
    NotFound(IncidentId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl WorkflowError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn dependency(err: impl std::fmt::Display) -> Self {
        Self::DependencyUnavailable(err.to_string())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
