use std::path::{Path, PathBuf};

use cvr_core::{EvidenceRef, IncidentId, WorkflowError, WorkflowResult};
use uuid::Uuid;

/// Blob store for evidence images. The engine treats the contents as
/// opaque; it only ever stores bytes and checks that a reference
/// resolves. Failures are `DependencyUnavailable` (retryable, since the
/// store is always called before any incident mutation).
pub trait ArtifactStore: Send + Sync {
    /// Store a problem photo, returning its generated reference.
    fn store_original(&self, category: &str, ext: &str, bytes: &[u8]) -> WorkflowResult<EvidenceRef>;

    /// Store a resolution proof for an incident.
    fn store_resolved(&self, id: IncidentId, ext: &str, bytes: &[u8]) -> WorkflowResult<EvidenceRef>;

    /// Whether a caller-supplied reference points at a stored artifact.
    fn exists(&self, evidence: &EvidenceRef) -> bool;
}

#[derive(Clone)]
pub struct FsArtifactStore {
    pub root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn write(&self, filename: &str, bytes: &[u8]) -> WorkflowResult<EvidenceRef> {
        std::fs::create_dir_all(&self.root).map_err(WorkflowError::dependency)?;
        let path = self.root.join(filename);
        std::fs::write(&path, bytes).map_err(WorkflowError::dependency)?;
        Ok(EvidenceRef::from_str(filename))
    }

    /// Lowercased alphanumeric category slug for filenames, e.g.
    /// "Garbage Accumulation" -> "garbage_accumulation".
    fn slug(category: &str) -> String {
        let mut out = String::with_capacity(category.len());
        for c in category.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
        }
        let trimmed = out.trim_end_matches('_');
        if trimmed.is_empty() {
            "report".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn normalize_ext(ext: &str) -> String {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() {
            String::new()
        } else {
            format!(".{ext}")
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn store_original(&self, category: &str, ext: &str, bytes: &[u8]) -> WorkflowResult<EvidenceRef> {
        let filename = format!(
            "{}_{}{}",
            Self::slug(category),
            Uuid::new_v4().simple(),
            Self::normalize_ext(ext)
        );
        self.write(&filename, bytes)
    }

    fn store_resolved(&self, id: IncidentId, ext: &str, bytes: &[u8]) -> WorkflowResult<EvidenceRef> {
        let filename = format!(
            "resolved_{}_{}{}",
            id.value(),
            Uuid::new_v4().simple(),
            Self::normalize_ext(ext)
        );
        self.write(&filename, bytes)
    }

    fn exists(&self, evidence: &EvidenceRef) -> bool {
        // references are bare filenames; anything path-like is rejected
        let name = evidence.as_str();
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return false;
        }
        self.root.join(name).is_file()
    }
}
