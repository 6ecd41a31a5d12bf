use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use cvr_artifacts::{ArtifactStore, FsArtifactStore};
use cvr_core::{
    Decision, EvidenceRef, Incident, IncidentDraft, IncidentId, Location, ReportSource, Status,
    WorkerId, WorkflowError, WorkflowResult,
};
use cvr_storage::IncidentStore;
use cvr_storage_sqlite::SqliteStore;
use tracing::info;

use crate::config::Config;
use crate::util::now_unix;

/// A freshly reported problem, before the repository has seen it.
#[derive(Clone, Debug)]
pub struct NewReport {
    pub category: String,
    pub location: Location,
    pub image: Vec<u8>,
    pub ext: String,
    pub source: ReportSource,
}

/// The workflow engine: the only component that mutates incident
/// records. External dependencies (artifact store) are always called
/// before entering the repository's per-id critical section, so a slow
/// blob store never blocks unrelated incidents.
pub struct Engine {
    pub store: Box<dyn IncidentStore>,
    pub artifacts: Box<dyn ArtifactStore>,
}

impl Engine {
    pub fn new(store: Box<dyn IncidentStore>, artifacts: Box<dyn ArtifactStore>) -> Self {
        Self { store, artifacts }
    }

    /// Open the engine rooted at `data_root`, bootstrapping config and
    /// database on first use.
    pub fn open(data_root: &Path) -> Result<(Self, Config)> {
        let cfg_path = Config::config_path(data_root);
        let cfg = if cfg_path.exists() {
            Config::load_from(&cfg_path)?
        } else {
            let project_id = data_root
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("civic");
            let cfg = Config::default_for_root(project_id);
            cfg.save_to(&cfg_path)?;
            cfg
        };

        let store = SqliteStore::open(&Config::db_path(data_root))?;
        let artifacts = FsArtifactStore::new(cfg.artifact_root(data_root));
        Ok((Self::new(Box::new(store), Box::new(artifacts)), cfg))
    }

    pub fn init_root(data_root: &Path) -> Result<PathBuf> {
        let cfg_path = Config::config_path(data_root);
        if !cfg_path.exists() {
            let project_id = data_root
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("civic");
            Config::default_for_root(project_id).save_to(&cfg_path)?;
        }
        let _ = SqliteStore::open(&Config::db_path(data_root))?;
        Ok(cfg_path)
    }

    /// Create an incident from an uploaded image. The image is written
    /// to the artifact store first; only then is the record minted.
    pub fn submit_report(&self, report: NewReport) -> WorkflowResult<Incident> {
        validate_report_fields(&report.category, &report.location)?;
        if report.image.is_empty() {
            return Err(WorkflowError::invalid("no image provided"));
        }

        let original = self
            .artifacts
            .store_original(&report.category, &report.ext, &report.image)?;

        let incident = self.store.create(IncidentDraft {
            category: report.category,
            location: report.location,
            original,
            source: report.source,
            created_at: now_unix(),
        })?;
        info!(id = %incident.id, category = %incident.category, "incident created");
        Ok(incident)
    }

    /// Create an incident from an already-stored evidence reference.
    pub fn create_from_ref(
        &self,
        category: String,
        location: Location,
        original: EvidenceRef,
        source: ReportSource,
    ) -> WorkflowResult<Incident> {
        validate_report_fields(&category, &location)?;
        if !self.artifacts.exists(&original) {
            return Err(WorkflowError::invalid(format!(
                "evidence reference '{original}' does not resolve to a stored artifact"
            )));
        }
        let incident = self.store.create(IncidentDraft {
            category,
            location,
            original,
            source,
            created_at: now_unix(),
        })?;
        info!(id = %incident.id, category = %incident.category, "incident created");
        Ok(incident)
    }

    pub fn assign(&self, id: IncidentId, worker: WorkerId) -> WorkflowResult<Incident> {
        let now = now_unix();
        let updated = self.store.update(id, &|cur| {
            let mut next = cur.clone();
            next.state = cur.state.assign(worker.clone())?;
            next.updated_at = now;
            Ok(next)
        })?;
        info!(id = %id, worker = %worker, "incident assigned");
        Ok(updated)
    }

    /// Record a worker's resolution proof. The proof image is stored
    /// before the transition; if the transition then conflicts, the
    /// orphaned artifact is harmless and the record is untouched.
    pub fn complete(
        &self,
        id: IncidentId,
        caller: WorkerId,
        image: &[u8],
        ext: &str,
    ) -> WorkflowResult<Incident> {
        if image.is_empty() {
            return Err(WorkflowError::invalid("no resolution image provided"));
        }
        // surface NotFound before touching the blob store
        self.store.get(id)?;

        let resolved = self.artifacts.store_resolved(id, ext, image)?;
        let now = now_unix();
        let updated = self.store.update(id, &|cur| {
            let mut next = cur.clone();
            next.state = cur.state.complete(&caller, resolved.clone())?;
            next.updated_at = now;
            Ok(next)
        })?;
        info!(id = %id, worker = %caller, "incident completed");
        Ok(updated)
    }

    pub fn verify(
        &self,
        id: IncidentId,
        decision: Decision,
        note: Option<String>,
    ) -> WorkflowResult<Incident> {
        let now = now_unix();
        let updated = self.store.update(id, &|cur| {
            let mut next = cur.clone();
            next.state = cur.state.verify(decision, note.clone())?;
            next.updated_at = now;
            Ok(next)
        })?;
        info!(id = %id, decision = ?decision, status = updated.status().as_str(), "incident verified");
        Ok(updated)
    }

    pub fn get(&self, id: IncidentId) -> WorkflowResult<Incident> {
        self.store.get(id)
    }

    pub fn list(&self, status: Option<Status>) -> WorkflowResult<Vec<Incident>> {
        self.store.list(status)
    }

    /// Pending tasks currently assigned to `worker`.
    pub fn worker_tasks(&self, worker: &WorkerId) -> WorkflowResult<Vec<Incident>> {
        let pending = self.store.list(Some(Status::Pending))?;
        Ok(pending
            .into_iter()
            .filter(|i| i.assignee() == Some(worker))
            .collect())
    }

    pub fn stats(&self) -> WorkflowResult<Stats> {
        let all = self.store.list(None)?;
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
        for incident in &all {
            *by_category.entry(incident.category.clone()).or_default() += 1;
            *by_status.entry(incident.status().as_str()).or_default() += 1;
        }
        Ok(Stats {
            total: all.len(),
            by_category,
            by_status,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_status: BTreeMap<&'static str, usize>,
}

fn validate_report_fields(category: &str, location: &Location) -> WorkflowResult<()> {
    if category.trim().is_empty() {
        return Err(WorkflowError::invalid("category is required"));
    }
    if location.address.trim().is_empty() {
        return Err(WorkflowError::invalid("location address is required"));
    }
    Ok(())
}
