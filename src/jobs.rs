//! Asynchronous job orchestration.
//!
//! Submissions are validated synchronously, recorded as pending jobs, and
//! processed on the runtime's blocking pool. Each job record has a single
//! writer at a time: the submitting call until the task is spawned, then
//! the processing task until the job is terminal. Reads clone snapshots,
//! so callers never observe a half-updated record.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::model::{ExtractionFlags, ExtractionMethod, ExtractionResult, Job, JobStatus};
use crate::pipeline::ExtractionPipeline;

/// Entitlement gate consulted before a job is scheduled.
///
/// Implementations meter usage however the deployment requires; the
/// orchestrator only asks yes/no and reports consumption.
pub trait LicenseGate: Send + Sync {
    /// Whether another document may be processed right now.
    fn can_process(&self) -> bool;

    /// Record that one document was accepted for processing.
    fn record_usage(&self);
}

/// A gate that never denies. The default.
pub struct Unrestricted;

impl LicenseGate for Unrestricted {
    fn can_process(&self) -> bool {
        true
    }

    fn record_usage(&self) {}
}

/// Per-submission processing options.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    /// Text extraction method; `Auto` resolves from the document kind
    pub method: ExtractionMethod,
    /// Which facets to extract
    pub flags: ExtractionFlags,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            method: ExtractionMethod::Auto,
            flags: ExtractionFlags::default(),
        }
    }
}

/// Point-in-time view of a job, without the (possibly large) result.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    /// Job identifier
    pub id: Uuid,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Original filename
    pub filename: String,
    /// Progress percent in `[0, 100]`
    pub progress: u8,
    /// Label of the current pipeline step
    pub current_step: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// Failure message for failed jobs
    pub error: Option<String>,
}

type JobStore = Arc<RwLock<HashMap<Uuid, Job>>>;

/// Owns the job store and drives submissions through the pipeline.
pub struct JobOrchestrator {
    store: JobStore,
    pipeline: Arc<ExtractionPipeline>,
    gate: Arc<dyn LicenseGate>,
}

impl JobOrchestrator {
    /// Build an orchestrator over the given pipeline with no entitlement
    /// restrictions.
    pub fn new(pipeline: ExtractionPipeline) -> JobOrchestrator {
        JobOrchestrator {
            store: Arc::new(RwLock::new(HashMap::new())),
            pipeline: Arc::new(pipeline),
            gate: Arc::new(Unrestricted),
        }
    }

    /// Replace the entitlement gate.
    pub fn with_gate(mut self, gate: Arc<dyn LicenseGate>) -> JobOrchestrator {
        self.gate = gate;
        self
    }

    /// Validate a submission, record a pending job, and schedule it.
    ///
    /// Unsupported kinds, empty payloads, and entitlement denials are
    /// rejected here and leave no job record behind. Must be called from
    /// within a tokio runtime.
    pub fn submit(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
        options: SubmitOptions,
    ) -> Result<Uuid> {
        let document = SourceDocument::new(filename, bytes)?;
        if !self.gate.can_process() {
            return Err(Error::EntitlementDenied);
        }

        let id = Uuid::new_v4();
        let job = Job {
            id,
            status: JobStatus::Pending,
            filename: document.name().to_string(),
            file_size: document.size(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0,
            current_step: None,
            result: None,
            error: None,
        };
        write_map(&self.store).insert(id, job);

        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            process_job(store, pipeline, document, id, options).await;
        });

        self.gate.record_usage();
        log::info!("job {id} submitted");
        Ok(id)
    }

    /// Current status of a job.
    pub fn status(&self, id: Uuid) -> Result<JobStatusView> {
        let map = read_map(&self.store);
        let job = map.get(&id).ok_or(Error::JobNotFound(id))?;
        Ok(view_of(job))
    }

    /// The extraction result of a completed job.
    ///
    /// Pending and processing jobs report [`Error::ResultNotReady`]; failed
    /// jobs report [`Error::JobFailed`] carrying the recorded message.
    pub fn result(&self, id: Uuid) -> Result<ExtractionResult> {
        let map = read_map(&self.store);
        let job = map.get(&id).ok_or(Error::JobNotFound(id))?;
        match job.status {
            JobStatus::Pending | JobStatus::Processing => Err(Error::ResultNotReady(id)),
            JobStatus::Failed => Err(Error::JobFailed {
                id,
                message: job.error.clone().unwrap_or_default(),
            }),
            JobStatus::Completed => job.result.clone().ok_or(Error::ResultNotReady(id)),
        }
    }

    /// Status views of the most recent jobs, newest first.
    pub fn list(&self, limit: usize) -> Vec<JobStatusView> {
        let map = read_map(&self.store);
        let mut views: Vec<JobStatusView> = map.values().map(view_of).collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views.truncate(limit);
        views
    }

    /// Delete a job record, whatever its state.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        write_map(&self.store)
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::JobNotFound(id))
    }
}

async fn process_job(
    store: JobStore,
    pipeline: Arc<ExtractionPipeline>,
    document: SourceDocument,
    id: Uuid,
    options: SubmitOptions,
) {
    if let Some(job) = write_map(&store).get_mut(&id) {
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
    } else {
        // Deleted before it started; nothing to do.
        return;
    }

    let progress_store = Arc::clone(&store);
    let run = tokio::task::spawn_blocking(move || {
        let progress = |percent: u8, step: &str| {
            if let Some(job) = write_map(&progress_store).get_mut(&id) {
                job.progress = job.progress.max(percent);
                job.current_step = Some(step.to_string());
            }
        };
        pipeline.run(&document, options.method, options.flags, &progress)
    })
    .await;

    let outcome = match run {
        Ok(outcome) => outcome,
        Err(e) => Err(Error::Strategy(format!("processing task aborted: {e}"))),
    };

    let mut map = write_map(&store);
    let Some(job) = map.get_mut(&id) else {
        return;
    };
    match outcome {
        Ok(result) => {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.current_step = Some("Complete".to_string());
            job.result = Some(result);
            log::info!("job {id} completed");
        }
        Err(e) => {
            job.status = JobStatus::Failed;
            job.error = Some(e.to_string());
            log::warn!("job {id} failed: {e}");
        }
    }
    job.completed_at = Some(Utc::now());
}

fn view_of(job: &Job) -> JobStatusView {
    JobStatusView {
        id: job.id,
        status: job.status,
        filename: job.filename.clone(),
        progress: job.progress,
        current_step: job.current_step.clone(),
        created_at: job.created_at,
        error: job.error.clone(),
    }
}

fn read_map(store: &RwLock<HashMap<Uuid, Job>>) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Job>> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_map(store: &RwLock<HashMap<Uuid, Job>>) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Job>> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}
