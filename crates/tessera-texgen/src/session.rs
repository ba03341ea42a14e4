//! Orchestration session state
//!
//! One `Session` exists per host session. It is owned by the orchestrator
//! (shared with its tasks through `Rc<RefCell<_>>`) and every mutation
//! publishes a `SessionEvent`.
//!
//! `is_running` is the system-wide mutual-exclusion flag: at most one job
//! or upload is in flight. Each run gets an epoch; a task that outlives its
//! run (for example after the user pressed stop and started another job)
//! can no longer touch the session because its epoch is stale.

use crate::events::{EventBus, SessionEvent};
use crate::params::{GenerationParams, PreviewDirection};
use serde::{Deserialize, Serialize};
use tessera_core::{MeshBinding, RemoteMesh, Result, SessionRecord, TesseraError};

/// Where the orchestrator is in the life of the current job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingResult,
    Downloading,
    Applying,
    Done,
    Failed,
    Cancelled,
}

/// Lifecycle of a job as tracked locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Cancelled,
}

/// The current job. Replaced when a new submission starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Remote job id; empty until the service accepts the submission
    pub id: String,
    pub status: JobStatus,
    pub params: GenerationParams,
    pub preview: Option<PreviewDirection>,
    pub result_seed: Option<u64>,
}

impl Job {
    pub fn new(params: GenerationParams, preview: Option<PreviewDirection>) -> Self {
        Self {
            id: String::new(),
            status: JobStatus::Pending,
            params,
            preview,
            result_seed: None,
        }
    }
}

/// What holds the running claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Job,
    Upload,
}

/// Observable session fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_running: bool,
    pub has_returned: bool,
    pub job_id: String,
    pub last_seed: u64,
    pub status_label: String,
    pub phase: JobPhase,
    pub job: Option<Job>,
    /// Remote mesh bound to the current selection
    pub current_mesh: Option<MeshBinding>,
    /// Last listing of the user's remote meshes
    pub user_meshes: Vec<RemoteMesh>,
    pub auth_required: bool,
}

#[derive(Default)]
pub struct Session {
    state: SessionState,
    epoch: u64,
    run: Option<RunKind>,
    events: EventBus<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted fields. Nothing can be in flight in a fresh
    /// process, so a persisted `is_running` is dropped.
    pub fn from_record(record: &SessionRecord) -> Self {
        let mut session = Self::new();
        session.state.has_returned = record.has_returned;
        session.state.job_id = record.job_id.clone();
        session.state.last_seed = record.last_seed;
        session.state.status_label = record.status_label.clone();
        session.state.user_meshes = record.user_meshes.clone();
        if record.is_running {
            tracing::warn!("Persisted session claimed a running job; resetting");
            session.state.job_id.clear();
            session.state.status_label.clear();
        }
        session
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            is_running: self.state.is_running,
            has_returned: self.state.has_returned,
            job_id: self.state.job_id.clone(),
            last_seed: self.state.last_seed,
            status_label: self.state.status_label.clone(),
            user_meshes: self.state.user_meshes.clone(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Kind of run in flight, if any
    pub fn run_kind(&self) -> Option<RunKind> {
        self.run
    }

    /// True while the run identified by `epoch` still owns the session
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.state.is_running
    }

    /// Claim the session for a new job
    pub fn begin_job(&mut self, job: Job) -> Result<u64> {
        let epoch = self.claim(RunKind::Job)?;
        self.state.has_returned = false;
        self.set_job_id(String::new());
        self.state.job = Some(job);
        self.set_phase(JobPhase::Submitting);
        self.set_status("Generating");
        Ok(epoch)
    }

    /// Claim the session for a mesh upload
    pub fn begin_upload(&mut self) -> Result<u64> {
        let epoch = self.claim(RunKind::Upload)?;
        self.set_status("Uploading current mesh!");
        Ok(epoch)
    }

    fn claim(&mut self, kind: RunKind) -> Result<u64> {
        if self.state.is_running {
            return Err(TesseraError::JobInProgress);
        }
        self.epoch += 1;
        self.run = Some(kind);
        self.set_running(true);
        Ok(self.epoch)
    }

    /// The service accepted the submission. Returns false if the run was
    /// stopped in the meantime.
    pub fn accept_job(&mut self, epoch: u64, job_id: &str) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        if let Some(job) = self.state.job.as_mut() {
            job.id = job_id.to_string();
        }
        self.set_job_id(job_id.to_string());
        self.set_phase(JobPhase::AwaitingResult);
        true
    }

    pub fn set_job_status(&mut self, epoch: u64, status: JobStatus) {
        if self.is_current(epoch) {
            if let Some(job) = self.state.job.as_mut() {
                job.status = status;
            }
        }
    }

    /// Advance the phase of the run identified by `epoch`
    pub fn advance(&mut self, epoch: u64, phase: JobPhase, status: &str) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.set_phase(phase);
        self.set_status(status);
        true
    }

    /// Submission was refused: no job id, not running, returned
    pub fn reject_job(&mut self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        self.set_job_id(String::new());
        if let Some(job) = self.state.job.as_mut() {
            job.status = JobStatus::Failed;
        }
        self.set_phase(JobPhase::Failed);
        self.set_status("");
        self.set_running(false);
        self.mark_returned(None);
    }

    /// Results were applied
    pub fn complete_job(&mut self, epoch: u64, seed: u64) {
        if !self.is_current(epoch) {
            return;
        }
        if let Some(job) = self.state.job.as_mut() {
            job.status = JobStatus::Complete;
            job.result_seed = Some(seed);
        }
        self.state.last_seed = seed;
        self.set_phase(JobPhase::Done);
        self.set_status("");
        self.set_running(false);
        self.mark_returned(Some(seed));
    }

    /// A job's task ended without reaching a terminal state on its own
    /// (error, panic, or the scheduler dropped it)
    pub fn abandon_job(&mut self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        self.set_job_id(String::new());
        if let Some(job) = self.state.job.as_mut() {
            job.status = JobStatus::Failed;
        }
        self.set_phase(JobPhase::Failed);
        self.set_running(false);
        self.mark_returned(None);
    }

    /// An upload finished, successfully or not
    pub fn finish_upload(&mut self, epoch: u64, status: &str) {
        if !self.is_current(epoch) {
            return;
        }
        self.set_status(status);
        self.set_running(false);
    }

    /// User stop: disengage locally. Returns false if nothing was running.
    /// Stopping an upload leaves the last job's fields alone.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_running {
            return false;
        }
        if self.run == Some(RunKind::Job) {
            if let Some(job) = self.state.job.as_mut() {
                if matches!(job.status, JobStatus::Pending | JobStatus::Running) {
                    job.status = JobStatus::Cancelled;
                }
            }
            self.set_phase(JobPhase::Cancelled);
            self.set_job_id(String::new());
        }
        self.set_status("");
        self.set_running(false);
        true
    }

    pub fn set_status(&mut self, label: impl Into<String>) {
        let label = label.into();
        if self.state.status_label != label {
            self.state.status_label = label.clone();
            self.events.push(SessionEvent::StatusChanged(label));
        }
    }

    pub fn set_current_mesh(&mut self, mesh: Option<MeshBinding>) {
        if self.state.current_mesh != mesh {
            self.state.current_mesh = mesh.clone();
            self.events.push(SessionEvent::CurrentMeshChanged(mesh));
        }
    }

    pub fn set_user_meshes(&mut self, meshes: Vec<RemoteMesh>) {
        let count = meshes.len();
        self.state.user_meshes = meshes;
        self.events.push(SessionEvent::UserMeshesChanged(count));
    }

    pub fn set_auth_required(&mut self, required: bool) {
        if self.state.auth_required != required {
            self.state.auth_required = required;
            if required {
                self.events.push(SessionEvent::AuthRequired);
            }
        }
    }

    fn set_running(&mut self, running: bool) {
        if !running {
            self.run = None;
        }
        if self.state.is_running != running {
            self.state.is_running = running;
            self.events.push(SessionEvent::RunningChanged(running));
        }
    }

    fn set_job_id(&mut self, job_id: String) {
        if self.state.job_id != job_id {
            self.state.job_id = job_id.clone();
            self.events.push(SessionEvent::JobIdChanged(job_id));
        }
    }

    fn set_phase(&mut self, phase: JobPhase) {
        if self.state.phase != phase {
            self.state.phase = phase;
            self.events.push(SessionEvent::PhaseChanged(phase));
        }
    }

    fn mark_returned(&mut self, seed: Option<u64>) {
        self.state.has_returned = true;
        self.events.push(SessionEvent::Returned { seed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(GenerationParams::new("stone wall"), None)
    }

    #[test]
    fn test_begin_job_is_exclusive() {
        let mut session = Session::new();
        let epoch = session.begin_job(job()).unwrap();
        assert!(session.state().is_running);
        assert!(!session.state().has_returned);
        assert_eq!(session.state().phase, JobPhase::Submitting);

        let before = session.state().clone();
        assert!(matches!(
            session.begin_job(job()),
            Err(TesseraError::JobInProgress)
        ));
        assert!(matches!(
            session.begin_upload(),
            Err(TesseraError::JobInProgress)
        ));
        assert_eq!(session.state(), &before);
        assert_eq!(session.epoch(), epoch);
    }

    #[test]
    fn test_complete_job_records_seed() {
        let mut session = Session::new();
        let epoch = session.begin_job(job()).unwrap();
        assert!(session.accept_job(epoch, "job1"));
        session.complete_job(epoch, 42);

        let state = session.state();
        assert!(!state.is_running);
        assert!(state.has_returned);
        assert_eq!(state.last_seed, 42);
        assert_eq!(state.status_label, "");
        assert_eq!(state.phase, JobPhase::Done);
        assert_eq!(state.job.as_ref().unwrap().status, JobStatus::Complete);
    }

    #[test]
    fn test_stale_epoch_cannot_touch_new_run() {
        let mut session = Session::new();
        let old = session.begin_job(job()).unwrap();
        assert!(session.stop());
        let new = session.begin_job(job()).unwrap();
        assert_ne!(old, new);

        assert!(!session.accept_job(old, "stale"));
        session.complete_job(old, 7);
        session.abandon_job(old);
        assert!(session.state().is_running);
        assert_eq!(session.state().job_id, "");
        assert_eq!(session.state().last_seed, 0);
    }

    #[test]
    fn test_stop_clears_running_and_job_id() {
        let mut session = Session::new();
        let epoch = session.begin_job(job()).unwrap();
        session.accept_job(epoch, "job1");
        session.drain_events();

        assert!(session.stop());
        assert!(!session.state().is_running);
        assert_eq!(session.state().job_id, "");
        assert_eq!(session.state().phase, JobPhase::Cancelled);
        assert!(session
            .drain_events()
            .contains(&SessionEvent::RunningChanged(false)));
        assert!(!session.stop());
    }

    #[test]
    fn test_stop_during_upload_keeps_last_job() {
        let mut session = Session::new();
        let epoch = session.begin_job(job()).unwrap();
        session.accept_job(epoch, "job1");
        session.complete_job(epoch, 9);
        let before = session.state().job.clone();

        session.begin_upload().unwrap();
        assert_eq!(session.run_kind(), Some(RunKind::Upload));
        assert!(session.stop());
        assert_eq!(session.run_kind(), None);
        assert!(!session.state().is_running);
        assert_eq!(session.state().job_id, "job1");
        assert_eq!(session.state().phase, JobPhase::Done);
        assert_eq!(session.state().job, before);
    }

    #[test]
    fn test_record_restore_never_resumes_running() {
        let record = SessionRecord {
            is_running: true,
            has_returned: true,
            job_id: "job-old".into(),
            last_seed: 99,
            status_label: "Generating".into(),
            user_meshes: vec![],
        };
        let session = Session::from_record(&record);
        assert!(!session.state().is_running);
        assert_eq!(session.state().job_id, "");
        assert_eq!(session.state().last_seed, 99);
        assert!(session.state().has_returned);
    }
}
