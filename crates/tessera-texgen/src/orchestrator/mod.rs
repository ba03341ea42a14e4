//! Job orchestrator
//!
//! Entry points the host calls in response to user actions. Each one
//! validates against the session, claims it if needed, and spawns a task
//! on the scheduler; the host then calls `tick()` once per frame.

mod job;
mod upload;


use crate::clock::Clock;
use crate::config::TesseraConfig;
use crate::events::SessionEvent;
use crate::params::{GenerationParams, PreviewDirection, SubmissionPayload};
use crate::scheduler::{Scheduler, TaskId, TaskOutcome};
use crate::selection;
use crate::service::TextureService;
use crate::session::{Job, RunKind, Session};
use crate::worker::WorkerPool;
use std::cell::{Ref, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{
    MeshBinding, ObjectId, Result, SceneHost, TesseraError, TextureBinder,
};

/// Tunables the orchestrator reads from config
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    /// `None` polls until the job completes or is stopped
    pub max_poll_attempts: Option<u32>,
    /// Consecutive failed status checks tolerated before giving up
    pub transient_error_limit: u32,
    pub workspace_subdir: String,
    pub export_file: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&TesseraConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &TesseraConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            transient_error_limit: config.transient_error_limit,
            workspace_subdir: config.workspace_subdirectory.clone(),
            export_file: config.export_file.clone(),
        }
    }
}

/// Shared handles a spawned flow needs
#[derive(Clone)]
pub(crate) struct FlowContext {
    pub session: Rc<RefCell<Session>>,
    pub service: Arc<dyn TextureService>,
    pub host: Rc<RefCell<dyn SceneHost>>,
    pub binder: Rc<RefCell<dyn TextureBinder>>,
    pub settings: OrchestratorSettings,
}

impl FlowContext {
    /// `<project dir or desktop>/<workspace subdir>`
    pub fn work_dir(&self) -> PathBuf {
        let project = self.host.borrow().project_path();
        crate::workspace::work_dir(project.as_deref(), &self.settings.workspace_subdir)
    }
}

/// Clears the running flag if a flow ends without settling the session
/// itself (error return, panic, or cancellation dropping the future).
pub(crate) struct RunLease {
    session: Rc<RefCell<Session>>,
    epoch: u64,
    kind: RunKind,
    settled: bool,
}

impl RunLease {
    pub fn new(session: Rc<RefCell<Session>>, epoch: u64, kind: RunKind) -> Self {
        Self {
            session,
            epoch,
            kind,
            settled: false,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The flow put the session into its terminal state
    pub fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // A panic unwinding out of a session borrow leaves it borrowed
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        if !session.is_current(self.epoch) {
            return;
        }
        tracing::debug!(epoch = self.epoch, kind = ?self.kind, "Releasing unsettled run");
        match self.kind {
            RunKind::Job => session.abandon_job(self.epoch),
            RunKind::Upload => session.finish_upload(self.epoch, "Upload failed"),
        }
    }
}

pub struct Orchestrator {
    scheduler: Scheduler,
    flow: FlowContext,
    active: Option<TaskId>,
    query: Option<TaskId>,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn TextureService>,
        host: Rc<RefCell<dyn SceneHost>>,
        binder: Rc<RefCell<dyn TextureBinder>>,
        workers: WorkerPool,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self::with_session(service, host, binder, workers, clock, settings, Session::new())
    }

    /// Resume with a restored session
    pub fn with_session(
        service: Arc<dyn TextureService>,
        host: Rc<RefCell<dyn SceneHost>>,
        binder: Rc<RefCell<dyn TextureBinder>>,
        workers: WorkerPool,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
        session: Session,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(workers, clock),
            flow: FlowContext {
                session: Rc::new(RefCell::new(session)),
                service,
                host,
                binder,
                settings,
            },
            active: None,
            query: None,
        }
    }

    pub fn session(&self) -> Ref<'_, Session> {
        self.flow.session.borrow()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.flow.session.borrow_mut().drain_events()
    }

    /// No task pending on the scheduler
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Submit a full texture generation for the selected mesh
    pub fn start_job(&mut self, params: GenerationParams) -> Result<()> {
        self.start_generation(params, None)
    }

    /// Submit a single-view preview generation
    pub fn start_preview(
        &mut self,
        params: GenerationParams,
        direction: PreviewDirection,
    ) -> Result<()> {
        self.start_generation(params, Some(direction))
    }

    fn start_generation(
        &mut self,
        params: GenerationParams,
        preview: Option<PreviewDirection>,
    ) -> Result<()> {
        self.ensure_credentials()?;
        if self.flow.session.borrow().state().is_running {
            return Err(TesseraError::JobInProgress);
        }

        let (selection, mesh) = {
            let host = self.flow.host.borrow();
            let selection = selection::selected(&*host);
            let mesh = selection::bound_mesh(&*host);
            (selection, mesh)
        };
        if selection.is_empty() {
            return Err(TesseraError::EmptySelection);
        }
        self.flow.session.borrow_mut().set_current_mesh(mesh.clone());
        let mesh = mesh.ok_or(TesseraError::NoMeshBound)?;

        let payload = SubmissionPayload::new(&params, &mesh.id, preview);
        let epoch = self
            .flow
            .session
            .borrow_mut()
            .begin_job(Job::new(params.clone(), preview))?;
        let lease = RunLease::new(Rc::clone(&self.flow.session), epoch, RunKind::Job);

        tracing::info!(
            mesh = %mesh.id,
            prompt = %params.prompt,
            preview = ?preview,
            "Submitting texture job"
        );
        let flow = self.flow.clone();
        let name = if preview.is_some() { "preview" } else { "texture-job" };
        let id = self.scheduler.spawn(name, move |ctx| {
            job::run(ctx, flow, lease, params, payload, selection)
        });
        self.active = Some(id);
        Ok(())
    }

    /// Stop the current job or upload. Local state is released at once;
    /// the remote job, if any, keeps running on the service.
    pub fn stop_job(&mut self) -> bool {
        let stopped = self.flow.session.borrow_mut().stop();
        if let Some(id) = self.active.take() {
            self.scheduler.cancel(id);
        }
        if stopped {
            tracing::info!("Job stopped by user");
        }
        stopped
    }

    /// Export the selection and upload it as a new remote mesh
    pub fn start_upload(&mut self, name_input: &str) -> Result<()> {
        self.ensure_credentials()?;
        if self.flow.session.borrow().state().is_running {
            return Err(TesseraError::JobInProgress);
        }

        let (selection, project) = {
            let host = self.flow.host.borrow();
            (selection::selected(&*host), host.project_path())
        };
        if selection.is_empty() {
            return Err(TesseraError::EmptySelection);
        }

        let name = crate::workspace::default_asset_name(name_input, project.as_deref());
        let epoch = self.flow.session.borrow_mut().begin_upload()?;
        let lease = RunLease::new(Rc::clone(&self.flow.session), epoch, RunKind::Upload);

        tracing::info!(name = %name, objects = selection.len(), "Uploading mesh");
        let flow = self.flow.clone();
        let id = self
            .scheduler
            .spawn("mesh-upload", move |ctx| upload::run(ctx, flow, lease, name, selection));
        self.active = Some(id);
        Ok(())
    }

    /// Refresh the list of the user's remote meshes. A query already in
    /// flight is reused.
    pub fn start_query(&mut self) -> Result<TaskId> {
        self.ensure_credentials()?;
        if let Some(id) = self.query.filter(|id| self.scheduler.is_pending(*id)) {
            return Ok(id);
        }

        let session = Rc::clone(&self.flow.session);
        let service = Arc::clone(&self.flow.service);
        let id = self.scheduler.spawn("mesh-query", move |ctx| async move {
            let meshes = ctx
                .blocking(move || {
                    let user_id = service.current_user_id()?;
                    service.list_meshes(&user_id)
                })
                .await?;
            tracing::info!(count = meshes.len(), "Fetched remote meshes");
            session.borrow_mut().set_user_meshes(meshes);
            Ok(())
        });
        self.query = Some(id);
        Ok(id)
    }

    /// Bind every selected object to a previously uploaded mesh
    pub fn bind_existing_mesh(&mut self, mesh_id: &str) -> Result<MeshBinding> {
        let binding: MeshBinding = self
            .flow
            .session
            .borrow()
            .state()
            .user_meshes
            .iter()
            .find(|m| m.id == mesh_id)
            .cloned()
            .map(Into::into)
            .ok_or_else(|| TesseraError::UnknownMesh(mesh_id.to_string()))?;

        let selection = selection::selected(&*self.flow.host.borrow());
        if selection.is_empty() {
            return Err(TesseraError::EmptySelection);
        }
        {
            let mut host = self.flow.host.borrow_mut();
            for id in &selection {
                host.set_mesh_binding(*id, binding.clone())?;
            }
        }
        tracing::info!(mesh = %binding.id, objects = selection.len(), "Bound selection to mesh");
        self.on_selection_changed();
        Ok(binding)
    }

    /// Recompute the bound mesh after the host's selection changed
    pub fn on_selection_changed(&mut self) -> Option<MeshBinding> {
        let mesh = selection::bound_mesh(&*self.flow.host.borrow());
        self.flow.session.borrow_mut().set_current_mesh(mesh.clone());
        mesh
    }

    /// Objects of the current selection, for hosts that show them
    pub fn selected_objects(&self) -> Vec<ObjectId> {
        selection::selected(&*self.flow.host.borrow())
    }

    /// Advance all tasks once. Call once per host frame.
    pub fn tick(&mut self) -> Vec<TaskOutcome> {
        let outcomes = self.scheduler.tick();
        for outcome in &outcomes {
            if let TaskOutcome::Failed { id, error, .. } = outcome {
                if Some(*id) == self.query {
                    tracing::warn!(error = %error, "Mesh query failed");
                } else {
                    self.flow
                        .session
                        .borrow_mut()
                        .set_status(format!("Error: {}", error));
                }
            }
            let id = outcome.id();
            if self.active == Some(id) {
                self.active = None;
            }
            if self.query == Some(id) {
                self.query = None;
            }
        }
        outcomes
    }

    fn ensure_credentials(&mut self) -> Result<()> {
        if self.flow.service.has_credentials() {
            self.flow.session.borrow_mut().set_auth_required(false);
            Ok(())
        } else {
            tracing::warn!(provider = self.flow.service.name(), "No API key configured");
            self.flow.session.borrow_mut().set_auth_required(true);
            Err(TesseraError::MissingApiKey)
        }
    }
}
