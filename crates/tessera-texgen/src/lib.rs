//! Tessera Texgen - drives a remote texture-generation service
//!
//! Uploads meshes, submits generation jobs, polls them to completion,
//! downloads the resulting texture maps, and hands them to the host's
//! material binder. All orchestration runs as cooperative tasks advanced
//! by the host's per-frame tick; blocking network and file work is
//! dispatched to a worker pool.

pub mod clock;
pub mod config;
pub mod events;
pub mod materializer;
pub mod orchestrator;
pub mod params;
pub mod providers;
pub mod scheduler;
pub mod selection;
pub mod service;
pub mod session;
pub mod worker;
pub mod workspace;

pub use config::TesseraConfig;
pub use events::{EventBus, SessionEvent};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use params::{FacingDirection, GenerationParams, ModelVersion, PreviewDirection, SubmissionPayload};
pub use scheduler::{CancelToken, Scheduler, TaskContext, TaskId, TaskOutcome};
pub use service::{JobStatusReport, RemoteJobStatus, TextureService, UploadTarget};
pub use session::{Job, JobPhase, JobStatus, RunKind, Session, SessionState};
