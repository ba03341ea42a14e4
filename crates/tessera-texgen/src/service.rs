//! Gateway contract for the remote texture-generation service
//!
//! Every method is a blocking call; the orchestrator only ever invokes
//! them from worker threads through `TaskContext::blocking`.

use crate::params::SubmissionPayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tessera_core::{RemoteMesh, Result};

/// Pre-signed upload destination issued by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Identifier the mesh will have once uploaded
    pub mesh_id: String,
    /// Storage endpoint to POST the file to
    pub url: String,
    /// Form fields that must accompany the file
    pub fields: BTreeMap<String, String>,
}

/// Remote job status as reported by a status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteJobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    Other(String),
}

impl RemoteJobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => RemoteJobStatus::Pending,
            "PROCESSING" | "IN_PROGRESS" | "RUNNING" => RemoteJobStatus::Processing,
            "COMPLETE" => RemoteJobStatus::Complete,
            "FAILED" => RemoteJobStatus::Failed,
            other => RemoteJobStatus::Other(other.to_string()),
        }
    }
}

/// One status check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: RemoteJobStatus,
    /// Seed the service used; present on completion
    pub seed: Option<u64>,
    /// Result image URLs; present on completion
    pub images: Vec<String>,
}

impl JobStatusReport {
    pub fn pending() -> Self {
        Self {
            status: RemoteJobStatus::Pending,
            seed: None,
            images: Vec::new(),
        }
    }

    pub fn complete(seed: u64, images: Vec<String>) -> Self {
        Self {
            status: RemoteJobStatus::Complete,
            seed: Some(seed),
            images,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RemoteJobStatus::Complete
    }
}

/// Blocking request/response calls to the remote service
pub trait TextureService: Send + Sync {
    /// Provider name (e.g. "leonardo", "mock")
    fn name(&self) -> &str;

    /// Whether an API credential is configured
    fn has_credentials(&self) -> bool;

    /// Identity lookup for the configured credential
    fn current_user_id(&self) -> Result<String>;

    /// Meshes the user has uploaded before
    fn list_meshes(&self, user_id: &str) -> Result<Vec<RemoteMesh>>;

    /// First phase of an upload: obtain a pre-signed target
    fn request_upload(&self, name: &str, extension: &str) -> Result<UploadTarget>;

    /// Second phase: post the file to storage. Returns the raw status
    /// code; storage signals success with 204.
    fn upload_file(&self, target: &UploadTarget, file: &Path) -> Result<u16>;

    /// Submit a generation job and return its id. Non-200 is an error.
    fn submit_generation(&self, payload: &SubmissionPayload) -> Result<String>;

    /// Check a job's status
    fn job_status(&self, job_id: &str) -> Result<JobStatusReport>;

    /// Stream a result file into `sink`, returning the byte count
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}
