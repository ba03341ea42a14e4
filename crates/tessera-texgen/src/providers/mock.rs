//! Scripted in-process texture service
//!
//! Answers every call without a network. Job status checks follow a script
//! (the last entry repeats once the script runs out) and downloads produce
//! small solid-color JPEGs, so a whole job can run end to end offline.

use crate::params::SubmissionPayload;
use crate::service::{JobStatusReport, TextureService, UploadTarget};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use tessera_core::{MapKind, RemoteMesh, Result, TesseraError};

/// One scripted answer to a status check
#[derive(Debug, Clone)]
pub enum ScriptedPoll {
    Report(JobStatusReport),
    /// The check fails with this HTTP status
    Fail(u16),
}

/// A call the mock received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CurrentUser,
    ListMeshes(String),
    RequestUpload { name: String, extension: String },
    UploadFile { mesh_id: String, bytes: u64 },
    Submit(SubmissionPayload),
    JobStatus(String),
    Download(String),
}

struct MockState {
    calls: Vec<MockCall>,
    polls_served: usize,
}

pub struct MockService {
    credentials: bool,
    user_id: String,
    meshes: Vec<RemoteMesh>,
    job_id: String,
    submit_status: u16,
    request_upload_status: u16,
    upload_status: u16,
    download_status: u16,
    script: Vec<ScriptedPoll>,
    state: Mutex<MockState>,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    /// Completes on the first status check with seed 42 and all four maps
    pub fn new() -> Self {
        let job_id = "mock-job-1".to_string();
        let script = vec![ScriptedPoll::Report(JobStatusReport::complete(
            42,
            Self::result_urls(&job_id),
        ))];
        Self {
            credentials: true,
            user_id: "mock-user".to_string(),
            meshes: Vec::new(),
            job_id,
            submit_status: 200,
            request_upload_status: 200,
            upload_status: 204,
            download_status: 200,
            script,
            state: Mutex::new(MockState {
                calls: Vec::new(),
                polls_served: 0,
            }),
        }
    }

    /// Two pending checks before completion, plus one uploaded mesh
    pub fn demo() -> Self {
        let job_id = "mock-job-1".to_string();
        let urls = Self::result_urls(&job_id);
        Self::new()
            .with_meshes(vec![RemoteMesh {
                id: "mock-mesh-1".to_string(),
                name: "Demo Crate".to_string(),
            }])
            .with_statuses(vec![
                ScriptedPoll::Report(JobStatusReport::pending()),
                ScriptedPoll::Report(JobStatusReport::pending()),
                ScriptedPoll::Report(JobStatusReport::complete(1234, urls)),
            ])
    }

    /// URLs for a full four-map result set
    pub fn result_urls(job_id: &str) -> Vec<String> {
        MapKind::ALL
            .iter()
            .map(|kind| format!("mock://results/{}/{}_{}", job_id, job_id, kind.suffix()))
            .collect()
    }

    pub fn with_job_id(mut self, job_id: &str) -> Self {
        self.job_id = job_id.to_string();
        self
    }

    pub fn with_submit_status(mut self, status: u16) -> Self {
        self.submit_status = status;
        self
    }

    pub fn with_statuses(mut self, script: Vec<ScriptedPoll>) -> Self {
        self.script = script;
        self
    }

    pub fn with_request_upload_status(mut self, status: u16) -> Self {
        self.request_upload_status = status;
        self
    }

    pub fn with_upload_status(mut self, status: u16) -> Self {
        self.upload_status = status;
        self
    }

    pub fn with_download_status(mut self, status: u16) -> Self {
        self.download_status = status;
        self
    }

    pub fn with_meshes(mut self, meshes: Vec<RemoteMesh>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Number of status checks served
    pub fn status_checks(&self) -> usize {
        self.lock().polls_served
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not poison later assertions
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, call: MockCall) {
        self.lock().calls.push(call);
    }

    fn check(endpoint: &str, status: u16) -> Result<()> {
        if status == 200 {
            Ok(())
        } else {
            Err(TesseraError::status(endpoint, status))
        }
    }
}

impl TextureService for MockService {
    fn name(&self) -> &str {
        "mock"
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    fn current_user_id(&self) -> Result<String> {
        self.record(MockCall::CurrentUser);
        Ok(self.user_id.clone())
    }

    fn list_meshes(&self, user_id: &str) -> Result<Vec<RemoteMesh>> {
        self.record(MockCall::ListMeshes(user_id.to_string()));
        Ok(self.meshes.clone())
    }

    fn request_upload(&self, name: &str, extension: &str) -> Result<UploadTarget> {
        self.record(MockCall::RequestUpload {
            name: name.to_string(),
            extension: extension.to_string(),
        });
        Self::check("/models-3d/upload", self.request_upload_status)?;

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), format!("uploads/{}.{}", name, extension));
        Ok(UploadTarget {
            mesh_id: format!("mock-mesh-{}", uuid::Uuid::new_v4().simple()),
            url: "mock://storage".to_string(),
            fields,
        })
    }

    fn upload_file(&self, target: &UploadTarget, file: &Path) -> Result<u16> {
        let bytes = std::fs::metadata(file)?.len();
        self.record(MockCall::UploadFile {
            mesh_id: target.mesh_id.clone(),
            bytes,
        });
        Ok(self.upload_status)
    }

    fn submit_generation(&self, payload: &SubmissionPayload) -> Result<String> {
        self.record(MockCall::Submit(payload.clone()));
        Self::check("/generations-texture", self.submit_status)?;
        Ok(self.job_id.clone())
    }

    fn job_status(&self, job_id: &str) -> Result<JobStatusReport> {
        let index = {
            let mut state = self.lock();
            state.calls.push(MockCall::JobStatus(job_id.to_string()));
            state.polls_served += 1;
            state.polls_served - 1
        };

        let Some(last) = self.script.len().checked_sub(1) else {
            return Ok(JobStatusReport::pending());
        };
        match &self.script[index.min(last)] {
            ScriptedPoll::Report(report) => Ok(report.clone()),
            ScriptedPoll::Fail(code) => Err(TesseraError::status(
                &format!("/generations-texture/{}", job_id),
                *code,
            )),
        }
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.record(MockCall::Download(url.to_string()));
        Self::check(url, self.download_status)?;

        let color = match MapKind::from_filename(url) {
            Some(MapKind::Albedo) => [168, 120, 80],
            Some(MapKind::Normal) => [128, 128, 255],
            Some(MapKind::Roughness) => [200, 200, 200],
            Some(MapKind::Displacement) => [96, 96, 96],
            None => [255, 0, 255],
        };
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb(color));
        let mut encoded = Cursor::new(Vec::new());
        img.write_to(&mut encoded, image::ImageFormat::Jpeg)
            .map_err(|e| TesseraError::DownloadError(format!("Failed to encode JPEG: {}", e)))?;

        let bytes = encoded.into_inner();
        sink.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RemoteJobStatus;

    #[test]
    fn test_script_repeats_last_entry() {
        let service = MockService::new().with_statuses(vec![
            ScriptedPoll::Report(JobStatusReport::pending()),
            ScriptedPoll::Fail(503),
            ScriptedPoll::Report(JobStatusReport::complete(5, vec![])),
        ]);

        assert_eq!(
            service.job_status("j").unwrap().status,
            RemoteJobStatus::Pending
        );
        assert!(service.job_status("j").unwrap_err().is_transient());
        assert!(service.job_status("j").unwrap().is_complete());
        assert!(service.job_status("j").unwrap().is_complete());
        assert_eq!(service.status_checks(), 4);
    }

    #[test]
    fn test_download_produces_jpeg() {
        let service = MockService::new();
        let mut buf = Vec::new();
        let n = service.download("mock://a/x_albedo.jpg", &mut buf).unwrap();
        assert_eq!(n as usize, buf.len());
        assert_eq!(&buf[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_submit_status_error() {
        let service = MockService::new().with_submit_status(402);
        let payload = SubmissionPayload::new(&crate::params::GenerationParams::new("x"), "m", None);
        let err = service.submit_generation(&payload).unwrap_err();
        assert!(matches!(err, TesseraError::Status { code: 402, .. }));
        assert!(matches!(service.calls()[0], MockCall::Submit(_)));
    }
}
