//! Leonardo.ai texture generation provider
//!
//! REST client for the model-3d and texture-generation endpoints. Every
//! method is a single blocking request; retries and polling cadence are the
//! orchestrator's business.

use crate::config::TesseraConfig;
use crate::params::SubmissionPayload;
use crate::service::{JobStatusReport, RemoteJobStatus, TextureService, UploadTarget};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tessera_core::{RemoteMesh, Result, TesseraError};

/// Leonardo REST client
pub struct LeonardoClient {
    api_key: Option<String>,
    api_url: String,
    agent: ureq::Agent,
}

impl LeonardoClient {
    pub fn from_config(config: &TesseraConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout()))
            .http_status_as_error(false)
            .build();

        Self {
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            agent: agent_config.into(),
        }
    }

    fn bearer(&self) -> Result<String> {
        self.api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key))
            .ok_or(TesseraError::MissingApiKey)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn get_json(&self, path: &str) -> Result<String> {
        let auth = self.bearer()?;
        let response = self
            .agent
            .get(&self.endpoint(path))
            .header("accept", "application/json")
            .header("authorization", &auth)
            .call()
            .map_err(transport_error)?;
        read_ok_body(path, response)
    }

    fn post_json<T: serde::Serialize>(&self, path: &str, payload: &T) -> Result<String> {
        let auth = self.bearer()?;
        let response = self
            .agent
            .post(&self.endpoint(path))
            .header("accept", "application/json")
            .header("authorization", &auth)
            .send_json(payload)
            .map_err(transport_error)?;
        read_ok_body(path, response)
    }
}

impl TextureService for LeonardoClient {
    fn name(&self) -> &str {
        "leonardo"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn current_user_id(&self) -> Result<String> {
        let body = self.get_json("/me")?;
        parse_user_id(&body)
    }

    fn list_meshes(&self, user_id: &str) -> Result<Vec<RemoteMesh>> {
        let body = self.get_json(&format!("/models-3d/user/{}", user_id))?;
        parse_meshes(&body)
    }

    fn request_upload(&self, name: &str, extension: &str) -> Result<UploadTarget> {
        let payload = serde_json::json!({
            "name": name,
            "modelExtension": extension,
        });
        let body = self.post_json("/models-3d/upload", &payload)?;
        parse_upload_target(&body)
    }

    fn upload_file(&self, target: &UploadTarget, file: &Path) -> Result<u16> {
        let contents = std::fs::read(file)?;
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh.obj".to_string());

        let boundary = format!("tessera-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &target.fields, &filename, &contents);

        let response = self
            .agent
            .post(&target.url)
            .header(
                "content-type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send(&body[..])
            .map_err(transport_error)?;

        let code = response.status().as_u16();
        tracing::debug!(mesh_id = %target.mesh_id, code, bytes = contents.len(), "Storage upload answered");
        Ok(code)
    }

    fn submit_generation(&self, payload: &SubmissionPayload) -> Result<String> {
        let body = self.post_json("/generations-texture", payload)?;
        parse_job_id(&body)
    }

    fn job_status(&self, job_id: &str) -> Result<JobStatusReport> {
        let body = self.get_json(&format!("/generations-texture/{}", job_id))?;
        parse_job_status(&body)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let response = self.agent.get(url).call().map_err(transport_error)?;
        let code = response.status().as_u16();
        if code != 200 {
            return Err(TesseraError::status(url, code));
        }
        let mut reader = response.into_body().into_reader();
        let copied = std::io::copy(&mut reader, sink)?;
        Ok(copied)
    }
}

fn transport_error(e: ureq::Error) -> TesseraError {
    TesseraError::TransportError(e.to_string())
}

fn read_ok_body(endpoint: &str, mut response: ureq::http::Response<ureq::Body>) -> Result<String> {
    let code = response.status().as_u16();
    if code != 200 {
        return Err(TesseraError::status(endpoint, code));
    }
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| TesseraError::MalformedResponse(format!("{}: {}", endpoint, e)))
}

fn malformed(what: &str, e: serde_json::Error) -> TesseraError {
    TesseraError::MalformedResponse(format!("{}: {}", what, e))
}

#[derive(Deserialize)]
struct MeResponse {
    user_details: Vec<UserDetail>,
}

#[derive(Deserialize)]
struct UserDetail {
    user: UserRef,
}

#[derive(Deserialize)]
struct UserRef {
    id: String,
}

#[derive(Deserialize)]
struct MeshListResponse {
    #[serde(default)]
    model_assets: Vec<RemoteMesh>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    upload_model_asset: UploadModelAsset,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadModelAsset {
    model_id: String,
    model_url: String,
    /// JSON object encoded as a string
    model_fields: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    texture_generation_job: SubmittedJob,
}

#[derive(Deserialize)]
struct SubmittedJob {
    id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    model_asset_texture_generations_by_pk: Option<GenerationRecord>,
}

#[derive(Deserialize)]
struct GenerationRecord {
    status: String,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    model_asset_texture_images: Vec<TextureImage>,
}

#[derive(Deserialize)]
struct TextureImage {
    url: String,
}

pub fn parse_user_id(body: &str) -> Result<String> {
    let me: MeResponse = serde_json::from_str(body).map_err(|e| malformed("/me", e))?;
    me.user_details
        .into_iter()
        .next()
        .map(|d| d.user.id)
        .ok_or_else(|| TesseraError::MalformedResponse("/me: no user details".to_string()))
}

pub fn parse_meshes(body: &str) -> Result<Vec<RemoteMesh>> {
    let list: MeshListResponse =
        serde_json::from_str(body).map_err(|e| malformed("/models-3d/user", e))?;
    Ok(list.model_assets)
}

pub fn parse_upload_target(body: &str) -> Result<UploadTarget> {
    let response: UploadResponse =
        serde_json::from_str(body).map_err(|e| malformed("/models-3d/upload", e))?;
    let asset = response.upload_model_asset;
    let raw_fields: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&asset.model_fields).map_err(|e| malformed("modelFields", e))?;

    let fields = raw_fields
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect();

    Ok(UploadTarget {
        mesh_id: asset.model_id,
        url: asset.model_url,
        fields,
    })
}

pub fn parse_job_id(body: &str) -> Result<String> {
    let response: SubmitResponse =
        serde_json::from_str(body).map_err(|e| malformed("/generations-texture", e))?;
    Ok(response.texture_generation_job.id)
}

pub fn parse_job_status(body: &str) -> Result<JobStatusReport> {
    let response: StatusResponse =
        serde_json::from_str(body).map_err(|e| malformed("/generations-texture/{id}", e))?;
    let record = response.model_asset_texture_generations_by_pk.ok_or_else(|| {
        TesseraError::MalformedResponse("generation record missing".to_string())
    })?;

    Ok(JobStatusReport {
        status: RemoteJobStatus::parse(&record.status),
        seed: record.seed,
        images: record
            .model_asset_texture_images
            .into_iter()
            .map(|img| img.url)
            .collect(),
    })
}

/// `multipart/form-data` body: the form fields in order, then the file
/// under the `file` field
pub fn multipart_body(
    boundary: &str,
    fields: &BTreeMap<String, String>,
    filename: &str,
    contents: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(contents.len() + 256 * (fields.len() + 1));
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        let body = r#"{"user_details":[{"user":{"id":"u-123","username":"ana"},"tokenRenewalDate":null}]}"#;
        assert_eq!(parse_user_id(body).unwrap(), "u-123");
        assert!(parse_user_id(r#"{"user_details":[]}"#).is_err());
    }

    #[test]
    fn test_parse_meshes() {
        let body = r#"{"model_assets":[{"id":"m1","name":"Crate","createdAt":"2024"},{"id":"m2","name":"Barrel"}]}"#;
        let meshes = parse_meshes(body).unwrap();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[1].name, "Barrel");
    }

    #[test]
    fn test_parse_upload_target_decodes_field_string() {
        let body = r#"{"uploadModelAsset":{"modelId":"abc","modelUrl":"https://s3.example.com/bucket","modelFields":"{\"key\":\"uploads/abc.obj\",\"Policy\":\"p\"}"}}"#;
        let target = parse_upload_target(body).unwrap();
        assert_eq!(target.mesh_id, "abc");
        assert_eq!(target.url, "https://s3.example.com/bucket");
        assert_eq!(target.fields.get("key").map(String::as_str), Some("uploads/abc.obj"));
        assert_eq!(target.fields.len(), 2);
    }

    #[test]
    fn test_parse_job_id() {
        let body = r#"{"textureGenerationJob":{"id":"job1","apiCreditCost":10}}"#;
        assert_eq!(parse_job_id(body).unwrap(), "job1");
        assert!(matches!(
            parse_job_id(r#"{"error":"nope"}"#),
            Err(TesseraError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_job_status() {
        let pending = r#"{"model_asset_texture_generations_by_pk":{"status":"PENDING","seed":null,"model_asset_texture_images":[]}}"#;
        let report = parse_job_status(pending).unwrap();
        assert_eq!(report.status, RemoteJobStatus::Pending);
        assert_eq!(report.seed, None);

        let complete = r#"{"model_asset_texture_generations_by_pk":{"status":"COMPLETE","seed":42,
            "model_asset_texture_images":[{"url":"https://cdn/x_albedo.jpg","id":"i1"},{"url":"https://cdn/x_normal.jpg"}]}}"#;
        let report = parse_job_status(complete).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.seed, Some(42));
        assert_eq!(report.images, vec!["https://cdn/x_albedo.jpg", "https://cdn/x_normal.jpg"]);
    }

    #[test]
    fn test_multipart_body_layout() {
        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), "uploads/a.obj".to_string());
        let body = multipart_body("XYZ", &fields, "tmp.obj", b"v 0 0 0\n");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"key\"\r\n\r\nuploads/a.obj\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"tmp.obj\""));
        assert!(text.ends_with("v 0 0 0\n\r\n--XYZ--\r\n"));
    }

    #[test]
    fn test_missing_key_fails_before_network() {
        let client = LeonardoClient::from_config(&TesseraConfig {
            api_key: Some("  ".to_string()),
            ..TesseraConfig::default()
        });
        assert!(!client.has_credentials());
        assert!(matches!(
            client.current_user_id(),
            Err(TesseraError::MissingApiKey)
        ));
    }
}
