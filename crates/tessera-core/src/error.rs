//! Error types for Tessera

use thiserror::Error;

/// The main error type for Tessera operations
#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API key required: set TESSERA_API_KEY or add it to .tessera/config.toml")]
    MissingApiKey,

    #[error("A job is already running")]
    JobInProgress,

    #[error("No objects selected")]
    EmptySelection,

    #[error("No remote mesh is bound to the current selection")]
    NoMeshBound,

    #[error("Unknown remote mesh: {0}")]
    UnknownMesh(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("{endpoint} returned HTTP {code}")]
    Status { endpoint: String, code: u16 },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Mesh export error: {0}")]
    ExportError(String),

    #[error("Material binding error: {0}")]
    BindingError(String),

    #[error("Scene error: {0}")]
    SceneError(String),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Job {job_id} still not complete after {attempts} status checks")]
    PollExhausted { job_id: String, attempts: u32 },

    #[error("Generation failed remotely: {0}")]
    RemoteFailure(String),

    #[error("Cancelled")]
    Cancelled,
}

impl TesseraError {
    /// Build a status error for a named endpoint
    pub fn status(endpoint: impl Into<String>, code: u16) -> Self {
        TesseraError::Status {
            endpoint: endpoint.into(),
            code,
        }
    }

    /// Whether a status poll that failed this way is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            TesseraError::TransportError(_)
            | TesseraError::MalformedResponse(_)
            | TesseraError::IoError(_) => true,
            TesseraError::Status { code, .. } => matches!(code, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

impl From<toml::de::Error> for TesseraError {
    fn from(err: toml::de::Error) -> Self {
        TesseraError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for TesseraError {
    fn from(err: toml::ser::Error) -> Self {
        TesseraError::TomlSerError(err.to_string())
    }
}
