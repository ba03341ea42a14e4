//! Generation request parameters and the submission payload

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_core::TesseraError;

/// Which way the model faces, as a rotation offset sent to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FacingDirection {
    #[serde(rename = "-x")]
    NegX,
    #[default]
    #[serde(rename = "-y")]
    NegY,
    #[serde(rename = "x")]
    PosX,
    #[serde(rename = "y")]
    PosY,
}

impl FacingDirection {
    pub fn degrees(&self) -> f32 {
        match self {
            FacingDirection::NegX => -90.0,
            FacingDirection::NegY => 0.0,
            FacingDirection::PosX => 90.0,
            FacingDirection::PosY => 180.0,
        }
    }
}

impl FromStr for FacingDirection {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-x" | "-90" => Ok(FacingDirection::NegX),
            "-y" | "0" => Ok(FacingDirection::NegY),
            "x" | "90" => Ok(FacingDirection::PosX),
            "y" | "180" => Ok(FacingDirection::PosY),
            other => Err(TesseraError::ConfigError(format!(
                "Unknown facing direction '{}'. Expected -x, -y, x or y",
                other
            ))),
        }
    }
}

/// Generation model version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelVersion {
    #[serde(rename = "v1_5")]
    V1_5,
    #[default]
    #[serde(rename = "v2")]
    V2,
}

impl ModelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V1_5 => "v1_5",
            ModelVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVersion {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1_5" | "v1" => Ok(ModelVersion::V1_5),
            "v2" => Ok(ModelVersion::V2),
            other => Err(TesseraError::ConfigError(format!(
                "Unknown model version '{}'. Expected v1_5 or v2",
                other
            ))),
        }
    }
}

/// Camera direction for a single-view preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewDirection {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

impl FromStr for PreviewDirection {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front" => Ok(PreviewDirection::Front),
            "back" => Ok(PreviewDirection::Back),
            "left" => Ok(PreviewDirection::Left),
            "right" => Ok(PreviewDirection::Right),
            other => Err(TesseraError::ConfigError(format!(
                "Unknown preview direction '{}'. Expected front, back, left or right",
                other
            ))),
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    /// Zero lets the service pick a seed
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub facing: FacingDirection,
    #[serde(default)]
    pub model: ModelVersion,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Immutable body of a job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub prompt: String,
    pub front_rotation_offset: f32,
    pub sd_version: ModelVersion,
    #[serde(rename = "modelAssetId")]
    pub model_asset_id: String,
    pub preview: bool,
    pub preview_direction: PreviewDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl SubmissionPayload {
    /// Build the payload for a full job (`preview = None`) or a preview
    pub fn new(
        params: &GenerationParams,
        mesh_id: &str,
        preview: Option<PreviewDirection>,
    ) -> Self {
        Self {
            prompt: params.prompt.clone(),
            front_rotation_offset: params.facing.degrees(),
            sd_version: params.model,
            model_asset_id: mesh_id.to_string(),
            preview: preview.is_some(),
            preview_direction: preview.unwrap_or_default(),
            seed: (params.seed > 0).then_some(params.seed),
            negative_prompt: (!params.negative_prompt.is_empty())
                .then(|| params.negative_prompt.clone()),
        }
    }
}
