//! Model host request/response types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when communicating with the model host.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),
}

/// Compute device the model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Mps,
    Cpu,
}

impl Device {
    /// All devices in preference order.
    pub const PREFERENCE: [Device; 3] = [Device::Cuda, Device::Mps, Device::Cpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cuda" => Ok(Device::Cuda),
            "mps" => Ok(Device::Mps),
            "cpu" => Ok(Device::Cpu),
            other => Err(BackendError::UnknownDevice(other.to_string())),
        }
    }
}

/// Health check response from the model host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub cuda_available: bool,
    #[serde(default)]
    pub mps_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl HealthResponse {
    /// Best available device: cuda, then mps, then cpu.
    pub fn preferred_device(&self) -> Device {
        if self.cuda_available {
            Device::Cuda
        } else if self.mps_available {
            Device::Mps
        } else {
            Device::Cpu
        }
    }
}

/// Body of the model factory call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub device: Device,
}

/// Model host reply once a model is resident on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub device: Device,
    pub sample_rate: u32,
}

/// Parameters for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    pub exaggeration: f32,
    pub cfg_weight: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_cfg_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    /// Seeds a generator scoped to this call only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Reference clip for voice cloning, uploaded as a separate part.
    #[serde(skip)]
    pub audio_prompt_path: Option<std::path::PathBuf>,
}

impl GenerateRequest {
    /// Create a new request with default expressiveness and pacing.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exaggeration: 0.5,
            cfg_weight: 0.5,
            temperature: None,
            flow_cfg_scale: None,
            max_new_tokens: None,
            seed: None,
            audio_prompt_path: None,
        }
    }

    pub fn with_exaggeration(mut self, exaggeration: f32) -> Self {
        self.exaggeration = exaggeration;
        self
    }

    pub fn with_cfg_weight(mut self, cfg_weight: f32) -> Self {
        self.cfg_weight = cfg_weight;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_audio_prompt(mut self, path: std::path::PathBuf) -> Self {
        self.audio_prompt_path = Some(path);
        self
    }
}
