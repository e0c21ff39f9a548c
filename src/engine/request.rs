//! Generation request and its validation.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::backend::{BackendError, Device, GenerateRequest};

pub const EXAGGERATION_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub const CFG_WEIGHT_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.1..=2.0;
pub const FLOW_CFG_SCALE_RANGE: RangeInclusive<f32> = 1.0..=5.0;
pub const MAX_NEW_TOKENS_RANGE: RangeInclusive<u32> = 512..=4096;

/// Seed value meaning "do not seed".
pub const UNSEEDED: i64 = -1;

/// Rejections raised before any resource is touched.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Please enter text to synthesize")]
    EmptyText,

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// Where the compute device comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// Probe the model host and take the best accelerator.
    #[default]
    Auto,
    Explicit(Device),
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::Auto => f.write_str("auto"),
            DeviceSelection::Explicit(device) => device.fmt(f),
        }
    }
}

impl FromStr for DeviceSelection {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(DeviceSelection::Auto);
        }
        s.parse().map(DeviceSelection::Explicit)
    }
}

impl From<Device> for DeviceSelection {
    fn from(device: Device) -> Self {
        DeviceSelection::Explicit(device)
    }
}

/// Reference clip for voice cloning.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceAudio {
    /// Already on disk; handed to the model as is.
    Path(PathBuf),
    /// Uploaded bytes; staged to a temporary file first.
    Bytes(Vec<u8>),
}

/// Whether the output imitates a reference speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    VoiceCloning,
    DefaultVoice,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::VoiceCloning => f.write_str("voice cloning"),
            Mode::DefaultVoice => f.write_str("default voice"),
        }
    }
}

/// One user request, as collected by a front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub reference: Option<ReferenceAudio>,
    pub exaggeration: f32,
    pub cfg_weight: f32,
    pub temperature: Option<f32>,
    pub flow_cfg_scale: Option<f32>,
    pub max_new_tokens: Option<u32>,
    pub seed: i64,
    pub device: DeviceSelection,
}

impl GenerationRequest {
    /// Create a request with default knobs, no reference and no seed.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference: None,
            exaggeration: 0.5,
            cfg_weight: 0.5,
            temperature: None,
            flow_cfg_scale: None,
            max_new_tokens: None,
            seed: UNSEEDED,
            device: DeviceSelection::Auto,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceAudio) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_exaggeration(mut self, exaggeration: f32) -> Self {
        self.exaggeration = exaggeration;
        self
    }

    pub fn with_cfg_weight(mut self, cfg_weight: f32) -> Self {
        self.cfg_weight = cfg_weight;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_flow_cfg_scale(mut self, flow_cfg_scale: f32) -> Self {
        self.flow_cfg_scale = Some(flow_cfg_scale);
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = Some(max_new_tokens);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_device(mut self, device: impl Into<DeviceSelection>) -> Self {
        self.device = device.into();
        self
    }

    pub fn mode(&self) -> Mode {
        if self.reference.is_some() {
            Mode::VoiceCloning
        } else {
            Mode::DefaultVoice
        }
    }

    /// Seed to attach to the model call. Only [`UNSEEDED`] leaves it off.
    pub fn resolved_seed(&self) -> Option<i64> {
        (self.seed != UNSEEDED).then_some(self.seed)
    }

    /// Check the request and build the parameters sent to the model.
    ///
    /// The reference clip is not attached here; it is staged separately.
    pub fn validate(&self) -> Result<GenerateRequest, ValidationError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        check_range("exaggeration", self.exaggeration, &EXAGGERATION_RANGE)?;
        check_range("cfg_weight", self.cfg_weight, &CFG_WEIGHT_RANGE)?;
        if let Some(temperature) = self.temperature {
            check_range("temperature", temperature, &TEMPERATURE_RANGE)?;
        }
        if let Some(scale) = self.flow_cfg_scale {
            check_range("flow_cfg_scale", scale, &FLOW_CFG_SCALE_RANGE)?;
        }
        if let Some(tokens) = self.max_new_tokens
            && !MAX_NEW_TOKENS_RANGE.contains(&tokens)
        {
            return Err(ValidationError::OutOfRange {
                name: "max_new_tokens",
                value: tokens as f32,
                min: *MAX_NEW_TOKENS_RANGE.start() as f32,
                max: *MAX_NEW_TOKENS_RANGE.end() as f32,
            });
        }

        Ok(GenerateRequest {
            text: text.to_string(),
            exaggeration: self.exaggeration,
            cfg_weight: self.cfg_weight,
            temperature: self.temperature,
            flow_cfg_scale: self.flow_cfg_scale,
            max_new_tokens: self.max_new_tokens,
            seed: self.resolved_seed(),
            audio_prompt_path: None,
        })
    }
}

fn check_range(
    name: &'static str,
    value: f32,
    range: &RangeInclusive<f32>,
) -> Result<(), ValidationError> {
    // NaN fails `contains` as well
    if range.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::OutOfRange {
        name,
        value,
        min: *range.start(),
        max: *range.end(),
    })
}
