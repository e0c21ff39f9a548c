//! Generation request handler.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, Device, GenerateRequest, ModelLoader, SpeechModel};
use crate::output::{OutputError, OutputStore};

use super::reference::StagedReference;
use super::request::{DeviceSelection, GenerationRequest, Mode, ReferenceAudio, ValidationError};

/// Source of the completion time used in artifact names.
pub type Clock = fn() -> DateTime<Local>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Failed to stage reference audio: {0}")]
    Reference(#[source] std::io::Error),

    #[error("Failed to save output: {0}")]
    Output(#[from] OutputError),
}

impl GenerationError {
    /// True when the request was rejected before anything ran.
    pub fn is_validation(&self) -> bool {
        matches!(self, GenerationError::Validation(_))
    }

    /// Status line shown to the user.
    pub fn status_message(&self) -> String {
        if self.is_validation() {
            format!("Error: {self}")
        } else {
            format!("Error generating speech: {self}")
        }
    }
}

/// Lifecycle of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    Rejected,
    Resolving,
    Generating,
    Persisting,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Rejected => "rejected",
            Stage::Resolving => "resolving",
            Stage::Generating => "generating",
            Stage::Persisting => "persisting",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful generation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedArtifact {
    pub path: PathBuf,
    pub duration_seconds: f32,
    pub mode: Mode,
    pub device: Device,
}

impl GeneratedArtifact {
    /// Status shown to the user on success.
    pub fn status_message(&self) -> String {
        format!(
            "Success! Generated speech with {}\n\nDuration: ~{:.2} seconds\n\nSaved to: {}",
            self.mode,
            self.duration_seconds,
            self.path.display()
        )
    }
}

struct LoadedModel {
    model: Box<dyn SpeechModel>,
    device: Device,
}

/// Turns requests into audio files.
///
/// Owns the model handle: it is loaded on the first request and reused until
/// [`GenerationHandler::reload`] or [`GenerationHandler::unload`] is called.
/// A later request naming another device does not reload it.
pub struct GenerationHandler<L: ModelLoader> {
    loader: L,
    outputs: OutputStore,
    model: Option<LoadedModel>,
    clock: Clock,
}

impl<L: ModelLoader> GenerationHandler<L> {
    /// Create a handler. The model is not loaded until first use.
    pub fn new(loader: L, outputs: OutputStore) -> Self {
        Self {
            loader,
            outputs,
            model: None,
            clock: Local::now,
        }
    }

    /// Replace the clock used for artifact names.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    /// Device of the loaded model, if any.
    pub fn loaded_device(&self) -> Option<Device> {
        self.model.as_ref().map(|m| m.device)
    }

    /// Ask the model host for the best device: cuda, then mps, then cpu.
    ///
    /// Falls back to cpu when the host cannot be probed.
    pub fn detect_device(&self) -> Device {
        match self.loader.probe() {
            Ok(health) => health.preferred_device(),
            Err(e) => {
                warn!(error = %e, "device probe failed, falling back to cpu");
                Device::Cpu
            }
        }
    }

    fn resolve_device(&self, selection: DeviceSelection) -> Device {
        match selection {
            DeviceSelection::Auto => self.detect_device(),
            DeviceSelection::Explicit(device) => device,
        }
    }

    /// Load the model on `selection` and swap it in.
    ///
    /// The current model stays in place if the new load fails.
    pub fn reload(&mut self, selection: DeviceSelection) -> Result<Device, GenerationError> {
        let loaded = self.load(selection)?;
        let device = loaded.device;
        if let Some(previous) = self.model.replace(loaded) {
            info!(from = %previous.device, to = %device, "model reloaded");
        }
        Ok(device)
    }

    /// Drop the loaded model. The next request loads it again.
    pub fn unload(&mut self) {
        if let Some(loaded) = self.model.take() {
            info!(device = %loaded.device, "model unloaded");
        }
    }

    /// Take the cached model out of its slot, loading it on first use.
    fn take_or_load(&mut self, selection: DeviceSelection) -> Result<LoadedModel, GenerationError> {
        if let Some(loaded) = self.model.take() {
            if let DeviceSelection::Explicit(requested) = selection
                && requested != loaded.device
            {
                warn!(
                    loaded = %loaded.device,
                    %requested,
                    "model already loaded on another device; reload to switch"
                );
            }
            return Ok(loaded);
        }

        self.load(selection)
    }

    fn load(&self, selection: DeviceSelection) -> Result<LoadedModel, GenerationError> {
        let device = self.resolve_device(selection);
        let model = self.loader.load(device)?;
        info!(%device, sample_rate = model.sample_rate(), "model loaded");
        Ok(LoadedModel { model, device })
    }

    /// Handle one request end to end.
    ///
    /// A temporary reference file created for the request is removed before
    /// returning, whatever the outcome.
    pub fn generate(
        &mut self,
        request: GenerationRequest,
    ) -> Result<GeneratedArtifact, GenerationError> {
        debug!(stage = %Stage::Validating, "handling request");
        let params = match request.validate() {
            Ok(params) => params,
            Err(e) => {
                debug!(stage = %Stage::Rejected, error = %e, "request rejected");
                return Err(e.into());
            }
        };

        let mode = request.mode();
        debug!(stage = %Stage::Resolving, device = %request.device, %mode, "resolving device");
        let loaded = match self.take_or_load(request.device) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(stage = %Stage::Failed, error = %e, "model unavailable");
                return Err(e);
            }
        };

        let result = self.run(&loaded, params, request.reference, mode);
        self.model = Some(loaded);

        match &result {
            Ok(artifact) => info!(
                stage = %Stage::Succeeded,
                path = %artifact.path.display(),
                duration = artifact.duration_seconds,
                %mode,
                "generated speech"
            ),
            Err(e) => warn!(stage = %Stage::Failed, error = %e, "generation failed"),
        }

        result
    }

    fn run(
        &self,
        loaded: &LoadedModel,
        mut params: GenerateRequest,
        reference: Option<ReferenceAudio>,
        mode: Mode,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let staged = reference
            .map(StagedReference::stage)
            .transpose()
            .map_err(GenerationError::Reference)?;
        params.audio_prompt_path = staged.as_ref().map(|s| s.path().to_path_buf());

        debug!(stage = %Stage::Generating, seeded = params.seed.is_some(), "invoking model");
        let result = loaded
            .model
            .generate(&params)
            .map_err(GenerationError::from)
            .and_then(|waveform| {
                debug!(stage = %Stage::Persisting, frames = waveform.frames(), "saving output");
                let path = self.outputs.save(&waveform, (self.clock)())?;
                Ok(GeneratedArtifact {
                    path,
                    duration_seconds: waveform.duration_seconds(),
                    mode,
                    device: loaded.device,
                })
            });

        if let Some(staged) = staged {
            staged.cleanup();
        }

        result
    }
}
