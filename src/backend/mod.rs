//! Boundary to the pretrained Chatterbox model.
//!
//! The model runs out of process on a model host. This module defines the
//! two seams the rest of the crate talks to, the factory ([`ModelLoader`])
//! and the loaded handle ([`SpeechModel`]), plus their HTTP implementation.

mod client;
mod types;

pub use client::{HttpBackend, HttpModel};
pub use types::{
    BackendError, Device, GenerateRequest, HealthResponse, LoadRequest, LoadResponse,
};

use crate::audio::Waveform;

/// Factory for model handles.
///
/// Abstracts the model host so tests can substitute mocks.
#[cfg_attr(test, mockall::automock)]
pub trait ModelLoader: Send + Sync {
    /// Report which accelerators the model host can use.
    fn probe(&self) -> Result<HealthResponse, BackendError>;

    /// Load the model on `device`. Fails if the device is unavailable.
    fn load(&self, device: Device) -> Result<Box<dyn SpeechModel>, BackendError>;
}

/// A model resident on a device.
#[cfg_attr(test, mockall::automock)]
pub trait SpeechModel: Send {
    /// Sample rate the model declares for its output.
    fn sample_rate(&self) -> u32;

    /// Synthesize speech. Blocks until the model returns.
    fn generate(&self, request: &GenerateRequest) -> Result<Waveform, BackendError>;
}

/// Create a backend for the model host at `url`.
pub fn create_backend(url: &str) -> Result<HttpBackend, BackendError> {
    HttpBackend::new(url)
}
