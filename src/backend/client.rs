//! HTTP client for the model host.

use reqwest::blocking::{Client, Response, multipart};
use tracing::debug;

use crate::audio::Waveform;

use super::types::{BackendError, Device, GenerateRequest, HealthResponse, LoadRequest, LoadResponse};
use super::{ModelLoader, SpeechModel};

/// HTTP-based model factory.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    /// Create a new client for the model host at `url`.
    ///
    /// Generation can take minutes, so the client never times out.
    pub fn new(url: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Turn a non-2xx reply into an error carrying the host's own message.
fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        Err(BackendError::RequestFailed(format!("Status: {status}")))
    } else {
        Err(BackendError::RequestFailed(format!("{status}: {body}")))
    }
}

impl ModelLoader for HttpBackend {
    fn probe(&self) -> Result<HealthResponse, BackendError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        check_status(response)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn load(&self, device: Device) -> Result<Box<dyn SpeechModel>, BackendError> {
        let url = format!("{}/load", self.base_url);
        debug!(%device, "requesting model load");

        let response = self
            .client
            .post(&url)
            .json(&LoadRequest { device })
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let loaded: LoadResponse = check_status(response)?
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        debug!(device = %loaded.device, sample_rate = loaded.sample_rate, "model host loaded model");

        Ok(Box::new(HttpModel {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            sample_rate: loaded.sample_rate,
        }))
    }
}

/// Handle to a model loaded on the model host.
pub struct HttpModel {
    base_url: String,
    client: Client,
    sample_rate: u32,
}

impl SpeechModel for HttpModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Waveform, BackendError> {
        let url = format!("{}/generate", self.base_url);

        let params = serde_json::to_string(request)
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;
        let params_part = multipart::Part::text(params)
            .mime_str("application/json")
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        let mut form = multipart::Form::new().part("params", params_part);

        if let Some(path) = &request.audio_prompt_path {
            let audio_data = std::fs::read(path)
                .map_err(|_| BackendError::FileNotFound(path.display().to_string()))?;

            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("reference.wav");

            let file_part = multipart::Part::bytes(audio_data)
                .file_name(file_name.to_string())
                .mime_str("audio/wav")
                .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

            form = form.part("audio_prompt", file_part);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let bytes = check_status(response)?
            .bytes()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let waveform = Waveform::from_wav_bytes(&bytes)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if waveform.sample_rate != self.sample_rate {
            debug!(
                declared = self.sample_rate,
                returned = waveform.sample_rate,
                "model returned a different sample rate than declared at load"
            );
        }

        Ok(waveform)
    }
}
