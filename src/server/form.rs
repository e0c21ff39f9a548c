//! Decoding the web form into a generation request.

use std::collections::HashMap;

use axum::extract::Multipart;
use thiserror::Error;

use crate::engine::{DeviceSelection, GenerationRequest, ReferenceAudio, UNSEEDED};

/// Name of the file input carrying the reference clip.
pub const REFERENCE_FIELD: &str = "reference_audio";

#[derive(Error, Debug, PartialEq)]
pub enum FormError {
    #[error("Malformed form data: {0}")]
    Multipart(String),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown device: {0}")]
    InvalidDevice(String),
}

/// Raw form submission.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub reference: Option<Vec<u8>>,
}

impl FormData {
    /// Drain a multipart body. Browsers send an empty file part when nothing
    /// was chosen; that counts as no reference.
    pub async fn read(mut multipart: Multipart) -> Result<Self, FormError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| FormError::Multipart(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == REFERENCE_FIELD {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| FormError::Multipart(e.to_string()))?;
                if !bytes.is_empty() {
                    form.reference = Some(bytes.to_vec());
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| FormError::Multipart(e.to_string()))?;
            form.fields.insert(name, value);
        }

        Ok(form)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn number<T: std::str::FromStr>(&self, field: &'static str) -> Result<Option<T>, FormError> {
        self.value(field)
            .map(|v| {
                v.parse().map_err(|_| FormError::InvalidNumber {
                    field,
                    value: v.to_string(),
                })
            })
            .transpose()
    }

    /// Seeds may arrive as "42" or "42.0"; fractions are rejected.
    fn seed(&self) -> Result<i64, FormError> {
        let Some(raw) = self.value("seed") else {
            return Ok(UNSEEDED);
        };

        if let Ok(seed) = raw.parse::<i64>() {
            return Ok(seed);
        }

        match raw.parse::<f64>() {
            Ok(seed) if seed.fract() == 0.0 && seed.abs() < i64::MAX as f64 => Ok(seed as i64),
            _ => Err(FormError::InvalidNumber {
                field: "seed",
                value: raw.to_string(),
            }),
        }
    }

    /// Build the request. Text is passed through untrimmed; the handler
    /// decides whether it is empty.
    pub fn into_request(self) -> Result<GenerationRequest, FormError> {
        let device = match self.value("device") {
            Some(raw) => raw
                .parse::<DeviceSelection>()
                .map_err(|_| FormError::InvalidDevice(raw.to_string()))?,
            None => DeviceSelection::Auto,
        };

        let mut request = GenerationRequest::new(self.fields.get("text").cloned().unwrap_or_default())
            .with_seed(self.seed()?)
            .with_device(device);

        if let Some(exaggeration) = self.number("exaggeration")? {
            request = request.with_exaggeration(exaggeration);
        }
        if let Some(cfg_weight) = self.number("cfg_weight")? {
            request = request.with_cfg_weight(cfg_weight);
        }
        request.temperature = self.number("temperature")?;
        request.flow_cfg_scale = self.number("flow_cfg_scale")?;
        request.max_new_tokens = self.number("max_new_tokens")?;
        request.reference = self.reference.map(ReferenceAudio::Bytes);

        Ok(request)
    }
}
