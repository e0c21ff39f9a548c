//! Output directory for generated audio.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::audio::{AudioError, Waveform};

/// Timestamp layout used in artifact file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ARTIFACT_PREFIX: &str = "generated_";

/// Errors that can occur while storing or looking up artifacts.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to write audio: {0}")]
    Audio(#[from] AudioError),
}

/// A generated file on disk.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArtifactInfo {
    pub name: String,
    pub path: PathBuf,
    pub created_at: Option<NaiveDateTime>,
}

/// Manages the output directory.
#[derive(Debug, Clone)]
pub struct OutputStore {
    output_dir: PathBuf,
}

impl OutputStore {
    /// Create a store rooted at `output_dir`. Nothing is touched on disk.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Get the output directory path.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone()
    }

    /// Create the output directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<(), OutputError> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Path an artifact completed at `at` is written to.
    ///
    /// Second precision: two artifacts finished within the same second share
    /// a path and the later one wins.
    pub fn artifact_path(&self, at: DateTime<Local>) -> PathBuf {
        self.output_dir.join(format!(
            "{ARTIFACT_PREFIX}{}.wav",
            at.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Write `waveform` to the artifact path for `at`.
    pub fn save(&self, waveform: &Waveform, at: DateTime<Local>) -> Result<PathBuf, OutputError> {
        self.ensure_dir()?;

        let path = self.artifact_path(at);
        waveform.write_wav(&path)?;

        Ok(path)
    }

    /// Validate an artifact file name.
    fn validate_name(name: &str) -> Result<(), OutputError> {
        if name.is_empty() {
            return Err(OutputError::InvalidName("Name cannot be empty".to_string()));
        }

        // Prevent path traversal
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(OutputError::InvalidName(
                "Name cannot contain path separators".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve an artifact file name to its path inside the output directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, OutputError> {
        Self::validate_name(name)?;

        let path = self.output_dir.join(name);

        if !path.is_file() {
            return Err(OutputError::NotFound(name.to_string()));
        }

        Ok(path)
    }

    /// List `.wav` artifacts, newest first.
    pub fn list(&self) -> Result<Vec<ArtifactInfo>, OutputError> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();

        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.extension().is_some_and(|ext| ext == "wav") {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };

            artifacts.push(ArtifactInfo {
                created_at: parse_timestamp(&name),
                name,
                path,
            });
        }

        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.name.cmp(&a.name)));

        Ok(artifacts)
    }
}

/// Recover the completion time encoded in an artifact name.
fn parse_timestamp(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(ARTIFACT_PREFIX)?.strip_suffix(".wav")?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}
