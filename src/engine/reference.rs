//! Staging of reference audio for voice cloning.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use super::request::ReferenceAudio;

/// Reference clip ready to hand to the model by path.
pub(crate) enum StagedReference {
    /// Caller-owned file, left untouched.
    Borrowed(PathBuf),
    /// Temporary copy of uploaded bytes, removed by [`StagedReference::cleanup`].
    Temporary(TempPath),
}

impl StagedReference {
    /// Write in-memory clips to a uniquely named `.wav` temp file.
    pub(crate) fn stage(reference: ReferenceAudio) -> std::io::Result<Self> {
        match reference {
            ReferenceAudio::Path(path) => Ok(StagedReference::Borrowed(path)),
            ReferenceAudio::Bytes(bytes) => {
                let mut file = tempfile::Builder::new()
                    .prefix("reference_")
                    .suffix(".wav")
                    .tempfile()?;
                file.write_all(&bytes)?;
                file.flush()?;

                let path = file.into_temp_path();
                debug!(path = %path.display(), bytes = bytes.len(), "staged reference audio");
                Ok(StagedReference::Temporary(path))
            }
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            StagedReference::Borrowed(path) => path,
            StagedReference::Temporary(path) => path,
        }
    }

    /// Delete the temp file, if any. Failures are logged, never returned.
    pub(crate) fn cleanup(self) {
        if let StagedReference::Temporary(path) = self {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "removed staged reference audio"),
                Err(e) => warn!(path = %shown, error = %e, "failed to remove staged reference audio"),
            }
        }
    }
}
