//! Persistence of generated speech.
//!
//! Every successful generation is written once to
//! `<output_dir>/generated_<YYYYMMDD_HHMMSS>.wav`. Nothing else is stored.

mod store;

pub use store::{ArtifactInfo, OutputError, OutputStore, TIMESTAMP_FORMAT};
