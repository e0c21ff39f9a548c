//! Runtime configuration.

mod settings;

pub use settings::{BackendSettings, ModelSettings, OutputSettings, ServerSettings, Settings};
