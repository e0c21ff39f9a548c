//! CLI argument definitions and parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::Device;
use crate::engine::{DeviceSelection, ReferenceAudio, UNSEEDED};

/// Voice synthesis and cloning with Chatterbox.
#[derive(Parser, Debug)]
#[command(name = "chatterbox-studio")]
#[command(about = "Voice synthesis and cloning front-ends for Chatterbox TTS")]
#[command(version)]
pub struct Args {
    /// Model host URL (overrides backend.url)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Directory generated audio is written to (overrides output.dir)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Extra config file, applied after the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate speech from the terminal
    Speak(SpeakArgs),

    /// Serve the web form
    Serve(ServeArgs),

    /// Show which compute devices the model host can use
    Devices,
}

#[derive(clap::Args, Debug)]
pub struct SpeakArgs {
    /// Text to synthesize
    #[arg(short, long)]
    pub text: String,

    /// Reference voice for cloning: a WAV path, or "-" to read it from stdin
    #[arg(short, long)]
    pub reference: Option<String>,

    /// Emotion intensity: 0 = flat, 0.5 = neutral, 2.0 = highly expressive
    #[arg(short, long, default_value_t = 0.5)]
    pub exaggeration: f32,

    /// Speech pacing: high = monotone, low = dynamic
    #[arg(short, long, default_value_t = 0.5)]
    pub cfg_weight: f32,

    /// Seed for reproducible output, -1 for random
    #[arg(short, long, default_value_t = UNSEEDED, allow_negative_numbers = true)]
    pub seed: i64,

    /// Compute device (defaults to model.device from config)
    #[arg(short, long, value_enum)]
    pub device: Option<DeviceChoice>,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Device selection on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceChoice {
    /// Best available: cuda, then mps, then cpu
    #[default]
    Auto,
    Cuda,
    Mps,
    Cpu,
}

impl From<DeviceChoice> for DeviceSelection {
    fn from(choice: DeviceChoice) -> Self {
        match choice {
            DeviceChoice::Auto => DeviceSelection::Auto,
            DeviceChoice::Cuda => DeviceSelection::Explicit(Device::Cuda),
            DeviceChoice::Mps => DeviceSelection::Explicit(Device::Mps),
            DeviceChoice::Cpu => DeviceSelection::Explicit(Device::Cpu),
        }
    }
}

/// Errors that can occur when resolving the reference argument.
#[derive(Error, Debug)]
pub enum ReferenceArgError {
    #[error("Audio file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read reference audio from stdin: {0}")]
    Stdin(#[from] std::io::Error),

    #[error("Reference audio from stdin is empty")]
    EmptyStdin,
}

/// Resolve the `--reference` argument.
///
/// `-` reads the clip from `stdin`; it is staged to a temporary file later.
/// Anything else must be an existing file and is passed by path.
///
/// # Examples
/// ```
/// use chatterbox_studio::cli::parse_reference;
/// let result = parse_reference("/nonexistent/voice.wav", std::io::empty());
/// assert!(result.is_err());
/// ```
pub fn parse_reference<R: std::io::Read>(
    input: &str,
    mut stdin: R,
) -> Result<ReferenceAudio, ReferenceArgError> {
    if input.trim() == "-" {
        let mut bytes = Vec::new();
        stdin.read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Err(ReferenceArgError::EmptyStdin);
        }
        return Ok(ReferenceAudio::Bytes(bytes));
    }

    let path = PathBuf::from(input.trim());
    if !path.is_file() {
        return Err(ReferenceArgError::FileNotFound(path));
    }

    Ok(ReferenceAudio::Path(path))
}
