//! Audio buffers exchanged with the model host and written to disk.

mod waveform;

pub use waveform::{AudioError, Waveform};
