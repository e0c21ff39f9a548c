//! chatterbox-studio: Voice synthesis and cloning front-ends for Chatterbox TTS.
//!
//! Two thin front-ends, a terminal command and a web form, collect text plus
//! expressiveness settings and an optional reference clip, and hand them to a
//! single generation handler that talks to a Chatterbox model host.

pub mod audio;
pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod output;
pub mod server;
