//! CLI argument parsing and validation.

mod args;

pub use args::{
    Args, Command, DeviceChoice, ReferenceArgError, ServeArgs, SpeakArgs, parse_reference,
};
