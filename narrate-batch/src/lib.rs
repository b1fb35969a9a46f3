//! narrate-batch library
//!
//! Batch text-to-speech: split text documents into chunks, synthesize each
//! chunk through a speech service and join the audio back into one file per
//! document.

pub mod lifecycle;
pub mod models;
pub mod services;
pub mod settings;

pub use settings::Settings;
