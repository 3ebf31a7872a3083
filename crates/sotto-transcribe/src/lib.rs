//! Transcription backend library for sotto.
//!
//! A `Transcriber` turns normalized audio into text. The production engine
//! wraps whisper.cpp; `EngineHost` owns the one resident engine and the
//! swap protocol used when the user picks a different model tier.

mod engine;
mod host;
mod model;

use async_trait::async_trait;
pub use engine::WhisperEngine;
pub use host::EngineHost;
pub use model::{WhisperModel, download_model, ensure_model, model_exists, model_path};
use thiserror::Error;

/// Errors that can occur during model loading and transcription.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Result type for transcription operations.
pub type Result<T> = std::result::Result<T, TranscribeError>;

/// Trait for transcription engines.
///
/// Exactly one engine is resident at a time; it is replaced through
/// `EngineHost`, never mutated in place.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe normalized mono samples (f32 in [-1, 1]) to text.
    ///
    /// `language` is an ISO 639-1 hint; None lets the engine auto-detect.
    async fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String>;

    /// Returns the name of the resident model for logging and display.
    fn name(&self) -> &str;
}
