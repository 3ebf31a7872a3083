//! Local Whisper engine using whisper-rs.
//!
//! Transcription runs through the whisper.cpp library via whisper-rs
//! bindings. Loading is eager: a successfully constructed engine always
//! holds a usable context, which is what lets the host swap models only
//! after a replacement loaded.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::model::WhisperModel;
use crate::{Result, TranscribeError, Transcriber};

/// A loaded whisper.cpp model.
pub struct WhisperEngine {
    model: WhisperModel,
    context: WhisperContext,
}

impl WhisperEngine {
    /// Loads the model file into a ready-to-use engine.
    pub fn load(model: WhisperModel, path: &Path) -> Result<Self> {
        info!(model = %model, path = ?path, "Loading Whisper model");

        let path_str = path
            .to_str()
            .ok_or_else(|| TranscribeError::ModelLoad(format!("invalid model path: {path:?}")))?;

        let context =
            WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
                .map_err(|e| TranscribeError::ModelLoad(e.to_string()))?;

        info!(model = %model, "Whisper model loaded successfully");
        Ok(Self { model, context })
    }

    pub fn model(&self) -> WhisperModel {
        self.model
    }
}

#[async_trait]
impl Transcriber for WhisperEngine {
    async fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String> {
        // Each transcription gets its own state; the context itself is
        // never mutated after load.
        let mut state = self.context.create_state().map_err(|e| {
            TranscribeError::TranscriptionFailed(format!("Failed to create state: {}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // None lets whisper auto-detect the language
        params.set_language(language);

        // Disable printing to stdout
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::TranscriptionFailed(format!("Inference failed: {}", e)))?;

        let num_segments = state.full_n_segments().map_err(|e| {
            TranscribeError::TranscriptionFailed(format!("Failed to get segments: {}", e))
        })?;

        let mut result = String::new();
        for i in 0..num_segments {
            let segment = state.full_get_segment_text(i).map_err(|e| {
                TranscribeError::TranscriptionFailed(format!("Failed to get segment {}: {}", i, e))
            })?;
            result.push_str(&segment);
        }

        Ok(result.trim().to_string())
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}
