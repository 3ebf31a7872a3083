//! Model management for local Whisper transcription.
//!
//! This module handles downloading, locating, and naming Whisper models.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sotto_core::models_dir;
use tracing::{info, warn};

/// Base URL for downloading Whisper models from Hugging Face.
const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Available Whisper model tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    /// 39M parameters, fastest, least accurate
    Tiny,
    /// 74M parameters, the recommended default
    Base,
    /// 244M parameters
    Small,
    /// 769M parameters
    Medium,
    /// 1550M parameters, most accurate, slowest
    Large,
}

impl WhisperModel {
    /// All tiers, in menu order.
    pub const ALL: [WhisperModel; 5] = [
        Self::Tiny,
        Self::Base,
        Self::Small,
        Self::Medium,
        Self::Large,
    ];

    /// Returns the tier name as stored in config.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Returns the filename for this model.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Tiny => "ggml-tiny.bin",
            Self::Base => "ggml-base.bin",
            Self::Small => "ggml-small.bin",
            Self::Medium => "ggml-medium.bin",
            Self::Large => "ggml-large-v3.bin",
        }
    }

    /// Returns the download URL for this model.
    pub fn url(&self) -> String {
        format!("{}/{}", MODEL_BASE_URL, self.filename())
    }

    /// Returns the approximate size of this model in bytes, used for
    /// progress reporting when the server does not send a length.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::Tiny => 77_700_000,
            Self::Base => 148_000_000,
            Self::Small => 488_000_000,
            Self::Medium => 1_530_000_000,
            Self::Large => 3_100_000_000,
        }
    }

    /// Returns a human-readable size string.
    pub fn size_human(&self) -> &'static str {
        match self {
            Self::Tiny => "~78 MB",
            Self::Base => "~148 MB",
            Self::Small => "~488 MB",
            Self::Medium => "~1.5 GB",
            Self::Large => "~3.1 GB",
        }
    }

    /// Short description for the model picker.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Tiny => "39M params, ~32x realtime",
            Self::Base => "74M params, ~16x realtime (recommended)",
            Self::Small => "244M params, ~6x realtime",
            Self::Medium => "769M params, ~2x realtime",
            Self::Large => "1550M params, ~1x realtime",
        }
    }

    /// Parses a tier name into a WhisperModel.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "tiny" => Some(Self::Tiny),
            "base" => Some(Self::Base),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" | "large-v3" => Some(Self::Large),
            _ => None,
        }
    }

    /// Returns the default model (base).
    pub fn default_model() -> Self {
        Self::Base
    }
}

impl Default for WhisperModel {
    fn default() -> Self {
        Self::default_model()
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the path where a model should be stored.
pub fn model_path(model: WhisperModel) -> Result<PathBuf> {
    Ok(models_dir()?.join(model.filename()))
}

/// Checks if a model exists locally.
pub fn model_exists(model: WhisperModel) -> Result<bool> {
    let path = model_path(model)?;
    Ok(path.exists())
}

/// Downloads a model to the local models directory.
///
/// The `progress_callback` is called per chunk with (bytes_downloaded,
/// total_bytes).
pub async fn download_model<F>(model: WhisperModel, progress_callback: F) -> Result<PathBuf>
where
    F: Fn(u64, u64) + Send + 'static,
{
    let path = model_path(model)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create models directory: {:?}", parent))?;
    }

    let url = model.url();
    info!(model = %model, url = %url, "Downloading Whisper model");

    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download model: HTTP {}", response.status());
    }

    let total_size = response.content_length().unwrap_or(model.size_bytes());

    // Download to a temporary file first, then rename
    let temp_path = path.with_extension("bin.tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    use futures_util::StreamExt;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| "Failed to read chunk during download")?;
        file.write_all(&chunk)
            .with_context(|| "Failed to write chunk to file")?;
        downloaded += chunk.len() as u64;
        progress_callback(downloaded, total_size);
    }

    file.flush().with_context(|| "Failed to flush file")?;
    drop(file);

    fs::rename(&temp_path, &path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    info!(path = ?path, "Model download complete");
    Ok(path)
}

/// Ensures a model is available locally, downloading it if necessary.
///
/// Returns the path to the model file.
pub async fn ensure_model<F>(model: WhisperModel, progress_callback: F) -> Result<PathBuf>
where
    F: Fn(u64, u64) + Send + 'static,
{
    if model_exists(model)? {
        info!(model = %model, "Model already exists locally");
        return model_path(model);
    }

    warn!(
        model = %model,
        size = model.size_human(),
        "Model not found locally, downloading..."
    );

    download_model(model, progress_callback).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_name() {
        assert_eq!(WhisperModel::from_name("base"), Some(WhisperModel::Base));
        assert_eq!(WhisperModel::from_name("TINY"), Some(WhisperModel::Tiny));
        assert_eq!(
            WhisperModel::from_name("large-v3"),
            Some(WhisperModel::Large)
        );
        assert_eq!(WhisperModel::from_name("invalid"), None);
    }

    #[test]
    fn test_model_names_round_trip() {
        for model in WhisperModel::ALL {
            assert_eq!(WhisperModel::from_name(model.name()), Some(model));
        }
    }

    #[test]
    fn test_model_urls() {
        let model = WhisperModel::Base;
        assert!(model.url().contains("ggml-base.bin"));
        assert!(model.url().starts_with("https://"));
        // The large tier points at the v3 weights
        assert!(WhisperModel::Large.url().contains("ggml-large-v3.bin"));
    }
}
