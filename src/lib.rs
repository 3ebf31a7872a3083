// Re-export from sub-crates
pub use sotto_audio::{CaptureError, CaptureSession, Recording, SampleBlock, input_device_names};
pub use sotto_core::{
    APP_NAME, APP_NAME_PRETTY, CloseBehavior, Config, ConfigManager, DEFAULT_LOG_LEVEL, MicState,
};
pub use sotto_transcribe::{
    EngineHost, TranscribeError, Transcriber, WhisperEngine, WhisperModel,
};

// App-specific modules
pub mod event;
pub mod hotkey;
pub mod icon;
pub mod inject;
pub mod notify;
pub mod pipeline;
pub mod settings;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
