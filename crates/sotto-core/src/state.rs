//! Microphone/recording state types.

/// The current state of the microphone/recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    /// Idle, not recording
    Idle,
    /// Actively recording audio (hotkey held)
    Recording,
    /// Processing recorded audio (transcribing)
    Processing,
}
