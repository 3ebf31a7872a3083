//! Audio capture for sotto.
//!
//! One capture session owns one input stream. The session is created and
//! driven on the hotkey listener thread; the audio backend's delivery
//! callback shares only the capturing flag and the block buffer with it.

mod capture;
mod samples;

pub use capture::{CaptureError, CaptureSession, input_device_names};
pub use samples::{Recording, SampleBlock};
