//! Microphone capture session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, StreamConfig};
use parking_lot::{Mutex, RwLock};
use sotto_core::Config;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::samples::{Recording, SampleBlock};

/// Errors that can occur while opening or running a capture stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("input device #{0} not found")]
    DeviceNotFound(usize),

    #[error("unsupported sample format: {0:?}")]
    SampleFormatNotSupported(SampleFormat),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query device configuration: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to open input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

struct ActiveStream {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

/// Owns at most one open input stream and the buffer it fills.
///
/// `start` is idempotent while capturing, so duplicate start requests are
/// harmless. Device and sample rate are read from config at each `start`;
/// changing them mid-capture never reconfigures the active stream, the new
/// values simply apply to the next session.
pub struct CaptureSession {
    host: cpal::Host,
    config: Arc<RwLock<Config>>,
    capturing: Arc<AtomicBool>,
    blocks: Arc<Mutex<Vec<SampleBlock>>>,
    active: Option<ActiveStream>,
}

impl CaptureSession {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self {
            host: cpal::default_host(),
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            blocks: Arc::new(Mutex::new(Vec::new())),
            active: None,
        }
    }

    /// One consistent snapshot of the stream parameters. A concurrent
    /// config update must not tear device index and sample rate apart.
    fn requested_params(&self) -> (Option<usize>, u32) {
        let config = self.config.read();
        (config.microphone_device, config.sample_rate)
    }

    /// Label for the configured device, for error reporting.
    pub fn device_label(&self) -> String {
        self.config.read().device_label()
    }

    /// Checks that the configured device resolves and reports an input
    /// configuration, without opening a stream. Run once at startup so a
    /// broken device is reported before the first recording attempt.
    pub fn probe(&self) -> Result<(), CaptureError> {
        let (device_index, _) = self.requested_params();
        let device = resolve_device(&self.host, device_index)?;
        device.default_input_config()?;
        Ok(())
    }

    /// Opens the input stream and starts accumulating blocks.
    ///
    /// No-op if a capture is already running.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.capturing.load(Ordering::Relaxed) {
            debug!("capture already active, ignoring start");
            return Ok(());
        }

        let (device_index, sample_rate) = self.requested_params();
        let device = resolve_device(&self.host, device_index)?;
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let sample_format = device.default_input_config()?.sample_format();

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        self.blocks.lock().clear();
        self.capturing.store(true, Ordering::Relaxed);

        let started = self
            .build_stream(&device, &stream_config, sample_format)
            .and_then(|stream| {
                stream.play()?;
                Ok(stream)
            });

        let stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                self.capturing.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        info!(
            device = %device_name,
            sample_rate,
            format = ?sample_format,
            "capture started"
        );
        self.active = Some(ActiveStream {
            stream,
            sample_rate,
            channels: stream_config.channels,
        });
        Ok(())
    }

    /// Ends the capture and returns the accumulated audio.
    ///
    /// The capturing flag is cleared first so blocks delivered during
    /// teardown are discarded, then the stream is released. Returns None if
    /// nothing was being captured.
    pub fn stop(&mut self) -> Option<Recording> {
        if !self.capturing.swap(false, Ordering::Relaxed) {
            return None;
        }

        let Some(active) = self.active.take() else {
            self.blocks.lock().clear();
            return None;
        };

        if let Err(e) = active.stream.pause() {
            // The buffer is still handed off; the stream is dropped either way.
            warn!("Failed to stop audio stream: {}", e);
        }
        drop(active.stream);

        let blocks = std::mem::take(&mut *self.blocks.lock());
        debug!(blocks = blocks.len(), "capture stopped");
        Some(Recording::new(active.sample_rate, active.channels, blocks))
    }

    fn build_stream(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
        format: SampleFormat,
    ) -> Result<cpal::Stream, CaptureError> {
        let stream = match format {
            SampleFormat::U8 => self.input_stream(device, config, SampleBlock::U8)?,
            SampleFormat::I16 => self.input_stream(device, config, SampleBlock::I16)?,
            SampleFormat::I32 => self.input_stream(device, config, SampleBlock::I32)?,
            SampleFormat::F32 => self.input_stream(device, config, SampleBlock::F32)?,
            other => return Err(CaptureError::SampleFormatNotSupported(other)),
        };
        Ok(stream)
    }

    fn input_stream<T>(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
        wrap: fn(Vec<T>) -> SampleBlock,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + Send + 'static,
    {
        let capturing = self.capturing.clone();
        let blocks = self.blocks.clone();
        device.build_input_stream::<T, _, _>(
            config,
            move |data, _| {
                if !capturing.load(Ordering::Relaxed) {
                    return;
                }
                deliver(&capturing, &blocks, wrap(data.to_vec()));
            },
            |e| warn!("audio stream error: {}", e),
            None,
        )
    }
}

/// Appends one copied block, unless capture has been stopped in the
/// meantime. Runs on the audio delivery thread: no I/O, no allocation
/// beyond the block itself, one short lock.
fn deliver(capturing: &AtomicBool, blocks: &Mutex<Vec<SampleBlock>>, block: SampleBlock) {
    if !capturing.load(Ordering::Relaxed) {
        return;
    }
    blocks.lock().push(block);
}

fn resolve_device(host: &cpal::Host, index: Option<usize>) -> Result<cpal::Device, CaptureError> {
    match index {
        None => host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice),
        Some(index) => host
            .input_devices()?
            .nth(index)
            .ok_or(CaptureError::DeviceNotFound(index)),
    }
}

/// Input device names in index order, for the device picker.
pub fn input_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices
            .map(|d| d.name().unwrap_or_else(|_| "<unknown>".to_string()))
            .collect(),
        Err(e) => {
            warn!("Failed to enumerate input devices: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_change_applies_to_next_start() {
        let config = Arc::new(RwLock::new(Config::default()));
        let session = CaptureSession::new(config.clone());
        assert_eq!(session.requested_params(), (None, 16000));

        {
            let mut config = config.write();
            config.microphone_device = Some(2);
            config.sample_rate = 44100;
        }
        assert_eq!(session.requested_params(), (Some(2), 44100));
    }

    #[test]
    fn test_delivery_gated_on_capturing_flag() {
        let capturing = AtomicBool::new(false);
        let blocks = Mutex::new(Vec::new());

        deliver(&capturing, &blocks, SampleBlock::F32(vec![0.1]));
        assert!(blocks.lock().is_empty());

        capturing.store(true, Ordering::Relaxed);
        deliver(&capturing, &blocks, SampleBlock::F32(vec![0.1, 0.2]));
        deliver(&capturing, &blocks, SampleBlock::F32(vec![0.3]));
        assert_eq!(blocks.lock().len(), 2);

        // Late blocks after stop are discarded
        capturing.store(false, Ordering::Relaxed);
        deliver(&capturing, &blocks, SampleBlock::F32(vec![0.4]));
        assert_eq!(blocks.lock().len(), 2);
    }

    #[test]
    fn test_stop_without_start_returns_none() {
        let config = Arc::new(RwLock::new(Config::default()));
        let mut session = CaptureSession::new(config);
        assert!(session.stop().is_none());
    }
}
