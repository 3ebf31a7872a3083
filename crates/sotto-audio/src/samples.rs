//! Raw capture buffers and sample normalization.

use std::time::Duration;

/// One block of samples as delivered by the audio backend, in the stream's
/// native encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBlock {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl SampleBlock {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A finished capture: the blocks in delivery order plus the stream
/// parameters they were recorded with.
#[derive(Debug, Clone)]
pub struct Recording {
    sample_rate: u32,
    channels: u16,
    blocks: Vec<SampleBlock>,
}

impl Recording {
    pub fn new(sample_rate: u32, channels: u16, blocks: Vec<SampleBlock>) -> Self {
        Self {
            sample_rate,
            channels,
            blocks,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total number of raw samples across all blocks and channels.
    pub fn sample_count(&self) -> usize {
        self.blocks.iter().map(SampleBlock::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    pub fn duration(&self) -> Duration {
        let frames = self.sample_count() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }

    /// Concatenates the blocks in delivery order and normalizes them to
    /// f32 in [-1, 1]: i16 divides by 32768, i32 by 2^31, u8 subtracts 128
    /// then divides by 128, f32 passes through. No silence is inserted for
    /// missed delivery periods. Multi-channel audio keeps only the first
    /// channel.
    pub fn into_samples(self) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.sample_count());
        for block in &self.blocks {
            match block {
                SampleBlock::U8(v) => {
                    samples.extend(v.iter().map(|&s| (s as f32 - 128.0) / 128.0));
                }
                SampleBlock::I16(v) => {
                    samples.extend(v.iter().map(|&s| s as f32 / 32768.0));
                }
                SampleBlock::I32(v) => {
                    samples.extend(v.iter().map(|&s| s as f32 / 2_147_483_648.0));
                }
                SampleBlock::F32(v) => samples.extend_from_slice(v),
            }
        }

        if self.channels > 1 {
            let channels = self.channels as usize;
            samples.into_iter().step_by(channels).collect()
        } else {
            samples
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn test_i16_normalization() {
        let recording = Recording::new(16000, 1, vec![SampleBlock::I16(vec![100, 200, 300, -100])]);
        let samples = recording.into_samples();
        let expected = [100.0, 200.0, 300.0, -100.0].map(|v: f32| v / 32768.0);
        assert_eq!(samples.len(), expected.len());
        for (got, want) in samples.iter().zip(expected) {
            assert!(close(*got, want), "{got} != {want}");
        }
    }

    #[test]
    fn test_u8_normalization() {
        let recording = Recording::new(16000, 1, vec![SampleBlock::U8(vec![128, 0, 255])]);
        let samples = recording.into_samples();
        assert!(close(samples[0], 0.0));
        assert!(close(samples[1], -1.0));
        assert!(close(samples[2], 127.0 / 128.0));
    }

    #[test]
    fn test_i32_normalization() {
        let recording = Recording::new(
            16000,
            1,
            vec![SampleBlock::I32(vec![i32::MIN, 0, 1 << 30])],
        );
        let samples = recording.into_samples();
        assert!(close(samples[0], -1.0));
        assert!(close(samples[1], 0.0));
        assert!(close(samples[2], 0.5));
    }

    #[test]
    fn test_f32_passthrough() {
        let data = vec![-0.5, 0.0, 0.25, 1.0];
        let recording = Recording::new(16000, 1, vec![SampleBlock::F32(data.clone())]);
        assert_eq!(recording.into_samples(), data);
    }

    #[test]
    fn test_blocks_concatenate_in_order() {
        let recording = Recording::new(
            16000,
            1,
            vec![
                SampleBlock::F32(vec![1.0, 2.0]),
                SampleBlock::F32(vec![3.0]),
                SampleBlock::F32(vec![4.0, 5.0]),
            ],
        );
        assert_eq!(recording.into_samples(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_first_channel_only() {
        // Interleaved stereo frames: (10, -10), (20, -20), (30, -30)
        let recording = Recording::new(
            16000,
            2,
            vec![SampleBlock::I16(vec![10, -10, 20, -20, 30, -30])],
        );
        let samples = recording.into_samples();
        assert_eq!(samples.len(), 3);
        for (got, want) in samples.iter().zip([10.0, 20.0, 30.0]) {
            assert!(close(*got, want / 32768.0));
        }
    }

    #[test]
    fn test_duration() {
        let recording = Recording::new(16000, 1, vec![SampleBlock::F32(vec![0.0; 16000])]);
        assert_eq!(recording.duration(), Duration::from_secs(1));

        let stereo = Recording::new(16000, 2, vec![SampleBlock::F32(vec![0.0; 32000])]);
        assert_eq!(stereo.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_recording() {
        let recording = Recording::new(16000, 1, Vec::new());
        assert!(recording.is_empty());
        assert_eq!(recording.sample_count(), 0);
        assert!(recording.into_samples().is_empty());
    }
}
