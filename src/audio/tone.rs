use std::f64::consts::TAU;

use super::format::{MixFormat, SampleFormat};
use super::SampleGenerator;
use crate::error::{FeedError, FormatError};

const TONE_AMPLITUDE: f64 = 0.5;

/// Plain sine on both channels, for checking the wiring to a scope
/// without the drawing engine.
pub struct ToneGenerator {
    frequency: f64,
    format: Option<(SampleFormat, u32)>,
    block_bytes: usize,
    /// Frames emitted since the last flush.
    frame_index: u64,
}

impl ToneGenerator {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            format: None,
            block_bytes: 0,
            frame_index: 0,
        }
    }
}

impl SampleGenerator for ToneGenerator {
    fn initialize(&mut self, frames_per_period: u32, format: &MixFormat) -> Result<(), FormatError> {
        if frames_per_period == 0 {
            return Err(FormatError::EmptyPeriod);
        }
        let sample_format = SampleFormat::resolve(format)?;
        self.block_bytes = frames_per_period as usize * sample_format.block_align();
        self.format = Some((sample_format, format.sample_rate.max(1)));
        tracing::info!(frequency = self.frequency, format = %sample_format, "tone initialized");
        Ok(())
    }

    fn fill_sample_buffer(&mut self, dst: &mut [u8]) -> Result<(), FeedError> {
        let (format, sample_rate) = self.format.ok_or(FeedError::NotInitialized)?;
        if dst.len() > self.block_bytes {
            return Err(FeedError::SizeMismatch {
                requested: dst.len(),
                block: self.block_bytes,
            });
        }
        let step = TAU * self.frequency / sample_rate as f64;
        for frame in dst.chunks_exact_mut(format.block_align()) {
            let v = (TONE_AMPLITUDE * (step * self.frame_index as f64).sin()) as f32;
            format.write_frame(frame, v, v);
            self.frame_index += 1;
        }
        Ok(())
    }

    fn is_eof(&self) -> bool {
        false
    }

    fn buffer_len(&self) -> usize {
        self.block_bytes
    }

    fn flush(&mut self) {
        self.frame_index = 0;
    }
}
