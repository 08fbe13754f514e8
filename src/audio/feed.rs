use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::format::{MixFormat, SampleFormat};
use super::ring::{BlockConsumer, BlockLayout, MAX_BLOCK_BYTES};
use super::SampleGenerator;
use crate::error::{FeedError, FormatError};
use crate::stats::FeedStats;

/// Pull side of the audio encoder. Hand this to the output callback.
pub struct AudioFeed {
    ring: BlockConsumer,
    stats: Arc<FeedStats>,
}

impl AudioFeed {
    pub(crate) fn new(ring: BlockConsumer, stats: Arc<FeedStats>) -> Self {
        Self { ring, stats }
    }

    pub fn stats(&self) -> &Arc<FeedStats> {
        &self.stats
    }

    pub fn layout(&self) -> Option<BlockLayout> {
        self.ring.layout()
    }

    /// Blocks ready to pull.
    pub fn pending(&self) -> usize {
        self.ring.pending()
    }
}

impl SampleGenerator for AudioFeed {
    fn initialize(&mut self, frames_per_period: u32, format: &MixFormat) -> Result<(), FormatError> {
        if frames_per_period == 0 {
            return Err(FormatError::EmptyPeriod);
        }
        let sample_format = SampleFormat::resolve(format)?;
        let block_bytes = frames_per_period as usize * sample_format.block_align();
        if block_bytes > MAX_BLOCK_BYTES {
            return Err(FormatError::PeriodTooLong {
                frames: frames_per_period,
            });
        }
        let layout = BlockLayout {
            format: sample_format,
            block_bytes,
            sample_rate: format.sample_rate,
        };
        self.ring.set_layout(layout);
        tracing::info!(
            format = %sample_format,
            frames_per_period,
            block_bytes = layout.block_bytes,
            sample_rate = format.sample_rate,
            "audio feed initialized"
        );
        Ok(())
    }

    fn fill_sample_buffer(&mut self, dst: &mut [u8]) -> Result<(), FeedError> {
        let layout = self.ring.layout().ok_or(FeedError::NotInitialized)?;
        if dst.len() > layout.block_bytes {
            return Err(FeedError::SizeMismatch {
                requested: dst.len(),
                block: layout.block_bytes,
            });
        }

        match self.ring.pop() {
            Some(block) => {
                let n = dst.len().min(block.len());
                dst[..n].copy_from_slice(&block[..n]);
                dst[n..].fill(0);
                self.ring.recycle(block);
                self.stats.blocks_played.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                dst.fill(0);
                self.stats.silent_periods.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.queued_secs.store(
            self.ring.pending() as f32 * layout.period_secs(),
            Ordering::Relaxed,
        );
        Ok(())
    }

    fn is_eof(&self) -> bool {
        false
    }

    fn buffer_len(&self) -> usize {
        self.ring.layout().map_or(0, |l| l.block_bytes)
    }

    fn flush(&mut self) {
        let discarded = self.ring.flush();
        self.stats.queued_secs.store(0.0, Ordering::Relaxed);
        tracing::info!(discarded, "audio feed flushed");
    }
}
