//! Stereo sample encoding: X on the left channel, Y on the right.
//!
//! [`channel`] returns the two halves. The builder records and encodes
//! frames on the render thread; the feed answers the output's periodic
//! pull without ever blocking.

mod encoder;
mod feed;
mod format;
pub mod ring;
mod tone;

pub use encoder::{AudioGraphicsBuilder, IDLE_BOX_STEPS};
pub use feed::AudioFeed;
pub use format::{MixFormat, SampleFormat, WaveEncoding, pcm16, pcm24};
pub use ring::{BlockLayout, delivery_ring};
pub use tone::ToneGenerator;

use crate::config::AudioConfig;
use crate::error::{FeedError, FormatError};
use crate::stats::FeedStats;

/// Contract between a sample source and the audio output that pulls it.
///
/// `fill_sample_buffer` runs on the real-time thread: implementations
/// must not block, allocate, or take locks there.
pub trait SampleGenerator: Send {
    /// Fix the output format and period size. Must be called before the
    /// first pull.
    fn initialize(&mut self, frames_per_period: u32, format: &MixFormat) -> Result<(), FormatError>;

    /// Fill `dst` with the next period. Plays silence when nothing is
    /// queued.
    fn fill_sample_buffer(&mut self, dst: &mut [u8]) -> Result<(), FeedError>;

    fn is_eof(&self) -> bool;

    /// Bytes per period, zero before `initialize`.
    fn buffer_len(&self) -> usize;

    /// Drop everything queued.
    fn flush(&mut self);
}

/// Create a connected builder/feed pair.
pub fn channel(config: &AudioConfig) -> (AudioGraphicsBuilder, AudioFeed) {
    let (producer, consumer) = delivery_ring(config.ring_capacity, config.low_watermark);
    let stats = FeedStats::new();
    (
        AudioGraphicsBuilder::new(config, producer, stats.clone()),
        AudioFeed::new(consumer, stats),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::draw::DrawDevice;
    use crate::error::EncodeError;
    use crate::types::Point;

    fn initialized(config: &AudioConfig, frames: u32) -> (AudioGraphicsBuilder, AudioFeed) {
        let (builder, mut feed) = channel(config);
        feed.initialize(frames, &MixFormat::stereo(SampleFormat::Float32, 48_000))
            .unwrap();
        (builder, feed)
    }

    fn floats(block: &[u8]) -> Vec<f32> {
        block
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn submit_before_initialize_fails() {
        let (mut builder, _feed) = channel(&AudioConfig::default());
        builder.begin();
        builder.set_point(Point::new(0.1, 0.1));
        assert_eq!(builder.encode(), Err(EncodeError::NotInitialized));
    }

    #[test]
    fn pull_before_initialize_fails() {
        let (_builder, mut feed) = channel(&AudioConfig::default());
        let mut buf = [0u8; 8];
        assert_eq!(feed.fill_sample_buffer(&mut buf), Err(FeedError::NotInitialized));
        assert_eq!(feed.buffer_len(), 0);
    }

    #[test]
    fn zero_frames_per_period_is_rejected() {
        let (_builder, mut feed) = channel(&AudioConfig::default());
        let format = MixFormat::stereo(SampleFormat::Pcm16, 48_000);
        assert_eq!(feed.initialize(0, &format), Err(FormatError::EmptyPeriod));
        assert_eq!(
            feed.initialize(u32::MAX, &format),
            Err(FormatError::PeriodTooLong { frames: u32::MAX })
        );
        assert_eq!(feed.buffer_len(), 0);
    }

    #[test]
    fn sync_point_lands_on_both_channels() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 1);
        builder.begin();
        builder.set_point(Point::new(0.25, -0.125));
        assert_eq!(builder.encode(), Ok(1));

        let mut buf = [0u8; 8];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert_eq!(floats(&buf), vec![0.25, -0.125]);
    }

    #[test]
    fn scale_flips_axes() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 1);
        builder.set_scale(-1.0, 2.0);
        builder.begin();
        builder.set_point(Point::new(0.25, 0.125));
        builder.encode().unwrap();

        let mut buf = [0u8; 8];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert_eq!(floats(&buf), vec![-0.25, 0.25]);
    }

    #[test]
    fn partial_block_carries_into_next_frame() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 4);
        builder.begin();
        builder.set_point(Point::new(0.1, 0.1));
        builder.set_point(Point::new(0.2, 0.2));
        builder.set_point(Point::new(0.3, 0.3));
        assert_eq!(builder.encode(), Ok(0));
        assert_eq!(builder.pending_bytes(), 24);

        builder.begin();
        builder.set_point(Point::new(0.4, 0.4));
        assert_eq!(builder.encode(), Ok(1));

        let mut buf = [0u8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        let xs: Vec<f32> = floats(&buf).into_iter().step_by(2).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn fixed_rate_pads_with_silence() {
        let config = AudioConfig {
            fixed_rate: true,
            ..AudioConfig::default()
        };
        let (mut builder, mut feed) = initialized(&config, 4);
        builder.begin();
        builder.set_point(Point::new(0.5, 0.5));
        assert_eq!(builder.encode(), Ok(1));
        assert_eq!(builder.pending_bytes(), 0);

        let mut buf = [0xffu8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert_eq!(floats(&buf), vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn fixed_rate_fills_with_idle_box() {
        let config = AudioConfig {
            fixed_rate: true,
            idle_box: true,
            idle_box_size: 0.2,
            ..AudioConfig::default()
        };
        let (mut builder, mut feed) = initialized(&config, 4);
        builder.begin();
        builder.set_point(Point::new(0.5, 0.5));
        builder.encode().unwrap();

        let mut buf = [0u8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        let values = floats(&buf);
        assert!((values[2] + 0.1).abs() < 1e-6);
        assert!((values[3] + 0.1).abs() < 1e-6);
        // Remaining frames walk along the bottom edge
        for frame in values[2..].chunks_exact(2) {
            assert!((frame[1] + 0.1).abs() < 1e-6);
            assert!(frame[0] >= -0.1 - 1e-6 && frame[0] <= 0.1 + 1e-6);
        }
    }

    fn idle_box_config(reset_on_flush: bool) -> AudioConfig {
        AudioConfig {
            fixed_rate: true,
            idle_box: true,
            idle_box_size: 0.2,
            reset_idle_box_on_flush: reset_on_flush,
            ..AudioConfig::default()
        }
    }

    /// Encode a one-point frame and return the pulled block as points.
    fn one_point_frame(builder: &mut AudioGraphicsBuilder, feed: &mut AudioFeed) -> Vec<Point> {
        builder.begin();
        builder.set_point(Point::new(0.5, 0.5));
        assert_eq!(builder.encode(), Ok(1));
        let mut buf = [0u8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        floats(&buf)
            .chunks_exact(2)
            .map(|c| Point::new(c[0], c[1]))
            .collect()
    }

    #[test]
    fn idle_box_continues_across_frames() {
        let path = super::encoder::idle_box_path(0.2);
        let (mut builder, mut feed) = initialized(&idle_box_config(false), 4);

        let first = one_point_frame(&mut builder, &mut feed);
        assert_eq!(first[1..], path[0..3]);
        let second = one_point_frame(&mut builder, &mut feed);
        assert_eq!(second[0], Point::new(0.5, 0.5));
        assert_eq!(second[1..], path[3..6]);
    }

    #[test]
    fn idle_box_keeps_its_place_through_flush_by_default() {
        let path = super::encoder::idle_box_path(0.2);
        let (mut builder, mut feed) = initialized(&idle_box_config(false), 4);
        one_point_frame(&mut builder, &mut feed);
        feed.flush();
        let after = one_point_frame(&mut builder, &mut feed);
        assert_eq!(after[1..], path[3..6]);
    }

    #[test]
    fn idle_box_restarts_after_flush_when_configured() {
        let path = super::encoder::idle_box_path(0.2);
        let (mut builder, mut feed) = initialized(&idle_box_config(true), 4);
        one_point_frame(&mut builder, &mut feed);
        one_point_frame(&mut builder, &mut feed);
        feed.flush();
        let after = one_point_frame(&mut builder, &mut feed);
        assert_eq!(after[1..], path[0..3]);
    }

    #[test]
    fn fixed_rate_toggle_ships_partial_block() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 4);
        builder.begin();
        builder.set_point(Point::new(0.1, 0.1));
        assert_eq!(builder.encode(), Ok(0));
        assert_eq!(builder.pending_bytes(), 8);

        builder.set_fixed_rendering_rate(true);
        builder.begin();
        builder.set_point(Point::new(0.2, 0.2));
        assert_eq!(builder.encode(), Ok(1));
        assert_eq!(builder.pending_bytes(), 0);

        let mut buf = [0xffu8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert_eq!(floats(&buf), vec![0.1, 0.1, 0.2, 0.2, 0.0, 0.0, 0.0, 0.0]);

        builder.set_fixed_rendering_rate(false);
        builder.begin();
        builder.set_point(Point::new(0.3, 0.3));
        assert_eq!(builder.encode(), Ok(0));
        assert_eq!(builder.pending_bytes(), 8);
    }

    #[test]
    fn empty_ring_plays_silence() {
        let (_builder, mut feed) = initialized(&AudioConfig::default(), 2);
        let mut buf = [0xaau8; 16];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0));
        assert_eq!(feed.stats().snapshot().silent_periods, 1);
    }

    #[test]
    fn oversized_pull_is_rejected_without_consuming() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 1);
        builder.begin();
        builder.set_point(Point::new(0.1, 0.1));
        builder.encode().unwrap();

        let mut big = [0u8; 16];
        assert_eq!(
            feed.fill_sample_buffer(&mut big),
            Err(FeedError::SizeMismatch {
                requested: 16,
                block: 8
            })
        );
        assert_eq!(feed.pending(), 1);
    }

    #[test]
    fn overflow_is_reported() {
        let config = AudioConfig {
            ring_capacity: 2,
            ..AudioConfig::default()
        };
        let (mut builder, _feed) = initialized(&config, 1);
        builder.begin();
        for i in 0..3 {
            builder.set_point(Point::new(i as f32 * 0.1, 0.0));
        }
        assert_eq!(builder.encode(), Err(EncodeError::RingOverflow { capacity: 2 }));
        assert_eq!(builder.stats().snapshot().overflows, 1);
    }

    #[test]
    fn flush_drops_partial_block() {
        let (mut builder, mut feed) = initialized(&AudioConfig::default(), 4);
        builder.begin();
        builder.set_point(Point::new(0.9, 0.9));
        builder.encode().unwrap();
        assert_eq!(builder.pending_bytes(), 8);

        feed.flush();
        assert!(builder.wait_sync(Duration::ZERO));

        builder.begin();
        for _ in 0..4 {
            builder.set_point(Point::new(0.1, 0.1));
        }
        assert_eq!(builder.encode(), Ok(1));
        let mut buf = [0u8; 32];
        feed.fill_sample_buffer(&mut buf).unwrap();
        assert!(floats(&buf).iter().all(|v| (*v - 0.1).abs() < 1e-6));
    }
}
