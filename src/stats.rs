use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use atomic_float::AtomicF32;

/// Counters shared between the render thread (writer of the frame
/// fields) and the pull thread (writer of the period fields). All
/// fields use relaxed atomics; readers may see slightly stale values.
#[derive(Debug)]
pub struct FeedStats {
    /// Blocks pushed into the delivery ring.
    pub blocks_queued: AtomicU32,
    /// Blocks handed to the output.
    pub blocks_played: AtomicU32,
    /// Periods answered with silence because the ring was empty.
    pub silent_periods: AtomicU32,
    /// Frames rejected because the ring was full.
    pub overflows: AtomicU32,
    /// Beam positions emitted for the most recent frame.
    pub frame_samples: AtomicU32,
    /// Seconds of audio waiting in the ring after the last pull.
    pub queued_secs: AtomicF32,
}

impl FeedStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            blocks_queued: AtomicU32::new(0),
            blocks_played: AtomicU32::new(0),
            silent_periods: AtomicU32::new(0),
            overflows: AtomicU32::new(0),
            frame_samples: AtomicU32::new(0),
            queued_secs: AtomicF32::new(0.0),
        })
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_queued: self.blocks_queued.load(Ordering::Relaxed),
            blocks_played: self.blocks_played.load(Ordering::Relaxed),
            silent_periods: self.silent_periods.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            frame_samples: self.frame_samples.load(Ordering::Relaxed),
            queued_secs: self.queued_secs.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub blocks_queued: u32,
    pub blocks_played: u32,
    pub silent_periods: u32,
    pub overflows: u32,
    pub frame_samples: u32,
    pub queued_secs: f32,
}
