use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ring::{BlockLayout, BlockProducer};
use crate::config::AudioConfig;
use crate::draw::trace::{self, BeamWriter, Density};
use crate::draw::{DrawDevice, Recorder, delegate_recorder};
use crate::error::EncodeError;
use crate::stats::FeedStats;
use crate::types::Point;

/// Steps in one lap of the idle box.
pub const IDLE_BOX_STEPS: usize = 64;

/// Draw device that encodes frames into stereo sample blocks, left
/// channel = X, right channel = Y.
pub struct AudioGraphicsBuilder {
    recorder: Recorder,
    scale: [f32; 2],
    fixed_rate: bool,
    idle_box: Option<[Point; IDLE_BOX_STEPS]>,
    reset_idle_box_on_flush: bool,
    ring: BlockProducer,
    active: ActiveBlock,
    layout: Option<BlockLayout>,
    flush_epoch: u64,
    /// Position in the idle box lap; carries over between frames.
    idle_step: usize,
    stats: Arc<FeedStats>,
}

/// Block being filled and the write offset into it.
#[derive(Default)]
struct ActiveBlock {
    bytes: Vec<u8>,
    cursor: usize,
}

impl AudioGraphicsBuilder {
    pub(crate) fn new(config: &AudioConfig, ring: BlockProducer, stats: Arc<FeedStats>) -> Self {
        let flush_epoch = ring.flush_epoch();
        Self {
            recorder: Recorder::new(),
            scale: config.scale,
            fixed_rate: config.fixed_rate,
            idle_box: config.idle_box.then(|| idle_box_path(config.idle_box_size)),
            reset_idle_box_on_flush: config.reset_idle_box_on_flush,
            ring,
            active: ActiveBlock::default(),
            layout: None,
            flush_epoch,
            idle_step: 0,
            stats,
        }
    }

    /// Per-axis output scale. Negative values flip an axis.
    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.scale = [x, y];
    }

    /// Ship a partially filled block at the end of every frame instead of
    /// continuing it with the next frame.
    pub fn set_fixed_rendering_rate(&mut self, fixed: bool) {
        self.fixed_rate = fixed;
    }

    pub fn stats(&self) -> &Arc<FeedStats> {
        &self.stats
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Blocks queued and not yet pulled.
    pub fn backlog(&self) -> usize {
        self.ring.backlog()
    }

    /// Bytes written into the block currently being filled.
    pub fn pending_bytes(&self) -> usize {
        self.active.cursor
    }

    /// Encode the recorded frame into blocks. Returns the number of blocks
    /// queued.
    pub fn encode(&mut self) -> Result<usize, EncodeError> {
        let layout = self.ring.layout().ok_or(EncodeError::NotInitialized)?;
        self.sync_with_feed(layout);

        let mut writer = BlockWriter {
            layout,
            scale: self.scale,
            block: &mut self.active,
            ring: &mut self.ring,
            queued: 0,
        };
        let result = trace::trace_frame(self.recorder.frame(), Density::AUDIO, &mut writer)
            .and_then(|points| {
                if self.fixed_rate && writer.block.cursor > 0 {
                    match &self.idle_box {
                        Some(path) => {
                            while writer.block.cursor > 0 {
                                writer.write_sample(path[self.idle_step])?;
                                self.idle_step = (self.idle_step + 1) % IDLE_BOX_STEPS;
                            }
                        }
                        None => writer.pad_and_queue()?,
                    }
                }
                Ok(points)
            });
        let queued = writer.queued;

        self.stats
            .blocks_queued
            .fetch_add(queued as u32, Ordering::Relaxed);
        match result {
            Ok(points) => {
                self.stats
                    .frame_samples
                    .store(points as u32, Ordering::Relaxed);
                tracing::trace!(points, queued, backlog = self.ring.backlog(), "frame encoded");
                Ok(queued)
            }
            Err(e) => {
                self.stats.overflows.fetch_add(1, Ordering::Relaxed);
                tracing::error!(%e, queued, "frame encoding failed");
                Err(e)
            }
        }
    }

    /// Pick up a new block size and abandon partial data after a flush.
    fn sync_with_feed(&mut self, layout: BlockLayout) {
        if self.layout != Some(layout) {
            tracing::debug!(
                format = %layout.format,
                block_bytes = layout.block_bytes,
                "adopting output layout"
            );
            self.active.bytes = self.ring.fresh_block(layout.block_bytes);
            self.active.cursor = 0;
            self.layout = Some(layout);
        }
        let epoch = self.ring.flush_epoch();
        if epoch != self.flush_epoch {
            self.flush_epoch = epoch;
            self.active.bytes.fill(0);
            self.active.cursor = 0;
            if self.reset_idle_box_on_flush {
                self.idle_step = 0;
            }
        }
    }
}

impl DrawDevice for AudioGraphicsBuilder {
    delegate_recorder!();

    fn wait_sync(&mut self, timeout: Duration) -> bool {
        let drained = self.ring.wait_drained(timeout);
        if !drained {
            tracing::warn!(
                backlog = self.ring.backlog(),
                ?timeout,
                "output did not drain in time"
            );
        }
        drained
    }

    fn submit(&mut self) -> anyhow::Result<()> {
        self.encode()?;
        Ok(())
    }
}

struct BlockWriter<'a> {
    layout: BlockLayout,
    scale: [f32; 2],
    block: &'a mut ActiveBlock,
    ring: &'a mut BlockProducer,
    queued: usize,
}

impl BlockWriter<'_> {
    fn write_sample(&mut self, p: Point) -> Result<(), EncodeError> {
        let p = p.scaled(self.scale);
        let align = self.layout.format.block_align();
        let at = self.block.cursor;
        self.layout
            .format
            .write_frame(&mut self.block.bytes[at..at + align], p.x, p.y);
        self.block.cursor += align;
        if self.block.cursor + align > self.layout.block_bytes {
            self.queue()?;
        }
        Ok(())
    }

    fn pad_and_queue(&mut self) -> Result<(), EncodeError> {
        let at = self.block.cursor;
        self.block.bytes[at..].fill(0);
        self.queue()
    }

    fn queue(&mut self) -> Result<(), EncodeError> {
        let fresh = self.ring.fresh_block(self.layout.block_bytes);
        let full = std::mem::replace(&mut self.block.bytes, fresh);
        self.block.cursor = 0;
        match self.ring.push(full) {
            Ok(()) => {
                self.queued += 1;
                Ok(())
            }
            Err(_) => Err(EncodeError::RingOverflow {
                capacity: self.ring.capacity(),
            }),
        }
    }
}

impl BeamWriter for BlockWriter<'_> {
    type Error = EncodeError;

    fn anchor(&mut self, p: Point) -> Result<(), EncodeError> {
        self.write_sample(p)
    }

    fn trace(&mut self, p: Point, _intensity: f32) -> Result<(), EncodeError> {
        self.write_sample(p)
    }
}

/// One lap around a square of side `size` centred on the origin.
pub(crate) fn idle_box_path(size: f32) -> [Point; IDLE_BOX_STEPS] {
    let h = size / 2.0;
    let corners = [
        Point::new(-h, -h),
        Point::new(h, -h),
        Point::new(h, h),
        Point::new(-h, h),
    ];
    let per_side = IDLE_BOX_STEPS / corners.len();
    std::array::from_fn(|i| {
        let side = i / per_side;
        let t = (i % per_side) as f32 / per_side as f32;
        corners[side].lerp(corners[(side + 1) % corners.len()], t)
    })
}
