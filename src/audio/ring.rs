//! Delivery ring between the encoding thread and the real-time pull.
//!
//! Filled blocks travel producer to consumer through one SPSC ring;
//! played blocks travel back through a second one so the producer can
//! reuse their allocations. The consumer never blocks: it signals the
//! producer through a one-slot channel whose pending token makes a
//! wake-up impossible to lose.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::format::SampleFormat;

/// Default number of block slots.
pub const DEFAULT_CAPACITY: usize = 128;
/// Default backlog at or below which `wait_drained` returns.
pub const DEFAULT_LOW_WATERMARK: usize = 3;

/// Byte layout of every block, fixed by `initialize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub format: SampleFormat,
    pub block_bytes: usize,
    pub sample_rate: u32,
}

impl BlockLayout {
    pub fn frames(&self) -> usize {
        self.block_bytes / self.format.block_align()
    }

    pub fn period_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate.max(1) as f32
    }
}

/// Largest block the packed layout word can describe.
pub const MAX_BLOCK_BYTES: usize = (1 << 24) - 1;

/// State both halves read without locking.
#[derive(Debug)]
struct Shared {
    /// `format << 56 | block_bytes << 32 | sample_rate`, zero until
    /// initialized.
    layout: AtomicU64,
    /// Bumped by every flush; the producer drops its partial block when
    /// it sees a new value.
    flush_epoch: AtomicU64,
}

impl Shared {
    fn store_layout(&self, layout: BlockLayout) {
        debug_assert!(layout.block_bytes <= MAX_BLOCK_BYTES);
        let code: u64 = match layout.format {
            SampleFormat::Float32 => 1,
            SampleFormat::Pcm16 => 2,
            SampleFormat::Pcm24 => 3,
        };
        let bytes = layout.block_bytes.min(MAX_BLOCK_BYTES) as u64;
        self.layout.store(
            (code << 56) | (bytes << 32) | layout.sample_rate as u64,
            Ordering::Release,
        );
    }

    fn layout(&self) -> Option<BlockLayout> {
        let word = self.layout.load(Ordering::Acquire);
        let format = match word >> 56 {
            1 => SampleFormat::Float32,
            2 => SampleFormat::Pcm16,
            3 => SampleFormat::Pcm24,
            _ => return None,
        };
        Some(BlockLayout {
            format,
            block_bytes: ((word >> 32) & MAX_BLOCK_BYTES as u64) as usize,
            sample_rate: word as u32,
        })
    }
}

/// Producer half. Lives on the render thread.
pub struct BlockProducer {
    ready: rtrb::Producer<Vec<u8>>,
    recycled: rtrb::Consumer<Vec<u8>>,
    drained: Receiver<()>,
    low_watermark: usize,
    shared: Arc<Shared>,
}

/// Consumer half. Lives on the real-time pull thread.
pub struct BlockConsumer {
    ready: rtrb::Consumer<Vec<u8>>,
    recycled: rtrb::Producer<Vec<u8>>,
    drained: Sender<()>,
    low_watermark: usize,
    shared: Arc<Shared>,
}

/// Create a ring of `capacity` block slots.
pub fn delivery_ring(capacity: usize, low_watermark: usize) -> (BlockProducer, BlockConsumer) {
    let capacity = capacity.max(1);
    let (ready_tx, ready_rx) = rtrb::RingBuffer::new(capacity);
    let (recycled_tx, recycled_rx) = rtrb::RingBuffer::new(capacity + 2);
    let (drained_tx, drained_rx) = crossbeam_channel::bounded(1);
    let shared = Arc::new(Shared {
        layout: AtomicU64::new(0),
        flush_epoch: AtomicU64::new(0),
    });
    (
        BlockProducer {
            ready: ready_tx,
            recycled: recycled_rx,
            drained: drained_rx,
            low_watermark,
            shared: shared.clone(),
        },
        BlockConsumer {
            ready: ready_rx,
            recycled: recycled_tx,
            drained: drained_tx,
            low_watermark,
            shared,
        },
    )
}

impl BlockProducer {
    pub fn capacity(&self) -> usize {
        self.ready.buffer().capacity()
    }

    /// Blocks queued and not yet pulled.
    pub fn backlog(&self) -> usize {
        self.capacity() - self.ready.slots()
    }

    pub fn layout(&self) -> Option<BlockLayout> {
        self.shared.layout()
    }

    pub fn flush_epoch(&self) -> u64 {
        self.shared.flush_epoch.load(Ordering::Acquire)
    }

    /// A zeroed block of `len` bytes, reusing a played one when possible.
    pub fn fresh_block(&mut self, len: usize) -> Vec<u8> {
        match self.recycled.pop() {
            Ok(mut block) => {
                block.clear();
                block.resize(len, 0);
                block
            }
            Err(_) => vec![0; len],
        }
    }

    /// Queue a filled block. A full ring hands the block back untouched.
    pub fn push(&mut self, block: Vec<u8>) -> Result<(), Vec<u8>> {
        self.ready.push(block).map_err(|rtrb::PushError::Full(block)| block)
    }

    /// Block until the backlog is at or below the low watermark or
    /// `timeout` elapses. Returns whether the backlog drained in time.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.backlog() <= self.low_watermark {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.drained.recv_timeout(deadline - now) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => return self.backlog() <= self.low_watermark,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("sample consumer dropped while waiting for drain");
                    return self.backlog() <= self.low_watermark;
                }
            }
        }
    }
}

impl BlockConsumer {
    pub fn capacity(&self) -> usize {
        self.ready.buffer().capacity()
    }

    /// Blocks ready to pull.
    pub fn pending(&self) -> usize {
        self.ready.slots()
    }

    pub fn layout(&self) -> Option<BlockLayout> {
        self.shared.layout()
    }

    pub fn set_layout(&self, layout: BlockLayout) {
        self.shared.store_layout(layout);
    }

    /// Oldest ready block. Signals the producer once the backlog is at or
    /// below the low watermark.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let block = self.ready.pop().ok()?;
        if self.ready.slots() <= self.low_watermark {
            self.notify_drained();
        }
        Some(block)
    }

    /// Return a played block for reuse. Dropped if the return ring is full.
    pub fn recycle(&mut self, block: Vec<u8>) {
        let _ = self.recycled.push(block);
    }

    /// Discard every queued block and tell the producer to abandon its
    /// partial one.
    pub fn flush(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(block) = self.ready.pop() {
            self.recycle(block);
            discarded += 1;
        }
        self.shared.flush_epoch.fetch_add(1, Ordering::AcqRel);
        self.notify_drained();
        discarded
    }

    fn notify_drained(&self) {
        match self.drained.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }
}
