//! Headless stand-in for an audio output: a thread that pulls one period
//! from a [`SampleGenerator`] at the period's wall-clock rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use atomic_float::AtomicF32;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::audio::{MixFormat, SampleGenerator};
use crate::config::PullConfig;

/// Commands sent from the render thread to the pull thread.
#[derive(Debug)]
pub enum PullCommand {
    /// Discard everything queued in the generator.
    Flush,
    Shutdown,
}

/// Statistics shared between the pull thread (writer) and everyone else
/// (readers). Relaxed atomics; values may be slightly stale.
#[derive(Debug)]
pub struct PullStats {
    /// Periods handed to the sink.
    pub periods: AtomicU32,
    /// Periods that started after their deadline.
    pub late_periods: AtomicU32,
    /// `fill_sample_buffer` calls that returned an error.
    pub fill_errors: AtomicU32,
    /// Wall time of the most recent `fill_sample_buffer`, in microseconds.
    pub fill_us: AtomicF32,
    pub period_secs: AtomicF32,
}

impl PullStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            periods: AtomicU32::new(0),
            late_periods: AtomicU32::new(0),
            fill_errors: AtomicU32::new(0),
            fill_us: AtomicF32::new(0.0),
            period_secs: AtomicF32::new(0.0),
        })
    }
}

/// Handle to a running pull thread.
pub struct PullThread {
    handle: thread::JoinHandle<()>,
    commands: Sender<PullCommand>,
    stats: Arc<PullStats>,
}

impl PullThread {
    pub fn stats(&self) -> &Arc<PullStats> {
        &self.stats
    }

    pub fn flush(&self) {
        let _ = self.commands.send(PullCommand::Flush);
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.commands.send(PullCommand::Shutdown);
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("pull thread panicked"))
    }
}

/// Initialize `generator` for the configured format and start pulling.
/// Every pulled period is passed to `sink`.
pub fn spawn_pull<G, S>(mut generator: G, config: &PullConfig, sink: S) -> anyhow::Result<PullThread>
where
    G: SampleGenerator + 'static,
    S: FnMut(&[u8]) + Send + 'static,
{
    let format = MixFormat::stereo(config.format, config.sample_rate);
    generator
        .initialize(config.frames_per_period, &format)
        .context("initializing sample generator")?;
    let period = Duration::from_secs_f64(
        config.frames_per_period as f64 / config.sample_rate.max(1) as f64,
    );

    let stats = PullStats::new();
    stats
        .period_secs
        .store(period.as_secs_f32(), Ordering::Relaxed);
    let (tx, rx) = crossbeam_channel::unbounded();
    let thread_stats = stats.clone();
    let handle = thread::Builder::new()
        .name("scopewave-pull".into())
        .spawn(move || run_pull(generator, period, rx, thread_stats, sink))
        .context("spawning pull thread")?;
    Ok(PullThread {
        handle,
        commands: tx,
        stats,
    })
}

/// Run the pull loop on the current thread until `Shutdown`, a dropped
/// command sender, or end of stream.
pub fn run_pull<G, S>(
    mut generator: G,
    period: Duration,
    commands: Receiver<PullCommand>,
    stats: Arc<PullStats>,
    mut sink: S,
) where
    G: SampleGenerator,
    S: FnMut(&[u8]),
{
    let _span = tracing::info_span!("pull").entered();
    let mut buf = vec![0u8; generator.buffer_len()];
    tracing::info!(?period, bytes = buf.len(), "thread started");

    let mut next_tick = Instant::now();
    loop {
        loop {
            match commands.try_recv() {
                Ok(PullCommand::Flush) => generator.flush(),
                Ok(PullCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    tracing::info!("thread shutting down");
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let start = Instant::now();
        match generator.fill_sample_buffer(&mut buf) {
            Ok(()) => {
                stats.periods.fetch_add(1, Ordering::Relaxed);
                sink(&buf);
            }
            Err(e) => {
                stats.fill_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(%e, "fill failed");
            }
        }
        stats
            .fill_us
            .store(start.elapsed().as_secs_f32() * 1e6, Ordering::Relaxed);

        if generator.is_eof() {
            tracing::info!("generator reached end of stream");
            return;
        }

        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            // Fell behind; don't burst to catch up
            stats.late_periods.fetch_add(1, Ordering::Relaxed);
            next_tick = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::audio::{SampleFormat, ToneGenerator};

    #[test]
    fn pulls_periods_until_shutdown() {
        let config = PullConfig {
            sample_rate: 48_000,
            frames_per_period: 48,
            format: SampleFormat::Pcm16,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let pull = spawn_pull(ToneGenerator::new(1000.0), &config, move |block| {
            sink_seen.lock().unwrap().push(block.len());
        })
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        let stats = pull.stats().clone();
        pull.shutdown().unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2, "only {} periods", seen.len());
        assert!(seen.iter().all(|len| *len == 48 * 4));
        assert_eq!(stats.periods.load(Ordering::Relaxed) as usize, seen.len());
        assert_eq!(stats.fill_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn bad_period_fails_to_spawn() {
        let config = PullConfig {
            frames_per_period: 0,
            ..PullConfig::default()
        };
        assert!(spawn_pull(ToneGenerator::new(440.0), &config, |_| {}).is_err());
    }
}
