use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use scopewave::audio::{self, ToneGenerator};
use scopewave::config::{Backend, Config, Scene as SceneKind};
use scopewave::demo::{BasicScene, Scene, render_loop};
use scopewave::integrator::{IntegratorDevice, SimulatedPeripheral};
use scopewave::pull::spawn_pull;
use scopewave::script::Script;

const DEFAULT_CONFIG: &str = "scopewave.toml";

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr);

    let Some(path) = log_file else {
        registry.init();
        return Ok(None);
    };
    let name = path
        .file_name()
        .with_context(|| format!("log_file {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Ok(Some(guard))
}

fn load_scene(config: &Config) -> anyhow::Result<Box<dyn Scene>> {
    Ok(match config.demo.scene {
        SceneKind::Basic => Box::new(BasicScene::default()),
        SceneKind::Script => {
            let path = config
                .demo
                .script
                .as_deref()
                .context("scene = \"script\" needs a script path")?;
            Box::new(Script::load(path)?)
        }
    })
}

fn run_audio(config: &Config, scene: &mut dyn Scene) -> anyhow::Result<()> {
    let (mut builder, feed) = audio::channel(&config.audio);
    let feed_stats = builder.stats().clone();
    let pull = spawn_pull(feed, &config.pull, |_| {})?;

    let result = render_loop(
        &mut builder,
        scene,
        config.demo.frames,
        Duration::from_millis(config.demo.wait_timeout_ms),
    );

    let pull_stats = pull.stats().clone();
    pull.shutdown()?;
    let s = feed_stats.snapshot();
    tracing::info!(
        blocks_queued = s.blocks_queued,
        blocks_played = s.blocks_played,
        silent_periods = s.silent_periods,
        overflows = s.overflows,
        late_periods = pull_stats.late_periods.load(std::sync::atomic::Ordering::Relaxed),
        "audio session finished"
    );
    result.map(|_| ())
}

fn run_integrator(config: &Config, scene: &mut dyn Scene) -> anyhow::Result<()> {
    let mut device = IntegratorDevice::new(&config.integrator);
    match &config.demo.link {
        Some(addr) => {
            let stream =
                TcpStream::connect(addr).with_context(|| format!("connecting to {addr}"))?;
            stream.set_nodelay(true)?;
            device.connect(Box::new(stream));
        }
        None => device.connect(Box::new(SimulatedPeripheral::new(Duration::from_millis(
            device.frame_duration_ms() as u64,
        )))),
    }

    let result = render_loop(
        &mut device,
        scene,
        config.demo.frames,
        Duration::from_millis(config.demo.wait_timeout_ms),
    );
    tracing::info!(
        truncated_samples = device.truncated_samples(),
        last_error = device.last_error_code(),
        "integrator session finished"
    );
    result.map(|_| ())
}

fn run_tone(config: &Config) -> anyhow::Result<()> {
    let pull = spawn_pull(ToneGenerator::new(config.demo.tone_hz), &config.pull, |_| {})?;
    let start = Instant::now();
    let limit = Duration::from_secs(config.demo.tone_secs);
    while config.demo.tone_secs == 0 || start.elapsed() < limit {
        thread::sleep(Duration::from_millis(250));
    }
    pull.shutdown()
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = Config::load(&config_path)?;
    let _log_guard = init_logging(config.demo.log_file.as_deref())?;

    tracing::info!(
        config = %config_path.display(),
        backend = %config.demo.backend,
        scene = %config.demo.scene,
        "starting"
    );

    match config.demo.backend {
        Backend::Audio => run_audio(&config, load_scene(&config)?.as_mut()),
        Backend::Integrator => run_integrator(&config, load_scene(&config)?.as_mut()),
        Backend::Tone => run_tone(&config),
    }
}
