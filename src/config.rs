//! TOML configuration. Every field has a default, so an empty or missing
//! file runs the basic audio demo.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::audio::SampleFormat;
use crate::audio::ring::{DEFAULT_CAPACITY, DEFAULT_LOW_WATERMARK};
use crate::integrator::DEFAULT_MAX_PACKETS_PER_FRAME;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub integrator: IntegratorConfig,
    pub pull: PullConfig,
    pub demo: DemoConfig,
}

impl Config {
    /// Load from `path`. A file that does not exist yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Per-axis multiplier; negative flips the axis.
    pub scale: [f32; 2],
    pub ring_capacity: usize,
    pub low_watermark: usize,
    pub fixed_rate: bool,
    /// Fill the rest of a fixed-rate block with a small square instead
    /// of silence.
    pub idle_box: bool,
    pub idle_box_size: f32,
    pub reset_idle_box_on_flush: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0],
            ring_capacity: DEFAULT_CAPACITY,
            low_watermark: DEFAULT_LOW_WATERMARK,
            fixed_rate: false,
            idle_box: false,
            idle_box_size: 0.1,
            reset_idle_box_on_flush: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub scale: [f32; 2],
    pub speed_scale: f32,
    pub circle_density: u32,
    /// Path samples per unit length of a line; 0 draws each line as a
    /// single segment.
    pub line_density: u32,
    pub r_ohms: f32,
    pub c_farads: f32,
    pub settle_us: u16,
    pub hold_us: u16,
    pub frame_duration_ms: u32,
    pub max_packets_per_frame: usize,
    pub ack_timeout_ms: u64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0],
            speed_scale: 5000.0,
            circle_density: 50,
            line_density: 0,
            r_ohms: 10e3,
            c_farads: 47e-9,
            settle_us: 50,
            hold_us: 4,
            frame_duration_ms: 10,
            max_packets_per_frame: DEFAULT_MAX_PACKETS_PER_FRAME,
            ack_timeout_ms: 3000,
        }
    }
}

/// Simulated output device that pulls one period at a time.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    pub sample_rate: u32,
    pub frames_per_period: u32,
    pub format: SampleFormat,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            frames_per_period: 480,
            format: SampleFormat::Float32,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    #[default]
    Audio,
    Integrator,
    Tone,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scene {
    #[default]
    Basic,
    Script,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub backend: Backend,
    pub scene: Scene,
    pub script: Option<PathBuf>,
    /// Frames to render; 0 runs until the output stalls.
    pub frames: u64,
    pub wait_timeout_ms: u64,
    /// `host:port` of a TCP-bridged integrator. Without one the
    /// integrator backend talks to a simulated peripheral.
    pub link: Option<String>,
    pub log_file: Option<PathBuf>,
    pub tone_hz: f64,
    /// How long the tone backend plays; 0 plays until killed.
    pub tone_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Audio,
            scene: Scene::Basic,
            script: None,
            frames: 0,
            wait_timeout_ms: 1000,
            link: None,
            log_file: None,
            tone_hz: 1000.0,
            tone_secs: 0,
        }
    }
}
