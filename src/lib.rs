//! Turns 2-D vector drawings into deflection signals for analog displays:
//! stereo audio for an XY oscilloscope, or timed drive packets for an
//! RC-integrator peripheral.

pub mod audio;
pub mod config;
pub mod demo;
pub mod draw;
pub mod error;
pub mod integrator;
pub mod pull;
pub mod script;
pub mod stats;
pub mod types;

pub use draw::{DrawDevice, Recorder};
pub use types::{GraphicsPrimitive, Point, Rectangle};
