//! Analog integrator backend: frames become timed DAC drive samples,
//! sliced into packets for the peripheral.

mod device;
mod encoder;
mod framer;
mod link;

pub use device::IntegratorDevice;
pub use encoder::{DriveParams, IntegratorEncoder, dac_map};
pub use framer::{DEFAULT_MAX_PACKETS_PER_FRAME, FramedSamples, frame_packets};
pub use link::{HardwareLink, SimulatedPeripheral};
