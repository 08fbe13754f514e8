use std::time::Duration;

use ft_protocol::{FT_MAX_SAMPLES, FT_MIN_PACKET_SIZE, quantize_frame_duration};

use super::encoder::{DriveParams, IntegratorEncoder};
use super::framer::frame_packets;
use super::link::HardwareLink;
use crate::config::IntegratorConfig;
use crate::draw::{DrawDevice, Recorder, delegate_recorder};
use crate::error::LinkError;

/// Draw device that drives the integrator peripheral over a packet link.
///
/// `submit` writes the frame synchronously; `wait_sync` blocks on the
/// peripheral's end-of-frame acknowledgement.
pub struct IntegratorDevice {
    recorder: Recorder,
    encoder: IntegratorEncoder,
    link: Option<Box<dyn HardwareLink>>,
    frame_duration_ms: u32,
    max_packets_per_frame: usize,
    ack_timeout: Duration,
    last_error: Option<LinkError>,
    truncated_samples: u64,
}

impl IntegratorDevice {
    pub fn new(config: &IntegratorConfig) -> Self {
        let mut encoder = IntegratorEncoder::new(DriveParams::from(config));
        encoder.set_sample_budget(config.max_packets_per_frame.max(1) * FT_MAX_SAMPLES);
        Self {
            recorder: Recorder::new(),
            encoder,
            link: None,
            frame_duration_ms: quantize_frame_duration(config.frame_duration_ms),
            max_packets_per_frame: config.max_packets_per_frame,
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
            last_error: None,
            truncated_samples: 0,
        }
    }

    pub fn connect(&mut self, link: Box<dyn HardwareLink>) {
        self.last_error = None;
        self.link = Some(link);
        tracing::info!(frame_duration_ms = self.frame_duration_ms, "integrator connected");
    }

    pub fn disconnect(&mut self) {
        if self.link.take().is_some() {
            tracing::info!("integrator disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Rounded up to a multiple of 5 ms and clamped to 5..=80 ms.
    pub fn set_frame_duration(&mut self, ms: u32) {
        self.frame_duration_ms = quantize_frame_duration(ms);
    }

    pub fn frame_duration_ms(&self) -> u32 {
        self.frame_duration_ms
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.encoder.set_scale(x, y);
    }

    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    /// Zero when the last operation succeeded.
    pub fn last_error_code(&self) -> i32 {
        self.last_error.as_ref().map_or(0, LinkError::code)
    }

    /// Samples dropped so far because a frame exceeded the packet budget.
    pub fn truncated_samples(&self) -> u64 {
        self.truncated_samples
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Encode the recorded frame and write its packets. Returns the number
    /// of packets sent.
    pub fn send_frame(&mut self) -> Result<usize, LinkError> {
        let link = self
            .link
            .as_mut()
            .ok_or(LinkError::NotConnected { op: "submit" })?;
        self.encoder.encode(self.recorder.frame());
        let samples = self.encoder.samples();
        let framed = frame_packets(samples, self.frame_duration_ms, self.max_packets_per_frame);
        let dropped = self.encoder.dropped() + framed.truncated;
        if dropped > 0 {
            self.truncated_samples += dropped as u64;
            tracing::warn!(
                dropped,
                samples = samples.len(),
                max_packets = self.max_packets_per_frame,
                "frame too long for packet budget, tail dropped"
            );
        }
        for packet in &framed.packets {
            link.send_packet(packet.as_bytes())
                .map_err(|e| LinkError::io("send_packet", e))?;
        }
        tracing::trace!(packets = framed.packets.len(), samples = samples.len(), "frame sent");
        Ok(framed.packets.len())
    }

    /// Block on the peripheral's frame acknowledgement.
    pub fn wait_ack(&mut self, timeout: Duration) -> Result<(), LinkError> {
        let link = self
            .link
            .as_mut()
            .ok_or(LinkError::NotConnected { op: "wait_sync" })?;
        let mut ack = [0u8; FT_MIN_PACKET_SIZE];
        let len = link
            .receive_packet(&mut ack, timeout.min(self.ack_timeout))
            .map_err(|e| LinkError::io("receive_packet", e))?;
        if len < FT_MIN_PACKET_SIZE {
            return Err(LinkError::ShortAck {
                op: "receive_packet",
                len,
            });
        }
        Ok(())
    }

    fn fail(&mut self, e: LinkError) {
        tracing::error!(code = e.code(), "{e}");
        self.last_error = Some(e);
    }
}

impl DrawDevice for IntegratorDevice {
    delegate_recorder!();

    fn wait_sync(&mut self, timeout: Duration) -> bool {
        match self.wait_ack(timeout) {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn submit(&mut self) -> anyhow::Result<()> {
        match self.send_frame() {
            Ok(_) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.fail(e);
                anyhow::bail!(message)
            }
        }
    }
}

impl Drop for IntegratorDevice {
    fn drop(&mut self) {
        self.disconnect();
    }
}
