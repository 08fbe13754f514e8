use ft_protocol::{FT_MAX_SAMPLES, FTPacket, FTSample, frame_rate_code};

/// Upper bound on packets per frame used when nothing else is configured.
pub const DEFAULT_MAX_PACKETS_PER_FRAME: usize = 6;

/// One frame sliced into wire packets.
#[derive(Debug, Default)]
pub struct FramedSamples {
    pub packets: Vec<FTPacket>,
    /// Samples that did not fit in the frame's packet budget.
    pub truncated: usize,
}

/// Slice `samples` into frame packets.
///
/// The first packet carries start-of-frame, the last one end-of-frame.
/// At most `max_packets` packets are produced; samples beyond that are
/// dropped and counted in [`FramedSamples::truncated`]. An empty sample
/// list produces no packets.
pub fn frame_packets(samples: &[FTSample], frame_duration_ms: u32, max_packets: usize) -> FramedSamples {
    let fps = frame_rate_code(frame_duration_ms);
    let budget = max_packets.max(1);
    let mut packets: Vec<FTPacket> = samples
        .chunks(FT_MAX_SAMPLES)
        .take(budget)
        .map(|chunk| {
            let mut packet = FTPacket::frame();
            packet.set_samples(chunk);
            packet.frame.set_fps(fps);
            packet
        })
        .collect();

    if let Some(first) = packets.first_mut() {
        first.frame.set_sof(true);
    }
    if let Some(last) = packets.last_mut() {
        last.frame.set_eof(true);
    }

    let sent: usize = packets.iter().map(|p| p.frame.count as usize).sum();
    FramedSamples {
        packets,
        truncated: samples.len() - sent,
    }
}
