//! Wire layout of the integrator peripheral's packet protocol.
//!
//! Every type here is `#[repr(C)]` and `Pod`, so a packet is sent by
//! casting it to bytes and truncating to [`FTPacket::size`]. Multi-byte
//! fields are stored in host order; the peripheral is little-endian.

use bytemuck::{Pod, Zeroable};

/// Largest transfer the peripheral accepts in one packet.
pub const FT_MAX_PACKET_SIZE: usize = 512;

/// Bytes before the first sample: packet header plus frame header.
pub const FT_FRAME_HEADER_SIZE: usize =
    std::mem::size_of::<FTHeader>() + std::mem::size_of::<FTFrameHeader>();

/// Samples that fit in one frame packet.
pub const FT_MAX_SAMPLES: usize =
    (FT_MAX_PACKET_SIZE - FT_FRAME_HEADER_SIZE) / std::mem::size_of::<FTSample>();

/// Smallest packet on the wire (a bare header). The peripheral's frame
/// acknowledgement is exactly this long.
pub const FT_MIN_PACKET_SIZE: usize = std::mem::size_of::<FTHeader>();

/// Packet carries frame samples.
pub const FT_P_TYPE_FRAME: u16 = 1;
/// Packet acknowledges a rendered frame (device to host).
pub const FT_P_TYPE_SYNC: u16 = 2;

/// Largest value of a 12-bit DAC code.
pub const FT_DAC_MAX: u16 = (1 << 12) - 1;

const X_MASK: u32 = 0x0fff;
const DX_BIT: u32 = 1 << 12;
const Y_SHIFT: u32 = 13;
const DY_BIT: u32 = 1 << 25;
const NODAC_BIT: u32 = 1 << 26;

/// One integrator drive sample.
///
/// `bits` packs, from the least significant end: x code (12), x delta
/// flag (1), y code (12), y delta flag (1), no-DAC flag (1). `wait` is
/// the settle time in microseconds before the next sample is applied.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FTSample {
    pub bits: u32,
    pub wait: u16,
    pub _reserved: u16,
}

impl FTSample {
    /// Absolute position: both axes reset to the given codes.
    pub fn reset(x: u16, y: u16, wait: u16) -> Self {
        Self::with_flags(x, false, y, false, false, wait)
    }

    /// Delta drive: both axes integrate towards the given codes.
    pub fn delta(x: u16, y: u16, wait: u16) -> Self {
        Self::with_flags(x, true, y, true, false, wait)
    }

    /// Control sample that leaves the DACs untouched and only waits.
    pub fn hold(wait: u16) -> Self {
        Self::with_flags(0, false, 0, false, true, wait)
    }

    pub fn with_flags(x: u16, dx: bool, y: u16, dy: bool, nodac: bool, wait: u16) -> Self {
        let mut bits = (x.min(FT_DAC_MAX) as u32) | ((y.min(FT_DAC_MAX) as u32) << Y_SHIFT);
        if dx {
            bits |= DX_BIT;
        }
        if dy {
            bits |= DY_BIT;
        }
        if nodac {
            bits |= NODAC_BIT;
        }
        Self {
            bits,
            wait,
            _reserved: 0,
        }
    }

    pub fn x(&self) -> u16 {
        (self.bits & X_MASK) as u16
    }

    pub fn y(&self) -> u16 {
        ((self.bits >> Y_SHIFT) & X_MASK) as u16
    }

    pub fn dx(&self) -> bool {
        self.bits & DX_BIT != 0
    }

    pub fn dy(&self) -> bool {
        self.bits & DY_BIT != 0
    }

    pub fn nodac(&self) -> bool {
        self.bits & NODAC_BIT != 0
    }
}

/// Common header of every packet.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FTHeader {
    pub kind: u16,
    /// Bytes of the packet actually on the wire, header included.
    pub size: u16,
}

const SOF_BIT: u16 = 1 << 0;
const EOF_BIT: u16 = 1 << 1;
const FPS_SHIFT: u16 = 2;
const FPS_MASK: u16 = 0x1f;

/// Header of a frame packet.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FTFrameHeader {
    pub count: u16,
    /// sof (bit 0), eof (bit 1), frame-rate code (bits 2..7).
    pub flags: u16,
}

impl FTFrameHeader {
    pub fn sof(&self) -> bool {
        self.flags & SOF_BIT != 0
    }

    pub fn eof(&self) -> bool {
        self.flags & EOF_BIT != 0
    }

    pub fn fps(&self) -> u8 {
        ((self.flags >> FPS_SHIFT) & FPS_MASK) as u8
    }

    pub fn set_sof(&mut self, on: bool) {
        self.set_bit(SOF_BIT, on);
    }

    pub fn set_eof(&mut self, on: bool) {
        self.set_bit(EOF_BIT, on);
    }

    pub fn set_fps(&mut self, code: u8) {
        self.flags = (self.flags & !(FPS_MASK << FPS_SHIFT))
            | (((code as u16) & FPS_MASK) << FPS_SHIFT);
    }

    fn set_bit(&mut self, bit: u16, on: bool) {
        if on {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }
}

/// A full-size frame packet. Only the first [`FTPacket::size`] bytes are
/// transmitted.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct FTPacket {
    pub header: FTHeader,
    pub frame: FTFrameHeader,
    pub samples: [FTSample; FT_MAX_SAMPLES],
}

impl Default for FTPacket {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl FTPacket {
    /// Empty frame packet.
    pub fn frame() -> Self {
        let mut packet = Self::default();
        packet.header.kind = FT_P_TYPE_FRAME;
        packet.set_samples(&[]);
        packet
    }

    /// Copy up to [`FT_MAX_SAMPLES`] samples in and update count and size.
    /// Returns how many were taken.
    pub fn set_samples(&mut self, samples: &[FTSample]) -> usize {
        let n = samples.len().min(FT_MAX_SAMPLES);
        self.samples[..n].copy_from_slice(&samples[..n]);
        self.samples[n..].fill(FTSample::default());
        self.frame.count = n as u16;
        self.header.size = (FT_FRAME_HEADER_SIZE + n * std::mem::size_of::<FTSample>()) as u16;
        n
    }

    pub fn size(&self) -> usize {
        self.header.size as usize
    }

    /// Samples actually carried.
    pub fn payload(&self) -> &[FTSample] {
        &self.samples[..(self.frame.count as usize).min(FT_MAX_SAMPLES)]
    }

    /// Bytes to put on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::bytes_of(self)[..self.size().min(FT_MAX_PACKET_SIZE)]
    }
}

/// Rate code for a frame duration: rounded up to a multiple of 5 ms,
/// clamped to 5..=80 ms, then divided by 5.
pub fn frame_rate_code(frame_duration_ms: u32) -> u8 {
    (quantize_frame_duration(frame_duration_ms) / 5) as u8
}

/// Frame duration the peripheral can express, in milliseconds.
pub fn quantize_frame_duration(ms: u32) -> u32 {
    (ms.div_ceil(5) * 5).clamp(5, 80)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sizes() {
        assert_eq!(std::mem::size_of::<FTSample>(), 8);
        assert_eq!(FT_FRAME_HEADER_SIZE, 8);
        assert_eq!(FT_MAX_SAMPLES, 63);
        assert_eq!(std::mem::size_of::<FTPacket>(), FT_MAX_PACKET_SIZE);
        assert_eq!(FT_MIN_PACKET_SIZE, 4);
    }

    #[test]
    fn sample_fields_pack_and_unpack() {
        let s = FTSample::delta(4095, 17, 300);
        assert_eq!(s.x(), 4095);
        assert_eq!(s.y(), 17);
        assert!(s.dx() && s.dy());
        assert!(!s.nodac());
        assert_eq!(s.wait, 300);

        let r = FTSample::reset(2048, 0, 50);
        assert!(!r.dx() && !r.dy());
        assert_eq!(r.x(), 2048);

        let h = FTSample::hold(4);
        assert!(h.nodac());
        assert_eq!(h.wait, 4);
    }

    #[test]
    fn out_of_range_codes_saturate() {
        let s = FTSample::reset(u16::MAX, 5000, 0);
        assert_eq!(s.x(), FT_DAC_MAX);
        assert_eq!(s.y(), FT_DAC_MAX);
        assert!(!s.dx());
    }

    #[test]
    fn packet_size_tracks_count() {
        let mut p = FTPacket::frame();
        assert_eq!(p.size(), FT_FRAME_HEADER_SIZE);
        let taken = p.set_samples(&[FTSample::hold(1); 10]);
        assert_eq!(taken, 10);
        assert_eq!(p.size(), FT_FRAME_HEADER_SIZE + 80);
        assert_eq!(p.as_bytes().len(), p.size());
        assert_eq!(p.payload().len(), 10);

        let taken = p.set_samples(&[FTSample::hold(1); 100]);
        assert_eq!(taken, FT_MAX_SAMPLES);
        assert_eq!(p.size(), FT_MAX_PACKET_SIZE);
    }

    #[test]
    fn frame_flags() {
        let mut h = FTFrameHeader::default();
        h.set_sof(true);
        h.set_fps(16);
        assert!(h.sof());
        assert!(!h.eof());
        assert_eq!(h.fps(), 16);
        h.set_eof(true);
        h.set_sof(false);
        assert!(h.eof() && !h.sof());
        assert_eq!(h.fps(), 16);
    }

    #[test]
    fn rate_code_rounding() {
        assert_eq!(frame_rate_code(10), 2);
        assert_eq!(frame_rate_code(11), 3);
        assert_eq!(frame_rate_code(0), 1);
        assert_eq!(frame_rate_code(1000), 16);
        assert_eq!(quantize_frame_duration(42), 45);
    }
}
