use crate::error::FormatError;

/// Encoding family of an output device's mix format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveEncoding {
    Pcm,
    IeeeFloat,
    /// Any other format tag, kept for error reporting.
    Other(u16),
}

/// Output device format as negotiated by the audio subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixFormat {
    pub encoding: WaveEncoding,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes per frame across all channels.
    pub block_align: u16,
}

impl MixFormat {
    /// Interleaved stereo format carrying `format` samples.
    pub fn stereo(format: SampleFormat, sample_rate: u32) -> Self {
        let (encoding, bits) = match format {
            SampleFormat::Float32 => (WaveEncoding::IeeeFloat, 32),
            SampleFormat::Pcm16 => (WaveEncoding::Pcm, 16),
            SampleFormat::Pcm24 => (WaveEncoding::Pcm, 24),
        };
        Self {
            encoding,
            channels: 2,
            sample_rate,
            bits_per_sample: bits,
            block_align: format.block_align() as u16,
        }
    }
}

/// Sample representation written into blocks.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumIter,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    Float32,
    Pcm16,
    Pcm24,
}

impl SampleFormat {
    /// Pick the sample representation for a device format.
    pub fn resolve(format: &MixFormat) -> Result<Self, FormatError> {
        if format.channels != 2 {
            return Err(FormatError::NotStereo(format.channels));
        }
        let resolved = match (format.encoding, format.bits_per_sample) {
            (WaveEncoding::Pcm, 16) => Some(SampleFormat::Pcm16),
            (WaveEncoding::Pcm, 24) => Some(SampleFormat::Pcm24),
            (WaveEncoding::IeeeFloat, 32) => Some(SampleFormat::Float32),
            _ => None,
        };
        match resolved {
            Some(f) if f.block_align() == format.block_align as usize => Ok(f),
            _ => Err(FormatError::Unsupported {
                encoding: format.encoding,
                bits: format.bits_per_sample,
                block_align: format.block_align,
            }),
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Float32 => 4,
            SampleFormat::Pcm16 => 2,
            SampleFormat::Pcm24 => 3,
        }
    }

    /// Bytes per stereo frame.
    pub fn block_align(self) -> usize {
        2 * self.bytes_per_sample()
    }

    /// Write one stereo frame, left = `x`, right = `y`, into the start
    /// of `dst`, which must hold at least `block_align` bytes.
    pub fn write_frame(self, dst: &mut [u8], x: f32, y: f32) {
        let n = self.bytes_per_sample();
        let (left, right) = dst[..2 * n].split_at_mut(n);
        self.write_sample(left, x);
        self.write_sample(right, y);
    }

    fn write_sample(self, dst: &mut [u8], v: f32) {
        match self {
            SampleFormat::Float32 => dst.copy_from_slice(&v.to_le_bytes()),
            SampleFormat::Pcm16 => dst.copy_from_slice(&pcm16(v).to_le_bytes()),
            SampleFormat::Pcm24 => dst.copy_from_slice(&pcm24(v).to_le_bytes()[..3]),
        }
    }
}

/// Full scale is +-32767; out-of-range input saturates.
pub fn pcm16(v: f32) -> i16 {
    (v * i16::MAX as f32).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// 24-bit code in the low three bytes: scaled to 32 bits, then shifted down.
pub fn pcm24(v: f32) -> i32 {
    let wide = (v as f64 * i32::MAX as f64)
        .round()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    wide >> 8
}
