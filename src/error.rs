//! Error types for the encoders and their transports.

/// Rejected output format, returned from `initialize`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// One axis maps to each channel, so exactly two are required.
    #[error("output must be stereo, got {0} channel(s)")]
    NotStereo(u16),

    #[error("unsupported sample format: {encoding:?}, {bits} bits, block align {block_align}")]
    Unsupported {
        encoding: crate::audio::WaveEncoding,
        bits: u16,
        block_align: u16,
    },

    #[error("frames per period must be non-zero")]
    EmptyPeriod,

    #[error("period of {frames} frames does not fit in a block")]
    PeriodTooLong { frames: u32 },
}

/// Misuse of the real-time pull path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("sample feed used before initialize")]
    NotInitialized,

    #[error("requested {requested} bytes but blocks hold {block}")]
    SizeMismatch { requested: usize, block: usize },
}

/// Failure while encoding a frame into sample blocks.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("audio output not initialized")]
    NotInitialized,

    /// The producer outran the consumer without pacing on `wait_sync`.
    #[error("delivery ring full ({capacity} blocks), frame dropped")]
    RingOverflow { capacity: usize },
}

/// Integrator transport failure.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("{op}: no device connected")]
    NotConnected { op: &'static str },

    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: acknowledgement too short ({len} bytes)")]
    ShortAck { op: &'static str, len: usize },
}

impl LinkError {
    pub fn io(op: &'static str, source: std::io::Error) -> Self {
        LinkError::Io { op, source }
    }

    /// Numeric code for callers that only keep a status word. OS errors
    /// keep their errno; everything else gets a fixed negative code.
    pub fn code(&self) -> i32 {
        match self {
            LinkError::NotConnected { .. } => -1,
            LinkError::Io { source, .. } => source.raw_os_error().unwrap_or(match source.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => -3,
                std::io::ErrorKind::UnexpectedEof => -4,
                _ => -2,
            }),
            LinkError::ShortAck { .. } => -5,
        }
    }
}
