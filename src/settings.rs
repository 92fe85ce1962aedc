//! Converter configuration.

use std::time::Duration;

/// Default staging buffer budget, in bytes of native-format audio.
pub const DEFAULT_STAGING_BYTES: usize = 64 * 1024;

/// Default longest clip the output buffer will hold.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(12);

/// Default number of back-to-back failed reads tolerated before giving up.
pub const DEFAULT_MAX_STALLS: u32 = 64;

/// Settings for a [`Converter`](crate::Converter).
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterSettings {
    /// Size of the input staging buffer in bytes. The converter reads
    /// `staging_bytes / bytes_per_frame` native frames at a time (at least one).
    /// Default: 64 KiB.
    pub staging_bytes: usize,

    /// Longest stretch of audio the output buffer holds. Anything past this is dropped
    /// and the buffer is marked truncated.
    /// Default: 12 seconds.
    pub max_duration: Duration,

    /// Which sample rate `max_duration` is measured at when sizing the output buffer.
    /// Default: [`CapacityBasis::TargetRate`].
    pub capacity_basis: CapacityBasis,

    /// Resampling quality.
    /// Default: High.
    pub resampling_quality: ResamplingQuality,

    /// How many consecutive "no data now" reads are retried before the conversion fails.
    /// Default: 64.
    pub max_stalls: u32,
}

/// How the output buffer's frame capacity is derived from `max_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityBasis {
    /// `max_duration` at the target rate, so a full buffer holds exactly `max_duration` of audio.
    TargetRate,
    /// `max_duration` at the source's native rate. When downsampling this holds more than
    /// `max_duration` of output audio, when upsampling less.
    SourceRate,
}

/// Resampling quality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResamplingQuality {
    /// Linear interpolation. Fast, aliases.
    Low,
    /// Polyphase windowed-sinc.
    High,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            staging_bytes: DEFAULT_STAGING_BYTES,
            max_duration: DEFAULT_MAX_DURATION,
            capacity_basis: CapacityBasis::TargetRate,
            resampling_quality: ResamplingQuality::High,
            max_stalls: DEFAULT_MAX_STALLS,
        }
    }
}

impl ConverterSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staging_bytes(mut self, bytes: usize) -> Self {
        self.staging_bytes = bytes;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn with_capacity_basis(mut self, basis: CapacityBasis) -> Self {
        self.capacity_basis = basis;
        self
    }

    pub fn with_resampling_quality(mut self, quality: ResamplingQuality) -> Self {
        self.resampling_quality = quality;
        self
    }

    pub fn with_max_stalls(mut self, stalls: u32) -> Self {
        self.max_stalls = stalls;
        self
    }
}
