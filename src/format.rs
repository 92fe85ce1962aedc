use crate::{Error, Result};
use std::time::Duration;

/// Highest channel count we accept for a conversion target.
pub const MAX_CHANNELS: u16 = 32;

/// Size in bytes of one sample in the processing format (32-bit float).
pub const BYTES_PER_SAMPLE: u32 = 4;

/// Native format of an [`AudioSource`](crate::AudioSource), as seen by the converter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per interleaved frame of the processing format.
    pub bytes_per_frame: u32,
}

impl SourceFormat {
    /// Describes a source delivering 32-bit float interleaved frames.
    pub fn float(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels, bytes_per_frame: u32::from(channels) * BYTES_PER_SAMPLE }
    }
}

/// Target format for conversion output. Samples are always 32-bit float, interleaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
}

impl FormatDescriptor {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Single-channel output at `sample_rate`.
    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    /// Checks that this describes something the converter can produce.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::UnsupportedFormat("sample rate must be non-zero".into()));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(Error::UnsupportedFormat(format!(
                "channel count must be between 1 and {}, got {}",
                MAX_CHANNELS, self.channels
            )));
        }
        Ok(())
    }

    /// Number of whole frames covering `duration` at this rate.
    pub fn frames_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as usize
    }
}

impl Default for FormatDescriptor {
    /// 44.1 kHz mono, the format fingerprinters expect.
    fn default() -> Self {
        Self::mono(44_100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_format_bytes_per_frame() {
        assert_eq!(SourceFormat::float(48_000, 2).bytes_per_frame, 8);
        assert_eq!(SourceFormat::float(44_100, 1).bytes_per_frame, 4);
    }

    #[test]
    fn validate_rejects_degenerate_targets() {
        assert!(FormatDescriptor::new(0, 1).validate().is_err());
        assert!(FormatDescriptor::new(44_100, 0).validate().is_err());
        assert!(FormatDescriptor::new(44_100, MAX_CHANNELS + 1).validate().is_err());
        assert!(FormatDescriptor::default().validate().is_ok());
    }

    #[test]
    fn frames_for_twelve_seconds() {
        assert_eq!(FormatDescriptor::mono(44_100).frames_for(Duration::from_secs(12)), 529_200);
    }
}
