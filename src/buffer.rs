use crate::{Error, FormatDescriptor, Result};
use std::time::Duration;

/// Converted audio: interleaved f32 samples in a fixed target format, with a fixed frame capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmBuffer {
    format: FormatDescriptor,
    samples: Vec<f32>,
    frame_capacity: usize,
    truncated: bool,
}

impl PcmBuffer {
    /// Allocates room for `frame_capacity` frames up front.
    pub fn with_capacity(format: FormatDescriptor, frame_capacity: usize) -> Result<Self> {
        format.validate()?;
        let channels = usize::from(format.channels);
        let len = frame_capacity
            .checked_mul(channels)
            .ok_or_else(|| Error::AllocationFailure(format!("{} frames overflows", frame_capacity)))?;

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(len)
            .map_err(|e| Error::AllocationFailure(format!("output buffer of {} frames: {}", frame_capacity, e)))?;

        Ok(Self { format, samples, frame_capacity, truncated: false })
    }

    pub fn format(&self) -> FormatDescriptor {
        self.format
    }

    /// Frames written so far.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels)
    }

    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }

    pub fn remaining_frames(&self) -> usize {
        self.frame_capacity - self.frames()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames() >= self.frame_capacity
    }

    /// Whether audio was dropped because the buffer filled up.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Length of the audio held, at the target rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.format.sample_rate))
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Samples of a single channel.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let channels = usize::from(self.format.channels);
        let skip = if channel < channels { channel } else { self.samples.len() };
        self.samples.iter().copied().skip(skip).step_by(channels)
    }

    /// Samples as signed 16-bit integers, the form most fingerprinters consume.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| (s.max(-1.0).min(1.0) * f32::from(i16::MAX)).round() as i16).collect()
    }

    /// Appends whole frames from `samples`, stopping at capacity. Returns the number of frames written.
    /// If anything had to be left out the buffer is marked truncated.
    pub fn append(&mut self, samples: &[f32]) -> usize {
        let channels = usize::from(self.format.channels);
        let offered = samples.len() / channels;
        let frames = offered.min(self.remaining_frames());
        self.samples.extend_from_slice(&samples[..frames * channels]);
        if frames < offered {
            self.truncated = true;
        }
        frames
    }

    pub(crate) fn mark_truncated(&mut self) {
        self.truncated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_stops_at_capacity() {
        let mut buffer = PcmBuffer::with_capacity(FormatDescriptor::new(10, 2), 3).unwrap();
        assert_eq!(buffer.append(&[0.1, 0.2, 0.3, 0.4]), 2);
        assert!(!buffer.is_truncated());
        assert_eq!(buffer.append(&[0.5, 0.6, 0.7, 0.8]), 1);
        assert!(buffer.is_truncated());
        assert!(buffer.is_full());
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.samples(), &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn channelless_format_is_rejected() {
        assert!(matches!(
            PcmBuffer::with_capacity(FormatDescriptor::new(44_100, 0), 10),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(PcmBuffer::with_capacity(FormatDescriptor::new(0, 1), 10).is_err());
    }

    #[test]
    fn channel_iterates_one_channel() {
        let mut buffer = PcmBuffer::with_capacity(FormatDescriptor::new(10, 2), 4).unwrap();
        buffer.append(&[1.0, -1.0, 2.0, -2.0]);
        assert_eq!(buffer.channel(1).collect::<Vec<_>>(), vec![-1.0, -2.0]);
        assert_eq!(buffer.channel(2).count(), 0);
    }

    #[test]
    fn duration_at_target_rate() {
        let mut buffer = PcmBuffer::with_capacity(FormatDescriptor::mono(100), 200).unwrap();
        buffer.append(&[0.0; 150]);
        assert_eq!(buffer.duration(), Duration::from_millis(1_500));
    }

    #[test]
    fn to_i16_clamps() {
        let mut buffer = PcmBuffer::with_capacity(FormatDescriptor::mono(100), 3).unwrap();
        buffer.append(&[2.0, -0.5, -2.0]);
        assert_eq!(buffer.to_i16(), vec![32767, -16384, -32767]);
    }

    #[test]
    fn absurd_capacity_fails_to_allocate() {
        assert!(PcmBuffer::with_capacity(FormatDescriptor::new(10, 2), usize::MAX).is_err());
    }
}
