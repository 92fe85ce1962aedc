use crate::{AudioSource, Result, SourceFormat};

/// Interleaved f32 samples held in memory.
#[derive(Clone, Debug)]
pub struct PcmSource {
    format: SourceFormat,
    samples: Vec<f32>,
    position: usize,
}

impl PcmSource {
    /// Wraps interleaved samples. A trailing partial frame is dropped.
    pub fn new(format: SourceFormat, mut samples: Vec<f32>) -> Self {
        let channels = usize::from(format.channels).max(1);
        samples.truncate(samples.len() - samples.len() % channels);
        Self { format, samples, position: 0 }
    }

    /// Builds a source by evaluating `f(frame, channel)` for every sample.
    pub fn from_fn(format: SourceFormat, frames: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let channels = usize::from(format.channels);
        let mut samples = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for channel in 0..channels {
                samples.push(f(frame, channel));
            }
        }
        Self::new(format, samples)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn channels(&self) -> usize {
        usize::from(self.format.channels).max(1)
    }
}

impl AudioSource for PcmSource {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn length_frames(&self) -> Option<u64> {
        Some((self.samples.len() / self.channels()) as u64)
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let channels = self.channels();
        let start = self.position * channels;
        let available = self.samples.len() - start;
        let count = (buffer.len() / channels * channels).min(available);

        buffer[..count].copy_from_slice(&self.samples[start..start + count]);
        self.position += count / channels;
        Ok(count / channels)
    }
}
