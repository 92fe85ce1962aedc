use crate::{AudioSource, Result, SourceFormat};
use thiserror::Error;

/// A RIFF/WAVE file held in memory, read frame by frame as f32.
pub struct WavSource {
    file: Vec<u8>,
    channels: u16,
    sample_rate: u32,
    block_align: usize,
    sample_bytes: usize,
    data_start: usize,
    frames: usize,
    position: usize,
    sample_getter: fn(&[u8], usize) -> Option<f32>,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// This does not appear to be a .wav file
    #[error("not a wav file")]
    InvalidFile,

    /// The audio data in this file is malformed
    #[error("malformed wav data")]
    MalformedData,

    /// The audio data in this file is encoded in a way we don't support
    #[error("unsupported wav encoding")]
    UnknownFormat,
}

struct Chunk {
    id: [u8; 4],
    start: usize,
    len: usize,
}

/// Walks the RIFF chunk list following the 12-byte header.
fn chunks(file: &[u8]) -> impl Iterator<Item = Chunk> + '_ {
    let mut offset = 12;
    std::iter::from_fn(move || {
        let header = file.get(offset..offset + 8)?;
        let id = [header[0], header[1], header[2], header[3]];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = offset + 8;
        // Chunks are word-aligned
        offset = start.checked_add(len)?.checked_add(len & 1)?;
        Some(Chunk { id, start, len })
    })
}

impl WavSource {
    pub fn new(file: impl Into<Vec<u8>>) -> std::result::Result<Self, Error> {
        let mut file = file.into();
        if file.len() < 12 || file[0..4] != [b'R', b'I', b'F', b'F'] || file[8..12] != [b'W', b'A', b'V', b'E'] {
            return Err(Error::InvalidFile);
        }

        let fmt = chunks(&file).find(|c| &c.id == b"fmt ").ok_or(Error::InvalidFile)?;
        if fmt.len < 16 || fmt.start + 16 > file.len() {
            return Err(Error::MalformedData);
        }
        let f = &file[fmt.start..fmt.start + 16];
        let mut audio_format = u16::from_le_bytes([f[0], f[1]]);
        let channels = u16::from_le_bytes([f[2], f[3]]);
        let sample_rate = u32::from_le_bytes([f[4], f[5], f[6], f[7]]);
        let block_align = usize::from(u16::from_le_bytes([f[12], f[13]]));
        let sample_bits = u16::from_le_bytes([f[14], f[15]]);

        // WAVE_FORMAT_EXTENSIBLE keeps the real format tag at the start of the subformat GUID
        if audio_format == 0xFFFE {
            if fmt.len < 26 || fmt.start + 26 > file.len() {
                return Err(Error::MalformedData);
            }
            audio_format = u16::from_le_bytes([file[fmt.start + 24], file[fmt.start + 25]]);
        }

        let data = chunks(&file).find(|c| &c.id == b"data").ok_or(Error::InvalidFile)?;
        let expected_file_length = data.start + data.len;
        if expected_file_length > file.len() {
            return Err(Error::MalformedData);
        } else {
            file.truncate(expected_file_length);
        }

        let sample_getter = match (audio_format, sample_bits) {
            (1, 8) => get_sample_u8,
            (1, 16) => get_sample_i16,
            (1, 24) => get_sample_i24,
            (1, 32) => get_sample_i32,
            (3, 32) => get_sample_f32,
            _ => return Err(Error::UnknownFormat),
        };

        let sample_bytes = usize::from(sample_bits / 8);
        if channels == 0 || sample_rate == 0 || block_align < sample_bytes * usize::from(channels) {
            return Err(Error::MalformedData);
        }

        Ok(Self {
            file,
            channels,
            sample_rate,
            block_align,
            sample_bytes,
            data_start: data.start,
            frames: data.len / block_align,
            position: 0,
            sample_getter,
        })
    }

    fn get_sample(&self, frame: usize, channel: usize) -> Option<f32> {
        let offset = frame * self.block_align + channel * self.sample_bytes;
        (self.sample_getter)(&self.file[self.data_start..], offset)
    }
}

impl AudioSource for WavSource {
    fn format(&self) -> SourceFormat {
        SourceFormat::float(self.sample_rate, self.channels)
    }

    fn length_frames(&self) -> Option<u64> {
        Some(self.frames as u64)
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let channels = usize::from(self.channels);
        let wanted = (buffer.len() / channels).min(self.frames - self.position);

        for (i, out) in buffer.chunks_exact_mut(channels).take(wanted).enumerate() {
            let frame = self.position + i;
            for (channel, sample) in out.iter_mut().enumerate() {
                *sample = self.get_sample(frame, channel).ok_or(Error::MalformedData)?;
            }
        }

        self.position += wanted;
        Ok(wanted)
    }
}

fn get_sample_u8(data: &[u8], offset: usize) -> Option<f32> {
    let sample = data.get(offset).copied().map(i16::from)? - 0x80;
    Some(f32::from(sample) / 128.0)
}

fn get_sample_i16(data: &[u8], offset: usize) -> Option<f32> {
    let sample = i16::from_le_bytes([data.get(offset).copied()?, data.get(offset + 1).copied()?]);
    Some(f32::from(sample) / 32768.0)
}

fn get_sample_i24(data: &[u8], offset: usize) -> Option<f32> {
    // Shift into the top of an i32 so the sign bit lands where it belongs
    let sample = i32::from_le_bytes([
        0,
        data.get(offset).copied()?,
        data.get(offset + 1).copied()?,
        data.get(offset + 2).copied()?,
    ]) >> 8;
    Some((sample as f32) / 8388608.0)
}

fn get_sample_i32(data: &[u8], offset: usize) -> Option<f32> {
    let sample = i32::from_le_bytes([
        data.get(offset).copied()?,
        data.get(offset + 1).copied()?,
        data.get(offset + 2).copied()?,
        data.get(offset + 3).copied()?,
    ]);
    Some((f64::from(sample) / 2147483648.0) as f32)
}

fn get_sample_f32(data: &[u8], offset: usize) -> Option<f32> {
    let sample = f32::from_le_bytes([
        data.get(offset).copied()?,
        data.get(offset + 1).copied()?,
        data.get(offset + 2).copied()?,
        data.get(offset + 3).copied()?,
    ]);
    Some(sample)
}

/// Encodes interleaved samples as a 16-bit PCM wav file.
pub fn encode_i16(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut file = Vec::with_capacity(44 + samples.len() * 2);

    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(36 + data_len).to_le_bytes());
    file.extend_from_slice(b"WAVEfmt ");
    file.extend_from_slice(&16u32.to_le_bytes());
    file.extend_from_slice(&1u16.to_le_bytes());
    file.extend_from_slice(&channels.to_le_bytes());
    file.extend_from_slice(&sample_rate.to_le_bytes());
    file.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    file.extend_from_slice(&block_align.to_le_bytes());
    file.extend_from_slice(&16u16.to_le_bytes());
    file.extend_from_slice(b"data");
    file.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let value = (sample.max(-1.0).min(1.0) * 32767.0).round() as i16;
        file.extend_from_slice(&value.to_le_bytes());
    }

    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_riff_data() {
        assert_eq!(WavSource::new(vec![0u8; 64]).err(), Some(Error::InvalidFile));
        assert_eq!(WavSource::new(b"RIFF".to_vec()).err(), Some(Error::InvalidFile));
    }

    #[test]
    fn rejects_truncated_data_chunk() {
        let mut file = encode_i16(8_000, 1, &[0.0; 16]);
        file.truncate(file.len() - 4);
        assert_eq!(WavSource::new(file).err(), Some(Error::MalformedData));
    }

    #[test]
    fn rejects_unknown_encodings() {
        let mut file = encode_i16(8_000, 1, &[0.0; 4]);
        // Pretend it's A-law
        file[20] = 6;
        assert_eq!(WavSource::new(file).err(), Some(Error::UnknownFormat));
    }

    #[test]
    fn decodes_i16_stereo() {
        let file = encode_i16(22_050, 2, &[0.5, -0.5, 0.25, -0.25]);
        let mut source = WavSource::new(file).unwrap();
        assert_eq!(source.format(), SourceFormat::float(22_050, 2));
        assert_eq!(source.length_frames(), Some(2));

        let mut buffer = [0.0; 8];
        assert_eq!(source.read(&mut buffer).unwrap(), 2);
        for (got, want) in buffer[..4].iter().zip(&[0.5, -0.5, 0.25, -0.25]) {
            assert!((got - want).abs() < 1e-4, "{} != {}", got, want);
        }
        assert_eq!(source.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn i24_sign_extension() {
        assert_eq!(get_sample_i24(&[0xFF, 0xFF, 0xFF], 0), Some(-1.0 / 8388608.0));
        assert_eq!(get_sample_i24(&[0x00, 0x00, 0x80], 0), Some(-1.0));
    }

    #[test]
    fn skips_unrelated_chunks() {
        let plain = encode_i16(8_000, 1, &[0.5; 3]);
        let mut file = plain[..12].to_vec();
        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&3u32.to_le_bytes());
        file.extend_from_slice(&[1, 2, 3, 0]);
        file.extend_from_slice(&plain[12..]);

        let source = WavSource::new(file).unwrap();
        assert_eq!(source.length_frames(), Some(3));
    }
}
