//! Compressed or containerised audio, decoded with Symphonia.

use crate::{AudioSource, Error, Result, SourceFormat};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, instrument, warn};

/// An audio file in any container/codec Symphonia understands, decoded on demand.
pub struct DecodedSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    n_frames: Option<u64>,
    position: u64,
    /// Decoded samples not yet handed out.
    pending: Vec<f32>,
    pending_offset: usize,
    eof: bool,
    /// Set once the demuxer or decoder breaks for good.
    failure: Option<String>,
}

impl DecodedSource {
    /// Opens and probes the file at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            error!("Failed to open {}: {}", path.display(), e);
            Error::UnopenableSource(format!("{}: {}", path.display(), e))
        })?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        Self::from_media_source(Box::new(file), hint)
    }

    /// Probes an in-memory file. `extension` helps the probe pick a container.
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        Self::from_media_source(Box::new(Cursor::new(data)), hint)
    }

    /// Probes any Symphonia media source, such as a network stream.
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(media_source, Default::default());
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::UnopenableSource(format!("failed to probe format: {}", e)))?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::UnopenableSource("no decodable audio track".into()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::UnopenableSource("track has no sample rate".into()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::UnopenableSource("track has no channel layout".into()))?;
        let track_id = track.id;
        let n_frames = params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| Error::AllocationFailure(format!("failed to create codec decoder: {}", e)))?;

        debug!(sample_rate, channels, ?n_frames, "opened audio track {}", track_id);

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            n_frames,
            position: 0,
            pending: Vec::new(),
            pending_offset: 0,
            eof: false,
            failure: None,
        })
    }

    /// Decodes the next packet of our track into `pending`.
    fn decode_next_packet(&mut self) -> Result<()> {
        let packet = loop {
            match self.format_reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => break packet,
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    return Ok(());
                }
                Err(e) => {
                    error!("Failed to read packet: {}", e);
                    self.failure = Some(e.to_string());
                    return Err(Error::Read(e.to_string()));
                }
            }
        };

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if spec.channels.count() != usize::from(self.channels) {
                    let reason =
                        format!("channel count changed mid-stream from {} to {}", self.channels, spec.channels.count());
                    self.failure = Some(reason.clone());
                    return Err(Error::Read(reason));
                }
                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                self.pending.clear();
                self.pending.extend_from_slice(samples.samples());
                self.pending_offset = 0;
                Ok(())
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt packet: {}", e);
                Err(Error::Read(e.to_string()))
            }
            Err(e) => {
                error!("Decoder failed: {}", e);
                self.failure = Some(e.to_string());
                Err(Error::Read(e.to_string()))
            }
        }
    }
}

impl AudioSource for DecodedSource {
    fn format(&self) -> SourceFormat {
        SourceFormat::float(self.sample_rate, self.channels)
    }

    fn length_frames(&self) -> Option<u64> {
        self.n_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let channels = usize::from(self.channels);
        let capacity = buffer.len() / channels * channels;
        let mut written = 0;

        while written < capacity {
            if self.pending_offset >= self.pending.len() {
                if self.eof {
                    break;
                }
                if let Some(reason) = &self.failure {
                    if written > 0 {
                        break;
                    }
                    return Err(Error::Read(reason.clone()));
                }
                if let Err(e) = self.decode_next_packet() {
                    // Hand out what we already have before reporting anything
                    if written > 0 {
                        break;
                    }
                    return Err(e);
                }
                continue;
            }

            let count = (self.pending.len() - self.pending_offset).min(capacity - written);
            buffer[written..written + count]
                .copy_from_slice(&self.pending[self.pending_offset..self.pending_offset + count]);
            self.pending_offset += count;
            written += count;
        }

        let frames = written / channels;
        self.position += frames as u64;
        Ok(frames)
    }

    fn is_exhausted(&self) -> bool {
        let drained = self.pending_offset >= self.pending.len();
        match self.n_frames {
            Some(n_frames) if self.position >= n_frames => true,
            _ => self.eof && drained,
        }
    }

    fn has_failed(&self) -> bool {
        self.failure.is_some() && !self.is_exhausted()
    }
}
