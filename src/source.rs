pub mod capture;
pub mod decoded;
pub mod pcm;
pub mod wav;

use crate::{Result, SourceFormat};
use tracing::{debug, error};

/// A finite audio stream the converter can pull frames from.
/// Samples are delivered as interleaved f32 frames in the source's native channel layout and rate.
pub trait AudioSource {
    /// Native format of the samples returned by `read`.
    fn format(&self) -> SourceFormat;

    /// Total length of the stream in frames, if known up front.
    fn length_frames(&self) -> Option<u64>;

    /// Number of frames read so far.
    fn position(&self) -> u64;

    /// Reads up to `buffer.len() / channels` whole frames into `buffer`, returning the number of frames read.
    /// Ok(0) means the stream is exhausted. An error is a failed read, which the caller may retry
    /// unless [`has_failed`](AudioSource::has_failed) says otherwise.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Whether every frame of the stream has been delivered.
    fn is_exhausted(&self) -> bool {
        match self.length_frames() {
            Some(length) => self.position() >= length,
            None => false,
        }
    }

    /// Whether the stream broke for good; once true, every further read fails.
    fn has_failed(&self) -> bool {
        false
    }

    /// Pulls the stream as a sequence of chunks of at most `frames` frames each.
    fn chunks(&mut self, frames: usize) -> Chunks<'_, Self>
    where
        Self: Sized,
    {
        Chunks::new(self, frames)
    }
}

impl<S: AudioSource + ?Sized> AudioSource for &mut S {
    fn format(&self) -> SourceFormat {
        (**self).format()
    }

    fn length_frames(&self) -> Option<u64> {
        (**self).length_frames()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn has_failed(&self) -> bool {
        (**self).has_failed()
    }
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn format(&self) -> SourceFormat {
        (**self).format()
    }

    fn length_frames(&self) -> Option<u64> {
        (**self).length_frames()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn has_failed(&self) -> bool {
        (**self).has_failed()
    }
}

/// Result of asking a [`Chunks`] reader for more input.
#[derive(Debug, PartialEq)]
pub enum InputStatus<'a> {
    /// Interleaved frames in the source's native format.
    HaveData(&'a [f32]),
    /// A read failed but the source isn't exhausted yet; asking again may succeed.
    NoDataNow,
    /// No more input will ever be produced.
    EndOfStream,
    /// The source failed before reaching its end and can't continue.
    Failed(String),
}

/// Lazy, finite, non-restartable sequence of native-format chunks drawn from a source.
///
/// Chunks are lent out of a single staging buffer that is overwritten on every call, so
/// this doesn't implement `Iterator`; call `next_chunk` until it returns `EndOfStream` or `Failed`.
pub struct Chunks<'s, S: AudioSource> {
    source: &'s mut S,
    staging: Vec<f32>,
    channels: usize,
    finished: bool,
    failure: Option<String>,
}

impl<'s, S: AudioSource> Chunks<'s, S> {
    /// Prepares a reader with a staging buffer of `frames` frames (at least one).
    pub fn new(source: &'s mut S, frames: usize) -> Self {
        let channels = usize::from(source.format().channels).max(1);
        Self { source, staging: vec![0.0; frames.max(1) * channels], channels, finished: false, failure: None }
    }

    /// Staging buffer capacity in frames.
    pub fn frame_capacity(&self) -> usize {
        self.staging.len() / self.channels
    }

    /// The source being drained.
    pub fn source(&self) -> &S {
        &*self.source
    }

    /// Reads the next chunk into the staging buffer.
    pub fn next_chunk(&mut self) -> InputStatus<'_> {
        if self.finished {
            return match &self.failure {
                Some(reason) => InputStatus::Failed(reason.clone()),
                None => InputStatus::EndOfStream,
            };
        }

        match self.source.read(&mut self.staging) {
            Ok(0) => {
                self.finished = true;
                InputStatus::EndOfStream
            }
            Ok(frames) => {
                let len = (frames * self.channels).min(self.staging.len());
                InputStatus::HaveData(&self.staging[..len])
            }
            Err(err) if self.source.has_failed() => {
                error!(position = self.source.position(), "source failed: {}", err);
                let reason = err.to_string();
                self.finished = true;
                self.failure = Some(reason.clone());
                InputStatus::Failed(reason)
            }
            Err(_) if self.source.is_exhausted() => {
                self.finished = true;
                InputStatus::EndOfStream
            }
            Err(err) => {
                debug!("no input available yet: {}", err);
                InputStatus::NoDataNow
            }
        }
    }
}
