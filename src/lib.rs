//! Prepares audio clips for acoustic fingerprinting.
//!
//! Any [`AudioSource`] (a decoded file, an in-memory wav, raw PCM or a microphone recording) is pulled
//! chunk by chunk, mixed to the target channel layout, resampled to the target rate and collected in a
//! [`PcmBuffer`] holding at most 12 seconds of audio. The [`session`] module takes that buffer through
//! caller-supplied fingerprinting and catalog lookup.
//!
//! ```no_run
//! use clipmatch::{convert, source::decoded::DecodedSource, FormatDescriptor};
//!
//! let mut source = DecodedSource::open("Audio.mp3")?;
//! let clip = convert(&mut source, FormatDescriptor::mono(44_100))?;
//! println!("{:?} of audio, truncated: {}", clip.duration(), clip.is_truncated());
//! # Ok::<(), clipmatch::Error>(())
//! ```

mod buffer;
mod converter;
mod error;
mod format;
mod mixer;
pub mod resampler;
pub mod session;
mod settings;
pub mod source;

pub use buffer::PcmBuffer;
pub use converter::{convert, convert_with, Converter, ConverterState};
pub use error::{Error, Result};
pub use format::{FormatDescriptor, SourceFormat, BYTES_PER_SAMPLE, MAX_CHANNELS};
pub use mixer::ChannelMixer;
pub use resampler::Resampler;
pub use settings::{
    CapacityBasis, ConverterSettings, ResamplingQuality, DEFAULT_MAX_DURATION, DEFAULT_MAX_STALLS,
    DEFAULT_STAGING_BYTES,
};
pub use source::{AudioSource, Chunks, InputStatus};
