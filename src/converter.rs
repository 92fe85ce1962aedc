//! Streaming format conversion: native-format chunks in, one bounded target-format buffer out.

use crate::{
    resampler::{self, Resampler},
    settings::CapacityBasis,
    source::{Chunks, InputStatus},
    AudioSource, ChannelMixer, ConverterSettings, Error, FormatDescriptor, PcmBuffer, Result, SourceFormat,
};
use tracing::{debug, error, instrument, warn};

/// Where a [`Converter`] is in its single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterState {
    Idle,
    Converting,
    Completed,
    Failed,
}

/// Converts one source into a [`PcmBuffer`] of the target format. Single use.
pub struct Converter {
    source_format: SourceFormat,
    target: FormatDescriptor,
    max_stalls: u32,
    staging_frames: usize,
    output: Option<PcmBuffer>,
    mixer: ChannelMixer,
    resampler: Box<dyn Resampler>,
    mixed: Vec<f32>,
    resampled: Vec<f32>,
    state: ConverterState,
}

impl Converter {
    /// Allocates the output buffer and builds the conversion unit for `source_format → target`.
    pub fn new(source_format: SourceFormat, target: FormatDescriptor, settings: &ConverterSettings) -> Result<Self> {
        target.validate()?;
        if source_format.sample_rate == 0 || source_format.channels == 0 || source_format.bytes_per_frame == 0 {
            return Err(Error::AllocationFailure(format!("unusable source format {:?}", source_format)));
        }

        let staging_frames = (settings.staging_bytes / source_format.bytes_per_frame as usize).max(1);

        let capacity_rate = match settings.capacity_basis {
            CapacityBasis::TargetRate => target.sample_rate,
            CapacityBasis::SourceRate => source_format.sample_rate,
        };
        let frame_capacity = FormatDescriptor::new(capacity_rate, target.channels).frames_for(settings.max_duration);
        let output = PcmBuffer::with_capacity(target, frame_capacity)?;

        let mixer = ChannelMixer::new(source_format.channels.into(), target.channels.into()).ok_or_else(|| {
            Error::AllocationFailure(format!("can't mix {} channels into {}", source_format.channels, target.channels))
        })?;
        let resampler = resampler::for_rates(
            settings.resampling_quality,
            source_format.sample_rate,
            target.sample_rate,
            target.channels.into(),
        );

        Ok(Self {
            source_format,
            target,
            max_stalls: settings.max_stalls,
            staging_frames,
            output: Some(output),
            mixer,
            resampler,
            mixed: Vec::new(),
            resampled: Vec::new(),
            state: ConverterState::Idle,
        })
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    /// Native frames pulled from the source per read.
    pub fn staging_frames(&self) -> usize {
        self.staging_frames
    }

    /// Most frames the output can hold.
    pub fn frame_capacity(&self) -> usize {
        self.output.as_ref().map(PcmBuffer::frame_capacity).unwrap_or(0)
    }

    /// Pulls `source` to the end (or until the output is full) and returns the converted audio.
    /// On failure nothing converted so far is kept.
    #[instrument(skip_all, fields(from = ?self.source_format, to = ?self.target))]
    pub fn run<S: AudioSource>(&mut self, source: &mut S) -> Result<PcmBuffer> {
        if self.state != ConverterState::Idle {
            return Err(Error::ConverterFinished);
        }
        if source.format() != self.source_format {
            self.state = ConverterState::Failed;
            return Err(Error::ConversionError(format!(
                "converter built for {:?} but source is {:?}",
                self.source_format,
                source.format()
            )));
        }

        self.state = ConverterState::Converting;
        match self.pump(source) {
            Ok(output) => {
                self.state = ConverterState::Completed;
                if output.is_truncated() {
                    warn!(
                        "source is longer than the output buffer; kept the first {:?}",
                        output.duration()
                    );
                }
                debug!(frames = output.frames(), "conversion completed");
                Ok(output)
            }
            Err(e) => {
                self.state = ConverterState::Failed;
                error!("conversion failed: {}", e);
                Err(e)
            }
        }
    }

    fn pump<S: AudioSource>(&mut self, source: &mut S) -> Result<PcmBuffer> {
        let mut output = self.output.take().ok_or(Error::ConverterFinished)?;
        let mut chunks = Chunks::new(source, self.staging_frames);
        let mut stalls = 0;

        let ended = loop {
            if output.is_full() {
                break false;
            }

            match chunks.next_chunk() {
                InputStatus::HaveData(data) => {
                    stalls = 0;
                    self.mixed.clear();
                    self.mixer.mix(data, &mut self.mixed);
                    self.resampled.clear();
                    self.resampler.process(&self.mixed, &mut self.resampled);
                    output.append(&self.resampled);
                }
                InputStatus::NoDataNow => {
                    stalls += 1;
                    debug!(stalls, "source has no data right now");
                    if stalls > self.max_stalls {
                        return Err(Error::ConversionError(format!(
                            "source stalled {} times in a row at frame {}",
                            stalls,
                            chunks.source().position()
                        )));
                    }
                }
                InputStatus::EndOfStream => break true,
                InputStatus::Failed(reason) => {
                    return Err(Error::ConversionError(format!("source failed before its end: {}", reason)));
                }
            }
        };

        self.resampled.clear();
        self.resampler.flush(&mut self.resampled);
        if ended {
            output.append(&self.resampled);
        } else if !self.resampled.is_empty() || !chunks.source().is_exhausted() {
            output.mark_truncated();
        }

        Ok(output)
    }
}

/// Converts `source` into `target` with the default settings: 64 KiB reads, at most 12 seconds of output.
pub fn convert<S: AudioSource>(source: &mut S, target: FormatDescriptor) -> Result<PcmBuffer> {
    convert_with(source, target, &ConverterSettings::default())
}

/// Converts `source` into `target`.
pub fn convert_with<S: AudioSource>(
    source: &mut S,
    target: FormatDescriptor,
    settings: &ConverterSettings,
) -> Result<PcmBuffer> {
    Converter::new(source.format(), target, settings)?.run(source)
}
