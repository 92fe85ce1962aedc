use super::pcm::PcmSource;
use crate::{Error, Result, SourceFormat};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BuildStreamError, PlayStreamError, Sample, SampleFormat, SupportedStreamConfigsError,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, error};

/// Records `duration` of audio from the default input device, blocking the calling thread meanwhile.
/// The clip comes back in the device's native rate and channel layout.
pub fn record(duration: Duration) -> Result<PcmSource> {
    let err_fn = |err| error!("an error occurred on the input audio stream: {}", err);

    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => return Err(Error::NoInputDevice),
    };

    let mut supported_configs_range = match device.supported_input_configs() {
        Ok(r) => r,
        Err(SupportedStreamConfigsError::DeviceNotAvailable) => return Err(Error::DeviceNotAvailable),
        Err(SupportedStreamConfigsError::InvalidArgument) => return Err(Error::InvalidArgument),
        Err(SupportedStreamConfigsError::BackendSpecific { err }) => return Err(Error::CPALError(err)),
    };
    let supported_config = match supported_configs_range.next() {
        Some(c) => c,
        None => return Err(Error::DeviceNotUsable),
    }
    .with_max_sample_rate();

    let sample_rate = supported_config.sample_rate().0;
    let channel_count: u16 = supported_config.channels();
    let format = SourceFormat::float(sample_rate, channel_count);
    let wanted = (duration.as_secs_f64() * f64::from(sample_rate)).ceil() as usize * usize::from(channel_count);

    let sink: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::with_capacity(wanted)));

    let sample_format = supported_config.sample_format();
    let config = supported_config.into();
    let stream = match match sample_format {
        SampleFormat::F32 => device.build_input_stream(&config, capture_fn::<f32>(sink.clone(), wanted), err_fn),
        SampleFormat::I16 => device.build_input_stream(&config, capture_fn::<i16>(sink.clone(), wanted), err_fn),
        SampleFormat::U16 => device.build_input_stream(&config, capture_fn::<u16>(sink.clone(), wanted), err_fn),
    } {
        Ok(s) => s,
        Err(BuildStreamError::DeviceNotAvailable) => return Err(Error::DeviceNotAvailable),
        Err(BuildStreamError::StreamConfigNotSupported) => return Err(Error::DeviceNotUsable),
        Err(BuildStreamError::InvalidArgument) => return Err(Error::InvalidArgument),
        Err(BuildStreamError::StreamIdOverflow) => return Err(Error::StreamIdOverflow),
        Err(BuildStreamError::BackendSpecific { err }) => return Err(Error::CPALError(err)),
    };

    match stream.play() {
        Err(PlayStreamError::DeviceNotAvailable) => return Err(Error::DeviceNotAvailable),
        Err(PlayStreamError::BackendSpecific { err }) => return Err(Error::CPALError(err)),
        _ => (),
    }

    debug!(sample_rate, channels = channel_count, "recording {:?} of input", duration);
    std::thread::sleep(duration);
    drop(stream);

    let samples = match sink.lock() {
        Ok(mut samples) => std::mem::take(&mut *samples),
        Err(_) => return Err(Error::Read("capture buffer poisoned".into())),
    };
    Ok(PcmSource::new(format, samples))
}

fn capture_fn<T: Sample + 'static>(
    sink: Arc<Mutex<Vec<f32>>>,
    wanted: usize,
) -> impl FnMut(&[T], &cpal::InputCallbackInfo) + Send + 'static {
    move |data: &[T], _: &cpal::InputCallbackInfo| {
        if let Ok(mut samples) = sink.lock() {
            let room = wanted.saturating_sub(samples.len());
            samples.extend(data.iter().take(room).map(|s| s.to_f32()));
        }
    }
}
