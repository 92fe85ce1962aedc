use clipmatch::{
    convert, convert_with,
    source::{decoded::DecodedSource, pcm::PcmSource, wav, wav::WavSource},
    AudioSource, ConverterSettings, Error, FormatDescriptor, SourceFormat,
};
use std::{f64::consts::PI, time::Duration};

fn sine_at(frame: usize, rate: u32, freq: f64) -> f32 {
    ((frame as f64 * freq * 2.0 * PI / f64::from(rate)).sin() * 0.5) as f32
}

fn tone(rate: u32, channels: u16, seconds: f64, freq: f64) -> PcmSource {
    let frames = (seconds * f64::from(rate)) as usize;
    PcmSource::from_fn(SourceFormat::float(rate, channels), frames, |f, _| sine_at(f, rate, freq))
}

#[test]
fn stereo_48k_to_mono_44k() {
    let mut source = tone(48_000, 2, 5.0, 440.0);
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();

    assert_eq!(output.format(), FormatDescriptor::mono(44_100));
    assert_eq!(output.frames(), 220_500);
    assert_eq!(output.duration(), Duration::from_secs(5));
    assert!(!output.is_truncated());

    // Both channels carry the same tone, so the mono mix is that tone at the new rate.
    for i in (10_000..200_000).step_by(997) {
        let expected = sine_at(i, 44_100, 440.0);
        assert!((output.samples()[i] - expected).abs() < 2e-3, "frame {}", i);
    }
}

#[test]
fn opposite_channels_cancel_in_mono() {
    let frames = 4_800;
    let mut source = PcmSource::from_fn(SourceFormat::float(48_000, 2), frames, |f, c| {
        let s = (f as f32 * 0.01).sin();
        if c == 0 {
            s
        } else {
            -s
        }
    });
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();
    assert!(output.samples().iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn twenty_seconds_is_cut_to_twelve() {
    let mut source = tone(44_100, 1, 20.0, 1_000.0);
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();

    assert_eq!(output.frames(), 529_200);
    assert_eq!(output.duration(), Duration::from_secs(12));
    assert!(output.is_truncated());
    assert_eq!(output.samples(), &source.samples()[..529_200]);
}

#[test]
fn short_source_keeps_its_duration() {
    let mut source = tone(22_050, 1, 3.0, 300.0);
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();
    assert_eq!(output.frames(), 132_300);
    assert!(!output.is_truncated());
}

#[test]
fn upsampled_long_source_still_fills_exactly_twelve_seconds() {
    let mut source = tone(16_000, 1, 13.0, 200.0);
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();
    assert_eq!(output.duration(), Duration::from_secs(12));
    assert!(output.is_truncated());
}

#[test]
fn unopenable_path_fails() {
    match DecodedSource::open("/nonexistent/Audio.mp3") {
        Err(Error::UnopenableSource(_)) => (),
        Err(e) => panic!("wrong error: {}", e),
        Ok(_) => panic!("opened a file that doesn't exist"),
    }
}

#[test]
fn empty_wav_converts_to_empty_buffer() {
    let mut source = WavSource::new(wav::encode_i16(48_000, 2, &[])).unwrap();
    let output = convert(&mut source, FormatDescriptor::mono(44_100)).unwrap();
    assert!(output.is_empty());
    assert_eq!(output.duration(), Duration::from_secs(0));
}

#[test]
fn conversion_is_repeatable() {
    let samples: Vec<f32> = (0..2 * 24_000).map(|i| ((i * 7919) % 2_000) as f32 / 2_000.0 - 0.5).collect();
    let file = wav::encode_i16(48_000, 2, &samples);

    let first = convert(&mut DecodedSource::from_bytes(file.clone(), Some("wav")).unwrap(), FormatDescriptor::default())
        .unwrap();
    let second =
        convert(&mut DecodedSource::from_bytes(file, Some("wav")).unwrap(), FormatDescriptor::default()).unwrap();

    assert_eq!(first.frames(), 22_050);
    assert_eq!(first, second);
}

#[test]
fn wav_and_decoder_agree() {
    let samples: Vec<f32> = (0..11_025).map(|i| (i as f32 * 0.05).sin() * 0.25).collect();
    let file = wav::encode_i16(11_025, 1, &samples);

    let parsed = convert(&mut WavSource::new(file.clone()).unwrap(), FormatDescriptor::default()).unwrap();
    let decoded = convert(&mut DecodedSource::from_bytes(file, Some("wav")).unwrap(), FormatDescriptor::default()).unwrap();

    assert_eq!(parsed.frames(), 44_100);
    assert_eq!(parsed.frames(), decoded.frames());
    for (a, b) in parsed.samples().iter().zip(decoded.samples()) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn small_staging_buffer_gives_same_result() {
    let settings = ConverterSettings::default().with_staging_bytes(100);
    let mut a = tone(48_000, 2, 0.5, 440.0);
    let mut b = tone(48_000, 2, 0.5, 440.0);

    let small = convert_with(&mut a, FormatDescriptor::default(), &settings).unwrap();
    let large = convert(&mut b, FormatDescriptor::default()).unwrap();
    assert_eq!(small, large);
    assert!(a.is_exhausted());
}
