use crate::settings::ResamplingQuality;
use tracing::debug;

/// Largest polyphase filter table we're willing to build, in taps.
const MAX_FILTER_TAPS: u64 = 1 << 20;

/// Streaming sample-rate converter working on interleaved frames with a fixed channel count.
///
/// Input may arrive in blocks of any size; the output doesn't depend on how the input was split up.
/// After `flush`, `n` input frames will have produced exactly `ceil(n * dest_rate / source_rate)` output frames.
pub trait Resampler {
    /// Consumes `input` and appends every output frame that can be computed so far.
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>);

    /// Signals the end of the input and appends the remaining output frames.
    fn flush(&mut self, output: &mut Vec<f32>);
}

/// Builds the resampler for a rate pair, or a no-op one if the rates already match.
pub fn for_rates(quality: ResamplingQuality, source_rate: u32, dest_rate: u32, channels: usize) -> Box<dyn Resampler> {
    if source_rate == dest_rate {
        return Box::new(Passthrough);
    }

    match quality {
        ResamplingQuality::High => match Polyphase::new(source_rate, dest_rate, channels) {
            Some(p) => Box::new(p),
            None => {
                debug!(source_rate, dest_rate, "rate ratio too fine for a polyphase table, using linear");
                Box::new(Linear::new(source_rate, dest_rate, channels))
            }
        },
        ResamplingQuality::Low => Box::new(Linear::new(source_rate, dest_rate, channels)),
    }
}

#[inline]
fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Reduces a rate pair to its smallest ratio.
fn reduce(source_rate: u32, dest_rate: u32) -> (u64, u64) {
    let gcd = gcd(source_rate, dest_rate).max(1);
    (u64::from((source_rate / gcd).max(1)), u64::from((dest_rate / gcd).max(1)))
}

/// Interleaved input frames still needed, plus bookkeeping shared by the interpolating resamplers.
struct History {
    channels: usize,
    samples: Vec<f32>,
    /// Absolute index of the first frame in `samples`.
    base: u64,
    /// Total frames received.
    received: u64,
}

impl History {
    fn new(channels: usize) -> Self {
        Self { channels: channels.max(1), samples: Vec::new(), base: 0, received: 0 }
    }

    fn push(&mut self, input: &[f32]) {
        let frames = input.len() / self.channels;
        self.samples.extend_from_slice(&input[..frames * self.channels]);
        self.received += frames as u64;
    }

    #[inline]
    fn sample(&self, frame: u64, channel: usize) -> f32 {
        self.samples[(frame - self.base) as usize * self.channels + channel]
    }

    /// Forgets every frame before `frame`.
    fn discard_before(&mut self, frame: u64) {
        let frame = frame.min(self.received);
        if frame > self.base {
            let count = (frame - self.base) as usize * self.channels;
            self.samples.drain(..count);
            self.base = frame;
        }
    }
}

/// Hands input straight through. Used when source and destination rates match.
pub struct Passthrough;

impl Resampler for Passthrough {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.extend_from_slice(input);
    }

    fn flush(&mut self, _output: &mut Vec<f32>) {}
}

/// Rational polyphase resampler with a Kaiser-windowed sinc low-pass filter.
pub struct Polyphase {
    from: u64,
    to: u64,
    left_offset: u64,
    filter: Vec<f64>,
    history: History,
    produced: u64,
}

impl Polyphase {
    /// Returns None if the reduced rate ratio would need an unreasonably long filter.
    pub fn new(source_rate: u32, dest_rate: u32, channels: usize) -> Option<Self> {
        #[inline]
        fn kaiser_order(rejection: f64, transition: f64) -> u64 {
            if rejection > 21.0 {
                ((rejection - 7.95) / (2.285 * 2.0 * std::f64::consts::PI * transition)).ceil() as u64
            } else {
                (5.79 / (2.0 * std::f64::consts::PI * transition)).ceil() as u64
            }
        }

        let (from, to) = reduce(source_rate, dest_rate);

        let downscale_factor = from.max(to) as f64;
        let cutoff = 0.475 / downscale_factor;
        let width = 0.05 / downscale_factor;
        let left_offset = (kaiser_order(180.0, width) + 1) / 2;
        let taps = left_offset * 2 + 1;
        if taps > MAX_FILTER_TAPS {
            return None;
        }

        let filter = (0..taps).map(|i| sinc_filter(left_offset, to as f64, cutoff, i)).collect();

        Some(Self { from, to, left_offset, filter, history: History::new(channels), produced: 0 })
    }

    /// Lowest input frame contributing to output frame `n`.
    #[inline]
    fn first_input(&self, n: u64) -> u64 {
        let start = self.from * n;
        if start > self.left_offset {
            (start - self.left_offset + self.to - 1) / self.to
        } else {
            0
        }
    }

    fn render(&mut self, output: &mut Vec<f32>, flushing: bool) {
        let received = self.history.received;
        let total = (received * self.to + self.from - 1) / self.from;

        loop {
            let n = self.produced;
            let center = self.from * n + self.left_offset;
            let last = center / self.to;
            if flushing {
                if n >= total {
                    break;
                }
            } else if last >= received {
                break;
            }

            let first = self.first_input(n);
            let last = last.min(received - 1);
            for channel in 0..self.history.channels {
                let mut r = 0.0f64;
                for j in first..=last {
                    r += self.filter[(center - j * self.to) as usize] * f64::from(self.history.sample(j, channel));
                }
                output.push(r as f32);
            }
            self.produced += 1;
        }

        let keep = self.first_input(self.produced);
        self.history.discard_before(keep);
    }
}

impl Resampler for Polyphase {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        self.history.push(input);
        self.render(output, false);
    }

    fn flush(&mut self, output: &mut Vec<f32>) {
        self.render(output, true);
    }
}

fn sinc_filter(left: u64, gain: f64, cutoff: f64, i: u64) -> f64 {
    #[inline]
    fn sinc(x: f64) -> f64 {
        if x == 0.0 {
            1.0
        } else {
            let x_pi = x * std::f64::consts::PI;
            x_pi.sin() / x_pi
        }
    }

    #[inline]
    fn bessel_i0(x: f64) -> f64 {
        // Polynomial approximation, Abramowitz & Stegun 9.8.1/9.8.2
        let ax = x.abs();
        if ax < 3.75 {
            let y = (x / 3.75).powi(2);
            1.0 + y
                * (3.5156229
                    + y * (3.0899424 + y * (1.2067492 + y * (0.2659732 + y * (0.360768e-1 + y * 0.45813e-2)))))
        } else {
            let y = 3.75 / ax;
            (ax.exp() / ax.sqrt())
                * (0.39894228
                    + y * (0.1328592e-1
                        + y * (0.225319e-2
                            + y * (-0.157565e-2
                                + y * (0.916281e-2
                                    + y * (-0.2057706e-1
                                        + y * (0.2635537e-1 + y * (-0.1647633e-1 + y * 0.392377e-2))))))))
        }
    }

    #[inline]
    fn kaiser(k: f64) -> f64 {
        if k < -1.0 || k > 1.0 {
            0.0
        } else {
            // beta for 180 dB of stopband rejection, normalised by I0(beta)
            bessel_i0(18.87726 * (1.0 - k.powi(2)).sqrt()) / 14594424.752156679
        }
    }

    let x = i as f64 - left as f64;
    kaiser(x / left as f64) * 2.0 * gain * cutoff * sinc(2.0 * cutoff * x)
}

/// Linear interpolation between neighbouring input frames. Cheap, and it aliases.
pub struct Linear {
    from: u64,
    to: u64,
    history: History,
    produced: u64,
}

impl Linear {
    pub fn new(source_rate: u32, dest_rate: u32, channels: usize) -> Self {
        let (from, to) = reduce(source_rate, dest_rate);
        Self { from, to, history: History::new(channels), produced: 0 }
    }

    fn render(&mut self, output: &mut Vec<f32>, flushing: bool) {
        let received = self.history.received;
        let total = (received * self.to + self.from - 1) / self.from;

        loop {
            let n = self.produced;
            let point = self.from * n;
            let before = point / self.to;
            if flushing {
                if n >= total {
                    break;
                }
            } else if before + 1 >= received {
                break;
            }

            let fract = (point % self.to) as f32 / self.to as f32;
            for channel in 0..self.history.channels {
                let start_sample = self.history.sample(before, channel);
                // Hold the last frame instead of fading into silence
                let end_sample =
                    if before + 1 < received { self.history.sample(before + 1, channel) } else { start_sample };
                output.push(start_sample + ((end_sample - start_sample) * fract));
            }
            self.produced += 1;
        }

        let keep = self.from * self.produced / self.to;
        self.history.discard_before(keep);
    }
}

impl Resampler for Linear {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        self.history.push(input);
        self.render(output, false);
    }

    fn flush(&mut self, output: &mut Vec<f32>) {
        self.render(output, true);
    }
}
