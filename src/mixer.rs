/// Converts interleaved frames from one channel layout to another.
///
/// Doesn't care about sample rates; run the result through a [`Resampler`](crate::Resampler) if those differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMixer {
    input_channels: usize,
    output_channels: usize,
}

impl ChannelMixer {
    /// Constructs a new ChannelMixer. Both channel counts must be non-zero.
    pub fn new(input_channels: usize, output_channels: usize) -> Option<Self> {
        if input_channels == 0 || output_channels == 0 {
            None
        } else {
            Some(Self { input_channels, output_channels })
        }
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Mixes every whole frame of `input` and appends the result to `output`. Returns the number of frames mixed.
    pub fn mix(&self, input: &[f32], output: &mut Vec<f32>) -> usize {
        let (ins, outs) = (self.input_channels, self.output_channels);
        let frames = input.len() / ins;
        output.reserve(frames * outs);

        if ins == outs {
            // Firstly, if the input and output channel counts are the same, pass straight through.
            output.extend_from_slice(&input[..frames * ins]);
        } else if outs == 1 {
            // Average everything down to mono.
            let scale = 1.0 / ins as f32;
            output.extend(input.chunks_exact(ins).map(|frame| frame.iter().sum::<f32>() * scale));
        } else if ins == 1 {
            // If the input is 1-channel, duplicate the next sample across all output channels.
            for &sample in input {
                output.extend(std::iter::repeat(sample).take(outs));
            }
        } else if ins > outs {
            // Fold the extra channels onto the ones we keep, round-robin.
            for frame in input.chunks_exact(ins) {
                for c in 0..outs {
                    let (sum, n) =
                        frame.iter().skip(c).step_by(outs).fold((0.0f32, 0usize), |(sum, n), s| (sum + s, n + 1));
                    output.push(sum / n as f32);
                }
            }
        } else {
            // Spread the channels we have across the extra outputs.
            for frame in input.chunks_exact(ins) {
                output.extend((0..outs).map(|c| frame[c % ins]));
            }
        }

        frames
    }
}
