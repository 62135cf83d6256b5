use crate::ChannelFormat;
use crate::OutputBuffer;

/// Converts interleaved audio between two channel formats.
///
/// Every pair of formats has a conversion, so building one can't fail.  The rules are as follows:
///
/// - Identical channel counts copy.
/// - Anything to mono averages all input channels.
/// - Mono to stereo broadcasts the mono channel equally to both stereo channels.
/// - Otherwise channels are matched up by position: extra input channels are dropped, and extra output channels are set
///   to 0.
#[derive(Clone, Copy, Debug)]
pub struct ChannelConverter {
    input_format: ChannelFormat,
    output_format: ChannelFormat,
}

impl ChannelConverter {
    pub fn new(input_format: ChannelFormat, output_format: ChannelFormat) -> ChannelConverter {
        ChannelConverter {
            input_format,
            output_format,
        }
    }

    /// Convert some data from the flat, interleaved input and write it to the given output buffer.
    ///
    /// Converts as many whole frames as both sides have room for, and returns that count.
    #[inline(always)]
    pub fn convert<OB: OutputBuffer<SampleType = f32>>(
        &self,
        input_data: &[f32],
        output_buffer: &mut OB,
    ) -> usize {
        use ChannelFormat as CF;

        let ichans = self.input_format.channel_count();
        let ochans = self.output_format.channel_count();
        let frames = (input_data.len() / ichans).min(output_buffer.get_frames());
        let input_data = &input_data[..frames * ichans];

        match (&self.input_format, &self.output_format) {
            _ if ichans == ochans => copy_frames(input_data, ichans, output_buffer),
            (_, CF::Mono) => average_to_mono(input_data, ichans, output_buffer),
            (CF::Mono, CF::Stereo) => mono_to_stereo(input_data, output_buffer),
            _ => match_by_position(input_data, ichans, ochans, output_buffer),
        }

        frames
    }
}

#[inline(always)]
fn copy_frames<OB: OutputBuffer<SampleType = f32>>(input: &[f32], channels: usize, output: &mut OB) {
    for (i, frame) in input.chunks_exact(channels).enumerate() {
        output.write_frame(i, frame);
    }
}

#[inline(always)]
fn mono_to_stereo<OB: OutputBuffer<SampleType = f32>>(input: &[f32], output: &mut OB) {
    for (i, s) in input.iter().enumerate() {
        let frame: [f32; 2] = [*s, *s];
        output.write_frame(i, &frame[..]);
    }
}

#[inline(always)]
fn average_to_mono<OB: OutputBuffer<SampleType = f32>>(input: &[f32], channels: usize, output: &mut OB) {
    let scale = 1.0 / channels as f32;
    for (i, frame) in input.chunks_exact(channels).enumerate() {
        let sum: f32 = frame.iter().sum();
        output.write_frame(i, &[sum * scale]);
    }
}

/// Truncate or zero channels.
fn match_by_position<OB: OutputBuffer<SampleType = f32>>(
    input: &[f32],
    ichans: usize,
    ochans: usize,
    output: &mut OB,
) {
    let frame_size = ichans.min(ochans);
    for (f, frame) in input.chunks_exact(ichans).enumerate() {
        output.write_frame(f, &frame[..frame_size]);
    }
}
