/// A destination for interleaved audio, written a frame at a time.
///
/// Output buffers don't maintain an index.  That's up to the caller.
pub trait OutputBuffer {
    type SampleType;

    /// get the total number of frames which may be written.
    fn get_frames(&self) -> usize;

    /// Get the channels in a frame.
    fn get_channels(&self) -> usize;

    /// Write a frame of audio data.
    ///
    /// If `frame` is shorter than the channel count, the remaining channels are zeroed.  Extra samples are ignored.
    fn write_frame(&mut self, index: usize, frame: &[Self::SampleType]);
}

/// An output buffer which is a view over an interleaved slice.
pub struct SliceOutputBuffer<'a, T> {
    backing_slice: &'a mut [T],
    channels: usize,
    frame_count: usize,
}

impl<'a, T> SliceOutputBuffer<'a, T> {
    /// Any trailing partial frame of `slice` is never written.
    pub fn new(slice: &'a mut [T], channels: usize) -> Self {
        Self {
            channels,
            frame_count: slice.len().checked_div(channels).unwrap_or(0),
            backing_slice: slice,
        }
    }
}

impl<'a, T> OutputBuffer for SliceOutputBuffer<'a, T>
where
    T: Copy + Default,
{
    type SampleType = T;

    #[inline(always)]
    fn get_channels(&self) -> usize {
        self.channels
    }

    #[inline(always)]
    fn get_frames(&self) -> usize {
        self.frame_count
    }

    #[inline(always)]
    fn write_frame(&mut self, index: usize, frame: &[Self::SampleType]) {
        let start = index * self.channels;
        let dest = &mut self.backing_slice[start..start + self.channels];
        let copied = frame.len().min(dest.len());
        dest[..copied].copy_from_slice(&frame[..copied]);
        dest[copied..].fill(T::default());
    }
}
