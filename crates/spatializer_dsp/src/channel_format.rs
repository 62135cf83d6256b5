use std::num::NonZeroUsize;

/// How the channels of an interleaved buffer are to be interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::IsVariant)]
pub enum ChannelFormat {
    /// This is single-channel mono audio.
    Mono,

    /// This is stereo audio: 2 channels [l r].
    Stereo,

    /// Any other channel count, without an interpretation.
    Raw { channels: NonZeroUsize },
}

impl ChannelFormat {
    /// Pick the format for a host buffer with the given channel count, or `None` if there are no channels.
    pub fn from_channel_count(channels: usize) -> Option<ChannelFormat> {
        match channels {
            0 => None,
            1 => Some(ChannelFormat::Mono),
            2 => Some(ChannelFormat::Stereo),
            n => NonZeroUsize::new(n).map(|channels| ChannelFormat::Raw { channels }),
        }
    }

    pub fn channel_count(&self) -> usize {
        match self {
            ChannelFormat::Mono => 1,
            ChannelFormat::Stereo => 2,
            ChannelFormat::Raw { channels } => channels.get(),
        }
    }
}
