use std::sync::atomic::Ordering;
use std::sync::Arc;

use audio_synchronization::{triple_buffer, AtomicSlotIndex, TripleBufferReader};
use hrtf_database::{CollectionId, HrtfDatabase, Vec3};
use spatializer_dsp::{ChannelConverter, ChannelFormat, SliceOutputBuffer};

use crate::config::SpatializerOptions;
use crate::control::{usable_collection, ControlHandle};
use crate::error::{NotReadyError, Result, SelectionError};
use crate::is_audio_thread::mark_audio_thread;
use crate::logging::ensure_log_ctx;
use crate::transition::{BlockError, FilterKey, TransitionController};

/// Where sources start: straight ahead.
const INITIAL_DIRECTION: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// What a `process` call did, remembered so that only changes are logged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    Spatializing(CollectionId),
    PassThrough(PassThroughReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PassThroughReason {
    NotReady(NotReadyError),
    PartialBlock,
    Failed,
}

/// Renders a mono source binaurally, one host buffer at a time.
///
/// Built with [Spatializer::new], which also returns the [ControlHandle] that steers it.  [Spatializer::process] is
/// meant for the host's audio thread and never blocks, allocates, or panics; everything which may do those things
/// happens in the constructor.
pub struct Spatializer {
    database: Arc<HrtfDatabase>,
    block_size: usize,
    sample_rate: Option<u32>,

    selection: Arc<AtomicSlotIndex>,
    direction: TripleBufferReader<Vec3>,
    transition: TransitionController,

    mono: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
    stereo: Vec<f32>,

    mode: Option<Mode>,
}

impl Spatializer {
    /// Build a spatializer reading from `database`.
    ///
    /// Fails if the block size is 0, or if `initial_collection` is past the end of the database.  The initial
    /// collection doesn't have to be loaded yet.
    pub fn new(
        database: Arc<HrtfDatabase>,
        options: SpatializerOptions,
    ) -> Result<(Spatializer, ControlHandle)> {
        ensure_log_ctx();

        let transition = TransitionController::new(options.block_size, database.max_impulse_length())?;

        if let Some(index) = options.initial_collection {
            if index as usize >= database.capacity() {
                return Err(SelectionError::OutOfRange {
                    id: CollectionId::new(index),
                    capacity: database.capacity(),
                }
                .into());
            }
        }
        let selection = Arc::new(AtomicSlotIndex::new(options.initial_collection).map_err(|_| {
            SelectionError::OutOfRange {
                id: CollectionId::new(u32::MAX),
                capacity: database.capacity(),
            }
        })?);

        let (writer, reader) = triple_buffer(INITIAL_DIRECTION);
        let handle = ControlHandle::new(
            database.clone(),
            options.sample_rate,
            selection.clone(),
            writer,
            INITIAL_DIRECTION,
        );

        let block_size = options.block_size;
        log::info!(
            "Created spatializer: block size {}, sample rate {:?}, initial collection {:?}",
            block_size,
            options.sample_rate,
            options.initial_collection
        );

        let spatializer = Spatializer {
            database,
            block_size,
            sample_rate: options.sample_rate,
            selection,
            direction: reader,
            transition,
            mono: vec![0.0; block_size],
            left: vec![0.0; block_size],
            right: vec![0.0; block_size],
            stereo: vec![0.0; block_size * 2],
            mode: None,
        };

        Ok((spatializer, handle))
    }

    fn selected(&self) -> Option<CollectionId> {
        self.selection.load(Ordering::Acquire).map(CollectionId::new)
    }

    /// Can the next `process` call spatialize, and if so with which collection?
    ///
    /// For display and diagnostics.  `process` never fails for any of these reasons; it passes audio through instead.
    pub fn readiness(&self) -> Result<CollectionId, NotReadyError> {
        self.readiness_of(self.selected())
    }

    /// Render a buffer.
    ///
    /// `input` and `output` are interleaved with the given channel counts.  Input is downmixed to mono, spatialized,
    /// and written as stereo, averaged for mono output, with any further output channels zeroed.
    ///
    /// Audio is instead copied through, converting channel layouts, if nothing usable is selected or the number of
    /// frames isn't a whole number of blocks.  Passing through forgets input history, so spatializing resumes from
    /// silence without a crossfade.  Either way, any output past the end of the input is zeroed, so `output`
    /// is always fully written.
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        input_channels: usize,
        output_channels: usize,
    ) {
        mark_audio_thread();

        let (Some(input_format), Some(output_format)) = (
            ChannelFormat::from_channel_count(input_channels),
            ChannelFormat::from_channel_count(output_channels),
        ) else {
            output.fill(0.0);
            return;
        };

        let frames = (input.len() / input_channels).min(output.len() / output_channels);
        let selected = self.selected();
        let direction = self.direction.read();

        let mode = match self.readiness_of(selected) {
            Err(e) => Mode::PassThrough(PassThroughReason::NotReady(e)),
            Ok(_) if frames % self.block_size != 0 => Mode::PassThrough(PassThroughReason::PartialBlock),
            Ok(id) => match self.spatialize(
                id,
                direction,
                &input[..frames * input_channels],
                &mut output[..frames * output_channels],
                input_format,
                output_format,
            ) {
                Ok(()) => Mode::Spatializing(id),
                Err(e) => {
                    rt_error!("Unable to render block: {}", e);
                    Mode::PassThrough(PassThroughReason::Failed)
                }
            },
        };

        if let Mode::PassThrough(_) = mode {
            // Input skipped here never reaches the convolver, so history from before the gap must not be replayed.
            if !self.transition.state().is_uninitialized() {
                self.transition.reset();
            }
            ChannelConverter::new(input_format, output_format).convert(
                &input[..frames * input_channels],
                &mut SliceOutputBuffer::new(&mut output[..frames * output_channels], output_channels),
            );
        }

        output[frames * output_channels..].fill(0.0);
        self.note_mode(mode, frames);
    }

    fn readiness_of(&self, selected: Option<CollectionId>) -> Result<CollectionId, NotReadyError> {
        let id = selected.ok_or(NotReadyError::NothingSelected)?;
        usable_collection(&self.database, id, self.sample_rate)?;
        Ok(id)
    }

    fn spatialize(
        &mut self,
        id: CollectionId,
        direction: Vec3,
        input: &[f32],
        output: &mut [f32],
        input_format: ChannelFormat,
        output_format: ChannelFormat,
    ) -> Result<(), BlockError> {
        let block_size = self.block_size;
        let input_channels = input_format.channel_count();
        let output_channels = output_format.channel_count();

        let collection = usable_collection(&self.database, id, self.sample_rate)?;

        let downmix = ChannelConverter::new(input_format, ChannelFormat::Mono);
        let upmix = ChannelConverter::new(ChannelFormat::Stereo, output_format);

        for (in_block, out_block) in input
            .chunks_exact(block_size * input_channels)
            .zip(output.chunks_exact_mut(block_size * output_channels))
        {
            downmix.convert(in_block, &mut SliceOutputBuffer::new(&mut self.mono[..], 1));

            let key = FilterKey {
                collection: id,
                pair: collection.nearest(direction),
            };
            self.transition
                .process_block(collection, key, &self.mono, &mut self.left, &mut self.right)?;

            for ((frame, l), r) in self.stereo.chunks_exact_mut(2).zip(&self.left).zip(&self.right) {
                frame[0] = *l;
                frame[1] = *r;
            }
            upmix.convert(&self.stereo, &mut SliceOutputBuffer::new(out_block, output_channels));
        }

        Ok(())
    }

    fn note_mode(&mut self, mode: Mode, frames: usize) {
        if self.mode == Some(mode) {
            return;
        }
        self.mode = Some(mode);

        match mode {
            Mode::Spatializing(id) => {
                rt_info!("Spatializing with collection {}", id);
            }
            Mode::PassThrough(PassThroughReason::NotReady(e)) => {
                rt_info!("Passing audio through: {}", e);
            }
            Mode::PassThrough(PassThroughReason::PartialBlock) => {
                rt_info!(
                    "Passing audio through: {} frames is not a multiple of the block size {}",
                    frames,
                    self.block_size
                );
            }
            // Already logged as an error.
            Mode::PassThrough(PassThroughReason::Failed) => {}
        }
    }

    /// Forget input history and the active filter, as if freshly built.  Selection and direction are kept.
    pub fn reset(&mut self) {
        self.transition.reset();
        log::debug!("Spatializer reset");
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// How many filter crossfades have been run.
    pub fn transition_count(&self) -> u64 {
        self.transition.transitions()
    }

    pub fn database(&self) -> &Arc<HrtfDatabase> {
        &self.database
    }
}

impl std::fmt::Debug for Spatializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spatializer")
            .field("block_size", &self.block_size)
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.transition.state())
            .finish_non_exhaustive()
    }
}
