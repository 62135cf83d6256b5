//! Switching impulse responses without clicks.
//!
//! When the resolved filter changes, the block is rendered twice: once with the old filter and once with the new one
//! over the same input history, then the two are blended with an equal-power crossfade.  The swap is always complete by
//! the end of the block.
use hrtf_database::{Collection, CollectionId, PairIndex};
use spatializer_dsp::crossfade::crossfade_into;
use spatializer_dsp::{BinauralConvolver, ConvolverError};

use crate::error::SelectionError;

/// Which impulse pair a block is rendered with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct FilterKey {
    pub(crate) collection: CollectionId,
    pub(crate) pair: PairIndex,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::IsVariant)]
pub(crate) enum TransitionState {
    /// Nothing rendered since construction or the last reset.
    Uninitialized,
    Steady(FilterKey),
    Crossfading { from: FilterKey, to: FilterKey },
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum BlockError {
    #[error(transparent)]
    Convolver(#[from] ConvolverError),

    #[error(transparent)]
    Unusable(#[from] SelectionError),

    #[error("Collection {collection} has no impulse pair at ear index {ear}")]
    MissingPair { collection: CollectionId, ear: usize },
}

pub(crate) struct TransitionController {
    convolver: BinauralConvolver,
    state: TransitionState,
    new_left: Vec<f32>,
    new_right: Vec<f32>,
    transitions: u64,
}

fn impulses(collection: &Collection, key: FilterKey) -> Result<(&[f32], &[f32]), BlockError> {
    collection.pair(key.pair).ok_or(BlockError::MissingPair {
        collection: key.collection,
        ear: key.pair.left_ear(),
    })
}

impl TransitionController {
    pub(crate) fn new(block_size: usize, max_impulse_length: usize) -> Result<Self, ConvolverError> {
        Ok(TransitionController {
            convolver: BinauralConvolver::new(block_size, max_impulse_length)?,
            state: TransitionState::Uninitialized,
            new_left: vec![0.0; block_size],
            new_right: vec![0.0; block_size],
            transitions: 0,
        })
    }

    /// Render one block of mono `input` through the filter named by `key`, which must come from `collection`.
    ///
    /// All slices are one block long.
    pub(crate) fn process_block(
        &mut self,
        collection: &Collection,
        key: FilterKey,
        input: &[f32],
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), BlockError> {
        match self.state {
            TransitionState::Uninitialized => {
                let (l, r) = impulses(collection, key)?;
                self.convolver.init(l, r)?;
                self.convolver.process(input, left, right)?;
                self.state = TransitionState::Steady(key);
                rt_debug!(
                    "Starting on collection {} pair {}",
                    key.collection,
                    key.pair.left_ear()
                );
            }
            TransitionState::Steady(active) if active == key => {
                self.convolver.process(input, left, right)?;
            }
            TransitionState::Steady(from) | TransitionState::Crossfading { to: from, .. } => {
                self.state = TransitionState::Crossfading { from, to: key };
                let res = self.crossfade(collection, key, input, left, right);
                self.state = TransitionState::Steady(if res.is_ok() { key } else { from });
                res?;
            }
        }

        Ok(())
    }

    fn crossfade(
        &mut self,
        collection: &Collection,
        to: FilterKey,
        input: &[f32],
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), BlockError> {
        let (l, r) = impulses(collection, to)?;

        self.convolver.process(input, left, right)?;
        self.convolver.init(l, r)?;
        self.convolver
            .rerender(&mut self.new_left, &mut self.new_right)?;

        crossfade_into(left, &self.new_left);
        crossfade_into(right, &self.new_right);

        self.transitions += 1;
        rt_trace!(
            "Crossfading to collection {} pair {}",
            to.collection,
            to.pair.left_ear()
        );
        Ok(())
    }

    /// Forget input history and the active filter.  The next block starts without a crossfade.
    pub(crate) fn reset(&mut self) {
        self.convolver.reset();
        self.state = TransitionState::Uninitialized;
    }

    pub(crate) fn state(&self) -> TransitionState {
        self.state
    }

    /// How many crossfades have been run.
    pub(crate) fn transitions(&self) -> u64 {
        self.transitions
    }
}
