//! Uniformly partitioned overlap-save convolution.
//!
//! The impulse response is cut into partitions of `block_size` samples, each zero-padded to `2 * block_size` and
//! transformed once.  Every call transforms a window of the previous and current input blocks, pushes that spectrum
//! into a frequency-domain delay line, multiplies-and-accumulates the delay line against the partitions, and keeps the
//! second half of the inverse transform.  Cost per block is constant, and the output of block `k` depends on input
//! through block `k`, so the only latency is the host's own block.
//!
//! The delay line only holds input, so it survives swapping the impulse response: after [BinauralConvolver::init] the
//! next block is the exact convolution of the whole input history with the new response, with no tail missing.
//!
//! Everything is allocated in the constructors.  `init`, `process`, `rerender` and `reset` never allocate, so all of
//! them may run on the audio thread.
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Things which can go wrong when building or driving a convolver.
#[derive(Debug, thiserror::Error)]
pub enum ConvolverError {
    #[error("Block size must be at least 1 frame")]
    ZeroBlockSize,

    #[error("Impulse responses must have at least one sample")]
    EmptyImpulse,

    #[error("Impulse response of {length} samples is longer than the maximum of {max}")]
    ImpulseTooLong { length: usize, max: usize },

    #[error("Binaural impulse responses must match in length: left is {left}, right is {right}")]
    MismatchedImpulses { left: usize, right: usize },

    #[error("Expected a block of {expected} samples, but got {got}")]
    BlockLength { expected: usize, got: usize },

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
}

/// An impulse response, partitioned and moved to the frequency domain.
struct FilterSpectrum {
    /// Always `max_partitions` long; only the first `active` are meaningful.
    partitions: Vec<Vec<Complex<f32>>>,
    active: usize,
    length: usize,
}

impl FilterSpectrum {
    fn new(max_partitions: usize, spectrum_len: usize) -> FilterSpectrum {
        FilterSpectrum {
            partitions: vec![vec![Complex::new(0.0, 0.0); spectrum_len]; max_partitions],
            active: 0,
            length: 0,
        }
    }
}

/// The half of a convolver which does not depend on the impulse response.
struct ConvolutionCore {
    block_size: usize,
    max_impulse_length: usize,

    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,

    /// `[previous block | current block]`.
    window: Vec<f32>,

    /// realfft uses its input as scratch space, so transforms go through this copy.
    fft_input: Vec<f32>,
    fft_output: Vec<f32>,

    /// Ring of input spectra. `newest` is the most recent block.
    delay_line: Vec<Vec<Complex<f32>>>,
    newest: usize,

    accumulator: Vec<Complex<f32>>,
}

impl ConvolutionCore {
    fn new(block_size: usize, max_impulse_length: usize) -> Result<ConvolutionCore, ConvolverError> {
        if block_size == 0 {
            return Err(ConvolverError::ZeroBlockSize);
        }
        if max_impulse_length == 0 {
            return Err(ConvolverError::EmptyImpulse);
        }

        let fft_len = block_size * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let spectrum_len = forward.complex_len();
        let max_partitions = max_impulse_length.div_ceil(block_size);

        Ok(ConvolutionCore {
            block_size,
            max_impulse_length,
            forward_scratch: forward.make_scratch_vec(),
            inverse_scratch: inverse.make_scratch_vec(),
            window: vec![0.0; fft_len],
            fft_input: forward.make_input_vec(),
            fft_output: inverse.make_output_vec(),
            delay_line: vec![vec![Complex::new(0.0, 0.0); spectrum_len]; max_partitions],
            newest: 0,
            accumulator: forward.make_output_vec(),
            forward,
            inverse,
        })
    }

    fn max_partitions(&self) -> usize {
        self.delay_line.len()
    }

    fn spectrum_len(&self) -> usize {
        self.accumulator.len()
    }

    fn check_impulse(&self, length: usize) -> Result<(), ConvolverError> {
        if length == 0 {
            return Err(ConvolverError::EmptyImpulse);
        }
        if length > self.max_impulse_length {
            return Err(ConvolverError::ImpulseTooLong {
                length,
                max: self.max_impulse_length,
            });
        }
        Ok(())
    }

    fn check_block(&self, got: usize) -> Result<(), ConvolverError> {
        if got != self.block_size {
            return Err(ConvolverError::BlockLength {
                expected: self.block_size,
                got,
            });
        }
        Ok(())
    }

    fn load_filter(
        &mut self,
        filter: &mut FilterSpectrum,
        impulse: &[f32],
    ) -> Result<(), ConvolverError> {
        self.check_impulse(impulse.len())?;

        for (chunk, partition) in impulse
            .chunks(self.block_size)
            .zip(filter.partitions.iter_mut())
        {
            self.fft_input.fill(0.0);
            self.fft_input[..chunk.len()].copy_from_slice(chunk);
            self.forward.process_with_scratch(
                &mut self.fft_input,
                partition,
                &mut self.forward_scratch,
            )?;
        }

        filter.active = impulse.len().div_ceil(self.block_size);
        filter.length = impulse.len();
        Ok(())
    }

    fn push_input(&mut self, input: &[f32]) -> Result<(), ConvolverError> {
        self.check_block(input.len())?;

        let block_size = self.block_size;
        self.window.copy_within(block_size.., 0);
        self.window[block_size..].copy_from_slice(input);

        self.newest = (self.newest + 1) % self.delay_line.len();
        self.fft_input.copy_from_slice(&self.window);
        self.forward.process_with_scratch(
            &mut self.fft_input,
            &mut self.delay_line[self.newest],
            &mut self.forward_scratch,
        )?;
        Ok(())
    }

    /// Convolve the delay line as it stands against `filter`, writing one block.
    fn render(&mut self, filter: &FilterSpectrum, output: &mut [f32]) -> Result<(), ConvolverError> {
        self.check_block(output.len())?;

        self.accumulator.fill(Complex::new(0.0, 0.0));
        let slots = self.delay_line.len();
        for (age, partition) in filter.partitions[..filter.active].iter().enumerate() {
            let spectrum = &self.delay_line[(self.newest + slots - age) % slots];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(spectrum).zip(partition) {
                *acc += x * h;
            }
        }

        // DC and Nyquist of a real signal are real, and the inverse transform refuses anything else.
        self.accumulator[0].im = 0.0;
        if let Some(last) = self.accumulator.last_mut() {
            last.im = 0.0;
        }

        self.inverse.process_with_scratch(
            &mut self.accumulator,
            &mut self.fft_output,
            &mut self.inverse_scratch,
        )?;

        let scale = 1.0 / (self.block_size * 2) as f32;
        for (o, s) in output.iter_mut().zip(&self.fft_output[self.block_size..]) {
            *o = s * scale;
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.window.fill(0.0);
        for spectrum in self.delay_line.iter_mut() {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.newest = 0;
    }
}

/// Convolves one input stream with one impulse response.
///
/// Until [MonoConvolver::init] is called, the output is silence.
pub struct MonoConvolver {
    core: ConvolutionCore,
    filter: FilterSpectrum,
}

impl MonoConvolver {
    /// Build a convolver for blocks of `block_size` frames and impulse responses of up to `max_impulse_length`
    /// samples.
    ///
    /// This is the only place which allocates.
    pub fn new(block_size: usize, max_impulse_length: usize) -> Result<MonoConvolver, ConvolverError> {
        let core = ConvolutionCore::new(block_size, max_impulse_length)?;
        let filter = FilterSpectrum::new(core.max_partitions(), core.spectrum_len());
        Ok(MonoConvolver { core, filter })
    }

    /// Shorthand for [MonoConvolver::new] followed by [MonoConvolver::init], sized exactly for `impulse`.
    pub fn with_impulse(block_size: usize, impulse: &[f32]) -> Result<MonoConvolver, ConvolverError> {
        let mut ret = MonoConvolver::new(block_size, impulse.len())?;
        ret.init(impulse)?;
        Ok(ret)
    }

    /// Replace the impulse response.  Input history is kept.
    pub fn init(&mut self, impulse: &[f32]) -> Result<(), ConvolverError> {
        self.core.load_filter(&mut self.filter, impulse)
    }

    /// Convolve one block.  Both slices must be exactly `block_size` long.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), ConvolverError> {
        self.core.check_block(output.len())?;
        self.core.push_input(input)?;
        self.core.render(&self.filter, output)
    }

    /// Forget all input history.  The impulse response is kept.
    pub fn reset(&mut self) {
        self.core.reset();
    }

    pub fn block_size(&self) -> usize {
        self.core.block_size
    }

    /// Length of the current impulse response, 0 before the first [MonoConvolver::init].
    pub fn impulse_length(&self) -> usize {
        self.filter.length
    }
}

/// Convolves one input stream with a left and a right impulse response.
///
/// The input is transformed once per block and shared by both ears.
pub struct BinauralConvolver {
    core: ConvolutionCore,
    left: FilterSpectrum,
    right: FilterSpectrum,
}

impl BinauralConvolver {
    pub fn new(block_size: usize, max_impulse_length: usize) -> Result<BinauralConvolver, ConvolverError> {
        let core = ConvolutionCore::new(block_size, max_impulse_length)?;
        let left = FilterSpectrum::new(core.max_partitions(), core.spectrum_len());
        let right = FilterSpectrum::new(core.max_partitions(), core.spectrum_len());
        Ok(BinauralConvolver { core, left, right })
    }

    /// Replace both impulse responses, which must be the same length.  Input history is kept.
    ///
    /// On error, the previous responses are untouched.
    pub fn init(&mut self, left: &[f32], right: &[f32]) -> Result<(), ConvolverError> {
        if left.len() != right.len() {
            return Err(ConvolverError::MismatchedImpulses {
                left: left.len(),
                right: right.len(),
            });
        }
        self.core.check_impulse(left.len())?;

        self.core.load_filter(&mut self.left, left)?;
        self.core.load_filter(&mut self.right, right)
    }

    /// Convolve one block of input into one block for each ear.
    pub fn process(
        &mut self,
        input: &[f32],
        left_output: &mut [f32],
        right_output: &mut [f32],
    ) -> Result<(), ConvolverError> {
        self.core.check_block(left_output.len())?;
        self.core.check_block(right_output.len())?;
        self.core.push_input(input)?;
        self.rerender(left_output, right_output)
    }

    /// Render the most recent input block again against the current impulse responses.
    ///
    /// Together with [BinauralConvolver::init], this runs a new filter over a block that has already been processed
    /// with the old one.
    pub fn rerender(
        &mut self,
        left_output: &mut [f32],
        right_output: &mut [f32],
    ) -> Result<(), ConvolverError> {
        self.core.render(&self.left, left_output)?;
        self.core.render(&self.right, right_output)
    }

    /// Forget all input history.  The impulse responses are kept.
    pub fn reset(&mut self) {
        self.core.reset();
    }

    pub fn block_size(&self) -> usize {
        self.core.block_size
    }

    pub fn max_impulse_length(&self) -> usize {
        self.core.max_impulse_length
    }

    pub fn impulse_length(&self) -> usize {
        self.left.length
    }
}

impl std::fmt::Debug for MonoConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonoConvolver")
            .field("block_size", &self.core.block_size)
            .field("impulse_length", &self.filter.length)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for BinauralConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinauralConvolver")
            .field("block_size", &self.core.block_size)
            .field("impulse_length", &self.left.length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::close_floats::assert_close_slices;
    use crate::direct::convolve_direct;

    /// Stream `input` through a mono convolver, padding the last block with zeros, and return the first
    /// `input.len()` output samples.
    fn stream(block_size: usize, impulse: &[f32], input: &[f32]) -> Vec<f32> {
        let mut conv = MonoConvolver::with_impulse(block_size, impulse).unwrap();
        let mut output = vec![];
        let mut block_out = vec![0.0; block_size];

        for chunk in input.chunks(block_size) {
            let mut block_in = vec![0.0; block_size];
            block_in[..chunk.len()].copy_from_slice(chunk);
            conv.process(&block_in, &mut block_out).unwrap();
            output.extend_from_slice(&block_out);
        }

        output.truncate(input.len());
        output
    }

    fn reference(impulse: &[f32], input: &[f32]) -> Vec<f32> {
        let mut expected = vec![0.0; input.len()];
        convolve_direct(input, impulse, &mut expected);
        expected
    }

    /// A deterministic signal in `[-1, 1]` which is not periodic in any block size we use.
    fn test_signal(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed.wrapping_mul(2654435761).max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }

    /// Scaled so that the output stays within `[-1, 1]`, which keeps the tolerance meaningful.
    fn test_impulse(len: usize, seed: u32) -> Vec<f32> {
        test_signal(len, seed)
            .into_iter()
            .map(|x| x / len as f32)
            .collect()
    }

    #[test]
    fn matches_direct_for_short_equal_and_long_impulses() {
        let block_size = 64;
        let input = test_signal(1000, 1);

        for impulse_len in [1usize, 17, 63, 64, 65, 128, 300] {
            let impulse = test_impulse(impulse_len, impulse_len as u32);
            let got = stream(block_size, &impulse, &input);
            assert_close_slices(&got, &reference(&impulse, &input), 1e-5);
        }
    }

    #[test]
    fn unit_impulse_is_identity() {
        for block_size in [1usize, 2, 3, 7, 64, 100, 512] {
            let input = test_signal(block_size * 5 + 3, block_size as u32);
            let got = stream(block_size, &[1.0], &input);
            assert_close_slices(&got, &input, 1e-5);
        }
    }

    #[test]
    fn silent_before_init() {
        let mut conv = MonoConvolver::new(4, 8).unwrap();
        let mut out = [1.0f32; 4];
        conv.process(&[1.0, 2.0, 3.0, 4.0], &mut out).unwrap();
        assert_eq!(out, [0.0; 4]);
        assert_eq!(conv.impulse_length(), 0);
    }

    #[test]
    fn output_is_reproducible() {
        let impulse = test_impulse(200, 9);
        let input = test_signal(2048, 4);
        let first = stream(128, &impulse, &input);
        let second = stream(128, &impulse, &input);
        assert_eq!(first, second);
    }

    #[test]
    fn reset_forgets_history() {
        let impulse = test_impulse(40, 2);
        let input = test_signal(32, 3);
        let mut conv = MonoConvolver::with_impulse(16, &impulse).unwrap();
        let mut first = vec![0.0; 16];
        let mut scratch = vec![0.0; 16];

        conv.process(&input[..16], &mut first).unwrap();
        conv.process(&input[16..], &mut scratch).unwrap();
        conv.reset();

        let mut again = vec![0.0; 16];
        conv.process(&input[..16], &mut again).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn swapping_impulse_keeps_history() {
        let block_size = 32;
        let a = test_impulse(50, 5);
        let b = test_impulse(70, 6);
        let input = test_signal(block_size * 6, 7);

        let mut conv = MonoConvolver::new(block_size, 70).unwrap();
        conv.init(&a).unwrap();
        let mut out = vec![0.0; block_size];
        for block in input.chunks(block_size).take(3) {
            conv.process(block, &mut out).unwrap();
        }

        conv.init(&b).unwrap();
        let mut after_swap = vec![];
        for block in input.chunks(block_size).skip(3) {
            conv.process(block, &mut out).unwrap();
            after_swap.extend_from_slice(&out);
        }

        // Had `b` been there all along, the tail of the first three blocks would be present in exactly this way.
        let expected = reference(&b, &input);
        assert_close_slices(&after_swap, &expected[block_size * 3..], 1e-5);
    }

    #[test]
    fn binaural_matches_two_monos() {
        let block_size = 48;
        let left = test_impulse(100, 11);
        let right = test_impulse(100, 12);
        let input = test_signal(block_size * 8, 13);

        let mut binaural = BinauralConvolver::new(block_size, 100).unwrap();
        binaural.init(&left, &right).unwrap();

        let mut got_left = vec![];
        let mut got_right = vec![];
        let mut l = vec![0.0; block_size];
        let mut r = vec![0.0; block_size];
        for block in input.chunks(block_size) {
            binaural.process(block, &mut l, &mut r).unwrap();
            got_left.extend_from_slice(&l);
            got_right.extend_from_slice(&r);
        }

        assert_close_slices(&got_left, &reference(&left, &input), 1e-5);
        assert_close_slices(&got_right, &reference(&right, &input), 1e-5);
    }

    #[test]
    fn rerender_runs_new_filter_over_same_block() {
        let block_size = 16;
        let old = test_impulse(20, 21);
        let new = test_impulse(20, 22);
        let input = test_signal(block_size * 2, 23);

        let mut conv = BinauralConvolver::new(block_size, 20).unwrap();
        conv.init(&old, &old).unwrap();
        let mut l = vec![0.0; block_size];
        let mut r = vec![0.0; block_size];
        conv.process(&input[..block_size], &mut l, &mut r).unwrap();
        conv.process(&input[block_size..], &mut l, &mut r).unwrap();

        conv.init(&new, &new).unwrap();
        conv.rerender(&mut l, &mut r).unwrap();

        let expected = reference(&new, &input);
        assert_close_slices(&l, &expected[block_size..], 1e-5);
        assert_close_slices(&r, &expected[block_size..], 1e-5);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(
            MonoConvolver::new(0, 10),
            Err(ConvolverError::ZeroBlockSize)
        ));
        assert!(matches!(
            MonoConvolver::new(4, 0),
            Err(ConvolverError::EmptyImpulse)
        ));

        let mut conv = BinauralConvolver::new(4, 8).unwrap();
        assert!(matches!(
            conv.init(&[0.0; 9], &[0.0; 9]),
            Err(ConvolverError::ImpulseTooLong { length: 9, max: 8 })
        ));
        assert!(matches!(
            conv.init(&[0.0; 3], &[0.0; 2]),
            Err(ConvolverError::MismatchedImpulses { left: 3, right: 2 })
        ));
        assert!(matches!(
            conv.init(&[], &[]),
            Err(ConvolverError::EmptyImpulse)
        ));

        let mut l = [0.0; 4];
        let mut r = [0.0; 3];
        assert!(matches!(
            conv.process(&[0.0; 4], &mut l, &mut r),
            Err(ConvolverError::BlockLength {
                expected: 4,
                got: 3
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn streaming_equals_linear_convolution(
            block_size in 1usize..96,
            impulse_len in 1usize..200,
            input_len in 1usize..600,
            seed in 1u32..1000,
        ) {
            let impulse = test_impulse(impulse_len, seed);
            let input = test_signal(input_len, seed + 1);
            let got = stream(block_size, &impulse, &input);
            let expected = reference(&impulse, &input);
            for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
                prop_assert!((g - e).abs() < 1e-5, "index {}: {} vs {}", i, g, e);
            }
        }
    }
}
