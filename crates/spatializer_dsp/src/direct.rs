/// Evaluate a linear convolution by directly evaluating the sum.
///
/// Writes `output[n] = sum(impulse[k] * input[n - k])` for each `n` in `0..output.len()`, treating input before the
/// start and past the end as zeros.  Give `output` a length of `input.len() + impulse.len() - 1` to get the whole tail.
///
/// Complexity is `theta(M*N)` where `M` is the impulse length and `N` the output's length.  This is the reference the
/// partitioned convolver is checked against, so it accumulates in f64.
pub fn convolve_direct(input: &[f32], impulse: &[f32], output: &mut [f32]) {
    for (n, out) in output.iter_mut().enumerate() {
        let first_tap = (n + 1).saturating_sub(input.len());
        let last_tap = impulse.len().min(n + 1);

        let mut sum = 0.0f64;
        for k in first_tap..last_tap {
            sum += impulse[k] as f64 * input[n - k] as f64;
        }

        *out = sum as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMPULSE: [f32; 3] = [1.0, 2.0, 3.0];
    const INPUT: [f32; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

    #[test]
    fn test_full_tail() {
        let mut output = [0.0f32; 7];
        convolve_direct(&INPUT, &IMPULSE, &mut output);
        assert_eq!(output, [1.0, 4.0, 10.0, 16.0, 22.0, 22.0, 15.0]);
    }

    #[test]
    fn test_truncated() {
        let mut output = [0.0f32; 3];
        convolve_direct(&INPUT, &IMPULSE, &mut output);
        assert_eq!(output, [1.0, 4.0, 10.0]);
    }

    #[test]
    fn test_past_the_tail_is_silent() {
        let mut output = [-1.0f32; 10];
        convolve_direct(&INPUT, &IMPULSE, &mut output);
        assert_eq!(&output[7..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unit_impulse() {
        let mut output = [0.0f32; 5];
        convolve_direct(&INPUT, &[1.0], &mut output);
        assert_eq!(output, INPUT);
    }
}
