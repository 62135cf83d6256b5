//! Equal-power crossfades between two renderings of the same block.
//!
//! The new leg fades in along `sqrt((i + 1) / len)` and the old leg takes whatever is left, so the gains always sum to
//! exactly 1 and the last frame is entirely the new leg.

/// Gains `(old, new)` for frame `index` of a crossfade lasting `len` frames.
#[inline(always)]
pub fn equal_power_gains(index: usize, len: usize) -> (f32, f32) {
    let ratio = (index + 1) as f32 / len as f32;
    let gain_new = ratio.sqrt();
    (1.0 - gain_new, gain_new)
}

/// Fade from `old` to `new`, leaving the result in `old`.
///
/// This is `old * gain_old + new * gain_new`, rearranged as `old + (new - old) * gain_new` so that two identical legs
/// give back exactly the same samples.  Where the new gain reaches 1 the new leg is copied, since the rearranged form
/// can round away from it.  If the slices differ in length only the common prefix is faded.
#[inline]
pub fn crossfade_into(old: &mut [f32], new: &[f32]) {
    let len = old.len().min(new.len());
    for (i, (o, n)) in old.iter_mut().zip(new.iter()).enumerate() {
        let (_, gain_new) = equal_power_gains(i, len);
        if gain_new == 1.0 {
            *o = *n;
        } else {
            *o += (*n - *o) * gain_new;
        }
    }
}
