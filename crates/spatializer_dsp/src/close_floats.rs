//! Simple threshold-based floating point asserts.
//!
//! We could grab various crates for this but we generally want thresholds bigger than epsilon, and this is both small
//! and simple.

#[track_caller]
pub(crate) fn close_floats32(a: f32, b: f32, threshold: f32) {
    let diff = (a - b).abs();
    assert!(
        diff < threshold,
        "{} vs {}, difference {} is greater than threshold {}",
        a,
        b,
        diff,
        threshold
    );
}

/// Compare two slices elementwise, reporting the first index which differs.
#[track_caller]
pub(crate) fn assert_close_slices(got: &[f32], expected: &[f32], threshold: f32) {
    assert_eq!(got.len(), expected.len(), "Slices differ in length");
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        let diff = (g - e).abs();
        assert!(
            diff < threshold,
            "Index {}: {} vs {}, difference {} is greater than threshold {}",
            i,
            g,
            e,
            diff,
            threshold
        );
    }
}
