use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use spatializer::{
    CollectionId, CoordinateSystem, DatabaseOptions, HrtfDatabase, MeasurementFileBuilder, NotReadyError,
    SelectionError, SlotState, Spatializer, SpatializerOptions,
};

const SR: u32 = 48000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn database(capacity: usize) -> Arc<HrtfDatabase> {
    Arc::new(HrtfDatabase::new(DatabaseOptions {
        max_collections: capacity,
        max_impulse_length: 64,
    }))
}

fn delta(len: usize, at: usize, gain: f32) -> Vec<f32> {
    let mut ret = vec![0.0; len];
    ret[at] = gain;
    ret
}

/// Front is identity on both ears; left delays the right ear by 3 samples; right delays the left ear by 3.
fn directional_file() -> Vec<u8> {
    let mut b = MeasurementFileBuilder::new(SR, 8, CoordinateSystem::Spherical);
    b.measurement([0.0, 0.0, 1.0], &delta(8, 0, 1.0), &delta(8, 0, 1.0))
        .measurement([90.0, 0.0, 1.0], &delta(8, 0, 1.0), &delta(8, 3, 1.0))
        .measurement([270.0, 0.0, 1.0], &delta(8, 3, 1.0), &delta(8, 0, 1.0));
    b.encode()
}

/// Every measurement is a unit impulse, so output should always equal input however filters change.
fn identity_file(sample_rate: u32) -> Vec<u8> {
    let mut b = MeasurementFileBuilder::new(sample_rate, 4, CoordinateSystem::Cartesian);
    b.measurement([1.0, 0.0, 0.0], &delta(4, 0, 1.0), &delta(4, 0, 1.0))
        .measurement([0.0, 1.0, 0.0], &delta(4, 0, 1.0), &delta(4, 0, 1.0));
    b.encode()
}

fn options(block_size: usize) -> SpatializerOptions {
    SpatializerOptions {
        block_size,
        sample_rate: Some(SR),
        initial_collection: Some(0),
    }
}

fn signal(len: usize) -> Vec<f32> {
    (0..len).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect()
}

#[track_caller]
fn assert_close(got: &[f32], expected: &[f32], threshold: f32) {
    assert_eq!(got.len(), expected.len());
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        assert!((g - e).abs() < threshold, "index {}: {} vs {}", i, g, e);
    }
}

fn channel(interleaved: &[f32], channels: usize, which: usize) -> Vec<f32> {
    interleaved.iter().skip(which).step_by(channels).copied().collect()
}

#[test]
fn passes_through_with_nothing_loaded() {
    init_logging();

    for block_size in [1usize, 7, 64, 512] {
        for channels in [1usize, 2, 3] {
            let (mut sp, _handle) = Spatializer::new(database(4), options(block_size)).unwrap();
            let frames = block_size * 3;
            let input = signal(frames * channels);
            let mut output = vec![f32::NAN; frames * channels];

            sp.process(&input, &mut output, channels, channels);
            assert_eq!(output, input);
            assert_eq!(sp.readiness(), Err(NotReadyError::Unusable(SelectionError::NotLoaded(CollectionId::new(0)))));
        }
    }
}

#[test]
fn passes_through_with_nothing_selected() {
    init_logging();
    let db = database(2);
    db.load(&identity_file(SR)[..]).unwrap();

    let (mut sp, handle) = Spatializer::new(
        db,
        SpatializerOptions {
            initial_collection: None,
            ..options(16)
        },
    )
    .unwrap();
    assert_eq!(sp.readiness(), Err(NotReadyError::NothingSelected));

    let input = signal(32);
    let mut output = vec![0.0; 64];
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(channel(&output, 2, 0), input);
    assert_eq!(channel(&output, 2, 1), input);

    handle.select_collection(CollectionId::new(0)).unwrap();
    assert_eq!(sp.readiness(), Ok(CollectionId::new(0)));

    handle.clear_selection();
    assert_eq!(sp.readiness(), Err(NotReadyError::NothingSelected));
}

#[test]
fn identity_collection_reproduces_input() {
    init_logging();
    let db = database(1);
    db.load(&identity_file(SR)[..]).unwrap();

    for block_size in [1usize, 3, 32, 256] {
        let (mut sp, _handle) = Spatializer::new(db.clone(), options(block_size)).unwrap();
        let input = signal(block_size * 4);
        let mut output = vec![0.0; input.len() * 2];

        sp.process(&input, &mut output, 1, 2);
        assert_close(&channel(&output, 2, 0), &input, 1e-5);
        assert_close(&channel(&output, 2, 1), &input, 1e-5);
    }
}

#[test]
fn direction_picks_the_filter() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(32)).unwrap();

    // Straight ahead: both ears identical.
    let input = signal(64);
    let mut output = vec![0.0; 128];
    sp.process(&input, &mut output, 1, 2);
    assert_close(&channel(&output, 2, 0), &channel(&output, 2, 1), 1e-5);

    // Hard left, after the crossfade block: the right ear lags by 3 samples.
    assert!(handle.set_direction(0.0, 1.0, 0.0));
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.transition_count(), 1);
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.transition_count(), 1);

    let left = channel(&output, 2, 0);
    let right = channel(&output, 2, 1);
    assert_close(&left, &input, 1e-5);
    assert_close(&right[3..], &input[..61], 1e-5);
}

#[test]
fn crossfade_between_identities_is_transparent() {
    init_logging();
    let db = database(1);
    db.load(&identity_file(SR)[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(64)).unwrap();

    let input = signal(64 * 8);
    let mut output = vec![0.0; input.len()];
    let mut rendered = vec![];

    for (i, block) in input.chunks(64).enumerate() {
        if i % 2 == 0 {
            handle.set_direction(1.0, 0.0, 0.0);
        } else {
            handle.set_direction(0.0, 1.0, 0.0);
        }
        sp.process(block, &mut output[..64], 1, 1);
        rendered.extend_from_slice(&output[..64]);
    }

    assert_eq!(sp.transition_count(), 7);
    assert_close(&rendered, &input, 1e-5);
}

#[test]
fn crossfades_only_on_changes() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(16)).unwrap();

    let input = signal(16);
    let mut output = vec![0.0; 32];
    let directions = [
        (1.0, 0.0, 0.0, 0),
        (1.0, 0.1, 0.0, 0),
        (0.0, 1.0, 0.0, 1),
        (0.1, 1.0, 0.2, 1),
        (0.0, -1.0, 0.0, 2),
        (1.0, 0.0, 0.0, 3),
        (1.0, 0.0, 0.0, 3),
    ];
    for (x, y, z, expected) in directions {
        handle.set_direction(x, y, z);
        sp.process(&input, &mut output, 1, 2);
        assert_eq!(sp.transition_count(), expected);
    }
}

#[test]
fn non_finite_directions_are_ignored() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(16)).unwrap();

    assert!(handle.set_direction(0.0, 1.0, 0.0));
    assert!(!handle.set_direction(f32::NAN, 0.0, 0.0));
    assert!(!handle.set_direction(0.0, f32::INFINITY, 0.0));
    assert_eq!(handle.direction(), spatializer::Vec3::new(0.0, 1.0, 0.0));

    let input = signal(16);
    let mut output = vec![0.0; 32];
    sp.process(&input, &mut output, 1, 2);
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.transition_count(), 0);
}

#[test]
fn capacity_rejection_leaves_earlier_collections() {
    init_logging();
    let db = database(2);
    let a = db.load(&identity_file(SR)[..]).unwrap();
    let b = db.load(&directional_file()[..]).unwrap();

    let err = db.load(&identity_file(SR)[..]).unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(db.len(), 2);
    assert_eq!(db.state(a), Some(SlotState::Ready));
    assert_eq!(db.state(b), Some(SlotState::Ready));
    assert_eq!(db.get(b).unwrap().measurement_count(), 3);

    let (mut sp, handle) = Spatializer::new(db, options(8)).unwrap();
    handle.select_collection(b).unwrap();
    let input = signal(8);
    let mut output = vec![0.0; 16];
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.readiness(), Ok(b));
}

#[test]
fn failed_selection_keeps_previous() {
    init_logging();
    let db = database(4);
    let good = db.load(&identity_file(SR)[..]).unwrap();
    let bad = match db.load(&b"\xff\xff\xff"[..]) {
        Err(spatializer::DatabaseError::Load { id, .. }) => id,
        other => panic!("Expected a failed load, got {:?}", other),
    };
    let other_rate = db.load(&identity_file(44100)[..]).unwrap();

    let (mut sp, handle) = Spatializer::new(db, options(8)).unwrap();
    assert_eq!(handle.selected(), Some(good));

    assert_eq!(handle.select_collection(bad), Err(SelectionError::Failed(bad)));
    assert_eq!(
        handle.select_collection(CollectionId::new(3)),
        Err(SelectionError::NotLoaded(CollectionId::new(3)))
    );
    assert_eq!(
        handle.select_collection(CollectionId::new(9)),
        Err(SelectionError::OutOfRange {
            id: CollectionId::new(9),
            capacity: 4
        })
    );
    assert!(matches!(
        handle.select_collection(other_rate),
        Err(SelectionError::SampleRateMismatch { collection: 44100, spatializer: SR, .. })
    ));
    assert_eq!(handle.selected(), Some(good));

    let input = signal(16);
    let mut output = vec![0.0; 32];
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.readiness(), Ok(good));
    assert_close(&channel(&output, 2, 0), &input, 1e-5);
}

#[test]
fn mismatched_rate_passes_through() {
    init_logging();
    let db = database(1);
    db.load(&identity_file(44100)[..]).unwrap();

    // Starting on a collection at the wrong rate is allowed, but it never gets used.
    let (mut sp, _handle) = Spatializer::new(db, options(4)).unwrap();
    assert!(matches!(
        sp.readiness(),
        Err(NotReadyError::Unusable(SelectionError::SampleRateMismatch { .. }))
    ));

    let input = signal(8);
    let mut output = vec![0.0; 8];
    sp.process(&input, &mut output, 1, 1);
    assert_eq!(output, input);
}

#[test]
fn partial_blocks_pass_through() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, _handle) = Spatializer::new(db, options(16)).unwrap();

    let input = signal(20 * 2);
    let mut output = vec![0.0; 20 * 2];
    sp.process(&input, &mut output, 2, 2);
    assert_eq!(output, input);
}

/// The collection delays by 4 samples, so history surviving the gap would leak into the first block back.
#[test]
fn pass_through_forgets_history() {
    init_logging();
    let db = database(1);
    let mut b = MeasurementFileBuilder::new(SR, 8, CoordinateSystem::Cartesian);
    b.measurement([1.0, 0.0, 0.0], &delta(8, 4, 1.0), &delta(8, 4, 1.0));
    let id = db.load(&b.encode()[..]).unwrap();
    let (mut sp, handle) = Spatializer::new(db, options(4)).unwrap();

    let mut output = vec![0.0; 8];
    sp.process(&[1.0, 0.0, 0.0, 0.0], &mut output, 1, 2);
    assert_eq!(output, vec![0.0; 8]);

    handle.clear_selection();
    let silence = [0.0; 4];
    for _ in 0..10 {
        sp.process(&silence, &mut output, 1, 2);
        assert_eq!(output, vec![0.0; 8]);
    }

    handle.select_collection(id).unwrap();
    sp.process(&silence, &mut output, 1, 2);
    assert_eq!(output, vec![0.0; 8]);
    assert_eq!(sp.transition_count(), 0);

    // A partial block is also a gap.
    sp.process(&[1.0, 0.0, 0.0, 0.0], &mut output, 1, 2);
    let mut partial = vec![0.0; 6];
    sp.process(&silence[..3], &mut partial, 1, 2);
    sp.process(&silence, &mut output, 1, 2);
    assert_eq!(output, vec![0.0; 8]);
}

#[test]
fn host_layouts() {
    init_logging();
    let db = database(1);
    db.load(&identity_file(SR)[..]).unwrap();
    let (mut sp, _handle) = Spatializer::new(db, options(8)).unwrap();

    // Stereo in, downmixed by averaging; four channels out, the last two silent.
    let mono = signal(16);
    let stereo_in: Vec<f32> = mono.iter().flat_map(|s| [*s + 0.25, *s - 0.25]).collect();
    let mut output = vec![f32::NAN; 16 * 4];
    sp.process(&stereo_in, &mut output, 2, 4);

    assert_close(&channel(&output, 4, 0), &mono, 1e-5);
    assert_close(&channel(&output, 4, 1), &mono, 1e-5);
    assert_eq!(channel(&output, 4, 2), vec![0.0; 16]);
    assert_eq!(channel(&output, 4, 3), vec![0.0; 16]);
}

#[test]
fn output_past_input_is_zeroed() {
    init_logging();
    let db = database(1);
    db.load(&identity_file(SR)[..]).unwrap();
    let (mut sp, _handle) = Spatializer::new(db, options(8)).unwrap();

    let input = signal(8);
    let mut output = vec![f32::NAN; 24];
    sp.process(&input, &mut output, 1, 1);
    assert_close(&output[..8], &input, 1e-5);
    assert_eq!(&output[8..], &[0.0; 16][..]);

    // With zero channels there is nothing to convert, but the output is still written.
    let mut output = vec![f32::NAN; 4];
    sp.process(&input, &mut output, 0, 1);
    assert_eq!(output, vec![0.0; 4]);
}

#[test]
fn switching_collections_crossfades() {
    init_logging();
    let db = database(2);
    let a = db.load(&identity_file(SR)[..]).unwrap();
    let b = db.load(&directional_file()[..]).unwrap();
    let (mut sp, handle) = Spatializer::new(db, options(16)).unwrap();

    let input = signal(16);
    let mut output = vec![0.0; 32];
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(handle.selected(), Some(a));

    handle.select_collection(b).unwrap();
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.transition_count(), 1);
    assert_eq!(sp.readiness(), Ok(b));
}

#[test]
fn reset_restarts_without_crossfade() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(16)).unwrap();

    let input = signal(16);
    let mut first = vec![0.0; 32];
    sp.process(&input, &mut first, 1, 2);

    handle.set_direction(0.0, -1.0, 0.0);
    sp.reset();
    let mut output = vec![0.0; 32];
    sp.process(&input, &mut output, 1, 2);
    assert_eq!(sp.transition_count(), 0);

    // Fresh history, so the left ear is the input delayed by 3 from silence.
    let left = channel(&output, 2, 0);
    assert_close(&left[..3], &[0.0; 3], 1e-5);
    assert_close(&left[3..], &input[..13], 1e-5);
}

#[test]
fn construction_errors() {
    init_logging();
    let err = Spatializer::new(database(1), options(0)).unwrap_err();
    assert!(err.is_convolver());

    let err = Spatializer::new(
        database(2),
        SpatializerOptions {
            initial_collection: Some(2),
            ..options(8)
        },
    )
    .unwrap_err();
    assert!(err.is_selection());
    assert_eq!(
        err.as_selection(),
        Some(&SelectionError::OutOfRange {
            id: CollectionId::new(2),
            capacity: 2
        })
    );
}

#[test]
fn control_from_another_thread() {
    init_logging();
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(16)).unwrap();

    std::thread::spawn(move || {
        handle.set_direction(0.0, 1.0, 0.0);
    })
    .join()
    .unwrap();

    let input = signal(16);
    let mut output = vec![0.0; 32];
    sp.process(&input, &mut output, 1, 2);
    sp.process(&input, &mut output, 1, 2);
    assert_close(&channel(&output, 2, 0), &input, 1e-5);
}

/// Render a fixed script of blocks and direction changes.
fn scripted_run(directions: &[(f32, f32, f32)]) -> Vec<f32> {
    let db = database(1);
    db.load(&directional_file()[..]).unwrap();
    let (mut sp, mut handle) = Spatializer::new(db, options(32)).unwrap();

    let input = signal(32 * directions.len());
    let mut rendered = vec![];
    let mut output = vec![0.0; 64];
    for (block, (x, y, z)) in input.chunks(32).zip(directions) {
        handle.set_direction(*x, *y, *z);
        sp.process(block, &mut output, 1, 2);
        rendered.extend_from_slice(&output);
    }
    rendered
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn output_is_deterministic(
        directions in proptest::collection::vec((-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0), 1..16)
    ) {
        let first = scripted_run(&directions);
        let second = scripted_run(&directions);
        prop_assert_eq!(first, second);
    }
}
