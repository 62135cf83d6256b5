//! Orbit a sound around the listener's head and write the result to a WAV file.
//!
//! With no `--hrtf`, a crude synthetic collection is built which models only the time and level differences between
//! the ears.  That is enough to hear the source move.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use spatializer::{
    CoordinateSystem, DatabaseOptions, HrtfDatabase, MeasurementFileBuilder, Spatializer, SpatializerOptions,
};

#[derive(Debug, Parser)]
struct Args {
    /// Where to write the stereo result.
    #[arg(short, long, default_value = "orbit.wav")]
    output: PathBuf,

    /// A measurement file to use instead of the synthetic one.
    #[arg(long)]
    hrtf: Option<PathBuf>,

    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Seconds per revolution.
    #[arg(long, default_value_t = 4.0)]
    period: f32,

    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 256)]
    block_size: usize,

    /// Measurements in the synthetic collection's horizontal ring.
    #[arg(long, default_value_t = 72)]
    measurements: usize,
}

/// A ring of measurements in the horizontal plane.  The far ear is delayed by up to ~0.7ms and attenuated.
fn synthetic_collection(sample_rate: u32, measurements: usize) -> Vec<u8> {
    const HEAD_RADIUS: f32 = 0.0875;
    const SPEED_OF_SOUND: f32 = 343.0;
    let impulse_length = 64usize;

    let mut builder = MeasurementFileBuilder::new(sample_rate, impulse_length as u32, CoordinateSystem::Spherical);
    for m in 0..measurements {
        let azimuth = 360.0 * m as f32 / measurements as f32;
        // Positive toward the left ear.
        let lateral = azimuth.to_radians().sin();
        let delay = HEAD_RADIUS / SPEED_OF_SOUND * (lateral.abs() + lateral.abs().asin()) * sample_rate as f32;
        let far_gain = 1.0 - 0.6 * lateral.abs();

        let mut near = vec![0.0f32; impulse_length];
        near[0] = 1.0;
        let mut far = vec![0.0f32; impulse_length];
        far[(delay.round() as usize).min(impulse_length - 1)] = far_gain;

        let (left, right) = if lateral >= 0.0 { (&near, &far) } else { (&far, &near) };
        builder.measurement([azimuth, 0.0, 1.0], left, right);
    }

    builder.encode()
}

/// Bursts of noise, which localize far better than tones.
struct Source {
    state: u32,
    frame: u64,
    sample_rate: u32,
}

impl Source {
    fn next(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        let noise = self.state as f32 / u32::MAX as f32 * 2.0 - 1.0;

        let t = self.frame as f32 / self.sample_rate as f32;
        self.frame += 1;
        let gate = if t.fract() < 0.25 { 0.5 } else { 0.0 };
        noise * gate
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let database = Arc::new(HrtfDatabase::new(DatabaseOptions::default()));
    match &args.hrtf {
        Some(path) => database
            .load_file(path)
            .with_context(|| format!("Loading {}", path.display()))?,
        None => database.load(&synthetic_collection(args.sample_rate, args.measurements)[..])?,
    };

    let (mut spatializer, mut control) = Spatializer::new(
        database,
        SpatializerOptions {
            block_size: args.block_size,
            sample_rate: Some(args.sample_rate),
            initial_collection: Some(0),
        },
    )?;
    spatializer.readiness().context("The collection can't be used")?;

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: args.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)?;

    let mut source = Source {
        state: 0x1234_5678,
        frame: 0,
        sample_rate: args.sample_rate,
    };
    let total_frames = (args.seconds * args.sample_rate as f32) as usize;
    let blocks = total_frames / args.block_size;
    let mut input = vec![0.0f32; args.block_size];
    let mut output = vec![0.0f32; args.block_size * 2];

    for block in 0..blocks {
        let t = (block * args.block_size) as f32 / args.sample_rate as f32;
        let angle = std::f32::consts::TAU * t / args.period;
        control.set_direction(angle.cos(), angle.sin(), 0.0);

        input.iter_mut().for_each(|s| *s = source.next());
        spatializer.process(&input, &mut output, 1, 2);

        for s in output.iter() {
            writer.write_sample(*s)?;
        }
    }

    writer.finalize()?;
    log::info!(
        "Wrote {} blocks to {} with {} crossfades",
        blocks,
        args.output.display(),
        spatializer.transition_count()
    );
    Ok(())
}
