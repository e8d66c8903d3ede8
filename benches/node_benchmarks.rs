use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cgmath::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rauschen::nodes::{
    white_noise, BiquadFilter, BufferSource, Gain, Oscillator, Panner, PanningModel, Waveform,
};
use rauschen::{AmbienceConfig, AmbienceGate, AudioEngine, Gesture, ManualClock};

const SAMPLE_RATE: u32 = 48_000;

fn drain(capture: &mut rtrb::Consumer<f32>) {
    while let Ok(sample) = capture.pop() {
        black_box(sample);
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("Oscillator block", |b| {
        let (mut engine, mut capture) = AudioEngine::offline(SAMPLE_RATE, 1, 1024);
        let osc = engine.add(Oscillator::new(Waveform::Sine, 440.0).started());
        engine.output(&osc);
        engine.resume();

        b.iter(|| {
            engine.process();
            drain(&mut capture);
        })
    });

    c.bench_function("BiquadFilter block", |b| {
        let (mut engine, mut capture) = AudioEngine::offline(SAMPLE_RATE, 1, 1024);
        let noise = white_noise(SAMPLE_RATE, 1.0, 1.0, &mut StdRng::seed_from_u64(0));
        let source = engine.add(BufferSource::new(noise).looping(true).started());
        let filter = engine.add(BiquadFilter::band_pass(900.0, 0.8));
        engine.connect(&source, &filter);
        engine.output(&filter);
        engine.resume();

        b.iter(|| {
            engine.process();
            drain(&mut capture);
        })
    });

    for &(name, model) in &[("Panner equal-power block", PanningModel::EqualPower), ("Panner HRTF block", PanningModel::Hrtf)] {
        c.bench_function(name, |b| {
            let (mut engine, mut capture) = AudioEngine::offline(SAMPLE_RATE, 2, 1024);
            let osc = engine.add(Oscillator::new(Waveform::Sine, 38.0).started());
            let gain = engine.add(Gain::new(0.5).with_channels(1));
            let panner = engine.add(Panner::new().with_panning_model(model).with_position(Vector3::new(3.0, 1.0, -2.0)));
            engine.connect(&osc, &gain);
            engine.connect(&gain, &panner);
            engine.output(&panner);
            engine.resume();

            b.iter(|| {
                engine.process();
                drain(&mut capture);
            })
        });
    }

    c.bench_function("Ambience frame", |b| {
        let (mut engine, mut capture) = AudioEngine::offline(SAMPLE_RATE, 2, 4096);
        let clock = ManualClock::new(0.0);
        let mut gate = AmbienceGate::new(AmbienceConfig::default().with_noise_seed(0), clock.clone());
        gate.on_gesture(Gesture::PointerDown, &mut engine);

        // one ~16 ms frame: an update then 12 blocks
        b.iter(|| {
            gate.update(&engine, black_box(0.7), black_box(0.4));
            for _ in 0..12 {
                engine.process();
            }
            clock.advance(16.0);
            drain(&mut capture);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
