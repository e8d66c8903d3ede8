//! Play the reactive ambience on the default output device
//!
//! Run with: cargo run --example ambience --features cpal_sink
//!
//! Press Enter to "click" and start the sound, then watch threat and focus
//! drift: the rumble rises and circles faster as threat climbs. Set
//! `RUST_LOG=rauschen=debug` to see the graph being wired.

use std::io;
use std::thread::sleep;
use std::time::{Duration, Instant};

use rauschen::{AmbienceConfig, AmbienceGate, AudioEngine, Gesture};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let mut engine = match AudioEngine::default_output() {
        Some(engine) => engine,
        None => {
            eprintln!("No audio output device found!");
            return;
        }
    };

    let mut gate = AmbienceGate::with_system_clock(AmbienceConfig::default());

    // Nothing happens before the first gesture
    gate.update(&engine, 1.0, 0.0);

    println!("Press Enter to start the ambience...");
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
    gate.on_gesture(Gesture::KeyDown, &mut engine);

    println!("Playing... Ctrl+C to stop\n");

    let rate = engine.sample_rate() as f64;
    let start = Instant::now();
    let mut blocks = 0u64;
    let mut last_frame = Instant::now();
    let mut last_report = 0u64;

    loop {
        let elapsed = start.elapsed().as_secs_f64();

        // ~60 updates per second, like an animation frame callback
        if last_frame.elapsed() >= Duration::from_millis(16) {
            last_frame = Instant::now();
            let threat = (0.5 + 0.5 * (elapsed * 0.1).sin()) as f32;
            let focus = (0.5 + 0.5 * (elapsed * 0.037).cos()) as f32;
            gate.update(&engine, threat, focus);

            if elapsed as u64 >= last_report + 2 {
                last_report = elapsed as u64;
                if let Some(frame) = gate.ambience().and_then(|a| a.last_frame()) {
                    info!(
                        threat = frame.threat,
                        focus = frame.focus,
                        rumble_gain = frame.targets.rumble_gain,
                        rumble_hz = frame.targets.rumble_frequency,
                        hiss_gain = frame.targets.hiss_gain,
                        "ambience"
                    );
                }
            }
        }

        // Stay a few blocks ahead to prevent underruns
        let target = (elapsed * rate / 64.0) as u64 + 8;
        while blocks < target {
            engine.process();
            blocks += 1;
        }

        sleep(Duration::from_micros(500));
    }
}
