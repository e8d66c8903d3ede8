//! Reactive procedural ambience.
//!
//! Two layers driven by a pair of scalars in `[0, 1]`:
//!
//! - a low sine **rumble** whose level and pitch rise with `threat` and fall with `focus`
//! - a band-passed noise **hiss** whose level rises with `threat`
//!
//! Both layers orbit the listener on opposite sides, faster as `threat` rises,
//! and the rumble lifts above the listener as `focus` drops.
//!
//! ```text
//! sine 38 Hz ──> gain ──> panner ──┐
//!                                  ├──> master (0.6) ──> output
//! noise ──> band-pass ──> gain ──> panner ──┘
//! ```
//!
//! Hosts that forbid audio before user interaction wrap the controller in an
//! [`AmbienceGate`], which builds the graph on the first pointer-down or
//! key-down and ignores updates until then.
//!
//! ```
//! use rauschen::{AmbienceConfig, AmbienceGate, AudioEngine, Gesture, ManualClock};
//!
//! let (mut engine, _capture) = AudioEngine::offline(48_000, 2, 8192);
//! let mut gate = AmbienceGate::new(AmbienceConfig::default().with_noise_seed(1), ManualClock::new(0.0));
//!
//! gate.update(&engine, 0.8, 0.2); // ignored, nothing started yet
//! gate.on_gesture(Gesture::KeyDown, &mut engine);
//! gate.update(&engine, 0.8, 0.2);
//!
//! engine.process();
//! ```

use core::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cgmath::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::engine::{AudioEngine, EngineState, Handle};
use crate::nodes::{
    white_noise, BiquadFilter, BiquadMessage, BufferSource, BufferSourceMessage, DistanceModel, Gain,
    GainMessage, Oscillator, OscillatorMessage, Panner, PannerMessage, PanningModel, Waveform,
};
use crate::param::ParamEvent;

/// Settings for an [`Ambience`].
///
/// Defaults reproduce the stock sound; use the `with_*` builders to change it.
#[derive(Clone, Debug, PartialEq)]
pub struct AmbienceConfig {
    pub master_gain: f32,
    /// Rumble pitch before the first update, in Hz
    pub rumble_frequency: f32,
    pub hiss_frequency: f32,
    pub hiss_q: f32,
    /// Length of the looped noise buffer, in seconds
    pub noise_seconds: f32,
    pub noise_amplitude: f32,
    /// Seed for the noise buffer; `None` draws one from the OS
    pub noise_seed: Option<u64>,
    /// Distance of both layers from the listener
    pub orbit_radius: f32,
    /// Ramp lengths, in seconds from the time of the update
    pub rumble_gain_ramp: f64,
    pub hiss_gain_ramp: f64,
    pub rumble_frequency_ramp: f64,
    pub panning_model: PanningModel,
    pub distance_model: DistanceModel,
}

impl Default for AmbienceConfig {
    fn default() -> Self {
        Self {
            master_gain: 0.6,
            rumble_frequency: 38.0,
            hiss_frequency: 900.0,
            hiss_q: 0.8,
            noise_seconds: 2.0,
            noise_amplitude: 5.0,
            noise_seed: None,
            orbit_radius: 4.0,
            rumble_gain_ramp: 0.15,
            hiss_gain_ramp: 0.1,
            rumble_frequency_ramp: 0.2,
            panning_model: PanningModel::Hrtf,
            distance_model: DistanceModel::Inverse,
        }
    }
}

impl AmbienceConfig {
    pub fn with_master_gain(mut self, gain: f32) -> Self {
        self.master_gain = gain;
        self
    }

    pub fn with_rumble_frequency(mut self, frequency: f32) -> Self {
        self.rumble_frequency = frequency;
        self
    }

    pub fn with_hiss_band(mut self, frequency: f32, q: f32) -> Self {
        self.hiss_frequency = frequency;
        self.hiss_q = q;
        self
    }

    pub fn with_noise(mut self, seconds: f32, amplitude: f32) -> Self {
        self.noise_seconds = seconds;
        self.noise_amplitude = amplitude;
        self
    }

    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    pub fn with_orbit_radius(mut self, radius: f32) -> Self {
        self.orbit_radius = radius;
        self
    }

    /// Set the rumble gain, hiss gain and rumble pitch ramp lengths in seconds.
    pub fn with_ramps(mut self, rumble_gain: f64, hiss_gain: f64, rumble_frequency: f64) -> Self {
        self.rumble_gain_ramp = rumble_gain;
        self.hiss_gain_ramp = hiss_gain;
        self.rumble_frequency_ramp = rumble_frequency;
        self
    }

    pub fn with_panning_model(mut self, model: PanningModel) -> Self {
        self.panning_model = model;
        self
    }

    pub fn with_distance_model(mut self, model: DistanceModel) -> Self {
        self.distance_model = model;
        self
    }
}

/// Clamp `threat` and `focus` into `[0, 1]`; NaN falls back to calm (`0`, `1`).
#[inline]
fn sanitize(threat: f32, focus: f32) -> (f32, f32) {
    let threat = if threat.is_nan() { 0.0 } else { threat.clamp(0.0, 1.0) };
    let focus = if focus.is_nan() { 1.0 } else { focus.clamp(0.0, 1.0) };
    (threat, focus)
}

/// Ramp targets for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbienceTargets {
    pub rumble_gain: f32,
    pub hiss_gain: f32,
    /// Hz
    pub rumble_frequency: f32,
}

impl AmbienceTargets {
    pub fn new(threat: f32, focus: f32) -> Self {
        let (threat, focus) = sanitize(threat, focus);
        Self {
            rumble_gain: 0.15 + threat * 0.5 + (1.0 - focus) * 0.25,
            hiss_gain: 0.02 + threat * 0.3,
            rumble_frequency: 36.0 + threat * 12.0 + (1.0 - focus) * 6.0,
        }
    }
}

/// Where the two layers sit for one update.
///
/// The hiss mirrors the rumble through the vertical axis and sits lower.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitPositions {
    /// Orbit angle in radians
    pub angle: f64,
    pub rumble: Vector3<f32>,
    pub hiss: Vector3<f32>,
}

impl OrbitPositions {
    pub fn new(now_ms: f64, threat: f32, focus: f32, radius: f32) -> Self {
        let (threat, focus) = sanitize(threat, focus);
        let angle = now_ms * 0.0003 * (0.5 + threat as f64);
        let rumble = Vector3::new(
            angle.cos() as f32 * radius,
            (1.0 - focus) * 1.5,
            angle.sin() as f32 * radius,
        );
        let hiss = Vector3::new(-rumble.x, rumble.y * 0.6, -rumble.z);
        Self { angle, rumble, hiss }
    }
}

/// Wall-clock source driving the orbit.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a caller can keep one and hand the other
/// to an [`Ambience`].
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(now_ms.to_bits())),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.bits.store(now_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, ms: f64) {
        self.set(self.now_ms() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Everything one [`Ambience::update`] scheduled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbienceFrame {
    /// Inputs after clamping
    pub threat: f32,
    pub focus: f32,
    /// Engine time the ramps were scheduled from
    pub time: f64,
    pub targets: AmbienceTargets,
    pub positions: OrbitPositions,
}

/// Handles to the rumble layer.
struct Rumble {
    oscillator: Handle<OscillatorMessage>,
    gain: Handle<GainMessage>,
    panner: Handle<PannerMessage>,
}

/// Handles to the hiss layer.
struct Hiss {
    source: Handle<BufferSourceMessage>,
    filter: Handle<BiquadMessage>,
    gain: Handle<GainMessage>,
    panner: Handle<PannerMessage>,
}

/// The running ambience: owns the handles to its nodes.
///
/// Created by [`Ambience::initialize`], usually through an [`AmbienceGate`].
pub struct Ambience<C: Clock = SystemClock> {
    config: AmbienceConfig,
    clock: C,
    _master: Handle<GainMessage>,
    rumble: Rumble,
    hiss: Hiss,
    last_frame: Option<AmbienceFrame>,
}

impl<C: Clock> Ambience<C> {
    /// Build the ambience graph on `engine` and start it.
    ///
    /// Places the listener at the origin facing -Z, and resumes the engine if
    /// it is suspended. Both layers start silent; the first
    /// [`update`](Self::update) fades them in.
    ///
    /// # Panics
    ///
    /// Panics if `engine` has no output sink.
    pub fn initialize(engine: &mut AudioEngine, config: AmbienceConfig, clock: C) -> Self {
        let master = engine.add(Gain::new(config.master_gain));
        engine.output(&master);

        let panner = || {
            Panner::new()
                .with_panning_model(config.panning_model)
                .with_distance_model(config.distance_model)
        };

        let rumble = Rumble {
            oscillator: engine.add(Oscillator::new(Waveform::Sine, config.rumble_frequency).started()),
            gain: engine.add(Gain::new(0.0).with_channels(1)),
            panner: engine.add(panner()),
        };
        engine.connect(&rumble.oscillator, &rumble.gain);
        engine.connect(&rumble.gain, &rumble.panner);
        engine.connect(&rumble.panner, &master);

        let mut rng = match config.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = white_noise(engine.sample_rate(), config.noise_seconds, config.noise_amplitude, &mut rng);
        let hiss = Hiss {
            source: engine.add(BufferSource::new(noise).looping(true).started()),
            filter: engine.add(BiquadFilter::band_pass(config.hiss_frequency, config.hiss_q)),
            gain: engine.add(Gain::new(0.0).with_channels(1)),
            panner: engine.add(panner()),
        };
        engine.connect(&hiss.source, &hiss.filter);
        engine.connect(&hiss.filter, &hiss.gain);
        engine.connect(&hiss.gain, &hiss.panner);
        engine.connect(&hiss.panner, &master);

        let listener = engine.listener_mut();
        listener.set_position(Vector3::new(0.0, 0.0, 0.0));
        listener.set_orientation(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 1.0, 0.0));

        if engine.state() == EngineState::Suspended {
            engine.resume();
        }

        info!(nodes = engine.node_count(), sample_rate = engine.sample_rate(), "ambience initialized");

        Self {
            config,
            clock,
            _master: master,
            rumble,
            hiss,
            last_frame: None,
        }
    }

    /// Steer the ambience toward `threat` and `focus` (both clamped to `[0, 1]`).
    ///
    /// Schedules short linear ramps for the layer levels and the rumble pitch
    /// and moves both panners, all relative to the engine's current time.
    /// Meant to be called once per frame.
    pub fn update(&mut self, engine: &AudioEngine, threat: f32, focus: f32) {
        let (threat, focus) = sanitize(threat, focus);
        let t = engine.current_time();
        let targets = AmbienceTargets::new(threat, focus);
        let positions = OrbitPositions::new(self.clock.now_ms(), threat, focus, self.config.orbit_radius);

        send(
            &mut self.rumble.gain,
            "rumble gain",
            GainMessage::Gain(ParamEvent::linear_ramp(targets.rumble_gain, t + self.config.rumble_gain_ramp)),
        );
        send(
            &mut self.hiss.gain,
            "hiss gain",
            GainMessage::Gain(ParamEvent::linear_ramp(targets.hiss_gain, t + self.config.hiss_gain_ramp)),
        );
        send(
            &mut self.rumble.oscillator,
            "rumble oscillator",
            OscillatorMessage::Frequency(ParamEvent::linear_ramp(
                targets.rumble_frequency,
                t + self.config.rumble_frequency_ramp,
            )),
        );

        place(&mut self.rumble.panner, "rumble panner", positions.rumble, t);
        place(&mut self.hiss.panner, "hiss panner", positions.hiss, t);

        self.last_frame = Some(AmbienceFrame {
            threat,
            focus,
            time: t,
            targets,
            positions,
        });
    }

    /// What the most recent [`update`](Self::update) scheduled, if any.
    pub fn last_frame(&self) -> Option<&AmbienceFrame> {
        self.last_frame.as_ref()
    }

    pub fn config(&self) -> &AmbienceConfig {
        &self.config
    }
}

fn send<M: Debug + Send + 'static>(handle: &mut Handle<M>, node: &'static str, msg: M) {
    if let Err(msg) = handle.send(msg) {
        warn!(node, ?msg, "message queue full, dropping");
    }
}

fn place(panner: &mut Handle<PannerMessage>, node: &'static str, position: Vector3<f32>, time: f64) {
    send(panner, node, PannerMessage::PositionX(ParamEvent::set_at(position.x, time)));
    send(panner, node, PannerMessage::PositionY(ParamEvent::set_at(position.y, time)));
    send(panner, node, PannerMessage::PositionZ(ParamEvent::set_at(position.z, time)));
}

/// A user interaction reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    PointerDown,
    KeyDown,
    PointerMove,
    Wheel,
}

impl Gesture {
    /// Whether hosts count this gesture as permission to start audio.
    pub fn is_activation(self) -> bool {
        matches!(self, Gesture::PointerDown | Gesture::KeyDown)
    }
}

/// Defers building an [`Ambience`] until the first activating [`Gesture`].
///
/// Until then every call is a no-op.
pub struct AmbienceGate<C: Clock = SystemClock> {
    pending: Option<(AmbienceConfig, C)>,
    ambience: Option<Ambience<C>>,
}

impl AmbienceGate<SystemClock> {
    /// A gate whose orbit follows the wall clock.
    pub fn with_system_clock(config: AmbienceConfig) -> Self {
        Self::new(config, SystemClock::new())
    }
}

impl<C: Clock> AmbienceGate<C> {
    pub fn new(config: AmbienceConfig, clock: C) -> Self {
        Self {
            pending: Some((config, clock)),
            ambience: None,
        }
    }

    /// Report a user gesture. Starts the ambience on the first pointer-down or
    /// key-down; returns `true` only for the call that started it.
    pub fn on_gesture(&mut self, gesture: Gesture, engine: &mut AudioEngine) -> bool {
        if !gesture.is_activation() {
            return false;
        }
        match self.pending.take() {
            Some((config, clock)) => {
                debug!(?gesture, "starting ambience");
                self.ambience = Some(Ambience::initialize(engine, config, clock));
                true
            }
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.ambience.is_some()
    }

    pub fn ambience(&self) -> Option<&Ambience<C>> {
        self.ambience.as_ref()
    }

    /// Forward to [`Ambience::update`] once started.
    pub fn update(&mut self, engine: &AudioEngine, threat: f32, focus: f32) {
        if let Some(ambience) = self.ambience.as_mut() {
            ambience.update(engine, threat, focus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn calm_targets() {
        let t = AmbienceTargets::new(0.0, 1.0);
        assert!(close(t.rumble_gain, 0.15));
        assert!(close(t.hiss_gain, 0.02));
        assert!(close(t.rumble_frequency, 36.0));
    }

    #[test]
    fn panic_targets() {
        let t = AmbienceTargets::new(1.0, 0.0);
        assert!(close(t.rumble_gain, 0.90));
        assert!(close(t.hiss_gain, 0.32));
        assert!(close(t.rumble_frequency, 54.0));
    }

    #[test]
    fn inputs_are_clamped() {
        assert_eq!(AmbienceTargets::new(3.0, -2.0), AmbienceTargets::new(1.0, 0.0));
        assert_eq!(AmbienceTargets::new(-0.5, 7.0), AmbienceTargets::new(0.0, 1.0));
        assert_eq!(
            OrbitPositions::new(1234.0, 2.0, -1.0, 4.0),
            OrbitPositions::new(1234.0, 1.0, 0.0, 4.0)
        );
    }

    #[test]
    fn nan_means_calm() {
        assert_eq!(AmbienceTargets::new(f32::NAN, f32::NAN), AmbienceTargets::new(0.0, 1.0));
    }

    #[test]
    fn targets_are_monotonic() {
        let steps: Vec<f32> = (0..=10).map(|i| i as f32 / 10.0).collect();
        for pair in steps.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            for &other in &steps {
                assert!(AmbienceTargets::new(hi, other).rumble_gain >= AmbienceTargets::new(lo, other).rumble_gain);
                assert!(AmbienceTargets::new(other, hi).rumble_gain <= AmbienceTargets::new(other, lo).rumble_gain);
                assert!(AmbienceTargets::new(hi, other).hiss_gain >= AmbienceTargets::new(lo, other).hiss_gain);
                assert_eq!(
                    AmbienceTargets::new(other, hi).hiss_gain,
                    AmbienceTargets::new(other, lo).hiss_gain
                );
            }
        }
    }

    #[test]
    fn hiss_mirrors_rumble() {
        for &(ms, threat, focus) in &[(0.0, 0.0, 1.0), (1500.0, 0.3, 0.6), (98_765.4, 1.0, 0.0)] {
            let p = OrbitPositions::new(ms, threat, focus, 4.0);
            assert_eq!(p.hiss.x, -p.rumble.x);
            assert_eq!(p.hiss.y, p.rumble.y * 0.6);
            assert_eq!(p.hiss.z, -p.rumble.z);
        }
    }

    #[test]
    fn orbit_geometry() {
        let p = OrbitPositions::new(0.0, 0.0, 1.0, 4.0);
        assert_eq!(p.angle, 0.0);
        assert!(close(p.rumble.x, 4.0) && close(p.rumble.y, 0.0) && close(p.rumble.z, 0.0));

        // 0.0003 rad/ms at threat 0.5 is a quarter turn in ~5236 ms
        let quarter = core::f64::consts::FRAC_PI_2 / 0.0003;
        let p = OrbitPositions::new(quarter, 0.5, 0.0, 4.0);
        assert!(close(p.rumble.x, 0.0) && close(p.rumble.z, 4.0));
        assert!(close(p.rumble.y, 1.5));
        assert!(close(p.hiss.y, 0.9));
    }

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new(10.0);
        let other = clock.clone();
        other.advance(5.0);
        assert_eq!(clock.now_ms(), 15.0);
    }

    #[test]
    fn gate_ignores_everything_until_activation() {
        let (mut engine, _capture) = AudioEngine::offline(8_000, 2, 256);
        let mut gate = AmbienceGate::new(AmbienceConfig::default().with_noise_seed(3), ManualClock::new(0.0));

        gate.update(&engine, 1.0, 0.0);
        assert!(!gate.on_gesture(Gesture::PointerMove, &mut engine));
        assert!(!gate.on_gesture(Gesture::Wheel, &mut engine));

        assert!(!gate.is_started());
        assert!(gate.ambience().is_none());
        assert_eq!(engine.node_count(), 1);
        assert_eq!(engine.state(), EngineState::Suspended);
    }

    #[test]
    fn gate_starts_once() {
        let (mut engine, _capture) = AudioEngine::offline(8_000, 2, 256);
        let mut gate = AmbienceGate::new(AmbienceConfig::default().with_noise_seed(3), ManualClock::new(0.0));

        assert!(gate.on_gesture(Gesture::PointerDown, &mut engine));
        assert!(gate.is_started());
        assert_eq!(engine.state(), EngineState::Running);
        let nodes = engine.node_count();
        assert_eq!(nodes, 1 + 8);

        assert!(!gate.on_gesture(Gesture::KeyDown, &mut engine));
        assert_eq!(engine.node_count(), nodes);
    }

    #[test]
    fn update_records_frame() {
        let (mut engine, _capture) = AudioEngine::offline(8_000, 2, 256);
        let clock = ManualClock::new(0.0);
        let mut ambience = Ambience::initialize(&mut engine, AmbienceConfig::default().with_noise_seed(9), clock.clone());
        assert!(ambience.last_frame().is_none());

        engine.process();
        clock.set(2_000.0);
        ambience.update(&engine, 1.5, 0.25);

        let frame = ambience.last_frame().copied().unwrap();
        assert_eq!(frame.threat, 1.0);
        assert_eq!(frame.focus, 0.25);
        assert_eq!(frame.time, engine.current_time());
        assert_eq!(frame.targets, AmbienceTargets::new(1.0, 0.25));
        assert_eq!(frame.positions, OrbitPositions::new(2_000.0, 1.0, 0.25, 4.0));
    }

    #[test]
    fn listener_is_reset() {
        let (mut engine, _capture) = AudioEngine::offline(8_000, 2, 256);
        engine.listener_mut().set_position(Vector3::new(3.0, 2.0, 1.0));
        let _ambience = Ambience::initialize(&mut engine, AmbienceConfig::default().with_noise_seed(1), ManualClock::new(0.0));
        assert_eq!(*engine.listener(), crate::Listener::default());
    }
}
