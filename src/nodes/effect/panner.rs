//! 3D positioning of a mono source relative to the listener

use cgmath::{InnerSpace, Vector3};
use dasp_graph::{Buffer, Input};

use super::sum_inputs;
use crate::listener::Listener;
use crate::node::{AudioNode, ProcessContext};
use crate::param::{AudioParam, ParamEvent};

/// How gain falls off with distance from the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceModel {
    /// `1 - rolloff * (d - ref) / (max - ref)`, `d` clamped to `[ref, max]`
    Linear,
    /// `ref / (ref + rolloff * (d - ref))`
    Inverse,
    /// `(d / ref) ^ -rolloff`
    Exponential,
}

/// How a position is turned into left/right signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanningModel {
    /// Constant-power amplitude panning on the azimuth.
    EqualPower,
    /// Equal-power panning plus a spherical-head model: the far ear hears the
    /// source late (interaural time difference) and darker (head shadow).
    Hrtf,
}

/// Messages to control a [`Panner`]
#[derive(Clone, Copy, Debug)]
pub enum PannerMessage {
    PositionX(ParamEvent),
    PositionY(ParamEvent),
    PositionZ(ParamEvent),
    SetDistanceModel(DistanceModel),
    SetPanningModel(PanningModel),
    SetRefDistance(f32),
    SetMaxDistance(f32),
    SetRolloffFactor(f32),
}

/// Head radius used by the spherical-head model, in meters.
const HEAD_RADIUS: f32 = 0.0875;
const SPEED_OF_SOUND: f32 = 343.0;
/// Delay line length per ear; covers the largest interaural delay up to ~700 kHz.
const DELAY_LEN: usize = 512;

/// Azimuth and elevation of `source` as heard by `listener`, in degrees.
///
/// Azimuth is 0 straight ahead, +90 to the right, -90 to the left and ±180
/// behind. A source at the listener's position is straight ahead.
pub fn azimuth_elevation(source: Vector3<f32>, listener: &Listener) -> (f32, f32) {
    let to_source = source - listener.position;
    if to_source.magnitude2() == 0.0 {
        return (0.0, 0.0);
    }
    let to_source = to_source.normalize();

    let right = listener.right();
    let forward = listener.forward.normalize();
    let up = right.cross(forward);

    let up_projection = to_source.dot(up);
    let projected = to_source - up * up_projection;

    // straight above or below is centered
    let azimuth = if projected.magnitude2() == 0.0 {
        0.0
    } else {
        let projected = projected.normalize();
        let mut azimuth = projected.dot(right).clamp(-1.0, 1.0).acos().to_degrees();
        if projected.dot(forward) < 0.0 {
            azimuth = 360.0 - azimuth;
        }
        if (0.0..=270.0).contains(&azimuth) { 90.0 - azimuth } else { 450.0 - azimuth }
    };

    let mut elevation = 90.0 - to_source.dot(up).clamp(-1.0, 1.0).acos().to_degrees();
    if elevation > 90.0 {
        elevation = 180.0 - elevation;
    } else if elevation < -90.0 {
        elevation = -180.0 - elevation;
    }

    (azimuth, elevation)
}

/// Fold an azimuth behind the listener onto the front half-plane, `[-90, 90]`.
#[inline]
fn fold_azimuth(azimuth: f32) -> f32 {
    let azimuth = azimuth.clamp(-180.0, 180.0);
    if azimuth < -90.0 {
        -180.0 - azimuth
    } else if azimuth > 90.0 {
        180.0 - azimuth
    } else {
        azimuth
    }
}

/// Constant-power `(left, right)` gains for an azimuth in degrees.
pub fn equal_power_gains(azimuth: f32) -> (f32, f32) {
    let x = (fold_azimuth(azimuth) + 90.0) / 180.0;
    let angle = x * core::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Gain for a source `distance` away from the listener.
pub fn distance_gain(model: DistanceModel, distance: f32, ref_distance: f32, max_distance: f32, rolloff: f32) -> f32 {
    match model {
        DistanceModel::Linear => {
            let span = max_distance - ref_distance;
            if span <= 0.0 {
                return 1.0;
            }
            let d = distance.clamp(ref_distance, max_distance);
            1.0 - rolloff.clamp(0.0, 1.0) * (d - ref_distance) / span
        }
        DistanceModel::Inverse => {
            let d = distance.max(ref_distance);
            ref_distance / (ref_distance + rolloff * (d - ref_distance))
        }
        DistanceModel::Exponential => {
            let d = distance.max(ref_distance);
            (d / ref_distance).powf(-rolloff)
        }
    }
}

/// Interaural time difference (Woodworth) for a folded azimuth, in seconds.
#[inline]
fn interaural_delay(folded_azimuth: f32) -> f32 {
    let theta = folded_azimuth.abs().to_radians();
    HEAD_RADIUS / SPEED_OF_SOUND * (theta + theta.sin())
}

/// Head-shadow cutoff for the ear facing away from the source.
#[inline]
fn shadow_cutoff(folded_azimuth: f32) -> f32 {
    20_000.0 * (1.0 - 0.85 * folded_azimuth.abs().to_radians().sin())
}

/// Per-ear state of the spherical-head model.
struct Ear {
    delay_line: [f32; DELAY_LEN],
    /// delay (samples) reached at the end of the last block
    delay: f32,
    /// one-pole low-pass state and coefficient target
    lp: f32,
    cutoff: f32,
}

impl Ear {
    fn new() -> Self {
        Self {
            delay_line: [0.0; DELAY_LEN],
            delay: 0.0,
            lp: 0.0,
            cutoff: 20_000.0,
        }
    }

    #[inline]
    fn read(&self, write: usize, delay: f32) -> f32 {
        let whole = delay.floor();
        let frac = delay - whole;
        let i0 = (write + DELAY_LEN - whole as usize) % DELAY_LEN;
        let i1 = (i0 + DELAY_LEN - 1) % DELAY_LEN;
        self.delay_line[i0] * (1.0 - frac) + self.delay_line[i1] * frac
    }
}

/// Positions a mono signal in 3D space and renders it to stereo.
///
/// The node sums (and downmixes) its inputs to mono, then applies the
/// distance gain and the panning model against the [`Listener`] of the block.
/// Position is read at the start of each block; gains (and, for
/// [`PanningModel::Hrtf`], ear delays) are interpolated across the block.
pub struct Panner {
    position: [AudioParam; 3],
    distance_model: DistanceModel,
    panning_model: PanningModel,
    ref_distance: f32,
    max_distance: f32,
    rolloff_factor: f32,

    gains: Option<(f32, f32)>,
    ears: [Ear; 2],
    write: usize,
}

impl Panner {
    /// A panner at the origin with Web Audio defaults: equal-power panning,
    /// inverse distance, ref distance 1, max distance 10000, rolloff 1.
    pub fn new() -> Self {
        Self {
            position: [AudioParam::unbounded(0.0), AudioParam::unbounded(0.0), AudioParam::unbounded(0.0)],
            distance_model: DistanceModel::Inverse,
            panning_model: PanningModel::EqualPower,
            ref_distance: 1.0,
            max_distance: 10_000.0,
            rolloff_factor: 1.0,
            gains: None,
            ears: [Ear::new(), Ear::new()],
            write: 0,
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = [
            AudioParam::unbounded(position.x),
            AudioParam::unbounded(position.y),
            AudioParam::unbounded(position.z),
        ];
        self
    }

    pub fn with_distance_model(mut self, model: DistanceModel) -> Self {
        self.distance_model = model;
        self
    }

    pub fn with_panning_model(mut self, model: PanningModel) -> Self {
        self.panning_model = model;
        self
    }

    pub fn with_ref_distance(mut self, distance: f32) -> Self {
        self.set_ref_distance(distance);
        self
    }

    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.set_max_distance(distance);
        self
    }

    pub fn with_rolloff_factor(mut self, rolloff: f32) -> Self {
        self.rolloff_factor = rolloff.max(0.0);
        self
    }

    fn set_ref_distance(&mut self, distance: f32) {
        self.ref_distance = distance.max(1e-6);
    }

    fn set_max_distance(&mut self, distance: f32) {
        self.max_distance = distance.max(1e-6);
    }

    /// Position as of the last processed block.
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.position[0].value(), self.position[1].value(), self.position[2].value())
    }

    fn gains_for(&self, source: Vector3<f32>, listener: &Listener) -> (f32, f32, f32) {
        let (azimuth, _elevation) = azimuth_elevation(source, listener);
        let distance = (source - listener.position).magnitude();
        let attenuation = distance_gain(
            self.distance_model,
            distance,
            self.ref_distance,
            self.max_distance,
            self.rolloff_factor,
        );
        let (l, r) = equal_power_gains(azimuth);
        (l * attenuation, r * attenuation, fold_azimuth(azimuth))
    }
}

impl Default for Panner {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Panner {
    type Message = PannerMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = PannerMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let now = ctx.time();
        for msg in messages {
            match msg {
                PannerMessage::PositionX(e) => self.position[0].schedule(e, now),
                PannerMessage::PositionY(e) => self.position[1].schedule(e, now),
                PannerMessage::PositionZ(e) => self.position[2].schedule(e, now),
                PannerMessage::SetDistanceModel(m) => self.distance_model = m,
                PannerMessage::SetPanningModel(m) => self.panning_model = m,
                PannerMessage::SetRefDistance(d) => self.set_ref_distance(d),
                PannerMessage::SetMaxDistance(d) => self.set_max_distance(d),
                PannerMessage::SetRolloffFactor(r) => self.rolloff_factor = r.max(0.0),
            }
        }

        let source = Vector3::new(
            self.position[0].value_at(now),
            self.position[1].value_at(now),
            self.position[2].value_at(now),
        );
        let (target_l, target_r, folded) = self.gains_for(source, &ctx.listener);
        let (start_l, start_r) = self.gains.unwrap_or((target_l, target_r));
        self.gains = Some((target_l, target_r));

        let mut mono = [Buffer::SILENT];
        sum_inputs(inputs, &mut mono);

        if outputs.len() < 2 {
            return;
        }
        let (left, right) = outputs.split_at_mut(1);
        let (left, right) = (&mut left[0], &mut right[0]);

        let n = mono[0].len() as f32;
        let sr = ctx.sample_rate as f32;

        match self.panning_model {
            PanningModel::EqualPower => {
                for (i, &x) in mono[0].iter().enumerate() {
                    let t = (i + 1) as f32 / n;
                    left[i] = x * (start_l + (target_l - start_l) * t);
                    right[i] = x * (start_r + (target_r - start_r) * t);
                }
            }
            PanningModel::Hrtf => {
                // +azimuth is to the right, so the left ear is the far one
                let itd = (interaural_delay(folded) * sr).min((DELAY_LEN - 2) as f32);
                let shadow = shadow_cutoff(folded);
                let targets = if folded > 0.0 {
                    [(itd, shadow), (0.0, 20_000.0)]
                } else {
                    [(0.0, 20_000.0), (itd, shadow)]
                };

                let start_delays = [self.ears[0].delay, self.ears[1].delay];
                for (ear, &(delay, cutoff)) in self.ears.iter_mut().zip(targets.iter()) {
                    ear.delay = delay;
                    ear.cutoff = cutoff;
                }
                let coeffs = [
                    1.0 - (-core::f32::consts::TAU * self.ears[0].cutoff.min(sr * 0.45) / sr).exp(),
                    1.0 - (-core::f32::consts::TAU * self.ears[1].cutoff.min(sr * 0.45) / sr).exp(),
                ];

                for (i, &x) in mono[0].iter().enumerate() {
                    let t = (i + 1) as f32 / n;
                    self.write = (self.write + 1) % DELAY_LEN;
                    let gains = [start_l + (target_l - start_l) * t, start_r + (target_r - start_r) * t];
                    let mut ear_out = [0.0f32; 2];

                    for (e, ear) in self.ears.iter_mut().enumerate() {
                        ear.delay_line[self.write] = x;
                        let delay = start_delays[e] + (ear.delay - start_delays[e]) * t;
                        let delayed = ear.read(self.write, delay);
                        ear.lp += coeffs[e] * (delayed - ear.lp);
                        ear_out[e] = ear.lp * gains[e];
                    }

                    left[i] = ear_out[0];
                    right[i] = ear_out[1];
                }
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dc, render};
    use crate::AudioEngine;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn azimuth_of_cardinal_directions() {
        let l = Listener::default();
        assert!(close(azimuth_elevation(Vector3::new(0.0, 0.0, -1.0), &l).0, 0.0));
        assert!(close(azimuth_elevation(Vector3::new(1.0, 0.0, 0.0), &l).0, 90.0));
        assert!(close(azimuth_elevation(Vector3::new(-1.0, 0.0, 0.0), &l).0, -90.0));
        assert!(close(azimuth_elevation(Vector3::new(0.0, 0.0, 1.0), &l).0.abs(), 180.0));
    }

    #[test]
    fn elevation_above() {
        let l = Listener::default();
        let (az, el) = azimuth_elevation(Vector3::new(0.0, 1.0, 0.0), &l);
        assert_eq!(az, 0.0);
        assert!(close(el, 90.0));

        let (az, el) = azimuth_elevation(Vector3::new(0.0, -2.0, 0.0), &l);
        assert_eq!(az, 0.0);
        assert!(close(el, -90.0));
    }

    #[test]
    fn overhead_source_is_centered() {
        for &model in &[PanningModel::EqualPower, PanningModel::Hrtf] {
            let (l, r) = render_panned(model, Vector3::new(0.0, 3.0, 0.0));
            assert!(close(l, r), "{:?}: l={} r={}", model, l, r);
            assert!(close(l, core::f32::consts::FRAC_1_SQRT_2 / 3.0), "{:?}: l={}", model, l);
        }
    }

    #[test]
    fn equal_power_law() {
        let (l, r) = equal_power_gains(0.0);
        assert!(close(l, r));
        assert!(close(l * l + r * r, 1.0));

        let (l, r) = equal_power_gains(90.0);
        assert!(close(l, 0.0) && close(r, 1.0));

        // behind is folded onto the front
        let (l, r) = equal_power_gains(180.0);
        assert!(close(l, r));
    }

    #[test]
    fn distance_models() {
        assert!(close(distance_gain(DistanceModel::Inverse, 4.0, 1.0, 10_000.0, 1.0), 0.25));
        assert!(close(distance_gain(DistanceModel::Inverse, 0.5, 1.0, 10_000.0, 1.0), 1.0));
        assert!(close(distance_gain(DistanceModel::Exponential, 4.0, 1.0, 10_000.0, 2.0), 1.0 / 16.0));
        assert!(close(distance_gain(DistanceModel::Linear, 6.0, 1.0, 11.0, 1.0), 0.5));
        assert!(close(distance_gain(DistanceModel::Linear, 50.0, 1.0, 11.0, 1.0), 0.0));
    }

    #[test]
    fn interaural_delay_peaks_at_the_side() {
        assert_eq!(interaural_delay(0.0), 0.0);
        let side = interaural_delay(90.0);
        assert!(side > 6.0e-4 && side < 7.0e-4);
        assert!(interaural_delay(45.0) < side);
    }

    fn render_panned(model: PanningModel, position: Vector3<f32>) -> (f32, f32) {
        let (mut engine, mut capture) = AudioEngine::offline(48_000, 2, 4096);
        let source = engine.add(dc(1.0, 48_000));
        let panner = engine.add(Panner::new().with_panning_model(model).with_position(position));
        engine.connect(&source, &panner);
        engine.output(&panner);
        engine.resume();

        let out = render(&mut engine, &mut capture, 20);
        // last frame, after any delay/filter settling
        let frames = out.len() / 2;
        (out[(frames - 1) * 2], out[(frames - 1) * 2 + 1])
    }

    #[test]
    fn source_on_the_right_is_louder_right() {
        for &model in &[PanningModel::EqualPower, PanningModel::Hrtf] {
            let (l, r) = render_panned(model, Vector3::new(4.0, 0.0, 0.0));
            assert!(r > l, "{:?}: l={} r={}", model, l, r);
            assert!(close(r, 0.25), "{:?}: r={}", model, r);
        }
    }

    #[test]
    fn centered_source_is_balanced() {
        let (l, r) = render_panned(PanningModel::Hrtf, Vector3::new(0.0, 0.0, -2.0));
        assert!(close(l, r));
        assert!(close(l, 0.5 * core::f32::consts::FRAC_1_SQRT_2));
    }
}
