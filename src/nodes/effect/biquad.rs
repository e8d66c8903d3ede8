//! Second-order IIR filters

use dasp_graph::{Buffer, Input};

use super::sum_inputs;
use crate::node::{AudioNode, ProcessContext};
use crate::param::{AudioParam, ParamEvent};

/// Filter response of a [`BiquadFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    /// Constant 0 dB peak gain band-pass; `q` sets the bandwidth
    BandPass,
    Notch,
    AllPass,
    /// Bell boost/cut of `gain` dB around `frequency`
    Peaking,
    LowShelf,
    HighShelf,
}

/// Messages to control a [`BiquadFilter`]
#[derive(Clone, Copy, Debug)]
pub enum BiquadMessage {
    /// Automate the center/cutoff frequency in Hz
    Frequency(ParamEvent),
    /// Automate the quality factor
    Q(ParamEvent),
    /// Automate the gain in dB (peaking and shelving types only)
    Gain(ParamEvent),
    SetType(FilterType),
}

/// Normalized coefficients, `a0` folded in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    /// Audio EQ cookbook (R. Bristow-Johnson) formulas.
    fn design(kind: FilterType, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let f = frequency.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-4);
        let w0 = core::f32::consts::TAU * f / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 * 0.5, b1, b1 * 0.5, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::HighPass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 * 0.5, b1, -b1 * 0.5, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::AllPass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf | FilterType::HighShelf => {
                // Shelf slope S = 1
                let beta = 2.0 * a.sqrt() * (sin_w0 * 0.5 * core::f32::consts::SQRT_2);
                let (ap1, am1) = (a + 1.0, a - 1.0);
                if kind == FilterType::LowShelf {
                    (
                        a * (ap1 - am1 * cos_w0 + beta),
                        2.0 * a * (am1 - ap1 * cos_w0),
                        a * (ap1 - am1 * cos_w0 - beta),
                        ap1 + am1 * cos_w0 + beta,
                        -2.0 * (am1 + ap1 * cos_w0),
                        ap1 + am1 * cos_w0 - beta,
                    )
                } else {
                    (
                        a * (ap1 + am1 * cos_w0 + beta),
                        -2.0 * a * (am1 + ap1 * cos_w0),
                        a * (ap1 + am1 * cos_w0 - beta),
                        ap1 - am1 * cos_w0 + beta,
                        2.0 * (am1 - ap1 * cos_w0),
                        ap1 - am1 * cos_w0 - beta,
                    )
                }
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Direct form I state for one channel
#[derive(Clone, Copy, Debug, Default)]
struct State {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl State {
    #[inline]
    fn tick(&mut self, c: &Coefficients, x: f32) -> f32 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        // flush denormals in the feedback path
        self.y1 = if y.abs() < 1e-20 { 0.0 } else { y };
        y
    }
}

/// A biquad filter over the sum of its inputs.
///
/// Parameters are evaluated once per block (64 samples) and the coefficients
/// redesigned only when they change.
pub struct BiquadFilter {
    kind: FilterType,
    frequency: AudioParam,
    q: AudioParam,
    gain: AudioParam,
    channels: usize,

    coefficients: Coefficients,
    designed_for: Option<(FilterType, f32, f32, f32, u32)>,
    state: [State; 2],
}

impl BiquadFilter {
    /// A mono filter with Web Audio defaults (350 Hz, Q 1, 0 dB).
    pub fn new(kind: FilterType) -> Self {
        Self {
            kind,
            frequency: AudioParam::new(350.0, 0.0, 96_000.0),
            q: AudioParam::unbounded(1.0),
            gain: AudioParam::new(0.0, -40.0, 40.0),
            channels: 1,
            coefficients: Coefficients::default(),
            designed_for: None,
            state: [State::default(); 2],
        }
    }

    pub fn band_pass(frequency: f32, q: f32) -> Self {
        Self::new(FilterType::BandPass).with_frequency(frequency).with_q(q)
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = AudioParam::new(frequency, 0.0, 96_000.0);
        self
    }

    pub fn with_q(mut self, q: f32) -> Self {
        self.q = AudioParam::unbounded(q);
        self
    }

    pub fn with_gain_db(mut self, gain_db: f32) -> Self {
        self.gain = AudioParam::new(gain_db, -40.0, 40.0);
        self
    }

    /// Set the number of channels filtered (1 or 2)
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.clamp(1, 2);
        self
    }

    #[inline]
    pub fn filter_type(&self) -> FilterType {
        self.kind
    }

    /// Magnitude response at `frequency` Hz for the current coefficients.
    ///
    /// Call after the filter has processed at least one block.
    pub fn magnitude_at(&self, frequency: f32, sample_rate: u32) -> f32 {
        let c = &self.coefficients;
        let w = core::f32::consts::TAU * frequency / sample_rate as f32;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        // H(e^jw) = (b0 + b1 e^-jw + b2 e^-2jw) / (1 + a1 e^-jw + a2 e^-2jw)
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    fn update_coefficients(&mut self, ctx: &ProcessContext) {
        let now = ctx.time();
        let key = (
            self.kind,
            self.frequency.value_at(now),
            self.q.value_at(now),
            self.gain.value_at(now),
            ctx.sample_rate,
        );
        if self.designed_for != Some(key) {
            self.coefficients = Coefficients::design(key.0, key.1, key.2, key.3, key.4 as f32);
            self.designed_for = Some(key);
        }
    }
}

impl AudioNode for BiquadFilter {
    type Message = BiquadMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = BiquadMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let now = ctx.time();
        for msg in messages {
            match msg {
                BiquadMessage::Frequency(e) => self.frequency.schedule(e, now),
                BiquadMessage::Q(e) => self.q.schedule(e, now),
                BiquadMessage::Gain(e) => self.gain.schedule(e, now),
                BiquadMessage::SetType(kind) => self.kind = kind,
            }
        }

        self.update_coefficients(ctx);
        sum_inputs(inputs, outputs);

        let c = self.coefficients;
        for (buffer, state) in outputs.iter_mut().zip(self.state.iter_mut()) {
            for sample in buffer.iter_mut() {
                *sample = state.tick(&c, *sample);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { self.channels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Oscillator, Waveform};
    use crate::testing::{render, rms};
    use crate::AudioEngine;

    fn designed(kind: FilterType, frequency: f32, q: f32, gain_db: f32) -> BiquadFilter {
        let mut filter = BiquadFilter::new(kind).with_frequency(frequency).with_q(q).with_gain_db(gain_db);
        filter.update_coefficients(&ProcessContext::new(48_000));
        filter
    }

    #[test]
    fn band_pass_unity_at_center() {
        let f = designed(FilterType::BandPass, 900.0, 0.8, 0.0);
        assert!((f.magnitude_at(900.0, 48_000) - 1.0).abs() < 1e-3);
        assert!(f.magnitude_at(60.0, 48_000) < 0.1);
        assert!(f.magnitude_at(15_000.0, 48_000) < 0.1);
    }

    #[test]
    fn low_pass_passes_dc_and_cuts_highs() {
        let f = designed(FilterType::LowPass, 1_000.0, core::f32::consts::FRAC_1_SQRT_2, 0.0);
        assert!((f.magnitude_at(1.0, 48_000) - 1.0).abs() < 1e-3);
        assert!((f.magnitude_at(1_000.0, 48_000) - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-2);
        assert!(f.magnitude_at(10_000.0, 48_000) < 0.02);
    }

    #[test]
    fn peaking_boost_at_center() {
        let f = designed(FilterType::Peaking, 2_000.0, 1.0, 6.0);
        let expected = 10f32.powf(6.0 / 20.0);
        assert!((f.magnitude_at(2_000.0, 48_000) - expected).abs() < 1e-2);
    }

    #[test]
    fn all_pass_is_flat() {
        let f = designed(FilterType::AllPass, 500.0, 2.0, 0.0);
        for hz in [50.0, 500.0, 5_000.0] {
            assert!((f.magnitude_at(hz, 48_000) - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn band_pass_attenuates_rumble_in_graph() {
        let (mut engine, mut capture) = AudioEngine::offline(48_000, 1, 48_000);
        let osc = engine.add(Oscillator::new(Waveform::Sine, 40.0).started());
        let filter = engine.add(BiquadFilter::band_pass(900.0, 0.8));
        engine.connect(&osc, &filter);
        engine.output(&filter);
        engine.resume();

        let out = render(&mut engine, &mut capture, 375);
        // skip the first 100 ms of settling
        assert!(rms(&out[4_800..]) < 0.1);
    }
}
