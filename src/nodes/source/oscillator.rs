//! Periodic oscillator

use dasp_graph::{Buffer, Input};

use super::Schedule;
use crate::node::{AudioNode, ProcessContext};
use crate::param::{AudioParam, ParamEvent};

/// Oscillator waveform shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample the waveform at `phase` in `[0, 1)`.
    #[inline]
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * core::f32::consts::TAU).sin(),
            Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Messages to control an [`Oscillator`]
#[derive(Clone, Copy, Debug)]
pub enum OscillatorMessage {
    /// Automate the frequency in Hz
    Frequency(ParamEvent),
    /// Automate the detune in cents
    Detune(ParamEvent),
    SetWaveform(Waveform),
    /// Start sounding at the given engine time
    Start(f64),
    /// Stop sounding at the given engine time
    Stop(f64),
}

/// A periodic oscillator (mono source).
///
/// Output is full-scale; put a [`Gain`](crate::nodes::Gain) after it to set the level.
/// The instantaneous frequency is `frequency * 2^(detune / 1200)`, evaluated per sample.
pub struct Oscillator {
    waveform: Waveform,
    frequency: AudioParam,
    detune: AudioParam,
    phase: f32,
    schedule: Schedule,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency: AudioParam::new(frequency, 0.0, 96_000.0),
            detune: AudioParam::new(0.0, -153_600.0, 153_600.0),
            phase: 0.0,
            schedule: Schedule::default(),
        }
    }

    /// Start at engine time zero (builder pattern).
    pub fn started(mut self) -> Self {
        self.schedule.start(0.0);
        self
    }

    #[inline]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency.value()
    }
}

impl AudioNode for Oscillator {
    type Message = OscillatorMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = OscillatorMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let now = ctx.time();
        for msg in messages {
            match msg {
                OscillatorMessage::Frequency(e) => self.frequency.schedule(e, now),
                OscillatorMessage::Detune(e) => self.detune.schedule(e, now),
                OscillatorMessage::SetWaveform(w) => self.waveform = w,
                OscillatorMessage::Start(t) => self.schedule.start(t),
                OscillatorMessage::Stop(t) => self.schedule.stop(t),
            }
        }

        if outputs.is_empty() {
            return;
        }

        let mut freq = [0.0f32; Buffer::LEN];
        let mut detune = [0.0f32; Buffer::LEN];
        self.frequency.fill(ctx, &mut freq);
        self.detune.fill(ctx, &mut detune);

        let sr = ctx.sample_rate as f32;
        let waveform = self.waveform;
        let (first, rest) = match outputs.split_first_mut() {
            Some(split) => split,
            None => return,
        };

        for (i, out) in first.iter_mut().enumerate() {
            if !self.schedule.is_active(ctx.sample_time(i)) {
                *out = 0.0;
                continue;
            }

            *out = waveform.sample(self.phase);

            let hz = if detune[i] == 0.0 { freq[i] } else { freq[i] * (detune[i] / 1200.0).exp2() };
            self.phase += hz / sr;
            self.phase -= self.phase.floor();
        }

        // Copy to remaining output channels (if any)
        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 0 }

    #[inline]
    fn num_outputs(&self) -> usize { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(osc: &mut Oscillator, ctx: &ProcessContext, msgs: Vec<OscillatorMessage>) -> Buffer {
        let mut out = [Buffer::SILENT];
        osc.process(ctx, msgs.into_iter(), &[], &mut out);
        out[0].clone()
    }

    #[test]
    fn silent_until_started() {
        let mut osc = Oscillator::new(Waveform::Square, 100.0);
        let ctx = ProcessContext::new(48_000);
        let out = render(&mut osc, &ctx, vec![]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn sine_quarter_period_peaks() {
        // 750 Hz at 48 kHz: 64 samples per period, peak at sample 16
        let mut osc = Oscillator::new(Waveform::Sine, 750.0).started();
        let ctx = ProcessContext::new(48_000);
        let out = render(&mut osc, &ctx, vec![]);
        assert!(out[0].abs() < 1e-6);
        assert!((out[16] - 1.0).abs() < 1e-4);
        assert!((out[48] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn start_message_takes_effect_mid_block() {
        let mut osc = Oscillator::new(Waveform::Square, 10.0);
        let ctx = ProcessContext::new(64);
        // sample 32 of the first block is at t = 0.5
        let out = render(&mut osc, &ctx, vec![OscillatorMessage::Start(0.5)]);
        assert_eq!(out[31], 0.0);
        assert_eq!(out[32], 1.0);
    }

    #[test]
    fn detune_of_one_octave_doubles_frequency() {
        let mut plain = Oscillator::new(Waveform::Sawtooth, 375.0).started();
        let mut detuned = Oscillator::new(Waveform::Sawtooth, 187.5).started();
        let ctx = ProcessContext::new(48_000);
        let a = render(&mut plain, &ctx, vec![]);
        let b = render(&mut detuned, &ctx, vec![OscillatorMessage::Detune(ParamEvent::SetValue(1200.0))]);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-3);
        }
    }
}
