//! Gain/volume control effect

use dasp_graph::{Buffer, Input};

use super::sum_inputs;
use crate::node::{AudioNode, ProcessContext};
use crate::param::{AudioParam, ParamEvent};

/// Messages to control gain
#[derive(Clone, Copy, Debug)]
pub enum GainMessage {
    /// Automate the gain multiplier (1.0 = unity, 0.0 = silence)
    Gain(ParamEvent),
}

/// Scales the sum of its inputs by an automatable gain.
///
/// The gain is evaluated per sample, so ramps scheduled with
/// [`ParamEvent::LinearRampToValueAtTime`] come out click-free without any
/// extra smoothing.
pub struct Gain {
    gain: AudioParam,
    channels: usize,
}

impl Gain {
    /// Create a stereo gain node with the specified initial gain
    pub fn new(gain: f32) -> Self {
        Self {
            gain: AudioParam::unbounded(gain),
            channels: 2,
        }
    }

    /// Set the number of channels passed through (1 or 2)
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.clamp(1, 2);
        self
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain.value()
    }
}

impl AudioNode for Gain {
    type Message = GainMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = GainMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let now = ctx.time();
        for msg in messages {
            match msg {
                GainMessage::Gain(e) => self.gain.schedule(e, now),
            }
        }

        let mut gain = [0.0f32; Buffer::LEN];
        self.gain.fill(ctx, &mut gain);

        if !sum_inputs(inputs, outputs) {
            return;
        }

        for buffer in outputs.iter_mut() {
            for (sample, g) in buffer.iter_mut().zip(gain.iter()) {
                *sample *= g;
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
    use crate::testing::{dc, render};
    use crate::AudioEngine;

    #[test]
    fn ramps_across_block() {
        let (mut engine, mut capture) = AudioEngine::offline(64, 1, 256);
        let source = engine.add(dc(1.0, 64));
        let mut gain = engine.add(Gain::new(0.0).with_channels(1));
        engine.connect(&source, &gain);
        engine.output(&gain);
        engine.resume();

        gain.send(GainMessage::Gain(ParamEvent::linear_ramp(1.0, 1.0))).unwrap();
        let out = render(&mut engine, &mut capture, 2);

        assert_eq!(out[0], 0.0);
        assert!((out[32] - 0.5).abs() < 1e-6);
        assert!(out[64..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn sums_every_input() {
        let (mut engine, mut capture) = AudioEngine::offline(48_000, 1, 256);
        let a = engine.add(dc(0.25, 48_000));
        let b = engine.add(dc(0.5, 48_000));
        let gain = engine.add(Gain::new(2.0).with_channels(1));
        engine.connect(&a, &gain);
        engine.connect(&b, &gain);
        engine.output(&gain);
        engine.resume();

        let out = render(&mut engine, &mut capture, 1);
        assert!(out.iter().all(|&s| (s - 1.5).abs() < 1e-6));
    }
}
