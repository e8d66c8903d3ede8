//! Rauschen - reactive procedural ambience on a lock-free audio graph
//!
//! The crate has two layers:
//!
//! - an audio graph ([`AudioEngine`]) built on `dasp_graph`, where nodes receive
//!   parameter automation ([`ParamEvent`]) through lock-free message queues and
//!   spatial nodes place themselves against a shared [`Listener`]
//! - an [`Ambience`] controller on top of it: a sine rumble and a band-passed
//!   noise hiss whose level, pitch and position follow two scalars, `threat`
//!   and `focus`
//!
//! # Quick start
//!
//! ```no_run
//! # #[cfg(feature = "cpal_sink")] {
//! use rauschen::{AmbienceConfig, AmbienceGate, AudioEngine, Gesture};
//!
//! let mut engine = AudioEngine::default_output().expect("no audio device");
//! let mut gate = AmbienceGate::with_system_clock(AmbienceConfig::default());
//!
//! // first click or key press starts the sound
//! gate.on_gesture(Gesture::PointerDown, &mut engine);
//!
//! loop {
//!     gate.update(&engine, 0.4, 0.7);
//!     engine.process();
//! #   break;
//! }
//! # }
//! ```
//!
//! # Features
//!
//! - `cpal_sink` - output to the system audio device through `cpal`

extern crate alloc;

mod ambience;
mod device;
mod engine;
mod graph;
mod listener;
mod node;
mod param;
pub mod nodes;

pub use ambience::{
    Ambience, AmbienceConfig, AmbienceFrame, AmbienceGate, AmbienceTargets, Clock, Gesture, ManualClock,
    OrbitPositions, SystemClock,
};
pub use device::CpalDevice;
pub use engine::{AudioEngine, EngineState, Handle};
pub use listener::Listener;
pub use node::{AudioNode, NodeId, ProcessContext};
pub use param::{AudioParam, ParamEvent};

#[cfg(test)]
pub(crate) mod testing {
    use alloc::vec;
    use alloc::vec::Vec;

    use rtrb::Consumer;

    use crate::nodes::{AudioBuffer, BufferSource};
    use crate::AudioEngine;

    /// A started, looping mono source holding `value`.
    pub fn dc(value: f32, sample_rate: u32) -> BufferSource {
        BufferSource::new(AudioBuffer::mono(vec![value; 64], sample_rate))
            .looping(true)
            .started()
    }

    /// Process `blocks` blocks, draining the capture after each one.
    pub fn render(engine: &mut AudioEngine, capture: &mut Consumer<f32>, blocks: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for _ in 0..blocks {
            engine.process();
            while let Ok(sample) = capture.pop() {
                out.push(sample);
            }
        }
        out
    }

    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }
}
