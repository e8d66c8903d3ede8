//! Built-in audio nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Generate audio with no audio inputs:
//! - [`Oscillator`] - Periodic waveform with automatable frequency and detune
//! - [`BufferSource`] - Play (and optionally loop) an in-memory [`AudioBuffer`]
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs → outputs). Every effect sums all of its inputs first.
//! - [`Gain`] - Automatable volume
//! - [`BiquadFilter`] - Second-order filters (low/high/band-pass, notch, shelves...)
//! - [`Panner`] - Position a mono source in 3D space relative to the listener
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no audio outputs:
//! - [`CpalSink`] - Output to system audio device (requires `cpal_sink` feature)
//! - [`RtrbSink`] - Write to ring buffer (offline rendering and capture)
//!
//! # Message Types
//!
//! Automatable parameters take [`ParamEvent`](crate::ParamEvent)s wrapped in
//! the node's message enum:
//! - [`OscillatorMessage`] - frequency, detune, waveform, start/stop
//! - [`BufferSourceMessage`] - looping, start/stop
//! - [`GainMessage`] - gain
//! - [`BiquadMessage`] - frequency, Q, gain, filter type
//! - [`PannerMessage`] - position, distance and panning model
//!
//! Sinks use `()` as their message type.

pub mod source;
pub mod effect;
pub mod sink;

// Re-export common types at the top level for convenience
pub use source::{
    white_noise, AudioBuffer, BufferSource, BufferSourceMessage, Oscillator, OscillatorMessage, Waveform,
};
pub use effect::{
    sum_inputs, BiquadFilter, BiquadMessage, DistanceModel, FilterType, Gain, GainMessage, Panner,
    PannerMessage, PanningModel,
};
pub use sink::RtrbSink;

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
