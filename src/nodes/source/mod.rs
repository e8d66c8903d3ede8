//! Audio source nodes (no audio inputs)

mod buffer_source;
mod noise;
mod oscillator;

pub use buffer_source::{AudioBuffer, BufferSource, BufferSourceMessage};
pub use noise::white_noise;
pub use oscillator::{Oscillator, OscillatorMessage, Waveform};

/// Start/stop times of a scheduled source, in engine seconds.
///
/// Sources are silent until started, like their Web Audio counterparts.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Schedule {
    start: Option<f64>,
    stop: Option<f64>,
}

impl Schedule {
    pub(crate) fn start(&mut self, time: f64) {
        self.start = Some(time);
    }

    pub(crate) fn stop(&mut self, time: f64) {
        self.stop = Some(time);
    }

    /// Whether the source sounds at `time`.
    #[inline]
    pub(crate) fn is_active(&self, time: f64) -> bool {
        match self.start {
            Some(start) => time >= start && self.stop.map_or(true, |stop| time < stop),
            None => false,
        }
    }

    /// Whether the source has stopped for good at `time`.
    #[inline]
    pub(crate) fn is_finished(&self, time: f64) -> bool {
        self.stop.map_or(false, |stop| time >= stop)
    }
}
