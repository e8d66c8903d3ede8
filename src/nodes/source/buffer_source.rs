//! In-memory audio buffers and their player.

use alloc::vec::Vec;
use dasp_graph::{Buffer, Input};

use super::Schedule;
use crate::node::{AudioNode, ProcessContext};

/// Planar f32 audio held in memory.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Channels are truncated to the shortest one so every channel has the same length.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        channels.iter_mut().for_each(|c| c.truncate(len));
        Self { channels, sample_rate }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::from_channels(alloc::vec![samples], sample_rate)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, ch: usize) -> Option<&[f32]> {
        self.channels.get(ch).map(Vec::as_slice)
    }
}

/// Messages to control a [`BufferSource`].
#[derive(Clone, Copy, Debug)]
pub enum BufferSourceMessage {
    /// Start playback from the beginning at the given engine time
    Start(f64),
    /// Stop playback at the given engine time
    Stop(f64),
    /// Enable or disable looping
    SetLooping(bool),
}

/// Plays an [`AudioBuffer`] one frame per output sample.
///
/// The buffer is read at the graph rate; build it at the engine's sample rate.
/// Without looping the source falls silent at the end of the buffer.
pub struct BufferSource {
    buffer: AudioBuffer,
    position: usize,
    looping: bool,
    schedule: Schedule,
}

impl BufferSource {
    pub fn new(buffer: AudioBuffer) -> Self {
        Self {
            buffer,
            position: 0,
            looping: false,
            schedule: Schedule::default(),
        }
    }

    /// Enable or disable looping (builder pattern).
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Start at engine time zero (builder pattern).
    pub fn started(mut self) -> Self {
        self.schedule.start(0.0);
        self
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Current read position in seconds.
    #[inline]
    pub fn position_secs(&self) -> f64 {
        self.position as f64 / self.buffer.sample_rate() as f64
    }
}

impl AudioNode for BufferSource {
    type Message = BufferSourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = BufferSourceMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            match msg {
                BufferSourceMessage::Start(t) => {
                    self.schedule.start(t);
                    self.position = 0;
                }
                BufferSourceMessage::Stop(t) => self.schedule.stop(t),
                BufferSourceMessage::SetLooping(l) => self.looping = l,
            }
        }

        if outputs.is_empty() {
            return;
        }

        let total = self.buffer.len();
        let src_channels = self.buffer.num_channels();
        if total == 0 || src_channels == 0 || self.schedule.is_finished(ctx.time()) {
            for buffer in outputs.iter_mut() {
                buffer.iter_mut().for_each(|s| *s = 0.0);
            }
            return;
        }

        for i in 0..outputs[0].len() {
            let sounding = self.schedule.is_active(ctx.sample_time(i));

            if sounding && self.position >= total && self.looping {
                self.position = 0;
            }

            let audible = sounding && self.position < total;
            for (ch, buffer) in outputs.iter_mut().enumerate() {
                // Map output channel to source channel (wrap if more outputs than source)
                let src = &self.buffer.channels[ch % src_channels];
                buffer[i] = if audible { src[self.position] } else { 0.0 };
            }

            if audible {
                self.position += 1;
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 0 }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.buffer.num_channels().clamp(1, 2)
    }
}
