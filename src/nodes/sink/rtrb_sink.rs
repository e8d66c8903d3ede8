//! Ring buffer sink for offline rendering and custom audio pipelines

use dasp_graph::{Buffer, Input};
use rtrb::Producer;
use tracing::trace;

use crate::node::{AudioNode, ProcessContext};
use crate::nodes::sum_inputs;

/// A sink that pushes interleaved audio into an rtrb ring buffer
///
/// Useful for:
/// - Offline rendering and tests
/// - Sending audio to another thread
/// - Recording/analysis
///
/// Every input is summed. A block with nothing connected is written as
/// silence so the consumer always sees a continuous timeline.
pub struct RtrbSink {
    producer: Producer<f32>,
    channels: usize,
}

impl RtrbSink {
    /// Create a sink that writes interleaved samples to the given producer
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.clamp(1, 2),
        }
    }

    /// Returns how many sample slots are available
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }
}

impl AudioNode for RtrbSink {
    type Message = (); // No control messages

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        let mut mixed = [Buffer::SILENT, Buffer::SILENT];
        let mixed = &mut mixed[..self.channels];
        sum_inputs(inputs, mixed);

        let samples_needed = Buffer::LEN * self.channels;

        // Skip if buffer is full
        let free = self.available();
        if free < samples_needed {
            trace!(needed = samples_needed, free, "ring buffer full, dropping block");
            return;
        }

        // Interleave channels
        for i in 0..Buffer::LEN {
            for buffer in mixed.iter() {
                let _ = self.producer.push(buffer[i]);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}
