//! Core node trait and context types.

use dasp_graph::{Buffer, Input};

use crate::listener::Listener;

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call. Besides the graph's sample rate
/// and buffer size it carries the engine timeline position of the block and a
/// snapshot of the [`Listener`], so spatial nodes can place themselves relative
/// to it without shared state.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per buffer (always 64, the `dasp_graph` block size)
    pub buffer_size: usize,
    /// Index of the first frame of this block on the engine timeline
    pub frame: u64,
    /// Listener pose for this block
    pub listener: Listener,
}

impl ProcessContext {
    /// Create a context positioned at frame zero with the default listener.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer_size: Buffer::LEN,
            frame: 0,
            listener: Listener::default(),
        }
    }

    /// Engine time of the first sample of this block, in seconds.
    #[inline]
    pub fn time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Engine time of sample `i` within this block, in seconds.
    #[inline]
    pub fn sample_time(&self, i: usize) -> f64 {
        (self.frame + i as u64) as f64 / self.sample_rate as f64
    }

    /// Duration of one sample, in seconds.
    #[inline]
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

/// Unique identifier for a node within a graph.
///
/// You typically don't interact with this directly - use [`Handle`](crate::Handle) instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// The core trait for audio processing nodes.
///
/// Nodes can be:
/// - **Sources**: Generate audio (0 inputs, 1+ outputs) - oscillators, buffer players
/// - **Effects**: Process audio (1+ inputs, 1+ outputs) - gain, filters, panners
/// - **Sinks**: Consume audio (1+ inputs, 0 outputs) - device outputs, capture buffers
///
/// # Message-Based Parameters
///
/// Instead of shared mutable state, nodes receive parameter updates via messages,
/// drained at the start of every block:
///
/// ```
/// use rauschen::{AudioNode, ProcessContext};
/// use dasp_graph::{Buffer, Input};
///
/// enum DcMessage {
///     SetLevel(f32),
/// }
///
/// struct Dc {
///     level: f32,
/// }
///
/// impl AudioNode for Dc {
///     type Message = DcMessage;
///
///     fn process(
///         &mut self,
///         _ctx: &ProcessContext,
///         messages: impl Iterator<Item = DcMessage>,
///         _inputs: &[Input],
///         outputs: &mut [Buffer],
///     ) {
///         for msg in messages {
///             match msg {
///                 DcMessage::SetLevel(l) => self.level = l,
///             }
///         }
///
///         for sample in outputs[0].iter_mut() {
///             *sample = self.level;
///         }
///     }
/// }
/// ```
///
/// Nodes with automatable parameters hold an [`AudioParam`](crate::AudioParam)
/// per parameter and forward [`ParamEvent`](crate::ParamEvent)s to it.
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates.
    ///
    /// Use a custom enum for nodes with parameters, or `()` for nodes without.
    type Message: Send + 'static;

    /// Process one block of audio.
    ///
    /// Called once per audio block (64 samples). Your implementation should:
    /// 1. Drain and handle all pending messages
    /// 2. Read from `inputs` (if any)
    /// 3. Write to `outputs`
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    );

    /// Number of audio input channels (0 for sources).
    fn num_inputs(&self) -> usize { 0 }

    /// Number of audio output channels.
    fn num_outputs(&self) -> usize { 1 }
}
