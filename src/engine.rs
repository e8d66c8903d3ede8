//! High-level audio engine API

use core::marker::PhantomData;

use rtrb::{Consumer, RingBuffer};
use tracing::{debug, info, trace};

use crate::graph::AudioGraph;
use crate::listener::Listener;
use crate::node::{AudioNode, NodeId};
use crate::nodes::RtrbSink;

#[cfg(feature = "cpal_sink")]
use crate::device::CpalDevice;

/// A handle for sending messages to a node in the audio graph.
///
/// Handles are returned when you add a node to [`AudioEngine`] and provide two capabilities:
/// 1. **Connections** - Pass handles to [`AudioEngine::connect`] or [`AudioEngine::output`]
/// 2. **Messages** - Send parameter updates via [`Handle::send`]
///
/// # Example
///
/// ```
/// # use rauschen::{AudioEngine, ParamEvent, nodes::{Oscillator, OscillatorMessage, Waveform}};
/// let (mut engine, _capture) = AudioEngine::offline(48_000, 2, 4096);
/// let mut osc = engine.add(Oscillator::new(Waveform::Sine, 440.0));
///
/// // Glide to 880 Hz over the next half second
/// let t = engine.current_time();
/// osc.send(OscillatorMessage::Frequency(ParamEvent::linear_ramp(880.0, t + 0.5))).ok();
/// ```
///
/// # Message Delivery
///
/// Messages are buffered in a lock-free ring buffer and processed at the start
/// of each audio block. If the buffer is full, [`Handle::send`] returns `Err(msg)`
/// with the message that couldn't be sent.
pub struct Handle<M: Send + 'static> {
    pub(crate) node_id: NodeId,
    pub(crate) sender: rtrb::Producer<M>,
    pub(crate) _marker: PhantomData<M>,
}

impl<M: Send + 'static> Handle<M> {
    /// Send a message to the node.
    ///
    /// The message will be processed at the start of the next audio block.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the message was queued successfully
    /// - `Err(msg)` if the queue is full (message dropped)
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(m)| m)
    }

    pub fn id(&self) -> NodeId {
        self.node_id
    }
}

/// Lifecycle state of an [`AudioEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Not rendering; the timeline is frozen. Engines start here.
    Suspended,
    /// Rendering blocks and advancing the timeline.
    Running,
}

/// The audio engine - manages nodes, connections, the listener and the timeline.
///
/// # Creating an Instance
///
/// [`AudioEngine::default_output`] uses the system's default audio device
/// (feature `cpal_sink`). [`AudioEngine::offline`] renders into a ring buffer
/// you read yourself, which is how tests and non-realtime renders work.
///
/// Engines start [`Suspended`](EngineState::Suspended), mirroring hosts that
/// forbid audio before a user gesture. Call [`resume`](Self::resume) once
/// playback is allowed.
///
/// # Building the Graph
///
/// 1. Add nodes with [`add`](Self::add) - returns a [`Handle`] for connections and messages
/// 2. Connect nodes with [`connect`](Self::connect)
/// 3. Connect final node(s) to output with [`output`](Self::output)
///
/// ```
/// # use rauschen::{AudioEngine, nodes::{Oscillator, Waveform, Gain}};
/// let (mut engine, mut capture) = AudioEngine::offline(48_000, 2, 8192);
/// let osc = engine.add(Oscillator::new(Waveform::Sine, 220.0).started());
/// let gain = engine.add(Gain::new(0.5));
///
/// engine.connect(&osc, &gain);
/// engine.output(&gain);
/// engine.resume();
///
/// engine.process();
/// assert_eq!(capture.slots(), 64 * 2);
/// ```
///
/// # Processing Audio
///
/// Call [`process`](Self::process) repeatedly to generate audio, paced to
/// match real-time when a device sink is attached:
///
/// ```no_run
/// # #[cfg(feature = "cpal_sink")] {
/// # use rauschen::AudioEngine;
/// # let mut engine = AudioEngine::default_output().unwrap();
/// use std::time::{Duration, Instant};
///
/// engine.resume();
/// let start = Instant::now();
/// let rate = engine.sample_rate() as f64;
/// let mut blocks = 0u64;
///
/// loop {
///     // Stay a few blocks ahead to prevent underruns
///     let target = (start.elapsed().as_secs_f64() * rate / 64.0) as u64 + 4;
///
///     while blocks < target {
///         engine.process();
///         blocks += 1;
///     }
///
///     std::thread::sleep(Duration::from_micros(500));
/// }
/// # }
/// ```
pub struct AudioEngine {
    graph: AudioGraph,
    sample_rate: u32,
    channels: usize,

    /// The output sink node (e.g., CpalSink)
    sink_node: Option<NodeId>,

    /// Frames rendered so far; the engine timeline
    frames_processed: u64,

    state: EngineState,
    listener: Listener,
}

impl AudioEngine {
    /// Create an engine with an explicit sample rate and no output sink.
    ///
    /// Use [`with_output`](Self::with_output) to add one.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: AudioGraph::new(sample_rate),
            sample_rate,
            channels: 2,
            sink_node: None,
            frames_processed: 0,
            state: EngineState::Suspended,
            listener: Listener::default(),
        }
    }

    /// Create an engine with the system's default audio output device.
    ///
    /// Returns `None` if no audio device is available.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Option<Self> {
        CpalDevice::default_output().map(|device| device.open_engine())
    }

    /// Create an engine that renders into a ring buffer.
    ///
    /// The returned consumer receives interleaved `channels`-channel frames. It
    /// holds up to `capacity_frames` frames; blocks that don't fit are skipped,
    /// so drain it between calls to [`process`](Self::process).
    pub fn offline(sample_rate: u32, channels: usize, capacity_frames: usize) -> (Self, Consumer<f32>) {
        let channels = channels.max(1);
        let (producer, consumer) = RingBuffer::<f32>::new(capacity_frames * channels);
        let engine = Self::new(sample_rate)
            .with_channels(channels)
            .with_output(RtrbSink::new(producer, channels));
        (engine, consumer)
    }

    /// Set the number of output channels (builder pattern).
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Add an output sink (builder pattern).
    pub fn with_output<S: AudioNode<Message = ()>>(mut self, sink: S) -> Self {
        let handle = self.graph.add(sink);
        self.sink_node = Some(handle.id());
        self.graph.set_terminal(handle.id());
        self
    }

    /// Get the output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of nodes in the graph, the output sink included.
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Seconds of audio rendered so far.
    ///
    /// Schedule parameter events relative to this value.
    pub fn current_time(&self) -> f64 {
        self.frames_processed as f64 / self.sample_rate as f64
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Start (or restart) rendering.
    pub fn resume(&mut self) {
        if self.state != EngineState::Running {
            info!(time = self.current_time(), "audio engine resumed");
            self.state = EngineState::Running;
        }
    }

    /// Stop rendering and freeze the timeline.
    pub fn suspend(&mut self) {
        if self.state != EngineState::Suspended {
            info!(time = self.current_time(), "audio engine suspended");
            self.state = EngineState::Suspended;
        }
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Mutable access to the listener; changes apply from the next block.
    pub fn listener_mut(&mut self) -> &mut Listener {
        &mut self.listener
    }

    /// Add a node to the audio graph.
    ///
    /// Returns a [`Handle`] for connecting the node and sending messages to it.
    pub fn add<N: AudioNode>(&mut self, node: N) -> Handle<N::Message> {
        let handle = self.graph.add(node);
        debug!(node = handle.id().0, kind = core::any::type_name::<N>(), "added node");

        Handle {
            node_id: handle.id(),
            sender: handle.sender,
            _marker: PhantomData,
        }
    }

    /// Add a node whose message queue holds `queue_size` messages.
    ///
    /// Useful for nodes that receive bursts of automation between blocks.
    pub fn add_with_queue_size<N: AudioNode>(&mut self, node: N, queue_size: usize) -> Handle<N::Message> {
        let handle = self.graph.add_with_queue_size(node, queue_size);
        debug!(node = handle.id().0, kind = core::any::type_name::<N>(), queue_size, "added node");

        Handle {
            node_id: handle.id(),
            sender: handle.sender,
            _marker: PhantomData,
        }
    }

    /// Connect two nodes together.
    ///
    /// Audio flows from `from` to `to`. Several sources connected to one
    /// destination are summed by the destination.
    pub fn connect<M1, M2>(&mut self, from: &Handle<M1>, to: &Handle<M2>)
    where
        M1: Send + 'static,
        M2: Send + 'static,
    {
        debug!(from = from.node_id.0, to = to.node_id.0, "connected nodes");
        self.graph.connect(from.node_id, to.node_id);
    }

    /// Connect a node directly to the audio output.
    ///
    /// # Panics
    ///
    /// Panics if no output sink is configured.
    pub fn output<M: Send + 'static>(&mut self, handle: &Handle<M>) {
        let sink_id = self
            .sink_node
            .expect("No output sink configured. Use default_output(), offline() or with_output().");
        debug!(node = handle.node_id.0, "routed node to output");
        self.graph.connect(handle.node_id, sink_id);
    }

    /// Process one block of audio (64 frames).
    ///
    /// Does nothing while the engine is suspended.
    pub fn process(&mut self) {
        if self.state != EngineState::Running {
            trace!("engine suspended, skipping block");
            return;
        }

        self.graph.process_block(self.frames_processed, self.listener);
        self.frames_processed += dasp_graph::Buffer::LEN as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_frozen_while_suspended() {
        let (mut engine, capture) = AudioEngine::offline(48_000, 2, 1024);
        assert_eq!(engine.state(), EngineState::Suspended);

        engine.process();
        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(capture.slots(), 0);

        engine.resume();
        engine.process();
        assert_eq!(engine.current_time(), 64.0 / 48_000.0);
        assert_eq!(capture.slots(), 128);
    }

    #[test]
    fn offline_engine_owns_its_sink() {
        let (engine, _capture) = AudioEngine::offline(44_100, 1, 256);
        assert_eq!(engine.node_count(), 1);
        assert_eq!(engine.channels(), 1);
    }

    #[test]
    fn full_queue_hands_message_back() {
        use crate::nodes::{Gain, GainMessage};
        use crate::ParamEvent;

        let mut engine = AudioEngine::new(48_000);
        let mut gain = engine.add_with_queue_size(Gain::new(1.0), 2);
        assert!(gain.send(GainMessage::Gain(ParamEvent::SetValue(0.5))).is_ok());
        assert!(gain.send(GainMessage::Gain(ParamEvent::SetValue(0.75))).is_ok());
        match gain.send(GainMessage::Gain(ParamEvent::SetValue(0.25))) {
            Err(GainMessage::Gain(ParamEvent::SetValue(v))) => assert_eq!(v, 0.25),
            other => panic!("expected the message back, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "No output sink configured")]
    fn output_without_sink_panics() {
        let mut engine = AudioEngine::new(48_000);
        let gain = engine.add(crate::nodes::Gain::new(1.0));
        engine.output(&gain);
    }
}
