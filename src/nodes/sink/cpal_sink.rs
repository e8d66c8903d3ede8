//! CPAL audio output sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, SupportedStreamConfig};
use dasp_graph::{Buffer, Input};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, trace, warn};

use crate::node::{AudioNode, ProcessContext};
use crate::nodes::sum_inputs;

/// A sink that outputs audio to a CPAL device
///
/// The CPAL stream runs on its own thread; this node feeds samples
/// into a ring buffer that the stream consumes. Inputs are mixed to stereo
/// and spread over however many channels the device has.
pub struct CpalSink {
    buffer: Producer<f32>,
    channels: usize,
    /// Set by the device callback when it ran out of samples
    had_underrun: Arc<AtomicBool>,
}

impl CpalSink {
    /// Create a new sink for the given device and config
    pub fn new(device: &cpal::Device, config: &SupportedStreamConfig) -> Self {
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0;

        // Ring buffer sized for ~100ms of audio to handle scheduling jitter
        let buffer_samples = ((sample_rate as f32 * 0.1) as usize) * channels;
        let buffer_size = buffer_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_size);

        let had_underrun = Arc::new(AtomicBool::new(false));

        let device = device.clone();
        let stream_state = StreamState {
            consumer,
            had_underrun: had_underrun.clone(),
        };
        std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_format, &stream_config, stream_state) {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, ?sample_format, "failed to build output stream");
                    return;
                }
            };

            if let Err(err) = stream.play() {
                error!(%err, "failed to start audio stream");
                return;
            }
            debug!(sample_rate, channels, "output stream playing");

            // Keep thread alive - stream lives as long as this thread
            loop {
                std::thread::park();
            }
        });

        Self {
            buffer: producer,
            channels,
            had_underrun,
        }
    }

    /// Check and clear the underrun flag
    fn check_underrun(&self) -> bool {
        self.had_underrun.swap(false, Ordering::Relaxed)
    }
}

/// Everything the device callback owns.
struct StreamState {
    consumer: Consumer<f32>,
    had_underrun: Arc<AtomicBool>,
}

impl StreamState {
    fn fill<T>(&mut self, data: &mut [T], convert: impl Fn(f32) -> T) {
        let mut underrun = false;
        for sample in data.iter_mut() {
            let s = self.consumer.pop().unwrap_or_else(|_| {
                underrun = true;
                0.0
            });
            *sample = convert(s);
        }
        if underrun {
            self.had_underrun.store(true, Ordering::Relaxed);
        }
    }
}

fn build_typed<T: SizedSample>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut state: StreamState,
    convert: fn(f32) -> T,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _| state.fill(data, convert),
        |err| error!(%err, "output stream error"),
        None,
    )
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    state: StreamState,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    match sample_format {
        SampleFormat::F32 => build_typed::<f32>(device, stream_config, state, |s| s),
        SampleFormat::I16 => build_typed::<i16>(device, stream_config, state, |s| {
            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        }),
        SampleFormat::U16 => build_typed::<u16>(device, stream_config, state, |s| {
            ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
        }),
        _ => {
            warn!(?sample_format, "unsupported sample format");
            Err(cpal::BuildStreamError::StreamConfigNotSupported)
        }
    }
}

impl AudioNode for CpalSink {
    type Message = (); // No control messages

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        let mut mixed = [Buffer::SILENT, Buffer::SILENT];
        let width = self.channels.clamp(1, 2);
        sum_inputs(inputs, &mut mixed[..width]);

        if self.check_underrun() {
            warn!("output device ran out of samples");
        }

        let samples_needed = Buffer::LEN * self.channels;

        // Check for overrun (generating faster than consuming)
        if self.buffer.slots() < samples_needed {
            // Skip this block rather than partially write
            trace!(needed = samples_needed, "device buffer full, dropping block");
            return;
        }

        // Interleave channels into ring buffer
        for i in 0..Buffer::LEN {
            for ch in 0..self.channels {
                let src_ch = ch.min(width - 1);
                let _ = self.buffer.push(mixed[src_ch][i]);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}
