use alloc::vec::Vec;
use rand::Rng;

use super::AudioBuffer;

/// Fill a mono buffer with uniform white noise in `[-amplitude, amplitude]`.
///
/// Meant to be played by a looping [`BufferSource`](super::BufferSource); a
/// couple of seconds is long enough that the loop point isn't audible.
pub fn white_noise<R: Rng + ?Sized>(sample_rate: u32, seconds: f32, amplitude: f32, rng: &mut R) -> AudioBuffer {
    let frames = (sample_rate as f32 * seconds.max(0.0)) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|_| rng.gen_range(-1.0f32..1.0) * amplitude)
        .collect();
    AudioBuffer::mono(samples, sample_rate)
}
