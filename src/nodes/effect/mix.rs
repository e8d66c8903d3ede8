//! Summing junction shared by every effect.

use dasp_graph::{Buffer, Input};

/// Sum all `inputs` into `outputs`, overwriting what was there.
///
/// Channel mapping follows speaker mixing rules:
/// - mono input → copied to every output channel
/// - stereo (or wider) input into a mono output → averaged `(L + R) / 2`
/// - otherwise channel `n` feeds channel `n`; extra input channels are ignored
///
/// Returns `false` when no input carried any buffers, in which case the
/// outputs hold silence.
pub fn sum_inputs(inputs: &[Input], outputs: &mut [Buffer]) -> bool {
    for buf in outputs.iter_mut() {
        buf.iter_mut().for_each(|s| *s = 0.0);
    }

    let out_channels = outputs.len();
    let mut any = false;

    for input in inputs {
        let buffers = input.buffers();
        if buffers.is_empty() {
            continue;
        }
        any = true;

        if out_channels == 1 && buffers.len() >= 2 {
            let (l, r) = (&buffers[0], &buffers[1]);
            for ((out, a), b) in outputs[0].iter_mut().zip(l.iter()).zip(r.iter()) {
                *out += 0.5 * (a + b);
            }
            continue;
        }

        for (out_ch, out_buf) in outputs.iter_mut().enumerate() {
            let in_ch = if buffers.len() == 1 { 0 } else { out_ch };
            let in_buf = match buffers.get(in_ch) {
                Some(buf) => buf,
                None => continue,
            };
            for (out_sample, in_sample) in out_buf.iter_mut().zip(in_buf.iter()) {
                *out_sample += *in_sample;
            }
        }
    }

    any
}
