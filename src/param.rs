//! Automatable parameters.
//!
//! An [`AudioParam`] holds a timeline of scheduled [`ParamEvent`]s and evaluates
//! it per sample. Nodes own their params and feed them the events that arrive in
//! their message queue, so scheduling happens on the audio thread without locks:
//!
//! ```
//! use rauschen::{AudioParam, ParamEvent};
//!
//! let mut gain = AudioParam::new(0.0, 0.0, 1.0);
//! gain.schedule(ParamEvent::LinearRampToValueAtTime { value: 1.0, time: 1.0 }, 0.0);
//!
//! assert_eq!(gain.value_at(0.5), 0.5);
//! assert_eq!(gain.value_at(2.0), 1.0);
//! ```

use alloc::collections::VecDeque;

use crate::node::ProcessContext;

/// Upper bound on pending events per parameter.
const MAX_PENDING_EVENTS: usize = 128;

/// A change scheduled on an [`AudioParam`] timeline. Times are engine seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` when the node receives the message.
    SetValue(f32),
    /// Jump to `value` at `time`.
    SetValueAtTime { value: f32, time: f64 },
    /// Ramp linearly from the previous event and reach `value` at `time`.
    LinearRampToValueAtTime { value: f32, time: f64 },
    /// Ramp exponentially from the previous event and reach `value` at `time`.
    ExponentialRampToValueAtTime { value: f32, time: f64 },
    /// Drop every event scheduled at or after the given time.
    CancelScheduledValues(f64),
}

impl ParamEvent {
    pub fn set_at(value: f32, time: f64) -> Self {
        ParamEvent::SetValueAtTime { value, time }
    }

    pub fn linear_ramp(value: f32, time: f64) -> Self {
        ParamEvent::LinearRampToValueAtTime { value, time }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Curve {
    Step,
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    time: f64,
    value: f32,
    curve: Curve,
}

/// A parameter value that follows a timeline of scheduled events.
///
/// The param keeps an *anchor*: the time and value of the most recent event
/// that has already been reached. Pending events are kept sorted by time, and
/// the first pending event decides how the value moves away from the anchor.
#[derive(Clone, Debug)]
pub struct AudioParam {
    anchor_value: f32,
    anchor_time: f64,
    min: f32,
    max: f32,
    events: VecDeque<Scheduled>,
}

impl AudioParam {
    /// A param starting at `value`, clamped to `[min, max]` on output.
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            anchor_value: value,
            anchor_time: 0.0,
            min,
            max,
            events: VecDeque::with_capacity(16),
        }
    }

    /// A param with no meaningful bounds.
    pub fn unbounded(value: f32) -> Self {
        Self::new(value, f32::MIN, f32::MAX)
    }

    /// Value at the last evaluated time.
    #[inline]
    pub fn value(&self) -> f32 {
        self.anchor_value.clamp(self.min, self.max)
    }

    /// Number of events not yet reached.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Add an event to the timeline. `now` is the engine time at which the
    /// event arrives; it anchors ramps that have no earlier pending event.
    pub fn schedule(&mut self, event: ParamEvent, now: f64) {
        let scheduled = match event {
            ParamEvent::SetValue(value) => Scheduled { time: now, value, curve: Curve::Step },
            ParamEvent::SetValueAtTime { value, time } => Scheduled { time, value, curve: Curve::Step },
            ParamEvent::LinearRampToValueAtTime { value, time } => Scheduled { time, value, curve: Curve::Linear },
            ParamEvent::ExponentialRampToValueAtTime { value, time } => {
                Scheduled { time, value, curve: Curve::Exponential }
            }
            ParamEvent::CancelScheduledValues(time) => {
                self.events.retain(|e| e.time < time);
                return;
            }
        };

        if !scheduled.time.is_finite() || !scheduled.value.is_finite() {
            tracing::warn!(?event, "dropping non-finite automation event");
            return;
        }

        // Bring the anchor up to date so a fresh ramp starts where the value is now.
        self.advance(now);

        if let Some(existing) = self
            .events
            .iter_mut()
            .find(|e| e.time == scheduled.time && e.curve == scheduled.curve)
        {
            existing.value = scheduled.value;
            return;
        }

        let idx = self.events.partition_point(|e| e.time <= scheduled.time);
        if idx == 0 && scheduled.curve != Curve::Step && scheduled.time > now {
            self.anchor_value = self.value_at(now);
            self.anchor_time = now;
        }
        self.events.insert(idx, scheduled);

        if self.events.len() > MAX_PENDING_EVENTS {
            tracing::warn!(pending = self.events.len(), "automation queue overflow, collapsing oldest event");
            if let Some(oldest) = self.events.pop_front() {
                self.anchor_value = oldest.value;
                self.anchor_time = oldest.time;
            }
        }
    }

    /// Consume every event whose time has been reached.
    fn advance(&mut self, time: f64) {
        while let Some(front) = self.events.front() {
            if front.time > time {
                break;
            }
            self.anchor_value = front.value;
            self.anchor_time = front.time;
            self.events.pop_front();
        }
    }

    /// Evaluate the timeline at `time`. Times must not go backwards between calls.
    pub fn value_at(&mut self, time: f64) -> f32 {
        self.advance(time);

        let v = match self.events.front() {
            None => self.anchor_value,
            Some(next) => match next.curve {
                Curve::Step => self.anchor_value,
                Curve::Linear => {
                    let span = next.time - self.anchor_time;
                    if span <= 0.0 {
                        next.value
                    } else {
                        let t = ((time - self.anchor_time) / span) as f32;
                        self.anchor_value + (next.value - self.anchor_value) * t
                    }
                }
                Curve::Exponential => {
                    let (v0, v1) = (self.anchor_value, next.value);
                    let span = next.time - self.anchor_time;
                    if v0 * v1 <= 0.0 || span <= 0.0 {
                        v0
                    } else {
                        let t = ((time - self.anchor_time) / span) as f32;
                        v0 * (v1 / v0).powf(t)
                    }
                }
            },
        };

        v.clamp(self.min, self.max)
    }

    /// Fill `out` with one value per sample, starting at the block time of `ctx`.
    pub fn fill(&mut self, ctx: &ProcessContext, out: &mut [f32]) {
        if self.events.is_empty() {
            let v = self.value();
            out.iter_mut().for_each(|s| *s = v);
            return;
        }

        for (i, s) in out.iter_mut().enumerate() {
            *s = self.value_at(ctx.sample_time(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn set_value_at_time_holds_until_reached() {
        let mut p = AudioParam::new(0.0, 0.0, 10.0);
        p.schedule(ParamEvent::set_at(3.0, 1.0), 0.0);

        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 3.0);
        assert_eq!(p.value_at(4.0), 3.0);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn first_ramp_starts_when_scheduled() {
        let mut p = AudioParam::new(0.0, 0.0, 1.0);
        // Anchor is at t = 0, but the ramp should start at t = 10, not stretch from 0.
        p.schedule(ParamEvent::linear_ramp(1.0, 10.5), 10.0);

        assert!(approx(p.value_at(10.0), 0.0));
        assert!(approx(p.value_at(10.25), 0.5));
        assert!(approx(p.value_at(10.5), 1.0));
    }

    #[test]
    fn chained_ramps_continue_from_previous_target() {
        let mut p = AudioParam::unbounded(0.0);
        p.schedule(ParamEvent::linear_ramp(1.0, 1.0), 0.0);
        p.schedule(ParamEvent::linear_ramp(3.0, 2.0), 0.1);

        assert!(approx(p.value_at(0.5), 0.5));
        assert!(approx(p.value_at(1.5), 2.0));
        assert!(approx(p.value_at(2.5), 3.0));
    }

    #[test]
    fn same_time_event_replaces_value() {
        let mut p = AudioParam::unbounded(0.0);
        p.schedule(ParamEvent::linear_ramp(1.0, 1.0), 0.0);
        p.schedule(ParamEvent::linear_ramp(2.0, 1.0), 0.0);

        assert_eq!(p.pending(), 1);
        assert!(approx(p.value_at(1.0), 2.0));
    }

    #[test]
    fn cancel_drops_later_events() {
        let mut p = AudioParam::unbounded(0.0);
        p.schedule(ParamEvent::set_at(1.0, 1.0), 0.0);
        p.schedule(ParamEvent::set_at(2.0, 2.0), 0.0);
        p.schedule(ParamEvent::CancelScheduledValues(1.5), 0.0);

        assert_eq!(p.pending(), 1);
        assert_eq!(p.value_at(3.0), 1.0);
    }

    #[test]
    fn exponential_ramp_through_zero_holds_then_jumps() {
        let mut p = AudioParam::unbounded(0.0);
        p.schedule(ParamEvent::ExponentialRampToValueAtTime { value: 1.0, time: 1.0 }, 0.0);

        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::unbounded(1.0);
        p.schedule(ParamEvent::ExponentialRampToValueAtTime { value: 4.0, time: 1.0 }, 0.0);

        assert!(approx(p.value_at(0.5), 2.0));
    }

    #[test]
    fn output_is_clamped_to_range() {
        let mut p = AudioParam::new(0.5, 0.0, 1.0);
        p.schedule(ParamEvent::SetValue(4.0), 0.0);
        assert_eq!(p.value_at(0.0), 1.0);
    }

    #[test]
    fn non_finite_events_are_ignored() {
        let mut p = AudioParam::unbounded(0.25);
        p.schedule(ParamEvent::set_at(f32::NAN, 0.0), 0.0);
        p.schedule(ParamEvent::set_at(1.0, f64::INFINITY), 0.0);
        assert_eq!(p.pending(), 0);
        assert_eq!(p.value_at(1.0), 0.25);
    }

    #[test]
    fn fill_writes_per_sample_ramp() {
        let mut p = AudioParam::unbounded(0.0);
        let ctx = ProcessContext::new(64);
        p.schedule(ParamEvent::linear_ramp(1.0, 1.0), 0.0);

        let mut out = [0.0f32; 64];
        p.fill(&ctx, &mut out);

        assert!(approx(out[0], 0.0));
        assert!(approx(out[32], 0.5));
        assert!(approx(out[63], 63.0 / 64.0));
    }
}
