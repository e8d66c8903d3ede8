//! The listener every [`Panner`](crate::nodes::Panner) positions itself against.

use cgmath::{InnerSpace, Vector3, Zero};

/// Position and orientation of the listener in world space.
///
/// The engine owns one listener and hands a copy of it to every node with the
/// [`ProcessContext`](crate::ProcessContext) of each block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Listener {
    pub position: Vector3<f32>,
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl Default for Listener {
    /// Origin, facing -Z with +Y up.
    fn default() -> Self {
        Self {
            position: Vector3::zero(),
            forward: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::new(0.0, 1.0, 0.0),
        }
    }
}

impl Listener {
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// Set the facing direction and the up vector.
    ///
    /// Degenerate orientations (zero-length or parallel vectors) are ignored,
    /// the previous orientation stays in effect.
    pub fn set_orientation(&mut self, forward: Vector3<f32>, up: Vector3<f32>) {
        if forward.magnitude2() == 0.0 || up.magnitude2() == 0.0 {
            tracing::warn!(?forward, ?up, "ignoring zero-length listener orientation");
            return;
        }
        if forward.cross(up).magnitude2() == 0.0 {
            tracing::warn!(?forward, ?up, "ignoring parallel listener orientation");
            return;
        }
        self.forward = forward;
        self.up = up;
    }

    /// Unit vector pointing to the listener's right.
    pub fn right(&self) -> Vector3<f32> {
        self.forward.cross(self.up).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_faces_negative_z() {
        let l = Listener::default();
        assert_eq!(l.position, Vector3::zero());
        assert_eq!(l.forward, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(l.up, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(l.right(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn parallel_orientation_is_rejected() {
        let mut l = Listener::default();
        l.set_orientation(Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(l, Listener::default());
    }
}
