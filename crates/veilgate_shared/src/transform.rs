use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rigid pose plus per-axis scale. Local +Z is the object's forward axis.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.position)) / safe_scale(self.scale)
    }

    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }
}

fn safe_scale(scale: Vec3) -> Vec3 {
    Vec3::select(scale.abs().cmplt(Vec3::splat(f32::EPSILON)), Vec3::ONE, scale)
}

pub fn half_turn() -> Quat {
    Quat::from_rotation_y(PI)
}

/// Ratio between the exit and entry portal scale along x.
pub fn portal_scale_ratio(entry: &Transform, exit: &Transform) -> f32 {
    if entry.scale.x.abs() <= f32::EPSILON {
        1.0
    } else {
        exit.scale.x / entry.scale.x
    }
}

/// Maps `pose`, seen relative to the `entry` surface, to the matching pose
/// relative to `exit`: into entry-local space, a half turn about local up,
/// then back out through exit. Scale follows the portals' scale ratio.
pub fn portal_transform(entry: &Transform, exit: &Transform, pose: &Transform) -> Transform {
    let local = half_turn() * entry.inverse_transform_point(pose.position);
    let relative_rotation = half_turn() * (entry.rotation.inverse() * pose.rotation);
    Transform {
        position: exit.transform_point(local),
        rotation: (exit.rotation * relative_rotation).normalize(),
        scale: pose.scale * portal_scale_ratio(entry, exit),
    }
}

/// Direction (velocity, facing) carried through the same mapping as [`portal_transform`].
pub fn portal_direction(entry: &Transform, exit: &Transform, direction: Vec3) -> Vec3 {
    let local = half_turn() * entry.inverse_transform_direction(direction);
    exit.transform_direction(local) * portal_scale_ratio(entry, exit)
}
