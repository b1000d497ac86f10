// Transform value object for rig guides and joints
//
// Position, Euler rotation (degrees) and scale, stored the way a DCC channel
// box shows them rather than as a matrix.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Serialized form: `[position, rotation, scale]`, each `[x, y, z]`.
pub type TransformArray = [[f32; 3]; 3];

/// Position, rotation and scale triple.
///
/// Rotation is expressed in degrees with an XYZ rotate order (X applied
/// first, then Y, then Z).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformArray", into = "TransformArray")]
pub struct Transform {
    /// Translation
    pub position: Vec3,

    /// Euler rotation in degrees (XYZ order)
    pub rotation: Vec3,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a transform from its three components.
    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create a new transform with only translation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Replace the position, keeping rotation and scale.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Rotation as a quaternion.
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
        )
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    /// Create a new transform from a 4x4 matrix.
    ///
    /// Decomposes the matrix into translation, rotation, and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
        Self {
            position,
            rotation: Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()),
            scale,
        }
    }

    pub fn to_array(&self) -> TransformArray {
        [
            self.position.to_array(),
            self.rotation.to_array(),
            self.scale.to_array(),
        ]
    }

    pub fn from_array(array: TransformArray) -> Self {
        Self {
            position: Vec3::from_array(array[0]),
            rotation: Vec3::from_array(array[1]),
            scale: Vec3::from_array(array[2]),
        }
    }

    /// Approximate equality, used when comparing transforms read back from a scene.
    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        self.position.abs_diff_eq(other.position, max_abs_diff)
            && self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}

impl From<TransformArray> for Transform {
    fn from(array: TransformArray) -> Self {
        Self::from_array(array)
    }
}

impl From<Transform> for TransformArray {
    fn from(transform: Transform) -> Self {
        transform.to_array()
    }
}
