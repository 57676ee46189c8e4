//! Rigid-body transforms between detector-local and analysis frames.
//!
//! A transform is configured as an ordered list of named operations, each
//! with one scalar. Operations are composed left to right: the local matrix
//! of each operation premultiplies everything composed before it, so the
//! first listed operation is applied to a point first.

use core::fmt;
use core::str::FromStr;

use edep_types::Vec3;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3, Vector4};

/// Errors raised while building a transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The operation name is not one of the supported operations.
    #[error("unknown transform operation {0:?}")]
    UnknownOperation(String),
}

/// One elementary rigid-body operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Translate along x by a length.
    TranslateX,
    /// Translate along y by a length.
    TranslateY,
    /// Translate along z by a length.
    TranslateZ,
    /// Rotate about x by an angle (right-handed).
    RotateX,
    /// Rotate about y by an angle (right-handed).
    RotateY,
    /// Rotate about z by an angle (right-handed).
    RotateZ,
    /// Negate x. The scalar is ignored.
    MirrorX,
    /// Negate y. The scalar is ignored.
    MirrorY,
    /// Negate z. The scalar is ignored.
    MirrorZ,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::TranslateX,
        Self::TranslateY,
        Self::TranslateZ,
        Self::RotateX,
        Self::RotateY,
        Self::RotateZ,
        Self::MirrorX,
        Self::MirrorY,
        Self::MirrorZ,
    ];

    /// The configuration name of the operation.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TranslateX => "TranslateX",
            Self::TranslateY => "TranslateY",
            Self::TranslateZ => "TranslateZ",
            Self::RotateX => "RotateX",
            Self::RotateY => "RotateY",
            Self::RotateZ => "RotateZ",
            Self::MirrorX => "MirrorX",
            Self::MirrorY => "MirrorY",
            Self::MirrorZ => "MirrorZ",
        }
    }

    /// The 4x4 matrix of this operation with the given, already scaled, value.
    pub fn matrix(self, value: f64) -> Matrix4<f64> {
        match self {
            Self::TranslateX => Matrix4::new_translation(&Vector3::new(value, 0.0, 0.0)),
            Self::TranslateY => Matrix4::new_translation(&Vector3::new(0.0, value, 0.0)),
            Self::TranslateZ => Matrix4::new_translation(&Vector3::new(0.0, 0.0, value)),
            Self::RotateX => Rotation3::from_axis_angle(&Vector3::x_axis(), value).to_homogeneous(),
            Self::RotateY => Rotation3::from_axis_angle(&Vector3::y_axis(), value).to_homogeneous(),
            Self::RotateZ => Rotation3::from_axis_angle(&Vector3::z_axis(), value).to_homogeneous(),
            Self::MirrorX => Matrix4::from_diagonal(&Vector4::new(-1.0, 1.0, 1.0, 1.0)),
            Self::MirrorY => Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, 1.0, 1.0)),
            Self::MirrorZ => Matrix4::from_diagonal(&Vector4::new(1.0, 1.0, -1.0, 1.0)),
        }
    }

    const fn is_translation(self) -> bool {
        matches!(self, Self::TranslateX | Self::TranslateY | Self::TranslateZ)
    }

    const fn is_rotation(self) -> bool {
        matches!(self, Self::RotateX | Self::RotateY | Self::RotateZ)
    }
}

impl FromStr for Operation {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| TransformError::UnknownOperation(s.to_owned()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A composed affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an existing matrix.
    pub const fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Compose named operations left to right.
    ///
    /// Translation values are multiplied by `length_unit` and rotation
    /// values by `angle_unit`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownOperation`] for an unrecognized name.
    pub fn build<'a, I>(operations: I, length_unit: f64, angle_unit: f64) -> Result<Self, TransformError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut result = Self::identity();
        for (name, value) in operations {
            let op: Operation = name.parse()?;
            result = result.then(op, value, length_unit, angle_unit);
        }
        Ok(result)
    }

    /// Append one operation after everything composed so far.
    #[must_use]
    pub fn then(self, op: Operation, value: f64, length_unit: f64, angle_unit: f64) -> Self {
        let scaled = if op.is_translation() {
            value * length_unit
        } else if op.is_rotation() {
            value * angle_unit
        } else {
            value
        };
        Self {
            matrix: op.matrix(scaled) * self.matrix,
        }
    }

    /// The 4x4 homogeneous matrix.
    pub const fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Map one point: `p' = R p + t`.
    pub fn apply_point(&self, point: Vec3) -> Vec3 {
        let [x, y, z] = point;
        let mapped = self.matrix.transform_point(&Point3::new(x, y, z));
        [mapped.x, mapped.y, mapped.z]
    }

    /// Map a batch of points.
    pub fn apply(&self, points: &[Vec3]) -> Vec<Vec3> {
        points.iter().map(|&p| self.apply_point(p)).collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use approx::assert_relative_eq;
    use edep_types::units::{DEGREE, MILLIMETER};
    use proptest::prelude::*;

    use super::*;

    fn assert_point(actual: Vec3, expected: Vec3) {
        for (a, e) in actual.into_iter().zip(expected) {
            assert_relative_eq!(a, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn translate_then_rotate() {
        let t = Transform::build([("TranslateX", 1.0), ("RotateZ", 90.0)], MILLIMETER, DEGREE)
            .unwrap();
        assert_point(t.apply_point([1.0, 0.0, 0.0]), [0.0, 2.0, 0.0]);
    }

    #[test]
    fn order_matters() {
        let t = Transform::build([("RotateZ", 90.0), ("TranslateX", 1.0)], MILLIMETER, DEGREE)
            .unwrap();
        assert_point(t.apply_point([1.0, 0.0, 0.0]), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn rotations_are_right_handed() {
        let rx = Transform::build([("RotateX", 90.0)], 1.0, DEGREE).unwrap();
        assert_point(rx.apply_point([0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        let ry = Transform::build([("RotateY", 90.0)], 1.0, DEGREE).unwrap();
        assert_point(ry.apply_point([0.0, 0.0, 1.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn mirrors_ignore_their_value() {
        let t = Transform::build([("MirrorY", 123.0), ("TranslateZ", 2.0)], 10.0, 1.0).unwrap();
        assert_point(t.apply_point([1.0, 1.0, 1.0]), [1.0, -1.0, 21.0]);
    }

    #[test]
    fn empty_list_is_identity() {
        let t = Transform::build(Vec::<(&str, f64)>::new(), 1.0, 1.0).unwrap();
        assert_eq!(t, Transform::identity());
        assert_eq!(t.apply(&[[1.0, 2.0, 3.0]]), vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn unknown_operation_is_error() {
        assert_eq!(
            Transform::build([("Shear", 1.0)], 1.0, 1.0),
            Err(TransformError::UnknownOperation("Shear".to_owned()))
        );
    }

    #[test]
    fn names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.to_string().parse::<Operation>(), Ok(op));
        }
    }

    proptest! {
        #[test]
        fn rotations_preserve_length(
            angles in proptest::collection::vec(-360.0f64..360.0, 0..6),
            p in proptest::array::uniform3(-100.0f64..100.0),
        ) {
            let axes = ["RotateX", "RotateY", "RotateZ"];
            let ops = angles
                .iter()
                .enumerate()
                .map(|(i, &a)| (axes[i % 3], a));
            let t = Transform::build(ops, 1.0, DEGREE).unwrap();
            let q = t.apply_point(p);
            let norm = |v: Vec3| v.iter().map(|c| c * c).sum::<f64>().sqrt();
            prop_assert!((norm(p) - norm(q)).abs() < 1e-9);
        }
    }
}
