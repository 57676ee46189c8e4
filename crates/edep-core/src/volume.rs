//! Axis-aligned bounding boxes.

use edep_types::Vec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned box given as `[[xmin, xmax], [ymin, ymax], [zmin, zmax]]`.
///
/// Bounds are inclusive on both sides. A box with `min > max` on any axis
/// contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxVolume {
    bounds: [[f64; 2]; 3],
}

impl BoxVolume {
    /// Build a box from per-axis `[min, max]` bounds.
    pub const fn new(bounds: [[f64; 2]; 3]) -> Self {
        Self { bounds }
    }

    /// Per-axis `[min, max]` bounds.
    pub const fn bounds(&self) -> [[f64; 2]; 3] {
        self.bounds
    }

    /// Multiply every bound by `unit`.
    #[must_use]
    pub fn scaled(self, unit: f64) -> Self {
        Self {
            bounds: self.bounds.map(|[lo, hi]| [lo * unit, hi * unit]),
        }
    }

    /// Whether `point` lies inside or on the surface of the box.
    pub fn contains(&self, point: Vec3) -> bool {
        self.bounds
            .iter()
            .zip(point)
            .all(|(&[lo, hi], x)| (lo..=hi).contains(&x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let b = BoxVolume::new([[-1.0, 1.0], [0.0, 2.0], [5.0, 5.0]]);
        assert!(b.contains([0.0, 1.0, 5.0]));
        assert!(b.contains([-1.0, 2.0, 5.0]));
        assert!(!b.contains([1.01, 1.0, 5.0]));
        assert!(!b.contains([0.0, 1.0, 5.1]));
        assert!(!b.contains([f64::NAN, 1.0, 5.0]));
    }

    #[test]
    fn inverted_box_is_empty() {
        let b = BoxVolume::new([[1.0, -1.0], [0.0, 1.0], [0.0, 1.0]]);
        assert!(!b.contains([0.0, 0.5, 0.5]));
    }

    #[test]
    fn deserializes_from_nested_list() {
        let b: Result<BoxVolume, _> = serde_yml::from_str("[[-5, 5], [-5, 5], [0, 10]]");
        assert_eq!(
            b.ok().map(|b| b.scaled(10.0).bounds()),
            Some([[-50.0, 50.0], [-50.0, 50.0], [0.0, 100.0]])
        );
    }
}
