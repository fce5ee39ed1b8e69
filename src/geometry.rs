//! Distance between the position parts of poses, transforms and raw coordinates.
//!
//! Orientation never takes part in the distance. Raw coordinates given as slices must
//! have exactly three components; anything else is a programming error and panics.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

/// Anything that has a position in the planning frame.
pub trait Located {
    fn position(&self) -> Vector3<f64>;
}

impl Located for Isometry3<f64> {
    fn position(&self) -> Vector3<f64> {
        self.translation.vector
    }
}

impl Located for Translation3<f64> {
    fn position(&self) -> Vector3<f64> {
        self.vector
    }
}

impl Located for Point3<f64> {
    fn position(&self) -> Vector3<f64> {
        self.coords
    }
}

impl Located for Vector3<f64> {
    fn position(&self) -> Vector3<f64> {
        *self
    }
}

impl Located for [f64; 3] {
    fn position(&self) -> Vector3<f64> {
        Vector3::new(self[0], self[1], self[2])
    }
}

impl Located for [f64] {
    fn position(&self) -> Vector3<f64> {
        assert_eq!(self.len(), 3, "Raw position must have 3 coordinates, got {}", self.len());
        Vector3::new(self[0], self[1], self[2])
    }
}

impl Located for Vec<f64> {
    fn position(&self) -> Vector3<f64> {
        self.as_slice().position()
    }
}

/// Euclidean distance between the positions of `a` and `b`.
pub fn distance<A: Located + ?Sized, B: Located + ?Sized>(a: &A, b: &B) -> f64 {
    (a.position() - b.position()).norm()
}

/// Rotation vector (axis times angle) that turns `current` into `target`, expressed in
/// the planning frame. Its norm is the angle between the two orientations.
pub fn orientation_error(target: &UnitQuaternion<f64>, current: &UnitQuaternion<f64>) -> Vector3<f64> {
    (target * current.inverse()).scaled_axis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_pairings_agree() {
        let a = Isometry3::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.3, 0.0, 0.0));
        let b = Isometry3::new(Vector3::new(4.0, 6.0, 3.0), Vector3::new(0.0, 1.0, 0.0));
        let raw = vec![4.0, 6.0, 3.0];

        assert_eq!(distance(&a, &b), 5.0);
        assert_eq!(distance(&a, &b.translation), 5.0);
        assert_eq!(distance(&a, &raw), 5.0);
        assert_eq!(distance(&b.translation, raw.as_slice()), 0.0);
        assert_eq!(distance(&Point3::new(1.0, 2.0, 3.0), &[4.0, 6.0, 3.0]), 5.0);
    }

    #[test]
    fn test_orientation_ignored() {
        let a = Isometry3::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.5));
        let b = Isometry3::translation(1.0, 0.0, 0.0);
        assert_eq!(distance(&a, &b), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_malformed_raw_position() {
        let raw = vec![1.0, 2.0];
        distance(&Isometry3::identity(), &raw);
    }

    #[test]
    fn test_orientation_error() {
        let current = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.2);
        let target = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        let error = orientation_error(&target, &current);
        assert!((error - Vector3::new(0.0, 0.0, 0.3)).norm() < 1e-12);
        assert!(orientation_error(&target, &target).norm() < 1e-12);
    }
}
