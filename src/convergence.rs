//! Residual errors to the goal and the tolerances that define convergence.

use crate::apf_params::ApfParams;
use crate::geometry::distance;
use crate::kinematic_traits::{Joints, Pose};

/// Residual errors of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceErrors {
    /// Distance between the end link and the target (meters).
    pub position: f64,
    /// Angle between the end link and the target orientation (radians).
    pub orientation: f64,
    /// Euclidean norm of the joint error, 0 if no goal joints are known.
    pub joint: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceEvaluator {
    position_tolerance: f64,
    orientation_tolerance: f64,
    joint_tolerance: f64,
}

impl ConvergenceEvaluator {
    pub fn new(params: &ApfParams) -> Self {
        Self {
            position_tolerance: params.target_err,
            orientation_tolerance: params.target_err_ori,
            joint_tolerance: params.joint_err,
        }
    }

    /// Position error, see `finish_orientation` and `finish_joints` for the rest.
    pub fn finish_position(target: &Pose, current: &Pose) -> f64 {
        distance(target, current)
    }

    pub fn finish_orientation(target: &Pose, current: &Pose) -> f64 {
        target.rotation.angle_to(&current.rotation)
    }

    pub fn finish_joints(current: &Joints, goal: &Joints) -> f64 {
        current
            .iter()
            .zip(goal.iter())
            .map(|(c, g)| (g - c) * (g - c))
            .sum::<f64>()
            .sqrt()
    }

    /// Pure function of its inputs, calling it twice yields the same errors.
    pub fn evaluate(&self, target: &Pose, current: &Pose, joints: &Joints, goal_joints: Option<&Joints>) -> ConvergenceErrors {
        ConvergenceErrors {
            position: Self::finish_position(target, current),
            orientation: Self::finish_orientation(target, current),
            joint: goal_joints.map_or(0.0, |goal| Self::finish_joints(joints, goal)),
        }
    }

    /// All three errors must be within their tolerance at the same time.
    pub fn is_converged(&self, errors: &ConvergenceErrors) -> bool {
        errors.position <= self.position_tolerance
            && errors.orientation <= self.orientation_tolerance
            && errors.joint <= self.joint_tolerance
    }
}
