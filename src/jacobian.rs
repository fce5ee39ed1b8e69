extern crate nalgebra as na;
use na::{Matrix6, Vector3};
use rayon::prelude::*;
use crate::kinematic_traits::{GeneralizedForce, JacobianMatrix, Joints, Kinematics, Pose};

/// Struct representing the Jacobian matrix of one link
#[derive(Debug, Clone, Copy)]
pub struct Jacobian {
    /// A 6x6 matrix representing the Jacobian
    ///
    /// The Jacobian matrix maps the joint velocities to the link velocities.
    /// Each column corresponds to a joint, and each row corresponds to a degree of freedom
    /// of the link (linear and angular velocities).
    matrix: JacobianMatrix,
}

impl Jacobian {
    pub fn new(matrix: JacobianMatrix) -> Self {
        Self { matrix }
    }

    /// Constructs the Jacobian of the given link by numerical differentiation
    ///
    /// # Arguments
    ///
    /// * `robot` - A reference to the robot implementing the Kinematics trait
    /// * `qs` - A reference to the joint configuration
    /// * `link` - Index of the link (0 to 5) as returned by `forward_with_joint_poses`
    /// * `epsilon` - A small value used for numerical differentiation
    pub fn for_link(robot: &impl Kinematics, qs: &Joints, link: usize, epsilon: f64) -> Self {
        Self { matrix: compute_link_jacobian(robot, qs, link, epsilon) }
    }

    pub fn matrix(&self) -> &JacobianMatrix {
        &self.matrix
    }

    /// Re-expresses this Jacobian in another frame, given the velocity transform
    /// from its current frame (see [`velocity_transform`]).
    pub fn transformed(&self, velocity_transform: &Matrix6<f64>) -> Self {
        Self { matrix: velocity_transform * self.matrix }
    }

    /// Computes the joint space generalized force equivalent to the given
    /// force and torque acting on the link (Jacobian transpose method).
    ///
    /// # Arguments
    ///
    /// * `force_torque` - A 6D vector, linear force followed by torque
    pub fn torques_from_vector(&self, force_torque: &GeneralizedForce) -> GeneralizedForce {
        self.matrix.transpose() * force_torque
    }

    /// Same as `torques_from_vector` for a pure linear force. Only the positional rows
    /// of the Jacobian take part.
    pub fn torques_from_linear(&self, force: &Vector3<f64>) -> GeneralizedForce {
        self.matrix.fixed_view::<3, 6>(0, 0).transpose() * force
    }
}

/// Function to compute the Jacobian matrix for a link of the given robot and joint configuration
///
/// # Returns
///
/// A 6x6 matrix. Columns of joints that are located after the link in the chain are zero
/// as they do not move the link.
pub fn compute_link_jacobian(robot: &impl Kinematics, joints: &Joints, link: usize, epsilon: f64) -> JacobianMatrix {
    let mut jacobian = Matrix6::zeros();
    let current_pose = robot.forward_with_joint_poses(joints)[link];
    let current_position = current_pose.translation.vector;
    let current_orientation = current_pose.rotation;

    let jacobian_columns: Vec<_> = (0..6).into_par_iter().map(|i| {
        let mut perturbed_qs = *joints;
        perturbed_qs[i] += epsilon;
        let perturbed_pose = robot.forward_with_joint_poses(&perturbed_qs)[link];
        let perturbed_position = perturbed_pose.translation.vector;
        let perturbed_orientation = perturbed_pose.rotation;

        let delta_position = (perturbed_position - current_position) / epsilon;
        let delta_orientation = (perturbed_orientation * current_orientation.inverse()).scaled_axis() / epsilon;

        (delta_position, delta_orientation)
    }).collect();

    for (i, (delta_position, delta_orientation)) in jacobian_columns.into_iter().enumerate() {
        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&delta_position);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&delta_orientation);
    }

    jacobian
}

/// Velocity transform (tr2jac) for the relative transform `T = (R, p)` bringing frame S
/// into frame F: `[[R, 0], [0, R]]`. Jacobians here give the velocity of the link origin,
/// so changing the frame they are expressed in only rotates both halves of the twist and
/// the translation `p` does not enter.
pub fn velocity_transform(transform: &Pose) -> Matrix6<f64> {
    let rotation = transform.rotation.to_rotation_matrix().into_inner();
    let mut result = Matrix6::zeros();
    result.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    result.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation);
    result
}
