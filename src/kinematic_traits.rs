//! Core types and the traits connecting the planner to the robot model.

extern crate nalgebra as na;

use na::{Isometry3, Matrix6, Vector6};
use thiserror::Error;

/// Pose is used for link frames, the target and trajectory waypoints. It contains both
/// Cartesian position and rotation quaternion
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Per joint values, radians for rotary joints. Also used for joint velocities.
pub type Joints = [f64; 6];

/// 6 component force, 3 linear followed by 3 angular components. After mapping through
/// the Jacobian transpose, the same type holds the joint space generalized force.
pub type GeneralizedForce = Vector6<f64>;

/// Jacobian of one link: rows are task space (linear x, y, z, angular x, y, z),
/// columns are joints.
pub type JacobianMatrix = Matrix6<f64>;

/// Number of joints the planner works with.
pub const DOF: usize = 6;

/// For providing joint values when the robot is at zero position.
pub const JOINTS_AT_ZERO: Joints = [0.0; 6];

/// Forward kinematics of the serial manipulator.
pub trait Kinematics: Send + Sync {
    /// Pose of the flange (last link) for the given joint values.
    fn forward(&self, qs: &Joints) -> Pose;

    /// Poses of all six links for the given joint values, base to flange. The last pose
    /// is the same as returned by `forward`.
    fn forward_with_joint_poses(&self, qs: &Joints) -> [Pose; 6];
}

/// Failures of the kinematic queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicError {
    #[error("Unknown link: {0}")]
    UnknownLink(String),

    #[error("Kinematic data unavailable for {link}: {reason}")]
    Unavailable { link: String, reason: String },

    #[error("Non finite value computed for {0}")]
    NonFinite(String),
}

/// Kinematic service the planner consumes. All queries are pure functions of the joint
/// values passed and of the static robot model.
pub trait KinematicService: Send + Sync {
    /// Names of the tracked links, in the order the per link parameters refer to them.
    fn link_names(&self) -> &[String];

    /// The task relevant link that is driven to the target.
    fn end_link(&self) -> &str;

    /// Frame the Jacobians returned by `jacobian` are expressed in.
    fn jacobian_frame(&self) -> &str;

    /// Frame link poses, the target, waypoints and obstacles are expressed in.
    fn planning_frame(&self) -> &str;

    /// Pose of the named link in the planning frame.
    fn link_pose(&self, link: &str, qs: &Joints) -> Result<Pose, KinematicError>;

    /// Jacobian of the named link with respect to all joints, expressed in `jacobian_frame`.
    fn jacobian(&self, link: &str, qs: &Joints) -> Result<JacobianMatrix, KinematicError>;

    /// Relative transform bringing coordinates of `source_link` into `target_link`.
    fn transform(&self, target_link: &str, source_link: &str, qs: &Joints) -> Result<Pose, KinematicError>;

    /// Index of the named link among `link_names`.
    fn link_index(&self, link: &str) -> Result<usize, KinematicError> {
        self.link_names()
            .iter()
            .position(|name| name == link)
            .ok_or_else(|| KinematicError::UnknownLink(link.to_string()))
    }
}
