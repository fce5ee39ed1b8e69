//! Adapter between the planner and the kinematic service: captures, for the current joint
//! values, the poses and Jacobians of all tracked links in the planning frame.

use nalgebra::Isometry3;
use tracing::warn;

use crate::jacobian::{velocity_transform, Jacobian};
use crate::kinematic_traits::{JacobianMatrix, Joints, KinematicError, KinematicService, Kinematics, Pose};

/// Link names of the reference robot model, base to flange.
pub const OPW_LINK_NAMES: [&str; 6] = ["link_1", "link_2", "link_3", "link_4", "link_5", "link_6"];

/// Name of the robot base frame, which is also the planning frame.
pub const BASE_FRAME: &str = "base_link";

/// Kinematic service backed by a local `Kinematics` implementation. Jacobians are
/// computed numerically and expressed in the base frame.
pub struct RobotKinematicService<K: Kinematics> {
    pub robot: K,
    link_names: Vec<String>,
    end_link: String,
    base_frame: String,
    epsilon: f64,
}

impl<K: Kinematics> RobotKinematicService<K> {
    /// Service tracking the six links of the robot under the names `OPW_LINK_NAMES`, with
    /// the last link driven to the target.
    pub fn new(robot: K, epsilon: f64) -> Self {
        let link_names: Vec<String> = OPW_LINK_NAMES.iter().map(|name| name.to_string()).collect();
        let end_link = link_names[5].clone();
        Self { robot, link_names, end_link, base_frame: BASE_FRAME.to_string(), epsilon }
    }

    fn pose_of(&self, link: &str, qs: &Joints) -> Result<Pose, KinematicError> {
        if link == self.base_frame {
            return Ok(Isometry3::identity());
        }
        let index = self.link_index(link)?;
        let pose = self.robot.forward_with_joint_poses(qs)[index];
        if pose.translation.vector.iter().all(|v| v.is_finite()) {
            Ok(pose)
        } else {
            Err(KinematicError::NonFinite(link.to_string()))
        }
    }
}

impl<K: Kinematics> KinematicService for RobotKinematicService<K> {
    fn link_names(&self) -> &[String] {
        &self.link_names
    }

    fn end_link(&self) -> &str {
        &self.end_link
    }

    fn jacobian_frame(&self) -> &str {
        &self.base_frame
    }

    fn planning_frame(&self) -> &str {
        &self.base_frame
    }

    fn link_pose(&self, link: &str, qs: &Joints) -> Result<Pose, KinematicError> {
        self.pose_of(link, qs)
    }

    fn jacobian(&self, link: &str, qs: &Joints) -> Result<JacobianMatrix, KinematicError> {
        let index = self.link_index(link)?;
        let jacobian = Jacobian::for_link(&self.robot, qs, index, self.epsilon);
        if jacobian.matrix().iter().all(|v| v.is_finite()) {
            Ok(*jacobian.matrix())
        } else {
            Err(KinematicError::NonFinite(link.to_string()))
        }
    }

    fn transform(&self, target_link: &str, source_link: &str, qs: &Joints) -> Result<Pose, KinematicError> {
        let target = self.pose_of(target_link, qs)?;
        let source = self.pose_of(source_link, qs)?;
        Ok(target.inverse() * source)
    }
}

/// Poses and Jacobians of all tracked links for one joint configuration, all in the
/// planning frame. Captured fresh every cycle and never reused.
#[derive(Debug, Clone)]
pub struct KinematicSnapshot {
    pub joints: Joints,
    pub link_poses: Vec<Pose>,
    pub jacobians: Vec<Jacobian>,
    pub end_index: usize,
}

impl KinematicSnapshot {
    /// Queries the service once for every tracked link.
    pub fn capture(service: &dyn KinematicService, qs: &Joints) -> Result<Self, KinematicError> {
        let planning_frame = service.planning_frame();
        let jacobian_frame = service.jacobian_frame();
        let alignment = if planning_frame == jacobian_frame {
            None
        } else {
            Some(velocity_transform(&service.transform(planning_frame, jacobian_frame, qs)?))
        };

        let links = service.link_names();
        let mut link_poses = Vec::with_capacity(links.len());
        let mut jacobians = Vec::with_capacity(links.len());
        for link in links {
            link_poses.push(service.link_pose(link, qs)?);
            let jacobian = Jacobian::new(service.jacobian(link, qs)?);
            jacobians.push(match &alignment {
                Some(transform) => jacobian.transformed(transform),
                None => jacobian,
            });
        }

        Ok(Self {
            joints: *qs,
            link_poses,
            jacobians,
            end_index: service.link_index(service.end_link())?,
        })
    }

    /// Same as `capture`, repeating the whole capture up to `retries` more times on failure.
    /// Returns the last error together with the number of attempts made.
    pub fn capture_with_retries(
        service: &dyn KinematicService,
        qs: &Joints,
        retries: usize,
    ) -> Result<Self, (KinematicError, usize)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::capture(service, qs) {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if attempt <= retries => {
                    warn!("Kinematic capture attempt {} failed: {}", attempt, err);
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }

    pub fn end_pose(&self) -> &Pose {
        &self.link_poses[self.end_index]
    }

    pub fn end_jacobian(&self) -> &Jacobian {
        &self.jacobians[self.end_index]
    }
}
