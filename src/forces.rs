//! Potential field forces and their mapping into joint space.
//!
//! Attraction pulls the end link towards the target and towards the tracked trajectory
//! waypoint, repulsion pushes every tracked link away from the obstacles near it. Cartesian
//! forces are mapped to joint space with the transpose of the Jacobian of the link they act
//! on and summed into a single generalized force.

use nalgebra::{Vector3, Vector6};
use tracing::debug;

use crate::apf_params::{ApfParams, FieldGains};
use crate::geometry::{distance, orientation_error};
use crate::kinematic_state::KinematicSnapshot;
use crate::kinematic_traits::{GeneralizedForce, Pose};
use crate::obstacles::ObstacleSample;
use crate::planner_error::PlannerError;

/// Below this, an obstacle is taken as coinciding with the link origin.
const COINCIDENT: f64 = 1e-9;

/// Parabolic inside the switch radius, conic outside. With matched gains
/// (`zeta * radius == alfa`) the force is continuous at the switch.
fn two_regime(error: &Vector3<f64>, zeta: f64, radius: f64, alfa: f64) -> Vector3<f64> {
    let magnitude = error.norm();
    if magnitude <= radius {
        error * zeta
    } else {
        error * (alfa / magnitude)
    }
}

/// Attractive field of one goal (the target or a trajectory waypoint).
#[derive(Debug, Clone, Copy)]
pub struct AttractiveField {
    pub gains: FieldGains,
}

impl AttractiveField {
    pub fn new(gains: FieldGains) -> Self {
        Self { gains }
    }

    pub fn position_force(&self, error: &Vector3<f64>) -> Vector3<f64> {
        two_regime(error, self.gains.zeta, self.gains.dist_att, self.gains.alfa)
    }

    pub fn orientation_force(&self, error: &Vector3<f64>) -> Vector3<f64> {
        two_regime(error, self.gains.zeta, self.gains.dist_att_config, self.gains.alfa_rot)
    }

    /// Force and torque pulling `current` towards `goal`, both in the planning frame.
    pub fn force(&self, goal: &Pose, current: &Pose) -> (Vector3<f64>, Vector3<f64>) {
        let position_error = goal.translation.vector - current.translation.vector;
        let rotation_error = orientation_error(&goal.rotation, &current.rotation);
        (self.position_force(&position_error), self.orientation_force(&rotation_error))
    }
}

/// Repulsive field around obstacles acting on one link.
#[derive(Debug, Clone, Copy)]
pub struct RepulsiveField {
    pub eta: f64,
    pub alfa: f64,
    pub safety_distance: f64,
    pub min_distance: f64,
}

impl RepulsiveField {
    /// `eta * (1/d - 1/d0) / d^alfa` below the safety distance `d0`, zero from it on.
    /// Distances below `min_distance` are clamped, so the magnitude stays finite.
    pub fn magnitude(&self, distance: f64) -> f64 {
        if distance >= self.safety_distance {
            return 0.0;
        }
        let d = distance.max(self.min_distance);
        self.eta * (1.0 / d - 1.0 / self.safety_distance) / d.powf(self.alfa)
    }

    /// Force on the link at `link` from the obstacle at `obstacle`, pointing away from it.
    pub fn force(&self, link: &Vector3<f64>, obstacle: &Vector3<f64>) -> Vector3<f64> {
        let d = distance(link, obstacle);
        let magnitude = self.magnitude(d);
        if magnitude == 0.0 {
            return Vector3::zeros();
        }
        let direction = if d > COINCIDENT {
            (link - obstacle) / d
        } else if link.norm() > COINCIDENT {
            // Push outwards along the base to link direction.
            link.normalize()
        } else {
            Vector3::z()
        };
        direction * magnitude
    }
}

/// Joint space contributions of every force source in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceBreakdown {
    pub target_position: GeneralizedForce,
    pub target_orientation: GeneralizedForce,
    pub trajectory_position: GeneralizedForce,
    pub trajectory_orientation: GeneralizedForce,
    pub repulsive: GeneralizedForce,
    pub total: GeneralizedForce,
}

impl Default for ForceBreakdown {
    fn default() -> Self {
        Self {
            target_position: Vector6::zeros(),
            target_orientation: Vector6::zeros(),
            trajectory_position: Vector6::zeros(),
            trajectory_orientation: Vector6::zeros(),
            repulsive: Vector6::zeros(),
            total: Vector6::zeros(),
        }
    }
}

fn linear(force: &Vector3<f64>) -> GeneralizedForce {
    Vector6::new(force.x, force.y, force.z, 0.0, 0.0, 0.0)
}

fn angular(torque: &Vector3<f64>) -> GeneralizedForce {
    Vector6::new(0.0, 0.0, 0.0, torque.x, torque.y, torque.z)
}

/// Computes the joint space force of one cycle from the target, the tracked waypoint
/// and the obstacles.
#[derive(Debug, Clone)]
pub struct ForceSynthesizer {
    target: AttractiveField,
    trajectory: AttractiveField,
    repulsive: Vec<RepulsiveField>,
}

impl ForceSynthesizer {
    pub fn new(params: &ApfParams) -> Self {
        let repulsive = params
            .obs_eta
            .iter()
            .zip(params.obs_alfa.iter())
            .map(|(&eta, &alfa)| RepulsiveField {
                eta,
                alfa,
                safety_distance: params.safety_distance,
                min_distance: params.min_obstacle_distance,
            })
            .collect();
        Self {
            target: AttractiveField::new(params.target_gains()),
            trajectory: AttractiveField::new(params.trajectory_gains()),
            repulsive,
        }
    }

    pub fn target_field(&self) -> &AttractiveField {
        &self.target
    }

    pub fn repulsive_field(&self, link: usize) -> Option<&RepulsiveField> {
        self.repulsive.get(link)
    }

    /// Sums all sources into one joint space force. The trajectory term is only present
    /// when a waypoint is given.
    pub fn synthesize(
        &self,
        snapshot: &KinematicSnapshot,
        target: &Pose,
        waypoint: Option<&Pose>,
        obstacles: &[ObstacleSample],
    ) -> Result<ForceBreakdown, PlannerError> {
        let end_pose = snapshot.end_pose();
        let end_jacobian = snapshot.end_jacobian();
        let mut breakdown = ForceBreakdown::default();

        let (force, torque) = self.target.force(target, end_pose);
        breakdown.target_position = end_jacobian.torques_from_vector(&linear(&force));
        breakdown.target_orientation = end_jacobian.torques_from_vector(&angular(&torque));

        if let Some(waypoint) = waypoint {
            let (force, torque) = self.trajectory.force(waypoint, end_pose);
            breakdown.trajectory_position = end_jacobian.torques_from_vector(&linear(&force));
            breakdown.trajectory_orientation = end_jacobian.torques_from_vector(&angular(&torque));
        }

        for obstacle in obstacles {
            let link = obstacle.link;
            let (field, pose, jacobian) = match (
                self.repulsive.get(link),
                snapshot.link_poses.get(link),
                snapshot.jacobians.get(link),
            ) {
                (Some(field), Some(pose), Some(jacobian)) => (field, pose, jacobian),
                _ => {
                    return Err(PlannerError::Precondition(format!(
                        "Obstacle sample refers to link {} but only {} links are tracked",
                        link,
                        snapshot.link_poses.len().min(self.repulsive.len())
                    )));
                }
            };
            if !obstacle.position.coords.iter().all(|v| v.is_finite()) {
                return Err(PlannerError::Precondition(format!(
                    "Obstacle sample for link {} is not finite: {:?}",
                    link, obstacle.position
                )));
            }
            let force = field.force(&pose.translation.vector, &obstacle.position.coords);
            if force != Vector3::zeros() {
                debug!("Obstacle at {:?} repels link {} with {:.4}", obstacle.position, link, force.norm());
                breakdown.repulsive += jacobian.torques_from_linear(&force);
            }
        }

        breakdown.total = breakdown.target_position
            + breakdown.target_orientation
            + breakdown.trajectory_position
            + breakdown.trajectory_orientation
            + breakdown.repulsive;
        Ok(breakdown)
    }
}
