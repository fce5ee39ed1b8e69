//! Reactive local planner for six-axis serial manipulators, based on artificial potential
//! fields (APF).
//!
//! The planner drives the end link of the robot towards a target pose in a closed loop. It
//! optionally follows a precomputed global trajectory first, then completes the motion
//! with the local field alone. Every cycle it reads the latest joint state, queries the
//! kinematic service for link poses and Jacobians, sums the attractive and repulsive
//! forces in joint space and emits a joint velocity command.
//!
//! # Features
//!
//! - Two-regime (parabolic near, conic far) attraction to the target and to the tracked
//!   trajectory waypoint, continuous at the switch radius.
//! - Per link repulsion from obstacles within the safety distance, bounded at contact.
//! - Trajectory tracking with hysteresis and patience, falling back to the local field
//!   when the trajectory is exhausted or lost.
//! - Convergence on position, orientation and (optionally) joint errors.
//! - Cooperative stop, bounded cycle budget and bounded retries of the kinematic service.
//! - Random perturbation to escape local minima of the field.
//! - Obstacles from a static collision scene (`collisions` feature, uses parry3d).
//! - Parameters from YAML (`allow_filesystem` feature).
//!
//! # Example
//!
//! ```no_run
//! use rs_apf_planner::apf_params::ApfParams;
//! use rs_apf_planner::apf_planner::{ApfLocalPlanner, ExecutionRequest};
//! use rs_apf_planner::joint_state::JointStateChannel;
//! use rs_apf_planner::kinematic_state::RobotKinematicService;
//! use rs_apf_planner::kinematic_traits::{Joints, Kinematics};
//! use rs_apf_planner::kinematics_impl::OPWKinematics;
//! use rs_apf_planner::obstacles::NoObstacles;
//! use rs_apf_planner::parameters::Parameters;
//! use rs_apf_planner::simulation::SimulatedController;
//! use rs_apf_planner::trajectory::Trajectory;
//!
//! let robot = OPWKinematics::new(Parameters::irb2400_10());
//! let initial: Joints = [0.0, 0.3, 0.2, 0.0, 0.6, 0.0];
//! let start = robot.forward(&initial);
//! let target = nalgebra::Translation3::new(0.05, 0.0, 0.0) * start;
//!
//! let channel = JointStateChannel::new();
//! let mut controller = SimulatedController::new(channel.publisher(), initial, 0.05);
//! let planner = ApfLocalPlanner::new(
//!     ApfParams::default(), RobotKinematicService::new(robot, 1e-6), channel).unwrap();
//!
//! let request = ExecutionRequest::new(target, Trajectory::linear(&start, &target, 5));
//! let outcome = planner.execute(request, &mut NoObstacles, &mut controller).unwrap();
//! println!("{:?}", outcome);
//! ```

pub mod kinematic_traits;
pub mod parameters;
pub mod kinematics_impl;
pub mod jacobian;
pub mod geometry;

pub mod parameter_error;
pub mod planner_error;
pub mod apf_params;

pub mod kinematic_state;
pub mod forces;
pub mod obstacles;
pub mod trajectory;
pub mod convergence;
pub mod joint_state;

pub mod apf_planner;
pub mod simulation;

#[cfg(feature = "collisions")]
pub mod scene_obstacles;

#[cfg(test)]
mod tests;
