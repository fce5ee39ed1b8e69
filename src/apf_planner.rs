//! Execution controller of the potential field planner.
//!
//! One execution request drives the end link to the target, first following the reference
//! trajectory and then, once the trajectory is exhausted or lost, with the local field
//! alone. Every cycle takes a fresh joint state snapshot, recomputes the kinematics and
//! all forces, and emits one joint velocity command.
//!
//! ```text
//! INIT -> GLOBAL_TRAJECTORY_FOLLOW -> LOCAL_APF
//!   |              |                     |
//!   +--------------+---------------------+--> CONVERGED | ITERATION_EXHAUSTED | STOPPED
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use nalgebra::Vector6;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::apf_params::ApfParams;
use crate::convergence::{ConvergenceErrors, ConvergenceEvaluator};
use crate::forces::{ForceBreakdown, ForceSynthesizer};
use crate::joint_state::{JointState, JointStateChannel};
use crate::kinematic_state::KinematicSnapshot;
use crate::kinematic_traits::{Joints, KinematicService, Pose};
use crate::obstacles::ObstacleSource;
use crate::planner_error::PlannerError;
use crate::trajectory::{TrackerEvent, Trajectory, TrajectoryTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    GlobalTrajectoryFollow,
    LocalApf,
    Converged,
    IterationExhausted,
    Stopped,
    /// Kinematic service failed, the error was returned to the caller.
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Converged | Phase::IterationExhausted | Phase::Stopped | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::GlobalTrajectoryFollow => "GLOBAL_TRAJECTORY_FOLLOW",
            Phase::LocalApf => "LOCAL_APF",
            Phase::Converged => "CONVERGED",
            Phase::IterationExhausted => "ITERATION_EXHAUSTED",
            Phase::Stopped => "STOPPED",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Status accompanying every emitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Running,
    Converged,
    IterationExhausted,
    Stopped,
}

/// Joint velocity command of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCommand {
    pub velocities: Joints,
    pub status: CycleStatus,
    pub iteration: usize,
}

/// Consumer of the velocity commands, normally the low level joint controller.
pub trait CommandSink {
    fn send(&mut self, command: &VelocityCommand) -> Result<(), String>;
}

/// Records the commands without acting on them.
impl CommandSink for Vec<VelocityCommand> {
    fn send(&mut self, command: &VelocityCommand) -> Result<(), String> {
        self.push(*command);
        Ok(())
    }
}

/// Adapts a closure as a command sink.
pub struct CommandFn<F>(pub F);

impl<F> CommandSink for CommandFn<F>
where
    F: FnMut(&VelocityCommand) -> Result<(), String>,
{
    fn send(&mut self, command: &VelocityCommand) -> Result<(), String> {
        (self.0)(command)
    }
}

/// Cooperative cancellation. The flag is polled once, at the start of every cycle.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Clears a previous stop request so the planner can accept a new execution.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Release);
    }
}

/// What to execute.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub target: Pose,
    pub trajectory: Trajectory,
    /// Joint values expected at the target, if known. Adds the joint criterion to convergence.
    pub goal_joints: Option<Joints>,
}

impl ExecutionRequest {
    pub fn new(target: Pose, trajectory: Trajectory) -> Self {
        Self { target, trajectory, goal_joints: None }
    }
}

/// Terminal outcome of an execution that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionOutcome {
    Converged { iterations: usize },
    /// The cycle budget ran out; the caller decides what to do (replan, escalate).
    IterationExhausted { iterations: usize, errors: ConvergenceErrors },
    Stopped { iterations: usize },
}

/// State of one execution, created when it starts and dropped when it ends.
#[derive(Debug, Clone)]
pub struct PlannerState {
    pub phase: Phase,
    /// Completed cycles.
    pub iter: usize,
    /// Joint state snapshot taken at the start of the last cycle.
    pub joint_state: JointState,
    pub link_poses: Vec<Pose>,
    pub errors: Option<ConvergenceErrors>,
    pub forces: ForceBreakdown,
    pub tracker: TrajectoryTracker,
    /// Consecutive cycles with a vanishing force while not converged.
    stuck_cycles: usize,
}

/// Summary of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub iteration: usize,
    pub phase: Phase,
    pub status: CycleStatus,
    pub errors: Option<ConvergenceErrors>,
    pub command: Option<VelocityCommand>,
    pub cursor: usize,
    pub forces: ForceBreakdown,
}

/// The planner: static parameters, the kinematic service and the joint feedback channel.
/// Executes one request at a time.
pub struct ApfLocalPlanner<S: KinematicService> {
    params: ApfParams,
    service: S,
    joint_states: JointStateChannel,
    stop: StopHandle,
}

impl<S: KinematicService> ApfLocalPlanner<S> {
    /// Checks the parameters against the links the service tracks.
    pub fn new(params: ApfParams, service: S, joint_states: JointStateChannel) -> Result<Self, PlannerError> {
        params.validate(service.link_names().len())?;
        service.link_index(service.end_link()).map_err(|e| PlannerError::Precondition(e.to_string()))?;
        Ok(Self { params, service, joint_states, stop: StopHandle::new() })
    }

    pub fn params(&self) -> &ApfParams {
        &self.params
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Handle to stop the running execution from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Waits for the first joint state and prepares the execution of `request`.
    pub fn start<'a>(
        &'a self,
        request: ExecutionRequest,
        obstacles: &'a mut dyn ObstacleSource,
        sink: &'a mut dyn CommandSink,
    ) -> Result<Execution<'a>, PlannerError> {
        if !is_finite_pose(&request.target) {
            return Err(PlannerError::Precondition(format!("Target is not finite: {}", request.target)));
        }
        if let Some(index) = request.trajectory.waypoints().iter().position(|pose| !is_finite_pose(pose)) {
            return Err(PlannerError::Precondition(format!(
                "Waypoint {} is not finite: {}",
                index,
                request.trajectory.waypoints()[index]
            )));
        }
        // A stop raised for an earlier execution must not cancel this one.
        self.stop.reset();

        let timeout = self.params.joint_state_timeout_ms;
        let joint_state = self
            .joint_states
            .wait_for_sample(Duration::from_millis(timeout))
            .ok_or(PlannerError::JointStateTimeout(timeout))?;

        info!(
            "Starting execution towards {:?} with {} waypoints",
            request.target.translation.vector,
            request.trajectory.len()
        );

        Ok(Execution {
            params: &self.params,
            service: &self.service,
            joint_states: &self.joint_states,
            stop: &self.stop,
            obstacles,
            sink,
            synthesizer: ForceSynthesizer::new(&self.params),
            evaluator: ConvergenceEvaluator::new(&self.params),
            state: PlannerState {
                phase: Phase::Init,
                iter: 0,
                joint_state,
                link_poses: Vec::new(),
                errors: None,
                forces: ForceBreakdown::default(),
                tracker: TrajectoryTracker::new(&self.params),
                stuck_cycles: 0,
            },
            request,
        })
    }

    /// Runs the request cycle by cycle until it converges, runs out of cycles or is stopped.
    pub fn execute(
        &self,
        request: ExecutionRequest,
        obstacles: &mut dyn ObstacleSource,
        sink: &mut dyn CommandSink,
    ) -> Result<ExecutionOutcome, PlannerError> {
        let mut execution = self.start(request, obstacles, sink)?;
        let period = Duration::from_millis(self.params.cycle_period_ms);
        loop {
            let report = execution.step()?;
            if let Some(outcome) = execution.outcome() {
                info!("Execution finished after {} cycles: {:?}", report.iteration, outcome);
                return Ok(outcome);
            }
            if !period.is_zero() {
                sleep(period);
            }
        }
    }
}

/// One running execution request.
pub struct Execution<'a> {
    params: &'a ApfParams,
    service: &'a dyn KinematicService,
    joint_states: &'a JointStateChannel,
    stop: &'a StopHandle,
    obstacles: &'a mut dyn ObstacleSource,
    sink: &'a mut dyn CommandSink,
    synthesizer: ForceSynthesizer,
    evaluator: ConvergenceEvaluator,
    state: PlannerState,
    request: ExecutionRequest,
}

impl Execution<'_> {
    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn request(&self) -> &ExecutionRequest {
        &self.request
    }

    /// Outcome once a terminal phase is reached (other than `Failed`, reported as error).
    pub fn outcome(&self) -> Option<ExecutionOutcome> {
        let iterations = self.state.iter;
        match self.state.phase {
            Phase::Converged => Some(ExecutionOutcome::Converged { iterations }),
            Phase::IterationExhausted => Some(ExecutionOutcome::IterationExhausted {
                iterations,
                errors: self.state.errors?,
            }),
            Phase::Stopped => Some(ExecutionOutcome::Stopped { iterations }),
            _ => None,
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.state.phase != phase {
            info!("Phase {} -> {} at iteration {}", self.state.phase, phase, self.state.iter);
            self.state.phase = phase;
        }
    }

    fn report(&self, status: CycleStatus, command: Option<VelocityCommand>) -> CycleReport {
        CycleReport {
            iteration: self.state.iter,
            phase: self.state.phase,
            status,
            errors: self.state.errors,
            command,
            cursor: self.state.tracker.cursor(),
            forces: self.state.forces,
        }
    }

    fn emit(&mut self, velocities: Joints, status: CycleStatus) -> Result<VelocityCommand, PlannerError> {
        let command = VelocityCommand { velocities, status, iteration: self.state.iter };
        self.sink.send(&command).map_err(PlannerError::Sink)?;
        Ok(command)
    }

    /// Joint velocities from the total force: scaled, perturbed out of local minima
    /// and clamped to the velocity limit.
    fn velocities(&mut self, total: &Vector6<f64>) -> Joints {
        let params = self.params;
        let mut velocities = total * params.step_gain;

        if total.norm() < params.local_minimum_force {
            self.state.stuck_cycles += 1;
            if params.random_perturbation > 0.0 && self.state.stuck_cycles >= params.local_minimum_patience {
                warn!(
                    "Local minimum suspected after {} cycles, perturbing joints",
                    self.state.stuck_cycles
                );
                let amplitude = params.random_perturbation;
                let mut rng = rand::thread_rng();
                for v in velocities.iter_mut() {
                    *v += rng.gen_range(-amplitude..=amplitude);
                }
                self.state.stuck_cycles = 0;
            }
        } else {
            self.state.stuck_cycles = 0;
        }

        let limit = params.max_joint_velocity;
        std::array::from_fn(|i| velocities[i].clamp(-limit, limit))
    }

    /// Runs one cycle.
    pub fn step(&mut self) -> Result<CycleReport, PlannerError> {
        match self.state.phase {
            Phase::Converged => return Ok(self.report(CycleStatus::Converged, None)),
            Phase::IterationExhausted => return Ok(self.report(CycleStatus::IterationExhausted, None)),
            Phase::Stopped => return Ok(self.report(CycleStatus::Stopped, None)),
            Phase::Failed => {
                return Err(PlannerError::Precondition("Execution has already failed".into()));
            }
            _ => {}
        }

        if self.stop.is_stop_requested() {
            info!("Stop requested, stopping at iteration {}", self.state.iter);
            self.enter(Phase::Stopped);
            return Ok(self.report(CycleStatus::Stopped, None));
        }

        if let Some(joint_state) = self.joint_states.snapshot() {
            self.state.joint_state = joint_state;
        }
        let joints = self.state.joint_state.positions;

        let snapshot = match KinematicSnapshot::capture_with_retries(self.service, &joints, self.params.service_retries) {
            Ok(snapshot) => snapshot,
            Err((source, attempts)) => {
                error!("Kinematic service failed after {} attempts: {}", attempts, source);
                self.enter(Phase::Failed);
                return Err(PlannerError::Kinematics { iteration: self.state.iter + 1, attempts, source });
            }
        };

        let iteration = self.state.iter + 1;
        self.state.link_poses.clone_from(&snapshot.link_poses);
        let errors = self.evaluator.evaluate(
            &self.request.target,
            snapshot.end_pose(),
            &joints,
            self.request.goal_joints.as_ref(),
        );
        self.state.errors = Some(errors);
        let converged = self.evaluator.is_converged(&errors);

        if self.state.phase == Phase::Init && !converged {
            if self.request.trajectory.is_empty() {
                self.enter(Phase::LocalApf);
            } else {
                self.enter(Phase::GlobalTrajectoryFollow);
            }
        }

        if converged {
            self.state.iter = iteration;
            self.enter(Phase::Converged);
            self.state.forces = ForceBreakdown::default();
            let command = self.emit([0.0; 6], CycleStatus::Converged)?;
            return Ok(self.report(CycleStatus::Converged, Some(command)));
        }

        if self.state.phase == Phase::GlobalTrajectoryFollow {
            match self.state.tracker.update(&self.request.trajectory, snapshot.end_pose()) {
                TrackerEvent::Exhausted | TrackerEvent::Lost => self.enter(Phase::LocalApf),
                TrackerEvent::Advanced { from, to } => debug!("Waypoint {} -> {}", from, to),
                TrackerEvent::Drifting { cycles } => debug!("Drifting from waypoint for {} cycles", cycles),
                TrackerEvent::Approaching => {}
            }
        }

        let obstacles = self.obstacles.sample(&snapshot.link_poses);
        let waypoint = match self.state.phase {
            Phase::GlobalTrajectoryFollow => self.state.tracker.waypoint(&self.request.trajectory),
            _ => None,
        };
        let forces = match self.synthesizer.synthesize(&snapshot, &self.request.target, waypoint, &obstacles) {
            Ok(forces) => forces,
            Err(e) => {
                error!("Force synthesis failed in cycle {}: {}", iteration, e);
                self.enter(Phase::Failed);
                return Err(e);
            }
        };
        self.state.forces = forces;

        let velocities = self.velocities(&forces.total);
        if !velocities.iter().all(|v| v.is_finite()) {
            error!("Non finite velocities {:?} in cycle {}", velocities, iteration);
            self.enter(Phase::Failed);
            return Err(PlannerError::Precondition(format!(
                "Velocity command of cycle {} is not finite: {:?}",
                iteration, velocities
            )));
        }
        self.state.iter = iteration;

        let status = if iteration >= self.params.max_iter {
            warn!(
                "No convergence within {} cycles, position error {:.4}, orientation error {:.4}",
                self.params.max_iter, errors.position, errors.orientation
            );
            self.enter(Phase::IterationExhausted);
            CycleStatus::IterationExhausted
        } else {
            CycleStatus::Running
        };
        let command = self.emit(velocities, status)?;
        Ok(self.report(status, Some(command)))
    }
}

fn is_finite_pose(pose: &Pose) -> bool {
    pose.translation.vector.iter().all(|v| v.is_finite()) && pose.rotation.coords.iter().all(|v| v.is_finite())
}
