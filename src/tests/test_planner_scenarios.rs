use nalgebra::{Isometry3, Point3, Vector3};

use crate::apf_params::ApfParams;
use crate::apf_planner::{CommandFn, CycleStatus, ExecutionOutcome, ExecutionRequest, Phase, VelocityCommand};
use crate::forces::RepulsiveField;
use crate::kinematic_traits::{Kinematics, JOINTS_AT_ZERO};
use crate::obstacles::{NoObstacles, ObstacleSample};
use crate::tests::test_utils::{gantry_planner, is_zero, GantryRobot};
use crate::trajectory::Trajectory;

#[test]
fn test_already_at_target_converges_on_first_cycle() {
    let initial = [0.2, 0.1, 0.5, 0.0, 0.0, 0.0];
    let (planner, mut controller) = gantry_planner(ApfParams::default(), initial);
    let target = GantryRobot.forward(&initial);

    let outcome = planner
        .execute(ExecutionRequest::new(target, Trajectory::default()), &mut NoObstacles, &mut controller)
        .expect("Execution must not fail");

    assert_eq!(outcome, ExecutionOutcome::Converged { iterations: 1 });
    assert_eq!(controller.commands.len(), 1);
    let command = controller.commands[0];
    assert_eq!(command.status, CycleStatus::Converged);
    assert_eq!(command.iteration, 1);
    assert!(is_zero(&command.velocities));
}

#[test]
fn test_trajectory_followed_waypoint_by_waypoint() {
    let (planner, mut controller) = gantry_planner(ApfParams::default(), JOINTS_AT_ZERO);
    let start = GantryRobot.forward(&JOINTS_AT_ZERO);
    let target = Isometry3::translation(0.3, 0.0, 0.0);
    let trajectory = Trajectory::linear(&start, &target, 3);
    let mut obstacles = NoObstacles;

    let mut execution = planner
        .start(ExecutionRequest::new(target, trajectory), &mut obstacles, &mut controller)
        .expect("Joint state is published");
    assert_eq!(execution.state().phase, Phase::Init);

    let mut cursors = Vec::new();
    let mut phases = Vec::new();
    let mut iteration = 0;
    loop {
        let report = execution.step().expect("Cycle must not fail");
        assert_eq!(report.iteration, iteration + 1, "One cycle, one iteration");
        iteration = report.iteration;
        cursors.push(report.cursor);
        phases.push(report.phase);
        if report.status != CycleStatus::Running {
            break;
        }
    }

    assert!(cursors.windows(2).all(|pair| pair[0] <= pair[1]), "Cursor went back: {:?}", cursors);
    for waypoint in 0..=3 {
        assert!(cursors.contains(&waypoint), "Waypoint {} never tracked", waypoint);
    }
    assert_eq!(phases[0], Phase::GlobalTrajectoryFollow);
    assert!(phases.contains(&Phase::LocalApf));
    assert_eq!(execution.state().phase, Phase::Converged);
    assert!(matches!(execution.outcome(), Some(ExecutionOutcome::Converged { .. })));

    let errors = execution.state().errors.expect("Errors evaluated");
    assert!(errors.position <= ApfParams::default().target_err);
    drop(execution);

    let joints = controller.joints();
    assert!((joints[0] - 0.3).abs() <= ApfParams::default().target_err);
}

#[test]
fn test_obstacle_on_link_gives_bounded_repulsion() {
    let params = ApfParams::default();
    let initial = [0.2, 0.1, 0.5, 0.0, 0.0, 0.0];
    let (planner, mut controller) = gantry_planner(params.clone(), initial);
    let link = GantryRobot.forward_with_joint_poses(&initial)[2];
    let mut obstacles = vec![ObstacleSample::new(2, Point3::from(link.translation.vector))];
    let target = Isometry3::translation(0.2, 0.3, 0.5);

    let mut execution = planner
        .start(ExecutionRequest::new(target, Trajectory::default()), &mut obstacles, &mut controller)
        .expect("Joint state is published");
    let report = execution.step().expect("Cycle must not fail");

    let repulsive = report.forces.repulsive;
    assert!(repulsive.iter().all(|v| v.is_finite()));
    let bound = RepulsiveField {
        eta: params.obs_eta[2],
        alfa: params.obs_alfa[2],
        safety_distance: params.safety_distance,
        min_distance: params.min_obstacle_distance,
    }
    .magnitude(0.0);
    assert!(bound.is_finite() && bound > 0.0);
    assert!((repulsive.norm() - bound).abs() < 1e-6 * bound);

    let command = report.command.expect("Running cycle emits a command");
    assert!(command.velocities.iter().all(|v| v.is_finite() && v.abs() <= params.max_joint_velocity));
}

#[test]
fn test_single_cycle_budget_exhausted() {
    let params = ApfParams { max_iter: 1, ..ApfParams::default() };
    let (planner, mut controller) = gantry_planner(params, JOINTS_AT_ZERO);
    let target = Isometry3::translation(1.0, 0.0, 0.0);

    let outcome = planner
        .execute(ExecutionRequest::new(target, Trajectory::default()), &mut NoObstacles, &mut controller)
        .expect("Non convergence is an outcome");

    match outcome {
        ExecutionOutcome::IterationExhausted { iterations, errors } => {
            assert_eq!(iterations, 1);
            assert!((errors.position - 1.0).abs() < 1e-9);
        }
        other => panic!("Unexpected outcome {:?}", other),
    }
    assert_eq!(controller.commands.len(), 1);
    // The last cycle still moves towards the target, only the status differs
    let command = controller.commands[0];
    assert_eq!(command.status, CycleStatus::IterationExhausted);
    assert!(command.velocities[0] > 0.0);
    let limit = ApfParams::default().max_joint_velocity;
    assert!(command.velocities.iter().all(|v| v.is_finite() && v.abs() <= limit));
}

#[test]
fn test_stop_before_second_cycle() {
    let (planner, mut controller) = gantry_planner(ApfParams::default(), JOINTS_AT_ZERO);
    let target = Isometry3::translation(0.5, 0.0, 0.0);
    let stop = planner.stop_handle();
    let mut obstacles = NoObstacles;

    let mut execution = planner
        .start(ExecutionRequest::new(target, Trajectory::default()), &mut obstacles, &mut controller)
        .expect("Joint state is published");
    let first = execution.step().expect("First cycle");
    assert_eq!(first.status, CycleStatus::Running);
    assert_eq!(first.phase, Phase::LocalApf);

    stop.request_stop();
    let second = execution.step().expect("Stop cycle");
    assert_eq!(second.status, CycleStatus::Stopped);
    assert!(second.command.is_none());
    assert_eq!(second.iteration, 1);
    assert_eq!(execution.outcome(), Some(ExecutionOutcome::Stopped { iterations: 1 }));

    // Terminal: further steps change nothing
    let third = execution.step().expect("After stop");
    assert_eq!(third.status, CycleStatus::Stopped);
    assert_eq!(third.iteration, 1);
    drop(execution);

    assert_eq!(controller.commands.len(), 1);
    assert_eq!(controller.commands[0].iteration, 1);
    assert_eq!(controller.commands[0].status, CycleStatus::Running);
}

#[test]
fn test_stop_requested_from_sink() {
    let params = ApfParams::default();
    let (planner, controller) = gantry_planner(params, JOINTS_AT_ZERO);
    let stop = planner.stop_handle();
    let mut received = Vec::new();
    let mut sink = CommandFn(|command: &VelocityCommand| -> Result<(), String> {
        received.push(*command);
        if command.iteration == 3 {
            stop.request_stop();
        }
        Ok(())
    });
    let target = Isometry3::translation(0.0, 0.0, 1.0);

    let outcome = planner
        .execute(ExecutionRequest::new(target, Trajectory::default()), &mut NoObstacles, &mut sink)
        .expect("Stop is an outcome");
    drop(sink);

    assert_eq!(outcome, ExecutionOutcome::Stopped { iterations: 3 });
    assert_eq!(received.len(), 3);
    // The robot never moved, so every command pulls the same way
    assert!(received.iter().all(|command| command.velocities[2] > 0.0));
    assert_eq!(controller.joints(), &JOINTS_AT_ZERO);

    // Left over from the previous run, must not cancel the next one
    assert!(planner.stop_handle().is_stop_requested());
    let mut commands = Vec::new();
    let mut obstacles = NoObstacles;
    let mut execution = planner
        .start(ExecutionRequest::new(target, Trajectory::default()), &mut obstacles, &mut commands)
        .expect("Joint state is published");
    assert!(!planner.stop_handle().is_stop_requested());
    let report = execution.step().expect("First cycle");
    assert_eq!(report.status, CycleStatus::Running);
    assert_eq!(report.iteration, 1);
}

#[test]
fn test_stop_before_start_does_not_cancel() {
    let (planner, mut controller) = gantry_planner(ApfParams { max_iter: 3, ..ApfParams::default() }, JOINTS_AT_ZERO);
    planner.stop_handle().request_stop();
    let target = Isometry3::translation(0.5, 0.0, 0.0);

    let outcome = planner
        .execute(ExecutionRequest::new(target, Trajectory::default()), &mut NoObstacles, &mut controller)
        .expect("Outcome");
    assert!(matches!(outcome, ExecutionOutcome::IterationExhausted { iterations: 3, .. }));
    assert_eq!(controller.commands.len(), 3);
}

#[test]
fn test_lost_trajectory_falls_back_to_local_field() {
    let params = ApfParams { trajectory_patience: 2, ..ApfParams::default() };
    let (planner, mut controller) = gantry_planner(params, JOINTS_AT_ZERO);
    // The only waypoint is far off the way to the target and never comes within reach
    let trajectory = Trajectory::new(vec![Isometry3::translation(0.0, 0.5, 0.0)]);
    let target = Isometry3::translation(0.05, 0.0, 0.0);
    let mut obstacles = NoObstacles;

    let mut execution = planner
        .start(ExecutionRequest::new(target, trajectory), &mut obstacles, &mut controller)
        .expect("Joint state is published");

    let mut phases = Vec::new();
    for _ in 0..6 {
        let report = execution.step().expect("Cycle must not fail");
        assert_eq!(report.status, CycleStatus::Running);
        assert_eq!(report.cursor, 0, "Lost waypoint is never passed");
        phases.push(report.phase);
        if report.phase == Phase::LocalApf {
            assert_eq!(report.forces.trajectory_position.norm(), 0.0);
        }
    }

    let switch = phases
        .iter()
        .position(|phase| *phase == Phase::LocalApf)
        .expect("Trajectory must be given up");
    assert!(switch >= 2, "Patience not honored: {:?}", phases);
    assert!(phases[..switch].iter().all(|phase| *phase == Phase::GlobalTrajectoryFollow));
    assert!(phases[switch..].iter().all(|phase| *phase == Phase::LocalApf));
}

#[test]
fn test_iterations_bounded_by_budget() {
    let params = ApfParams { max_iter: 25, ..ApfParams::default() };
    let (planner, mut controller) = gantry_planner(params, JOINTS_AT_ZERO);
    let target = Isometry3::new(Vector3::new(2.0, -1.0, 0.5), Vector3::new(0.0, 0.0, 0.4));

    let outcome = planner
        .execute(ExecutionRequest::new(target, Trajectory::default()), &mut NoObstacles, &mut controller)
        .expect("Non convergence is an outcome");

    assert!(matches!(outcome, ExecutionOutcome::IterationExhausted { iterations: 25, .. }));
    assert_eq!(controller.commands.len(), 25);
    for (i, command) in controller.commands.iter().enumerate() {
        assert_eq!(command.iteration, i + 1);
    }
}

#[test]
fn test_goal_joints_required_for_convergence() {
    let initial = [0.2, 0.0, 0.0, 0.0, 0.0, 0.0];
    let (planner, mut controller) = gantry_planner(ApfParams { max_iter: 3, ..ApfParams::default() }, initial);
    let target = GantryRobot.forward(&initial);
    let request = ExecutionRequest {
        target,
        trajectory: Trajectory::default(),
        goal_joints: Some([0.2, 0.0, 0.0, 0.0, 0.0, 0.5]),
    };

    let outcome = planner.execute(request, &mut NoObstacles, &mut controller).expect("Outcome");
    match outcome {
        ExecutionOutcome::IterationExhausted { errors, .. } => {
            assert!(errors.position < 1e-12);
            assert!((errors.joint - 0.5).abs() < 1e-9);
        }
        other => panic!("Unexpected outcome {:?}", other),
    }
}
