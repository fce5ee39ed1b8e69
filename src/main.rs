use anyhow::{anyhow, Context, Result};
use clap::Parser;
use nalgebra::Translation3;
use tracing::Level;

use rs_apf_planner::apf_params::ApfParams;
use rs_apf_planner::apf_planner::{ApfLocalPlanner, ExecutionOutcome, ExecutionRequest};
use rs_apf_planner::joint_state::JointStateChannel;
use rs_apf_planner::kinematic_state::RobotKinematicService;
use rs_apf_planner::kinematic_traits::{Joints, Kinematics};
use rs_apf_planner::kinematics_impl::OPWKinematics;
use rs_apf_planner::obstacles::{NoObstacles, ObstacleSource};
use rs_apf_planner::parameters::Parameters;
use rs_apf_planner::simulation::SimulatedController;
use rs_apf_planner::trajectory::Trajectory;

#[cfg(feature = "collisions")]
use rs_apf_planner::scene_obstacles::SceneObstacles;

/// Moves a simulated robot from the given joint position by a Cartesian offset of the
/// flange, following a straight reference trajectory and avoiding an optional sphere.
#[derive(Parser, Debug)]
#[command(name = "apf_demo", version, about)]
struct Args {
    /// Robot model: irb2400_10, kuka_kr6_r700_sixx or staubli_tx2_140
    #[arg(long, default_value = "irb2400_10")]
    robot: String,

    /// YAML file with planner parameters, defaults are used if not given
    #[arg(long)]
    params: Option<String>,

    /// Initial joint values in degrees, comma separated
    #[arg(long, value_delimiter = ',', num_args = 6, default_values_t = [0.0, 20.0, 10.0, 0.0, 40.0, 0.0])]
    joints: Vec<f64>,

    /// Flange offset to reach, meters, comma separated x,y,z
    #[arg(long, value_delimiter = ',', num_args = 3, default_values_t = [0.1, 0.05, -0.05])]
    offset: Vec<f64>,

    /// Waypoints of the reference trajectory, 0 for local planning only
    #[arg(long, default_value_t = 5)]
    waypoints: usize,

    /// Spherical obstacle x,y,z,radius in meters
    #[cfg(feature = "collisions")]
    #[arg(long, value_delimiter = ',', num_args = 4)]
    sphere: Option<Vec<f64>>,

    /// Override of the cycle budget
    #[arg(long)]
    max_iter: Option<usize>,

    /// Simulated controller time step, seconds
    #[arg(long, default_value_t = 0.05)]
    dt: f64,

    /// Log every cycle
    #[arg(short, long)]
    verbose: bool,
}

fn obstacles(args: &Args, safety_distance: f64) -> Box<dyn ObstacleSource> {
    #[cfg(feature = "collisions")] {
        if let Some(sphere) = &args.sphere {
            let mut scene = SceneObstacles::new(safety_distance);
            scene.add_sphere(nalgebra::Point3::new(sphere[0], sphere[1], sphere[2]), sphere[3]);
            return Box::new(scene);
        }
    }
    let _ = (args, safety_distance);
    Box::new(NoObstacles)
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let parameters = Parameters::by_name(&args.robot).ok_or_else(|| anyhow!("Unknown robot '{}'", args.robot))?;
    let mut params = match &args.params {
        Some(path) => ApfParams::from_yaml_file(path).with_context(|| format!("Reading {}", path))?,
        None => ApfParams::default(),
    };
    if let Some(max_iter) = args.max_iter {
        params.max_iter = max_iter;
    }

    let initial: Joints = std::array::from_fn(|i| args.joints[i].to_radians());
    let robot = OPWKinematics::new(parameters);
    let start = robot.forward(&initial);
    let target = Translation3::new(args.offset[0], args.offset[1], args.offset[2]) * start;
    let trajectory = if args.waypoints > 0 {
        Trajectory::linear(&start, &target, args.waypoints)
    } else {
        Trajectory::default()
    };
    tracing::info!(
        "Moving {} from {:?} to {:?}",
        args.robot,
        start.translation.vector.as_slice(),
        target.translation.vector.as_slice()
    );

    let mut obstacles = obstacles(&args, params.safety_distance);
    let channel = JointStateChannel::new();
    let mut controller = SimulatedController::new(channel.publisher(), initial, args.dt);
    let service = RobotKinematicService::new(robot, params.jacobian_epsilon);
    let planner = ApfLocalPlanner::new(params, service, channel)?;

    let outcome = planner.execute(ExecutionRequest::new(target, trajectory), obstacles.as_mut(), &mut controller)?;
    let reached = planner.service().robot.forward(controller.joints());
    let degrees: Vec<String> = controller.joints().iter().map(|q| format!("{:.2}", q.to_degrees())).collect();

    match outcome {
        ExecutionOutcome::Converged { iterations } => println!("Converged after {} cycles", iterations),
        ExecutionOutcome::IterationExhausted { iterations, errors } => println!(
            "Not converged after {} cycles, position error {:.4} m, orientation error {:.4} rad",
            iterations, errors.position, errors.orientation
        ),
        ExecutionOutcome::Stopped { iterations } => println!("Stopped after {} cycles", iterations),
    }
    println!("Joints: [{}]", degrees.join(", "));
    println!("Flange: {:?}", reached.translation.vector.as_slice());
    Ok(())
}
