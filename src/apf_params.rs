//! Parameters of the potential field planner. Constructed once at startup and immutable
//! while the planner runs.

#[cfg(feature = "allow_filesystem")]
use std::path::Path;

use crate::parameter_error::ParameterError;

/// Relative tolerance for the matched attractive gains.
const GAIN_MATCH_TOLERANCE: f64 = 1e-6;

/// Gains of the two regime attractive field, see `AttractiveField`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGains {
    /// Parabolic gain, force per unit of error inside the switch radius.
    pub zeta: f64,
    /// Conic force magnitude for position, outside `dist_att`.
    pub alfa: f64,
    /// Conic torque magnitude for orientation, outside `dist_att_config`.
    pub alfa_rot: f64,
    /// Switch radius of the position field (meters).
    pub dist_att: f64,
    /// Switch radius of the orientation field (radians).
    pub dist_att_config: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "allow_filesystem", derive(serde::Deserialize), serde(default))]
pub struct ApfParams {
    /// Cycle budget of one execution request.
    pub max_iter: usize,

    /// Obstacles further than this from a link do not repel it.
    pub safety_distance: f64,

    pub target_zeta: f64,
    pub target_alfa: f64,
    pub target_alfa_rot: f64,
    pub dist_att: f64,
    pub dist_att_config: f64,

    /// Position tolerance of the target (meters).
    pub target_err: f64,
    /// Orientation tolerance of the target (radians).
    pub target_err_ori: f64,
    /// Joint space tolerance, used when the request carries goal joints.
    pub joint_err: f64,

    pub trajectory_zeta: f64,
    pub tra_alfa: f64,
    pub tra_alfa_rot: f64,
    pub tra_dist_att: f64,
    pub tra_dist_att_config: f64,

    /// Losing the tracked waypoint beyond this radius hands over to the local field.
    pub global_trajectory_att_outer: f64,
    /// Reaching the tracked waypoint within this radius advances to the next one.
    pub global_trajectory_att_inner: f64,
    /// Cycles the end link may stay beyond the outer radius before the hand over.
    pub trajectory_patience: usize,

    /// Repulsive gain per tracked link.
    pub obs_eta: Vec<f64>,
    /// Repulsive falloff exponent per tracked link.
    pub obs_alfa: Vec<f64>,
    /// Obstacle distances below this are clamped to it.
    pub min_obstacle_distance: f64,

    /// Joint velocity per unit of generalized force.
    pub step_gain: f64,
    /// Per joint velocity limit of the emitted command (rad/s).
    pub max_joint_velocity: f64,

    /// Joint space force norm below which the robot is considered stuck.
    pub local_minimum_force: f64,
    /// Stuck cycles before a random perturbation is added.
    pub local_minimum_patience: usize,
    /// Amplitude of the random joint velocity perturbation, 0 disables it.
    pub random_perturbation: f64,

    /// Longest wait for the first joint state sample.
    pub joint_state_timeout_ms: u64,
    /// Pause between cycles, 0 runs cycles back to back.
    pub cycle_period_ms: u64,
    /// Additional attempts of the kinematic queries within one cycle.
    pub service_retries: usize,
    /// Joint perturbation for numerical Jacobians.
    pub jacobian_epsilon: f64,
}

impl Default for ApfParams {
    fn default() -> Self {
        ApfParams {
            max_iter: 2000,
            safety_distance: 0.15,
            target_zeta: 1.0,
            target_alfa: 0.2,
            target_alfa_rot: 0.5,
            dist_att: 0.2,
            dist_att_config: 0.5,
            target_err: 0.005,
            target_err_ori: 0.02,
            joint_err: 0.01,
            trajectory_zeta: 1.5,
            tra_alfa: 0.15,
            tra_alfa_rot: 0.45,
            tra_dist_att: 0.1,
            tra_dist_att_config: 0.3,
            global_trajectory_att_outer: 0.15,
            global_trajectory_att_inner: 0.03,
            trajectory_patience: 20,
            obs_eta: vec![0.002; 6],
            obs_alfa: vec![2.0; 6],
            min_obstacle_distance: 0.005,
            step_gain: 1.0,
            max_joint_velocity: 1.0,
            local_minimum_force: 1e-4,
            local_minimum_patience: 50,
            random_perturbation: 0.0,
            joint_state_timeout_ms: 1000,
            cycle_period_ms: 0,
            service_retries: 2,
            jacobian_epsilon: 1e-6,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidValue { field, reason: format!("must be finite and positive (got {})", value) })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidValue { field, reason: format!("must be finite and not negative (got {})", value) })
    }
}

fn matched(field: &'static str, zeta: f64, radius: f64, alfa: f64) -> Result<(), ParameterError> {
    let inner = zeta * radius;
    if (inner - alfa).abs() <= GAIN_MATCH_TOLERANCE * inner.abs().max(alfa.abs()) {
        Ok(())
    } else {
        Err(ParameterError::MismatchedGains { field, inner, outer: alfa })
    }
}

impl ApfParams {
    pub fn target_gains(&self) -> FieldGains {
        FieldGains {
            zeta: self.target_zeta,
            alfa: self.target_alfa,
            alfa_rot: self.target_alfa_rot,
            dist_att: self.dist_att,
            dist_att_config: self.dist_att_config,
        }
    }

    pub fn trajectory_gains(&self) -> FieldGains {
        FieldGains {
            zeta: self.trajectory_zeta,
            alfa: self.tra_alfa,
            alfa_rot: self.tra_alfa_rot,
            dist_att: self.tra_dist_att,
            dist_att_config: self.tra_dist_att_config,
        }
    }

    /// Checks the parameters for the robot with the given number of tracked links.
    pub fn validate(&self, links: usize) -> Result<(), ParameterError> {
        if self.max_iter == 0 {
            return Err(ParameterError::InvalidValue { field: "max_iter", reason: "must be at least 1".into() });
        }
        positive("safety_distance", self.safety_distance)?;
        positive("min_obstacle_distance", self.min_obstacle_distance)?;
        if self.min_obstacle_distance >= self.safety_distance {
            return Err(ParameterError::InvalidValue {
                field: "min_obstacle_distance",
                reason: format!("must be below safety_distance {}", self.safety_distance),
            });
        }

        for (name, gains) in [("target", self.target_gains()), ("trajectory", self.trajectory_gains())] {
            positive("zeta", gains.zeta)?;
            positive("dist_att", gains.dist_att)?;
            positive("dist_att_config", gains.dist_att_config)?;
            matched(name, gains.zeta, gains.dist_att, gains.alfa)?;
            matched(name, gains.zeta, gains.dist_att_config, gains.alfa_rot)?;
        }

        positive("target_err", self.target_err)?;
        positive("target_err_ori", self.target_err_ori)?;
        positive("joint_err", self.joint_err)?;
        positive("global_trajectory_att_inner", self.global_trajectory_att_inner)?;
        if self.global_trajectory_att_inner >= self.global_trajectory_att_outer {
            return Err(ParameterError::InvalidValue {
                field: "global_trajectory_att_inner",
                reason: format!("must be below global_trajectory_att_outer {}", self.global_trajectory_att_outer),
            });
        }

        for (field, values) in [("obs_eta", &self.obs_eta), ("obs_alfa", &self.obs_alfa)] {
            if values.len() != links {
                return Err(ParameterError::InvalidLength { field, expected: links, found: values.len() });
            }
            for &value in values.iter() {
                non_negative(field, value)?;
            }
        }

        positive("step_gain", self.step_gain)?;
        positive("max_joint_velocity", self.max_joint_velocity)?;
        non_negative("local_minimum_force", self.local_minimum_force)?;
        non_negative("random_perturbation", self.random_perturbation)?;
        positive("jacobian_epsilon", self.jacobian_epsilon)?;
        Ok(())
    }

    /// Read the planner parameters from YAML. Missing fields take their default values:
    /// ```yaml
    /// max_iter: 3000
    /// safety_distance: 0.2
    /// target_zeta: 2.0
    /// target_alfa: 0.4
    /// target_alfa_rot: 1.0
    /// obs_eta: [0.0, 0.001, 0.002, 0.002, 0.003, 0.003]
    /// ```
    #[cfg(feature = "allow_filesystem")]
    pub fn from_yaml(contents: &str) -> Result<Self, ParameterError> {
        serde_saphyr::from_str(contents).map_err(|e| ParameterError::ParseError(format!("{}", e)))
    }

    #[cfg(feature = "allow_filesystem")]
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }
}
