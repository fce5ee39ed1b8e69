//! OPW geometry of the reference robot model and a few concrete robots

use std::f64::consts::PI;

/// Geometric parameters of a six axis robot with a parallel base and spherical wrist.
/// The robot is at zero when all joints stick straight up in the air.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Offset along x between the axis of joint 1 and joint 2.
    pub a1: f64,

    /// Offset along x between joint 3 and the wrist (forearm elbow offset).
    pub a2: f64,

    /// Lateral offset along y, 0 for most robots.
    pub b: f64,

    /// Height of joint 2 above the base.
    pub c1: f64,

    /// Length of the upper arm (joint 2 to joint 3).
    pub c2: f64,

    /// Length of the forearm (joint 3 to the wrist center).
    pub c3: f64,

    /// Wrist center to flange.
    pub c4: f64,

    /// Subtracted from each joint value to bring it to the model zero.
    pub offsets: [f64; 6],

    /// Direction of positive rotation per joint, -1 reverses it.
    pub sign_corrections: [i8; 6],
}

#[allow(dead_code)]
impl Parameters {
    /// All lengths zero, no offsets, no sign corrections.
    pub fn new() -> Self {
        Parameters {
            a1: 0.0,
            a2: 0.0,
            b: 0.0,
            c1: 0.0,
            c2: 0.0,
            c3: 0.0,
            c4: 0.0,
            offsets: [0.0; 6],
            sign_corrections: [1; 6],
        }
    }

    pub fn irb2400_10() -> Self {
        Parameters {
            a1: 0.100,
            a2: -0.135,
            b: 0.000,
            c1: 0.615,
            c2: 0.705,
            c3: 0.755,
            c4: 0.085,
            offsets: [0.0, 0.0, -PI / 2.0, 0.0, 0.0, 0.0],
            ..Self::new()
        }
    }

    pub fn kuka_kr6_r700_sixx() -> Self {
        Parameters {
            a1: 0.025,
            a2: -0.035,
            b: 0.000,
            c1: 0.400,
            c2: 0.315,
            c3: 0.365,
            c4: 0.080,
            offsets: [0.0, -PI / 2.0, 0.0, 0.0, 0.0, 0.0],
            sign_corrections: [-1, 1, 1, -1, 1, -1],
        }
    }

    pub fn staubli_tx2_140() -> Self {
        Parameters {
            a1: 0.050,
            c1: 0.550,
            c2: 0.625,
            c3: 0.625,
            c4: 0.110,
            ..Self::new()
        }
    }

    /// Look up a preset by its name, as accepted on the command line.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "irb2400_10" => Some(Self::irb2400_10()),
            "kuka_kr6_r700_sixx" => Some(Self::kuka_kr6_r700_sixx()),
            "staubli_tx2_140" => Some(Self::staubli_tx2_140()),
            _ => None,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}
