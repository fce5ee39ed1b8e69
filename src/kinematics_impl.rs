//! Forward kinematics of the OPW robot, including the poses of the intermediate links.

use crate::kinematic_traits::{Joints, Kinematics, Pose};
use crate::parameters::Parameters;
use nalgebra::{Translation3, UnitQuaternion, Vector3};

#[derive(Debug, Clone, Copy)]
pub struct OPWKinematics {
    parameters: Parameters,
}

impl OPWKinematics {
    /// Creates a new `OPWKinematics` instance with the given parameters.
    pub fn new(parameters: Parameters) -> Self {
        OPWKinematics { parameters }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Joint values in the model convention (sign corrections and offsets applied).
    fn model_joints(&self, joints: &Joints) -> Joints {
        let p = &self.parameters;
        std::array::from_fn(|i| joints[i] * p.sign_corrections[i] as f64 - p.offsets[i])
    }
}

fn about_z(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle)
}

fn about_y(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}

impl Kinematics for OPWKinematics {
    fn forward(&self, joints: &Joints) -> Pose {
        self.forward_with_joint_poses(joints)[5]
    }

    fn forward_with_joint_poses(&self, joints: &Joints) -> [Pose; 6] {
        let p = &self.parameters;
        let q = self.model_joints(joints);

        // Link orientations: J1, J4, J6 rotate about local z, J2, J3, J5 about local y.
        let r1 = about_z(q[0]);
        let r2 = r1 * about_y(q[1]);
        let r3 = r2 * about_y(q[2]);
        let r4 = r3 * about_z(q[3]);
        let r5 = r4 * about_y(q[4]);
        let r6 = r5 * about_z(q[5]);

        let p1 = Vector3::new(0.0, 0.0, p.c1);
        let p2 = p1 + r1 * Vector3::new(p.a1, 0.0, 0.0);
        let p3 = p2 + r1 * Vector3::new(0.0, p.b, 0.0) + r2 * Vector3::new(0.0, 0.0, p.c2);
        let p4 = p3 + r3 * Vector3::new(p.a2, 0.0, 0.0);
        let p5 = p4 + r3 * Vector3::new(0.0, 0.0, p.c3);
        let p6 = p5 + r6 * Vector3::new(0.0, 0.0, p.c4);

        [
            Pose::from_parts(Translation3::from(p1), r1),
            Pose::from_parts(Translation3::from(p2), r2),
            Pose::from_parts(Translation3::from(p3), r3),
            Pose::from_parts(Translation3::from(p4), r4),
            Pose::from_parts(Translation3::from(p5), r5),
            Pose::from_parts(Translation3::from(p6), r6),
        ]
    }
}
