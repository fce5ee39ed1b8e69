//! Simulated joint velocity controller: integrates the commands it receives and publishes
//! the resulting joint state back to the planner, as a real driver would.

use tracing::trace;

use crate::apf_planner::{CommandSink, VelocityCommand};
use crate::joint_state::JointStatePublisher;
use crate::kinematic_traits::Joints;

pub struct SimulatedController {
    publisher: JointStatePublisher,
    joints: Joints,
    /// Integration step, seconds per command.
    dt: f64,
    /// All commands received, oldest first.
    pub commands: Vec<VelocityCommand>,
}

impl SimulatedController {
    /// Publishes the initial joint state immediately.
    pub fn new(publisher: JointStatePublisher, initial: Joints, dt: f64) -> Self {
        publisher.publish(initial, [0.0; 6]);
        Self { publisher, joints: initial, dt, commands: Vec::new() }
    }

    pub fn joints(&self) -> &Joints {
        &self.joints
    }
}

impl CommandSink for SimulatedController {
    fn send(&mut self, command: &VelocityCommand) -> Result<(), String> {
        for (q, v) in self.joints.iter_mut().zip(command.velocities.iter()) {
            *q += v * self.dt;
        }
        trace!("Simulated joints {:?}", self.joints);
        self.publisher.publish(self.joints, command.velocities);
        self.commands.push(*command);
        Ok(())
    }
}
