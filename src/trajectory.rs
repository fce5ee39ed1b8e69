//! Reference trajectory and the cursor tracking the waypoint currently followed.

use tracing::{debug, info};

use crate::apf_params::ApfParams;
use crate::geometry::distance;
use crate::kinematic_traits::Pose;

/// Precomputed global path as an ordered sequence of end link poses. Never modified
/// while the planner runs; progress along it is kept by the `TrajectoryTracker`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    waypoints: Vec<Pose>,
}

impl Trajectory {
    pub fn new(waypoints: Vec<Pose>) -> Self {
        Self { waypoints }
    }

    /// Straight line from `from` to `to` with `steps` waypoints after `from`, the last one
    /// being `to`. Orientation is interpolated spherically.
    pub fn linear(from: &Pose, to: &Pose, steps: usize) -> Self {
        let waypoints = (1..=steps)
            .map(|i| from.lerp_slerp(to, i as f64 / steps as f64))
            .collect();
        Self { waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pose> {
        self.waypoints.get(index)
    }

    pub fn waypoints(&self) -> &[Pose] {
        &self.waypoints
    }
}

/// What happened to the tracked waypoint in one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Between the inner and outer radius, still heading for the waypoint.
    Approaching,
    /// Inner radius reached, cursor moved on by one.
    Advanced { from: usize, to: usize },
    /// Beyond the outer radius for the given number of consecutive cycles.
    Drifting { cycles: usize },
    /// Beyond the outer radius for longer than the patience.
    Lost,
    /// Cursor has passed the last waypoint.
    Exhausted,
}

/// Keeps the index of the waypoint being followed. The index only moves forward, by at
/// most one waypoint per update. The inner and outer radius form a hysteresis band.
#[derive(Debug, Clone)]
pub struct TrajectoryTracker {
    cursor: usize,
    lost_cycles: usize,
    inner: f64,
    outer: f64,
    patience: usize,
}

impl TrajectoryTracker {
    pub fn new(params: &ApfParams) -> Self {
        Self {
            cursor: 0,
            lost_cycles: 0,
            inner: params.global_trajectory_att_inner,
            outer: params.global_trajectory_att_outer,
            patience: params.trajectory_patience,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self, trajectory: &Trajectory) -> bool {
        self.cursor >= trajectory.len()
    }

    /// Waypoint at the cursor, if any remains.
    pub fn waypoint<'a>(&self, trajectory: &'a Trajectory) -> Option<&'a Pose> {
        trajectory.get(self.cursor)
    }

    /// Waypoint at the cursor if the end link is within the outer radius of it.
    pub fn nearby_waypoint<'a>(&self, trajectory: &'a Trajectory, end_pose: &Pose) -> Option<&'a Pose> {
        self.waypoint(trajectory)
            .filter(|waypoint| distance(*waypoint, end_pose) <= self.outer)
    }

    pub fn update(&mut self, trajectory: &Trajectory, end_pose: &Pose) -> TrackerEvent {
        let Some(waypoint) = self.waypoint(trajectory) else {
            return TrackerEvent::Exhausted;
        };

        if distance(waypoint, end_pose) < self.inner {
            let from = self.cursor;
            self.cursor += 1;
            self.lost_cycles = 0;
            if self.is_exhausted(trajectory) {
                info!("Last waypoint {} reached, trajectory exhausted", from);
                return TrackerEvent::Exhausted;
            }
            debug!("Waypoint {} reached, following {}", from, self.cursor);
            return TrackerEvent::Advanced { from, to: self.cursor };
        }

        if self.nearby_waypoint(trajectory, end_pose).is_some() {
            self.lost_cycles = 0;
            return TrackerEvent::Approaching;
        }

        self.lost_cycles += 1;
        if self.lost_cycles > self.patience {
            info!("Waypoint {} lost for {} cycles", self.cursor, self.lost_cycles);
            TrackerEvent::Lost
        } else {
            TrackerEvent::Drifting { cycles: self.lost_cycles }
        }
    }
}
