//! Single slot channel carrying the latest joint state from the feedback producer to the
//! planning loop. The producer overwrites the slot, the planner takes a consistent
//! snapshot of it once per cycle.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::kinematic_traits::Joints;

/// One complete feedback sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    pub positions: Joints,
    pub velocities: Joints,
    /// Increases with every published sample.
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct Slot {
    latest: Mutex<Option<JointState>>,
    arrived: Condvar,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<JointState>> {
        // The slot only ever holds a complete sample, so it stays usable after a panic
        // on the other side.
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Reading side, owned by the planner.
#[derive(Debug, Clone, Default)]
pub struct JointStateChannel {
    slot: Arc<Slot>,
}

/// Writing side, handed to the feedback producer (for instance a driver thread).
#[derive(Debug, Clone)]
pub struct JointStatePublisher {
    slot: Arc<Slot>,
}

impl JointStateChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> JointStatePublisher {
        JointStatePublisher { slot: Arc::clone(&self.slot) }
    }

    /// Latest complete sample, if any has arrived.
    pub fn snapshot(&self) -> Option<JointState> {
        *self.slot.lock()
    }

    /// Latest sample, waiting up to `timeout` for the first one. Returns `None` on timeout.
    pub fn wait_for_sample(&self, timeout: Duration) -> Option<JointState> {
        let guard = self.slot.lock();
        let (guard, _) = self
            .slot
            .arrived
            .wait_timeout_while(guard, timeout, |latest| latest.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
}

impl JointStatePublisher {
    pub fn publish(&self, positions: Joints, velocities: Joints) {
        let mut latest = self.slot.lock();
        let sequence = latest.map_or(0, |state| state.sequence + 1);
        *latest = Some(JointState { positions, velocities, sequence });
        drop(latest);
        self.slot.arrived.notify_all();
    }
}
