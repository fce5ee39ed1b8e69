//! Errors that end an execution request. Non convergence and external stop are not
//! errors but outcomes, see `ExecutionOutcome`.

use thiserror::Error;
use crate::kinematic_traits::KinematicError;
use crate::parameter_error::ParameterError;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Malformed request, detected before or during the cycle.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Kinematic service did not deliver after all retries of the cycle.
    #[error("Kinematic service failed at iteration {iteration} after {attempts} attempts: {source}")]
    Kinematics {
        iteration: usize,
        attempts: usize,
        #[source]
        source: KinematicError,
    },

    /// No joint state arrived before the configured timeout.
    #[error("No joint state received within {0} ms")]
    JointStateTimeout(u64),

    #[error("Invalid parameters: {0}")]
    Parameters(#[from] ParameterError),

    /// The command sink refused the command.
    #[error("Command sink failed: {0}")]
    Sink(String),
}
