use crate::input::InputError;
use thiserror::Error;

/// Errors raised while building or running the robot host
#[derive(Debug, Error)]
pub enum RobotError {
    #[error("Invalid loop period: {0:?}")]
    InvalidPeriod(std::time::Duration),

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}
