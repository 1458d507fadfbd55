//! Differential drive output
//!
//! [`MotorChannel`] stands in for one XRP motor: it clamps, applies the
//! mounting polarity and stops itself when it is not refreshed in time.
//! [`TeleopController`] owns a left and a right channel and turns key
//! strokes into [`MotorCommand`]s.

pub mod motor;
pub mod teleop;

pub use motor::{MotorChannel, MotorSettings};
pub use teleop::TeleopController;

use std::fmt::{self, Display};

/// Power for the left and right side, each within [-1.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommand {
    pub left: f64,
    pub right: f64,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand::new(0.0, 0.0);

    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }
}

impl Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(left {:+.2}, right {:+.2})", self.left, self.right)
    }
}

/// A single motor accepting a power setpoint
pub trait MotorOutput {
    /// Sets power in [-1.0, 1.0]; values outside are clamped
    fn set(&mut self, power: f64);

    /// Last power requested through [`MotorOutput::set`]
    fn get(&self) -> f64;

    fn stop(&mut self) {
        self.set(0.0);
    }
}
