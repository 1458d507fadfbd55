//! Robot lifecycle host
//!
//! Stands in for the robot framework: a [`Robot`] exposes init, periodic and
//! exit hooks per mode, and [`runner::RobotRunner`] calls them on a fixed
//! period.
//!
//! ```text
//! mode (watch) ──► RobotRunner ──► *_init / *_periodic / *_exit ──► Robot
//!                  (20 ms tick)    robot_periodic (every tick)
//! ```

pub mod error;
pub mod host;
pub mod runner;
pub mod xrp;

pub use error::RobotError;
pub use runner::RobotRunner;
pub use xrp::XrpRobot;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Operating mode selected by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotMode {
    #[default]
    Disabled,
    Autonomous,
    Teleop,
    Test,
}

impl Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotMode::Disabled => write!(f, "disabled"),
            RobotMode::Autonomous => write!(f, "autonomous"),
            RobotMode::Teleop => write!(f, "teleop"),
            RobotMode::Test => write!(f, "test"),
        }
    }
}

/// Lifecycle hooks, all optional
///
/// `robot_periodic` runs on every tick after the mode's own periodic hook.
/// Hooks are called from the runner's loop and must return well within one
/// period.
pub trait Robot {
    fn robot_init(&mut self) {}
    fn robot_periodic(&mut self) {}
    fn robot_shutdown(&mut self) {}

    fn disabled_init(&mut self) {}
    fn disabled_periodic(&mut self) {}
    fn disabled_exit(&mut self) {}

    fn autonomous_init(&mut self) {}
    fn autonomous_periodic(&mut self) {}
    fn autonomous_exit(&mut self) {}

    fn teleop_init(&mut self) {}
    fn teleop_periodic(&mut self) {}
    fn teleop_exit(&mut self) {}

    fn test_init(&mut self) {}
    fn test_periodic(&mut self) {}
    fn test_exit(&mut self) {}
}

/// Calls the init hook for `mode`
pub(crate) fn enter_mode<R: Robot + ?Sized>(robot: &mut R, mode: RobotMode) {
    match mode {
        RobotMode::Disabled => robot.disabled_init(),
        RobotMode::Autonomous => robot.autonomous_init(),
        RobotMode::Teleop => robot.teleop_init(),
        RobotMode::Test => robot.test_init(),
    }
}

pub(crate) fn run_mode<R: Robot + ?Sized>(robot: &mut R, mode: RobotMode) {
    match mode {
        RobotMode::Disabled => robot.disabled_periodic(),
        RobotMode::Autonomous => robot.autonomous_periodic(),
        RobotMode::Teleop => robot.teleop_periodic(),
        RobotMode::Test => robot.test_periodic(),
    }
}

pub(crate) fn exit_mode<R: Robot + ?Sized>(robot: &mut R, mode: RobotMode) {
    match mode {
        RobotMode::Disabled => robot.disabled_exit(),
        RobotMode::Autonomous => robot.autonomous_exit(),
        RobotMode::Teleop => robot.teleop_exit(),
        RobotMode::Test => robot.test_exit(),
    }
}
