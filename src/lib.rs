//! Keyboard teleoperation for the XRP differential-drive robot
//!
//! ```text
//! Keyboard ──► input::KeyInputReader ──► drive::TeleopController ──► left / right motor
//!                                              ▲
//!                      robot::RobotRunner (20 ms, per-mode hooks)
//! ```

pub mod config;
pub mod drive;
pub mod input;
pub mod robot;
