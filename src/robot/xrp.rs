//! The XRP: keyboard teleop on a two-motor differential drive

use crate::config::Config;
use crate::drive::{MotorChannel, MotorCommand, TeleopController};
use crate::input::{KeyInputReader, KeySource};
use crate::robot::Robot;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Elapsed time since start or the last reset
#[derive(Debug, Clone)]
pub struct MatchTimer {
    started: Instant,
    started_at: DateTime<Local>,
}

impl MatchTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Local::now(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::start();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

pub struct XrpRobot<S: KeySource> {
    teleop: TeleopController<S, MotorChannel>,
    timer: MatchTimer,
    shutdown: CancellationToken,
    last_command: Option<MotorCommand>,
}

impl<S: KeySource> XrpRobot<S> {
    pub fn new(
        teleop: TeleopController<S, MotorChannel>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            teleop,
            timer: MatchTimer::start(),
            shutdown,
            last_command: None,
        }
    }

    /// Left motor on channel 0, right motor on channel 1
    pub fn from_config(source: S, config: &Config, shutdown: CancellationToken) -> Self {
        let reader = KeyInputReader::new(source, config.teleop.key_check);
        let left = MotorChannel::new("left", config.motors.left());
        let right = MotorChannel::new("right", config.motors.right());
        Self::new(TeleopController::new(reader, left, right), shutdown)
    }

    pub fn teleop(&self) -> &TeleopController<S, MotorChannel> {
        &self.teleop
    }

    pub fn teleop_mut(&mut self) -> &mut TeleopController<S, MotorChannel> {
        &mut self.teleop
    }

    pub fn timer(&self) -> &MatchTimer {
        &self.timer
    }

    fn idle_input(&mut self) {
        self.teleop.reader_mut().source_mut().idle();
    }
}

impl<S: KeySource> Robot for XrpRobot<S> {
    fn robot_init(&mut self) {
        let (left, right) = self.teleop.motors();
        info!(
            "XRP ready: left inverted {}, right inverted {}, key check {}",
            left.is_inverted(),
            right.is_inverted(),
            self.teleop.reader().check()
        );
    }

    fn robot_periodic(&mut self) {
        let now = Instant::now();
        let (left, right) = self.teleop.motors_mut();
        let left_expired = left.check_expiration(now);
        let right_expired = right.check_expiration(now);
        if left_expired || right_expired {
            self.last_command = None;
        }
    }

    fn robot_shutdown(&mut self) {
        self.teleop.stop();
        info!("XRP shut down, motors stopped");
    }

    fn disabled_init(&mut self) {
        self.teleop.stop();
    }

    fn disabled_periodic(&mut self) {
        self.idle_input();
    }

    fn autonomous_init(&mut self) {
        info!("No autonomous routine configured");
        self.teleop.stop();
    }

    fn autonomous_periodic(&mut self) {
        self.idle_input();
    }

    fn teleop_init(&mut self) {
        self.timer.reset();
        self.last_command = None;
        info!(
            "Teleop enabled at {}: W/S drive, E/R pivot",
            self.timer.started_at().format("%H:%M:%S.%3f")
        );
    }

    fn teleop_periodic(&mut self) {
        if let Some(command) = self.teleop.step() {
            if self.last_command != Some(command) {
                debug!("Drive command {}", command);
                self.last_command = Some(command);
            }
        }

        if self.teleop.reader().source().is_exhausted() && !self.shutdown.is_cancelled() {
            info!("Key source exhausted, stopping");
            self.shutdown.cancel();
        }
    }

    fn teleop_exit(&mut self) {
        self.teleop.stop();
        info!(
            "Teleop ran for {:.1}s",
            self.timer.elapsed().as_secs_f64()
        );
    }

    fn test_init(&mut self) {
        self.teleop.stop();
    }

    fn test_periodic(&mut self) {
        self.idle_input();
    }
}
