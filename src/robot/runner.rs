//! Fixed-period runner driving a [`Robot`] through its lifecycle
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopped
//!   (start)        (run, until shutdown is cancelled)
//! ```

use crate::robot::{enter_mode, exit_mode, run_mode, Robot, RobotError, RobotMode};
use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Period the robot framework uses for all modes
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(20);

#[state]
#[derive(Debug, Clone)]
pub enum RunnerState {
    Configured,
    Running,
    Stopped,
}

#[machine]
pub struct RobotRunner<S: RunnerState> {
    period: Duration,
    mode_receiver: watch::Receiver<RobotMode>,
    shutdown: CancellationToken,
    ticks: u64,
    overruns: u64,
    current_mode: Option<RobotMode>,
}

impl<S: RunnerState> RobotRunner<S> {
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks whose hooks took longer than one period
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

impl RobotRunner<Configured> {
    pub fn create(
        period: Duration,
        mode_receiver: watch::Receiver<RobotMode>,
        shutdown: CancellationToken,
    ) -> Result<Self, RobotError> {
        if period.is_zero() {
            return Err(RobotError::InvalidPeriod(period));
        }
        debug!("Creating robot runner with {}ms period", period.as_millis());
        Ok(Self::new(period, mode_receiver, shutdown, 0, 0, None))
    }

    /// Runs `robot_init` and hands over to the loop
    pub fn start<R: Robot + ?Sized>(self, robot: &mut R) -> RobotRunner<Running> {
        info!("Robot init");
        robot.robot_init();
        self.transition()
    }
}

impl RobotRunner<Running> {
    /// Ticks until the shutdown token is cancelled
    ///
    /// On every tick the current mode is read; a change runs the old mode's
    /// exit hook and the new mode's init hook before the periodic hooks.
    /// Missed ticks are skipped rather than bunched up.
    pub async fn run<R: Robot + ?Sized>(mut self, robot: &mut R) -> RobotRunner<Stopped> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.shutdown.clone();
        info!("Robot loop running every {}ms", self.period.as_millis());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => self.tick(robot),
            }
        }

        if let Some(mode) = self.current_mode.take() {
            exit_mode(robot, mode);
        }
        robot.robot_shutdown();
        info!(
            "Robot loop stopped after {} ticks ({} overruns)",
            self.ticks, self.overruns
        );
        self.transition()
    }

    fn tick<R: Robot + ?Sized>(&mut self, robot: &mut R) {
        let started = Instant::now();
        let mode = *self.mode_receiver.borrow_and_update();

        if self.current_mode != Some(mode) {
            match self.current_mode {
                Some(previous) => {
                    info!(
                        "Mode {} -> {} at {}",
                        previous,
                        mode,
                        Local::now().format("%H:%M:%S.%3f")
                    );
                    exit_mode(robot, previous);
                }
                None => info!("Entering {} mode", mode),
            }
            enter_mode(robot, mode);
            self.current_mode = Some(mode);
        }

        run_mode(robot, mode);
        robot.robot_periodic();
        self.ticks += 1;

        let took = started.elapsed();
        if took > self.period {
            self.overruns += 1;
            warn!(
                "Loop overrun: tick {} took {}ms",
                self.ticks,
                took.as_millis()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<&'static str>,
    }

    impl Recorder {
        fn count(&self, name: &str) -> usize {
            self.events.iter().filter(|e| **e == name).count()
        }

        fn position(&self, name: &str) -> Option<usize> {
            self.events.iter().position(|e| *e == name)
        }
    }

    impl Robot for Recorder {
        fn robot_init(&mut self) {
            self.events.push("robot_init");
        }
        fn robot_periodic(&mut self) {
            self.events.push("robot_periodic");
        }
        fn robot_shutdown(&mut self) {
            self.events.push("robot_shutdown");
        }
        fn disabled_init(&mut self) {
            self.events.push("disabled_init");
        }
        fn disabled_periodic(&mut self) {
            self.events.push("disabled_periodic");
        }
        fn disabled_exit(&mut self) {
            self.events.push("disabled_exit");
        }
        fn teleop_init(&mut self) {
            self.events.push("teleop_init");
        }
        fn teleop_periodic(&mut self) {
            self.events.push("teleop_periodic");
        }
        fn teleop_exit(&mut self) {
            self.events.push("teleop_exit");
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        let (_tx, rx) = watch::channel(RobotMode::Disabled);
        let result = RobotRunner::create(Duration::ZERO, rx, CancellationToken::new());
        assert!(matches!(result, Err(RobotError::InvalidPeriod(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_hooks_per_mode_until_cancelled() {
        let (mode_tx, mode_rx) = watch::channel(RobotMode::Disabled);
        let shutdown = CancellationToken::new();
        let runner = RobotRunner::create(DEFAULT_PERIOD, mode_rx, shutdown.clone())
            .expect("valid period");
        let mut robot = Recorder::default();

        let running = runner.start(&mut robot);
        let (stopped, _) = tokio::join!(running.run(&mut robot), async {
            sleep(Duration::from_millis(50)).await;
            mode_tx.send(RobotMode::Teleop).expect("runner holds receiver");
            sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });

        assert_eq!(robot.events.first(), Some(&"robot_init"));
        assert_eq!(robot.events.last(), Some(&"robot_shutdown"));
        assert_eq!(robot.count("disabled_init"), 1);
        assert_eq!(robot.count("disabled_exit"), 1);
        assert_eq!(robot.count("teleop_init"), 1);
        assert_eq!(robot.count("teleop_exit"), 1);
        assert!(robot.count("disabled_periodic") >= 2);
        assert!(robot.count("teleop_periodic") >= 2);
        assert_eq!(
            robot.count("robot_periodic"),
            robot.count("disabled_periodic") + robot.count("teleop_periodic")
        );
        assert_eq!(stopped.ticks() as usize, robot.count("robot_periodic"));

        let disabled_exit = robot.position("disabled_exit").expect("exit recorded");
        let teleop_init = robot.position("teleop_init").expect("init recorded");
        let first_teleop_tick = robot.position("teleop_periodic").expect("tick recorded");
        assert!(disabled_exit < teleop_init);
        assert!(teleop_init < first_teleop_tick);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_tick_only_runs_init_and_shutdown() {
        let (_mode_tx, mode_rx) = watch::channel(RobotMode::Teleop);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let runner =
            RobotRunner::create(DEFAULT_PERIOD, mode_rx, shutdown).expect("valid period");
        let mut robot = Recorder::default();

        let stopped = runner.start(&mut robot).run(&mut robot).await;

        assert_eq!(robot.events, vec!["robot_init", "robot_shutdown"]);
        assert_eq!(stopped.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_the_period() {
        let (_mode_tx, mode_rx) = watch::channel(RobotMode::Disabled);
        let shutdown = CancellationToken::new();
        let runner = RobotRunner::create(DEFAULT_PERIOD, mode_rx, shutdown.clone())
            .expect("valid period");
        let mut robot = Recorder::default();

        let running = runner.start(&mut robot);
        let (stopped, _) = tokio::join!(running.run(&mut robot), async {
            // ticks at 0, 20, ..., 200 ms
            sleep(Duration::from_millis(210)).await;
            shutdown.cancel();
        });

        assert_eq!(stopped.ticks(), 11);
        assert_eq!(stopped.overruns(), 0);
    }
}
