//! Simulated motor channel with polarity and expiration

use crate::drive::MotorOutput;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Per-channel settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSettings {
    /// Reverse polarity to compensate for mounting direction
    pub inverted: bool,
    /// Output drops to zero when not set again within this interval
    pub expiration: Duration,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            inverted: false,
            expiration: Duration::from_millis(100),
        }
    }
}

/// One motor output
///
/// `get` reports the requested power, `applied` the power after the
/// polarity flip. Nothing is sent anywhere; applied output is traced.
#[derive(Debug, Clone)]
pub struct MotorChannel {
    name: String,
    settings: MotorSettings,
    requested: f64,
    last_set: Option<Instant>,
    expired: bool,
}

impl MotorChannel {
    pub fn new(name: impl Into<String>, settings: MotorSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            requested: 0.0,
            last_set: None,
            expired: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_inverted(&self) -> bool {
        self.settings.inverted
    }

    /// Power after the polarity flip
    pub fn applied(&self) -> f64 {
        if self.settings.inverted {
            -self.requested
        } else {
            self.requested
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Zeroes the output if it was not refreshed within the expiration
    ///
    /// Returns true only on the check that trips the timeout. A channel
    /// already at zero has nothing to stop and never trips.
    pub fn check_expiration(&mut self, now: Instant) -> bool {
        if self.expired || self.requested == 0.0 {
            return false;
        }
        let Some(last_set) = self.last_set else {
            return false;
        };
        if now.saturating_duration_since(last_set) <= self.settings.expiration {
            return false;
        }
        warn!(
            "Motor {} not updated within {}ms, output stopped",
            self.name,
            self.settings.expiration.as_millis()
        );
        self.requested = 0.0;
        self.expired = true;
        true
    }
}

impl MotorOutput for MotorChannel {
    fn set(&mut self, power: f64) {
        let power = if power.is_nan() { 0.0 } else { power.clamp(-1.0, 1.0) };
        self.requested = power;
        self.last_set = Some(Instant::now());
        self.expired = false;
        trace!("Motor {} output {:+.3}", self.name, self.applied());
    }

    fn get(&self) -> f64 {
        self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(inverted: bool) -> MotorChannel {
        MotorChannel::new(
            "test",
            MotorSettings {
                inverted,
                expiration: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn inverted_channel_negates_applied_power() {
        let mut motor = channel(true);
        motor.set(0.1);
        assert_eq!(motor.get(), 0.1);
        assert_eq!(motor.applied(), -0.1);

        let mut motor = channel(false);
        motor.set(0.1);
        assert_eq!(motor.applied(), 0.1);
    }

    #[test]
    fn power_is_clamped() {
        let mut motor = channel(false);
        motor.set(3.0);
        assert_eq!(motor.get(), 1.0);
        motor.set(-7.5);
        assert_eq!(motor.get(), -1.0);
        motor.set(f64::NAN);
        assert_eq!(motor.get(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_output_expires_once() {
        let mut motor = channel(true);
        motor.set(0.1);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!motor.check_expiration(Instant::now()));
        assert_eq!(motor.get(), 0.1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(motor.check_expiration(Instant::now()));
        assert!(motor.is_expired());
        assert_eq!(motor.get(), 0.0);
        assert!(!motor.check_expiration(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_output_does_not_expire() {
        let mut motor = channel(false);
        for _ in 0..10 {
            motor.set(-0.1);
            tokio::time::advance(Duration::from_millis(20)).await;
            assert!(!motor.check_expiration(Instant::now()));
        }
        assert_eq!(motor.get(), -0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_channel_is_not_reported() {
        let mut motor = channel(false);
        motor.set(0.1);
        motor.stop();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!motor.check_expiration(Instant::now()));
        assert!(!motor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn never_set_channel_does_not_expire() {
        let mut motor = channel(false);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!motor.check_expiration(Instant::now()));
        assert!(!motor.is_expired());
    }
}
