//! Turns host control keys into mode changes and shutdown

use crate::input::HostCommand;
use crate::robot::RobotMode;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl HostCommand {
    /// Mode selected by this command; `None` for shutdown
    pub fn mode(self) -> Option<RobotMode> {
        match self {
            HostCommand::Teleop => Some(RobotMode::Teleop),
            HostCommand::Autonomous => Some(RobotMode::Autonomous),
            HostCommand::Test => Some(RobotMode::Test),
            HostCommand::Disable => Some(RobotMode::Disabled),
            HostCommand::Shutdown => None,
        }
    }
}

/// Applies host commands until the channel closes or shutdown is requested
pub async fn forward_host_commands(
    mut commands: mpsc::Receiver<HostCommand>,
    mode_sender: watch::Sender<RobotMode>,
    shutdown: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = commands.recv() => command,
        };
        let Some(command) = command else {
            debug!("Host command channel closed");
            break;
        };

        let Some(mode) = command.mode() else {
            info!("Shutdown requested");
            shutdown.cancel();
            break;
        };
        if *mode_sender.borrow() == mode {
            continue;
        }
        if mode_sender.send(mode).is_err() {
            warn!("Robot loop gone, dropping mode change to {}", mode);
            break;
        }
    }
}
