use color_eyre::{eyre::WrapErr, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use xrpdrive::config::{Config, InputBackend};
use xrpdrive::input::{KeySource, ScriptedKeys, TerminalKeys};
use xrpdrive::robot::host::forward_host_commands;
use xrpdrive::robot::{RobotMode, RobotRunner, XrpRobot};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = Config::default_path()?;
    Config::ensure_default(&path)?;
    let config = Config::load(&path)
        .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?;

    let (mode_sender, mode_receiver) = watch::channel(config.robot.start_mode);
    let (host_sender, host_receiver) = mpsc::channel(16);
    let shutdown = CancellationToken::new();

    tokio::spawn(forward_host_commands(
        host_receiver,
        mode_sender,
        shutdown.clone(),
    ));

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            interrupt.cancel();
        }
    });

    match config.input.backend {
        InputBackend::Terminal => {
            info!("Controls: Enter teleop, Space disable, u autonomous, t test, Esc quit");
            let keys = TerminalKeys::open(config.input.hold_timeout(), host_sender)?;
            run_robot(keys, &config, mode_receiver, shutdown).await
        }
        InputBackend::Scripted => {
            drop(host_sender);
            if config.robot.start_mode != RobotMode::Teleop {
                warn!(
                    "Scripted input only plays in teleop, but start mode is {}",
                    config.robot.start_mode
                );
            }
            let keys = ScriptedKeys::from_names(&config.input.script, config.input.loop_script)?;
            run_robot(keys, &config, mode_receiver, shutdown).await
        }
    }
}

async fn run_robot<S: KeySource>(
    source: S,
    config: &Config,
    mode_receiver: watch::Receiver<RobotMode>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut robot = XrpRobot::from_config(source, config, shutdown.clone());
    let runner = RobotRunner::create(config.robot.period(), mode_receiver, shutdown)?;

    let stopped = runner.start(&mut robot).run(&mut robot).await;
    info!("Done after {} ticks", stopped.ticks());
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    // stderr keeps log lines out of the raw-mode terminal output
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
