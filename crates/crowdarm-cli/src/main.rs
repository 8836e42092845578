//! `crowdarm` – process bootstrap for the crowd-controlled arm.
//!
//! Wires the whole pipeline together:
//!
//! 1. Loads `crowdarm.toml` (path as the first argument, `CROWDARM_*`
//!    environment overrides) and validates it before any motion.
//! 2. Homes the arm and moves it to the configured start cell.
//! 3. Starts the TCP bridge and the voting control loop, and echoes status
//!    strings to the log until Ctrl-C.
//!
//! The binary drives the simulated driver; swapping in real hardware means
//! providing another [`ArmDriver`] implementation at the construction site
//! below.
//!
//! [`ArmDriver`]: crowdarm_hal::ArmDriver

mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crowdarm_bridge::BridgeServer;
use crowdarm_control::ControlLoop;
use crowdarm_hal::{SimArm, UserFrameController};
use crowdarm_kinematics::wrist::WristPolicy;
use crowdarm_types::ArmError;
use tokio::sync::Mutex;
use tracing::{error, info};

fn init_tracing() {
    // RUST_LOG selects the level (defaults to "info"); set
    // CROWDARM_LOG_FORMAT=json for newline-delimited JSON suitable for log
    // aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("CROWDARM_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

async fn run() -> Result<(), ArmError> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "crowdarm.toml".to_string());
    let cfg = config::load(Path::new(&config_path))?;
    info!(path = %config_path, ?cfg, "configuration loaded");

    // validate() already proved this parses.
    let bind_addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .map_err(|e| ArmError::Config(format!("invalid bind_addr: {e}")))?;

    let mut controller = UserFrameController::new(
        cfg.envelope,
        SimArm::new(),
        WristPolicy::default(),
    );
    controller.home()?;
    let [x, y, z] = cfg.start;
    controller.move_to_start(x, y, z)?;
    info!(x, y, z, "arm homed and at the start cell");

    let controller = Arc::new(Mutex::new(controller));

    let bridge = BridgeServer::new(Arc::clone(&controller))
        .with_accept_timeout(Duration::from_secs(cfg.accept_timeout_secs));
    let bridge_task = tokio::spawn(bridge.run(bind_addr));

    let (control, mut status_rx) = ControlLoop::new(Arc::clone(&controller));
    let control = control.with_window(Duration::from_secs(cfg.window_secs));

    // Without a chat front-end attached, round outcomes go to the log.
    let status_task = tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            info!(status = %status, "round update");
        }
    });

    let outcome = tokio::select! {
        result = control.run() => result,
        result = bridge_task => match result {
            Ok(result) => result,
            Err(e) => Err(ArmError::Io(format!("bridge task failed: {e}"))),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            Ok(())
        }
    };

    status_task.abort();
    outcome
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        error!(error = %e, "crowdarm exited with error");
        std::process::exit(1);
    }
}
