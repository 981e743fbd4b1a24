//! PodmanStatusBar - Watch the Podman machine from the desktop
//!
//! Periodically asks Podman whether its machine is running, debounces the
//! answer through the boot window, and lets the user start or stop the
//! machine and see which containers are running.

mod core;
mod platform;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use single_instance::SingleInstance;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::{CommandRunner, Settings, SystemCommandRunner, VmController};
use crate::ui::{spawn_stdin_reader, ConsoleFrontend};

/// Application name constant
pub const APP_NAME: &str = "PodmanStatusBar";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long shutdown waits for in-flight machine commands before abandoning them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // Settings decide the log level, so report a bad file only once logging is up
    let loaded = Settings::load();
    let debug_logging = loaded.as_ref().map(|s| s.debug_logging).unwrap_or(false);
    init_logging(debug_logging);

    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    let settings = loaded.unwrap_or_else(|e| {
        error!("{:#}; using default settings", e);
        Settings::default()
    });

    // Ensure only one instance of the monitor itself is running
    let instance = SingleInstance::new(APP_NAME).context("Failed to create single instance lock")?;
    if !instance.is_single() {
        error!("Another instance of {} is already running!", APP_NAME);
        eprintln!("{} is already running!", APP_NAME);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(run(&settings));

    // A `machine start` can block for minutes; don't hold the exit for it
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    info!("{} shutting down", APP_NAME);
    result
}

async fn run(settings: &Settings) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let controller = VmController::initialize(settings, runner).await;
    info!(
        "Controller initialized (podman: {})",
        controller.executable().display()
    );

    let input = spawn_stdin_reader()?;
    let result = ConsoleFrontend::new(&controller, input).run().await;

    controller.shutdown().await;
    result
}

/// Initialize the logging system
fn init_logging(debug: bool) {
    let default_filter = if debug {
        "podman_status_bar=debug"
    } else {
        "podman_status_bar=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
