//! Console front end - Stand-in for the status-bar menu

use std::io::BufRead;
use std::thread;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::core::{ContainerName, RuntimeState, VmController};

/// Menu entries, keyed like the status-bar menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    CheckNow,
    StartVm,
    StopVm,
    ListContainers,
    Help,
    Quit,
}

impl MenuAction {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "r" => Some(Self::CheckNow),
            "s" => Some(Self::StartVm),
            "x" => Some(Self::StopVm),
            "l" => Some(Self::ListContainers),
            "h" | "?" => Some(Self::Help),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }

    pub fn key(&self) -> char {
        match self {
            Self::CheckNow => 'r',
            Self::StartVm => 's',
            Self::StopVm => 'x',
            Self::ListContainers => 'l',
            Self::Help => 'h',
            Self::Quit => 'q',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CheckNow => "Check VM State",
            Self::StartVm => "Start VM",
            Self::StopVm => "Stop VM",
            Self::ListContainers => "Running containers",
            Self::Help => "Help",
            Self::Quit => "Exit",
        }
    }

    pub fn all() -> &'static [MenuAction] {
        &[
            MenuAction::CheckNow,
            MenuAction::ListContainers,
            MenuAction::StartVm,
            MenuAction::StopVm,
            MenuAction::Help,
            MenuAction::Quit,
        ]
    }
}

/// Lines shown for the container section of the menu
pub fn container_lines(containers: &[ContainerName]) -> Vec<String> {
    if containers.is_empty() {
        return vec!["No container in execution".to_string()];
    }

    std::iter::once("Container in execution:".to_string())
        .chain(containers.iter().map(|name| format!("  {}", name)))
        .collect()
}

fn status_line(state: RuntimeState, since: DateTime<Utc>) -> String {
    format!(
        "{} (since {})",
        state.tooltip(),
        since.with_timezone(&Local).format("%H:%M:%S")
    )
}

/// Forward lines from `reader` over a channel, reading on a plain thread.
///
/// A blocking read cannot be cancelled, so it stays off the runtime's
/// blocking pool; otherwise shutting the runtime down would wait for the
/// next line. The channel closes at end of input.
pub fn spawn_line_reader<R>(reader: R) -> Result<mpsc::UnboundedReceiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn stdin reader thread")?;
    Ok(rx)
}

/// [`spawn_line_reader`] over the process's stdin
pub fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

/// Reads menu keys from an input channel and prints every state change
pub struct ConsoleFrontend<'a> {
    controller: &'a VmController,
    input: mpsc::UnboundedReceiver<String>,
}

impl<'a> ConsoleFrontend<'a> {
    pub fn new(controller: &'a VmController, input: mpsc::UnboundedReceiver<String>) -> Self {
        Self { controller, input }
    }

    /// Run until `q`, Ctrl-C, or the controller going away
    pub async fn run(mut self) -> Result<()> {
        print_menu();
        let current = *self.controller.subscribe().borrow();
        println!("{}", status_line(current.state, current.since));

        let mut events = self.controller.transitions();
        let mut input_open = true;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(transition) => println!(
                        "{} [was {}]",
                        status_line(transition.to, transition.at),
                        transition.from
                    ),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("Missed {} state changes", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Controller closed its transition channel");
                        break;
                    }
                },
                line = self.input.recv(), if input_open => match line {
                    Some(line) => {
                        if !self.dispatch(&line).await {
                            break;
                        }
                    }
                    None => {
                        // Detached from a terminal: keep reporting until Ctrl-C
                        debug!("stdin closed");
                        input_open = false;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle one input line; `false` means quit
    async fn dispatch(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }

        let Some(action) = MenuAction::from_key(line) else {
            println!("Unknown command {:?}, press h for help", line.trim());
            return true;
        };

        match action {
            MenuAction::CheckNow => self.controller.check_now(),
            MenuAction::StartVm => self.controller.start_vm(),
            MenuAction::StopVm => self.controller.stop_vm(),
            MenuAction::ListContainers => {
                if self.controller.current_state() == RuntimeState::Running {
                    let containers = self.controller.list_containers().await;
                    for line in container_lines(&containers) {
                        println!("{}", line);
                    }
                } else {
                    println!("{}", self.controller.current_state().tooltip());
                }
            }
            MenuAction::Help => print_menu(),
            MenuAction::Quit => return false,
        }
        true
    }
}

fn print_menu() {
    for action in MenuAction::all() {
        println!("  [{}] {}", action.key(), action.label());
    }
}
