//! Signal handling and inter-process communication.
//!
//! A dedicated thread turns POSIX signals into [`SignalMessage`]s on a channel
//! the main loop drains:
//!
//! - `SIGINT`, `SIGTERM`, `SIGHUP`: shut down
//! - `SIGUSR2`: reload the configuration file
//! - `SIGUSR1`: read a [`ControlCommand`] from the control file and run it
//!
//! The control file lives at `$XDG_RUNTIME_DIR/lightcycle-{pid}.cmd` and holds
//! one command per write, e.g. `disable-for 1800000`.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use crate::logger::Log;

/// A command sent to a running daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Toggle,
    Enable,
    Disable,
    DisableFor(Duration),
    Preview,
    TemperaturePreview(u32),
    StopPreview,
}

impl ControlCommand {
    /// Wire form written to the control file.
    pub fn to_line(&self) -> String {
        match self {
            ControlCommand::Toggle => "toggle".to_string(),
            ControlCommand::Enable => "enable".to_string(),
            ControlCommand::Disable => "disable".to_string(),
            ControlCommand::DisableFor(duration) => {
                format!("disable-for {}", duration.as_millis())
            }
            ControlCommand::Preview => "preview".to_string(),
            ControlCommand::TemperaturePreview(kelvin) => format!("preview-temp {}", kelvin),
            ControlCommand::StopPreview => "stop-preview".to_string(),
        }
    }
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().context("Empty control command")?;
        let argument = parts.next();
        if parts.next().is_some() {
            anyhow::bail!("Unexpected arguments in control command '{}'", s.trim());
        }

        let command = match (verb, argument) {
            ("toggle", None) => ControlCommand::Toggle,
            ("enable", None) => ControlCommand::Enable,
            ("disable", None) => ControlCommand::Disable,
            ("disable-for", Some(ms)) => ControlCommand::DisableFor(Duration::from_millis(
                ms.parse().context("Invalid disable duration")?,
            )),
            ("preview", None) => ControlCommand::Preview,
            ("preview-temp", Some(kelvin)) => ControlCommand::TemperaturePreview(
                kelvin.parse().context("Invalid preview temperature")?,
            ),
            ("stop-preview", None) => ControlCommand::StopPreview,
            _ => anyhow::bail!("Unknown control command '{}'", s.trim()),
        };
        Ok(command)
    }
}

/// Unified signal message type for all signal-based communication
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Configuration reload signal (SIGUSR2)
    Reload,
    /// Control command delivered with SIGUSR1
    Control(ControlCommand),
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Cleared once a shutdown signal arrives
    pub running: Arc<AtomicBool>,
    pub signal_receiver: mpsc::Receiver<SignalMessage>,
}

/// Path of the control file for the daemon with `pid`.
pub fn control_file_path(pid: u32) -> PathBuf {
    crate::utils::runtime_dir().join(format!("lightcycle-{}.cmd", pid))
}

/// Write `command` for the daemon with `pid` to pick up on SIGUSR1.
pub fn write_control_command(pid: u32, command: ControlCommand) -> Result<()> {
    let path = control_file_path(pid);
    std::fs::write(&path, command.to_line())
        .with_context(|| format!("Failed to write control file {}", path.display()))
}

/// Read and remove the pending control command for `pid`.
pub fn take_control_command(pid: u32) -> Result<ControlCommand> {
    let path = control_file_path(pid);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read control file {}", path.display()))?;
    let _ = std::fs::remove_file(&path);
    content.parse()
}

/// Spawn the signal thread.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let pid = std::process::id();

    thread::Builder::new()
        .name("lightcycle-signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let message = match sig {
                    SIGUSR1 => match take_control_command(pid) {
                        Ok(command) => {
                            Log::log_pipe();
                            Log::log_decorated(&format!(
                                "Received control command: {}",
                                command.to_line()
                            ));
                            SignalMessage::Control(command)
                        }
                        Err(e) => {
                            Log::log_warning(&format!("Ignoring control signal: {:#}", e));
                            continue;
                        }
                    },
                    SIGUSR2 => {
                        Log::log_pipe();
                        Log::log_decorated("Received configuration reload signal");
                        SignalMessage::Reload
                    }
                    _ => {
                        Log::log_pipe();
                        Log::log_info(&format!("Shutdown signal received: {}", sig));
                        running_clone.store(false, Ordering::SeqCst);
                        SignalMessage::Shutdown
                    }
                };

                // Main loop gone means we are shutting down anyway
                if signal_sender.send(message).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn signal thread")?;

    Ok(SignalState {
        running,
        signal_receiver,
    })
}
