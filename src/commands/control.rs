//! Commands that steer a running lightcycle instance.
//!
//! The CLI side writes the command to the instance's control file and raises
//! `SIGUSR1`; the daemon side ([`dispatch`]) maps a received command onto the
//! engine handle. Reloads use `SIGUSR2` and need no control file.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::logger::Log;
use crate::runtime::EngineHandle;
use crate::signals::{ControlCommand, write_control_command};
use crate::utils::{format_duration, get_running_instance_pid};

/// Send `command` to the running instance.
pub fn handle_control_command(command: ControlCommand) -> Result<()> {
    Log::log_version();

    let pid = get_running_instance_pid()
        .context("lightcycle is not running. Start it first, then retry the command")?;

    write_control_command(pid, command)?;
    kill(Pid::from_raw(pid as i32), Signal::SIGUSR1)
        .with_context(|| format!("Failed to signal lightcycle (PID: {})", pid))?;

    Log::log_decorated(&format!(
        "Sent {} to lightcycle (PID: {})",
        describe(command),
        pid
    ));
    Log::log_end();
    Ok(())
}

/// Ask the running instance to re-read its configuration.
///
/// The file is validated here first so a broken edit is reported to the
/// person running the command rather than only in the daemon's log.
pub fn handle_reload_command(config_path: Option<&std::path::Path>) -> Result<()> {
    Log::log_version();

    match config_path {
        Some(path) => crate::config::Config::load_from_path(path)?,
        None => crate::config::Config::load()?,
    };

    let pid = get_running_instance_pid()
        .context("lightcycle is not running, nothing to reload")?;

    kill(Pid::from_raw(pid as i32), Signal::SIGUSR2)
        .with_context(|| format!("Failed to signal lightcycle (PID: {})", pid))?;

    Log::log_decorated(&format!("Sent reload signal to lightcycle (PID: {})", pid));
    Log::log_indented("Existing process will reload configuration");
    Log::log_end();
    Ok(())
}

/// Apply a received command to the engine. Runs inside the daemon.
pub fn dispatch(command: ControlCommand, handle: &EngineHandle) -> Result<()> {
    match command {
        ControlCommand::Toggle => handle.toggle_enabled(),
        ControlCommand::Enable => handle.set_enabled(true),
        ControlCommand::Disable => handle.set_enabled(false),
        ControlCommand::DisableFor(duration) => handle.disable_for(duration),
        ControlCommand::Preview => handle.start_preview(),
        ControlCommand::TemperaturePreview(kelvin) => handle.start_temperature_preview(kelvin),
        ControlCommand::StopPreview => handle.stop_preview(),
    }
}

fn describe(command: ControlCommand) -> String {
    match command {
        ControlCommand::Toggle => "toggle".to_string(),
        ControlCommand::Enable => "enable".to_string(),
        ControlCommand::Disable => "disable".to_string(),
        ControlCommand::DisableFor(duration) => {
            format!("disable for {}", format_duration(duration))
        }
        ControlCommand::Preview => "preview".to_string(),
        ControlCommand::TemperaturePreview(kelvin) => format!("preview at {}K", kelvin),
        ControlCommand::StopPreview => "stop preview".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingSink;
    use crate::clock::ManualClock;
    use crate::config::TemperatureConfig;
    use crate::engine::TemperatureEngine;
    use crate::runtime::EngineRunner;
    use chrono::NaiveDate;
    use std::time::Duration;

    #[test]
    fn test_dispatch_maps_commands() {
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        let engine = TemperatureEngine::new(
            TemperatureConfig::builder().build().unwrap(),
            Box::new(clock),
            Box::new(RecordingSink::new()),
        );
        let (runner, handle) = EngineRunner::new(engine);
        let thread = runner.spawn().unwrap();

        dispatch(ControlCommand::Disable, &handle).unwrap();
        assert!(!handle.snapshot().unwrap().is_enabled);

        dispatch(ControlCommand::Toggle, &handle).unwrap();
        assert!(handle.snapshot().unwrap().is_enabled);

        dispatch(ControlCommand::DisableFor(Duration::from_secs(600)), &handle).unwrap();
        let snapshot = handle.snapshot().unwrap();
        assert!(!snapshot.is_enabled);
        assert!(snapshot.reenable_at.is_some());

        dispatch(ControlCommand::TemperaturePreview(3000), &handle).unwrap();
        assert_eq!(handle.snapshot().unwrap().temperature, 3000);

        dispatch(ControlCommand::StopPreview, &handle).unwrap();
        assert!(!handle.snapshot().unwrap().is_preview_mode_enabled);

        assert!(dispatch(ControlCommand::DisableFor(Duration::ZERO), &handle).is_err());

        handle.shutdown().unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(ControlCommand::DisableFor(Duration::from_secs(1800))),
            "disable for 30m"
        );
        assert_eq!(describe(ControlCommand::TemperaturePreview(3200)), "preview at 3200K");
    }
}
