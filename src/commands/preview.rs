//! Implementation of `--preview` and `--preview-temp`.
//!
//! With a running daemon the request is forwarded over the control channel
//! and shows up in the daemon's status and logs only; preview values never
//! reach the display. Without one, the engine runs in the foreground against
//! the dry-run backend and the status line is redrawn in place until the
//! sweep ends or the user presses Escape or Ctrl+C.

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crate::backend::DryRunSink;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::constants::{MAXIMUM_TEMP, MINIMUM_TEMP, PREVIEW_UPDATE_INTERVAL_MS};
use crate::engine::{StateChange, TemperatureEngine};
use crate::logger::Log;
use crate::runtime::EngineRunner;
use crate::signals::ControlCommand;
use crate::utils::{format_duration, get_running_instance_pid};

/// What to preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewRequest {
    /// Sweep a full simulated day.
    Cycle,
    /// Hold a fixed temperature until dismissed.
    Temperature(u32),
}

/// Validate temperature value using the same bounds as config validation
pub fn validate_temperature(temp: u32) -> Result<()> {
    if temp < MINIMUM_TEMP {
        anyhow::bail!("Temperature {} is too low (minimum: {}K)", temp, MINIMUM_TEMP);
    }
    if temp > MAXIMUM_TEMP {
        anyhow::bail!("Temperature {} is too high (maximum: {}K)", temp, MAXIMUM_TEMP);
    }
    Ok(())
}

pub fn handle_preview_command(request: PreviewRequest, config_path: Option<&Path>) -> Result<()> {
    if let PreviewRequest::Temperature(kelvin) = request {
        validate_temperature(kelvin)?;
    }

    if get_running_instance_pid().is_ok() {
        let command = match request {
            PreviewRequest::Cycle => ControlCommand::Preview,
            PreviewRequest::Temperature(kelvin) => ControlCommand::TemperaturePreview(kelvin),
        };
        return super::control::handle_control_command(command);
    }

    run_foreground(request, config_path)
}

fn run_foreground(request: PreviewRequest, config_path: Option<&Path>) -> Result<()> {
    Log::log_version();

    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let resolved = config
        .resolve(Local::now().date_naive())
        .context("Cannot preview without a usable configuration")?;

    match request {
        PreviewRequest::Cycle => Log::log_block_start(&format!(
            "Previewing a full day in {} (no display changes)",
            format_duration(resolved.preview_duration())
        )),
        PreviewRequest::Temperature(kelvin) => {
            Log::log_block_start(&format!("Previewing {}K (no display changes)", kelvin))
        }
    }
    Log::log_indented("Press Escape or Ctrl+C to stop");
    Log::log_pipe();

    let engine = TemperatureEngine::new(resolved, Box::new(SystemClock), Box::new(DryRunSink::new()));
    let (runner, handle) = EngineRunner::new(engine);
    let thread = runner.spawn()?;
    let changes = handle.subscribe()?;

    // The status line owns the terminal while the sweep runs
    Log::set_enabled(false);
    let result = (|| -> Result<()> {
        match request {
            PreviewRequest::Cycle => handle.start_preview()?,
            PreviewRequest::Temperature(kelvin) => handle.start_temperature_preview(kelvin)?,
        }
        watch(&changes)
    })();
    Log::set_enabled(true);

    handle.shutdown()?;
    thread
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))?;

    println!();
    Log::log_end();
    result
}

/// Restores cooked mode when dropped.
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn new() -> Self {
        // Not a terminal: keys can't be read, the sweep still runs to completion
        Self {
            active: terminal::enable_raw_mode().is_ok(),
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Redraw the status line until the preview ends or the user quits.
fn watch(changes: &Receiver<StateChange>) -> Result<()> {
    let raw = RawModeGuard::new();
    let mut stdout = io::stdout();
    let mut preview_seen = false;
    let tick = Duration::from_millis(PREVIEW_UPDATE_INTERVAL_MS);

    loop {
        loop {
            match changes.try_recv() {
                Ok(StateChange::StatusText(text)) => draw_status(&mut stdout, &text)?,
                Ok(StateChange::PreviewMode(true)) => preview_seen = true,
                Ok(StateChange::PreviewMode(false)) if preview_seen => return Ok(()),
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        if raw.active {
            if event::poll(tick).context("Failed to poll terminal events")? {
                if let Event::Key(key) = event::read().context("Failed to read terminal event")? {
                    if is_exit_key(&key) {
                        return Ok(());
                    }
                }
            }
        } else {
            std::thread::sleep(tick);
        }
    }
}

fn is_exit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn draw_status(stdout: &mut io::Stdout, text: &str) -> Result<()> {
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(format!("┃   {}", text))
    )?;
    stdout.flush()?;
    Ok(())
}
