use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
    sync::mpsc::RecvTimeoutError,
    time::Duration,
};
use termios::{os::linux::ECHOCTL, *};

use lightcycle::args::{CliAction, ParsedArgs, display_help, display_version_info};
use lightcycle::backend::{create_block_source, create_sink, detect_backend};
use lightcycle::clock::SystemClock;
use lightcycle::commands::{control, preview};
use lightcycle::config::{Config, TemperatureConfig, TransitionMode};
use lightcycle::constants::{EXIT_FAILURE, GEO_REFRESH_CHECK_SECS};
use lightcycle::engine::TemperatureEngine;
use lightcycle::logger::Log;
use lightcycle::runtime::{EngineHandle, EngineRunner};
use lightcycle::signals::{SignalMessage, SignalState, setup_signal_handler};
use lightcycle::utils::lock_path;

/// Manages terminal state to hide cursor and suppress control character echoing.
///
/// The original terminal state is restored when dropped.
struct TerminalGuard {
    original_termios: Termios,
}

impl TerminalGuard {
    /// Returns `Ok(None)` when there is no controlling terminal (e.g. a systemd service).
    fn new() -> io::Result<Option<Self>> {
        let tty = match File::open("/dev/tty") {
            Ok(tty) => tty,
            Err(e) if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(6) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let fd = tty.as_raw_fd();
        let mut term = Termios::from_fd(fd)?;
        let original = term;

        // No "^C" echo on shutdown
        term.c_lflag &= !ECHOCTL;
        tcsetattr(fd, TCSANOW, &term)?;

        print!("\x1b[?25l");
        io::stdout().flush()?;

        Ok(Some(Self {
            original_termios: original,
        }))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Ok(tty) = File::open("/dev/tty") {
            let _ = tcsetattr(tty.as_raw_fd(), TCSANOW, &self.original_termios);
        }
        let _ = write!(io::stdout(), "\x1b[?25h");
        let _ = io::stdout().flush();
    }
}

fn main() -> Result<()> {
    match ParsedArgs::from_env().action {
        CliAction::ShowVersion => {
            display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Control {
            debug_enabled,
            command,
        } => {
            Log::set_debug_enabled(debug_enabled);
            control::handle_control_command(command)
        }
        CliAction::Preview {
            debug_enabled,
            config_path,
            request,
        } => {
            Log::set_debug_enabled(debug_enabled);
            preview::handle_preview_command(request, config_path.as_deref())
        }
        CliAction::Reload {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug_enabled(debug_enabled);
            control::handle_reload_command(config_path.as_deref())
        }
        CliAction::Run {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug_enabled(debug_enabled);
            run_daemon(config_path)
        }
    }
}

fn run_daemon(config_path: Option<PathBuf>) -> Result<()> {
    let _term = TerminalGuard::new().context("failed to initialize terminal features")?;

    Log::log_version();

    let signal_state = setup_signal_handler()?;

    let lock_path = lock_path();
    // Not truncated before locking: the holder's PID must survive a failed attempt
    let mut lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

    if lock_file.try_lock_exclusive().is_err() {
        Log::log_error(
            "Another instance of lightcycle is already running.\n\
            • Use --toggle, --disable-for or --reload to control it.",
        );
        std::process::exit(EXIT_FAILURE);
    }

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    lock_file.flush()?;
    Log::log_decorated("Lock acquired, starting lightcycle...");

    let result = run_engine(&signal_state, config_path.as_deref());

    Log::log_block_start("Shutting down lightcycle...");
    cleanup(lock_file, &lock_path);
    Log::log_end();

    result
}

fn run_engine(signals: &SignalState, config_path: Option<&Path>) -> Result<()> {
    // Only an unreadable file stops startup; bad values leave the engine idle
    let mut config = read_config(config_path)?;
    config.log_config(config_path);

    let backend = detect_backend(&config)?;
    Log::log_block_start(&format!("Using {} backend", backend.name()));
    let sink = create_sink(backend)?;

    let mut anchor_date = Local::now().date_naive();
    let engine =
        TemperatureEngine::from_settings(&config, anchor_date, Box::new(SystemClock), sink);

    let (runner, handle) = EngineRunner::new(engine);
    let runner = match create_block_source(backend) {
        Some(source) => runner.with_default_block_source(source),
        None => runner,
    };
    let engine_thread = runner.spawn()?;

    while signals.running.load(Ordering::SeqCst) {
        match signals
            .signal_receiver
            .recv_timeout(Duration::from_secs(GEO_REFRESH_CHECK_SECS))
        {
            Ok(SignalMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(SignalMessage::Reload) => {
                anchor_date = Local::now().date_naive();
                match reload(config_path, anchor_date) {
                    Ok((new_config, resolved)) => {
                        if new_config.backend != config.backend {
                            Log::log_warning("Backend changes take effect after a restart");
                        }
                        new_config.log_config(config_path);
                        config = new_config;
                        handle.reconfigure(resolved)?;
                    }
                    Err(e) => {
                        Log::log_error(&format!("Reload rejected: {:#}", e));
                        Log::log_indented("Keeping the previous configuration");
                    }
                }
            }
            Ok(SignalMessage::Control(command)) => {
                if let Err(e) = control::dispatch(command, &handle) {
                    Log::log_error(&format!("Control command failed: {:#}", e));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let today = Local::now().date_naive();
        if today != anchor_date {
            anchor_date = today;
            refresh_solar_anchors(&config, today, &handle)?;
        }
    }

    let _ = handle.shutdown();
    engine_thread
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))?;
    Ok(())
}

fn read_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::read_from_path(path),
        None => Config::read(),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

fn reload(config_path: Option<&Path>, date: NaiveDate) -> Result<(Config, TemperatureConfig)> {
    let config = load_config(config_path)?;
    let resolved = config.resolve(date)?;
    Ok((config, resolved))
}

/// Sunset and sunrise move a little every day in geo mode.
fn refresh_solar_anchors(config: &Config, date: NaiveDate, handle: &EngineHandle) -> Result<()> {
    if !matches!(config.transition_mode(), Ok(TransitionMode::Geo)) {
        return Ok(());
    }

    match config.resolve(date) {
        Ok(resolved) => {
            Log::log_block_start("Updated solar times for the new day");
            Log::log_indented(&format!("Sunset: {}", resolved.sunset().format("%H:%M:%S")));
            Log::log_indented(&format!("Sunrise: {}", resolved.sunrise().format("%H:%M:%S")));
            handle.reconfigure(resolved)
        }
        Err(e) => {
            Log::log_warning(&format!("Could not update solar times: {}", e));
            Ok(())
        }
    }
}

/// Release and remove the lock file.
fn cleanup(lock_file: File, lock_path: &Path) {
    Log::log_decorated("Performing cleanup...");

    drop(lock_file);

    if let Err(e) = std::fs::remove_file(lock_path) {
        Log::log_decorated(&format!("Warning: Failed to remove lock file: {}", e));
    } else {
        Log::log_decorated("Lock file removed successfully");
    }

    Log::log_decorated("Cleanup complete");
}
