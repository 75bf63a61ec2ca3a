//! Hyprland backend: hyprsunset IPC and fullscreen detection.
//!
//! ## Communication Protocol
//!
//! hyprsunset listens on a Unix socket at
//! `{runtime_dir}/hypr/{HYPRLAND_INSTANCE_SIGNATURE}/.hyprsunset.sock` and
//! accepts one command per connection:
//!
//! - `temperature 4500` sets the color temperature
//! - `identity` restores the unmodified display
//!
//! Each `apply` makes a single attempt. A failed write is reported to the
//! engine, which retries on its next tick, so no retry loop lives here.

use regex::Regex;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use super::{BlockSource, GammaSink};
use crate::constants::{SOCKET_BUFFER_SIZE, SOCKET_TIMEOUT_MS};
use crate::error::SinkError;
use crate::logger::Log;

/// Sends temperatures to hyprsunset.
pub struct HyprsunsetSink {
    socket_path: PathBuf,
}

impl HyprsunsetSink {
    /// Resolve the socket path the same way hyprsunset does.
    pub fn new() -> anyhow::Result<Self> {
        let his_env = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok();
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/run/user/{}", nix::unistd::getuid()));

        let user_dir = format!("{}/hypr/", runtime_dir);
        let socket_path = match his_env {
            Some(his) => PathBuf::from(format!("{}{}/.hyprsunset.sock", user_dir, his)),
            None => PathBuf::from(format!("{}.hyprsunset.sock", user_dir)),
        };

        if !socket_path.exists() {
            Log::log_warning(&format!(
                "hyprsunset socket not found at {}",
                crate::utils::path_for_display(&socket_path)
            ));
            Log::log_indented("Temperatures will be applied once hyprsunset is running");
        }

        Ok(Self::with_socket_path(socket_path))
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    fn send_command(&self, command: &str) -> Result<(), SinkError> {
        Log::log_debug(&format!("Sending command: {}", command));

        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => SinkError::Unavailable(format!(
                "hyprsunset is not listening on {}",
                self.socket_path.display()
            )),
            _ => SinkError::Io(e),
        })?;

        let timeout = Some(Duration::from_millis(SOCKET_TIMEOUT_MS));
        stream.set_read_timeout(timeout).ok();
        stream.set_write_timeout(timeout).ok();

        stream.write_all(command.as_bytes())?;

        // hyprsunset may close the connection without answering
        let mut buffer = [0; SOCKET_BUFFER_SIZE];
        if let Ok(bytes_read) = stream.read(&mut buffer) {
            let response = String::from_utf8_lossy(&buffer[..bytes_read]);
            let response = response.trim();
            if response.starts_with("invalid") || response.starts_with("error") {
                return Err(SinkError::Rejected(response.to_string()));
            }
            if !response.is_empty() {
                Log::log_debug(&format!("Response: {}", response));
            }
        }

        Ok(())
    }
}

impl GammaSink for HyprsunsetSink {
    fn apply(&mut self, temperature: u32) -> Result<(), SinkError> {
        self.send_command(&format!("temperature {}", temperature))
    }

    fn name(&self) -> &'static str {
        "Hyprland"
    }

    fn reset(&mut self) -> Result<(), SinkError> {
        self.send_command("identity")
    }
}

/// Polls `hyprctl activewindow` for the focused window's fullscreen flag.
pub struct HyprlandFullscreenSource {
    pattern: Option<Regex>,
    warned: bool,
}

impl HyprlandFullscreenSource {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?m)^\s*fullscreen:\s*(\w+)").ok(),
            warned: false,
        }
    }

    /// Parse `hyprctl activewindow` output.
    pub fn parse_fullscreen(&self, output: &str) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        pattern
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|value| match value.as_str() {
                "true" => true,
                "false" => false,
                number => number.parse::<u32>().map(|n| n != 0).unwrap_or(false),
            })
            .unwrap_or(false)
    }

    fn warn_once(&mut self, message: &str) {
        if !self.warned {
            Log::log_warning(message);
            Log::log_indented("Fullscreen blocking is inactive");
            self.warned = true;
        }
    }
}

impl Default for HyprlandFullscreenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockSource for HyprlandFullscreenSource {
    fn poll(&mut self) -> bool {
        match Command::new("hyprctl").arg("activewindow").output() {
            Ok(output) if output.status.success() => {
                self.parse_fullscreen(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                self.warn_once(&format!(
                    "hyprctl activewindow exited with {}",
                    output.status
                ));
                false
            }
            Err(e) => {
                self.warn_once(&format!("Could not run hyprctl: {}", e));
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "Hyprland fullscreen"
    }
}
