//! Utility functions shared across the codebase.
//!
//! Interpolation, human-friendly durations and paths, and lookup of the
//! running daemon through its lock file.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Interpolate between two u32 values based on progress (0.0 to 1.0).
///
/// Progress is clamped, and the result rounded to the nearest integer.
///
/// # Examples
/// ```
/// use lightcycle::utils::interpolate_u32;
/// assert_eq!(interpolate_u32(1000, 2000, 0.5), 1500);
/// assert_eq!(interpolate_u32(6000, 3000, 0.25), 5250);
/// ```
pub fn interpolate_u32(start: u32, end: u32, progress: f64) -> u32 {
    let start_f = f64::from(start);
    let end_f = f64::from(end);
    let result = start_f + (end_f - start_f) * progress.clamp(0.0, 1.0);
    result.round() as u32
}

/// Parse a duration such as `90s`, `30m`, `2h` or `1500ms`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let re = Regex::new(r"^\s*(\d+)\s*(ms|s|m|h)?\s*$").context("Invalid duration pattern")?;
    let captures = re.captures(input).with_context(|| {
        format!(
            "Invalid duration '{}'. Use a number followed by ms, s, m or h (e.g. 30m)",
            input
        )
    })?;

    let value: u64 = captures[1]
        .parse()
        .with_context(|| format!("Duration '{}' is too large", input))?;

    let duration = match captures.get(2).map(|unit| unit.as_str()) {
        Some("ms") => Duration::from_millis(value),
        Some("m") => Duration::from_secs(value.saturating_mul(60)),
        Some("h") => Duration::from_secs(value.saturating_mul(3600)),
        _ => Duration::from_secs(value),
    };
    Ok(duration)
}

/// Render a duration for log output, e.g. `1h 30m`, `45s` or `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

/// Shorten a path under the home directory to `~/...`.
pub fn path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

/// `$XDG_RUNTIME_DIR`, or `/tmp` when unset.
pub fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Single-instance lock file, holding the daemon's PID.
pub fn lock_path() -> PathBuf {
    runtime_dir().join("lightcycle.lock")
}

/// PID of the running daemon, read from the lock file.
pub fn get_running_instance_pid() -> Result<u32> {
    let path = lock_path();
    let content = std::fs::read_to_string(&path)
        .with_context(|| "No lightcycle instance running".to_string())?;

    let pid = parse_lock_contents(&content)?;
    if !is_instance_running(pid) {
        anyhow::bail!("No lightcycle instance running (stale lock file for PID {})", pid);
    }
    Ok(pid)
}

/// The lock file's first line is the PID.
pub fn parse_lock_contents(content: &str) -> Result<u32> {
    content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .context("Lock file is empty")?
        .parse::<u32>()
        .context("Invalid PID format in lock file")
}

pub fn is_instance_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
