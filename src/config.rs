//! Configuration loading and validation.
//!
//! Settings live in `lightcycle.toml` under the XDG config directory:
//!
//! ```toml
//! backend = "auto"                  # "auto", "hyprland" or "dry_run"
//! fullscreen_blocking = true        # Suspend the cycle while a window is fullscreen
//!
//! sunset = "18:00:00"               # Anchor times (ignored in geo mode)
//! sunrise = "06:00:00"
//! transition_duration = 60          # Minutes
//! transition_mode = "start_at"      # "start_at", "finish_by", "center" or "geo"
//! latitude = 52.52                  # Required for geo mode
//! longitude = 13.40
//!
//! night_temp = 3300                 # Kelvin
//! day_temp = 6500                   # Kelvin
//! update_interval = 60              # Seconds between real-time ticks
//! preview_duration = 10             # Seconds for a full preview sweep
//! ```
//!
//! Two types are involved. [`Config`] mirrors the file: every field is
//! optional and filled from `constants` when missing. [`TemperatureConfig`] is
//! the validated snapshot the engine consumes; it can only be produced by
//! [`TemperatureConfigBuilder::build`] or [`Config::resolve`], so holding one
//! means the bounds, durations and transition windows have all been checked.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::constants::*;
use crate::cycle::TransitionWindows;
use crate::error::ConfigError;
use crate::geo::{GeoProvider, SolarGeoProvider};
use crate::logger::Log;

/// Backend selection for applying color temperature.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Hyprland when `HYPRLAND_INSTANCE_SIGNATURE` is set, otherwise dry run.
    Auto,
    /// hyprsunset over Hyprland's IPC socket.
    Hyprland,
    /// Log values instead of applying them.
    DryRun,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Hyprland => "hyprland",
            Backend::DryRun => "dry_run",
        }
    }
}

/// How the transition windows are placed relative to the sunset/sunrise anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    StartAt,
    FinishBy,
    Center,
    /// Centered on solar sunset/sunrise computed from coordinates.
    Geo,
}

impl TransitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionMode::StartAt => "start_at",
            TransitionMode::FinishBy => "finish_by",
            TransitionMode::Center => "center",
            TransitionMode::Geo => "geo",
        }
    }
}

impl FromStr for TransitionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_at" => Ok(TransitionMode::StartAt),
            "finish_by" => Ok(TransitionMode::FinishBy),
            "center" => Ok(TransitionMode::Center),
            "geo" => Ok(TransitionMode::Geo),
            other => Err(ConfigError::InvalidTransitionMode(other.to_string())),
        }
    }
}

/// Settings as written in `lightcycle.toml`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub backend: Option<Backend>,
    pub fullscreen_blocking: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sunset: Option<String>,
    pub sunrise: Option<String>,
    pub night_temp: Option<u32>,
    pub day_temp: Option<u32>,
    pub transition_duration: Option<u64>, // minutes
    pub transition_mode: Option<String>,
    pub update_interval: Option<u64>,  // seconds
    pub preview_duration: Option<u64>, // seconds
}

impl Config {
    /// Path of the configuration file, `$XDG_CONFIG_HOME/lightcycle/lightcycle.toml`.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("lightcycle").join("lightcycle.toml"))
    }

    /// Load and validate from the default location, writing a commented
    /// default file first if none exists.
    pub fn load() -> Result<Self> {
        let config = Self::read()?;
        let path = Self::get_config_path()?;
        validate_config(&config)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Like [`load`](Self::load) but without validation. Only I/O and TOML
    /// errors fail; values are checked later by [`resolve`](Self::resolve).
    pub fn read() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            Log::log_decorated(&format!(
                "Creating default config at {}",
                crate::utils::path_for_display(&config_path)
            ));
            Self::create_default_config(&config_path)?;
        }

        Self::read_from_path(&config_path)
    }

    /// Load and validate a specific file. Never creates the file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = Self::read_from_path(path)?;
        validate_config(&config)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Parse a specific file and fill in defaults, without validation.
    pub fn read_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.apply_defaults();
        Ok(config)
    }

    /// Fill every missing field with its default.
    pub fn apply_defaults(&mut self) {
        self.backend.get_or_insert(DEFAULT_BACKEND);
        self.fullscreen_blocking
            .get_or_insert(DEFAULT_FULLSCREEN_BLOCKING);
        self.sunset.get_or_insert_with(|| DEFAULT_SUNSET.to_string());
        self.sunrise
            .get_or_insert_with(|| DEFAULT_SUNRISE.to_string());
        self.night_temp.get_or_insert(DEFAULT_NIGHT_TEMP);
        self.day_temp.get_or_insert(DEFAULT_DAY_TEMP);
        self.transition_duration
            .get_or_insert(DEFAULT_TRANSITION_DURATION);
        self.transition_mode
            .get_or_insert_with(|| DEFAULT_TRANSITION_MODE.to_string());
        self.update_interval.get_or_insert(DEFAULT_UPDATE_INTERVAL);
        self.preview_duration
            .get_or_insert(DEFAULT_PREVIEW_DURATION);
    }

    pub fn transition_mode(&self) -> Result<TransitionMode, ConfigError> {
        self.transition_mode
            .as_deref()
            .unwrap_or(DEFAULT_TRANSITION_MODE)
            .parse()
    }

    /// Solar provider for the configured coordinates, if both are present.
    pub fn geo_provider(&self) -> Result<SolarGeoProvider, ConfigError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => SolarGeoProvider::new(latitude, longitude),
            _ => Err(ConfigError::MissingCoordinates),
        }
    }

    /// Produce the validated snapshot for `date`.
    ///
    /// In geo mode the anchors come from the configured coordinates; the
    /// sunset/sunrise strings are ignored.
    pub fn resolve(&self, date: NaiveDate) -> Result<TemperatureConfig, ConfigError> {
        if self.transition_mode()? == TransitionMode::Geo {
            let provider = self.geo_provider()?;
            self.resolve_with(&provider, date)
        } else {
            self.build_snapshot(None)
        }
    }

    /// Like [`resolve`](Self::resolve), with an explicit anchor source for geo mode.
    pub fn resolve_with(
        &self,
        geo: &dyn GeoProvider,
        date: NaiveDate,
    ) -> Result<TemperatureConfig, ConfigError> {
        if self.transition_mode()? == TransitionMode::Geo {
            let times = geo.solar_times(date)?;
            self.build_snapshot(Some((times.sunset, times.sunrise)))
        } else {
            self.build_snapshot(None)
        }
    }

    fn build_snapshot(
        &self,
        anchors: Option<(NaiveTime, NaiveTime)>,
    ) -> Result<TemperatureConfig, ConfigError> {
        let (sunset, sunrise) = match anchors {
            Some(anchors) => anchors,
            None => (
                parse_time(
                    "sunset",
                    self.sunset.as_deref().unwrap_or(DEFAULT_SUNSET),
                )?,
                parse_time(
                    "sunrise",
                    self.sunrise.as_deref().unwrap_or(DEFAULT_SUNRISE),
                )?,
            ),
        };

        TemperatureConfig::builder()
            .day_temp(self.day_temp.unwrap_or(DEFAULT_DAY_TEMP))
            .night_temp(self.night_temp.unwrap_or(DEFAULT_NIGHT_TEMP))
            .sunset(sunset)
            .sunrise(sunrise)
            .transition_minutes(
                self.transition_duration
                    .unwrap_or(DEFAULT_TRANSITION_DURATION),
            )
            .transition_mode(self.transition_mode()?)
            .update_interval_secs(self.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL))
            .preview_duration_secs(
                self.preview_duration
                    .unwrap_or(DEFAULT_PREVIEW_DURATION),
            )
            .fullscreen_blocking(
                self.fullscreen_blocking
                    .unwrap_or(DEFAULT_FULLSCREEN_BLOCKING),
            )
            .build()
    }

    /// Write a commented default configuration to `path`.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_content = ConfigBuilder::new()
            .add_section("Backend")
            .add_setting(
                "backend",
                &format!("\"{}\"", DEFAULT_BACKEND.as_str()),
                "Backend to use: \"auto\", \"hyprland\" or \"dry_run\"",
            )
            .add_setting(
                "fullscreen_blocking",
                &DEFAULT_FULLSCREEN_BLOCKING.to_string(),
                "Pause the cycle while a fullscreen window is focused",
            )
            .add_section("Time-based configuration")
            .add_setting(
                "sunset",
                &format!("\"{}\"", DEFAULT_SUNSET),
                "Time to transition to night mode (HH:MM:SS)",
            )
            .add_setting(
                "sunrise",
                &format!("\"{}\"", DEFAULT_SUNRISE),
                "Time to transition to day mode (HH:MM:SS)",
            )
            .add_setting(
                "transition_duration",
                &DEFAULT_TRANSITION_DURATION.to_string(),
                &format!(
                    "Transition length in minutes ({}-{})",
                    MINIMUM_TRANSITION_DURATION, MAXIMUM_TRANSITION_DURATION
                ),
            )
            .add_setting(
                "transition_mode",
                &format!("\"{}\"", DEFAULT_TRANSITION_MODE),
                "\"start_at\", \"finish_by\", \"center\" or \"geo\"",
            )
            .add_setting(
                "#latitude",
                "52.520000",
                "Coordinates for geo mode",
            )
            .add_setting("#longitude", "13.405000", "")
            .add_section("Color temperature")
            .add_setting(
                "night_temp",
                &DEFAULT_NIGHT_TEMP.to_string(),
                &format!(
                    "Night temperature in Kelvin ({}-{})",
                    MINIMUM_TEMP, MAXIMUM_TEMP
                ),
            )
            .add_setting(
                "day_temp",
                &DEFAULT_DAY_TEMP.to_string(),
                &format!(
                    "Day temperature in Kelvin ({}-{})",
                    MINIMUM_TEMP, MAXIMUM_TEMP
                ),
            )
            .add_section("Timing")
            .add_setting(
                "update_interval",
                &DEFAULT_UPDATE_INTERVAL.to_string(),
                &format!(
                    "Seconds between updates ({}-{})",
                    MINIMUM_UPDATE_INTERVAL, MAXIMUM_UPDATE_INTERVAL
                ),
            )
            .add_setting(
                "preview_duration",
                &DEFAULT_PREVIEW_DURATION.to_string(),
                &format!(
                    "Seconds for a full preview sweep ({}-{})",
                    MINIMUM_PREVIEW_DURATION, MAXIMUM_PREVIEW_DURATION
                ),
            )
            .build();

        fs::write(path, config_content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        Ok(())
    }

    pub fn log_config(&self, path: Option<&Path>) {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()
                .unwrap_or_else(|_| PathBuf::from("~/.config/lightcycle/lightcycle.toml")),
        };

        Log::log_block_start(&format!(
            "Loaded configuration from {}",
            crate::utils::path_for_display(&config_path)
        ));

        Log::log_indented(&format!(
            "Backend: {}",
            self.backend.unwrap_or(DEFAULT_BACKEND).as_str()
        ));
        Log::log_indented(&format!(
            "Fullscreen blocking: {}",
            self.fullscreen_blocking
                .unwrap_or(DEFAULT_FULLSCREEN_BLOCKING)
        ));

        let mode = self
            .transition_mode
            .as_deref()
            .unwrap_or(DEFAULT_TRANSITION_MODE);
        Log::log_indented(&format!("Transition mode: {}", mode));

        if mode == "geo" {
            if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
                Log::log_indented(&format!("Location: {:.4}°, {:.4}°", lat, lon));
            }
        } else {
            Log::log_indented(&format!(
                "Sunset time: {}",
                self.sunset.as_deref().unwrap_or(DEFAULT_SUNSET)
            ));
            Log::log_indented(&format!(
                "Sunrise time: {}",
                self.sunrise.as_deref().unwrap_or(DEFAULT_SUNRISE)
            ));
        }

        Log::log_indented(&format!(
            "Transition duration: {} minutes",
            self.transition_duration
                .unwrap_or(DEFAULT_TRANSITION_DURATION)
        ));
        Log::log_indented(&format!(
            "Night temperature: {}K",
            self.night_temp.unwrap_or(DEFAULT_NIGHT_TEMP)
        ));
        Log::log_indented(&format!(
            "Day temperature: {}K",
            self.day_temp.unwrap_or(DEFAULT_DAY_TEMP)
        ));
        Log::log_indented(&format!(
            "Update interval: {} seconds",
            self.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL)
        ));
    }
}

/// Check that `config` resolves to a valid snapshot for today.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.resolve(Local::now().date_naive()).map(|_| ())
}

/// Parse `HH:MM:SS` (or `HH:MM`) into a time of day.
pub fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ConfigError::InvalidTime {
            field,
            value: value.to_string(),
        })
}

/// Immutable, validated settings consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureConfig {
    day_temp: u32,
    night_temp: u32,
    sunset: NaiveTime,
    sunrise: NaiveTime,
    transition_duration: StdDuration,
    transition_mode: TransitionMode,
    update_interval: StdDuration,
    preview_duration: StdDuration,
    fullscreen_blocking: bool,
    windows: TransitionWindows,
}

impl TemperatureConfig {
    pub fn builder() -> TemperatureConfigBuilder {
        TemperatureConfigBuilder::default()
    }

    /// Maximum (day) temperature in Kelvin.
    pub fn day_temp(&self) -> u32 {
        self.day_temp
    }

    /// Minimum (night) temperature in Kelvin.
    pub fn night_temp(&self) -> u32 {
        self.night_temp
    }

    pub fn sunset(&self) -> NaiveTime {
        self.sunset
    }

    pub fn sunrise(&self) -> NaiveTime {
        self.sunrise
    }

    pub fn transition_duration(&self) -> StdDuration {
        self.transition_duration
    }

    pub fn transition_mode(&self) -> TransitionMode {
        self.transition_mode
    }

    pub fn update_interval(&self) -> StdDuration {
        self.update_interval
    }

    pub fn preview_duration(&self) -> StdDuration {
        self.preview_duration
    }

    pub fn fullscreen_blocking(&self) -> bool {
        self.fullscreen_blocking
    }

    pub fn windows(&self) -> &TransitionWindows {
        &self.windows
    }
}

/// Builder for [`TemperatureConfig`]; `build` runs every check.
#[derive(Debug, Clone)]
pub struct TemperatureConfigBuilder {
    day_temp: u32,
    night_temp: u32,
    sunset: NaiveTime,
    sunrise: NaiveTime,
    transition_minutes: u64,
    transition_mode: TransitionMode,
    update_interval_secs: u64,
    preview_duration_secs: u64,
    fullscreen_blocking: bool,
}

impl Default for TemperatureConfigBuilder {
    fn default() -> Self {
        Self {
            day_temp: DEFAULT_DAY_TEMP,
            night_temp: DEFAULT_NIGHT_TEMP,
            sunset: parse_time("sunset", DEFAULT_SUNSET).unwrap_or(NaiveTime::MIN),
            sunrise: parse_time("sunrise", DEFAULT_SUNRISE).unwrap_or(NaiveTime::MIN),
            transition_minutes: DEFAULT_TRANSITION_DURATION,
            transition_mode: TransitionMode::StartAt,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL,
            preview_duration_secs: DEFAULT_PREVIEW_DURATION,
            fullscreen_blocking: DEFAULT_FULLSCREEN_BLOCKING,
        }
    }
}

impl TemperatureConfigBuilder {
    pub fn day_temp(mut self, kelvin: u32) -> Self {
        self.day_temp = kelvin;
        self
    }

    pub fn night_temp(mut self, kelvin: u32) -> Self {
        self.night_temp = kelvin;
        self
    }

    pub fn sunset(mut self, time: NaiveTime) -> Self {
        self.sunset = time;
        self
    }

    pub fn sunrise(mut self, time: NaiveTime) -> Self {
        self.sunrise = time;
        self
    }

    pub fn transition_minutes(mut self, minutes: u64) -> Self {
        self.transition_minutes = minutes;
        self
    }

    pub fn transition_mode(mut self, mode: TransitionMode) -> Self {
        self.transition_mode = mode;
        self
    }

    pub fn update_interval_secs(mut self, secs: u64) -> Self {
        self.update_interval_secs = secs;
        self
    }

    pub fn preview_duration_secs(mut self, secs: u64) -> Self {
        self.preview_duration_secs = secs;
        self
    }

    pub fn fullscreen_blocking(mut self, enabled: bool) -> Self {
        self.fullscreen_blocking = enabled;
        self
    }

    pub fn build(self) -> Result<TemperatureConfig, ConfigError> {
        check_temperature("night_temp", self.night_temp)?;
        check_temperature("day_temp", self.day_temp)?;
        if self.night_temp >= self.day_temp {
            return Err(ConfigError::InvertedBounds {
                night: self.night_temp,
                day: self.day_temp,
            });
        }

        if !(MINIMUM_TRANSITION_DURATION..=MAXIMUM_TRANSITION_DURATION)
            .contains(&self.transition_minutes)
        {
            return Err(ConfigError::TransitionDurationOutOfRange {
                value: self.transition_minutes,
                min: MINIMUM_TRANSITION_DURATION,
                max: MAXIMUM_TRANSITION_DURATION,
            });
        }

        if !(MINIMUM_UPDATE_INTERVAL..=MAXIMUM_UPDATE_INTERVAL).contains(&self.update_interval_secs)
        {
            return Err(ConfigError::UpdateIntervalOutOfRange {
                value: self.update_interval_secs,
                min: MINIMUM_UPDATE_INTERVAL,
                max: MAXIMUM_UPDATE_INTERVAL,
            });
        }

        if !(MINIMUM_PREVIEW_DURATION..=MAXIMUM_PREVIEW_DURATION)
            .contains(&self.preview_duration_secs)
        {
            return Err(ConfigError::PreviewDurationOutOfRange {
                value: self.preview_duration_secs,
                min: MINIMUM_PREVIEW_DURATION,
                max: MAXIMUM_PREVIEW_DURATION,
            });
        }

        let transition_duration = StdDuration::from_secs(self.transition_minutes * 60);
        let windows = TransitionWindows::new(
            self.transition_mode,
            self.sunset,
            self.sunrise,
            transition_duration,
        );

        if windows.overlapping() {
            return Err(ConfigError::OverlappingTransitions {
                sunset_start: windows.sunset_start.format("%H:%M:%S").to_string(),
                sunset_end: windows.sunset_end.format("%H:%M:%S").to_string(),
                sunrise_start: windows.sunrise_start.format("%H:%M:%S").to_string(),
                sunrise_end: windows.sunrise_end.format("%H:%M:%S").to_string(),
            });
        }

        Ok(TemperatureConfig {
            day_temp: self.day_temp,
            night_temp: self.night_temp,
            sunset: self.sunset,
            sunrise: self.sunrise,
            transition_duration,
            transition_mode: self.transition_mode,
            update_interval: StdDuration::from_secs(self.update_interval_secs),
            preview_duration: StdDuration::from_secs(self.preview_duration_secs),
            fullscreen_blocking: self.fullscreen_blocking,
            windows,
        })
    }
}

fn check_temperature(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&value) {
        return Err(ConfigError::TemperatureOutOfRange {
            field,
            value,
            min: MINIMUM_TEMP,
            max: MAXIMUM_TEMP,
        });
    }
    Ok(())
}

/// Builder for the commented default config file.
///
/// Keeps every comment aligned one column past the longest setting line.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{}]", title)));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{} = {}", key, value),
            comment: comment.to_string(),
        });
        self
    }

    fn build(self) -> String {
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for (index, entry) in self.entries.into_iter().enumerate() {
            match entry {
                ConfigEntry::Section(title) => {
                    if index > 0 {
                        lines.push(String::new());
                    }
                    lines.push(title);
                }
                ConfigEntry::Setting { line, comment } if comment.is_empty() => {
                    lines.push(line);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(width - line.len());
                    lines.push(format!("{}{}# {}", line, padding, comment));
                }
            }
        }

        let mut content = lines.join("\n");
        content.push('\n');
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::FixedGeoProvider;
    use serial_test::serial;
    use tempfile::tempdir;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn create_test_config(sunset: &str, sunrise: &str, duration: u64, mode: &str) -> Config {
        let mut config = Config {
            sunset: Some(sunset.to_string()),
            sunrise: Some(sunrise.to_string()),
            transition_duration: Some(duration),
            transition_mode: Some(mode.to_string()),
            ..Default::default()
        };
        config.apply_defaults();
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
    }

    #[test]
    fn test_config_validation_basic() {
        let config = create_test_config("19:00:00", "06:00:00", 30, "finish_by");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_default_builder_is_valid() {
        let built = TemperatureConfig::builder().build().unwrap();
        assert_eq!(built.day_temp(), DEFAULT_DAY_TEMP);
        assert_eq!(built.night_temp(), DEFAULT_NIGHT_TEMP);
        assert_eq!(built.transition_mode(), TransitionMode::StartAt);
        assert_eq!(
            built.transition_duration(),
            StdDuration::from_secs(DEFAULT_TRANSITION_DURATION * 60)
        );
        assert_eq!(
            built.update_interval(),
            StdDuration::from_secs(DEFAULT_UPDATE_INTERVAL)
        );
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = TemperatureConfig::builder()
            .day_temp(3000)
            .night_temp(6500)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvertedBounds { night: 6500, day: 3000 });

        let err = TemperatureConfig::builder()
            .day_temp(4000)
            .night_temp(4000)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBounds { .. }));
    }

    #[test]
    fn test_temperature_range() {
        let err = TemperatureConfig::builder().night_temp(999).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TemperatureOutOfRange { field: "night_temp", .. }
        ));

        let err = TemperatureConfig::builder().day_temp(10001).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TemperatureOutOfRange { field: "day_temp", .. }
        ));

        assert!(TemperatureConfig::builder()
            .night_temp(MINIMUM_TEMP)
            .day_temp(MAXIMUM_TEMP)
            .build()
            .is_ok());
    }

    #[test]
    fn test_duration_ranges() {
        assert!(matches!(
            TemperatureConfig::builder().transition_minutes(4).build(),
            Err(ConfigError::TransitionDurationOutOfRange { value: 4, .. })
        ));
        assert!(matches!(
            TemperatureConfig::builder().transition_minutes(121).build(),
            Err(ConfigError::TransitionDurationOutOfRange { .. })
        ));
        assert!(matches!(
            TemperatureConfig::builder().update_interval_secs(5).build(),
            Err(ConfigError::UpdateIntervalOutOfRange { .. })
        ));
        assert!(matches!(
            TemperatureConfig::builder().preview_duration_secs(0).build(),
            Err(ConfigError::PreviewDurationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_overlapping_transitions_rejected() {
        let err = TemperatureConfig::builder()
            .sunset(t(23, 30))
            .sunrise(t(0, 0))
            .transition_minutes(60)
            .transition_mode(TransitionMode::Center)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OverlappingTransitions { .. }));
    }

    #[test]
    fn test_identical_anchor_times_rejected() {
        let config = create_test_config("12:00:00", "12:00:00", 30, "start_at");
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::OverlappingTransitions { .. })
        ));
    }

    #[test]
    fn test_invalid_time_formats() {
        let config = create_test_config("25:00:00", "06:00:00", 30, "start_at");
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidTime { field: "sunset", .. })
        ));

        let config = create_test_config("19:00:00", "dawn", 30, "start_at");
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidTime { field: "sunrise", .. })
        ));

        assert_eq!(parse_time("sunset", "19:30").unwrap(), t(19, 30));
    }

    #[test]
    fn test_invalid_transition_mode() {
        let config = create_test_config("19:00:00", "06:00:00", 30, "sideways");
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::InvalidTransitionMode("sideways".to_string()))
        );
    }

    #[test]
    fn test_geo_mode_requires_coordinates() {
        let config = create_test_config("19:00:00", "06:00:00", 30, "geo");
        assert_eq!(
            config.resolve(today()),
            Err(ConfigError::MissingCoordinates)
        );
    }

    #[test]
    fn test_geo_mode_uses_provider_anchors() {
        let config = create_test_config("19:00:00", "06:00:00", 30, "geo");
        let provider = FixedGeoProvider::new(t(21, 0), t(5, 0));

        let resolved = config.resolve_with(&provider, today()).unwrap();
        assert_eq!(resolved.sunset(), t(21, 0));
        assert_eq!(resolved.sunrise(), t(5, 0));
        assert_eq!(resolved.transition_mode(), TransitionMode::Geo);
        assert_eq!(resolved.windows().sunset_start, t(20, 45));
    }

    #[test]
    fn test_non_geo_mode_ignores_provider() {
        let config = create_test_config("19:00:00", "06:00:00", 30, "start_at");
        let provider = FixedGeoProvider::new(t(21, 0), t(5, 0));

        let resolved = config.resolve_with(&provider, today()).unwrap();
        assert_eq!(resolved.sunset(), t(19, 0));
    }

    #[test]
    fn test_config_toml_parsing() {
        let content = r#"
backend = "dry_run"
fullscreen_blocking = false
sunset = "20:00:00"
sunrise = "07:00:00"
night_temp = 2700
day_temp = 6000
transition_duration = 45
transition_mode = "center"
update_interval = 30
preview_duration = 20
"#;
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle.toml");
        fs::write(&path, content).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.backend, Some(Backend::DryRun));
        assert_eq!(config.fullscreen_blocking, Some(false));
        assert_eq!(config.night_temp, Some(2700));

        let resolved = config.resolve(today()).unwrap();
        assert_eq!(resolved.day_temp(), 6000);
        assert_eq!(resolved.transition_mode(), TransitionMode::Center);
        assert_eq!(resolved.update_interval(), StdDuration::from_secs(30));
        assert_eq!(resolved.preview_duration(), StdDuration::from_secs(20));
        assert!(!resolved.fullscreen_blocking());
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle.toml");
        fs::write(&path, "night_temp = 3000\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.night_temp, Some(3000));
        assert_eq!(config.day_temp, Some(DEFAULT_DAY_TEMP));
        assert_eq!(config.sunset.as_deref(), Some(DEFAULT_SUNSET));
        assert_eq!(config.backend, Some(DEFAULT_BACKEND));
    }

    #[test]
    fn test_config_malformed_toml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle.toml");
        fs::write(&path, "night_temp = \"warm\"\n[[[").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_invalid_values_rejected_at_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle.toml");
        fs::write(&path, "night_temp = 7000\nday_temp = 6500\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_read_defers_validation() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle.toml");
        fs::write(&path, "night_temp = 7000\nday_temp = 6500\n").unwrap();

        let config = Config::read_from_path(&path).unwrap();
        assert_eq!(config.night_temp, Some(7000));
        assert_eq!(config.sunset.as_deref(), Some(DEFAULT_SUNSET));
        assert_eq!(
            config.resolve(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            Err(ConfigError::InvertedBounds {
                night: 7000,
                day: 6500
            })
        );

        // Syntax errors are still fatal
        fs::write(&path, "night_temp = [").unwrap();
        assert!(Config::read_from_path(&path).is_err());
    }

    #[test]
    fn test_load_from_missing_path() {
        let temp_dir = tempdir().unwrap();
        let result = Config::load_from_path(&temp_dir.path().join("missing.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_file_creation() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("lightcycle").join("lightcycle.toml");

        Config::create_default_config(&path).unwrap();
        assert!(path.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("#[Backend]"));
        assert!(content.contains("transition_mode = \"start_at\""));
        assert!(content.contains("#latitude"));

        // The generated file must load cleanly
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.transition_mode().unwrap(), TransitionMode::StartAt);
    }

    #[test]
    fn test_default_config_comments_aligned() {
        let content = ConfigBuilder::new()
            .add_section("Test")
            .add_setting("a", "1", "first")
            .add_setting("longer_key", "2", "second")
            .build();

        let columns: Vec<usize> = content
            .lines()
            .filter(|line| line.contains("= "))
            .filter_map(|line| line.find("# "))
            .collect();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], columns[1]);
    }

    #[test]
    #[serial]
    fn test_config_load_default_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("lightcycle").join("lightcycle.toml");

        let original = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        }

        let result = Config::load();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert!(result.is_ok());
        assert!(config_path.exists());
    }
}
