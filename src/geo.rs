//! Sunrise/sunset anchors for geo mode.
//!
//! The daemon resolves anchors once per calendar day and hands the engine a
//! fresh [`TemperatureConfig`](crate::config::TemperatureConfig); nothing here
//! is consulted per tick.

use chrono::{Local, NaiveDate, NaiveTime};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use crate::error::ConfigError;
use crate::logger::Log;

/// Beyond this latitude the sun may not rise or set for weeks, so coordinates
/// are clamped to keep both events defined.
const MAX_SOLAR_LATITUDE: f64 = 65.0;

/// Local sunset and sunrise for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarTimes {
    pub sunset: NaiveTime,
    pub sunrise: NaiveTime,
}

/// Source of sunset/sunrise anchors.
pub trait GeoProvider {
    fn solar_times(&self, date: NaiveDate) -> Result<SolarTimes, ConfigError>;
}

/// Computes solar events from coordinates with the `sunrise` crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarGeoProvider {
    latitude: f64,
    longitude: f64,
}

impl SolarGeoProvider {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ConfigError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ConfigError::CoordinateOutOfRange {
                field: "latitude",
                value: latitude,
                min: -90.0,
                max: 90.0,
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::CoordinateOutOfRange {
                field: "longitude",
                value: longitude,
                min: -180.0,
                max: 180.0,
            });
        }

        let latitude = if latitude.abs() > MAX_SOLAR_LATITUDE {
            Log::log_debug(&format!(
                "Latitude {:.4}° clamped to ±{:.0}° for solar calculations",
                latitude, MAX_SOLAR_LATITUDE
            ));
            MAX_SOLAR_LATITUDE * latitude.signum()
        } else {
            latitude
        };

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl GeoProvider for SolarGeoProvider {
    fn solar_times(&self, date: NaiveDate) -> Result<SolarTimes, ConfigError> {
        let coord = Coordinates::new(self.latitude, self.longitude).ok_or_else(|| {
            ConfigError::GeoLookup(format!(
                "invalid coordinates {:.4}°, {:.4}°",
                self.latitude, self.longitude
            ))
        })?;

        let solar_day = SolarDay::new(coord, date);
        let sunrise = solar_day
            .event_time(SolarEvent::Sunrise)
            .with_timezone(&Local)
            .time();
        let sunset = solar_day
            .event_time(SolarEvent::Sunset)
            .with_timezone(&Local)
            .time();

        if sunrise == sunset {
            return Err(ConfigError::GeoLookup(format!(
                "no distinct sunrise and sunset on {}",
                date
            )));
        }

        Log::log_debug(&format!(
            "Solar times for {}: sunrise {}, sunset {}",
            date,
            sunrise.format("%H:%M:%S"),
            sunset.format("%H:%M:%S")
        ));

        Ok(SolarTimes { sunset, sunrise })
    }
}

/// Fixed anchors, for tests and manual overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedGeoProvider {
    times: SolarTimes,
}

impl FixedGeoProvider {
    pub fn new(sunset: NaiveTime, sunrise: NaiveTime) -> Self {
        Self {
            times: SolarTimes { sunset, sunrise },
        }
    }
}

impl GeoProvider for FixedGeoProvider {
    fn solar_times(&self, _date: NaiveDate) -> Result<SolarTimes, ConfigError> {
        Ok(self.times)
    }
}
