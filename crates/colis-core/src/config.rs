//! Station configuration
//!
//! Every option has a default matching the reference deployment; a JSON
//! document and `COLIS_*` environment variables can override any subset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ColisError, ColisResult};

/// Default stream endpoint of the local detector
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/ws";

/// Industry divisor turning cm³ into volumetric kg
pub const VOLUMETRIC_DIVISOR: f64 = 5000.0;

/// Largest accepted cadence window
pub const MAX_FPS_WINDOW: usize = 1000;

/// Station configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StationConfig {
    /// Stream endpoint
    pub url: String,
    /// Monetary rate applied to the final weight
    pub rate_per_kg: f64,
    /// Age at which a record is presumed gone from view
    pub staleness_threshold_ms: u64,
    /// Period of the eviction sweep
    pub eviction_interval_ms: u64,
    /// Fixed reconnect backoff
    pub reconnect_delay_ms: u64,
    /// Cadence sample count
    pub fps_window_size: usize,
    /// Allowed zoom factors, inclusive
    pub zoom_range: [f64; 2],
    pub initial_zoom: f64,
    pub volumetric_divisor: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            url: DEFAULT_STREAM_URL.to_owned(),
            rate_per_kg: 5.0,
            staleness_threshold_ms: 30_000,
            eviction_interval_ms: 5_000,
            reconnect_delay_ms: 1_000,
            fps_window_size: 10,
            zoom_range: [0.5, 1.5],
            initial_zoom: 0.9,
            volumetric_divisor: VOLUMETRIC_DIVISOR,
        }
    }
}

impl StationConfig {
    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> ColisResult<Self> {
        serde_json::from_str(json).map_err(|e| ColisError::InvalidConfig(e.to_string()))
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn zoom_min(&self) -> f64 {
        self.zoom_range[0]
    }

    pub fn zoom_max(&self) -> f64 {
        self.zoom_range[1]
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> ColisResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ColisResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COLIS_URL") {
            self.url = url;
        }
        if let Some(rate) = lookup("COLIS_RATE_PER_KG") {
            self.rate_per_kg = rate
                .trim()
                .parse()
                .map_err(|_| invalid("COLIS_RATE_PER_KG", &rate))?;
        }
        if let Some(value) = lookup("COLIS_STALENESS") {
            self.staleness_threshold_ms = parse_millis("COLIS_STALENESS", &value)?;
        }
        if let Some(value) = lookup("COLIS_EVICTION_INTERVAL") {
            self.eviction_interval_ms = parse_millis("COLIS_EVICTION_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("COLIS_RECONNECT_DELAY") {
            self.reconnect_delay_ms = parse_millis("COLIS_RECONNECT_DELAY", &value)?;
        }
        if let Some(value) = lookup("COLIS_FPS_WINDOW") {
            self.fps_window_size = value
                .trim()
                .parse()
                .map_err(|_| invalid("COLIS_FPS_WINDOW", &value))?;
        }
        Ok(())
    }

    /// Reject configurations the station cannot run with
    pub fn validate(&self) -> ColisResult<()> {
        if !(self.rate_per_kg.is_finite() && self.rate_per_kg > 0.0) {
            return Err(ColisError::InvalidConfig(format!(
                "ratePerKg must be positive, got {}",
                self.rate_per_kg
            )));
        }
        if !(self.volumetric_divisor.is_finite() && self.volumetric_divisor > 0.0) {
            return Err(ColisError::InvalidConfig(format!(
                "volumetricDivisor must be positive, got {}",
                self.volumetric_divisor
            )));
        }
        if self.staleness_threshold_ms == 0
            || self.eviction_interval_ms == 0
            || self.reconnect_delay_ms == 0
        {
            return Err(ColisError::InvalidConfig(
                "durations must be non-zero".into(),
            ));
        }
        if self.fps_window_size == 0 || self.fps_window_size > MAX_FPS_WINDOW {
            return Err(ColisError::InvalidConfig(format!(
                "fpsWindowSize must be within 1..={}, got {}",
                MAX_FPS_WINDOW, self.fps_window_size
            )));
        }
        let [min, max] = self.zoom_range;
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(ColisError::InvalidConfig(format!(
                "zoomRange must satisfy 0 < min <= max, got [{}, {}]",
                min, max
            )));
        }
        if !(min..=max).contains(&self.initial_zoom) {
            return Err(ColisError::InvalidConfig(format!(
                "initialZoom {} outside zoomRange [{}, {}]",
                self.initial_zoom, min, max
            )));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, value: &str) -> ColisResult<u64> {
    humantime::parse_duration(value.trim())
        .map(|d| d.as_millis() as u64)
        .map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ColisError {
    ColisError::InvalidConfig(format!("{}: cannot parse {:?}", key, value))
}
