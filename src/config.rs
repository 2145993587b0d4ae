//! Simulation configuration: the recognized option set for a single run
//! or a full parameter sweep.
//!
//! Loaded from an optional TOML file, then merged with CLI overrides.
//! Every field has a default so a bare `csma-sim` invocation runs a
//! single simulation with no configuration file at all.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// One simulated second, in the logical nanosecond units the `Timeline`
/// advances by.
pub const ONE_SECOND: u64 = 1_000_000_000;

/// Default full-size DATA frame, 1500 bytes expressed in bits.
pub const FRAME_SIZE: f64 = 1500.0 * 8.0;

/// Size of RTS/CTS/ACK control frames, in bits. Real 802.11 control frames
/// are small and roughly equal in size to each other; a single constant
/// keeps `Csma::cts_duration` simple without inventing distinct per-type
/// payload sizes.
pub const CONTROL_FRAME_SIZE: f64 = 160.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub station_count: usize,
    pub area_size: f64,
    pub star_topology: bool,
    /// Length units per simulated nanosecond.
    pub propagation_speed: f64,
    /// Size units (bits, by default) transmitted per simulated second.
    pub data_rate: f64,
    /// New DATA frames generated per station per simulated second.
    pub frame_rate: f64,
    pub detect_range: f64,
    /// Backoff slot duration, in simulated nanoseconds.
    pub slot_time: u64,
    pub with_rts: bool,
    /// Enable the after-tick ASCII visualization hook.
    pub log: bool,
    /// Simulation horizon, in simulated nanoseconds.
    pub horizon: u64,

    pub sifs_amount: u64,
    pub difs_amount: u64,
    pub cw_min: u64,
    pub cw_max: u64,
    pub frame_size: f64,

    /// Bound on each transmitter's send/receive queues. `None` means
    /// unbounded.
    pub queue_size: Option<usize>,

    /// Seeds the station-placement and backoff RNGs; two runs with the
    /// same seed and config produce identical counter totals.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station_count: 2,
            area_size: 100.0,
            star_topology: false,
            propagation_speed: 3.0e8 / ONE_SECOND as f64,
            data_rate: 1.0e7,
            frame_rate: 100.0,
            detect_range: 20.0,
            slot_time: 20_000,
            with_rts: false,
            log: false,
            horizon: ONE_SECOND,
            sifs_amount: 10_000,
            difs_amount: 50_000,
            cw_min: 31,
            cw_max: 1023,
            frame_size: FRAME_SIZE,
            queue_size: Some(32),
            seed: 0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SimError::Config(format!("{} ({})", e, path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.station_count == 0 {
            return Err(SimError::Config("station_count must be > 0".into()));
        }
        if self.area_size <= 0.0 {
            return Err(SimError::Config("area_size must be > 0".into()));
        }
        if self.propagation_speed <= 0.0 {
            return Err(SimError::Config("propagation_speed must be > 0".into()));
        }
        if self.data_rate <= 0.0 {
            return Err(SimError::Config("data_rate must be > 0".into()));
        }
        if self.frame_rate < 0.0 {
            return Err(SimError::Config("frame_rate must be >= 0".into()));
        }
        if self.detect_range <= 0.0 {
            return Err(SimError::Config("detect_range must be > 0".into()));
        }
        if self.slot_time == 0 {
            return Err(SimError::Config("slot_time must be > 0".into()));
        }
        if self.cw_min > self.cw_max {
            return Err(SimError::Config("cw_min must be <= cw_max".into()));
        }
        if self.horizon == 0 {
            return Err(SimError::Config("horizon must be > 0".into()));
        }
        Ok(())
    }

    /// Applies `--set key=value` overrides on top of the current values.
    /// Each value is parsed as a bool, integer, or float before falling
    /// back to a bare string, and written into the field named by `key`,
    /// which must match a `Config` field in kebab-case.
    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<(), SimError> {
        if overrides.is_empty() {
            return Ok(());
        }
        let mut table = toml::Value::try_from(&*self)
            .map_err(|e| SimError::Config(format!("serializing config for override: {e}")))?;
        let Some(map) = table.as_table_mut() else {
            return Err(SimError::Config("config did not serialize to a table".into()));
        };
        for entry in overrides {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| SimError::Config(format!("--set {entry}: expected key=value")))?;
            if !map.contains_key(key) {
                return Err(SimError::Config(format!("--set {entry}: unknown field {key}")));
            }
            map.insert(key.to_string(), parse_override_scalar(value));
        }
        *self = table
            .try_into()
            .map_err(|e| SimError::Config(format!("applying --set overrides: {e}")))?;
        self.validate()
    }

    /// A filesystem- and human-readable summary of the tuple, used both for
    /// the CSV/JSON result filenames and for `--pass-done` existence checks.
    pub fn summary(&self) -> String {
        format!(
            "stations{}_{}_{}_rate{}",
            self.station_count,
            if self.star_topology { "star" } else { "random" },
            if self.with_rts { "rts" } else { "normal" },
            self.frame_rate as u64,
        )
    }
}

/// One axis of the default parameter sweep, run via `--simulation`:
/// a field name (documentation only) and the values of `Config` it varies.
pub struct SweepAxis {
    pub station_counts: Vec<usize>,
    pub star_topology: Vec<bool>,
    pub with_rts: Vec<bool>,
    pub frame_rates: Vec<f64>,
}

impl Default for SweepAxis {
    fn default() -> Self {
        SweepAxis {
            station_counts: vec![2, 5, 10],
            star_topology: vec![false, true],
            with_rts: vec![false, true],
            frame_rates: vec![10.0, 50.0, 100.0],
        }
    }
}

fn parse_override_scalar(value: &str) -> toml::Value {
    if let Ok(b) = value.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(value.to_string())
    }
}

/// Cartesian product of `axis` over a `base` configuration.
pub fn build_sweep(base: &Config, axis: &SweepAxis) -> Vec<Config> {
    let mut settings = Vec::new();
    for &station_count in &axis.station_counts {
        for &star_topology in &axis.star_topology {
            for &with_rts in &axis.with_rts {
                for &frame_rate in &axis.frame_rates {
                    let mut config = base.clone();
                    config.station_count = station_count;
                    config.star_topology = star_topology;
                    config.with_rts = with_rts;
                    config.frame_rate = frame_rate;
                    settings.push(config);
                }
            }
        }
    }
    settings
}
