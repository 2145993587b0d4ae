//! Per-station counters and the CSV/JSON result files built from them.
//!
//! Nothing in the hot loop returns a `Result` — a frame that collides or
//! overruns a full queue increments a counter here instead of raising an
//! error. The only fallible step is writing these counters out.

use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::error::SimError;
use crate::frame::FrameType;
use crate::station::StationId;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FrameTypeCount {
    pub count: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationStats {
    pub station_id: usize,
    pub sent: [FrameTypeCount; FrameType::COUNT],
    pub received: [FrameTypeCount; FrameType::COUNT],
    pub collisions: u64,
    pub wasted_ns: u64,
}

impl StationStats {
    pub fn new(station_id: StationId) -> Self {
        StationStats {
            station_id: station_id.0,
            sent: Default::default(),
            received: Default::default(),
            collisions: 0,
            wasted_ns: 0,
        }
    }

    /// Increments the counter for `frame_type`. The fixed-size array
    /// already holds a slot per type, so "upsert" here just means
    /// "increment in place" — there is never a missing slot to create.
    pub fn add_sent_record(&mut self, frame_type: FrameType, bytes: f64) {
        let slot = &mut self.sent[frame_type.index()];
        slot.count += 1;
        slot.bytes += bytes as u64;
    }

    pub fn add_recv_record(&mut self, frame_type: FrameType, bytes: f64) {
        let slot = &mut self.received[frame_type.index()];
        slot.count += 1;
        slot.bytes += bytes as u64;
    }

    pub fn add_collision(&mut self) {
        self.collisions += 1;
    }

    pub fn add_wasted(&mut self, duration_ns: u64) {
        self.wasted_ns += duration_ns;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Wall-clock time the run finished, RFC 3339 — purely diagnostic,
    /// distinct from any simulated timestamp.
    pub generated_at: String,
    pub config: ConfigSummary,
    pub stations: Vec<StationStats>,
}

/// The subset of `Config` worth recording alongside results; mirrors the
/// fields that vary across a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub station_count: usize,
    pub star_topology: bool,
    pub with_rts: bool,
    pub frame_rate: f64,
    pub horizon: u64,
    pub seed: u64,
}

impl From<&Config> for ConfigSummary {
    fn from(config: &Config) -> Self {
        ConfigSummary {
            station_count: config.station_count,
            star_topology: config.star_topology,
            with_rts: config.with_rts,
            frame_rate: config.frame_rate,
            horizon: config.horizon,
            seed: config.seed,
        }
    }
}

impl RunResult {
    pub fn new(config: &Config, stations: Vec<StationStats>) -> Self {
        RunResult {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config: config.into(),
            stations,
        }
    }

    /// One CSV row per station: id, then sent/received count+bytes per
    /// frame type, then collisions and wasted time.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "station_id,sent_data,sent_data_bytes,sent_rts,sent_rts_bytes,sent_cts,sent_cts_bytes,\
sent_ack,sent_ack_bytes,recv_data,recv_data_bytes,recv_rts,recv_rts_bytes,recv_cts,recv_cts_bytes,\
recv_ack,recv_ack_bytes,collisions,wasted_ns\n",
        );
        for station in &self.stations {
            out.push_str(&station.station_id.to_string());
            for count in station.sent.iter().chain(station.received.iter()) {
                out.push(',');
                out.push_str(&count.count.to_string());
                out.push(',');
                out.push_str(&count.bytes.to_string());
            }
            out.push(',');
            out.push_str(&station.collisions.to_string());
            out.push(',');
            out.push_str(&station.wasted_ns.to_string());
            out.push('\n');
        }
        out
    }

    /// Writes `<results_dir>/<summary>.csv` and a sibling `.json` summary.
    pub fn write_to(&self, results_dir: &Path, summary: &str) -> Result<(), SimError> {
        std::fs::create_dir_all(results_dir)
            .map_err(|e| SimError::Report(format!("{}: {e}", results_dir.display())))?;

        let csv_path = results_dir.join(format!("{summary}.csv"));
        std::fs::write(&csv_path, self.to_csv())
            .map_err(|e| SimError::Report(format!("{}: {e}", csv_path.display())))?;

        let json_path = results_dir.join(format!("{summary}.json"));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SimError::Report(format!("{summary}.json: {e}")))?;
        std::fs::write(&json_path, json)
            .map_err(|e| SimError::Report(format!("{}: {e}", json_path.display())))?;

        Ok(())
    }
}
