use serde::{Deserialize, Serialize};

use crate::device::constants::DEFAULT_TELEMETRY_VALUE;
use crate::device::types::{TuningParameter, TuningValues};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Tuning values the session starts with. Changes made while running are not written back.
    pub tuning: TuningValues,
    pub telemetry_default: f32,
    /// How often (milliseconds) the telemetry snapshot is logged.
    pub snapshot_interval_ms: u64,
    pub auto_connect: bool,
}

impl Config {
    pub fn with_tuning_override(mut self, parameter: TuningParameter, value: Option<f32>) -> Self {
        if let Some(value) = value {
            self.tuning.set(parameter, value);
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tuning: TuningValues::default(),
            telemetry_default: DEFAULT_TELEMETRY_VALUE,
            snapshot_interval_ms: 100,
            auto_connect: false,
        }
    }
}
