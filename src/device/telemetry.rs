use std::sync::atomic::{AtomicU32, Ordering};
use serde::Serialize;

use crate::device::codec::TelemetryUpdate;
use crate::device::types::{TelemetryChannel, TELEMETRY_CHANNELS};

/**
 * Latest value of every telemetry channel.
 *
 * Values are kept as f32 bit patterns in atomics: the session task writes them
 * while the display side reads on its own cadence, and neither waits on the other.
 */
#[derive(Debug)]
pub struct TelemetryStore {
    values: [AtomicU32; TELEMETRY_CHANNELS.len()],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub accelerometer: f32,
    pub gyroscope: f32,
    pub angle: f32,
    pub regulated_output: f32,
    pub pwm: f32,
}

impl TelemetryStore {
    pub fn new(default: f32) -> Self {
        TelemetryStore {
            values: std::array::from_fn(|_| AtomicU32::new(default.to_bits())),
        }
    }

    pub fn apply_update(&self, channel: TelemetryChannel, value: f32) {
        self.values[channel.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn apply(&self, update: TelemetryUpdate) {
        self.apply_update(update.channel, update.value);
    }

    pub fn get(&self, channel: TelemetryChannel) -> f32 {
        f32::from_bits(self.values[channel.index()].load(Ordering::Relaxed))
    }

    pub fn accelerometer(&self) -> f32 {
        self.get(TelemetryChannel::Accelerometer)
    }

    pub fn gyroscope(&self) -> f32 {
        self.get(TelemetryChannel::Gyroscope)
    }

    pub fn angle(&self) -> f32 {
        self.get(TelemetryChannel::Angle)
    }

    pub fn regulated_output(&self) -> f32 {
        self.get(TelemetryChannel::RegulatedOutput)
    }

    pub fn pwm(&self) -> f32 {
        self.get(TelemetryChannel::Pwm)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            accelerometer: self.accelerometer(),
            gyroscope: self.gyroscope(),
            angle: self.angle(),
            regulated_output: self.regulated_output(),
            pwm: self.pwm(),
        }
    }
}

impl std::fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "accelerometer {:.2}g, gyroscope {:.2}°/s, angle {:.2}°, regulator {:.2}, pwm {:.2}%",
            self.accelerometer,
            self.gyroscope,
            self.angle,
            self.regulated_output,
            self.pwm,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;

    #[test]
    fn starts_at_default() {
        let store = TelemetryStore::new(1.0);
        for channel in TELEMETRY_CHANNELS {
            assert_eq!(store.get(channel), 1.0);
        }
    }

    #[test]
    fn update_overwrites_one_channel() {
        let store = TelemetryStore::new(0.0);
        store.apply_update(TelemetryChannel::Gyroscope, -12.5);
        store.apply_update(TelemetryChannel::Gyroscope, 99.0);

        assert_eq!(store.gyroscope(), 99.0);
        assert_eq!(store.accelerometer(), 0.0);
        assert_eq!(store.angle(), 0.0);
        assert_eq!(store.regulated_output(), 0.0);
        assert_eq!(store.pwm(), 0.0);
    }

    #[test]
    fn nan_is_stored_as_is() {
        let store = TelemetryStore::new(0.0);
        store.apply_update(TelemetryChannel::Pwm, f32::NAN);
        assert!(store.pwm().is_nan());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let store = TelemetryStore::new(0.0);
        store.apply_update(TelemetryChannel::RegulatedOutput, 2.5);
        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(json["regulatedOutput"], 2.5);
        assert_eq!(json["angle"], 0.0);
    }

    #[test]
    fn readable_from_other_threads() {
        let store = Arc::new(TelemetryStore::new(0.0));
        store.apply_update(TelemetryChannel::Angle, 4.0);

        let reader = Arc::clone(&store);
        let angle = std::thread::spawn(move || reader.angle()).join().unwrap();
        assert_eq!(angle, 4.0);
    }
}
