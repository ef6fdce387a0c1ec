use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::constants::{DEFAULT_DERIVATIVE_GAIN, DEFAULT_INTEGRAL_GAIN, DEFAULT_OUTPUT_SCALE, DEFAULT_PROPORTIONAL_GAIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Initial,
    Searching,
    Connecting,
    Ready,
    Disconnected,
    LostConnection,
    AdapterOff,
    AdapterResetting,
    Unauthorized,
    AdapterStateUnknown,
    Unsupported,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ConnectionState::Initial => "Not connected",
            ConnectionState::Searching => "Searching",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Ready => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::LostConnection => "Connection lost",
            ConnectionState::AdapterOff => "Bluetooth is powered off",
            ConnectionState::AdapterResetting => "Bluetooth is resetting",
            ConnectionState::Unauthorized => "Bluetooth access not authorized",
            ConnectionState::AdapterStateUnknown => "Bluetooth state unknown",
            ConnectionState::Unsupported => "Bluetooth LE not available",
        };

        write!(f, "{}", result)
    }
}

/**
 * Power state reported by the radio adapter.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterPower {
    PoweredOn,
    PoweredOff,
    Resetting,
    Unauthorized,
    Unknown,
    Unsupported,
}

impl AdapterPower {
    /// The connection state that reflects this power state, `None` when powered on.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        match self {
            AdapterPower::PoweredOn => None,
            AdapterPower::PoweredOff => Some(ConnectionState::AdapterOff),
            AdapterPower::Resetting => Some(ConnectionState::AdapterResetting),
            AdapterPower::Unauthorized => Some(ConnectionState::Unauthorized),
            AdapterPower::Unknown => Some(ConnectionState::AdapterStateUnknown),
            AdapterPower::Unsupported => Some(ConnectionState::Unsupported),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuningParameter {
    ProportionalGain,
    IntegralGain,
    DerivativeGain,
    OutputScale,
}

pub const TUNING_PARAMETERS: [TuningParameter; 4] = [
    TuningParameter::ProportionalGain,
    TuningParameter::IntegralGain,
    TuningParameter::DerivativeGain,
    TuningParameter::OutputScale,
];

impl TuningParameter {
    pub fn opcode(&self) -> u8 {
        match self {
            TuningParameter::ProportionalGain => 0x00,
            TuningParameter::IntegralGain => 0x01,
            TuningParameter::DerivativeGain => 0x02,
            TuningParameter::OutputScale => 0x03,
        }
    }
}

impl std::fmt::Display for TuningParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            TuningParameter::ProportionalGain => "kP",
            TuningParameter::IntegralGain => "kI",
            TuningParameter::DerivativeGain => "kD",
            TuningParameter::OutputScale => "PWM scale",
        };

        write!(f, "{}", result)
    }
}

/**
 * Current value of every tuning parameter, as last set by the user.
 */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TuningValues {
    pub proportional_gain: f32,
    pub integral_gain: f32,
    pub derivative_gain: f32,
    pub output_scale: f32,
}

impl TuningValues {
    pub fn get(&self, parameter: TuningParameter) -> f32 {
        match parameter {
            TuningParameter::ProportionalGain => self.proportional_gain,
            TuningParameter::IntegralGain => self.integral_gain,
            TuningParameter::DerivativeGain => self.derivative_gain,
            TuningParameter::OutputScale => self.output_scale,
        }
    }

    pub fn set(&mut self, parameter: TuningParameter, value: f32) {
        let slot = match parameter {
            TuningParameter::ProportionalGain => &mut self.proportional_gain,
            TuningParameter::IntegralGain => &mut self.integral_gain,
            TuningParameter::DerivativeGain => &mut self.derivative_gain,
            TuningParameter::OutputScale => &mut self.output_scale,
        };
        *slot = value;
    }
}

impl Default for TuningValues {
    fn default() -> Self {
        TuningValues {
            proportional_gain: DEFAULT_PROPORTIONAL_GAIN,
            integral_gain: DEFAULT_INTEGRAL_GAIN,
            derivative_gain: DEFAULT_DERIVATIVE_GAIN,
            output_scale: DEFAULT_OUTPUT_SCALE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryChannel {
    Accelerometer,
    Gyroscope,
    Angle,
    RegulatedOutput,
    Pwm,
}

pub const TELEMETRY_CHANNELS: [TelemetryChannel; 5] = [
    TelemetryChannel::Accelerometer,
    TelemetryChannel::Gyroscope,
    TelemetryChannel::Angle,
    TelemetryChannel::RegulatedOutput,
    TelemetryChannel::Pwm,
];

impl TelemetryChannel {
    pub fn from_opcode(opcode: u8) -> Option<TelemetryChannel> {
        TELEMETRY_CHANNELS.get(usize::from(opcode)).copied()
    }

    pub fn opcode(&self) -> u8 {
        *self as u8
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/**
 * Everything a radio adapter reports back, in delivery order.
 * `D` is the adapter's device handle and `C` its characteristic handle.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent<D, C> {
    PowerChanged(AdapterPower),
    DeviceDiscovered {
        device: D,
        local_name: Option<String>,
    },
    Connected(D),
    ServicesDiscovered {
        device: D,
        services: Vec<Uuid>,
    },
    CharacteristicsDiscovered {
        device: D,
        service: Uuid,
        characteristics: Vec<C>,
    },
    ValueUpdated {
        characteristic: Uuid,
        value: Vec<u8>,
    },
    Disconnected(D),
    /// The link could not be established.
    ConnectFailed(D),
    /// A requested disconnect did not happen; the link is still up.
    DisconnectFailed(D),
}

/**
 * Requests from the user, handed to a running client session.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserCommand {
    Connect,
    Disconnect,
    SetParameter(TuningParameter, f32),
}
