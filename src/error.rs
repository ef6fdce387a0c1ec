use std::io;
use std::num::ParseFloatError;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

use crate::device::types::TuningParameter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to read commands: {source}")]
    IOError { #[from] source: io::Error },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("The service {0} was not discovered on the peripheral")]
    MissingService(uuid::Uuid),
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeviceError::Btle { source: btleplug::Error::PermissionDenied })
    }
}

/**
 * Inbound telemetry frames that could not be turned into an update.
 * None of these are fatal; the frame is dropped.
 */
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Telemetry frame has unexpected length {0} (expected 1 or 4)")]
    UnexpectedLength(usize),

    #[error("Telemetry value received for unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Telemetry value received without a preceding opcode")]
    MissingOpcode,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown command \"{0}\"; expected connect, disconnect, kp, ki, kd, scale, status or quit")]
    UnknownCommand(String),

    #[error("Missing value for {0}")]
    MissingValue(TuningParameter),

    #[error("Invalid value: {source}")]
    InvalidValue { #[from] source: ParseFloatError },

    #[error("Unexpected argument \"{0}\"")]
    UnexpectedArgument(String),
}
