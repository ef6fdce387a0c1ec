use std::time::Duration;
use log::{info, warn};
use serde_json::json;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::session::ClientHandle;
use crate::device::telemetry::TelemetrySnapshot;
use crate::device::types::{ConnectionState, TuningParameter, TuningValues, TUNING_PARAMETERS};
use crate::error::CommandParseError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Set(TuningParameter, f32),
    Status,
    Quit,
}

fn parse_parameter(word: &str) -> Option<TuningParameter> {
    match word {
        "kp" => Some(TuningParameter::ProportionalGain),
        "ki" => Some(TuningParameter::IntegralGain),
        "kd" => Some(TuningParameter::DerivativeGain),
        "scale" => Some(TuningParameter::OutputScale),
        _ => None,
    }
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandParseError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let word = word.to_lowercase();

    let command = match word.as_str() {
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => {
            let parameter = parse_parameter(other)
                .ok_or_else(|| CommandParseError::UnknownCommand(other.to_string()))?;
            let value = words.next().ok_or(CommandParseError::MissingValue(parameter))?;
            ConsoleCommand::Set(parameter, value.parse::<f32>()?)
        },
    };

    if let Some(extra) = words.next() {
        return Err(CommandParseError::UnexpectedArgument(extra.to_string()));
    }
    Ok(Some(command))
}

fn format_tuning(tuning: &TuningValues) -> String {
    TUNING_PARAMETERS
        .iter()
        .map(|parameter| format!("{}={}", parameter, tuning.get(*parameter)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_status(state: ConnectionState, tuning: &TuningValues, snapshot: &TelemetrySnapshot, as_json: bool) {
    if as_json {
        info!("{}", json!({ "state": state, "tuning": tuning, "telemetry": snapshot }));
    } else {
        info!("[{}] {} | {}", state, format_tuning(tuning), snapshot);
    }
}

/**
 * Applies stdin commands to the client until "quit" or end of input, then cancels `cancel`.
 */
pub async fn read_commands(cancel: CancellationToken, client: ClientHandle, as_json: bool) -> Result<(), std::io::Error> {
    let mut lines = BufReader::new(stdin()).lines();

    'mainloop: loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break 'mainloop,
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            break 'mainloop;
        };

        match parse_command(&line) {
            Ok(None) => {},
            Ok(Some(ConsoleCommand::Connect)) => client.connect(),
            Ok(Some(ConsoleCommand::Disconnect)) => client.disconnect(),
            Ok(Some(ConsoleCommand::Set(parameter, value))) => {
                info!("Setting {} to {}", parameter, value);
                client.set_parameter(parameter, value);
            },
            Ok(Some(ConsoleCommand::Status)) => log_status(client.state(), &client.tuning(), &client.telemetry().snapshot(), as_json),
            Ok(Some(ConsoleCommand::Quit)) => break 'mainloop,
            Err(err) => warn!("{}", err),
        }
    }

    cancel.cancel();
    Ok(())
}

/**
 * Samples the client every `interval` and logs state and telemetry whenever either changed.
 */
pub fn snapshot_task(cancel: CancellationToken, client: ClientHandle, interval: Duration, as_json: bool) -> JoinHandle<()> {
    spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut previous: Option<(ConnectionState, TuningValues, TelemetrySnapshot)> = None;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                _ = ticker.tick() => {
                    let current = (client.state(), client.tuning(), client.telemetry().snapshot());
                    if previous.as_ref() != Some(&current) {
                        log_status(current.0, &current.1, &current.2, as_json);
                        previous = Some(current);
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("connect").unwrap(), Some(ConsoleCommand::Connect));
        assert_eq!(parse_command("  Disconnect ").unwrap(), Some(ConsoleCommand::Disconnect));
        assert_eq!(parse_command("status").unwrap(), Some(ConsoleCommand::Status));
        assert_eq!(parse_command("exit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn parses_tuning_values() {
        assert_eq!(parse_command("kp 0.89").unwrap(), Some(ConsoleCommand::Set(TuningParameter::ProportionalGain, 0.89)));
        assert_eq!(parse_command("KI -1").unwrap(), Some(ConsoleCommand::Set(TuningParameter::IntegralGain, -1.0)));
        assert_eq!(parse_command("kd 2e-1").unwrap(), Some(ConsoleCommand::Set(TuningParameter::DerivativeGain, 0.2)));
        assert_eq!(parse_command("scale 1.5").unwrap(), Some(ConsoleCommand::Set(TuningParameter::OutputScale, 1.5)));
    }

    #[test]
    fn formats_tuning_in_opcode_order() {
        let tuning = TuningValues {
            proportional_gain: 0.89,
            integral_gain: 0.0,
            derivative_gain: 0.22,
            output_scale: 1.5,
        };
        assert_eq!(format_tuning(&tuning), "kP=0.89 kI=0 kD=0.22 PWM scale=1.5");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_command("fly"), Err(CommandParseError::UnknownCommand("fly".to_string())));
        assert_eq!(parse_command("kp"), Err(CommandParseError::MissingValue(TuningParameter::ProportionalGain)));
        assert!(matches!(parse_command("kp fast"), Err(CommandParseError::InvalidValue { .. })));
        assert_eq!(parse_command("connect now"), Err(CommandParseError::UnexpectedArgument("now".to_string())));
    }
}
