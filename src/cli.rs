use std::path::PathBuf;
use clap::Parser;

use crate::config::types::Config;
use crate::device::types::TuningParameter;

/// Connects to the Segway over bluetooth, sends tuning values and logs its telemetry.
///
/// Commands are read from stdin, one per line: connect, disconnect, kp <value>,
/// ki <value>, kd <value>, scale <value>, status, quit.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Connect immediately on startup
    #[arg(long)]
    pub connect: bool,

    /// Initial proportional gain
    #[arg(long)]
    pub kp: Option<f32>,

    /// Initial integral gain
    #[arg(long)]
    pub ki: Option<f32>,

    /// Initial derivative gain
    #[arg(long)]
    pub kd: Option<f32>,

    /// Initial PWM output scale
    #[arg(long)]
    pub pwm_scale: Option<f32>,

    /// Log telemetry snapshots as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Command line values take precedence over the config file.
    pub fn apply(&self, config: Config) -> Config {
        let mut config = config
            .with_tuning_override(TuningParameter::ProportionalGain, self.kp)
            .with_tuning_override(TuningParameter::IntegralGain, self.ki)
            .with_tuning_override(TuningParameter::DerivativeGain, self.kd)
            .with_tuning_override(TuningParameter::OutputScale, self.pwm_scale);

        if self.connect {
            config.auto_connect = true;
        }
        config
    }
}
