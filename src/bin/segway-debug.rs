use clap::Parser;
use log::{error, info};
use segway_debug::cli::Args;
use segway_debug::error::{AppRunError, ConfigError};
use segway_debug::{init_logging, run};

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    init_logging();
    info!(concat!("Segway Debug ", env!("CARGO_PKG_VERSION")));

    match run(args).await {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("This application has already been started");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
