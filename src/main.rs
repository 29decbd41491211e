use cdn_updater::{exit_code, run, Cli};
use clap::Parser;
use core_runtime::logging::{init_logging, LogLevel, LoggingConfig};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_format(cli.log_format)
        .with_level(LogLevel::from_verbosity(cli.verbose));
    if let Err(e) = init_logging(logging) {
        eprintln!("cdn-updater: {e}");
        return ExitCode::FAILURE;
    }

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let result = run(&config).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "CDN update failed");
    }
    exit_code(&result)
}
