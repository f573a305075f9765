#![allow(non_snake_case)]

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use meetingCaller::cli::{self, Cli};
use meetingCaller::config::Settings;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = cli::run(cli, settings).await {
        error!(error = %err, "command failed");
        std::process::exit(1);
    }
}
