use chrono::Utc;
use clap::{Parser, Subcommand};
use reqwest::Client;

use crate::config::Settings;
use crate::error::Result;
use crate::runtime;

#[derive(Parser)]
#[command(name = "meeting-caller", about = "Calls clients when their calendar meetings start")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server and the background polling loops (default).
    Serve,
    /// Run one poll-and-dispatch cycle and print the report.
    Trigger,
    /// List upcoming events and whether each is due for a call, without calling.
    Events,
    /// Fetch a single calendar event.
    Event { event_id: String },
    /// Look up a voice call by id.
    CallStatus { call_id: String },
}

pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Serve);
    if let Commands::Serve = command {
        return runtime::run_api(settings).await;
    }

    let dispatcher = runtime::build_dispatcher(&settings, Client::new());
    let output = match command {
        Commands::Serve => return Ok(()),
        Commands::Trigger => {
            serde_json::to_string_pretty(&dispatcher.run_cycle(Utc::now()).await?)?
        }
        Commands::Events => serde_json::to_string_pretty(&dispatcher.preview(Utc::now()).await?)?,
        Commands::Event { event_id } => {
            serde_json::to_string_pretty(&dispatcher.calendar().get_event(&event_id).await?)?
        }
        Commands::CallStatus { call_id } => {
            serde_json::to_string_pretty(&dispatcher.voice().call_status(&call_id).await?)?
        }
    };
    println!("{}", output);
    Ok(())
}
