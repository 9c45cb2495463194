//! `companion` - command-line access to a companion host.
//!
//! See the `companion_client` library for the client itself.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use companion_client::{commands, ClientConfig};

// CLI
#[derive(Parser)]
#[command(name = "companion")]
#[command(version)]
#[command(about = "Listen to and send packets through a companion host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every received packet as a JSON line until Ctrl-C
    Listen {
        /// Host URL (defaults to the configured URL)
        #[arg(long)]
        url: Option<String>,
        /// Only print packets of this type (repeatable)
        #[arg(long = "event")]
        events: Vec<String>,
    },
    /// Send a single packet once connected
    Send {
        /// Host URL (defaults to the configured URL)
        #[arg(long)]
        url: Option<String>,
        /// Packet type, e.g. tts_request
        #[arg(long = "type")]
        packet_type: String,
        /// Packet body as JSON; anything else is sent as a string
        #[arg(long)]
        body: Option<String>,
        /// Seconds to wait for the connection to open
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries packets.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load()?;

    match cli.command {
        Commands::Listen { url, events } => {
            let url = commands::resolve_url(url.as_deref(), &config)?;
            commands::listen(config, &url, &events).await?;
        }
        Commands::Send {
            url,
            packet_type,
            body,
            timeout,
        } => {
            let url = commands::resolve_url(url.as_deref(), &config)?;
            let body = commands::parse_body(body.as_deref());
            commands::send(config, &url, &packet_type, body, Duration::from_secs(timeout)).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
