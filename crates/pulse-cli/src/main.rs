//! Pulse Client - relays a simulation output file to the processing server.
//!
//! Default behavior (`run`) waits for the configured input file, makes sure
//! the server is up, sends the file and stores the reply.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pulseclient")]
#[command(about = "Relay simulation output to the external processing server")]
struct Args {
    /// Configuration file (defaults to $PULSECLIENT_CONFIG, then ~/.pulseclient.ini)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Ensure the server is up, wait for the input file, send it, store the reply
    Run {
        /// Use the production path pair instead of the simulation one
        #[arg(long)]
        production: bool,

        /// Override the input file path
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override the response file path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Give up waiting after this many seconds (default: wait forever)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Send one file right away
    Send {
        /// File to send
        file: PathBuf,

        /// Write the server's reply here; without it no reply is read
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Report whether the server process is running
    Status,

    /// Start the server if it is not running
    Start,

    /// Run the reference echo server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on (defaults to the configured server port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Exit after answering one connection
        #[arg(long)]
        once: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Run {
            production: false,
            input: None,
            output: None,
            timeout: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the flag
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = commands::load_config(args.config.as_deref())?;

    match args.command.unwrap_or_default() {
        Command::Run {
            production,
            input,
            output,
            timeout,
        } => commands::run(&config, production, input, output, timeout).await,
        Command::Send { file, output } => commands::send(&config, &file, output.as_deref()).await,
        Command::Status => commands::status(&config).await,
        Command::Start => commands::start(&config).await,
        Command::Serve { host, port, once } => {
            commands::serve(&host, port.unwrap_or(config.server_port), once).await
        }
    }
}
