//! hbrpc - Command-line interface for the HBase Thrift gateway
//!
//! Runs one command per invocation.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hbrpc_client::{Client, ConnectionConfig, ProtocolKind, DEFAULT_PORT};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hbrpc")]
#[command(about = "Command-line interface for the HBase Thrift gateway")]
#[command(version)]
struct Cli {
    /// Gateway host
    #[arg(short = 'H', long, env = "HBRPC_HOST", default_value = "localhost")]
    host: String,

    /// Gateway port
    #[arg(short, long, env = "HBRPC_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Gateway URL; selects the HTTP transport instead of a socket
    #[arg(long, env = "HBRPC_URL")]
    url: Option<String>,

    /// Wire protocol (binary or compact)
    #[arg(long, env = "HBRPC_PROTOCOL", default_value = "binary")]
    protocol: ProtocolKind,

    /// Use the framed socket transport
    #[arg(long)]
    framed: bool,

    /// Per-call timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the gateway answers
    Ping,

    /// List tables
    Tables,

    /// Show the column families of a table
    Describe {
        /// Table name
        table: String,
    },

    /// Show the regions of a table
    Regions {
        /// Table name
        table: String,
    },

    /// Fetch one row
    Get {
        /// Table name
        table: String,

        /// Row key
        row: String,

        /// Restrict to these columns (family:qualifier)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Scan rows
    Scan {
        /// Table name
        table: String,

        /// First row (inclusive)
        #[arg(long)]
        start: Option<String>,

        /// Last row (exclusive)
        #[arg(long)]
        stop: Option<String>,

        /// Only rows starting with this prefix
        #[arg(long, conflicts_with_all = ["start", "stop"])]
        prefix: Option<String>,

        /// Restrict to these columns (family:qualifier)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Server-side filter expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum rows to print
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Rows fetched per round trip
        #[arg(long, default_value = "50")]
        batch: i32,
    },

    /// Write one cell
    Put {
        /// Table name
        table: String,

        /// Row key
        row: String,

        /// Column (family:qualifier)
        column: String,

        /// Cell value
        value: String,
    },

    /// Delete a cell, or a whole row when no column is given
    Delete {
        /// Table name
        table: String,

        /// Row key
        row: String,

        /// Column (family:qualifier)
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Atomically increment a counter cell
    Incr {
        /// Table name
        table: String,

        /// Row key
        row: String,

        /// Column (family:qualifier)
        column: String,

        /// Amount to add
        #[arg(short, long, default_value = "1", allow_hyphen_values = true)]
        by: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.url {
        Some(ref url) => ConnectionConfig::http(url.as_str()),
        None if cli.framed => ConnectionConfig::socket(cli.host.as_str(), cli.port).with_framed(),
        None => ConnectionConfig::socket(cli.host.as_str(), cli.port),
    }
    .with_protocol(cli.protocol)
    .with_request_timeout(Duration::from_secs(cli.timeout));

    let mut client = Client::new(config).map_err(|e| {
        eprintln!("{}: {}", "Invalid gateway address".red(), e);
        e
    })?;
    client.open().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    let result = commands::execute(&mut client, cli.command, cli.json).await;
    if let Err(e) = client.close().await {
        tracing::warn!("Close failed: {}", e);
    }

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
