mod decode;
mod info;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a raw downlink capture into logical packets.
    ///
    /// Frames are synchronized on the 0xECA0 marker, fragments are merged into
    /// logical packets and every packet is assigned the unique id of the acquisition
    /// it belongs to. One line (or JSON record) is written per packet.
    Decode {
        /// Input downlink capture.
        input: PathBuf,

        /// JSON application-id category table to use instead of the built-in flight
        /// table.
        #[arg(short, long, value_name = "path")]
        table: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,

        /// Order packets by unique id instead of stream order.
        #[arg(long, action)]
        by_unique_id: bool,
    },
    /// Show frame statistics and per-application-id counts for a capture.
    Info {
        /// Input downlink capture.
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("SPECDECODE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Decode {
            input,
            table,
            format,
            by_unique_id,
        } => decode::decode(input, table.as_deref(), format, *by_unique_id),
        Commands::Info { input, format } => info::info(input, format),
    }
}
