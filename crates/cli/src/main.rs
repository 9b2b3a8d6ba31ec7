use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use siths_manager::ManagerConfig;
use siths_transport_pcsc::PcscConfig;

mod commands;
mod utils;

use commands::*;

#[derive(Parser)]
#[command(version, about = "Read SITHS certificates from smart cards")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    /// Slot status re-checks before giving up on a settling reader
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Delay between slot status re-checks, in milliseconds
    #[arg(long, default_value_t = 200)]
    retry_delay_ms: u64,

    /// Stop reading a file after this many trailing 0xFF bytes, 0 disables
    #[arg(long, default_value_t = 10)]
    trailing_ff_limit: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Follow the reader and print every state change
    Watch {
        /// Also print diagnostic lines
        #[arg(long)]
        log: bool,
    },

    /// Wait for a card and print its certificates
    Read {
        /// How long to wait for a card, in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },

    /// Decode a DER file and print any SITHS certificates in it
    Parse {
        /// File to decode
        #[arg(required = true)]
        file: PathBuf,

        /// Print the decoded element tree
        #[arg(long)]
        tree: bool,
    },
}

impl Cli {
    fn manager_config(&self) -> ManagerConfig {
        let trailing_limit = (self.trailing_ff_limit > 0).then_some(self.trailing_ff_limit);
        ManagerConfig::default()
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_trailing_padding_limit(trailing_limit)
    }

    fn pcsc_config(&self) -> PcscConfig {
        match &self.reader {
            Some(reader) => PcscConfig::default().with_reader(reader.as_str()),
            None => PcscConfig::default(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    match &cli.command {
        Commands::List => list_command()?,
        Commands::Watch { log } => {
            watch_command(cli.pcsc_config(), cli.manager_config(), *log)?;
        }
        Commands::Read { timeout_ms } => read_command(
            cli.pcsc_config(),
            cli.manager_config(),
            Duration::from_millis(*timeout_ms),
        )?,
        Commands::Parse { file, tree } => parse_command(file, *tree)?,
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_trailing_limit_disables_padding_check() {
        let cli = Cli::parse_from(["siths", "--trailing-ff-limit", "0", "list"]);
        assert_eq!(cli.manager_config().trailing_padding_limit, None);

        let cli = Cli::parse_from(["siths", "list"]);
        let config = cli.manager_config();
        assert_eq!(config.trailing_padding_limit, Some(10));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(200));
    }

    #[test]
    fn reader_name_flows_into_pcsc_config() {
        let cli = Cli::parse_from(["siths", "-r", "Generic USB", "read"]);
        assert_eq!(cli.pcsc_config().reader.as_deref(), Some("Generic USB"));
    }
}
