//! Device Ledger node
//!
//! Command-line entry point: runs a ledger node or prints author keys.

use clap::{Parser, Subcommand};
use device_ledger::cli;

#[derive(Parser)]
#[command(name = "ledger-node")]
#[command(version = "0.1.0")]
#[command(about = "Append-only ledger of encrypted, signed device events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ledger node
    Start {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3001")]
        port: u16,

        /// Peer base URLs (comma-separated)
        #[arg(long, env = "PEERS")]
        peers: Option<String>,

        /// Token required to create wallets (falls back to WALLET_OWNER_TOKEN)
        #[arg(long, env = "OWNER_TOKEN", hide_env_values = true)]
        owner_token: Option<String>,

        /// Per-request timeout for peer calls, in seconds
        #[arg(long, env = "PEER_TIMEOUT_SECS", default_value = "5")]
        peer_timeout_secs: u64,
    },

    /// Print a fresh author keypair as PEM
    Keygen,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            port,
            peers,
            owner_token,
            peer_timeout_secs,
        } => {
            let owner_token =
                owner_token.or_else(|| std::env::var("WALLET_OWNER_TOKEN").ok());
            let config = cli::node_config(port, peers.as_deref(), owner_token, peer_timeout_secs);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_start(config))?;
        }

        Commands::Keygen => {
            cli::cmd_keygen()?;
        }
    }

    Ok(())
}
