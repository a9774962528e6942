use anyhow::Result;
use cardsorter::auth::token::MIN_SIGNING_KEY_BYTES;
use cardsorter::Config;
use clap::{Parser, Subcommand};
use rand::RngCore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Card inventory service: binary RPC and HTTP/JSON gateway.
#[derive(Parser, Debug)]
#[command(name = "cardsorter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the RPC server and the HTTP gateway until Ctrl-C
    Serve {
        /// Path to config.toml (defaults to the platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a random hex secret for `auth.signing_key` or a device secret
    GenSecret {
        /// Number of random bytes (hex output is twice as long)
        #[arg(long, default_value_t = MIN_SIGNING_KEY_BYTES)]
        bytes: usize,
    },

    /// Load and validate the config, then print it with secrets redacted
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn generate_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = Config::load(config.as_deref())?;
            init_tracing(&config.log_level);
            tracing::info!(config = ?config, "configuration loaded");
            cardsorter::server::run(config).await
        }
        Commands::GenSecret { bytes } => {
            if bytes == 0 {
                anyhow::bail!("--bytes must be positive");
            }
            println!("{}", generate_secret(bytes));
            Ok(())
        }
        Commands::CheckConfig { config } => {
            let config = Config::load(config.as_deref())?;
            println!("{config:#?}");
            println!("config OK");
            Ok(())
        }
    }
}
