//! spamlens - Main Entry Point
//!
//! Consensus spam classification and local explanations from the command line.

use clap::Parser;
use spamlens::cli::{cmd_explain, cmd_info, cmd_predict, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spamlens=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict { bundle, config, message } => {
            cmd_predict(&bundle, config.as_deref(), &message)?;
        }
        Commands::Explain {
            bundle,
            config,
            features,
            samples,
            time_ms,
            seed,
            message,
        } => {
            cmd_explain(&bundle, config.as_deref(), &message, features, samples, time_ms, seed)?;
        }
        Commands::Info { bundle } => {
            cmd_info(&bundle)?;
        }
    }

    Ok(())
}
