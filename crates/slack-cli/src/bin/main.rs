//! slack - Slack from the terminal
//!
//! Tokens are stored per workspace in the config directory, either as
//! owner-only plaintext or encrypted with age to an SSH key configured via
//! `slack config set-key`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use slack_cli::{App, Args, TerminalInteraction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut app = App::open(args.config_dir, args.age_bin)?;
    let output = app.run(args.command, &TerminalInteraction).await?;
    println!("{}", output);

    Ok(())
}
