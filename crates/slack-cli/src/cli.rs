//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Slack from the terminal - manage workspace tokens and their encryption
#[derive(Parser, Debug)]
#[command(name = "slack")]
#[command(version)]
#[command(about = "Slack from the terminal, with tokens stored per workspace")]
pub struct Args {
    /// Directory holding tokens and settings
    #[arg(long, global = true, env = "SLACK_CLI_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// age binary used for encrypted tokens
    #[arg(long, global = true, env = "SLACK_CLI_AGE_BIN")]
    pub age_bin: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage workspace tokens
    #[command(subcommand)]
    Workspaces(WorkspacesCommand),

    /// Manage token encryption
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum WorkspacesCommand {
    /// List configured workspaces
    List,

    /// Add or replace a workspace token
    Add {
        /// Workspace name
        name: String,

        /// API token (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,

        /// `d` cookie for browser session (xoxc-) tokens
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Remove a workspace
    Remove {
        name: String,
    },

    /// Show a workspace with its token masked
    Show {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show where tokens live and how they are protected
    Show,

    /// Encrypt tokens with an SSH private key (ssh-ed25519 or ssh-rsa)
    SetKey {
        /// Path to the private key, e.g. ~/.ssh/id_ed25519
        path: String,
    },

    /// Stop encrypting tokens
    UnsetKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let args = Args::try_parse_from([
            "slack", "workspaces", "add", "work", "--token", "xoxc-1", "--cookie", "xoxd-2",
        ])
        .unwrap();

        match args.command {
            Command::Workspaces(WorkspacesCommand::Add { name, token, cookie }) => {
                assert_eq!(name, "work");
                assert_eq!(token.as_deref(), Some("xoxc-1"));
                assert_eq!(cookie.as_deref(), Some("xoxd-2"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "slack", "config", "set-key", "~/.ssh/id_ed25519", "--config-dir", "/tmp/cfg", "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        assert_eq!(args.config_dir, Some(PathBuf::from("/tmp/cfg")));
        assert!(matches!(
            args.command,
            Command::Config(ConfigCommand::SetKey { ref path }) if path == "~/.ssh/id_ed25519"
        ));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
