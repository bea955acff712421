//! Command handlers

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use token_store::{
    AgeCli, ConfigDir, ConfigPaths, CredentialStore, EncryptionBackend, Encryptor, Interaction,
    KeyChangeOutcome, KeyManager, KeySetting, SettingsManager, TokenKind,
};

use crate::cli::{Command, ConfigCommand, WorkspacesCommand};

/// Everything a command needs, opened from one config directory
pub struct App {
    config_dir: ConfigDir,
    settings: SettingsManager,
    store: CredentialStore,
}

impl App {
    /// Open the given (or default) config directory with the age CLI backend
    pub fn open(config_dir: Option<PathBuf>, age_bin: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => ConfigDir::with_dir(dir),
            None => ConfigDir::new().context("Failed to locate config directory")?,
        };

        let mut backend = AgeCli::new();
        if let Some(bin) = age_bin {
            backend = backend.with_binary(bin);
        }

        Self::with_backend(config_dir, Arc::new(backend))
    }

    pub fn with_backend(config_dir: ConfigDir, backend: Arc<dyn EncryptionBackend>) -> Result<Self> {
        let settings = SettingsManager::new(config_dir.root()).context("Failed to load settings")?;
        let paths: Arc<dyn ConfigPaths> = Arc::new(config_dir.clone());
        let store = CredentialStore::with_key_pair(
            paths,
            Encryptor::new(backend),
            settings.encryption_key_pair(),
        );

        debug!("Opened config directory {:?}", config_dir.root());
        Ok(Self {
            config_dir,
            settings,
            store,
        })
    }

    /// Run one command, returning what to print on success
    pub async fn run(&mut self, command: Command, interaction: &dyn Interaction) -> Result<String> {
        match command {
            Command::Workspaces(command) => self.workspaces(command).await,
            Command::Config(command) => self.config(command, interaction).await,
        }
    }

    async fn workspaces(&mut self, command: WorkspacesCommand) -> Result<String> {
        match command {
            WorkspacesCommand::List => {
                let all = self.store.all().await?;
                if all.is_empty() {
                    return Ok(
                        "No workspaces configured. Add one with `slack workspaces add <name>`."
                            .to_string(),
                    );
                }

                let mut out = String::new();
                for (name, credential) in &all {
                    let kind = credential
                        .kind()
                        .map(|k| k.label())
                        .unwrap_or("unknown");
                    let _ = writeln!(out, "{}  ({})", name, kind);
                }
                Ok(out.trim_end().to_string())
            }
            WorkspacesCommand::Add {
                name,
                token,
                cookie,
            } => {
                let token = match token {
                    Some(token) => token,
                    None => rpassword::prompt_password(format!("Token for {}: ", name))
                        .context("Failed to read token")?,
                };
                let needs_cookie = TokenKind::from_token(token.trim())
                    .map(|k| k.requires_cookie())
                    .unwrap_or(false);
                let cookie = match cookie {
                    None if needs_cookie => Some(
                        rpassword::prompt_password("Cookie (d=...): ")
                            .context("Failed to read cookie")?,
                    ),
                    other => other,
                };

                self.store.add(&name, &token, cookie.as_deref()).await?;
                Ok(format!("Saved workspace {}", name.trim()))
            }
            WorkspacesCommand::Remove { name } => {
                let name = name.trim();
                if self.store.remove(name).await? {
                    Ok(format!("Removed workspace {}", name))
                } else {
                    Err(anyhow!("Workspace not found: {}", name))
                }
            }
            WorkspacesCommand::Show { name } => {
                let name = name.trim();
                let credential = self.store.get(name).await?;
                let kind = credential
                    .kind()
                    .map(|k| k.label())
                    .unwrap_or("unknown");
                Ok(format!(
                    "{}\n  token:  {} ({})\n  cookie: {}",
                    name,
                    credential.masked_token(),
                    kind,
                    if credential.cookie().is_some() { "set" } else { "none" }
                ))
            }
        }
    }

    async fn config(&mut self, command: ConfigCommand, interaction: &dyn Interaction) -> Result<String> {
        match command {
            ConfigCommand::Show => {
                let encryptor = self.store.encryptor();
                let key = self
                    .settings
                    .encryption_key()
                    .map(|k| k.display().to_string())
                    .unwrap_or_else(|| "none".to_string());
                let available = if encryptor.available().await {
                    "available"
                } else {
                    "not available"
                };

                Ok(format!(
                    "config dir: {}\nssh key:    {}\ntokens:     {}\nencryption: {} ({})",
                    self.config_dir.root().display(),
                    key,
                    self.store.artifact_state().await,
                    encryptor.backend_name(),
                    available
                ))
            }
            ConfigCommand::SetKey { path } => {
                let outcome = KeyManager::new(&self.store, &mut self.settings)
                    .set(&path, interaction)
                    .await;
                into_result(outcome)
            }
            ConfigCommand::UnsetKey => {
                let outcome = KeyManager::new(&self.store, &mut self.settings)
                    .unset(interaction)
                    .await;
                into_result(outcome)
            }
        }
    }
}

fn into_result(outcome: KeyChangeOutcome) -> Result<String> {
    match outcome {
        KeyChangeOutcome::Success { message } => Ok(message),
        KeyChangeOutcome::Failure { error, .. } => Err(anyhow!(error)),
    }
}
