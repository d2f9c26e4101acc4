use std::path::{Path, PathBuf};

use clap::Subcommand;
use color_eyre::eyre::{bail, Result, WrapErr};
use for4_core::ClientSettings;
use tracing::debug;

use crate::render::{CommandOutput, CommandResult};

pub const CONFIG_DIR_ENV: &str = "FOR4_CONFIG_DIR";
const SETTINGS_FILE: &str = "f4.json";
const STATE_FILE: &str = "state.json";

/// Where the CLI keeps its settings and session state.
#[derive(Debug, Clone)]
pub struct CliConfig {
    dir: PathBuf,
}

impl CliConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$FOR4_CONFIG_DIR`, else the platform configuration directory.
    pub fn locate() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::new(dir));
        }

        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| Path::new(&home).join(".config")))
            .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from));
        match base {
            Some(base) => Ok(Self::new(base.join("f4"))),
            None => bail!("Could not find a configuration directory, set {CONFIG_DIR_ENV}"),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Saved settings, or the defaults when nothing was saved. `socket_url` wins over both.
    pub fn load_settings(&self, socket_url: Option<&str>) -> Result<ClientSettings> {
        let path = self.settings_path();
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .wrap_err_with(|| format!("Invalid settings in {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file, using defaults");
                ClientSettings::default()
            }
            Err(e) => return Err(e).wrap_err_with(|| format!("Reading {}", path.display())),
        };

        if let Some(url) = socket_url {
            settings.socket_url = url.to_owned();
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &ClientSettings) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("Creating {}", self.dir.display()))?;
        let path = self.settings_path();
        std::fs::write(&path, serde_json::to_string_pretty(settings)?)
            .wrap_err_with(|| format!("Writing {}", path.display()))?;
        Ok(())
    }
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommand {
    #[command(long_about = "Show the effective settings. Secrets are masked.")]
    Show,

    #[command(long_about = "Set the realtime server.")]
    Server {
        url: String,

        #[arg(long, help = "Path the Socket.IO server is mounted on.")]
        path: Option<String>,
    },

    #[command(long_about = "Set the pre-shared envelope secrets.")]
    Secrets {
        #[arg(long)]
        passphrase: String,

        #[arg(long)]
        mac_secret: String,
    },
}

impl ConfigCommand {
    pub fn run(self, config: &CliConfig, socket_url: Option<&str>) -> CommandResult {
        match self {
            ConfigCommand::Show => {
                let settings = config.load_settings(socket_url)?;
                CommandOutput::object(&settings.redacted())
            }
            ConfigCommand::Server { url, path } => {
                let mut settings = config.load_settings(None)?;
                settings.socket_url = url;
                if let Some(path) = path {
                    settings.socket_path = path;
                }
                config.save_settings(&settings)?;
                Ok("Saved".into())
            }
            ConfigCommand::Secrets {
                passphrase,
                mac_secret,
            } => {
                let mut settings = config.load_settings(None)?;
                settings.envelope_passphrase = passphrase;
                settings.envelope_mac_secret = mac_secret;
                config.save_settings(&settings)?;
                Ok("Saved".into())
            }
        }
    }
}
