//! Mirror configuration file (TOML).
//!
//! The file names one remote branch and one local directory. Loading it turns
//! raw settings into a [`PartialTarget`] plus optional [`Credentials`]; the
//! engine never sees the file itself.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::remote::strip_credentials;
use crate::core::target::{Credentials, PartialTarget};

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
/// Longest accepted per-command timeout (one day).
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Top-level mirror configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MirrorConfig {
    pub remote: RemoteConfig,
    pub credentials: Option<CredentialsConfig>,
    pub local: LocalConfig,
    pub poll: PollConfig,
    pub git: GitConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote repository URL. Read from the existing checkout when unset.
    pub url: Option<String>,
    /// Branch to mirror. Falls back to `master` when unset.
    pub branch: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory holding the mirror. A leading `~` expands to the home directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub binary: PathBuf,
    /// Wall-clock limit for any single git command.
    pub command_timeout_secs: u64,
    /// Also delete ignored files during the clean step.
    pub clean_ignored: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
            command_timeout_secs: 10 * 60,
            clean_ignored: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for daily log files. Stderr only when unset.
    pub directory: Option<PathBuf>,
}

/// Everything the host needs from the configuration, credentials split out.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub target: PartialTarget,
    pub credentials: Option<Credentials>,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
    pub git_binary: PathBuf,
    pub clean_ignored: bool,
    pub log_directory: Option<PathBuf>,
}

impl MirrorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.local.path.as_os_str().is_empty() {
            return Err(anyhow!("local.path must be set"));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.poll.interval_secs) {
            return Err(anyhow!(
                "poll.interval_secs must be between 1 and {MAX_INTERVAL_SECS}"
            ));
        }
        if !(1..=MAX_COMMAND_TIMEOUT_SECS).contains(&self.git.command_timeout_secs) {
            return Err(anyhow!(
                "git.command_timeout_secs must be between 1 and {MAX_COMMAND_TIMEOUT_SECS}"
            ));
        }
        if self.git.binary.as_os_str().is_empty() {
            return Err(anyhow!("git.binary must be non-empty"));
        }
        if let Some(creds) = &self.credentials
            && creds.username.trim().is_empty()
        {
            return Err(anyhow!("credentials.username must be non-empty"));
        }
        Ok(())
    }

    /// Split credentials out of the remote URL and expand the local path.
    ///
    /// An explicit `[credentials]` table wins over user info embedded in `url`;
    /// the URL handed onward never carries user info either way.
    pub fn resolve(&self) -> Result<LoadedConfig> {
        self.validate()?;
        let (url, embedded) = match self.remote.url.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let (plain, creds) = strip_credentials(raw);
                (Some(plain), creds)
            }
            _ => (None, None),
        };
        let credentials = match &self.credentials {
            Some(c) => Some(Credentials::new(&c.username, &c.password)),
            None => embedded,
        };
        let local_path = expand_home(&self.local.path)?;
        Ok(LoadedConfig {
            target: PartialTarget::new(url, self.remote.branch.clone(), local_path),
            credentials,
            poll_interval: Duration::from_secs(self.poll.interval_secs),
            command_timeout: Duration::from_secs(self.git.command_timeout_secs),
            git_binary: self.git.binary.clone(),
            clean_ignored: self.git.clean_ignored,
            log_directory: self.log.directory.clone(),
        })
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = home::home_dir().ok_or_else(|| anyhow!("cannot expand ~: home directory unknown"))?;
    Ok(home.join(rest))
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<MirrorConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MirrorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
