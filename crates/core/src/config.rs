use std::{fmt, fs::File, io, io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory holding the form UI, served for any path without a route.
    pub static_dir: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000, static_dir: "public".to_string(), request_timeout_secs: 30 }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<Secret>,
    pub api_url: String,
    pub html_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            html_url: "https://github.com".to_string(),
            owner: "jefino9488".to_string(),
            repo: "FrameworkPatcherV2".to_string(),
            git_ref: "master".to_string(),
            timeout_secs: 10,
            user_agent: concat!("framework-patcher/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GitHubConfig {
    /// The configured token, treating a blank value as unset.
    pub fn token(&self) -> Option<&Secret> { self.token.as_ref().filter(|t| !t.is_blank()) }

    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

    pub fn expose(&self) -> &str { self.0.trim() }

    pub fn is_blank(&self) -> bool { self.0.trim().is_empty() }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Secret([redacted])") }
}

impl Config {
    /// Load the config file at `path` (defaults when it doesn't exist), then apply
    /// overrides from the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config: Config = match File::open(path) {
            Ok(file) => serde_yaml::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file {}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                Config::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open config file {}", path.display()));
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = Some(Secret::new(token));
        }
        if let Some(port) = var("PORT") {
            self.server.port =
                port.trim().parse().with_context(|| format!("Invalid PORT value '{port}'"))?;
        }
        Ok(())
    }
}
