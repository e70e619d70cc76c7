//! Loading of `config.toml` and resolution of the keeper home directory.

use dirs::home_dir;
use keeper_scrapyd_client::DEFAULT_REQUEST_TIMEOUT;
use keeper_scrapyd_client::ScrapydClient;
use keeper_scrapyd_client::ScrapydError;
use serde::Deserialize;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const KEEPER_HOME_ENV: &str = "KEEPER_HOME";
pub const CONFIG_TOML_FILE: &str = "config.toml";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:6800";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigToml {
    pub server: ServerToml,
    pub poll: PollToml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerToml {
    pub url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollToml {
    pub interval_secs: Option<u64>,
}

/// Values supplied on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

/// Effective configuration after merging defaults, file and overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    pub keeper_home: PathBuf,
    pub server_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl KeeperConfig {
    /// Read `<keeper_home>/config.toml` if present and apply `overrides`.
    pub fn load(keeper_home: PathBuf, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let path = keeper_home.join(CONFIG_TOML_FILE);
        let toml = read_config_toml(&path)?;
        Self::from_toml(keeper_home, toml, overrides)
    }

    pub fn from_toml(
        keeper_home: PathBuf,
        toml: ConfigToml,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let server_url = overrides
            .server_url
            .or(toml.server.url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if server_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.url",
                message: "must not be empty".to_string(),
            });
        }

        let request_timeout = match toml.server.request_timeout_secs {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "server.request_timeout_secs",
                    message: "must be at least 1".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let poll_interval = match overrides.poll_interval_secs.or(toml.poll.interval_secs) {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "poll.interval_secs",
                    message: "must be at least 1".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            keeper_home,
            server_url,
            request_timeout,
            poll_interval,
        })
    }

    pub fn scrapyd_client(&self) -> Result<ScrapydClient, ScrapydError> {
        ScrapydClient::with_timeout(self.server_url.as_str(), self.request_timeout)
    }
}

fn read_config_toml(path: &Path) -> Result<ConfigToml, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ConfigToml::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the keeper home directory: `KEEPER_HOME` when set, `~/.keeper`
/// otherwise. The directory is not required to exist.
pub fn find_keeper_home() -> io::Result<PathBuf> {
    let keeper_home_env = std::env::var(KEEPER_HOME_ENV)
        .ok()
        .filter(|val| !val.is_empty());
    find_keeper_home_from_env(keeper_home_env.as_deref())
}

fn find_keeper_home_from_env(keeper_home_env: Option<&str>) -> io::Result<PathBuf> {
    match keeper_home_env {
        Some(val) => Ok(PathBuf::from(val)),
        None => {
            let mut p = home_dir().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "Could not find home directory")
            })?;
            p.push(".keeper");
            Ok(p)
        }
    }
}
