//! Configuration for the pledge event loop.
//!
//! Settings come from `~/.pledge/config.toml` and can be overridden through
//! environment variables:
//!
//! ```toml
//! [event_loop]
//! max_turns = 100000
//! unhandled_rejections = "warn"
//! ```
//!
//! | Variable | Effect |
//! |---|---|
//! | `PLEDGE_MAX_TURNS` | turn budget per run, `0` for unbounded |
//! | `PLEDGE_UNHANDLED_REJECTIONS` | `warn` or `ignore` |

use std::{env, fs, path::Path, path::PathBuf, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

pub const MAX_TURNS_ENV: &str = "PLEDGE_MAX_TURNS";
pub const UNHANDLED_REJECTIONS_ENV: &str = "PLEDGE_UNHANDLED_REJECTIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// What the event loop does with a rejection nobody observed.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledRejections {
    /// Log each unhandled rejection with `tracing::warn!`.
    #[default]
    Warn,
    /// Only report through the run report and the registered hook.
    Ignore,
}

impl UnhandledRejections {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown unhandled rejection policy: {0}")]
pub struct UnknownPolicy(String);

impl FromStr for UnhandledRejections {
    type Err = UnknownPolicy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "ignore" | "off" => Ok(Self::Ignore),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Settings for one event loop.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Maximum turns a single `run_*` call may execute. `None` or `0` means unbounded.
    pub max_turns: Option<u64>,
    #[serde(default)]
    pub unhandled_rejections: UnhandledRejections,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    event_loop: LoopConfig,
}

impl LoopConfig {
    /// The effective turn budget, treating `0` as unbounded.
    #[must_use]
    pub fn turn_budget(&self) -> Option<u64> {
        self.max_turns.filter(|&turns| turns > 0)
    }

    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u64) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    #[must_use]
    pub fn with_unhandled_rejections(mut self, policy: UnhandledRejections) -> Self {
        self.unhandled_rejections = policy;
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.event_loop)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Load the user config file, `Ok(None)` when there is none.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::from_path(&path).map(Some)
    }

    /// Config file (or defaults when missing or unreadable) plus env overrides.
    #[must_use]
    pub fn resolve() -> Self {
        let base = Self::load().ok().flatten().unwrap_or_default();
        base.with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Invalid values are logged and leave the setting untouched.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(MAX_TURNS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(turns) => self.max_turns = Some(turns),
                Err(err) => tracing::warn!(value = %raw, "Ignoring invalid {MAX_TURNS_ENV}: {err}"),
            }
        }
        if let Some(raw) = lookup(UNHANDLED_REJECTIONS_ENV) {
            match raw.parse::<UnhandledRejections>() {
                Ok(policy) => self.unhandled_rejections = policy,
                Err(err) => tracing::warn!("Ignoring {UNHANDLED_REJECTIONS_ENV}: {err}"),
            }
        }
        tracing::debug!(
            max_turns = ?self.turn_budget(),
            unhandled_rejections = self.unhandled_rejections.as_str(),
            "Resolved event loop config"
        );
        self
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pledge").join("config.toml"))
}
