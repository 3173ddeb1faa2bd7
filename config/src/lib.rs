//! Engine configuration.
//!
//! Structural limits, the blocking-severity set and the default claim
//! timeout are configuration, not constants. Values come from TOML:
//!
//! ```toml
//! [limits]
//! max_depth = 20
//! max_children = 10
//! max_open_challenges = 10
//!
//! [challenges]
//! blocking = ["critical", "major"]
//!
//! [claims]
//! timeout_secs = 300
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::{env, fs};

use af_types::ChallengeSeverity;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AF_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub limits: LimitsConfig,
    pub challenges: ChallengeConfig,
    pub claims: ClaimConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of segments in a node id (the root has depth 1).
    pub max_depth: usize,
    /// Maximum number of children under one parent.
    pub max_children: usize,
    /// Maximum number of simultaneously open challenges on one node.
    pub max_open_challenges: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_children: 10,
            max_open_challenges: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChallengeConfig {
    /// Severities that block acceptance while open.
    pub blocking: BTreeSet<ChallengeSeverity>,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            blocking: BTreeSet::from([ChallengeSeverity::Critical, ChallengeSeverity::Major]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaimConfig {
    /// Claim lifetime used when a caller does not pass one.
    pub timeout_secs: u64,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config at {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

impl EngineConfig {
    /// Load from `$AF_CONFIG`, then `~/.af/config.toml`, falling back to
    /// defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(explicit) = env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
            return Self::load_from(Path::new(&explicit));
        }
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            }
        })?;
        let config = Self::parse(&content).map_err(|err| match err {
            ParseFailure::Toml(source) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, source);
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            }
            ParseFailure::Invalid(message) => ConfigError::Invalid {
                path: path.to_path_buf(),
                message,
            },
        })?;
        tracing::debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let config: Self = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let limits = &self.limits;
        if limits.max_depth == 0 {
            return Err("limits.max_depth must be at least 1".to_owned());
        }
        if limits.max_children == 0 {
            return Err("limits.max_children must be at least 1".to_owned());
        }
        if self.claims.timeout_secs == 0 {
            return Err("claims.timeout_secs must be at least 1".to_owned());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_blocking(&self, severity: ChallengeSeverity) -> bool {
        self.challenges.blocking.contains(&severity)
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".af").join("config.toml"))
}
