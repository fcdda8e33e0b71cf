/// Configuration loader - parses clidesc.toml
///
/// Keeps connection settings and aggregation rules out of the scripts, so
/// the completeness threshold or rejected quality flags can change without
/// recompiling.
///
/// ```toml
/// [database]
/// database = "clideDB"
/// host = "localhost"
/// user = "clide"
/// credentials_file = "clide.pass"
///
/// [aggregation]
/// period = "monthly"
/// statistics = ["count", "mean", "max"]
/// completeness = 0.9
/// rejected_flags = ["X"]
/// ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::{AggregationSpec, Completeness, Period, Statistic};
use crate::credentials::{Credentials, load_credentials};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported credentials file '{0}' (expected .pass or .R)")]
    UnsupportedCredentials(String),

    #[error("credentials in {source_name} are missing '{key}'")]
    MissingCredential { key: String, source_name: String },

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("invalid aggregation settings: {0}")]
    InvalidAggregation(String),
}

/// Root of clidesc.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClideConfig {
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Directory of the loaded file; relative credential paths resolve here.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// `[database]` section. Inline values override the credentials file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    pub database: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

/// `[aggregation]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub period: Period,
    pub statistics: Vec<Statistic>,
    /// Fraction of expected observations required (0-1].
    pub completeness: Option<f64>,
    /// Absolute observation count required; excludes `completeness`.
    pub min_count: Option<usize>,
    pub observations_per_day: u32,
    pub max_consecutive_missing: Option<usize>,
    pub rejected_flags: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        let spec = AggregationSpec::default();
        Self {
            period: spec.period,
            statistics: spec.statistics,
            completeness: None,
            min_count: None,
            observations_per_day: spec.observations_per_day,
            max_consecutive_missing: spec.max_consecutive_missing,
            rejected_flags: spec.rejected_flags,
        }
    }
}

impl AggregationConfig {
    /// Validated aggregation rules. Without `completeness` or `min_count`
    /// the default 90 % threshold applies.
    pub fn to_spec(&self) -> Result<AggregationSpec, ConfigError> {
        let completeness = match (self.completeness, self.min_count) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidAggregation(
                    "set either completeness or min_count, not both".to_string(),
                ));
            }
            (Some(fraction), None) => Completeness::Fraction(fraction),
            (None, Some(count)) => Completeness::MinCount(count),
            (None, None) => AggregationSpec::default().completeness,
        };

        let spec = AggregationSpec {
            period: self.period,
            statistics: self.statistics.clone(),
            completeness,
            observations_per_day: self.observations_per_day,
            max_consecutive_missing: self.max_consecutive_missing,
            rejected_flags: self.rejected_flags.clone(),
        };
        spec.validate()
            .map_err(|e| ConfigError::InvalidAggregation(e.to_string()))?;
        Ok(spec)
    }
}

impl DatabaseConfig {
    /// Resolves credentials: the credentials file (relative to `base_dir`)
    /// first, then inline values on top.
    pub fn credentials(&self, base_dir: Option<&Path>) -> Result<Credentials, ConfigError> {
        let mut creds = match &self.credentials_file {
            Some(file) => {
                let path = match base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file.clone(),
                };
                load_credentials(path)?
            }
            None => {
                let missing = |key: &str| ConfigError::MissingCredential {
                    key: key.to_string(),
                    source_name: "[database]".to_string(),
                };
                Credentials {
                    database: self.database.clone().ok_or_else(|| missing("database"))?,
                    user: self.user.clone().ok_or_else(|| missing("user"))?,
                    password: self.password.clone().ok_or_else(|| missing("password"))?,
                    host: None,
                    port: None,
                }
            }
        };

        if let Some(database) = &self.database {
            creds.database = database.clone();
        }
        if let Some(user) = &self.user {
            creds.user = user.clone();
        }
        if let Some(password) = &self.password {
            creds.password = password.clone();
        }
        if self.host.is_some() {
            creds.host = self.host.clone();
        }
        if self.port.is_some() {
            creds.port = self.port;
        }
        Ok(creds)
    }
}

impl ClideConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            source: e,
        })
    }

    /// Database credentials, if a `[database]` section exists.
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        match &self.database {
            Some(db) => db.credentials(self.base_dir.as_deref()).map(Some),
            None => Ok(None),
        }
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ClideConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut config: ClideConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    Ok(config)
}
