use crate::config::schema::{Settings, ValidationError};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "fixbase.toml";

/// Overrides `git.timeout_secs`.
pub const TIMEOUT_ENV_VAR: &str = "FIXBASE_GIT_TIMEOUT";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    Env {
        var: &'static str,
        value: String,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
            ConfigError::Env { var, value } => {
                write!(f, "{var} must be a positive number of seconds, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Env { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    settings
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(settings)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `fixbase.toml` from `dir` if present, then apply environment
/// overrides.
pub fn load_or_default(dir: &Path) -> Result<Settings, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let mut settings = if path.is_file() {
        debug!(path = %path.display(), "loading config");
        load_from_path(&path)?
    } else {
        debug!(path = %path.display(), "no config file");
        Settings::default()
    };
    apply_env(&mut settings, env::var(TIMEOUT_ENV_VAR).ok())?;
    Ok(settings)
}

fn apply_env(settings: &mut Settings, timeout: Option<String>) -> Result<(), ConfigError> {
    if let Some(value) = timeout {
        settings.git.timeout_secs = match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                return Err(ConfigError::Env {
                    var: TIMEOUT_ENV_VAR,
                    value,
                })
            }
        };
    }
    Ok(())
}
