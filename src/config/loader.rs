//! Configuration loading from disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::LiveConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed TOML: {0}")]
    Syntax(#[from] toml::de::Error),
    #[error("{} invalid setting(s): {}", .0.len(), Listed(.0))]
    Invalid(Vec<ValidationError>),
}

/// Semicolon-separated rendering of validation failures.
struct Listed<'a>(&'a [ValidationError]);

impl fmt::Display for Listed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<LiveConfig, ConfigError> {
    let config: LiveConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LiveConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse_config("[engine"), Err(ConfigError::Syntax(_))));
    }

    #[test]
    fn test_invalid_settings_are_counted_and_named() {
        let err = parse_config("[engine]\nport_capacity = 0\n").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("1 invalid setting(s): "));
        assert!(message.contains("engine.port_capacity"));
    }

    #[test]
    fn test_unreadable_file_names_the_path() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
