//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a YAML file.
///
/// A missing file is not fatal: the built-in defaults are returned with a
/// warning so the proxy can run unconfigured. A present-but-malformed file
/// is an error.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(ProxyConfig::default());
    }

    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProxyConfig = serde_yaml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_path("relayd_loader_test.yaml");
        fs::write(
            &path,
            r#"
server:
  port: 9100
loadBalance:
  algorithm: least-connections
  backends:
    - url: http://127.0.0.1:3001
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.load_balance.algorithm, "least-connections");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/relayd.yaml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path("relayd_loader_malformed.yaml");
        fs::write(&path, "server: [not, a, mapping]").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let path = temp_path("relayd_loader_invalid.yaml");
        fs::write(
            &path,
            r#"
loadBalance:
  algorithm: coin-flip
"#,
        )
        .unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errs)) => assert_eq!(errs.len(), 1),
            other => panic!("expected validation failure, got {other:?}"),
        }

        fs::remove_file(&path).unwrap_or_default();
    }
}
