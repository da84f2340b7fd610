//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::CustodyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    MissingSecret(String),
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
            ConfigError::MissingSecret(var) => {
                write!(f, "Environment variable {} not set", var)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CustodyConfig, ConfigError> {
    let config: CustodyConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CustodyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [blockchain]
            chain_id = 4242
            confirmation_attempts = 10
            confirmation_interval_ms = 500

            [api]
            api_key = "a-long-enough-test-key"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.blockchain.chain_id, 4242);
        assert_eq!(config.api.api_key, "a-long-enough-test-key");
    }

    #[test]
    fn test_invalid_config_reports_validation() {
        let err = parse_config("[vault]\nkdf_iterations = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("vault.kdf_iterations"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[blockchain\nchain_id = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
