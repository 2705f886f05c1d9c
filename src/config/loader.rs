//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config = load_layered(&ServerConfig::default(), path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read a TOML file on top of `base`: keys present in the file win, everything
/// else keeps the value from `base`. Not validated.
pub fn load_layered(base: &ServerConfig, path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    merge_str(base, &content)
}

pub(crate) fn merge_str(base: &ServerConfig, content: &str) -> Result<ServerConfig, ConfigError> {
    let overlay = toml::Value::Table(toml::from_str::<toml::Table>(content)?);
    let mut merged = toml::Value::try_from(base)?;
    merge(&mut merged, overlay);
    Ok(merged.try_into::<ServerConfig>()?)
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TopologyMode;

    #[test]
    fn file_overrides_only_what_it_names() {
        let mut base = ServerConfig::default();
        base.listener.bind_address = "localhost:8090".to_string();
        base.topology.mode = TopologyMode::Synthetic;

        let merged = merge_str(
            &base,
            "[listener]\nmax_sessions = 4\n\n[delay]\nstrategy = \"per-chunk\"\nchunk_size = 16\n",
        )
        .unwrap();

        assert_eq!(merged.listener.bind_address, "localhost:8090");
        assert_eq!(merged.listener.max_sessions, 4);
        assert_eq!(merged.topology.mode, TopologyMode::Synthetic);
        assert_eq!(merged.delay.chunk_size, 16);
    }

    #[test]
    fn unknown_strategy_is_parse_error() {
        let err = merge_str(&ServerConfig::default(), "[delay]\nstrategy = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn optional_fields_can_be_set() {
        let merged = merge_str(
            &ServerConfig::default(),
            "[observability]\nmetrics_address = \"127.0.0.1:9000\"\n",
        )
        .unwrap();
        assert_eq!(merged.observability.metrics_address.as_deref(), Some("127.0.0.1:9000"));
    }
}
