//! Configuration loading from disk and the environment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `listener.bind_address`.
pub const ENV_BIND_ADDRESS: &str = "PROXY_BIND_ADDRESS";
/// Environment variable overriding `upstream.url`.
pub const ENV_UPSTREAM_URL: &str = "PROXY_UPSTREAM_URL";
/// Environment variable overriding `upstream.credential`.
pub const ENV_UPSTREAM_TOKEN: &str = "PROXY_UPSTREAM_TOKEN";
/// Environment variable replacing `auth.tokens` with a JSON object.
pub const ENV_API_TOKENS_JSON: &str = "PROXY_API_TOKENS_JSON";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var} is malformed: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration: the TOML file (or defaults when no
/// path is given), then the overrides in `vars`, then validation.
pub fn load_config<I>(path: Option<&Path>, vars: I) -> Result<ProxyConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, vars)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// [`load_config`] with the process environment.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_config(path, std::env::vars())
}

/// Apply environment overrides from an iterator of `(name, value)` pairs.
pub fn apply_env_overrides<I>(config: &mut ProxyConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in vars {
        match name.as_str() {
            ENV_BIND_ADDRESS => config.listener.bind_address = value,
            ENV_UPSTREAM_URL => config.upstream.url = value,
            ENV_UPSTREAM_TOKEN => {
                config.upstream.credential = Some(value).filter(|v| !v.is_empty());
            }
            ENV_API_TOKENS_JSON => {
                let tokens: HashMap<String, String> =
                    serde_json::from_str(&value).map_err(|e| ConfigError::Env {
                        var: ENV_API_TOKENS_JSON,
                        reason: format!(
                            "{} (expected a JSON object like {{\"token1\":\"user1\"}})",
                            e
                        ),
                    })?;
                config.auth.tokens = tokens;
            }
            _ => {}
        }
    }
    Ok(())
}
