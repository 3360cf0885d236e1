use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks what the schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if !(1..=16).contains(&config.scheduler.fan_out_limit) {
        return Err(ConfigError::Validation {
            message: format!(
                "scheduler.fan_out_limit must be between 1 and 16, got {}",
                config.scheduler.fan_out_limit
            ),
        });
    }

    if !config.analysis.offline {
        match config.analysis.endpoint.as_deref() {
            Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {}
            Some(endpoint) => {
                return Err(ConfigError::Validation {
                    message: format!("analysis.endpoint must be an http(s) URL, got '{}'", endpoint),
                });
            }
            None => {
                return Err(ConfigError::Validation {
                    message: "analysis.endpoint is required unless analysis.offline is set"
                        .to_string(),
                });
            }
        }
    }

    if let Some(path) = &config.queue_store_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "queue_store_path must not be empty".to_string(),
            });
        }
    }

    Ok(())
}
