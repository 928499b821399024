use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use regex::Regex;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Parse a config from a YAML string without touching the filesystem.
///
/// Environment variables are expanded before parsing; paths are left as written.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    Ok(serde_yaml::from_str(&yaml_string)?)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).expect("env var pattern is valid");
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=/path/to/directory\n\
             2. Replace $env{{{0}}} in the config file with an actual path",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables (e.g., export DATA_DIR=/data)\n\
             2. Replace the variables in the config file with actual paths",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Expands tilde (~) in all PathBuf fields in the config.
fn expand_paths(config: &mut Config) {
    config.source.path = expand_tilde(&config.source.path);

    if let EstimatorConfig::Bloom { filter_file, .. } = &mut config.estimator {
        *filter_file = expand_tilde(filter_file);
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_estimator(&config.estimator, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.path.as_os_str().is_empty() {
        errors.push("source.path cannot be empty".to_string());
    }

    if let Err(e) = glob::Pattern::new(&source.pattern) {
        errors.push(format!(
            "source.pattern: invalid glob '{}': {}",
            source.pattern, e
        ));
    }

    if source.channel_capacity == 0 {
        errors.push("source.channel_capacity must be greater than zero".to_string());
    }

    if source.poll_interval.is_zero() {
        errors.push("source.poll_interval must be greater than zero".to_string());
    }
}

fn validate_estimator(estimator: &EstimatorConfig, errors: &mut Vec<String>) {
    match estimator {
        EstimatorConfig::BatchRate => {}
        EstimatorConfig::SlidingWindow {
            window_seconds,
            target_service,
        } => {
            if !window_seconds.is_finite() || *window_seconds <= 0.0 {
                errors.push(format!(
                    "estimator.window_seconds must be a positive number, got {}",
                    window_seconds
                ));
            }
            if target_service.is_empty() {
                errors.push("estimator.target_service cannot be empty".to_string());
            }
        }
        EstimatorConfig::Reservoir { reservoir_size } => {
            if *reservoir_size == 0 {
                errors.push("estimator.reservoir_size must be greater than zero".to_string());
            }
        }
        EstimatorConfig::Bloom {
            filter_file,
            bit_count,
            hash_count,
        } => {
            if filter_file.as_os_str().is_empty() {
                errors.push("estimator.filter_file cannot be empty".to_string());
            }
            if *bit_count == 0 {
                errors.push("estimator.bit_count must be greater than zero".to_string());
            }
            if *hash_count == 0 {
                errors.push("estimator.hash_count must be greater than zero".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(
            r#"
source:
  path: /var/spool/events
estimator:
  kind: sliding_window
"#,
        )
        .unwrap();

        assert_eq!(config.source.pattern, "*.json");
        assert_eq!(config.source.poll_interval, Duration::from_millis(500));
        assert_eq!(config.source.channel_capacity, 64);
        match config.estimator {
            EstimatorConfig::SlidingWindow {
                window_seconds,
                target_service,
            } => {
                assert_eq!(window_seconds, 60.0);
                assert_eq!(target_service, "monitoring");
            }
            other => panic!("unexpected estimator: {:?}", other),
        }
    }

    #[test]
    fn test_humantime_durations() {
        let config = parse_config(
            r#"
source:
  path: /data
  poll_interval: 2s
estimator:
  kind: batch_rate
"#,
        )
        .unwrap();

        assert_eq!(config.source.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_bloom_requires_filter_file() {
        let result = parse_config(
            r#"
source:
  path: /data
estimator:
  kind: bloom
"#,
        );
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = parse_config(
            r#"
source:
  path: /data
estimator:
  kind: median
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = parse_config(
            r#"
source:
  path: /data
  pattern: "[unclosed"
  channel_capacity: 0
estimator:
  kind: bloom
  filter_file: /etc/patterns.txt
  bit_count: 0
  hash_count: 0
"#,
        )
        .unwrap();

        match validate_config(&config) {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 4, "{:?}", errors);
                assert!(errors.iter().any(|e| e.contains("source.pattern")));
                assert!(errors.iter().any(|e| e.contains("bit_count")));
            }
            other => panic!("expected validation list, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_reservoir_rejected() {
        let config = parse_config(
            r#"
source:
  path: /data
estimator:
  kind: reservoir
  reservoir_size: 0
"#,
        )
        .unwrap();

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_non_positive_window_rejected() {
        let config = parse_config(
            r#"
source:
  path: /data
estimator:
  kind: sliding_window
  window_seconds: -5
"#,
        )
        .unwrap();

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unset_env_var_reported() {
        let result = parse_config(
            r#"
source:
  path: $env{STREAMSTAT_SURELY_UNSET_VAR}/events
estimator:
  kind: batch_rate
"#,
        );

        match result {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains("STREAMSTAT_SURELY_UNSET_VAR"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
