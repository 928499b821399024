use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use streamstat::config::{generate::generate_starter_config, load_config, EstimatorConfig};
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.source.path, PathBuf::from("/var/spool/streamstat"));
    assert_eq!(config.source.pattern, "*.json");
    assert_eq!(config.source.poll_interval, Duration::from_millis(500));
    assert_eq!(config.source.channel_capacity, 64);
    assert_eq!(config.estimator.kind_name(), "sliding_window");
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
fn test_bloom_config_with_env_var() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    std::env::set_var(
        "STREAMSTAT_CONFIG_TEST_DIR",
        temp_dir.path().to_string_lossy().to_string(),
    );

    let config_yaml = r#"
source:
  path: $env{STREAMSTAT_CONFIG_TEST_DIR}/events
  poll_interval: 2s

estimator:
  kind: bloom
  filter_file: $env{STREAMSTAT_CONFIG_TEST_DIR}/forwardable.txt
  hash_count: 3
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    std::env::remove_var("STREAMSTAT_CONFIG_TEST_DIR");

    assert_eq!(config.source.path, temp_dir.path().join("events"));
    assert_eq!(config.source.poll_interval, Duration::from_secs(2));
    match config.estimator {
        EstimatorConfig::Bloom {
            filter_file,
            bit_count,
            hash_count,
        } => {
            assert_eq!(filter_file, temp_dir.path().join("forwardable.txt"));
            assert_eq!(bit_count, 1_000_000);
            assert_eq!(hash_count, 3);
        }
        other => panic!("unexpected estimator: {:?}", other),
    }
}

#[test]
fn test_tilde_paths_expanded() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
source:
  path: ~/streamstat/events

estimator:
  kind: batch_rate
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    if let Some(home) = dirs::home_dir() {
        assert_eq!(config.source.path, home.join("streamstat/events"));
    }
}

#[test]
fn test_invalid_values_reported_together() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
source:
  path: /tmp/events
  pattern: "["
  channel_capacity: 0

estimator:
  kind: reservoir
  reservoir_size: 0
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let err_msg = load_config(&config_path).unwrap_err().to_string();
    assert!(err_msg.contains("source.pattern"));
    assert!(err_msg.contains("source.channel_capacity"));
    assert!(err_msg.contains("estimator.reservoir_size"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let err_msg = load_config(&temp_dir.path().join("absent.yml"))
        .unwrap_err()
        .to_string();
    assert!(err_msg.contains("absent.yml"));
}
